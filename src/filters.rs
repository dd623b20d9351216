//! Display adjustments for the currently shown image.

use serde::Serialize;

pub const FILTER_MIN: u16 = 50;
pub const FILTER_MAX: u16 = 150;
pub const FILTER_DEFAULT: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageFilters {
    brightness: u16,
    contrast: u16,
    saturation: u16,
}

impl Default for ImageFilters {
    fn default() -> Self {
        Self {
            brightness: FILTER_DEFAULT,
            contrast: FILTER_DEFAULT,
            saturation: FILTER_DEFAULT,
        }
    }
}

fn clamp(percent: u16) -> u16 {
    percent.clamp(FILTER_MIN, FILTER_MAX)
}

impl ImageFilters {
    pub fn brightness(&self) -> u16 {
        self.brightness
    }

    pub fn contrast(&self) -> u16 {
        self.contrast
    }

    pub fn saturation(&self) -> u16 {
        self.saturation
    }

    pub fn set_brightness(&mut self, percent: u16) {
        self.brightness = clamp(percent);
    }

    pub fn set_contrast(&mut self, percent: u16) {
        self.contrast = clamp(percent);
    }

    pub fn set_saturation(&mut self, percent: u16) {
        self.saturation = clamp(percent);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// CSS `filter` value for rendering the preview.
    pub fn css_filter(&self) -> String {
        format!(
            "brightness({}%) contrast({}%) saturate({}%)",
            self.brightness, self.contrast, self.saturation
        )
    }
}
