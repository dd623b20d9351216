use crate::theme;
use crate::AppState;

pub fn get_dark_mode(state: &AppState) -> bool {
    theme::is_dark_mode(state.store())
}

pub fn set_dark_mode(state: &AppState, enabled: bool) -> Result<(), String> {
    theme::set_dark_mode(state.store(), enabled).map_err(|e| e.to_string())
}

pub fn toggle_dark_mode(state: &AppState) -> Result<bool, String> {
    theme::toggle_dark_mode(state.store()).map_err(|e| e.to_string())
}
