pub mod analysis;
pub mod classifier;
pub mod history;
pub mod theme;
