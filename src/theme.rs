use crate::store::{KeyValueStore, StoreError, DARK_MODE_KEY};
use log::debug;

pub fn is_dark_mode(store: &dyn KeyValueStore) -> bool {
    store
        .get(DARK_MODE_KEY)
        .and_then(|raw| serde_json::from_str::<bool>(&raw).ok())
        .unwrap_or(false)
}

pub fn set_dark_mode(store: &dyn KeyValueStore, enabled: bool) -> Result<(), StoreError> {
    debug!("Setting dark mode: {}", enabled);
    store.set(DARK_MODE_KEY, enabled.to_string())
}

/// Flips the persisted flag and returns the new value.
pub fn toggle_dark_mode(store: &dyn KeyValueStore) -> Result<bool, StoreError> {
    let enabled = !is_dark_mode(store);
    set_dark_mode(store, enabled)?;
    Ok(enabled)
}
