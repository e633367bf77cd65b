//! Product inventory file

use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{BackendError, BackendResult};

/// Read and parse the inventory JSON document, served as-is
pub async fn load_inventory(path: &Path) -> BackendResult<Value> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => BackendError::InventoryNotFound(path.to_path_buf()),
        _ => BackendError::Inventory(e.to_string()),
    })?;

    let inventory: Value = serde_json::from_str(&raw).map_err(|e| BackendError::Inventory(e.to_string()))?;
    debug!("Loaded inventory from {}", path.display());
    Ok(inventory)
}
