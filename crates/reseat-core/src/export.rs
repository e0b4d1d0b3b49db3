//! Inventory snapshot: a pure read that projects the full directory
//! listing to flat rows for tabular serialization.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::directory::{DeviceDirectory, DirectoryError};

/// One row of the exported inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    pub serial: String,
    pub group_tag: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventorySnapshot {
    pub taken_at: DateTime<Utc>,
    pub devices: Vec<DeviceSnapshot>,
}

/// Dump the directory's inventory, preserving the order the service
/// returned records in.
pub async fn snapshot(directory: &dyn DeviceDirectory) -> Result<InventorySnapshot, DirectoryError> {
    let devices = directory
        .list_all()
        .await?
        .into_iter()
        .map(|record| DeviceSnapshot {
            serial: record.serial,
            group_tag: record.group_tag,
            model: record.model,
            manufacturer: record.manufacturer,
        })
        .collect();

    Ok(InventorySnapshot {
        taken_at: Utc::now(),
        devices,
    })
}
