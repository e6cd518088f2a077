use serde::{Deserialize, Serialize};

/// Identity payload from `GET /info` on the appliance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: String,
    pub ip_address: String,
    pub firmware_version: String,
}
