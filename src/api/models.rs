//! Wire payloads.
//!
//! Structs here mirror the backend's JSON exactly (snake_case fields,
//! `refreshToken` in the auth exchange); pages map them into their own row
//! view-models. Anything the backend may omit is optional or defaulted so
//! a sparse payload never fails to decode.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::grid::PageData;

/// Standard paginated envelope. `results` is usually an array but the
/// groups and devices endpoints wrap an object carrying side-band data,
/// hence the type parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub results: T,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

impl<T> Envelope<T> {
    pub fn has_next(&self) -> Option<bool> {
        Some(self.next.is_some())
    }

    pub fn has_previous(&self) -> Option<bool> {
        Some(self.previous.is_some())
    }
}

impl<T> Envelope<Vec<T>> {
    /// Flatten an array envelope into page data, mapping each raw record
    /// into the caller's row type.
    pub fn into_page_data<R>(self, map: impl FnMut(T) -> R) -> PageData<R> {
        let has_next = self.has_next();
        let has_previous = self.has_previous();
        PageData {
            rows: self.results.into_iter().map(map).collect(),
            total_count: Some(self.count.unwrap_or(0)),
            has_next,
            has_previous,
        }
    }
}

// === Auth ===

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

// === Groups ===

/// `results` object of `GET /api/groups`.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupResults {
    #[serde(default)]
    pub groups_data: Vec<GroupRaw>,
    #[serde(default)]
    pub total_groups: usize,
    #[serde(default)]
    pub total_devices: usize,
    #[serde(default)]
    pub devices_count_info: HashMap<String, usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupRaw {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub peripheral_configs: Option<PeripheralConfigs>,
    /// Devices keyed by device type.
    #[serde(default)]
    pub devices: HashMap<String, Vec<DeviceRef>>,
    #[serde(default)]
    pub patches: Vec<Value>,
    #[serde(default)]
    pub modbus_configs: Vec<Value>,
}

impl GroupRaw {
    pub fn device_count(&self) -> usize {
        self.devices.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeripheralConfigs {
    #[serde(default)]
    pub wifi_config: Option<Value>,
    #[serde(default)]
    pub ethernet_config: Option<Value>,
    #[serde(default)]
    pub modbustcp_config: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRef {
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peripheral_configs: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peripheral_configs: Option<Value>,
}

// === Devices ===

/// `results` object of `GET /api/devices`: the device page plus the full
/// group list for the manage-group modal.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceResults {
    #[serde(default)]
    pub devices: Vec<DeviceRaw>,
    #[serde(default)]
    pub groups: Vec<GroupChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRaw {
    pub device_id: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub modbus_version: Option<String>,
    #[serde(default)]
    pub patch_version: Option<String>,
    #[serde(default)]
    pub modbus_config_name: Option<String>,
    #[serde(default)]
    pub patch_name: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GroupChoice {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeGroup {
    pub group_id: String,
}

// === Modbus configs ===

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigRaw {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub slaves_details: Vec<SlaveDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlaveDetail {
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub slave_data: Option<SlaveData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlaveData {
    #[serde(default)]
    pub slave_id: Option<String>,
    #[serde(default)]
    pub slave_ip: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

// === Patches ===

#[derive(Debug, Clone, Deserialize)]
pub struct PatchRaw {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

// === Users ===

#[derive(Debug, Clone, Deserialize)]
pub struct UserRaw {
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_envelope_decodes_and_flattens() {
        let body = r#"{
            "results": [
                {"id": "c1", "name": "boiler", "group": "plant-a", "is_default": true,
                 "slaves_details": [
                    {"interface": "RS485", "slave_data": {"slave_id": "1", "slave_ip": "10.0.0.5", "name": "s1"}}
                 ]},
                {"id": "c2", "name": "pump"}
            ],
            "count": 12,
            "next": "http://x/api/configs?page=2",
            "previous": null
        }"#;
        let envelope: Envelope<Vec<ConfigRaw>> = serde_json::from_str(body).unwrap();
        let page = envelope.into_page_data(|c| c.name);
        assert_eq!(page.rows, vec!["boiler", "pump"]);
        assert_eq!(page.total_count, Some(12));
        assert_eq!(page.has_next, Some(true));
        assert_eq!(page.has_previous, Some(false));
    }

    #[test]
    fn missing_count_flattens_to_zero() {
        let body = r#"{"results": []}"#;
        let envelope: Envelope<Vec<PatchRaw>> = serde_json::from_str(body).unwrap();
        let page = envelope.into_page_data(|p| p.filename);
        assert_eq!(page.total_count, Some(0));
        assert_eq!(page.has_next, Some(false));
    }

    #[test]
    fn group_results_decode_with_sideband_stats() {
        let body = r#"{
            "results": {
                "groups_data": [
                    {"id": "g1", "name": "plant-a",
                     "peripheral_configs": {"wifi_config": {"ssid": "x"}},
                     "devices": {"meter": [{"device_id": "d1"}, {"device_id": "d2"}],
                                 "inverter": [{"device_id": "d3"}]},
                     "patches": [{}],
                     "modbus_configs": [{}, {}]}
                ],
                "total_groups": 4,
                "total_devices": 17,
                "devices_count_info": {"meter": 11, "inverter": 6}
            },
            "count": 4
        }"#;
        let envelope: Envelope<GroupResults> = serde_json::from_str(body).unwrap();
        let results = envelope.results;
        assert_eq!(results.total_groups, 4);
        assert_eq!(results.devices_count_info["meter"], 11);
        let group = &results.groups_data[0];
        assert_eq!(group.device_count(), 3);
        assert!(group.peripheral_configs.as_ref().unwrap().wifi_config.is_some());
        assert!(group.peripheral_configs.as_ref().unwrap().ethernet_config.is_none());
    }

    #[test]
    fn token_pair_uses_wire_casing() {
        let pair: TokenPair =
            serde_json::from_str(r#"{"token": "a", "refreshToken": "r"}"#).unwrap();
        assert_eq!(pair.refresh_token, "r");
        let body = serde_json::to_string(&RefreshRequest {
            refresh_token: pair.refresh_token,
        })
        .unwrap();
        assert!(body.contains("refreshToken"));
    }

    #[test]
    fn sparse_device_decodes() {
        let device: DeviceRaw = serde_json::from_str(r#"{"device_id": "d9"}"#).unwrap();
        assert!(device.group_name.is_none());
        assert!(device.modbus_config_name.is_none());
    }
}
