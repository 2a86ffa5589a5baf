//! Typed dashboard API payloads.
//!
//! The vendor speaks camelCase JSON; everything is decoded into these structs
//! at the client boundary so the collectors only ever see typed values.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub product_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub serial: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub serial: String,
    /// "online", "alerting", "offline" or "dormant".
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    /// RFC 3339 timestamp of the last check-in.
    #[serde(default)]
    pub last_reported_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkStatus {
    pub serial: String,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub uplinks: Vec<Uplink>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uplink {
    /// Physical interface, e.g. "wan1".
    pub interface: String,
    /// "active", "ready", "failed" or "not connected".
    pub status: String,
    #[serde(default)]
    pub ip: Option<String>,
}

/// Loss/latency time series for one uplink of one device.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkLossLatency {
    pub serial: String,
    #[serde(default)]
    pub network_id: Option<String>,
    pub uplink: String,
    #[serde(default)]
    pub time_series: Vec<LossLatencyPoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LossLatencyPoint {
    #[serde(default)]
    pub ts: Option<String>,
    /// Percentage 0-100. The vendor reports null while a probe is pending.
    #[serde(default)]
    pub loss_percent: Option<f64>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkClient {
    pub id: String,
    pub mac: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub vlan: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub usage: Option<ClientUsage>,
}

/// Usage over the lookback window, in kilobytes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUsage {
    #[serde(default)]
    pub sent: Option<f64>,
    #[serde(default)]
    pub recv: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseOverview {
    /// "OK" when the organization is fully licensed.
    #[serde(default)]
    pub status: Option<String>,
    /// RFC 3339 date of the earliest expiring license.
    #[serde(default)]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub licensed_device_counts: HashMap<String, i64>,
}
