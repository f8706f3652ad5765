use serde::{Deserialize, Serialize};

/// One entry from the backend server list.
///
/// The schema grew over time; everything beyond identity and connectivity is
/// optional and absent fields simply stay out of the derived share link.
/// A record must carry either the fields needed to derive a link or a
/// ready-made `vless_url`, never neither.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerRecord {
    pub name: String,
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_flag: Option<String>,
    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub security: Option<String>,

    // xhttp transport parameters
    #[serde(default, rename = "type")]
    pub transport_type: Option<String>,
    #[serde(default)]
    pub encryption: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub spx: Option<String>,

    // Reality parameters
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub short_id: Option<String>,
    #[serde(default)]
    pub sni: Option<String>,
    #[serde(default)]
    pub fp: Option<String>,
    #[serde(default)]
    pub flow: Option<String>,

    /// Pre-built share link; passed through verbatim when present.
    #[serde(default)]
    pub vless_url: Option<String>,

    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub load: Option<f64>,
}

/// Current plan state for the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    #[serde(default)]
    pub subscription_id: Option<String>,
    pub active: bool,
    pub plan_name: String,
    /// `None` means the plan never expires.
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub traffic_limit_gb: f64,
    #[serde(default)]
    pub traffic_used_gb: f64,
    #[serde(default)]
    pub traffic_remaining_gb: f64,
    /// `None` means unlimited.
    #[serde(default)]
    pub days_remaining: Option<i64>,
}

/// Wire shape of `GET /api/mobile/subscriptions`: the subscription object is
/// wrapped and nullable ("no active plan").
#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionEnvelope {
    #[serde(default)]
    pub subscription: Option<SubscriptionRecord>,
}
