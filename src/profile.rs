//! Local profile store: parses share links into outbound objects and keeps
//! them in `profile.json`, grouped by the subscription that produced them.
//! The proxy engine consumes the stored outbounds as-is; this module never
//! talks to it.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use log::debug;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::error::SyncError;

const PROFILE_FILE: &str = "profile.json";
const PROFILE_STATE_FILE: &str = "profile.state.json";

/// Boundary to whatever stores imported connection profiles.
///
/// Returns the tag of the stored profile on success; any error counts as a
/// per-record failure and never aborts a sync batch.
pub trait ProfileImporter {
    fn import(&self, link: &str, group: &str) -> Result<String, SyncError>;
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProfileState {
    active_tag: Option<String>,
    /// tag -> group that imported it
    groups: HashMap<String, String>,
}

/// File-backed profile store.
///
/// Re-importing a link whose endpoint already exists under the same group
/// replaces that entry in place and keeps its tag, so repeated syncs do not
/// accumulate duplicates.
pub struct ProfileStore {
    profile_path: PathBuf,
    state_path: PathBuf,
}

impl ProfileStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            profile_path: data_dir.join(PROFILE_FILE),
            state_path: data_dir.join(PROFILE_STATE_FILE),
        }
    }

    pub fn outbounds(&self) -> Result<Vec<Value>, SyncError> {
        let profile = self.load_profile()?;
        Ok(profile
            .get("outbounds")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub fn active_tag(&self) -> Option<String> {
        self.load_state().active_tag
    }

    pub fn set_active(&self, tag: &str) -> Result<(), SyncError> {
        let mut state = self.load_state();
        state.active_tag = Some(tag.to_string());
        self.save_state(&state)
    }

    pub fn remove(&self, tag: &str) -> Result<(), SyncError> {
        let mut profile = self.load_profile()?;
        let profile_obj = profile
            .as_object_mut()
            .ok_or_else(|| SyncError::storage("profile root must be an object"))?;
        let outbounds = profile_obj
            .get("outbounds")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let filtered: Vec<Value> = outbounds
            .into_iter()
            .filter(|item| item.get("tag").and_then(Value::as_str) != Some(tag))
            .collect();
        profile_obj.insert("outbounds".to_string(), Value::Array(filtered));
        self.save_profile(&profile)?;

        let mut state = self.load_state();
        state.groups.remove(tag);
        if state.active_tag.as_deref() == Some(tag) {
            state.active_tag = None;
        }
        self.save_state(&state)
    }

    fn load_profile(&self) -> Result<Value, SyncError> {
        if !self.profile_path.exists() {
            return Ok(json!({ "outbounds": [] }));
        }
        let raw = fs::read_to_string(&self.profile_path)?;
        serde_json::from_str(&raw).map_err(SyncError::storage)
    }

    fn save_profile(&self, profile: &Value) -> Result<(), SyncError> {
        if let Some(parent) = self.profile_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(profile).map_err(SyncError::storage)?;
        fs::write(&self.profile_path, content)?;
        Ok(())
    }

    fn load_state(&self) -> ProfileState {
        if !self.state_path.exists() {
            return ProfileState::default();
        }
        let raw = match fs::read_to_string(&self.state_path) {
            Ok(value) => value,
            Err(_) => return ProfileState::default(),
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    fn save_state(&self, state: &ProfileState) -> Result<(), SyncError> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(state).map_err(SyncError::storage)?;
        fs::write(&self.state_path, content)?;
        Ok(())
    }
}

impl ProfileImporter for ProfileStore {
    fn import(&self, link: &str, group: &str) -> Result<String, SyncError> {
        let mut outbound = parse_share_link(link)?;
        let mut profile = self.load_profile()?;
        let profile_obj = profile
            .as_object_mut()
            .ok_or_else(|| SyncError::storage("profile root must be an object"))?;
        let mut outbounds = profile_obj
            .get("outbounds")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut state = self.load_state();

        let key = endpoint_key(&outbound);
        let existing = key.is_some().then(|| {
            outbounds.iter().position(|item| {
                let Some(tag) = item.get("tag").and_then(Value::as_str) else {
                    return false;
                };
                state.groups.get(tag).map(String::as_str) == Some(group)
                    && endpoint_key(item) == key
            })
        });

        let tag = if let Some(Some(index)) = existing {
            let tag = outbounds[index]
                .get("tag")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            outbound["tag"] = json!(tag.clone());
            outbounds[index] = outbound;
            tag
        } else {
            let mut used: HashSet<String> = outbounds
                .iter()
                .filter_map(|item| item.get("tag").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            let fallback = outbound
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("profile")
                .to_string();
            let tag = unique_tag(&guess_tag(&outbound, &fallback), &mut used);
            outbound["tag"] = json!(tag.clone());
            outbounds.push(outbound);
            state.groups.insert(tag.clone(), group.to_string());
            tag
        };

        profile_obj.insert("outbounds".to_string(), Value::Array(outbounds));
        self.save_profile(&profile)?;
        if state.active_tag.is_none() {
            state.active_tag = Some(tag.clone());
        }
        self.save_state(&state)?;
        debug!("stored profile {tag} in group {group}");
        Ok(tag)
    }
}

fn endpoint_key(outbound: &Value) -> Option<(String, u64, String)> {
    Some((
        outbound.get("server")?.as_str()?.to_string(),
        outbound.get("server_port")?.as_u64()?,
        outbound.get("type")?.as_str()?.to_string(),
    ))
}

fn unique_tag(base: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut index = 2;
    while used.contains(&candidate) {
        candidate = format!("{base}-{index}");
        index += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn guess_tag(raw: &Value, fallback: &str) -> String {
    raw.get("tag")
        .and_then(Value::as_str)
        .filter(|tag| !tag.trim().is_empty())
        .map(|tag| tag.to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// Parse one share link into a sing-box outbound object.
pub fn parse_share_link(link: &str) -> Result<Value, SyncError> {
    let trimmed = link.trim();
    if trimmed.starts_with("vless://") {
        return parse_vless(trimmed);
    }
    if trimmed.starts_with("vmess://") {
        return parse_vmess(trimmed);
    }
    let scheme = trimmed.split("://").next().unwrap_or(trimmed);
    Err(SyncError::UnsupportedLink(scheme.to_string()))
}

fn parse_vless(link: &str) -> Result<Value, SyncError> {
    let url = Url::parse(link).map_err(|e| SyncError::InvalidLink(e.to_string()))?;
    let uuid = url.username();
    if uuid.is_empty() {
        return Err(SyncError::InvalidLink("missing uuid".to_string()));
    }
    let server = url
        .host_str()
        .ok_or_else(|| SyncError::InvalidLink("missing server".to_string()))?;
    let port = url
        .port()
        .ok_or_else(|| SyncError::InvalidLink("missing port".to_string()))?;
    let params = query_map(&url);

    let fragment = percent_decode_str(url.fragment().unwrap_or(""))
        .decode_utf8_lossy()
        .into_owned();
    let tag = if fragment.trim().is_empty() {
        format!("vless-{server}:{port}")
    } else {
        fragment
    };

    let mut outbound = json!({
        "type": "vless",
        "tag": tag,
        "server": server,
        "server_port": port,
        "uuid": uuid
    });

    if let Some(flow) = params.get("flow") {
        outbound["flow"] = json!(flow);
    }

    let network = params
        .get("type")
        .cloned()
        .unwrap_or_else(|| "tcp".to_string());
    if let Some(transport) = build_transport(&params, network.as_str()) {
        outbound["transport"] = transport;
    }

    let mut tls_params = params.clone();
    if !tls_params.contains_key("security") {
        tls_params.insert("security".to_string(), "tls".to_string());
    }
    if let Some(tls) = tls_from_params(&tls_params, Some(server.to_string())) {
        outbound["tls"] = tls;
    }

    Ok(outbound)
}

fn parse_vmess(link: &str) -> Result<Value, SyncError> {
    let encoded = link.trim().trim_start_matches("vmess://");
    let decoded = decode_base64_to_string(encoded)?;
    let raw: Value =
        serde_json::from_str(&decoded).map_err(|e| SyncError::InvalidLink(e.to_string()))?;
    let obj = raw
        .as_object()
        .ok_or_else(|| SyncError::InvalidLink("invalid vmess json".to_string()))?;

    let server = obj
        .get("add")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::InvalidLink("missing server".to_string()))?;
    let port = obj
        .get("port")
        .and_then(|value| {
            value
                .as_str()
                .and_then(|s| s.parse::<u16>().ok())
                .or_else(|| value.as_u64().map(|v| v as u16))
        })
        .ok_or_else(|| SyncError::InvalidLink("missing port".to_string()))?;
    let uuid = obj
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::InvalidLink("missing uuid".to_string()))?;

    let mut params: HashMap<String, String> = HashMap::new();
    for key in ["net", "type", "host", "path", "tls", "sni"] {
        if let Some(value) = obj.get(key).and_then(Value::as_str) {
            params.insert(key.to_string(), value.to_string());
        }
    }

    let ps = obj.get("ps").and_then(Value::as_str).unwrap_or("");
    let tag = if ps.trim().is_empty() {
        format!("vmess-{server}:{port}")
    } else {
        ps.to_string()
    };

    let mut outbound = json!({
        "type": "vmess",
        "tag": tag,
        "server": server,
        "server_port": port,
        "uuid": uuid
    });

    if let Some(security) = obj.get("scy").and_then(Value::as_str) {
        outbound["security"] = json!(security);
    }

    let network = params
        .get("net")
        .cloned()
        .unwrap_or_else(|| "tcp".to_string());
    if let Some(transport) = build_transport(&params, network.as_str()) {
        outbound["transport"] = transport;
    }

    let mut tls_params = params.clone();
    if !tls_params.contains_key("security") && !tls_params.contains_key("tls") {
        tls_params.insert("security".to_string(), "tls".to_string());
    }
    if let Some(tls) = tls_from_params(&tls_params, Some(server.to_string())) {
        outbound["tls"] = tls;
    }

    Ok(outbound)
}

fn build_transport(params: &HashMap<String, String>, network: &str) -> Option<Value> {
    match network {
        "ws" => {
            let mut transport = json!({ "type": "ws" });
            if let Some(path) = params.get("path") {
                transport["path"] = json!(path);
            }
            if let Some(host) = params.get("host") {
                transport["headers"] = json!({ "Host": host });
            }
            Some(transport)
        }
        "xhttp" | "httpupgrade" => {
            let mut transport = json!({ "type": network });
            if let Some(host) = params.get("host") {
                transport["host"] = json!(host);
            }
            if let Some(path) = params.get("path") {
                transport["path"] = json!(path);
            }
            if network == "xhttp" {
                if let Some(mode) = params.get("mode") {
                    transport["mode"] = json!(mode);
                }
            }
            Some(transport)
        }
        "grpc" => {
            let mut transport = json!({ "type": "grpc" });
            if let Some(service) = params
                .get("service_name")
                .or_else(|| params.get("path"))
            {
                transport["service_name"] = json!(service);
            }
            Some(transport)
        }
        _ => None,
    }
}

fn tls_from_params(
    params: &HashMap<String, String>,
    fallback_sni: Option<String>,
) -> Option<Value> {
    let security = params
        .get("security")
        .or_else(|| params.get("tls"))
        .map(|value| value.to_lowercase())
        .unwrap_or_default();

    if security.is_empty() || security == "none" {
        return None;
    }

    let mut tls = json!({ "enabled": true });

    if let Some(sni) = params.get("sni").cloned().or(fallback_sni) {
        tls["server_name"] = json!(sni);
    }

    if let Some(fp) = params
        .get("fp")
        .or_else(|| params.get("fingerprint"))
        .map(|value| value.trim())
    {
        if !fp.is_empty() && !fp.eq_ignore_ascii_case("none") {
            tls["utls"] = json!({
                "enabled": true,
                "fingerprint": fp
            });
        }
    }

    if security == "reality" {
        let mut reality = json!({ "enabled": true });
        let mut has_reality = false;

        if let Some(pbk) = params.get("pbk").or_else(|| params.get("public_key")) {
            if !pbk.is_empty() {
                reality["public_key"] = json!(pbk);
                has_reality = true;
            }
        }
        if let Some(sid) = params.get("sid").or_else(|| params.get("short_id")) {
            if !sid.is_empty() {
                reality["short_id"] = json!(sid);
                has_reality = true;
            }
        }

        if has_reality {
            tls["reality"] = reality;
        }
    }

    Some(tls)
}

fn query_map(url: &Url) -> HashMap<String, String> {
    url.query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.to_string()))
        .collect()
}

fn add_padding(value: &str) -> String {
    let remainder = value.len() % 4;
    if remainder == 0 {
        value.to_string()
    } else {
        format!("{value}{}", "=".repeat(4 - remainder))
    }
}

fn decode_base64_to_string(input: &str) -> Result<String, SyncError> {
    let cleaned = input.trim();
    let candidates = vec![
        cleaned.to_string(),
        cleaned.replace('-', "+").replace('_', "/"),
    ];
    for candidate in candidates {
        let padded = add_padding(&candidate);
        for engine in [URL_SAFE_NO_PAD, URL_SAFE, STANDARD_NO_PAD, STANDARD] {
            if let Ok(bytes) = engine.decode(candidate.as_bytes()) {
                if let Ok(value) = String::from_utf8(bytes) {
                    return Ok(value);
                }
            }
            if candidate != padded {
                if let Ok(bytes) = engine.decode(padded.as_bytes()) {
                    if let Ok(value) = String::from_utf8(bytes) {
                        return Ok(value);
                    }
                }
            }
        }
    }
    Err(SyncError::InvalidLink("base64 decode failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REALITY_LINK: &str =
        "vless://u-1@1.2.3.4:443?security=reality&pbk=pk1&sid=sid1&sni=example.com&fp=chrome#US-1";

    #[test]
    fn parses_a_reality_vless_link() {
        let outbound = parse_share_link(REALITY_LINK).unwrap();
        assert_eq!(outbound["type"], "vless");
        assert_eq!(outbound["tag"], "US-1");
        assert_eq!(outbound["server"], "1.2.3.4");
        assert_eq!(outbound["server_port"], 443);
        assert_eq!(outbound["uuid"], "u-1");
        assert_eq!(outbound["tls"]["server_name"], "example.com");
        assert_eq!(outbound["tls"]["reality"]["public_key"], "pk1");
        assert_eq!(outbound["tls"]["reality"]["short_id"], "sid1");
        assert_eq!(outbound["tls"]["utls"]["fingerprint"], "chrome");
    }

    #[test]
    fn parses_an_xhttp_vless_link() {
        let link =
            "vless://u@h.example:8443?security=tls&type=xhttp&host=cdn.example&mode=auto&path=%2Fpush#X";
        let outbound = parse_share_link(link).unwrap();
        assert_eq!(outbound["transport"]["type"], "xhttp");
        assert_eq!(outbound["transport"]["host"], "cdn.example");
        assert_eq!(outbound["transport"]["mode"], "auto");
        assert_eq!(outbound["transport"]["path"], "/push");
    }

    #[test]
    fn parses_a_vmess_link() {
        let payload = serde_json::json!({
            "v": "2", "ps": "JP-1", "add": "9.9.9.9", "port": "8443",
            "id": "id-1", "net": "ws", "path": "/ws", "tls": "tls"
        });
        let encoded = STANDARD.encode(payload.to_string());
        let outbound = parse_share_link(&format!("vmess://{encoded}")).unwrap();
        assert_eq!(outbound["type"], "vmess");
        assert_eq!(outbound["tag"], "JP-1");
        assert_eq!(outbound["server_port"], 8443);
        assert_eq!(outbound["transport"]["type"], "ws");
        assert_eq!(outbound["transport"]["path"], "/ws");
        assert_eq!(outbound["tls"]["enabled"], true);
    }

    #[test]
    fn rejects_unknown_schemes_and_broken_links() {
        assert!(matches!(
            parse_share_link("socks5://1.2.3.4:1080"),
            Err(SyncError::UnsupportedLink(_))
        ));
        assert!(matches!(
            parse_share_link("vless://@1.2.3.4:443"),
            Err(SyncError::InvalidLink(_))
        ));
    }

    #[test]
    fn reimport_replaces_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        let first = store.import(REALITY_LINK, "guardx_mobile").unwrap();
        let second = store.import(REALITY_LINK, "guardx_mobile").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.outbounds().unwrap().len(), 1);

        // renamed upstream, same endpoint: still one entry, tag is stable
        let renamed = REALITY_LINK.replace("#US-1", "#US-East");
        let third = store.import(&renamed, "guardx_mobile").unwrap();
        assert_eq!(third, first);
        assert_eq!(store.outbounds().unwrap().len(), 1);
    }

    #[test]
    fn groups_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        store.import(REALITY_LINK, "guardx_mobile").unwrap();
        let other = store.import(REALITY_LINK, "manual").unwrap();
        assert_eq!(store.outbounds().unwrap().len(), 2);
        assert_eq!(other, "US-1-2");

        store.set_active(&other).unwrap();
        assert_eq!(store.active_tag().as_deref(), Some("US-1-2"));
    }

    #[test]
    fn first_import_becomes_active_and_remove_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        let tag = store.import(REALITY_LINK, "guardx_mobile").unwrap();
        assert_eq!(store.active_tag().as_deref(), Some(tag.as_str()));

        store.remove(&tag).unwrap();
        assert_eq!(store.active_tag(), None);
        assert!(store.outbounds().unwrap().is_empty());
    }

    #[test]
    fn colliding_names_get_suffixed_tags() {
        let mut used = HashSet::new();
        assert_eq!(unique_tag("US-1", &mut used), "US-1");
        assert_eq!(unique_tag("US-1", &mut used), "US-1-2");
        assert_eq!(unique_tag("US-1", &mut used), "US-1-3");
    }
}
