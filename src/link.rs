use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::api::models::ServerRecord;
use crate::error::SyncError;

const VLESS_SCHEME: &str = "vless";

// Unreserved characters per RFC 3986 stay literal, everything else is
// percent-encoded. Applied to the fragment and to path-like query values.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Derive the share link for one server record.
///
/// A server-provided `vless_url` is passed through verbatim. Otherwise the
/// link is composed as `vless://uuid@address:port?query#name` with the query
/// parameters in a fixed order: `security`, then the transport parameters
/// (`type`, `encryption`, `host`, `mode`, `path`, `spx`), then the Reality
/// parameters (`pbk`, `sid`, `sni`, `fp`, `flow`). Empty or absent values
/// are omitted entirely, so the same record always yields the identical
/// string and a re-parse can reproduce it.
pub fn share_link(record: &ServerRecord) -> Result<String, SyncError> {
    if let Some(url) = nonempty(record.vless_url.as_deref()) {
        return Ok(url.to_string());
    }

    let uuid = required(record.uuid.as_deref(), "uuid")?;
    let address = required(record.address.as_deref(), "address")?;
    let port = record
        .port
        .ok_or_else(|| SyncError::Incomplete("missing port".to_string()))?;
    let security = required(record.security.as_deref(), "security")?;

    let mut query = String::new();
    push_param(&mut query, "security", Some(security), false);
    push_param(&mut query, "type", record.transport_type.as_deref(), false);
    push_param(&mut query, "encryption", record.encryption.as_deref(), false);
    push_param(&mut query, "host", record.host.as_deref(), false);
    push_param(&mut query, "mode", record.mode.as_deref(), false);
    push_param(&mut query, "path", record.path.as_deref(), true);
    push_param(&mut query, "spx", record.spx.as_deref(), true);
    push_param(&mut query, "pbk", record.public_key.as_deref(), false);
    push_param(&mut query, "sid", record.short_id.as_deref(), false);
    push_param(&mut query, "sni", record.sni.as_deref(), false);
    push_param(&mut query, "fp", record.fp.as_deref(), false);
    push_param(&mut query, "flow", record.flow.as_deref(), false);

    let fragment = utf8_percent_encode(&record.name, COMPONENT);
    Ok(format!(
        "{VLESS_SCHEME}://{uuid}@{address}:{port}?{query}#{fragment}"
    ))
}

fn push_param(query: &mut String, key: &str, value: Option<&str>, encode: bool) {
    let Some(value) = nonempty(value) else {
        return;
    };
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(key);
    query.push('=');
    if encode {
        query.push_str(&utf8_percent_encode(value, COMPONENT).to_string());
    } else {
        query.push_str(value);
    }
}

fn nonempty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, SyncError> {
    nonempty(value).ok_or_else(|| SyncError::Incomplete(format!("missing {field}")))
}
