use url::Url;

use crate::error::SyncError;

/// Extract the bearer token from an authentication deep link.
///
/// The Telegram bot hands the app a custom-scheme URI such as
/// `guardx://auth?token=<jwt>`. A link without a usable `token` parameter
/// is a user-visible error, never a panic.
pub fn token_from_link(link: &str) -> Result<String, SyncError> {
    let url = Url::parse(link.trim()).map_err(|e| SyncError::InvalidLink(e.to_string()))?;
    let token = url
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.trim().to_string());
    match token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(SyncError::MissingToken),
    }
}
