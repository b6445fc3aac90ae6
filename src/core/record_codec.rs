//! Account blob decoding across the two field-naming generations.
//!
//! The oldest clients serialized their server objects with member-prefixed keys
//! (`mHost`, `mUrl`, ...). Decoding walks a small generation chain: a blob that
//! carries any prefixed key is first rewritten with [`MARKED_FIELD_RENAMES`], then
//! both generations go through the same structural decoder. Only object keys are
//! renamed; string values are never touched.

use crate::core::error::LegacyError;
use crate::core::model::AccountRecord;
use serde_json::{Map, Value};
use tracing::debug;

/// Legacy key -> current key.
pub const MARKED_FIELD_RENAMES: &[(&str, &str)] = &[
    ("mHost", "host"),
    ("mScheme", "scheme"),
    ("mPort", "port"),
    ("mPath", "path"),
    ("mVersion", "version"),
    ("mVersionName", "versionName"),
    ("mIconURL", "iconURL"),
    ("mWelcomeMessage", "welcomeMessage"),
    ("mLabel", "label"),
    ("mUrl", "url"),
    ("mSSLContext", "sslContext"),
    ("mSSLUnverified", "sslUnverified"),
    ("mLegacy", "legacy"),
    ("mProperties", "properties"),
];

/// Alias -> current key of an account field. The current key wins when both are present.
pub const ACCOUNT_FIELD_ALIASES: &[(&str, &str)] = &[
    ("url", "serverUrl"),
    ("label", "serverLabel"),
    ("sslUnverified", "skipVerify"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldConvention {
    Current,
    Marked,
}

fn renamed(key: &str) -> Option<&'static str> {
    MARKED_FIELD_RENAMES
        .iter()
        .find(|(old, _)| *old == key)
        .map(|(_, new)| *new)
}

fn has_marked_key(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| renamed(k).is_some() || has_marked_key(v)),
        Value::Array(items) => items.iter().any(has_marked_key),
        _ => false,
    }
}

pub fn detect_convention(value: &Value) -> FieldConvention {
    if has_marked_key(value) {
        FieldConvention::Marked
    } else {
        FieldConvention::Current
    }
}

/// Rewrites every known marked key, at any depth, to its current name.
pub fn rename_marked_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let key = renamed(&k).map(str::to_string).unwrap_or(k);
                out.insert(key, rename_marked_fields(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(rename_marked_fields).collect()),
        other => other,
    }
}

fn drop_shadowed_aliases(map: &mut Map<String, Value>) {
    for (alias, current) in ACCOUNT_FIELD_ALIASES {
        if map.contains_key(*current) && map.remove(*alias).is_some() {
            debug!(alias, current, "dropping alias shadowed by current key");
        }
    }
}

/// Stable account identifier: `urlencode(username)@urlencode(server_url)`.
pub fn account_id(username: &str, server_url: &str) -> String {
    format!(
        "{}@{}",
        urlencoding::encode(username),
        urlencoding::encode(server_url)
    )
}

pub fn decode_account(raw: &[u8]) -> Result<AccountRecord, LegacyError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| LegacyError::Decode(format!("account blob is not UTF-8: {}", e)))?;
    let mut value: Value = serde_json::from_str(text)
        .map_err(|e| LegacyError::Decode(format!("account blob is not JSON: {}", e)))?;
    if !value.is_object() {
        return Err(LegacyError::Decode(
            "account blob is not a JSON object".to_string(),
        ));
    }

    if detect_convention(&value) == FieldConvention::Marked {
        value = rename_marked_fields(value);
    }
    if let Value::Object(map) = &mut value {
        drop_shadowed_aliases(map);
    }

    let mut record: AccountRecord = serde_json::from_value(value)
        .map_err(|e| LegacyError::Decode(format!("account structure: {}", e)))?;

    if record.account_id.is_empty() {
        if record.username.is_empty() || record.server_url.is_empty() {
            return Err(LegacyError::Decode(
                "record has no account id and no username/server url to derive one".to_string(),
            ));
        }
        record.account_id = account_id(&record.username, &record.server_url);
    }
    Ok(record)
}

/// Serializes under the current convention.
pub fn encode_account(record: &AccountRecord) -> Result<Vec<u8>, LegacyError> {
    Ok(serde_json::to_vec(record)?)
}
