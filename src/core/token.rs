//! Bearer token blobs stored in the `tokens` table.

use crate::core::error::LegacyError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub subject: String,
    /// The access token itself.
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Token {
    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.expiration_time.is_some_and(|t| t <= now_secs)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Refuses a token without a subject, the same input `decode_token` refuses.
pub fn encode_token(token: &Token) -> Result<String, LegacyError> {
    if token.subject.is_empty() {
        return Err(LegacyError::TokenDecode("token has no subject".to_string()));
    }
    serde_json::to_string(token).map_err(|e| LegacyError::TokenDecode(e.to_string()))
}

pub fn decode_token(encoded: &str) -> Result<Token, LegacyError> {
    let token: Token =
        serde_json::from_str(encoded).map_err(|e| LegacyError::TokenDecode(e.to_string()))?;
    if token.subject.is_empty() {
        return Err(LegacyError::TokenDecode("token has no subject".to_string()));
    }
    Ok(token)
}
