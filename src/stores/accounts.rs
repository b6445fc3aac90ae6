//! Read access to the v2 accounts store (`files/database.sqlite`).
//!
//! Three collections live in this file: serialized account records (`sessions`),
//! bearer tokens (`tokens`) and passwords of pre-Cells servers (`cookies`).
//! A row that cannot be decoded is logged and skipped; only store-level
//! failures abort a listing.

use crate::core::broker::DbBroker;
use crate::core::error::LegacyError;
use crate::core::migration::ACCOUNTS_PLAN;
use crate::core::model::AccountRecord;
use crate::core::password::LegacyCipher;
use crate::core::record_codec;
use crate::core::token::{self, Token};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

const ALL_ACCOUNTS: &str = "SELECT session_id, content FROM sessions ORDER BY rowid";
const ALL_TOKENS: &str = "SELECT session_id, jwt FROM tokens ORDER BY rowid";
const TOKENS_BY_ID: &str = "SELECT jwt FROM tokens WHERE session_id=?1 ORDER BY rowid DESC";
const ALL_PASSWORDS: &str = "SELECT user, password FROM cookies";
const PASSWORD_BY_ID: &str = "SELECT password FROM cookies WHERE user=?1";

pub struct LegacyAccountStore {
    broker: DbBroker,
    cipher: LegacyCipher,
}

/// `content` was written as a BLOB, but some builds stored it as TEXT.
fn content_bytes(value: ValueRef<'_>) -> Option<Vec<u8>> {
    match value {
        ValueRef::Blob(b) => Some(b.to_vec()),
        ValueRef::Text(t) => Some(t.to_vec()),
        _ => None,
    }
}

fn read_accounts(conn: &Connection) -> Result<Vec<AccountRecord>, LegacyError> {
    let mut stmt = conn.prepare(ALL_ACCOUNTS)?;
    let mut rows = stmt.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let session_id: Option<String> = row.get(0)?;
        let session_id = session_id.unwrap_or_default();
        let Some(raw) = content_bytes(row.get_ref(1)?) else {
            warn!(session_id = %session_id, "skipping account row without content");
            continue;
        };
        match record_codec::decode_account(&raw) {
            Ok(record) => records.push(record),
            Err(e) => warn!(session_id = %session_id, error = %e, "skipping undecodable account"),
        }
    }
    Ok(records)
}

impl LegacyAccountStore {
    pub fn open(path: &Path, cipher: LegacyCipher) -> Result<Self, LegacyError> {
        Ok(Self {
            broker: DbBroker::open(path, &ACCOUNTS_PLAN)?,
            cipher,
        })
    }

    pub fn path(&self) -> &Path {
        self.broker.path()
    }

    pub fn cipher(&self) -> &LegacyCipher {
        &self.cipher
    }

    /// All decodable account records, in store order.
    pub fn list_accounts(&self) -> Result<Vec<AccountRecord>, LegacyError> {
        self.broker.with_conn("accounts.list", read_accounts)
    }

    /// All decodable tokens by session id. A later row for the same key wins.
    pub fn list_tokens(&self) -> Result<HashMap<String, Token>, LegacyError> {
        self.broker.with_conn("tokens.list", |conn| {
            let mut stmt = conn.prepare(ALL_TOKENS)?;
            let mut rows = stmt.query([])?;
            let mut tokens = HashMap::new();
            while let Some(row) = rows.next()? {
                let key: String = row.get(0)?;
                let encoded: String = match row.get(1) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(session_id = %key, error = %e, "skipping non-text token");
                        continue;
                    }
                };
                match token::decode_token(&encoded) {
                    Ok(t) => {
                        tokens.insert(key, t);
                    }
                    Err(e) => warn!(session_id = %key, error = %e, "skipping undecodable token"),
                }
            }
            Ok(tokens)
        })
    }

    /// Newest decodable token for `key`; unreadable rows are skipped, as in `list_tokens`.
    pub fn get_token(&self, key: &str) -> Result<Option<Token>, LegacyError> {
        self.broker.with_conn("tokens.get", |conn| {
            let mut stmt = conn.prepare(TOKENS_BY_ID)?;
            let mut rows = stmt.query([key])?;
            while let Some(row) = rows.next()? {
                let encoded: String = match row.get(0) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(session_id = %key, error = %e, "skipping non-text token");
                        continue;
                    }
                };
                match token::decode_token(&encoded) {
                    Ok(t) => return Ok(Some(t)),
                    Err(e) => warn!(session_id = %key, error = %e, "skipping undecodable token"),
                }
            }
            Ok(None)
        })
    }

    /// Raw password values by user, still marker-prefixed where they were encrypted.
    pub fn list_passwords(&self) -> Result<HashMap<String, String>, LegacyError> {
        self.broker.with_conn("passwords.list", |conn| {
            let mut stmt = conn.prepare(ALL_PASSWORDS)?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?;
            let mut passwords = HashMap::new();
            for row in rows {
                let (user, password) = row?;
                match password {
                    Some(p) => {
                        passwords.insert(user, p);
                    }
                    None => warn!(user = %user, "skipping empty password row"),
                }
            }
            Ok(passwords)
        })
    }

    /// Password for `key` with legacy encryption resolved.
    pub fn get_password(&self, key: &str) -> Result<Option<String>, LegacyError> {
        let stored: Option<Option<String>> = self.broker.with_conn("passwords.get", |conn| {
            Ok(conn
                .query_row(PASSWORD_BY_ID, [key], |row| row.get(0))
                .optional()?)
        })?;
        Ok(self.cipher.resolve_password(stored.flatten().as_deref()))
    }
}
