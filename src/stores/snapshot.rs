//! Everything the current-generation storage needs to import, gathered in one pass.

use crate::core::error::LegacyError;
use crate::core::model::{AccountRecord, WatchInfo};
use crate::core::token::Token;
use crate::stores::LegacyStores;
use serde::Serialize;
use tracing::{info, warn};

const REDACTED: &str = "********";

#[derive(Debug, Clone, Serialize)]
pub struct AccountHandoff {
    pub record: AccountRecord,
    /// Bearer token of a Cells account.
    pub token: Option<Token>,
    /// Resolved password of a legacy (P8) account.
    pub password: Option<String>,
    pub watches: Vec<WatchInfo>,
}

impl AccountHandoff {
    pub fn has_credentials(&self) -> bool {
        self.token.is_some() || self.password.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LegacySnapshot {
    pub accounts: Vec<AccountHandoff>,
    pub offline_roots: usize,
    pub without_credentials: usize,
}

impl LegacySnapshot {
    /// Reads both stores. Legacy accounts carry a password and no offline roots;
    /// Cells accounts carry their token and every watch registered for them.
    pub fn collect(stores: &LegacyStores) -> Result<Self, LegacyError> {
        let account_store = stores.accounts()?;
        let watch_store = stores.watches()?;

        let records = account_store.list_accounts()?;
        if records.is_empty() {
            warn!("no account found, nothing to migrate");
            return Ok(Self::default());
        }
        let mut tokens = account_store.list_tokens()?;

        let mut snapshot = Self::default();
        for record in records {
            let handoff = if record.legacy {
                AccountHandoff {
                    password: account_store.get_password(&record.account_id)?,
                    token: None,
                    watches: Vec::new(),
                    record,
                }
            } else {
                let watches = watch_store.list_watches_for_account(&record.account_id)?;
                snapshot.offline_roots += watches.len();
                AccountHandoff {
                    token: tokens.remove(&record.account_id),
                    password: None,
                    watches,
                    record,
                }
            };
            if !handoff.has_credentials() {
                snapshot.without_credentials += 1;
                info!(account = %handoff.record.account_id, "no stored credentials, account will need a new login");
            }
            snapshot.accounts.push(handoff);
        }

        info!(
            accounts = snapshot.accounts.len(),
            offline_roots = snapshot.offline_roots,
            "legacy snapshot collected"
        );
        Ok(snapshot)
    }

    /// Copy safe to print: secrets are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for account in &mut copy.accounts {
            if account.password.is_some() {
                account.password = Some(REDACTED.to_string());
            }
            if let Some(token) = account.token.as_mut() {
                token.value = REDACTED.to_string();
                if token.refresh_token.is_some() {
                    token.refresh_token = Some(REDACTED.to_string());
                }
                if token.id_token.is_some() {
                    token.id_token = Some(REDACTED.to_string());
                }
            }
        }
        copy
    }
}
