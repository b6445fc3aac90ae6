//! The two legacy stores and the handle that owns them.

pub mod accounts;
pub mod snapshot;
pub mod watches;

use crate::core::config::MigrateConfig;
use crate::core::error::LegacyError;
use crate::core::password::LegacyCipher;
use crate::core::store::{Store, StoreKind};
use accounts::LegacyAccountStore;
use std::sync::{Mutex, OnceLock};
use tracing::info;
use watches::OfflineWatchStore;

/// Composition root for legacy state.
///
/// Built once by the application and passed by reference. Each store is opened
/// lazily on its first `init_*` call; later calls return the same instance, and
/// concurrent first calls still open the file only once.
pub struct LegacyStores {
    config: MigrateConfig,
    accounts: OnceLock<LegacyAccountStore>,
    watches: OnceLock<OfflineWatchStore>,
    init_lock: Mutex<()>,
}

impl LegacyStores {
    pub fn new(config: MigrateConfig) -> Self {
        Self {
            config,
            accounts: OnceLock::new(),
            watches: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    pub fn init_accounts(&self) -> Result<&LegacyAccountStore, LegacyError> {
        if let Some(store) = self.accounts.get() {
            return Ok(store);
        }
        let _guard = self
            .init_lock
            .lock()
            .map_err(|_| LegacyError::LockPoisoned("store init".to_string()))?;
        if let Some(store) = self.accounts.get() {
            return Ok(store);
        }
        let location = Store::resolve(StoreKind::Accounts, &self.config);
        let store =
            LegacyAccountStore::open(&location.path, LegacyCipher::from_config(&self.config))?;
        info!(path = %location.path.display(), "accounts store ready");
        Ok(self.accounts.get_or_init(|| store))
    }

    pub fn init_watches(&self) -> Result<&OfflineWatchStore, LegacyError> {
        if let Some(store) = self.watches.get() {
            return Ok(store);
        }
        let _guard = self
            .init_lock
            .lock()
            .map_err(|_| LegacyError::LockPoisoned("store init".to_string()))?;
        if let Some(store) = self.watches.get() {
            return Ok(store);
        }
        let location = Store::resolve(StoreKind::Watches, &self.config);
        let store = OfflineWatchStore::open(&location.path)?;
        info!(path = %location.path.display(), "watches store ready");
        Ok(self.watches.get_or_init(|| store))
    }

    pub fn init(&self) -> Result<(), LegacyError> {
        self.init_accounts()?;
        self.init_watches()?;
        Ok(())
    }

    pub fn accounts(&self) -> Result<&LegacyAccountStore, LegacyError> {
        self.accounts
            .get()
            .ok_or(LegacyError::NotInitialized(StoreKind::Accounts.label()))
    }

    pub fn watches(&self) -> Result<&OfflineWatchStore, LegacyError> {
        self.watches
            .get()
            .ok_or(LegacyError::NotInitialized(StoreKind::Watches.label()))
    }
}
