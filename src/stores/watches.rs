//! The v2 offline-roots store (`files/sync.sqlite`).
//!
//! `watched` holds one row per offline root; `stats` and `errors` are sidecars
//! keyed by the same (session_id, workspace_slug, path) triple and hold at most
//! one row per key. Opening a v1 file upgrades it to v2 first.

use crate::core::broker::DbBroker;
use crate::core::coverage::{self, WatchState};
use crate::core::error::LegacyError;
use crate::core::migration::WATCHES_PLAN;
use crate::core::model::{
    ErrorKind, ErrorPayload, NodeDescriptor, SyncError, SyncStats, WatchInfo, WatchKey,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, warn};

const SELECT_WATCHES: &str = "SELECT session_id, workspace_slug, path, workspace_label, encoded, \
     add_time, last_sync_time, active FROM watched";

const KEY_CLAUSE: &str = "session_id=?1 AND workspace_slug=?2 AND path=?3";

/// A `watched` row before its descriptor and sidecars are decoded.
struct RawWatch {
    key: WatchKey,
    workspace_label: Option<String>,
    encoded: String,
    add_time: Option<i64>,
    last_sync_time: Option<i64>,
    active: Option<i64>,
}

impl RawWatch {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: WatchKey {
                account_id: row.get(0)?,
                workspace_slug: row.get(1)?,
                path: row.get(2)?,
            },
            workspace_label: row.get(3)?,
            encoded: row.get(4)?,
            add_time: row.get(5)?,
            last_sync_time: row.get(6)?,
            active: row.get(7)?,
        })
    }
}

fn hydrate(conn: &Connection, raw: RawWatch) -> Result<Option<WatchInfo>, LegacyError> {
    let node: NodeDescriptor = match serde_json::from_str(&raw.encoded) {
        Ok(node) => node,
        Err(e) => {
            warn!(key = ?raw.key, error = %e, "skipping watch with undecodable node");
            return Ok(None);
        }
    };
    let last_stats = read_stats(conn, &raw.key)?;
    let last_error = read_error(conn, &raw.key)?;
    Ok(Some(WatchInfo {
        workspace_label: raw.workspace_label.unwrap_or_default(),
        node,
        add_time: raw.add_time.unwrap_or(0),
        last_sync_time: raw.last_sync_time.unwrap_or(0),
        active: raw.active.unwrap_or(1) == 1,
        last_stats,
        last_error,
        key: raw.key,
    }))
}

fn read_watches<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<WatchInfo>, LegacyError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut raws = Vec::new();
    while let Some(row) = rows.next()? {
        match RawWatch::from_row(row) {
            Ok(raw) => raws.push(raw),
            Err(e) => {
                let path: Option<String> = row.get(2).ok();
                warn!(path = ?path, error = %e, "skipping unreadable watch row");
            }
        }
    }
    let mut out = Vec::with_capacity(raws.len());
    for raw in raws {
        if let Some(info) = hydrate(conn, raw)? {
            out.push(info);
        }
    }
    Ok(out)
}

fn has_row(conn: &Connection, table: &str, key: &WatchKey) -> Result<bool, LegacyError> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE {} LIMIT 1", table, KEY_CLAUSE),
            params![key.account_id, key.workspace_slug, key.path],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn read_stats(conn: &Connection, key: &WatchKey) -> Result<Option<SyncStats>, LegacyError> {
    let encoded: Option<Option<String>> = conn
        .query_row(
            &format!("SELECT encoded_stats FROM stats WHERE {} LIMIT 1", KEY_CLAUSE),
            params![key.account_id, key.workspace_slug, key.path],
            |row| row.get(0),
        )
        .optional()?;
    let Some(encoded) = encoded.flatten() else {
        return Ok(None);
    };
    match serde_json::from_str(&encoded) {
        Ok(stats) => Ok(Some(stats)),
        Err(e) => {
            warn!(key = ?key, error = %e, "ignoring undecodable stats");
            Ok(None)
        }
    }
}

fn read_error(conn: &Connection, key: &WatchKey) -> Result<Option<SyncError>, LegacyError> {
    let row: Option<(i64, Option<String>)> = conn
        .query_row(
            &format!(
                "SELECT action_code, encoded_error FROM errors WHERE {} ORDER BY rowid DESC LIMIT 1",
                KEY_CLAUSE
            ),
            params![key.account_id, key.workspace_slug, key.path],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((action, encoded)) = row else {
        return Ok(None);
    };
    let Some(encoded) = encoded else {
        // v1 rows recorded that a run failed, not why.
        return Ok(Some(SyncError {
            action,
            error: ErrorPayload {
                kind: ErrorKind::Unknown,
                message: String::new(),
                cause: None,
            },
        }));
    };
    match serde_json::from_str::<SyncError>(&encoded) {
        Ok(mut err) => {
            err.action = action;
            Ok(Some(err))
        }
        Err(e) => {
            warn!(key = ?key, error = %e, "ignoring undecodable error payload");
            Ok(None)
        }
    }
}

fn write_stats(conn: &Connection, key: &WatchKey, stats: Option<&SyncStats>) -> Result<(), LegacyError> {
    let Some(stats) = stats else {
        conn.execute(
            &format!("DELETE FROM stats WHERE {}", KEY_CLAUSE),
            params![key.account_id, key.workspace_slug, key.path],
        )?;
        return Ok(());
    };
    let encoded = serde_json::to_string(stats)?;
    if has_row(conn, "stats", key)? {
        conn.execute(
            "UPDATE stats SET encoded_stats=?4 WHERE session_id=?1 AND workspace_slug=?2 AND path=?3",
            params![key.account_id, key.workspace_slug, key.path, encoded],
        )?;
    } else {
        conn.execute(
            "INSERT INTO stats (session_id, workspace_slug, path, encoded_stats) VALUES (?1, ?2, ?3, ?4)",
            params![key.account_id, key.workspace_slug, key.path, encoded],
        )?;
    }
    Ok(())
}

fn write_error(conn: &Connection, key: &WatchKey, error: Option<&SyncError>) -> Result<(), LegacyError> {
    let Some(error) = error else {
        conn.execute(
            &format!("DELETE FROM errors WHERE {}", KEY_CLAUSE),
            params![key.account_id, key.workspace_slug, key.path],
        )?;
        return Ok(());
    };
    let encoded = serde_json::to_string(error)?;
    if has_row(conn, "errors", key)? {
        conn.execute(
            "UPDATE errors SET action_code=?4, encoded_error=?5 \
             WHERE session_id=?1 AND workspace_slug=?2 AND path=?3",
            params![key.account_id, key.workspace_slug, key.path, error.action, encoded],
        )?;
    } else {
        conn.execute(
            "INSERT INTO errors (session_id, workspace_slug, path, action_code, encoded_error) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key.account_id, key.workspace_slug, key.path, error.action, encoded],
        )?;
    }
    Ok(())
}

fn watched_paths(conn: &Connection, account_id: &str, workspace_slug: &str) -> Result<Vec<String>, LegacyError> {
    let mut stmt = conn.prepare(
        "SELECT path FROM watched WHERE session_id=?1 AND workspace_slug=?2 ORDER BY path",
    )?;
    let paths = stmt
        .query_map(params![account_id, workspace_slug], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(paths)
}

pub struct OfflineWatchStore {
    broker: DbBroker,
}

impl OfflineWatchStore {
    pub fn open(path: &Path) -> Result<Self, LegacyError> {
        Ok(Self {
            broker: DbBroker::open(path, &WATCHES_PLAN)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.broker.path()
    }

    pub fn list_active_watches(&self) -> Result<Vec<WatchInfo>, LegacyError> {
        self.broker.with_conn("watches.list_active", |conn| {
            read_watches(
                conn,
                &format!("{} WHERE active=1 ORDER BY rowid", SELECT_WATCHES),
                [],
            )
        })
    }

    pub fn list_all_watches(&self) -> Result<Vec<WatchInfo>, LegacyError> {
        self.broker.with_conn("watches.list_all", |conn| {
            read_watches(conn, &format!("{} ORDER BY rowid", SELECT_WATCHES), [])
        })
    }

    /// Every watch of the account, active or retired.
    pub fn list_watches_for_account(&self, account_id: &str) -> Result<Vec<WatchInfo>, LegacyError> {
        self.broker.with_conn("watches.list_for_account", |conn| {
            read_watches(
                conn,
                &format!("{} WHERE session_id=?1 ORDER BY rowid", SELECT_WATCHES),
                [account_id],
            )
        })
    }

    pub fn get_watch(&self, key: &WatchKey) -> Result<Option<WatchInfo>, LegacyError> {
        self.broker.with_conn("watches.get", |conn| {
            let found = read_watches(
                conn,
                &format!("{} WHERE {} LIMIT 1", SELECT_WATCHES, KEY_CLAUSE),
                params![key.account_id, key.workspace_slug, key.path],
            )?;
            Ok(found.into_iter().next())
        })
    }

    pub fn watch_state(
        &self,
        account_id: &str,
        workspace_slug: &str,
        path: &str,
    ) -> Result<WatchState, LegacyError> {
        self.broker.with_conn("watches.state", |conn| {
            let roots = watched_paths(conn, account_id, workspace_slug)?;
            Ok(coverage::resolve_watch_state(path, &roots))
        })
    }

    /// Registers `info` unless its path is already covered, then replaces its
    /// stats and error sidecars. Returns the coverage state found before insertion.
    pub fn add_watch(&self, info: &WatchInfo) -> Result<WatchState, LegacyError> {
        let encoded = serde_json::to_string(&info.node)?;
        self.broker.with_conn("watches.add", |conn| {
            let tx = conn.unchecked_transaction()?;
            let key = &info.key;
            let roots = watched_paths(&tx, &key.account_id, &key.workspace_slug)?;
            let state = coverage::resolve_watch_state(&key.path, &roots);
            if state == WatchState::NotWatched {
                tx.execute(
                    "INSERT INTO watched (session_id, workspace_slug, path, workspace_label, encoded, \
                     add_time, last_sync_time, active) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        key.account_id,
                        key.workspace_slug,
                        key.path,
                        info.workspace_label,
                        encoded,
                        info.add_time,
                        info.last_sync_time,
                        i64::from(info.active),
                    ],
                )?;
            } else {
                debug!(key = ?key, ?state, "path already covered, not inserting");
            }
            write_stats(&tx, key, info.last_stats.as_ref())?;
            write_error(&tx, key, info.last_error.as_ref())?;
            tx.commit()?;
            Ok(state)
        })
    }

    /// Insert-or-update the stats of `key`; `None` removes them.
    pub fn set_stats(&self, key: &WatchKey, stats: Option<&SyncStats>) -> Result<(), LegacyError> {
        self.broker
            .with_conn("stats.set", |conn| write_stats(conn, key, stats))
    }

    pub fn get_stats(&self, key: &WatchKey) -> Result<Option<SyncStats>, LegacyError> {
        self.broker.with_conn("stats.get", |conn| read_stats(conn, key))
    }

    /// Insert-or-update the error of `key`; `None` removes it.
    pub fn set_error(&self, key: &WatchKey, error: Option<&SyncError>) -> Result<(), LegacyError> {
        self.broker
            .with_conn("errors.set", |conn| write_error(conn, key, error))
    }

    pub fn get_error(&self, key: &WatchKey) -> Result<Option<SyncError>, LegacyError> {
        self.broker.with_conn("errors.get", |conn| read_error(conn, key))
    }

    /// Clears the error of `key` and of every path below it.
    pub fn delete_error(&self, key: &WatchKey) -> Result<usize, LegacyError> {
        let prefix = format!("{}/", key.path.trim_end_matches('/'));
        self.broker.with_conn("errors.delete", |conn| {
            let mut removed = conn.execute(
                &format!("DELETE FROM errors WHERE {}", KEY_CLAUSE),
                params![key.account_id, key.workspace_slug, key.path],
            )?;
            removed += conn.execute(
                "DELETE FROM errors WHERE session_id=?1 AND workspace_slug=?2 \
                 AND substr(path, 1, length(?3))=?3",
                params![key.account_id, key.workspace_slug, prefix],
            )?;
            Ok(removed)
        })
    }

    /// Removes the watch row and both sidecars. Returns whether a watch existed.
    pub fn delete_watch(&self, key: &WatchKey) -> Result<bool, LegacyError> {
        self.broker.with_conn("watches.delete", |conn| {
            let tx = conn.unchecked_transaction()?;
            let args = params![key.account_id, key.workspace_slug, key.path];
            let removed = tx.execute(&format!("DELETE FROM watched WHERE {}", KEY_CLAUSE), args)?;
            tx.execute(&format!("DELETE FROM stats WHERE {}", KEY_CLAUSE), args)?;
            tx.execute(&format!("DELETE FROM errors WHERE {}", KEY_CLAUSE), args)?;
            tx.commit()?;
            Ok(removed > 0)
        })
    }

    pub fn activate_for_account(&self, account_id: &str) -> Result<usize, LegacyError> {
        self.broker.with_conn("watches.activate", |conn| {
            Ok(conn.execute(
                "UPDATE watched SET active=1 WHERE session_id=?1 AND active=0",
                [account_id],
            )?)
        })
    }

    pub fn deactivate_for_account(&self, account_id: &str) -> Result<usize, LegacyError> {
        self.broker.with_conn("watches.deactivate", |conn| {
            Ok(conn.execute(
                "UPDATE watched SET active=0 WHERE session_id=?1 AND active=1",
                [account_id],
            )?)
        })
    }

    pub fn is_active(&self, key: &WatchKey) -> Result<bool, LegacyError> {
        self.broker.with_conn("watches.is_active", |conn| {
            let active: Option<Option<i64>> = conn
                .query_row(
                    &format!("SELECT active FROM watched WHERE {}", KEY_CLAUSE),
                    params![key.account_id, key.workspace_slug, key.path],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(active.flatten() == Some(1))
        })
    }

    pub fn set_last_sync_time(&self, key: &WatchKey, time: i64) -> Result<bool, LegacyError> {
        self.broker.with_conn("watches.set_last_sync", |conn| {
            let updated = conn.execute(
                "UPDATE watched SET last_sync_time=?4 WHERE session_id=?1 AND workspace_slug=?2 AND path=?3",
                params![key.account_id, key.workspace_slug, key.path, time],
            )?;
            Ok(updated > 0)
        })
    }

    /// Drops every watch, stat and error of the account. Returns removed watches.
    pub fn delete_for_account(&self, account_id: &str) -> Result<usize, LegacyError> {
        self.broker.with_conn("watches.delete_for_account", |conn| {
            let tx = conn.unchecked_transaction()?;
            let removed = tx.execute("DELETE FROM watched WHERE session_id=?1", [account_id])?;
            tx.execute("DELETE FROM errors WHERE session_id=?1", [account_id])?;
            tx.execute("DELETE FROM stats WHERE session_id=?1", [account_id])?;
            tx.commit()?;
            Ok(removed)
        })
    }

    pub fn update_account_id(&self, old_id: &str, new_id: &str) -> Result<usize, LegacyError> {
        self.broker.with_conn("watches.rename_account", |conn| {
            let tx = conn.unchecked_transaction()?;
            let moved = tx.execute(
                "UPDATE watched SET session_id=?2 WHERE session_id=?1",
                [old_id, new_id],
            )?;
            tx.execute("UPDATE errors SET session_id=?2 WHERE session_id=?1", [old_id, new_id])?;
            tx.execute("UPDATE stats SET session_id=?2 WHERE session_id=?1", [old_id, new_id])?;
            tx.commit()?;
            Ok(moved)
        })
    }
}
