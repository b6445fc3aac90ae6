//! Schema generations and the forward-only migrator.
//!
//! Each store declares a [`SchemaPlan`]: the tables of its target generation and
//! the ordered transitions that bring an older file up to it. The generation is
//! tracked in `PRAGMA user_version`, the same slot the client's open helper used.
//!
//! - **Forward only**: a file newer than the plan is refused, never downgraded
//! - **Idempotent transitions**: every step is guarded, re-running is a no-op
//! - **Data, not SQL**: steps reference [`TableDef`]/[`ColumnDef`] values

use crate::core::db;
use crate::core::error::LegacyError;
use crate::core::schemas::{self, ColumnDef, TableDef};
use rusqlite::Connection;
use tracing::info;

pub enum SchemaStep {
    CreateTable(&'static TableDef),
    AddColumn {
        table: &'static str,
        column: &'static ColumnDef,
    },
}

/// A single forward edge `from -> to` of the version state machine.
pub struct Transition {
    pub from: u32,
    pub to: u32,
    pub description: &'static str,
    pub steps: &'static [SchemaStep],
}

pub struct SchemaPlan {
    pub name: &'static str,
    pub version: u32,
    pub tables: &'static [&'static TableDef],
    pub transitions: &'static [Transition],
}

pub const ACCOUNTS_PLAN: SchemaPlan = SchemaPlan {
    name: "accounts",
    version: 1,
    tables: &[
        &schemas::SESSIONS,
        &schemas::TOKENS,
        &schemas::COOKIES,
        &schemas::INDEX_GROUP,
    ],
    transitions: &[],
};

pub const WATCHES_V1: u32 = 1;
pub const WATCHES_V2: u32 = 2;

pub const WATCHES_PLAN: SchemaPlan = SchemaPlan {
    name: "watches",
    version: WATCHES_V2,
    tables: &[&schemas::WATCHED, &schemas::STATS, &schemas::ERRORS],
    transitions: &[Transition {
        from: WATCHES_V1,
        to: WATCHES_V2,
        description: "add stats table and structured error payload",
        steps: &[
            SchemaStep::CreateTable(&schemas::STATS),
            SchemaStep::AddColumn {
                table: "errors",
                column: &schemas::ENCODED_ERROR,
            },
        ],
    }],
};

pub fn apply_step(conn: &Connection, step: &SchemaStep) -> Result<(), LegacyError> {
    match step {
        SchemaStep::CreateTable(table) => db::create_table(conn, table),
        SchemaStep::AddColumn { table, column } => db::add_column(conn, table, column),
    }
}

/// Applies every step of `transition`. Safe to call on an already-upgraded store.
pub fn apply_transition(conn: &Connection, transition: &Transition) -> Result<(), LegacyError> {
    for step in transition.steps {
        apply_step(conn, step)?;
    }
    Ok(())
}

pub struct SchemaMigrator<'a> {
    plan: &'a SchemaPlan,
}

impl<'a> SchemaMigrator<'a> {
    pub fn new(plan: &'a SchemaPlan) -> Self {
        Self { plan }
    }

    /// Brings `conn` to the plan's version and returns the generation it started at
    /// (0 for a freshly created file).
    pub fn migrate(&self, conn: &mut Connection) -> Result<u32, LegacyError> {
        let plan = self.plan;
        let stored = db::user_version(conn)?;

        if stored > plan.version {
            return Err(LegacyError::Schema(format!(
                "{} store is at version {}, newer than supported {}",
                plan.name, stored, plan.version
            )));
        }
        if stored == plan.version {
            return Ok(stored);
        }

        let tx = conn.transaction()?;
        if stored == 0 && !db::has_any_table(&tx)? {
            info!(store = plan.name, version = plan.version, "creating schema");
            db::create_tables(&tx, plan.tables)?;
        } else {
            // Tables without a recorded version predate versioning: treat as v1.
            let mut current = stored.max(1);
            for transition in plan.transitions {
                if transition.from < current {
                    continue;
                }
                if transition.from != current {
                    return Err(LegacyError::Schema(format!(
                        "{} store has no transition from version {}",
                        plan.name, current
                    )));
                }
                info!(
                    store = plan.name,
                    from = transition.from,
                    to = transition.to,
                    "{}",
                    transition.description
                );
                apply_transition(&tx, transition)?;
                current = transition.to;
            }
            if current != plan.version {
                return Err(LegacyError::Schema(format!(
                    "{} store stopped at version {}, expected {}",
                    plan.name, current, plan.version
                )));
            }
        }
        db::set_user_version(&tx, plan.version)?;
        tx.commit()?;
        Ok(stored)
    }
}
