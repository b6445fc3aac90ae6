//! Table definitions for the two legacy SQLite stores.
//!
//! The client shipped two independent databases under its private data directory:
//! 1. `files/database.sqlite`: account blobs, bearer tokens and legacy passwords.
//! 2. `files/sync.sqlite`: offline roots with their last-run stats and errors.
//!
//! DDL is generated from these definitions so that fresh stores and upgrade
//! transitions can never drift apart.

pub const ACCOUNTS_DB_PATH: &str = "files/database.sqlite";
pub const WATCHES_DB_PATH: &str = "files/sync.sqlite";

/// One column of a table: name, SQL type and trailing constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub constraints: &'static str,
}

const fn col(name: &'static str, sql_type: &'static str, constraints: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        constraints,
    }
}

impl ColumnDef {
    pub fn ddl(&self) -> String {
        let mut out = format!("`{}` {}", self.name, self.sql_type);
        if !self.constraints.is_empty() {
            out.push(' ');
            out.push_str(self.constraints);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    /// Columns forming a table-level UNIQUE constraint, if any.
    pub unique: &'static [&'static str],
}

impl TableDef {
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDef::ddl).collect();
        if !self.unique.is_empty() {
            let cols: Vec<String> = self.unique.iter().map(|c| format!("`{}`", c)).collect();
            parts.push(format!("UNIQUE ({})", cols.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS `{}` ({})",
            self.name,
            parts.join(", ")
        )
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

// --- 1. Accounts store ---

pub const SESSIONS: TableDef = TableDef {
    name: "sessions",
    columns: &[
        col("session_id", "TEXT", "NOT NULL"),
        col("content", "BLOB", "NOT NULL"),
    ],
    unique: &[],
};

pub const TOKENS: TableDef = TableDef {
    name: "tokens",
    columns: &[
        col("session_id", "TEXT", "NOT NULL"),
        col("jwt", "TEXT", "NOT NULL"),
    ],
    unique: &[],
};

pub const COOKIES: TableDef = TableDef {
    name: "cookies",
    columns: &[
        col("user", "TEXT", "PRIMARY KEY NOT NULL"),
        col("password", "TEXT", ""),
    ],
    unique: &[],
};

pub const INDEX_GROUP: TableDef = TableDef {
    name: "index_group",
    columns: &[
        col("workspace_id", "TEXT", "NOT NULL"),
        col("path", "TEXT", "NOT NULL"),
        col("change_seq", "INTEGER", "DEFAULT 0"),
    ],
    unique: &["workspace_id", "path"],
};

// --- 2. Watch store ---

pub const WATCHED: TableDef = TableDef {
    name: "watched",
    columns: &[
        col("session_id", "VARCHAR(255)", "NOT NULL"),
        col("workspace_slug", "VARCHAR(255)", "NOT NULL"),
        col("path", "TEXT", "NOT NULL"),
        col("workspace_label", "VARCHAR(255)", ""),
        col("encoded", "TEXT", "NOT NULL"),
        col("add_time", "INT", ""),
        col("last_sync_time", "INT", ""),
        col("active", "INT(1)", "DEFAULT 1"),
    ],
    unique: &[],
};

pub const STATS: TableDef = TableDef {
    name: "stats",
    columns: &[
        col("session_id", "VARCHAR(255)", "NOT NULL"),
        col("workspace_slug", "VARCHAR(255)", "NOT NULL"),
        col("path", "TEXT", "NOT NULL"),
        col("encoded_stats", "TEXT", ""),
    ],
    unique: &[],
};

/// Structured error payload column introduced by watch schema v2.
pub const ENCODED_ERROR: ColumnDef = col("encoded_error", "TEXT", "");

/// v1 error rows only carried a bare timestamp.
pub const ERRORS_V1: TableDef = TableDef {
    name: "errors",
    columns: &[
        col("session_id", "VARCHAR(255)", "NOT NULL"),
        col("workspace_slug", "VARCHAR(255)", "NOT NULL"),
        col("path", "TEXT", "NOT NULL"),
        col("action_code", "INTEGER", "NOT NULL"),
        col("time", "INTEGER", ""),
    ],
    unique: &[],
};

pub const ERRORS: TableDef = TableDef {
    name: "errors",
    columns: &[
        col("session_id", "VARCHAR(255)", "NOT NULL"),
        col("workspace_slug", "VARCHAR(255)", "NOT NULL"),
        col("path", "TEXT", "NOT NULL"),
        col("action_code", "INTEGER", "NOT NULL"),
        ENCODED_ERROR,
    ],
    unique: &[],
};

/// Tables of a watch store as the first client generation created them.
pub const WATCHES_V1_TABLES: &[&TableDef] = &[&WATCHED, &ERRORS_V1];
