//! Shared primitives for reading the v2 client's persisted state.
//!
//! Store-independent pieces live here: errors, configuration, the per-store
//! connection broker, schema definitions and the migrator, the record/token/
//! password codecs, the value model, and the watch coverage resolver.

pub mod broker;
pub mod config;
pub mod coverage;
pub mod db;
pub mod error;
pub mod migration;
pub mod model;
pub mod password;
pub mod record_codec;
pub mod schemas;
pub mod store;
pub mod token;
