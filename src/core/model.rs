//! Normalized value objects handed to the current-generation storage layer.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Cached workspace as the remote API described it. Only the slug and label are
/// interpreted; every other key is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDescriptor {
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server connection details that older records stored next to the account fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    #[serde(rename = "iconURL", default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Value>>,
}

/// One account as persisted in the `sessions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(rename = "accountID", default)]
    pub account_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(alias = "url", default)]
    pub server_url: String,
    #[serde(alias = "sslUnverified", default)]
    pub skip_verify: bool,
    /// Pre-Cells (P8) server, authenticated by password rather than token.
    #[serde(default)]
    pub legacy: bool,
    #[serde(alias = "label", default, skip_serializing_if = "Option::is_none")]
    pub server_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cached_workspaces: BTreeMap<String, WorkspaceDescriptor>,
    #[serde(flatten)]
    pub server: ServerInfo,
}

impl AccountRecord {
    pub fn cached_workspace(&self, slug: &str) -> Option<&WorkspaceDescriptor> {
        self.cached_workspaces.get(slug)
    }

    pub fn has_workspaces_loaded(&self) -> bool {
        !self.cached_workspaces.is_empty()
    }
}

/// Remote node a watch points at, decoded from the `encoded` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    #[serde(alias = "workspace", default, skip_serializing_if = "Option::is_none")]
    pub workspace_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Identity of a watched root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchKey {
    pub account_id: String,
    pub workspace_slug: String,
    pub path: String,
}

impl WatchKey {
    pub fn new(account_id: &str, workspace_slug: &str, path: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            workspace_slug: workspace_slug.to_string(),
            path: path.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncStats {
    pub deleted: i32,
    pub created: i32,
    pub updated: i32,
    pub failures: i32,
    pub total: i32,
    pub deleted_size: i64,
    pub downloaded_size: i64,
    pub total_size: i64,
    /// Run duration in milliseconds.
    pub time: i64,
}

/// Failure category of a sync run. Serialized by name; the v2 client wrote the
/// numeric code, so both forms decode. Anything unrecognized is `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorKind {
    #[default]
    Unknown = 0,
    Internal = 1,
    Cancelled = 2,
    Stats = 3,
    UnsupportedServer = 10,
    RemoteNotFound = 11,
    NotConnected = 12,
    UploadFailed = 13,
    DeviceRead = 20,
    DeviceWrite = 21,
    NoEnoughSpace = 22,
    DatabaseWrite = 23,
    CacheReading = 24,
    CacheWriting = 25,
    Authentication = 30,
    AuthenticateWithChallenge = 31,
    ConnectionFailed = 32,
    SslError = 33,
    ServerSslNotVerified = 34,
    NoToken = 35,
    TokenExpired = 36,
    UnexpectedContent = 40,
    FileContentLoading = 41,
    DownloadReading = 42,
    DownloadWriting = 43,
    DownloadOnCellular = 44,
    ServiceNotAvailable = 45,
}

const ERROR_KIND_NAMES: &[(ErrorKind, &str)] = &[
    (ErrorKind::Unknown, "unknown"),
    (ErrorKind::Internal, "internal"),
    (ErrorKind::Cancelled, "cancelled"),
    (ErrorKind::Stats, "stats"),
    (ErrorKind::UnsupportedServer, "unsupported_server"),
    (ErrorKind::RemoteNotFound, "remote_not_found"),
    (ErrorKind::NotConnected, "not_connected"),
    (ErrorKind::UploadFailed, "upload_failed"),
    (ErrorKind::DeviceRead, "device_read"),
    (ErrorKind::DeviceWrite, "device_write"),
    (ErrorKind::NoEnoughSpace, "no_enough_space"),
    (ErrorKind::DatabaseWrite, "database_write"),
    (ErrorKind::CacheReading, "cache_reading"),
    (ErrorKind::CacheWriting, "cache_writing"),
    (ErrorKind::Authentication, "authentication"),
    (ErrorKind::AuthenticateWithChallenge, "authenticate_with_challenge"),
    (ErrorKind::ConnectionFailed, "connection_failed"),
    (ErrorKind::SslError, "ssl_error"),
    (ErrorKind::ServerSslNotVerified, "server_ssl_not_verified"),
    (ErrorKind::NoToken, "no_token"),
    (ErrorKind::TokenExpired, "token_expired"),
    (ErrorKind::UnexpectedContent, "unexpected_content"),
    (ErrorKind::FileContentLoading, "file_content_loading"),
    (ErrorKind::DownloadReading, "download_reading"),
    (ErrorKind::DownloadWriting, "download_writing"),
    (ErrorKind::DownloadOnCellular, "download_on_cellular"),
    (ErrorKind::ServiceNotAvailable, "service_not_available"),
];

impl ErrorKind {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES
            .iter()
            .find(|(k, _)| *k == self)
            .map_or("unknown", |(_, n)| *n)
    }

    pub fn from_code(code: i64) -> Self {
        ERROR_KIND_NAMES
            .iter()
            .find(|(k, _)| i64::from(k.code()) == code)
            .map_or(ErrorKind::Unknown, |(k, _)| *k)
    }

    pub fn from_name(name: &str) -> Self {
        ERROR_KIND_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map_or(ErrorKind::Unknown, |(k, _)| *k)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorKindRepr {
    Code(i64),
    Name(String),
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match ErrorKindRepr::deserialize(deserializer)? {
            ErrorKindRepr::Code(code) => ErrorKind::from_code(code),
            ErrorKindRepr::Name(name) => ErrorKind::from_name(&name),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(alias = "type", default, deserialize_with = "null_as_default")]
    pub kind: ErrorKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorPayload>>,
}

/// Outcome of the last failed run on a watched root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    pub action: i64,
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchInfo {
    pub key: WatchKey,
    pub workspace_label: String,
    pub node: NodeDescriptor,
    pub add_time: i64,
    pub last_sync_time: i64,
    pub active: bool,
    pub last_stats: Option<SyncStats>,
    pub last_error: Option<SyncError>,
}

impl WatchInfo {
    pub fn new(key: WatchKey, workspace_label: &str, node: NodeDescriptor, add_time: i64) -> Self {
        Self {
            key,
            workspace_label: workspace_label.to_string(),
            node,
            add_time,
            last_sync_time: 0,
            active: true,
            last_stats: None,
            last_error: None,
        }
    }

    /// `/<workspace-slug><path>`, the address the current schema keys nodes by.
    pub fn full_path(&self) -> String {
        let path = if self.key.path.starts_with('/') {
            self.key.path.clone()
        } else {
            format!("/{}", self.key.path)
        };
        format!("/{}{}", self.key.workspace_slug, path)
    }
}
