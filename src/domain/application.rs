use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of an application in the collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppKey {
    /// Namespace the application object lives in. Empty when the server omits it.
    pub namespace: String,
    /// Application name.
    pub name: String,
}

impl AppKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Object metadata of an application resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Full snapshot of an application as delivered by the backend.
///
/// Only the metadata is typed; `spec` and `status` are kept as raw JSON so the
/// client never drops fields it does not know about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub status: serde_json::Value,
}

impl Application {
    pub fn key(&self) -> AppKey {
        AppKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Sync status (`Synced`, `OutOfSync`, ...), `Unknown` when absent.
    pub fn sync_status(&self) -> &str {
        self.status
            .pointer("/sync/status")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
    }

    /// Health status (`Healthy`, `Degraded`, ...), `Unknown` when absent.
    pub fn health_status(&self) -> &str {
        self.status
            .pointer("/health/status")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
    }

    pub fn project(&self) -> &str {
        self.spec
            .get("project")
            .and_then(|v| v.as_str())
            .unwrap_or("default")
    }
}

/// Kind of change carried by a watch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventKind {
    Added,
    Modified,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchEventKind::Added => "ADDED",
            WatchEventKind::Modified => "MODIFIED",
            WatchEventKind::Deleted => "DELETED",
            WatchEventKind::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Server-pushed notification about one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub kind: WatchEventKind,
    pub application: Application,
}

/// Wire envelope of one event-stream message: `{"result": <WatchEvent>}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchEnvelope {
    pub result: WatchEvent,
}
