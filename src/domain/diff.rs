use serde::{Deserialize, Serialize};

/// View options in effect for a diff view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffViewOptions {
    /// Limit context around changes instead of showing the whole manifest.
    pub compact_diff: bool,
    /// Render unified (inline) instead of side by side.
    pub inline_diff: bool,
}

/// One unit of diff work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffJob {
    /// Stable identifier of the resource; also used as the synthetic file path.
    pub id: String,
    /// Live manifest text.
    pub before: String,
    /// Target manifest text.
    pub after: String,
    /// Display name shown in the file header.
    pub name: String,
    /// Lifecycle hooks are rendered with a badge and never hidden.
    pub is_hook: bool,
    /// Options captured when the job was enqueued.
    pub options: DiffViewOptions,
}

impl DiffJob {
    pub fn new(id: impl Into<String>, before: impl Into<String>, after: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            before: before.into(),
            after: after.into(),
            is_hook: false,
            options: DiffViewOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DiffViewOptions) -> Self {
        self.options = options;
        self
    }

    pub fn is_unchanged(&self) -> bool {
        self.before == self.after
    }
}

/// A managed resource with its live and desired manifests, as returned by the
/// backend's managed-resources endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDiff {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    /// Live object as stored in the cluster.
    #[serde(default)]
    pub live_state: Option<serde_json::Value>,
    /// Desired object rendered from the source of truth.
    #[serde(default)]
    pub target_state: Option<serde_json::Value>,
    /// Live object after the server applied its normalizations.
    #[serde(default)]
    pub normalized_live_state: Option<serde_json::Value>,
    /// What the live object will look like once the target is applied.
    #[serde(default)]
    pub predicted_live_state: Option<serde_json::Value>,
    #[serde(default)]
    pub hook: bool,
    #[serde(default)]
    pub modified: bool,
}

impl ResourceDiff {
    /// `group/kind/namespace/name`, skipping empty segments.
    pub fn display_name(&self) -> String {
        [&self.group, &self.kind, &self.namespace, &self.name]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}
