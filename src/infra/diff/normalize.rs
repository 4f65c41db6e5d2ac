//! Renders resource manifests into the text the diff engine compares.

use crate::domain::{DiffError, DiffJob, DiffViewOptions, ResourceDiff};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SERVER_METADATA_FIELDS: &[&str] = &[
    "uid",
    "resourceVersion",
    "generation",
    "creationTimestamp",
    "selfLink",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Drop `metadata.managedFields`.
    pub hide_managed_fields: bool,
    /// Drop fields the API server fills in and top-level `status`.
    pub strip_server_fields: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            hide_managed_fields: true,
            strip_server_fields: false,
        }
    }
}

fn strip(value: &mut Value, options: NormalizeOptions) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    if options.strip_server_fields {
        object.remove("status");
    }
    let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) else {
        return;
    };
    if options.hide_managed_fields {
        metadata.remove("managedFields");
    }
    if options.strip_server_fields {
        for field in SERVER_METADATA_FIELDS {
            metadata.remove(*field);
        }
    }
}

/// YAML text of a manifest; an absent or null manifest is the empty text.
pub fn manifest_yaml(value: Option<&Value>, options: NormalizeOptions) -> Result<String, DiffError> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(String::new());
    };
    let mut value = value.clone();
    strip(&mut value, options);
    serde_yaml::to_string(&value).map_err(|e| DiffError::Normalize(e.to_string()))
}

impl ResourceDiff {
    /// The live side as the server sees it: the normalized live state when
    /// present, otherwise the raw live state.
    pub fn before_state(&self) -> Option<&Value> {
        self.normalized_live_state
            .as_ref()
            .filter(|v| !v.is_null())
            .or(self.live_state.as_ref())
    }

    /// The target side: the predicted live state when present, otherwise the
    /// rendered target.
    pub fn after_state(&self) -> Option<&Value> {
        self.predicted_live_state
            .as_ref()
            .filter(|v| !v.is_null())
            .or(self.target_state.as_ref())
    }

    pub fn to_job(
        &self,
        options: NormalizeOptions,
        view_options: DiffViewOptions,
    ) -> Result<DiffJob, DiffError> {
        let before = manifest_yaml(self.before_state(), options)?;
        let after = manifest_yaml(self.after_state(), options)?;
        let mut job = DiffJob::new(self.display_name(), before, after).with_options(view_options);
        job.is_hook = self.hook;
        Ok(job)
    }
}
