//! In-memory application list kept current by watch events.

use crate::domain::{AppKey, Application, WatchEvent, WatchEventKind};
use std::collections::BTreeMap;

/// Effect of one watch event on the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    /// The incoming snapshot equals the stored one.
    Unchanged,
    Removed,
    /// Unknown event kind, nameless application, or delete of an absent key.
    Ignored,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        matches!(
            self,
            MergeOutcome::Inserted | MergeOutcome::Replaced | MergeOutcome::Removed
        )
    }
}

/// Counts by sync and health status, for list headers and tiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSummary {
    pub total: usize,
    pub by_sync: BTreeMap<String, usize>,
    pub by_health: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationCollection {
    apps: BTreeMap<AppKey, Application>,
    resource_version: Option<String>,
}

impl ApplicationCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn get(&self, key: &AppKey) -> Option<&Application> {
        self.apps.get(key)
    }

    pub fn contains(&self, key: &AppKey) -> bool {
        self.apps.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AppKey, &Application)> {
        self.apps.iter()
    }

    /// Resume point for the watch: the list's version, then the latest event's.
    pub fn resource_version(&self) -> Option<&str> {
        self.resource_version.as_deref()
    }

    /// Replaces the whole collection with a freshly listed snapshot.
    pub fn replace_all(&mut self, list: Vec<Application>, resource_version: Option<String>) {
        self.apps = list
            .into_iter()
            .filter(|app| !app.metadata.name.is_empty())
            .map(|app| (app.key(), app))
            .collect();
        self.resource_version = resource_version;
    }

    pub fn apply_batch(&mut self, events: impl IntoIterator<Item = WatchEvent>) -> Vec<MergeOutcome> {
        events.into_iter().map(|event| reduce(self, event)).collect()
    }

    /// Applications ordered by name, then namespace.
    pub fn sorted(&self) -> Vec<&Application> {
        let mut apps: Vec<&Application> = self.apps.values().collect();
        apps.sort_by(|a, b| {
            a.metadata
                .name
                .cmp(&b.metadata.name)
                .then_with(|| a.metadata.namespace.cmp(&b.metadata.namespace))
        });
        apps
    }

    fn observe_version(&mut self, application: &Application) {
        if let Some(rv) = &application.metadata.resource_version {
            self.resource_version = Some(rv.clone());
        }
    }

    pub fn summary(&self) -> AppSummary {
        let mut summary = AppSummary {
            total: self.apps.len(),
            ..Default::default()
        };
        for app in self.apps.values() {
            *summary.by_sync.entry(app.sync_status().to_string()).or_default() += 1;
            *summary.by_health.entry(app.health_status().to_string()).or_default() += 1;
        }
        summary
    }
}

/// Merges one watch event. Last applied wins; replaying an event is a no-op.
/// Added, modified and deleted events advance the collection's resource
/// version; skipped events leave it alone.
pub fn reduce(collection: &mut ApplicationCollection, event: WatchEvent) -> MergeOutcome {
    let WatchEvent { kind, application } = event;
    if application.metadata.name.is_empty() {
        log::debug!("ignoring {kind} event without an application name");
        return MergeOutcome::Ignored;
    }

    let key = application.key();
    match kind {
        WatchEventKind::Deleted => {
            collection.observe_version(&application);
            match collection.apps.remove(&key) {
                Some(_) => MergeOutcome::Removed,
                None => MergeOutcome::Ignored,
            }
        }
        WatchEventKind::Added | WatchEventKind::Modified => {
            collection.observe_version(&application);
            if collection.apps.get(&key) == Some(&application) {
                return MergeOutcome::Unchanged;
            }
            match collection.apps.insert(key, application) {
                None => MergeOutcome::Inserted,
                Some(_) => MergeOutcome::Replaced,
            }
        }
        WatchEventKind::Unknown => {
            log::debug!("ignoring unknown watch event for {key}");
            MergeOutcome::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app(name: &str, sync: &str, health: &str) -> Application {
        serde_json::from_value(json!({
            "metadata": {"name": name, "namespace": "argocd"},
            "spec": {"project": "default"},
            "status": {"sync": {"status": sync}, "health": {"status": health}}
        }))
        .unwrap()
    }

    fn event(kind: WatchEventKind, application: Application) -> WatchEvent {
        WatchEvent { kind, application }
    }

    #[test]
    fn test_upsert_and_replay_is_idempotent() {
        let mut apps = ApplicationCollection::new();
        let ev = event(WatchEventKind::Added, app("guestbook", "Synced", "Healthy"));

        assert_eq!(reduce(&mut apps, ev.clone()), MergeOutcome::Inserted);
        let snapshot = apps.clone();
        assert_eq!(reduce(&mut apps, ev), MergeOutcome::Unchanged);
        assert_eq!(apps, snapshot);

        let modified = event(WatchEventKind::Modified, app("guestbook", "OutOfSync", "Healthy"));
        assert_eq!(reduce(&mut apps, modified), MergeOutcome::Replaced);
        assert_eq!(
            apps.get(&AppKey::new("argocd", "guestbook")).unwrap().sync_status(),
            "OutOfSync"
        );
    }

    #[test]
    fn test_delete_and_ignored_events() {
        let mut apps = ApplicationCollection::new();
        let gone = event(WatchEventKind::Deleted, app("a", "Synced", "Healthy"));
        assert_eq!(reduce(&mut apps, gone.clone()), MergeOutcome::Ignored);

        reduce(&mut apps, event(WatchEventKind::Added, app("a", "Synced", "Healthy")));
        assert_eq!(reduce(&mut apps, gone.clone()), MergeOutcome::Removed);
        assert_eq!(reduce(&mut apps, gone), MergeOutcome::Ignored);
        assert!(apps.is_empty());

        let unknown = event(WatchEventKind::Unknown, app("b", "Synced", "Healthy"));
        assert_eq!(reduce(&mut apps, unknown), MergeOutcome::Ignored);
        let nameless = event(WatchEventKind::Added, Application::default());
        assert_eq!(reduce(&mut apps, nameless), MergeOutcome::Ignored);
        assert!(apps.is_empty());
    }

    #[test]
    fn test_same_name_in_two_namespaces() {
        let mut apps = ApplicationCollection::new();
        let mut other = app("web", "Synced", "Healthy");
        other.metadata.namespace = "team-a".into();
        reduce(&mut apps, event(WatchEventKind::Added, app("web", "Synced", "Healthy")));
        reduce(&mut apps, event(WatchEventKind::Added, other));
        assert_eq!(apps.len(), 2);
        let namespaces: Vec<_> = apps.sorted().into_iter().map(|a| a.metadata.namespace.clone()).collect();
        assert_eq!(namespaces, vec!["argocd", "team-a"]);
    }

    #[test]
    fn test_replace_all_batch_and_summary() {
        let mut apps = ApplicationCollection::new();
        apps.replace_all(
            vec![
                app("c", "Synced", "Healthy"),
                app("a", "OutOfSync", "Degraded"),
                Application::default(),
            ],
            Some("100".into()),
        );
        assert_eq!(apps.len(), 2);
        assert_eq!(apps.resource_version(), Some("100"));

        let mut b = app("b", "Synced", "Progressing");
        b.metadata.resource_version = Some("101".into());
        let outcomes = apps.apply_batch([
            event(WatchEventKind::Added, b),
            event(WatchEventKind::Deleted, app("c", "Synced", "Healthy")),
        ]);
        assert_eq!(outcomes, vec![MergeOutcome::Inserted, MergeOutcome::Removed]);
        assert!(outcomes.iter().all(|o| o.changed()));
        assert_eq!(apps.resource_version(), Some("101"));

        let names: Vec<_> = apps.sorted().into_iter().map(|a| a.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let summary = apps.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_sync.get("Synced"), Some(&1));
        assert_eq!(summary.by_sync.get("OutOfSync"), Some(&1));
        assert_eq!(summary.by_health.get("Degraded"), Some(&1));
    }
}
