use serde_json::json;

use syncview::application::apps::{ApplicationCollection, MergeOutcome, reduce};
use syncview::domain::{AppKey, WatchEvent, WatchEventKind};
use syncview::infra::stream::{SseDecoder, decode_watch_event};

fn event(kind: &str, name: &str, rv: &str, sync: &str) -> serde_json::Value {
    json!({
        "result": {
            "type": kind,
            "application": {
                "metadata": {"name": name, "namespace": "argocd", "resourceVersion": rv},
                "spec": {"project": "default"},
                "status": {"sync": {"status": sync}, "health": {"status": "Healthy"}}
            }
        }
    })
}

fn frame(payload: &serde_json::Value) -> String {
    format!("data: {payload}\n\n")
}

fn parse(payload: &serde_json::Value) -> WatchEvent {
    decode_watch_event(&payload.to_string()).expect("valid event")
}

#[test]
fn replaying_a_modified_event_is_idempotent() {
    let mut apps = ApplicationCollection::new();
    let modified = parse(&event("MODIFIED", "guestbook", "10", "OutOfSync"));

    assert_eq!(reduce(&mut apps, modified.clone()), MergeOutcome::Inserted);
    let once = apps.clone();
    assert_eq!(reduce(&mut apps, modified), MergeOutcome::Unchanged);
    assert_eq!(apps, once);
}

#[test]
fn deleting_an_absent_application_is_a_noop() {
    let mut apps = ApplicationCollection::new();
    reduce(&mut apps, parse(&event("ADDED", "a", "1", "Synced")));
    let before = apps.clone();

    let outcome = reduce(&mut apps, parse(&event("DELETED", "missing", "1", "Synced")));
    assert_eq!(outcome, MergeOutcome::Ignored);
    assert_eq!(apps.len(), before.len());
    assert!(apps.contains(&AppKey::new("argocd", "a")));
}

#[test]
fn event_stream_replay_tracks_latest_state() {
    let body = [
        frame(&event("ADDED", "guestbook", "1", "OutOfSync")),
        ": keepalive\n\n".to_string(),
        frame(&event("ADDED", "billing", "2", "Synced")),
        "data: {not json}\n\n".to_string(),
        frame(&event("MODIFIED", "guestbook", "3", "Synced")),
        frame(&event("BOOKMARK", "guestbook", "4", "Synced")),
        frame(&event("DELETED", "billing", "5", "Synced")),
    ]
    .concat();

    // Deliver in uneven chunks, as a network read would.
    let bytes = body.as_bytes();
    let mut decoder = SseDecoder::new();
    let mut apps = ApplicationCollection::new();
    let mut outcomes = Vec::new();
    for chunk in bytes.chunks(37) {
        for frame in decoder.push(chunk) {
            if let Some(event) = decode_watch_event(&frame.data) {
                outcomes.push(reduce(&mut apps, event));
            }
        }
    }

    assert_eq!(
        outcomes,
        vec![
            MergeOutcome::Inserted,
            MergeOutcome::Inserted,
            MergeOutcome::Replaced,
            MergeOutcome::Ignored,
            MergeOutcome::Removed,
        ]
    );
    assert_eq!(apps.len(), 1);
    let guestbook = apps.get(&AppKey::new("argocd", "guestbook")).expect("kept");
    assert_eq!(guestbook.sync_status(), "Synced");
    assert_eq!(apps.resource_version(), Some("5"));

    let summary = apps.summary();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.by_sync.get("Synced"), Some(&1));
}

#[test]
fn batch_applies_in_arrival_order() {
    let mut apps = ApplicationCollection::new();
    let events = vec![
        parse(&event("ADDED", "a", "1", "Synced")),
        parse(&event("DELETED", "a", "2", "Synced")),
        parse(&event("ADDED", "a", "3", "OutOfSync")),
    ];
    let outcomes = apps.apply_batch(events);
    assert_eq!(
        outcomes,
        vec![
            MergeOutcome::Inserted,
            MergeOutcome::Removed,
            MergeOutcome::Inserted
        ]
    );
    let app = apps.get(&AppKey::new("argocd", "a")).expect("re-added");
    assert_eq!(app.sync_status(), "OutOfSync");
}

#[test]
fn unknown_kinds_decode_but_do_not_touch_the_collection() {
    let parsed = parse(&event("BOOKMARK", "a", "9", "Synced"));
    assert_eq!(parsed.kind, WatchEventKind::Unknown);

    let mut apps = ApplicationCollection::new();
    assert_eq!(reduce(&mut apps, parsed), MergeOutcome::Ignored);
    assert!(apps.is_empty());
    assert_eq!(apps.resource_version(), None);
}

#[test]
fn skipped_events_keep_the_resume_version() {
    let mut apps = ApplicationCollection::new();
    reduce(&mut apps, parse(&event("ADDED", "a", "7", "Synced")));
    assert_eq!(apps.resource_version(), Some("7"));

    reduce(&mut apps, parse(&event("BOOKMARK", "a", "8", "Synced")));
    assert_eq!(apps.resource_version(), Some("7"));

    reduce(&mut apps, parse(&event("DELETED", "a", "9", "Synced")));
    assert_eq!(apps.resource_version(), Some("9"));
}
