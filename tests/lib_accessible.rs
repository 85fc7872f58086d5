//! Sanity check: library and test common module are accessible.

mod common;

use dynmock::adapters::introspect::UniversalAttrDetector;
use dynmock::domain::ports::{AwaitableObserver, RuntimeAttrDetector};
use dynmock::domain::value::observe_awaitables;
use dynmock::{Awaitable, MockSession, Value};
use std::sync::Arc;

#[test]
fn test_library_accessible() {
    let session = MockSession::new();
    assert!(!session.is_torn_down());
    session.teardown(Ok(())).unwrap();
    assert!(session.is_torn_down());
}

#[test]
fn test_fixed_attr_detector() {
    use common::mock::FixedAttrDetector;

    let detector = FixedAttrDetector::new(&["a", "b"]);
    assert_eq!(detector.detect("anything"), vec!["a", "b"]);
    assert_eq!(detector.language(), "fixed");
}

#[test]
fn test_universal_detector_finds_python_and_javascript_assignments() {
    let detector = UniversalAttrDetector::new();
    let found = detector.detect("self.cache = {}\nthis.handle = null;\n");
    assert!(found.contains(&"cache".to_string()));
    assert!(found.contains(&"handle".to_string()));
}

#[test]
fn test_recording_observer() {
    use common::mock::RecordingObserver;

    let observer = Arc::new(RecordingObserver::default());
    let awaitable = {
        let _guard = observe_awaitables(observer.clone());
        Awaitable::ready("probe", Value::None)
    };
    observer.awaited(awaitable.id());
    let events = observer.events();
    assert_eq!(events.len(), 2);
    assert!(events[0].starts_with("created"));
    assert!(events[1].starts_with("awaited"));
}
