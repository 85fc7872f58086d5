//! Port implementations for integration tests.
#![allow(dead_code)]

use dynmock::domain::ports::{AwaitableObserver, RuntimeAttrDetector};
use std::sync::Mutex;

/// RuntimeAttrDetector returning a fixed list of names.
pub struct FixedAttrDetector {
    pub names: Vec<String>,
}

impl FixedAttrDetector {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl RuntimeAttrDetector for FixedAttrDetector {
    fn detect(&self, _source: &str) -> Vec<String> {
        self.names.clone()
    }

    fn language(&self) -> &str {
        "fixed"
    }
}

/// AwaitableObserver recording every notification.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl AwaitableObserver for RecordingObserver {
    fn created(&self, _id: u64, label: &str) {
        self.events.lock().unwrap().push(format!("created {label}"));
    }

    fn awaited(&self, _id: u64) {
        self.events.lock().unwrap().push("awaited".to_string());
    }
}
