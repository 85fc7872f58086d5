//! Call recording and deferred assertions.
//!
//! Every dispatch through an interception proxy appends a [`CallRecord`] before the
//! resolved behavior runs. Count and order assertions are evaluated against these
//! records at teardown.

use crate::domain::matcher::ArgPattern;
use crate::domain::value::CallArgs;
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source location a mocked call originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl CallSite {
    pub fn from_location(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

thread_local! {
    static CALL_SITES: RefCell<Vec<CallSite>> = const { RefCell::new(Vec::new()) };
}

/// Pops the call site pushed by [`enter_call_site`] when dropped.
pub struct CallSiteGuard(());

impl Drop for CallSiteGuard {
    fn drop(&mut self) {
        CALL_SITES.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

pub fn enter_call_site(site: CallSite) -> CallSiteGuard {
    CALL_SITES.with(|s| s.borrow_mut().push(site));
    CallSiteGuard(())
}

/// The innermost call site of the call currently executing on this thread.
pub fn current_call_site() -> Option<CallSite> {
    CALL_SITES.with(|s| s.borrow().last().cloned())
}

/// Global call ordering shared by every mock of one session.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter(Arc<AtomicU64>);

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// One observed invocation.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub seq: u64,
    pub args: CallArgs,
    pub call_site: Option<CallSite>,
}

/// Declared call-count expectation of one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountAssertion {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    Called,
    NotCalled,
}

impl CountAssertion {
    pub fn holds(&self, count: usize) -> bool {
        match *self {
            CountAssertion::Exactly(n) => count == n,
            CountAssertion::AtLeast(n) => count >= n,
            CountAssertion::AtMost(n) => count <= n,
            CountAssertion::Called => count >= 1,
            CountAssertion::NotCalled => count == 0,
        }
    }

    fn expectation(&self) -> String {
        match *self {
            CountAssertion::Exactly(n) => n.to_string(),
            CountAssertion::AtLeast(n) => format!("at least {n}"),
            CountAssertion::AtMost(n) => format!("at most {n}"),
            CountAssertion::Called => "at least 1".into(),
            CountAssertion::NotCalled => "0".into(),
        }
    }
}

/// Checks `assertion` against the records matching `pattern`.
///
/// On failure the message names the target, the expected and received counts and
/// every call the target received.
pub fn evaluate_count(
    target: &str,
    pattern: &ArgPattern,
    assertion: CountAssertion,
    records: &[CallRecord],
) -> Result<(), String> {
    let count = records.iter().filter(|r| pattern.matches(&r.args)).count();
    if assertion.holds(count) {
        return Ok(());
    }
    let mut message = format!(
        "{target}, {pattern}:\n  expected {}, got {count} call(s)",
        assertion.expectation()
    );
    if records.is_empty() {
        message.push_str("\n  No calls were received.");
    } else {
        message.push_str("\n  Received calls:");
        for record in records {
            match &record.call_site {
                Some(site) => message.push_str(&format!("\n    {} at {site}", record.args)),
                None => message.push_str(&format!("\n    {}", record.args)),
            }
        }
    }
    Err(message)
}

/// One participant of an ordered assertion: label, pattern and the records of its
/// target.
pub struct OrderedCall<'a> {
    pub label: String,
    pub pattern: &'a ArgPattern,
    pub records: &'a [CallRecord],
}

impl OrderedCall<'_> {
    fn first_seq(&self) -> Option<u64> {
        self.records
            .iter()
            .filter(|r| self.pattern.matches(&r.args))
            .map(|r| r.seq)
            .min()
    }
}

/// First matching calls must occur in declaration order. Returns one message per
/// offending pair.
pub fn evaluate_order(calls: &[OrderedCall<'_>]) -> Vec<String> {
    let mut failures = Vec::new();
    let firsts: Vec<Option<u64>> = calls.iter().map(OrderedCall::first_seq).collect();
    for (call, first) in calls.iter().zip(&firsts) {
        if first.is_none() {
            failures.push(format!(
                "calls did not match assertion.\n  {} was expected to be called in order, but was not called",
                call.label
            ));
        }
    }
    for i in 1..calls.len() {
        if let (Some(prev), Some(cur)) = (firsts[i - 1], firsts[i])
            && cur < prev
        {
            failures.push(format!(
                "calls did not match assertion.\n  {} was expected to be called before {}, but it was called after it",
                calls[i - 1].label,
                calls[i].label
            ));
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    fn record(seq: u64, args: CallArgs) -> CallRecord {
        CallRecord {
            seq,
            args,
            call_site: None,
        }
    }

    #[test]
    fn test_count_assertions() {
        assert!(CountAssertion::Exactly(2).holds(2));
        assert!(!CountAssertion::AtLeast(2).holds(1));
        assert!(CountAssertion::AtMost(2).holds(0));
        assert!(CountAssertion::NotCalled.holds(0));
        assert!(!CountAssertion::Called.holds(0));
    }

    #[test]
    fn test_evaluate_count_filters_by_pattern() {
        let pattern = ArgPattern::exact(args!["/file"]);
        let records = vec![record(1, args!["/file"]), record(2, args!["/other"])];
        assert!(evaluate_count("t", &pattern, CountAssertion::Exactly(1), &records).is_ok());
        let err = evaluate_count("t", &pattern, CountAssertion::Exactly(2), &records).unwrap_err();
        assert!(err.contains("expected 2, got 1"));
    }

    #[test]
    fn test_evaluate_count_reports_no_calls() {
        let err = evaluate_count("delete", &ArgPattern::Any, CountAssertion::Exactly(1), &[])
            .unwrap_err();
        assert!(err.contains("expected 1, got 0"));
        assert!(err.contains("No calls were received"));
    }

    #[test]
    fn test_evaluate_order_names_offending_pair() {
        let a = vec![record(2, args![])];
        let b = vec![record(1, args![])];
        let any = ArgPattern::Any;
        let calls = vec![
            OrderedCall {
                label: "first".into(),
                pattern: &any,
                records: &a,
            },
            OrderedCall {
                label: "second".into(),
                pattern: &any,
                records: &b,
            },
        ];
        let failures = evaluate_order(&calls);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("first was expected to be called before second"));
    }

    #[test]
    fn test_call_site_stack() {
        assert!(current_call_site().is_none());
        let guard = enter_call_site(CallSite {
            file: "src/x.rs".into(),
            line: 3,
            column: 9,
        });
        assert_eq!(current_call_site().unwrap().to_string(), "src/x.rs:3:9");
        drop(guard);
        assert!(current_call_site().is_none());
    }
}
