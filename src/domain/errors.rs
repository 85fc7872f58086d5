//! Error taxonomy of the mock engine.
//!
//! Every failure the engine can produce is a distinct [`MockError`] variant so host
//! frameworks can report them distinctly. Teardown-time failures are collected with
//! [`FailureCollector`] and surfaced together.

use crate::domain::value::Exception;
use thiserror::Error;

/// Result alias used throughout the engine.
pub type MockResult<T> = Result<T, MockError>;

#[derive(Debug, Clone, Error)]
pub enum MockError {
    /// A mocked call matched none of the registered call patterns.
    #[error(
        "{target}:\n  Received call:\n    {received}\n  But no behavior was defined for it.\n  These are the registered calls:\n{}",
        .registered.iter().map(|p| format!("    {p}\n")).collect::<String>()
    )]
    UnexpectedCallArguments {
        target: String,
        received: String,
        registered: Vec<String>,
    },

    /// A mocked call arrived at a target without any usable behavior.
    #[error("{target}:\n  Received call:\n    {received}\n  {detail}")]
    UndefinedBehaviorForCall {
        target: String,
        received: String,
        detail: String,
    },

    /// A strict double attribute was read before being configured.
    #[error(
        "'{attribute}' is not set.\n{double} must have a value set for this attribute if it is going to be accessed."
    )]
    UndefinedBehavior { double: String, attribute: String },

    #[error("'{attribute}' is not an attribute of {target}")]
    NoSuchAttribute { target: String, attribute: String },

    #[error(
        "'{attribute}' can not be set.\n{double} template class does not have this attribute so the mock can not have it as well.\nSee also: runtime attributes of DoubleOptions."
    )]
    CanNotSetNonExistentAttribute { double: String, attribute: String },

    /// Value, argument or return type does not conform to declared type information.
    #[error("{context}: {message}")]
    TypeCheckError { context: String, message: String },

    /// Arguments can not be bound to the declared signature.
    #[error("{target}: {message}")]
    SignatureMismatch { target: String, message: String },

    #[error(
        "'{attribute}' can not be set with a non-callable value.\n{double} template class requires this attribute to be callable."
    )]
    NonCallableValue { double: String, attribute: String },

    #[error("{target}: async callable must return an awaitable, but returned {received}")]
    NonAwaitableReturn { target: String, received: String },

    #[error(
        "{target}: setting coroutines as return value is not allowed. Use mock_async_callable instead, or set callable_returns_coroutine"
    )]
    CoroutineValue { target: String },

    /// A deferred call-count or call-order assertion did not hold.
    #[error("{0}")]
    AssertionFailed(String),

    #[error(
        "{} failures.\n{}",
        .0.len(),
        .0.iter().map(|e| format!("{}: {e}", e.kind())).collect::<Vec<_>>().join("\n")
    )]
    AggregatedFailures(Vec<MockError>),

    #[error(
        "during the execution of the async test a slow callback that blocked the event loop was detected: {task} took {elapsed_ms}ms (threshold {threshold_ms}ms)"
    )]
    SlowCallback {
        task: String,
        elapsed_ms: u128,
        threshold_ms: u128,
    },

    #[error(
        "some tasks were started but never joined, are you missing an `await` somewhere?\nRunning tasks:\n  {}",
        .tasks.join("\n  ")
    )]
    LeakedTask { tasks: Vec<String> },

    #[error("coroutines were created but never awaited:\n  {}", .coroutines.join("\n  "))]
    UnawaitedCoroutine { coroutines: Vec<String> },

    /// The mocking API itself was misused.
    #[error("{0}")]
    InvalidUsage(String),

    /// A host-level exception, raised by a configured behavior or production code.
    #[error("{0}")]
    Raised(Exception),

    #[error("panicked: {0}")]
    Panicked(String),
}

impl MockError {
    /// Short stable name of the variant, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            MockError::UnexpectedCallArguments { .. } => "UnexpectedCallArguments",
            MockError::UndefinedBehaviorForCall { .. } => "UndefinedBehaviorForCall",
            MockError::UndefinedBehavior { .. } => "UndefinedBehavior",
            MockError::NoSuchAttribute { .. } => "NoSuchAttribute",
            MockError::CanNotSetNonExistentAttribute { .. } => "CanNotSetNonExistentAttribute",
            MockError::TypeCheckError { .. } => "TypeCheckError",
            MockError::SignatureMismatch { .. } => "SignatureMismatch",
            MockError::NonCallableValue { .. } => "NonCallableValue",
            MockError::NonAwaitableReturn { .. } => "NonAwaitableReturn",
            MockError::CoroutineValue { .. } => "CoroutineValue",
            MockError::AssertionFailed(_) => "AssertionFailed",
            MockError::AggregatedFailures(_) => "AggregatedFailures",
            MockError::SlowCallback { .. } => "SlowCallback",
            MockError::LeakedTask { .. } => "LeakedTask",
            MockError::UnawaitedCoroutine { .. } => "UnawaitedCoroutine",
            MockError::InvalidUsage(_) => "InvalidUsage",
            MockError::Raised(_) => "Raised",
            MockError::Panicked(_) => "Panicked",
        }
    }

    /// Shorthand for raising a host-level exception.
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        MockError::Raised(Exception::new(kind, message))
    }

    /// Flattened list of failures carried by this error.
    pub fn failures(&self) -> Vec<&MockError> {
        match self {
            MockError::AggregatedFailures(all) => all.iter().flat_map(|e| e.failures()).collect(),
            other => vec![other],
        }
    }
}

/// Collects failures so a single run reports every problem, not just the first.
#[derive(Debug, Default)]
pub struct FailureCollector {
    failures: Vec<MockError>,
}

impl FailureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; nested aggregates are flattened.
    pub fn push(&mut self, error: MockError) {
        match error {
            MockError::AggregatedFailures(inner) => {
                for e in inner {
                    self.push(e);
                }
            }
            other => self.failures.push(other),
        }
    }

    pub fn catch<T>(&mut self, result: MockResult<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.push(e);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// No failures is success, a single failure is raised as itself, several are
    /// bundled into [`MockError::AggregatedFailures`].
    pub fn into_result(mut self) -> MockResult<()> {
        match self.failures.len() {
            0 => Ok(()),
            1 => Err(self.failures.remove(0)),
            _ => Err(MockError::AggregatedFailures(self.failures)),
        }
    }
}
