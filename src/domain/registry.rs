//! Behavior registry: per target, an ordered list of bindings resolved
//! last-registered-first, and the interception proxies dispatching through them.

use crate::domain::behavior::Behavior;
use crate::domain::errors::{MockError, MockResult};
use crate::domain::function::{Function, Signature};
use crate::domain::matcher::ArgPattern;
use crate::domain::object::{ObjectId, ObjectRef};
use crate::domain::recorder::{self, CallRecord, CallSite, CountAssertion, SequenceCounter};
use crate::domain::typing;
use crate::domain::value::{Awaitable, CallArgs, Value};
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

/// An interceptable location: container plus attribute name.
#[derive(Clone)]
pub struct MockTarget {
    container: ObjectRef,
    attribute: String,
}

impl MockTarget {
    pub fn new(container: &ObjectRef, attribute: impl Into<String>) -> Self {
        Self {
            container: container.clone(),
            attribute: attribute.into(),
        }
    }

    pub fn container(&self) -> &ObjectRef {
        &self.container
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn key(&self) -> (ObjectId, String) {
        (self.container.id(), self.attribute.clone())
    }
}

impl PartialEq for MockTarget {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MockTarget {}

impl Hash for MockTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.container.id().hash(state);
        self.attribute.hash(state);
    }
}

impl fmt::Display for MockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, '{}'", self.container.repr(), self.attribute)
    }
}

impl fmt::Debug for MockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockKind {
    Sync,
    Async,
    Constructor,
}

/// One registered (pattern, behavior, assertion) tuple.
pub struct Binding {
    position: usize,
    pattern: Mutex<ArgPattern>,
    behavior: Mutex<Behavior>,
    assertion: Mutex<Option<CountAssertion>>,
}

impl Binding {
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn pattern(&self) -> ArgPattern {
        self.pattern.lock().clone()
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior.lock().clone()
    }

    pub fn assertion(&self) -> Option<CountAssertion> {
        *self.assertion.lock()
    }

    /// Matches on a copy of the pattern so predicates may call back into the mock.
    fn accepts(&self, args: &CallArgs) -> bool {
        self.pattern().matches(args)
    }

    /// Value-like behaviors run under the lock; callables run on a snapshot so a
    /// behavior may re-enter the same mock.
    fn run(&self, target: &str, args: &CallArgs, original: Option<&Function>) -> MockResult<Value> {
        let mut snapshot = {
            let mut behavior = self.behavior.lock();
            if behavior.is_value_like() {
                return behavior.execute(target, args, original);
            }
            behavior.clone()
        };
        snapshot.execute(target, args, original)
    }

    fn is_value_like(&self) -> bool {
        self.behavior.lock().is_value_like()
    }
}

#[derive(Default)]
struct MockState {
    /// Newest first.
    bindings: Vec<Arc<Binding>>,
    records: Vec<CallRecord>,
    next_position: usize,
}

/// Settings a mock was created with.
#[derive(Debug, Clone, Copy)]
pub struct MockSettings {
    pub kind: MockKind,
    pub type_validation: bool,
    pub callable_returns_coroutine: bool,
}

/// Interception state of one target: its bindings and its call history.
pub struct CallableMock {
    target: MockTarget,
    settings: MockSettings,
    original: Option<Function>,
    signature: Option<Signature>,
    counter: SequenceCounter,
    state: Mutex<MockState>,
}

impl CallableMock {
    pub fn new(
        target: MockTarget,
        settings: MockSettings,
        original: Option<Function>,
        signature: Option<Signature>,
        counter: SequenceCounter,
    ) -> Arc<Self> {
        Arc::new(Self {
            target,
            settings,
            original,
            signature,
            counter,
            state: Mutex::new(MockState::default()),
        })
    }

    pub fn target(&self) -> &MockTarget {
        &self.target
    }

    pub fn kind(&self) -> MockKind {
        self.settings.kind
    }

    pub fn settings(&self) -> MockSettings {
        self.settings
    }

    pub fn original(&self) -> Option<&Function> {
        self.original.as_ref()
    }

    pub fn label(&self) -> String {
        self.target.to_string()
    }

    /// Whether a narrowed pattern was registered; accept-all bindings are then refused.
    pub fn is_strict(&self) -> bool {
        self.state.lock().bindings.iter().any(|b| !b.pattern.lock().is_any())
    }

    /// Adds a binding in front of the existing ones.
    pub fn register(self: &Arc<Self>, pattern: ArgPattern, behavior: Behavior) -> MockResult<BindingHandle> {
        if pattern.is_any() && self.is_strict() {
            return Err(MockError::InvalidUsage(format!(
                "{}: a behavior for specific call arguments is already defined, so a behavior accepting any call can not be added after it; use for_call() to narrow it",
                self.label()
            )));
        }
        if behavior.needs_original() && self.original.is_none() {
            return Err(MockError::InvalidUsage(format!(
                "{}: can not call the original callable, as it does not exist",
                self.label()
            )));
        }
        debug!(mock = %self.target, %pattern, %behavior, "registering behavior");
        let mut state = self.state.lock();
        let binding = Arc::new(Binding {
            position: state.next_position,
            pattern: Mutex::new(pattern),
            behavior: Mutex::new(behavior),
            assertion: Mutex::new(None),
        });
        state.next_position += 1;
        state.bindings.insert(0, binding.clone());
        Ok(BindingHandle {
            mock: self.clone(),
            binding,
        })
    }

    /// Newest-first scan for the binding accepting `args`.
    pub fn resolve(&self, args: &CallArgs) -> MockResult<Arc<Binding>> {
        let bindings = self.state.lock().bindings.clone();
        if bindings.is_empty() {
            return Err(MockError::UndefinedBehaviorForCall {
                target: self.label(),
                received: args.to_string(),
                detail: "A mock was defined for this target, but no behavior was set for it.".into(),
            });
        }
        if let Some(binding) = bindings.iter().find(|b| b.accepts(args)) {
            trace!(mock = %self.target, position = binding.position, "call matched");
            return Ok(binding.clone());
        }
        Err(MockError::UnexpectedCallArguments {
            target: self.label(),
            received: args.to_string(),
            registered: bindings.iter().rev().map(|b| b.pattern().to_string()).collect(),
        })
    }

    fn record(&self, args: &CallArgs, call_site: Option<CallSite>) {
        let seq = self.counter.next();
        trace!(mock = %self.target, seq, %args, "recording call");
        self.state.lock().records.push(CallRecord {
            seq,
            args: args.clone(),
            call_site,
        });
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.state.lock().records.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Bindings in registration order.
    pub fn bindings(&self) -> Vec<Arc<Binding>> {
        self.state.lock().bindings.iter().rev().cloned().collect()
    }

    fn validate_args(&self, args: &CallArgs) -> MockResult<()> {
        let Some(signature) = &self.signature else {
            return Ok(());
        };
        let bound = signature.bind(args).map_err(|message| MockError::SignatureMismatch {
            target: self.label(),
            message,
        })?;
        if self.settings.type_validation {
            typing::check_bound_args(&self.label(), &bound)?;
        }
        Ok(())
    }

    fn check_return(&self, value: &Value) -> MockResult<()> {
        if !self.settings.type_validation {
            return Ok(());
        }
        match self.signature.as_ref().and_then(|s| s.returns.as_ref()) {
            Some(hint) => typing::check_return(&self.label(), hint, value),
            None => Ok(()),
        }
    }

    /// Synchronous dispatch: validate, record, resolve, run.
    pub fn dispatch(&self, args: &CallArgs) -> MockResult<Value> {
        self.validate_args(args)?;
        self.record(args, recorder::current_call_site());
        let binding = self.resolve(args)?;
        let label = self.label();
        let result = binding.run(&label, args, self.original.as_ref())?;
        if self.settings.kind == MockKind::Constructor {
            return Ok(result);
        }
        if let Value::Awaitable(_) = result {
            if !self.settings.callable_returns_coroutine {
                return Err(MockError::CoroutineValue { target: label });
            }
            return Ok(result);
        }
        self.check_return(&result)?;
        Ok(result)
    }

    /// Asynchronous dispatch: arguments are validated now, the rest happens when
    /// the returned awaitable is awaited.
    pub fn dispatch_async(self: &Arc<Self>, args: &CallArgs) -> MockResult<Value> {
        self.validate_args(args)?;
        let call_site = recorder::current_call_site();
        let mock = self.clone();
        let args = args.clone();
        let label = format!("{}.{}", self.target.container.name(), self.target.attribute);
        Ok(Value::Awaitable(Awaitable::new(label, async move {
            mock.record(&args, call_site);
            let binding = mock.resolve(&args)?;
            let target = mock.label();
            let value_like = binding.is_value_like();
            let result = binding.run(&target, &args, mock.original.as_ref())?;
            let value = if value_like {
                result
            } else {
                match result {
                    Value::Awaitable(inner) => inner.await?,
                    other => {
                        return Err(MockError::NonAwaitableReturn {
                            target,
                            received: other.repr(),
                        });
                    }
                }
            };
            mock.check_return(&value)?;
            Ok(value)
        })))
    }

    /// The function installed in place of the original.
    pub fn proxy(self: &Arc<Self>) -> Function {
        let mock = self.clone();
        let name = self.target.attribute.clone();
        match self.settings.kind {
            MockKind::Async => {
                Function::new(name, move |args: &CallArgs| mock.dispatch_async(args)).as_coroutine()
            }
            MockKind::Sync | MockKind::Constructor => {
                Function::new(name, move |args: &CallArgs| mock.dispatch(args))
            }
        }
    }

    /// Count-assertion failures of every binding.
    pub fn assertion_failures(&self) -> Vec<MockError> {
        let records = self.records();
        let label = self.label();
        self.bindings()
            .iter()
            .filter_map(|b| {
                let assertion = b.assertion()?;
                recorder::evaluate_count(&label, &b.pattern(), assertion, &records)
                    .err()
                    .map(MockError::AssertionFailed)
            })
            .collect()
    }
}

/// Handle to a registered binding, used to narrow it or attach assertions.
#[derive(Clone)]
pub struct BindingHandle {
    mock: Arc<CallableMock>,
    binding: Arc<Binding>,
}

impl BindingHandle {
    pub fn mock(&self) -> &Arc<CallableMock> {
        &self.mock
    }

    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    /// Restricts the binding to calls matching `pattern`.
    pub fn narrow(&self, pattern: ArgPattern) {
        *self.binding.pattern.lock() = pattern;
    }

    pub fn set_assertion(&self, assertion: CountAssertion) -> MockResult<()> {
        let mut slot = self.binding.assertion.lock();
        if let Some(existing) = *slot {
            return Err(MockError::InvalidUsage(format!(
                "{}: a call count assertion ({existing:?}) was already defined for this behavior",
                self.mock.label()
            )));
        }
        *slot = Some(assertion);
        Ok(())
    }

    pub fn label(&self) -> String {
        format!("{}, {}", self.mock.label(), self.binding.pattern())
    }
}

/// Mocks of one session, keyed by target.
#[derive(Default)]
pub struct BehaviorRegistry {
    mocks: Mutex<Vec<Arc<CallableMock>>>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &MockTarget) -> Option<Arc<CallableMock>> {
        self.mocks.lock().iter().find(|m| m.target() == target).cloned()
    }

    pub fn insert(&self, mock: Arc<CallableMock>) {
        self.mocks.lock().push(mock);
    }

    /// Registers a binding on an existing mock of `target`.
    pub fn register(
        &self,
        target: &MockTarget,
        pattern: ArgPattern,
        behavior: Behavior,
        assertion: Option<CountAssertion>,
    ) -> MockResult<BindingHandle> {
        let mock = self.get(target).ok_or_else(|| {
            MockError::InvalidUsage(format!("{target} is not mocked"))
        })?;
        let handle = mock.register(pattern, behavior)?;
        if let Some(assertion) = assertion {
            handle.set_assertion(assertion)?;
        }
        Ok(handle)
    }

    /// The behavior that would handle `args` on `target`.
    pub fn resolve(&self, target: &MockTarget, args: &CallArgs) -> MockResult<Behavior> {
        let mock = self.get(target).ok_or_else(|| MockError::UndefinedBehaviorForCall {
            target: target.to_string(),
            received: args.to_string(),
            detail: "The target is not mocked.".into(),
        })?;
        Ok(mock.resolve(args)?.behavior())
    }

    /// Every mock, in creation order.
    pub fn mocks(&self) -> Vec<Arc<CallableMock>> {
        self.mocks.lock().clone()
    }

    pub fn clear(&self) {
        self.mocks.lock().clear();
    }
}
