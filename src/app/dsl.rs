//! Fluent configuration of a mocked callable.
//!
//! ```ignore
//! session
//!     .mock_callable(&storage, "delete")?
//!     .for_call(args!["/file"])
//!     .to_return_value(true)?
//!     .and_assert_called_once()?;
//! ```

use crate::app::session::MockSession;
use crate::domain::behavior::Behavior;
use crate::domain::errors::{MockError, MockResult};
use crate::domain::function::Function;
use crate::domain::matcher::{ArgPattern, ArgSpec};
use crate::domain::recorder::CountAssertion;
use crate::domain::registry::{BindingHandle, CallableMock};
use crate::domain::value::{Exception, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Builder returned by the callable and constructor entry points.
///
/// `for_call` / `for_partial_call` choose the arguments, a `to_*` / `with_*` method
/// registers the behavior, and the `and_assert_*` methods attach expectations to the
/// behavior registered last.
pub struct MockCallable {
    session: MockSession,
    mock: Arc<CallableMock>,
    pattern: ArgPattern,
    handle: Option<BindingHandle>,
}

impl MockCallable {
    pub(crate) fn new(session: MockSession, mock: Arc<CallableMock>) -> Self {
        Self {
            session,
            mock,
            pattern: ArgPattern::Any,
            handle: None,
        }
    }

    pub fn mock(&self) -> &Arc<CallableMock> {
        &self.mock
    }

    /// Restricts the behavior to calls with exactly these arguments.
    pub fn for_call(mut self, spec: impl Into<ArgSpec>) -> Self {
        self.narrow(ArgPattern::exact(spec));
        self
    }

    /// Restricts the behavior to calls carrying at least these arguments.
    pub fn for_partial_call(mut self, spec: impl Into<ArgSpec>) -> Self {
        self.narrow(ArgPattern::partial(spec));
        self
    }

    fn narrow(&mut self, pattern: ArgPattern) {
        if let Some(handle) = &self.handle {
            handle.narrow(pattern.clone());
        }
        self.pattern = pattern;
    }

    fn register(mut self, behavior: Behavior) -> MockResult<Self> {
        let handle = self.mock.register(self.pattern.clone(), behavior)?;
        self.handle = Some(handle);
        Ok(self)
    }

    pub fn to_return_value(self, value: impl Into<Value>) -> MockResult<Self> {
        self.register(Behavior::ReturnValue(value.into()))
    }

    /// Returns the values one per call; calls after the last one fail.
    pub fn to_return_values(self, values: Vec<Value>) -> MockResult<Self> {
        self.register(Behavior::ReturnValues(VecDeque::from(values)))
    }

    pub fn to_yield_values(self, values: Vec<Value>) -> MockResult<Self> {
        self.register(Behavior::YieldValues(values))
    }

    pub fn to_raise(self, exception: Exception) -> MockResult<Self> {
        self.register(Behavior::Raise(exception))
    }

    pub fn with_implementation(self, implementation: Function) -> MockResult<Self> {
        self.register(Behavior::Implementation(implementation))
    }

    /// `wrapper` receives the original callable as its first argument.
    pub fn with_wrapper(self, wrapper: Function) -> MockResult<Self> {
        self.register(Behavior::Wrapper(wrapper))
    }

    pub fn to_call_original(self) -> MockResult<Self> {
        self.register(Behavior::CallOriginal)
    }

    fn current(&self) -> MockResult<&BindingHandle> {
        self.handle.as_ref().ok_or_else(|| {
            MockError::InvalidUsage(format!(
                "{}: assertions must be declared after a behavior",
                self.mock.label()
            ))
        })
    }

    fn assert_count(self, assertion: CountAssertion) -> MockResult<Self> {
        self.current()?.set_assertion(assertion)?;
        Ok(self)
    }

    pub fn and_assert_called_exactly(self, count: usize) -> MockResult<Self> {
        self.assert_count(CountAssertion::Exactly(count))
    }

    pub fn and_assert_called_once(self) -> MockResult<Self> {
        self.and_assert_called_exactly(1)
    }

    pub fn and_assert_called_twice(self) -> MockResult<Self> {
        self.and_assert_called_exactly(2)
    }

    pub fn and_assert_called_at_least(self, count: usize) -> MockResult<Self> {
        if count < 1 {
            return Err(MockError::InvalidUsage(format!(
                "{}: and_assert_called_at_least() requires a count of at least 1",
                self.mock.label()
            )));
        }
        self.assert_count(CountAssertion::AtLeast(count))
    }

    pub fn and_assert_called_at_most(self, count: usize) -> MockResult<Self> {
        if count < 1 {
            return Err(MockError::InvalidUsage(format!(
                "{}: and_assert_called_at_most() requires a count of at least 1; use and_assert_not_called()",
                self.mock.label()
            )));
        }
        self.assert_count(CountAssertion::AtMost(count))
    }

    pub fn and_assert_called(self) -> MockResult<Self> {
        self.assert_count(CountAssertion::Called)
    }

    pub fn and_assert_not_called(self) -> MockResult<Self> {
        self.assert_count(CountAssertion::NotCalled)
    }

    /// The first matching call of this behavior must happen after the first
    /// matching calls of every behavior declared ordered before it.
    pub fn and_assert_called_ordered(self) -> MockResult<Self> {
        let handle = self.current()?.clone();
        self.session.push_ordered(handle);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::domain::object::ObjectRef;
    use crate::domain::value::CallArgs;

    fn storage() -> ObjectRef {
        let ns = ObjectRef::namespace("storage");
        ns.set_attr("delete", Function::new("delete", |_: &CallArgs| Ok(Value::Bool(false))))
            .unwrap();
        ns
    }

    #[test]
    fn test_assertion_before_behavior_is_rejected() {
        let ns = storage();
        let session = MockSession::new();
        let builder = session.mock_callable(&ns, "delete").unwrap();
        assert!(matches!(builder.and_assert_called_once(), Err(MockError::InvalidUsage(_))));
        session.teardown(Ok(())).unwrap();
    }

    #[test]
    fn test_at_least_and_at_most_reject_zero() {
        let ns = storage();
        let session = MockSession::new();
        let builder = session
            .mock_callable(&ns, "delete")
            .unwrap()
            .to_return_value(true)
            .unwrap();
        assert!(builder.and_assert_called_at_least(0).is_err());
        let builder = session.mock_callable(&ns, "delete").unwrap().to_return_value(true).unwrap();
        assert!(builder.and_assert_called_at_most(0).is_err());
        session.teardown(Ok(())).unwrap();
    }

    #[test]
    fn test_for_call_after_behavior_narrows_it() {
        let ns = storage();
        let session = MockSession::new();
        let _builder = session
            .mock_callable(&ns, "delete")
            .unwrap()
            .to_return_value(true)
            .unwrap()
            .for_call(args!["/a"]);
        assert_eq!(ns.call_method("delete", &args!["/a"]).unwrap(), Value::Bool(true));
        assert!(matches!(
            ns.call_method("delete", &args!["/b"]),
            Err(MockError::UnexpectedCallArguments { .. })
        ));
        session.teardown(Ok(())).unwrap();
    }
}
