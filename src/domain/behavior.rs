//! What a mocked call does once a binding was selected.

use crate::domain::errors::{MockError, MockResult};
use crate::domain::function::Function;
use crate::domain::value::{CallArgs, Exception, Value, ValueIter};
use std::collections::VecDeque;
use std::fmt;

#[derive(Clone)]
pub enum Behavior {
    ReturnValue(Value),
    /// Values popped in order; exhaustion fails the call.
    ReturnValues(VecDeque<Value>),
    /// Each call returns a fresh iterator over the values.
    YieldValues(Vec<Value>),
    Raise(Exception),
    Implementation(Function),
    /// Called with the original callable prepended to the arguments.
    Wrapper(Function),
    CallOriginal,
}

impl Behavior {
    /// Whether the behavior needs the target's original callable.
    pub fn needs_original(&self) -> bool {
        matches!(self, Behavior::Wrapper(_) | Behavior::CallOriginal)
    }

    /// Whether the behavior yields its result directly instead of running a callable.
    pub fn is_value_like(&self) -> bool {
        matches!(
            self,
            Behavior::ReturnValue(_) | Behavior::ReturnValues(_) | Behavior::YieldValues(_) | Behavior::Raise(_)
        )
    }

    /// Runs the behavior for one call.
    pub fn execute(&mut self, target: &str, args: &CallArgs, original: Option<&Function>) -> MockResult<Value> {
        match self {
            Behavior::ReturnValue(v) => Ok(v.clone()),
            Behavior::ReturnValues(values) => values.pop_front().ok_or_else(|| MockError::UndefinedBehaviorForCall {
                target: target.to_string(),
                received: args.to_string(),
                detail: "No more values to return!".into(),
            }),
            Behavior::YieldValues(values) => Ok(Value::Iterator(ValueIter::new(values.clone()))),
            Behavior::Raise(e) => Err(MockError::Raised(e.clone())),
            Behavior::Implementation(f) => f.call_inner(args),
            Behavior::Wrapper(f) => {
                let original = require_original(target, original)?;
                f.call_inner(&args.prepend(Value::Function(original.clone())))
            }
            Behavior::CallOriginal => require_original(target, original)?.call_inner(args),
        }
    }
}

fn require_original<'a>(target: &str, original: Option<&'a Function>) -> MockResult<&'a Function> {
    original.ok_or_else(|| {
        MockError::InvalidUsage(format!("{target}: there is no original callable to call"))
    })
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::ReturnValue(v) => write!(f, "return {}", v.repr()),
            Behavior::ReturnValues(values) => write!(f, "return values ({} left)", values.len()),
            Behavior::YieldValues(values) => write!(f, "yield {} value(s)", values.len()),
            Behavior::Raise(e) => write!(f, "raise {e}"),
            Behavior::Implementation(func) => write!(f, "call {}", func.name()),
            Behavior::Wrapper(func) => write!(f, "wrap with {}", func.name()),
            Behavior::CallOriginal => write!(f, "call original"),
        }
    }
}
