//! dynmock: a mocking engine for a dynamic object model.
//!
//! Tests declare expectations on a [`MockSession`]; the session installs
//! interception proxies, records calls, and at teardown checks every assertion
//! and restores the original state.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;

pub use app::async_loop::{AsyncTestLoop, LoopConfig, LoopHandle, TaskHandle};
pub use app::dsl::MockCallable;
pub use app::session::{MockOptions, MockSession};
pub use domain::errors::{MockError, MockResult};
pub use domain::function::{Function, Signature};
pub use domain::object::{Attr, ClassBuilder, ObjectRef};
pub use domain::strict::{DoubleOptions, StrictDouble};
pub use domain::typing::TypeHint;
pub use domain::value::{Awaitable, CallArgs, Exception, Value};
