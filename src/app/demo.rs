//! Built-in demonstration suite run by the `dynmock` binary.
//!
//! Each case exercises one mocking feature against a small sample object model and
//! passes when the feature behaves as documented, including the cases that check a
//! failure is reported.

use crate::app::async_loop::{AsyncTestLoop, LoopConfig, LoopHandle};
use crate::app::runner::{Suite, TestCase};
use crate::app::session::MockSession;
use crate::args;
use crate::domain::errors::{MockError, MockResult};
use crate::domain::function::{Function, Signature};
use crate::domain::matcher::{any_str, int_greater_than};
use crate::domain::object::{ClassBuilder, ObjectRef};
use crate::domain::strict::{DoubleOptions, StrictDouble};
use crate::domain::typing::TypeHint;
use crate::domain::value::{CallArgs, Exception, Value};
use crate::pattern;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::time::Duration;

fn ensure(condition: bool, message: impl Into<String>) -> MockResult<()> {
    if condition {
        Ok(())
    } else {
        Err(MockError::AssertionFailed(message.into()))
    }
}

fn expect_kind<T>(result: MockResult<T>, kind: &str) -> MockResult<()> {
    match result {
        Err(e) if e.failures().iter().any(|f| f.kind() == kind) => Ok(()),
        Err(e) => Err(MockError::AssertionFailed(format!("expected {kind}, got {}: {e}", e.kind()))),
        Ok(_) => Err(MockError::AssertionFailed(format!("expected {kind}, got success"))),
    }
}

fn object(value: Value) -> MockResult<ObjectRef> {
    match value {
        Value::Object(obj) => Ok(obj),
        other => Err(MockError::AssertionFailed(format!("expected an object, got {}", other.repr()))),
    }
}

async fn awaited(value: Value) -> MockResult<Value> {
    match value {
        Value::Awaitable(a) => a.await,
        other => Err(MockError::AssertionFailed(format!("expected an awaitable, got {}", other.repr()))),
    }
}

/// `os` with `remove(path)`.
pub fn os_module() -> ObjectRef {
    let os = ObjectRef::namespace("os");
    let remove = Function::new("remove", |_: &CallArgs| Ok(Value::None))
        .with_signature(Signature::new().typed("path", TypeHint::Str).returns(TypeHint::None));
    os.set_attr("remove", remove).ok();
    os.set_attr("sep", "/").ok();
    os
}

/// `Storage` with `delete(self, path) -> bool` and a `root` annotation.
pub fn storage_class() -> ObjectRef {
    ClassBuilder::new("Storage")
        .method(
            "delete",
            Function::new("delete", |_: &CallArgs| Ok(Value::Bool(false))).with_signature(
                Signature::new()
                    .param("self")
                    .typed("path", TypeHint::Str)
                    .returns(TypeHint::Bool),
            ),
        )
        .annotate("root", TypeHint::Str)
        .data("root", "/var")
        .build()
}

/// `Calculator` with `is_odd(self, x: int) -> bool`.
pub fn calculator_class() -> ObjectRef {
    ClassBuilder::new("Calculator")
        .method(
            "is_odd",
            Function::new("is_odd", |a: &CallArgs| {
                Ok(Value::Bool(a.arg(1).and_then(Value::as_int).is_some_and(|x| x % 2 != 0)))
            })
            .with_signature(
                Signature::new()
                    .param("self")
                    .typed("x", TypeHint::Int)
                    .returns(TypeHint::Bool),
            ),
        )
        .build()
}

fn client_module() -> (ObjectRef, ObjectRef) {
    let client = ClassBuilder::new("Client")
        .method(
            "__init__",
            Function::new("__init__", |a: &CallArgs| {
                if let (Some(Value::Object(this)), Some(host)) = (a.arg(0), a.arg(1)) {
                    this.set_attr("host", host.clone())?;
                }
                Ok(Value::None)
            })
            .with_signature(Signature::new().param("self").typed("host", TypeHint::Str)),
        )
        .build();
    let module = ObjectRef::namespace("net");
    module.set_attr("Client", &client).ok();
    (module, client)
}

fn fetcher_module() -> ObjectRef {
    let ns = ObjectRef::namespace("http");
    let fetch = Function::coroutine("fetch", |_: CallArgs| async { Ok(Value::from("real body")) })
        .with_signature(Signature::new().typed("url", TypeHint::Str).returns(TypeHint::Str));
    ns.set_attr("fetch", fetch).ok();
    ns
}

fn delete_for_call(session: &MockSession) -> MockResult<()> {
    let storage = object(storage_class().instantiate(&args![])?)?;
    session
        .mock_callable(&storage, "delete")?
        .for_call(args!["/file"])
        .to_return_value(true)?
        .and_assert_called_once()?;
    ensure(storage.call_method("delete", &args!["/file"])? == Value::Bool(true), "delete('/file') is True")?;
    expect_kind(storage.call_method("delete", &args!["/other"]), "UnexpectedCallArguments")
}

fn delete_never_called(_: &MockSession) -> MockResult<()> {
    let storage = object(storage_class().instantiate(&args![])?)?;
    let inner = MockSession::new();
    inner
        .mock_callable(&storage, "delete")?
        .for_call(args!["/file"])
        .to_return_value(true)?
        .and_assert_called_once()?;
    match inner.teardown(Ok(())) {
        Err(e) => ensure(e.to_string().contains("expected 1, got 0"), format!("unexpected failure: {e}")),
        Ok(()) => ensure(false, "teardown passed without the expected call"),
    }
}

fn remove_bindings_compose(session: &MockSession) -> MockResult<()> {
    let os = os_module();
    session
        .mock_callable(&os, "remove")?
        .to_raise(Exception::new("FileNotFoundError", "No such file or directory"))?;
    session
        .mock_callable(&os, "remove")?
        .for_call(args!["/a"])
        .to_return_value(Value::None)?;
    ensure(os.call_method("remove", &args!["/a"])?.is_none(), "remove('/a') is None")?;
    match os.call_method("remove", &args!["/b"]) {
        Err(MockError::Raised(e)) if e.kind == "FileNotFoundError" => Ok(()),
        other => ensure(false, format!("remove('/b') should raise, got {other:?}")),
    }
}

fn partial_call_with_matchers(session: &MockSession) -> MockResult<()> {
    let ns = ObjectRef::namespace("metrics");
    ns.set_attr("emit", Function::new("emit", |_: &CallArgs| Ok(Value::None))).ok();
    session
        .mock_callable(&ns, "emit")?
        .for_partial_call(pattern![any_str()].kwarg("value", int_greater_than(10)))
        .to_return_value("high")?
        .and_assert_called_at_least(1)?;
    let call = args!["latency", "ms"].kwarg("value", 42);
    ensure(ns.call_method("emit", &call)? == Value::from("high"), "partial match")?;
    expect_kind(
        ns.call_method("emit", &args!["latency"].kwarg("value", 3)),
        "UnexpectedCallArguments",
    )
}

fn ordered_calls(_: &MockSession) -> MockResult<()> {
    fn scenario(in_order: bool) -> MockResult<()> {
        let os = os_module();
        let storage = object(storage_class().instantiate(&args![])?)?;
        let session = MockSession::new();
        session
            .mock_callable(&os, "remove")?
            .to_return_value(Value::None)?
            .and_assert_called_ordered()?;
        session
            .mock_callable(&storage, "delete")?
            .to_return_value(true)?
            .and_assert_called_ordered()?;
        let body = if in_order {
            os.call_method("remove", &args!["/a"])
                .and_then(|_| storage.call_method("delete", &args!["/b"]))
        } else {
            storage
                .call_method("delete", &args!["/b"])
                .and_then(|_| os.call_method("remove", &args!["/a"]))
        };
        session.teardown(body.map(|_| ()))
    }
    scenario(true)?;
    match scenario(false) {
        Err(e) => ensure(e.to_string().contains("was expected to be called before"), e.to_string()),
        Ok(()) => ensure(false, "out of order calls passed"),
    }
}

fn strict_double_calculator(_: &MockSession) -> MockResult<()> {
    let double = StrictDouble::new(DoubleOptions::new().template(&calculator_class()))?;
    expect_kind(double.call_method("is_odd", &args![2]), "UndefinedBehavior")?;
    double.set_attr("is_odd", Function::new("lambda", |_: &CallArgs| Ok(Value::Bool(false))))?;
    ensure(double.call_method("is_odd", &args![2])? == Value::Bool(false), "configured is_odd")?;
    expect_kind(double.call_method("is_odd", &args![2, "extra"]), "SignatureMismatch")?;
    expect_kind(double.call_method("is_odd", &args!["two"]), "TypeCheckError")?;
    expect_kind(double.set_attr("is_even", 1), "CanNotSetNonExistentAttribute")
}

fn patch_attribute_restores(_: &MockSession) -> MockResult<()> {
    let class = storage_class();
    let storage = object(class.instantiate(&args![])?)?;
    let inner = MockSession::new();
    inner.patch_attribute(&storage, "root", "/tmp")?;
    expect_kind(inner.patch_attribute(&storage, "root", 1), "TypeCheckError")?;
    ensure(storage.get_attr("root")? == Value::from("/tmp"), "patched root")?;
    ensure(class.get_attr("root")? == Value::from("/var"), "class root untouched")?;
    inner.teardown(Ok(()))?;
    ensure(storage.get_attr("root")? == Value::from("/var"), "restored root")
}

fn constructor_injection(session: &MockSession) -> MockResult<()> {
    let (module, client) = client_module();
    let fake = StrictDouble::new(DoubleOptions::new().template(&client).name("fake client"))?;
    session
        .mock_constructor(&module, "Client")?
        .for_call(args!["db"])
        .to_return_value(&fake)?;
    session
        .mock_constructor(&module, "Client")?
        .for_call(args!["real"])
        .to_call_original()?;
    let class = object(module.get_attr("Client")?)?;
    ensure(class.call(&args!["db"])? == Value::from(&fake), "constructor returns the double")?;
    let real = class.call(&args!["real"])?;
    ensure(real.as_object().is_some_and(|o| o.is_instance()), "call original builds an instance")?;
    let subclass = ClassBuilder::new("TlsClient").base(&client).build();
    let child = subclass.instantiate(&args!["secure"])?;
    ensure(child.as_object().is_some_and(|o| o.is_instance()), "subclasses are unaffected")
}

fn async_fetch(session: MockSession, _: LoopHandle) -> BoxFuture<'static, MockResult<()>> {
    async move {
        let http = fetcher_module();
        session
            .mock_async_callable(&http, "fetch")?
            .for_call(args!["https://example.com"])
            .to_return_value("mocked body")?
            .and_assert_called_once()?;
        let body = awaited(http.call_method("fetch", &args!["https://example.com"])?).await?;
        ensure(body == Value::from("mocked body"), "awaited mock value")
    }
    .boxed()
}

fn async_health_checks(_: &MockSession) -> MockResult<()> {
    let leaked = AsyncTestLoop::new(LoopConfig::default())?.run(|handle| async move {
        let _task = handle.spawn("background", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Value::None)
        });
        Ok(())
    });
    expect_kind(leaked, "LeakedTask")?;

    let unawaited = AsyncTestLoop::new(LoopConfig::default())?.run(|_| async move {
        let _pending = fetcher_module().call_method("fetch", &args!["https://example.com"])?;
        Ok(())
    });
    expect_kind(unawaited, "UnawaitedCoroutine")?;

    let config = LoopConfig {
        slow_callback_threshold: Duration::from_millis(5),
        slow_callback_is_not_fatal: false,
    };
    let slow = AsyncTestLoop::new(config)?.run(|_| async move {
        std::thread::sleep(Duration::from_millis(20));
        Ok(())
    });
    expect_kind(slow, "SlowCallback")
}

/// The suite listed and run by the CLI.
pub fn demo_suite() -> Suite {
    Suite::new("dynmock demo")
        .case(TestCase::sync("mock_callable_for_call", delete_for_call))
        .case(TestCase::sync("call_count_assertion_fails", delete_never_called))
        .case(TestCase::sync("bindings_resolve_newest_first", remove_bindings_compose))
        .case(TestCase::sync("partial_call_with_matchers", partial_call_with_matchers))
        .case(TestCase::sync("ordered_assertion", ordered_calls))
        .case(TestCase::sync("strict_double_calculator", strict_double_calculator))
        .case(TestCase::sync("patch_attribute_restores", patch_attribute_restores))
        .case(TestCase::sync("constructor_injection", constructor_injection))
        .case(TestCase::asynchronous("mock_async_callable", async_fetch))
        .case(TestCase::sync("async_health_checks", async_health_checks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::runner::Runner;
    use crate::config::RunnerConfig;

    #[test]
    fn test_demo_suite_passes() {
        let report = Runner::new(RunnerConfig::default()).unwrap().run(&demo_suite());
        let failed: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| !o.failures.is_empty())
            .map(|o| format!("{}: {:?}", o.name, o.failures))
            .collect();
        assert!(failed.is_empty(), "{failed:#?}");
        assert_eq!(report.passed, demo_suite().cases().len());
    }
}
