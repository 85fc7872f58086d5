//! Strict doubles: template interface, validation, defaults and mocking on doubles.

mod common;

use common::fixtures::calculator_class;
use common::mock::FixedAttrDetector;
use dynmock::adapters::introspect::PythonAttrDetector;
use dynmock::{
    AsyncTestLoop, Awaitable, CallArgs, DoubleOptions, Function, LoopConfig, MockError, MockSession, ObjectRef,
    StrictDouble, Value, args,
};
use std::sync::Arc;

fn calculator_double() -> StrictDouble {
    StrictDouble::new(DoubleOptions::new().template(&calculator_class()).name("calc")).unwrap()
}

#[test]
fn test_calculator_scenario() {
    let calc = calculator_double();
    assert!(matches!(
        calc.call_method("is_odd", &args![2]),
        Err(MockError::UndefinedBehavior { .. })
    ));
    calc.set_attr("is_odd", Function::new("lambda", |_: &CallArgs| Ok(Value::Bool(false))))
        .unwrap();
    assert_eq!(calc.call_method("is_odd", &args![2]).unwrap(), Value::Bool(false));
    assert!(matches!(
        calc.call_method("is_odd", &args![2, "extra"]),
        Err(MockError::SignatureMismatch { .. })
    ));
}

#[test]
fn test_unset_reads_keep_failing_and_round_trip() {
    let calc = calculator_double();
    for _ in 0..2 {
        assert!(matches!(calc.get_attr("precision"), Err(MockError::UndefinedBehavior { .. })));
    }
    calc.set_attr("precision", 3).unwrap();
    assert_eq!(calc.get_attr("precision").unwrap(), Value::Int(3));
    calc.del_attr("precision").unwrap();
    assert!(calc.get_attr("precision").is_err());
}

#[test]
fn test_interface_violations() {
    let calc = calculator_double();
    assert!(matches!(calc.get_attr("missing"), Err(MockError::NoSuchAttribute { .. })));
    assert!(matches!(
        calc.set_attr("missing", 1),
        Err(MockError::CanNotSetNonExistentAttribute { .. })
    ));
    assert!(matches!(calc.set_attr("is_odd", 1), Err(MockError::NonCallableValue { .. })));
    assert!(matches!(calc.set_attr("precision", "high"), Err(MockError::TypeCheckError { .. })));
}

#[test]
fn test_type_validation_opt_outs() {
    let template = calculator_class();
    let lenient = StrictDouble::new(DoubleOptions::new().template(&template).type_validation(false)).unwrap();
    lenient.set_attr("precision", "high").unwrap();

    let excluded =
        StrictDouble::new(DoubleOptions::new().template(&template).skip_type_validation("precision")).unwrap();
    excluded.set_attr("precision", "high").unwrap();
    assert!(excluded.set_attr("is_odd", 1).is_err());
}

#[test]
fn test_runtime_attributes() {
    let template = calculator_class();
    let explicit =
        StrictDouble::new(DoubleOptions::new().template(&template).runtime_attrs(["cache"])).unwrap();
    explicit.set_attr("cache", Value::None).unwrap();
    assert!(explicit.set_attr("memory", 0).is_err());

    let detected = StrictDouble::new(
        DoubleOptions::new()
            .template(&template)
            .detector(Arc::new(PythonAttrDetector)),
    )
    .unwrap();
    detected.set_attr("memory", 0).unwrap();

    let fixed = StrictDouble::new(
        DoubleOptions::new()
            .template(&template)
            .detector(Arc::new(FixedAttrDetector::new(&["handle"]))),
    )
    .unwrap();
    fixed.set_attr("handle", 1).unwrap();
}

#[test]
fn test_without_template_accepts_any_write() {
    let double = StrictDouble::new(DoubleOptions::new()).unwrap();
    assert!(matches!(double.get_attr("anything"), Err(MockError::UndefinedBehavior { .. })));
    double.set_attr("anything", 1).unwrap();
    assert_eq!(double.get_attr("anything").unwrap(), Value::Int(1));
}

#[test]
fn test_template_must_be_a_class() {
    let ns = ObjectRef::namespace("not_a_class");
    assert!(matches!(
        StrictDouble::new(DoubleOptions::new().template(&ns)),
        Err(MockError::InvalidUsage(_))
    ));
}

#[test]
fn test_default_context_manager_and_copy() {
    let calc = calculator_double();
    let entered = calc.call_method("__enter__", &args![]).unwrap();
    assert_eq!(entered, Value::from(&calc));
    assert_eq!(calc.call_method("__exit__", &args![Value::None, Value::None, Value::None]).unwrap(), Value::None);

    calc.set_attr("precision", 2).unwrap();
    let copy = calc.copy().unwrap();
    assert_ne!(copy.id(), calc.id());
    assert_eq!(copy.get_attr("precision").unwrap(), Value::Int(2));
    assert_eq!(copy.call_method("__enter__", &args![]).unwrap(), Value::from(&copy));
    copy.set_attr("precision", 5).unwrap();
    assert_eq!(calc.get_attr("precision").unwrap(), Value::Int(2));

    let plain = StrictDouble::new(
        DoubleOptions::new()
            .template(&calculator_class())
            .default_context_manager(false),
    )
    .unwrap();
    assert!(plain.call_method("__enter__", &args![]).is_err());
}

#[test]
fn test_async_template_method_needs_awaitable() {
    let calc = calculator_double();
    calc.set_attr("fetch", Function::new("plain", |_: &CallArgs| Ok(Value::from("x"))))
        .unwrap();
    assert!(matches!(
        calc.call_method("fetch", &args!["https://a"]),
        Err(MockError::NonAwaitableReturn { .. })
    ));

    calc.set_attr(
        "fetch",
        Function::new("ready", |_: &CallArgs| Ok(Value::Awaitable(Awaitable::ready("fetch", Value::from("ok"))))),
    )
    .unwrap();
    let target = calc.clone();
    let result = AsyncTestLoop::new(LoopConfig::default()).unwrap().run(|_| async move {
        let Value::Awaitable(pending) = target.call_method("fetch", &args!["https://a"])? else {
            panic!("expected awaitable");
        };
        assert_eq!(pending.await?, Value::from("ok"));
        Ok(())
    });
    assert!(result.is_ok(), "{result:?}");
}

#[test]
fn test_mock_callable_on_double() {
    let calc = calculator_double();
    let session = MockSession::new();
    session
        .mock_callable(&calc, "is_odd")
        .unwrap()
        .for_call(args![3])
        .to_return_value(true)
        .unwrap()
        .and_assert_called_once()
        .unwrap();
    assert_eq!(calc.call_method("is_odd", &args![3]).unwrap(), Value::Bool(true));
    assert!(calc.call_method("is_odd", &args!["3"]).is_err());
    assert!(matches!(
        session.mock_callable(&calc, "is_odd").unwrap().to_call_original(),
        Err(MockError::InvalidUsage(_))
    ));
    assert!(session.mock_callable(&calc, "not_there").is_err());
    session.teardown(Ok(())).unwrap();
    assert!(matches!(
        calc.call_method("is_odd", &args![3]),
        Err(MockError::UndefinedBehavior { .. })
    ));
}

#[test]
fn test_magic_attributes_are_per_double() {
    let first = calculator_double();
    let second = calculator_double();
    first
        .set_attr("__enter__", Function::new("enter", |_: &CallArgs| Ok(Value::from("first"))))
        .unwrap();
    assert_eq!(first.call_method("__enter__", &args![]).unwrap(), Value::from("first"));
    assert_eq!(second.call_method("__enter__", &args![]).unwrap(), Value::from(&second));
}
