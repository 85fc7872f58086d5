//! Sample object models shared by integration tests.
#![allow(dead_code)]

use dynmock::args;
use dynmock::{CallArgs, ClassBuilder, Function, ObjectRef, Signature, TypeHint, Value};

/// `os` namespace: `remove(path: str) -> None`, `getcwd() -> str`, `sep = "/"`.
pub fn os_module() -> ObjectRef {
    let os = ObjectRef::namespace("os");
    os.set_attr(
        "remove",
        Function::new("remove", |_: &CallArgs| Ok(Value::None))
            .with_signature(Signature::new().typed("path", TypeHint::Str).returns(TypeHint::None)),
    )
    .unwrap();
    os.set_attr(
        "getcwd",
        Function::new("getcwd", |_: &CallArgs| Ok(Value::from("/home")))
            .with_signature(Signature::new().returns(TypeHint::Str)),
    )
    .unwrap();
    os.set_attr("sep", "/").unwrap();
    os
}

/// `Storage`: `delete(self, path: str) -> bool`, `root: str`, a `size` property,
/// a `from_url` classmethod, a `normalize` staticmethod and `__len__`.
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
        .method(
            "__len__",
            Function::new("__len__", |_: &CallArgs| Ok(Value::Int(0)))
                .with_signature(Signature::new().param("self").returns(TypeHint::Int)),
        )
        .classmethod(
            "from_url",
            Function::new("from_url", |a: &CallArgs| Ok(Value::from(format!("storage at {}", a.args[1]))))
                .with_signature(Signature::new().param("cls").typed("url", TypeHint::Str)),
        )
        .staticmethod(
            "normalize",
            Function::new("normalize", |a: &CallArgs| Ok(a.args[0].clone()))
                .with_signature(Signature::new().typed("path", TypeHint::Str).returns(TypeHint::Str)),
        )
        .property(
            "size",
            Function::new("size", |_: &CallArgs| Ok(Value::Int(10)))
                .with_signature(Signature::new().param("self").returns(TypeHint::Int)),
            None,
        )
        .annotate("root", TypeHint::Str)
        .data("root", "/var")
        .build()
}

pub fn storage() -> ObjectRef {
    instance_of(&storage_class())
}

/// `Calculator`: `is_odd(self, x: int) -> bool`, async `fetch(self, url: str) -> str`,
/// a `precision: int` annotation and context manager support.
pub fn calculator_class() -> ObjectRef {
    ClassBuilder::new("Calculator")
        .method(
            "is_odd",
            Function::new("is_odd", |a: &CallArgs| {
                Ok(Value::Bool(a.args[1].as_int().is_some_and(|x| x % 2 != 0)))
            })
            .with_signature(
                Signature::new()
                    .param("self")
                    .typed("x", TypeHint::Int)
                    .returns(TypeHint::Bool),
            ),
        )
        .method(
            "fetch",
            Function::coroutine("fetch", |_: CallArgs| async { Ok(Value::from("real")) }).with_signature(
                Signature::new()
                    .param("self")
                    .typed("url", TypeHint::Str)
                    .returns(TypeHint::Str),
            ),
        )
        .method("__enter__", Function::new("__enter__", |a: &CallArgs| Ok(a.args[0].clone())))
        .method("__exit__", Function::new("__exit__", |_: &CallArgs| Ok(Value::None)))
        .annotate("precision", TypeHint::Int)
        .init_source("def __init__(self):\n    self.memory = 0\n")
        .build()
}

/// `net` namespace holding a `Client(host: str)` class.
pub fn client_module() -> (ObjectRef, ObjectRef) {
    let client = ClassBuilder::new("Client")
        .method(
            "__init__",
            Function::new("__init__", |a: &CallArgs| {
                if let Some(Value::Object(this)) = a.arg(0) {
                    this.set_attr("host", a.args[1].clone())?;
                }
                Ok(Value::None)
            })
            .with_signature(Signature::new().param("self").typed("host", TypeHint::Str)),
        )
        .build();
    let net = ObjectRef::namespace("net");
    net.set_attr("Client", &client).unwrap();
    (net, client)
}

/// `http` namespace with async `get(url: str) -> str` and plain `sync_get`.
pub fn http_module() -> ObjectRef {
    let http = ObjectRef::namespace("http");
    http.set_attr(
        "get",
        Function::coroutine("get", |a: CallArgs| async move { Ok(Value::from(format!("body of {}", a.args[0]))) })
            .with_signature(Signature::new().typed("url", TypeHint::Str).returns(TypeHint::Str)),
    )
    .unwrap();
    http.set_attr("sync_get", Function::new("sync_get", |_: &CallArgs| Ok(Value::from("sync"))))
        .unwrap();
    http
}

pub fn instance_of(class: &ObjectRef) -> ObjectRef {
    match class.instantiate(&args![]).unwrap() {
        Value::Object(obj) => obj,
        other => panic!("expected an instance, got {other:?}"),
    }
}
