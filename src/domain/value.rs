//! Dynamic values flowing through mocked calls.
//!
//! [`Value`] is the currency of the object model: call arguments, return values,
//! attribute contents and raised exceptions are all values. Data variants compare
//! structurally, handle variants (objects, functions, awaitables, iterators) compare
//! by identity.

use crate::domain::errors::{MockError, MockResult};
use crate::domain::function::Function;
use crate::domain::object::ObjectRef;
use crate::domain::ports::AwaitableObserver;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Boxed future produced by awaitables.
pub type BoxFuture = Pin<Box<dyn Future<Output = MockResult<Value>> + Send>>;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_handle_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Object(ObjectRef),
    Function(Function),
    Awaitable(Awaitable),
    Iterator(ValueIter),
    Exception(Exception),
}

impl Value {
    /// Host-level type name, used in type errors and reprs.
    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Str(_) => "str".into(),
            Value::List(_) => "list".into(),
            Value::Dict(_) => "dict".into(),
            Value::Object(obj) => obj.type_name(),
            Value::Function(_) => "function".into(),
            Value::Awaitable(_) => "coroutine".into(),
            Value::Iterator(_) => "iterator".into(),
            Value::Exception(e) => e.kind.clone(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            _ => true,
        }
    }

    /// Whether calling this value is meaningful.
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Function(_) => true,
            Value::Object(obj) => obj.is_class() || obj.has_magic("__call__"),
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_awaitable(&self) -> Option<&Awaitable> {
        match self {
            Value::Awaitable(a) => Some(a),
            _ => None,
        }
    }

    /// Membership test used by container matchers: list elements, dict keys,
    /// substrings.
    pub fn contains(&self, needle: &Value) -> bool {
        match (self, needle) {
            (Value::List(items), _) => items.iter().any(|v| v == needle),
            (Value::Dict(map), Value::Str(key)) => map.contains_key(key),
            (Value::Str(hay), Value::Str(n)) => hay.contains(n.as_str()),
            _ => false,
        }
    }

    /// Length of sized values.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.len()),
            Value::Dict(d) => Some(d.len()),
            _ => None,
        }
    }

    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".into(),
            Value::Bool(true) => "True".into(),
            Value::Bool(false) => "False".into(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{f:.1}"),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Dict(map) => {
                let inner: Vec<String> = map.iter().map(|(k, v)| format!("'{k}': {}", v.repr())).collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Object(obj) => obj.repr(),
            Value::Function(f) => format!("<function {}>", f.name()),
            Value::Awaitable(a) => format!("<coroutine object {}>", a.label()),
            Value::Iterator(_) => "<iterator>".into(),
            Value::Exception(e) => format!("{}('{}')", e.kind, e.message),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Awaitable(a), Value::Awaitable(b)) => a.id() == b.id(),
            (Value::Iterator(a), Value::Iterator(b)) => Arc::ptr_eq(&a.items, &b.items),
            (Value::Exception(a), Value::Exception(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Dict(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<&ObjectRef> for Value {
    fn from(v: &ObjectRef) -> Self {
        Value::Object(v.clone())
    }
}

impl From<Function> for Value {
    fn from(v: Function) -> Self {
        Value::Function(v)
    }
}

impl From<Awaitable> for Value {
    fn from(v: Awaitable) -> Self {
        Value::Awaitable(v)
    }
}

impl From<Exception> for Value {
    fn from(v: Exception) -> Self {
        Value::Exception(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::None)
    }
}

/// A host-level exception: a kind (class name) and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub kind: String,
    pub message: String,
}

impl Exception {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Positional and keyword arguments of one call.
#[derive(Clone, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            kwargs: BTreeMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Returns a copy with `value` inserted as first positional argument.
    pub fn prepend(&self, value: Value) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(value);
        args.extend(self.args.iter().cloned());
        Self {
            args,
            kwargs: self.kwargs.clone(),
        }
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

impl fmt::Display for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.args.iter().map(Value::repr).collect();
        parts.extend(self.kwargs.iter().map(|(k, v)| format!("{k}={}", v.repr())));
        write!(f, "({})", parts.join(", "))
    }
}

impl fmt::Debug for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Builds [`CallArgs`] from positional values: `args![1, "a"]`.
#[macro_export]
macro_rules! args {
    () => { $crate::domain::value::CallArgs::empty() };
    ($($arg:expr),+ $(,)?) => {
        $crate::domain::value::CallArgs::new(vec![$($crate::domain::value::Value::from($arg)),+])
    };
}

/// Shared, single-pass iterator over values, as produced by yield behaviors.
#[derive(Clone)]
pub struct ValueIter {
    items: Arc<Mutex<std::vec::IntoIter<Value>>>,
}

impl ValueIter {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            items: Arc::new(Mutex::new(values.into_iter())),
        }
    }

    pub fn next_value(&self) -> Option<Value> {
        self.items.lock().next()
    }

    /// Drains every remaining value.
    pub fn drain(&self) -> Vec<Value> {
        self.items.lock().by_ref().collect()
    }
}

thread_local! {
    static OBSERVER: RefCell<Option<Arc<dyn AwaitableObserver>>> = const { RefCell::new(None) };
}

/// Restores the previously installed observer when dropped.
pub struct ObserverGuard {
    previous: Option<Arc<dyn AwaitableObserver>>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        OBSERVER.with(|o| *o.borrow_mut() = previous);
    }
}

/// Installs `observer` for awaitables created on this thread until the guard drops.
pub fn observe_awaitables(observer: Arc<dyn AwaitableObserver>) -> ObserverGuard {
    let previous = OBSERVER.with(|o| o.borrow_mut().replace(observer));
    ObserverGuard { previous }
}

fn current_observer() -> Option<Arc<dyn AwaitableObserver>> {
    OBSERVER.with(|o| o.borrow().clone())
}

struct AwaitableInner {
    id: u64,
    label: String,
    future: Mutex<Option<BoxFuture>>,
    awaited: AtomicBool,
    observer: Option<Arc<dyn AwaitableObserver>>,
}

/// A suspension-capable call result. It runs nothing until awaited, and can be
/// awaited exactly once.
#[derive(Clone)]
pub struct Awaitable {
    inner: Arc<AwaitableInner>,
}

impl Awaitable {
    pub fn new<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = MockResult<Value>> + Send + 'static,
    {
        let id = next_handle_id();
        let label = label.into();
        let observer = current_observer();
        if let Some(obs) = &observer {
            obs.created(id, &label);
        }
        Self {
            inner: Arc::new(AwaitableInner {
                id,
                label,
                future: Mutex::new(Some(Box::pin(future))),
                awaited: AtomicBool::new(false),
                observer,
            }),
        }
    }

    /// An awaitable resolving immediately to `value`.
    pub fn ready(label: impl Into<String>, value: Value) -> Self {
        Self::new(label, async move { Ok(value) })
    }

    /// An awaitable failing with `error` once awaited.
    pub fn failing(label: impl Into<String>, error: MockError) -> Self {
        Self::new(label, async move { Err(error) })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn was_awaited(&self) -> bool {
        self.inner.awaited.load(Ordering::SeqCst)
    }

    fn take(&self) -> MockResult<BoxFuture> {
        let future = self.inner.future.lock().take();
        match future {
            Some(fut) => {
                self.inner.awaited.store(true, Ordering::SeqCst);
                if let Some(obs) = &self.inner.observer {
                    obs.awaited(self.inner.id);
                }
                Ok(fut)
            }
            None => Err(MockError::raised(
                "RuntimeError",
                format!("cannot reuse already awaited coroutine {}", self.inner.label),
            )),
        }
    }
}

impl IntoFuture for Awaitable {
    type Output = MockResult<Value>;
    type IntoFuture = BoxFuture;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let fut = self.take()?;
            fut.await
        })
    }
}

impl fmt::Debug for Awaitable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Awaitable")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_float_compare_across_types() {
        assert_eq!(Value::from(2), Value::from(2.0));
        assert_ne!(Value::from(true), Value::from(1));
    }

    #[test]
    fn test_repr_matches_host_conventions() {
        let args = args![1, "a", true, ()].kwarg("flag", 2.0);
        assert_eq!(args.to_string(), "(1, 'a', True, None, flag=2.0)");
        assert_eq!(Value::List(vec![1.into(), "x".into()]).repr(), "[1, 'x']");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from(vec![Value::None]).is_truthy());
    }

    #[test]
    fn test_value_iter_is_single_pass() {
        let it = ValueIter::new(vec![1.into(), 2.into()]);
        let alias = it.clone();
        assert_eq!(it.next_value(), Some(Value::Int(1)));
        assert_eq!(alias.drain(), vec![Value::Int(2)]);
        assert_eq!(it.next_value(), None);
    }

    #[test]
    fn test_awaitable_can_only_be_awaited_once() {
        let aw = Awaitable::ready("job", Value::from(7));
        let again = aw.clone();
        let first = futures::executor::block_on(aw.into_future()).unwrap();
        assert_eq!(first, Value::Int(7));
        assert!(again.was_awaited());
        let second = futures::executor::block_on(again.into_future());
        assert!(matches!(second, Err(MockError::Raised(e)) if e.kind == "RuntimeError"));
    }
}
