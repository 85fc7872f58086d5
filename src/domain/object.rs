//! The dynamic object model mocks operate on.
//!
//! Objects are shared handles ([`ObjectRef`]) to an attribute table plus a kind:
//! namespaces (modules), classes, instances and strict doubles. Attribute lookup is
//! descriptor-aware and follows the host language's precedence:
//!
//! 1. the per-instance override table of the instance's class (the trampoline used to
//!    patch methods, properties and magic methods of a single instance),
//! 2. properties found on the class chain,
//! 3. the instance's own attributes,
//! 4. everything else found on the class chain, bound as appropriate.
//!
//! Production code that dispatches through [`ObjectRef::get_attr`],
//! [`ObjectRef::call_method`] or [`ObjectRef::instantiate`] is interceptable by the
//! patch manager.

use crate::domain::errors::{MockError, MockResult};
use crate::domain::function::Function;
use crate::domain::strict::{self, DoubleData};
use crate::domain::typing::TypeHint;
use crate::domain::value::{CallArgs, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Descriptor kinds stored in attribute tables.
#[derive(Debug, Clone)]
pub enum Attr {
    Data(Value),
    /// Receives the instance as first argument.
    Method(Function),
    /// Receives the class as first argument.
    ClassMethod(Function),
    StaticMethod(Function),
    Property {
        getter: Option<Function>,
        setter: Option<Function>,
    },
}

impl Attr {
    /// Callable-shaped attributes: methods of any kind and function data.
    pub fn is_callable(&self) -> bool {
        match self {
            Attr::Method(_) | Attr::ClassMethod(_) | Attr::StaticMethod(_) => true,
            Attr::Data(v) => v.is_callable(),
            Attr::Property { .. } => false,
        }
    }

    /// The underlying function of callable attributes.
    pub fn function(&self) -> Option<&Function> {
        match self {
            Attr::Method(f) | Attr::ClassMethod(f) | Attr::StaticMethod(f) => Some(f),
            Attr::Data(Value::Function(f)) => Some(f),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ClassData {
    pub(crate) name: String,
    pub(crate) base: Option<ObjectRef>,
    pub(crate) overrides: HashMap<(ObjectId, String), Value>,
    pub(crate) annotations: BTreeMap<String, TypeHint>,
    pub(crate) slots: Vec<String>,
    pub(crate) init_source: Option<String>,
    pub(crate) factory: Option<Function>,
}

#[derive(Debug)]
pub enum ObjectKind {
    Namespace { name: String },
    Class(ClassData),
    Instance { class: ObjectRef },
    Double(DoubleData),
}

#[derive(Debug)]
pub struct ObjectData {
    kind: ObjectKind,
    attrs: BTreeMap<String, Attr>,
}

/// Shared handle to an object. Equality and hashing are by identity.
#[derive(Clone)]
pub struct ObjectRef {
    id: ObjectId,
    inner: Arc<RwLock<ObjectData>>,
}

/// Non-owning handle, used where an object refers back to itself.
#[derive(Clone)]
pub struct WeakObjectRef {
    id: ObjectId,
    inner: Weak<RwLock<ObjectData>>,
}

impl WeakObjectRef {
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.inner.upgrade().map(|inner| ObjectRef { id: self.id, inner })
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

fn no_attribute(obj: &ObjectRef, name: &str) -> MockError {
    MockError::NoSuchAttribute {
        target: obj.repr(),
        attribute: name.to_string(),
    }
}

impl ObjectRef {
    fn from_kind(kind: ObjectKind, attrs: BTreeMap<String, Attr>) -> Self {
        Self {
            id: ObjectId::next(),
            inner: Arc::new(RwLock::new(ObjectData { kind, attrs })),
        }
    }

    /// A module-like container.
    pub fn namespace(name: impl Into<String>) -> Self {
        Self::from_kind(ObjectKind::Namespace { name: name.into() }, BTreeMap::new())
    }

    pub(crate) fn new_double(data: DoubleData) -> Self {
        Self::from_kind(ObjectKind::Double(data), BTreeMap::new())
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef {
            id: self.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.inner.read().kind, ObjectKind::Namespace { .. })
    }

    pub fn is_class(&self) -> bool {
        matches!(self.inner.read().kind, ObjectKind::Class(_))
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.inner.read().kind, ObjectKind::Instance { .. })
    }

    pub fn is_double(&self) -> bool {
        matches!(self.inner.read().kind, ObjectKind::Double(_))
    }

    /// Name of a namespace or class; class name for instances.
    pub fn name(&self) -> String {
        match &self.inner.read().kind {
            ObjectKind::Namespace { name } => name.clone(),
            ObjectKind::Class(c) => c.name.clone(),
            ObjectKind::Instance { class } => class.name(),
            ObjectKind::Double(d) => d.display_name(),
        }
    }

    pub fn type_name(&self) -> String {
        match &self.inner.read().kind {
            ObjectKind::Namespace { .. } => "module".into(),
            ObjectKind::Class(_) => "type".into(),
            ObjectKind::Instance { class } => class.name(),
            ObjectKind::Double(d) => d.type_name(),
        }
    }

    pub fn repr(&self) -> String {
        let guard = self.inner.read();
        match &guard.kind {
            ObjectKind::Namespace { name } => format!("<module '{name}'>"),
            ObjectKind::Class(c) => format!("<class '{}'>", c.name),
            ObjectKind::Instance { class } => format!("<{} object at {}>", class.name(), self.id),
            ObjectKind::Double(d) => d.repr(self.id),
        }
    }

    /// Class of an instance.
    pub fn class_of(&self) -> Option<ObjectRef> {
        match &self.inner.read().kind {
            ObjectKind::Instance { class } => Some(class.clone()),
            _ => None,
        }
    }

    /// Base class of a class.
    pub fn base(&self) -> Option<ObjectRef> {
        match &self.inner.read().kind {
            ObjectKind::Class(c) => c.base.clone(),
            _ => None,
        }
    }

    /// The class and its bases, most derived first.
    pub fn class_chain(&self) -> Vec<ObjectRef> {
        let mut chain = Vec::new();
        let mut current = Some(self.clone());
        while let Some(class) = current {
            current = class.base();
            chain.push(class);
        }
        chain
    }

    pub fn is_subclass_of(&self, other: &ObjectRef) -> bool {
        self.class_chain().iter().any(|c| c == other)
    }

    /// Whether this object can stand in for an instance of `class`.
    pub fn conforms_to(&self, class: &ObjectRef) -> bool {
        match &self.inner.read().kind {
            ObjectKind::Instance { class: own } => own.is_subclass_of(class),
            ObjectKind::Double(d) => d.template().is_none_or(|t| t.is_subclass_of(class)),
            _ => false,
        }
    }

    pub(crate) fn with_double<R>(&self, f: impl FnOnce(&DoubleData) -> R) -> Option<R> {
        match &self.inner.read().kind {
            ObjectKind::Double(d) => Some(f(d)),
            _ => None,
        }
    }

    pub(crate) fn with_double_mut<R>(&self, f: impl FnOnce(&mut DoubleData) -> R) -> Option<R> {
        match &mut self.inner.write().kind {
            ObjectKind::Double(d) => Some(f(d)),
            _ => None,
        }
    }

    fn with_class<R>(&self, f: impl FnOnce(&ClassData) -> R) -> Option<R> {
        match &self.inner.read().kind {
            ObjectKind::Class(c) => Some(f(c)),
            _ => None,
        }
    }

    fn with_class_mut<R>(&self, f: impl FnOnce(&mut ClassData) -> R) -> Option<R> {
        match &mut self.inner.write().kind {
            ObjectKind::Class(c) => Some(f(c)),
            _ => None,
        }
    }

    // Raw attribute table access, bypassing descriptors and validation.

    pub fn own_attr(&self, name: &str) -> Option<Attr> {
        self.inner.read().attrs.get(name).cloned()
    }

    pub fn set_own_attr(&self, name: impl Into<String>, attr: Attr) -> Option<Attr> {
        self.inner.write().attrs.insert(name.into(), attr)
    }

    pub fn remove_own_attr(&self, name: &str) -> Option<Attr> {
        self.inner.write().attrs.remove(name)
    }

    pub fn own_attr_names(&self) -> Vec<String> {
        self.inner.read().attrs.keys().cloned().collect()
    }

    /// Finds `name` on this class or its bases, returning the defining class.
    pub fn lookup_class_attr(&self, name: &str) -> Option<(ObjectRef, Attr)> {
        self.class_chain()
            .into_iter()
            .find_map(|class| class.own_attr(name).map(|attr| (class, attr)))
    }

    /// Names defined anywhere on the class chain.
    pub fn class_attr_names(&self) -> BTreeSet<String> {
        self.class_chain()
            .iter()
            .flat_map(|c| c.own_attr_names())
            .collect()
    }

    /// Declared annotation of `name` on the class chain.
    pub fn annotation(&self, name: &str) -> Option<TypeHint> {
        self.class_chain()
            .iter()
            .find_map(|c| c.with_class(|d| d.annotations.get(name).cloned()).flatten())
    }

    pub fn annotation_names(&self) -> BTreeSet<String> {
        self.class_chain()
            .iter()
            .filter_map(|c| c.with_class(|d| d.annotations.keys().cloned().collect::<Vec<_>>()))
            .flatten()
            .collect()
    }

    pub fn slot_names(&self) -> BTreeSet<String> {
        self.class_chain()
            .iter()
            .filter_map(|c| c.with_class(|d| d.slots.clone()))
            .flatten()
            .collect()
    }

    /// Constructor source texts along the class chain.
    pub fn init_sources(&self) -> Vec<String> {
        self.class_chain()
            .iter()
            .filter_map(|c| c.with_class(|d| d.init_source.clone()).flatten())
            .collect()
    }

    pub fn instance_override(&self, instance: ObjectId, name: &str) -> Option<Value> {
        self.with_class(|c| c.overrides.get(&(instance, name.to_string())).cloned())
            .flatten()
    }

    pub fn set_instance_override(&self, instance: ObjectId, name: &str, value: Value) -> Option<Value> {
        self.with_class_mut(|c| c.overrides.insert((instance, name.to_string()), value))
            .flatten()
    }

    pub fn remove_instance_override(&self, instance: ObjectId, name: &str) -> Option<Value> {
        self.with_class_mut(|c| c.overrides.remove(&(instance, name.to_string())))
            .flatten()
    }

    /// Construction hook of this class (not inherited).
    pub fn factory(&self) -> Option<Function> {
        self.with_class(|c| c.factory.clone()).flatten()
    }

    pub fn set_factory(&self, factory: Option<Function>) -> Option<Function> {
        self.with_class_mut(|c| std::mem::replace(&mut c.factory, factory))
            .flatten()
    }

    fn bind_class_attr(&self, attr: Attr, class: &ObjectRef) -> Value {
        match attr {
            Attr::Data(v) => v,
            Attr::Method(f) => Value::Function(f.bind(Value::Object(self.clone()))),
            Attr::ClassMethod(f) => Value::Function(f.bind(Value::Object(class.clone()))),
            Attr::StaticMethod(f) => Value::Function(f),
            Attr::Property { getter, .. } => getter.map(Value::Function).unwrap_or_default(),
        }
    }

    /// Descriptor-aware attribute read.
    pub fn get_attr(&self, name: &str) -> MockResult<Value> {
        if self.is_double() {
            return strict::get_attr(self, name);
        }
        if let Some(class) = self.class_of() {
            return self.instance_get_attr(&class, name);
        }
        if self.is_class() {
            return match self.lookup_class_attr(name) {
                Some((_, Attr::Method(f))) => Ok(Value::Function(f)),
                Some((_, attr)) => Ok(self.bind_class_attr(attr, self)),
                None => Err(no_attribute(self, name)),
            };
        }
        match self.own_attr(name) {
            Some(Attr::Data(v)) => Ok(v),
            Some(attr) => Ok(attr.function().cloned().map(Value::Function).unwrap_or_default()),
            None => Err(no_attribute(self, name)),
        }
    }

    fn instance_get_attr(&self, class: &ObjectRef, name: &str) -> MockResult<Value> {
        if let Some(value) = class.instance_override(self.id, name) {
            return Ok(value);
        }
        let class_attr = class.lookup_class_attr(name);
        if let Some((_, Attr::Property { getter, .. })) = &class_attr {
            return match getter {
                Some(g) => g.call_inner(&CallArgs::new(vec![Value::Object(self.clone())])),
                None => Err(MockError::raised(
                    "AttributeError",
                    format!("unreadable attribute '{name}'"),
                )),
            };
        }
        if let Some(attr) = self.own_attr(name) {
            return Ok(match attr {
                Attr::Data(v) => v,
                other => other.function().cloned().map(Value::Function).unwrap_or_default(),
            });
        }
        match class_attr {
            Some((_, attr)) => Ok(self.bind_class_attr(attr, class)),
            None => Err(no_attribute(self, name)),
        }
    }

    /// Whether a read of `name` would find something, without running getters.
    pub fn has_attr(&self, name: &str) -> bool {
        if self.is_double() {
            return self.own_attr(name).is_some();
        }
        if let Some(class) = self.class_of() {
            return class.instance_override(self.id, name).is_some()
                || self.own_attr(name).is_some()
                || class.lookup_class_attr(name).is_some();
        }
        if self.is_class() {
            return self.lookup_class_attr(name).is_some();
        }
        self.own_attr(name).is_some()
    }

    /// Descriptor-aware attribute write.
    pub fn set_attr(&self, name: &str, value: impl Into<Value>) -> MockResult<()> {
        let value = value.into();
        if self.is_double() {
            return strict::set_attr(self, name, value);
        }
        if let Some(class) = self.class_of()
            && let Some((_, Attr::Property { setter, .. })) = class.lookup_class_attr(name)
        {
            return match setter {
                Some(s) => s
                    .call_inner(&CallArgs::new(vec![Value::Object(self.clone()), value]))
                    .map(|_| ()),
                None => Err(MockError::raised(
                    "AttributeError",
                    format!("can't set attribute '{name}'"),
                )),
            };
        }
        self.set_own_attr(name, Attr::Data(value));
        Ok(())
    }

    pub fn del_attr(&self, name: &str) -> MockResult<()> {
        if self.is_double() {
            return strict::del_attr(self, name);
        }
        match self.remove_own_attr(name) {
            Some(_) => Ok(()),
            None => Err(no_attribute(self, name)),
        }
    }

    /// Reads `name` and calls it.
    #[track_caller]
    pub fn call_method(&self, name: &str, args: &CallArgs) -> MockResult<Value> {
        let callable = self.get_attr(name)?;
        call_value(&callable, args)
    }

    /// Calls the object itself: classes construct, other objects dispatch `__call__`.
    #[track_caller]
    pub fn call(&self, args: &CallArgs) -> MockResult<Value> {
        if self.is_class() {
            self.instantiate(args)
        } else {
            self.invoke_magic("__call__", args)
        }
    }

    /// Whether a magic method is reachable through type-level dispatch.
    pub fn has_magic(&self, name: &str) -> bool {
        if self.is_double() {
            return self.own_attr(name).is_some();
        }
        match self.class_of() {
            Some(class) => {
                class.instance_override(self.id, name).is_some()
                    || class.lookup_class_attr(name).is_some()
            }
            None => false,
        }
    }

    /// Dispatches a magic method the way the host does: through the type, never the
    /// instance's own attributes. Per-instance overrides are honored.
    #[track_caller]
    pub fn invoke_magic(&self, name: &str, args: &CallArgs) -> MockResult<Value> {
        if self.is_double() {
            let callable = strict::get_attr(self, name)?;
            return call_value(&callable, args);
        }
        let unsupported = || {
            MockError::raised(
                "TypeError",
                format!("'{}' object does not support '{name}'", self.type_name()),
            )
        };
        let Some(class) = self.class_of() else {
            return Err(unsupported());
        };
        if let Some(value) = class.instance_override(self.id, name) {
            return call_value(&value, args);
        }
        match class.lookup_class_attr(name) {
            Some((_, Attr::Property { .. })) | None => Err(unsupported()),
            Some((_, attr)) => call_value(&self.bind_class_attr(attr, &class), args),
        }
    }

    /// Constructs an instance, going through the class's factory hook if one is
    /// installed on this exact class.
    #[track_caller]
    pub fn instantiate(&self, args: &CallArgs) -> MockResult<Value> {
        if !self.is_class() {
            return Err(MockError::raised(
                "TypeError",
                format!("'{}' object is not callable", self.type_name()),
            ));
        }
        match self.factory() {
            Some(factory) => factory.call(args),
            None => self.construct_original(args),
        }
    }

    /// Constructs a real instance, bypassing any factory hook.
    pub fn construct_original(&self, args: &CallArgs) -> MockResult<Value> {
        if !self.is_class() {
            return Err(MockError::raised(
                "TypeError",
                format!("'{}' object is not a class", self.type_name()),
            ));
        }
        let instance = ObjectRef::from_kind(
            ObjectKind::Instance {
                class: self.clone(),
            },
            BTreeMap::new(),
        );
        match self.lookup_class_attr("__init__") {
            Some((_, Attr::Method(init))) => {
                init.bind(Value::Object(instance.clone())).call_inner(args)?;
            }
            _ if !args.is_empty() => {
                return Err(MockError::raised(
                    "TypeError",
                    format!("{}() takes no arguments", self.name()),
                ));
            }
            _ => {}
        }
        Ok(Value::Object(instance))
    }
}

/// Calls any callable value.
#[track_caller]
pub fn call_value(callable: &Value, args: &CallArgs) -> MockResult<Value> {
    match callable {
        Value::Function(f) => f.call(args),
        Value::Object(obj) => obj.call(args),
        other => Err(MockError::raised(
            "TypeError",
            format!("'{}' object is not callable", other.type_name()),
        )),
    }
}

/// Declarative construction of classes.
pub struct ClassBuilder {
    data: ClassData,
    attrs: BTreeMap<String, Attr>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            data: ClassData {
                name: name.into(),
                ..ClassData::default()
            },
            attrs: BTreeMap::new(),
        }
    }

    pub fn base(mut self, base: &ObjectRef) -> Self {
        self.data.base = Some(base.clone());
        self
    }

    pub fn method(mut self, name: &str, f: Function) -> Self {
        self.attrs.insert(name.to_string(), Attr::Method(f));
        self
    }

    pub fn classmethod(mut self, name: &str, f: Function) -> Self {
        self.attrs.insert(name.to_string(), Attr::ClassMethod(f));
        self
    }

    pub fn staticmethod(mut self, name: &str, f: Function) -> Self {
        self.attrs.insert(name.to_string(), Attr::StaticMethod(f));
        self
    }

    pub fn property(mut self, name: &str, getter: Function, setter: Option<Function>) -> Self {
        self.attrs.insert(
            name.to_string(),
            Attr::Property {
                getter: Some(getter),
                setter,
            },
        );
        self
    }

    pub fn data(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.to_string(), Attr::Data(value.into()));
        self
    }

    pub fn annotate(mut self, name: &str, hint: TypeHint) -> Self {
        self.data.annotations.insert(name.to_string(), hint);
        self
    }

    pub fn slot(mut self, name: &str) -> Self {
        self.data.slots.push(name.to_string());
        self
    }

    /// Constructor body, scanned for runtime attributes by strict doubles.
    pub fn init_source(mut self, source: &str) -> Self {
        self.data.init_source = Some(source.to_string());
        self
    }

    pub fn build(self) -> ObjectRef {
        ObjectRef::from_kind(ObjectKind::Class(self.data), self.attrs)
    }
}
