//! Strict doubles: safe-by-default substitutes for a template class.
//!
//! A double starts with no attributes. Reading anything that was not configured
//! fails, and writing anything the template does not declare fails. Values written
//! into callable-shaped slots are wrapped with the template's signature (and, when
//! enabled, type) validation.

use crate::domain::errors::{MockError, MockResult};
use crate::domain::function::{Function, Signature};
use crate::domain::object::{Attr, ObjectId, ObjectRef, call_value};
use crate::domain::ports::RuntimeAttrDetector;
use crate::domain::recorder::CallSite;
use crate::domain::typing;
use crate::domain::value::{Awaitable, CallArgs, Value};
use std::collections::BTreeSet;
use std::ops::Deref;
use std::panic::Location;
use std::sync::Arc;

const CONTEXT_MANAGER_PAIRS: [(&str, &str, bool); 2] =
    [("__enter__", "__exit__", false), ("__aenter__", "__aexit__", true)];

/// Configuration of a new double.
#[derive(Clone)]
pub struct DoubleOptions {
    template: Option<ObjectRef>,
    name: Option<String>,
    runtime_attrs: Vec<String>,
    default_context_manager: bool,
    type_validation: bool,
    type_validation_exclusions: Vec<String>,
    detector: Option<Arc<dyn RuntimeAttrDetector>>,
}

impl DoubleOptions {
    pub fn new() -> Self {
        Self {
            template: None,
            name: None,
            runtime_attrs: Vec::new(),
            default_context_manager: true,
            type_validation: true,
            type_validation_exclusions: Vec::new(),
            detector: None,
        }
    }

    pub fn template(mut self, template: &ObjectRef) -> Self {
        self.template = Some(template.clone());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attributes the template only assigns at runtime.
    pub fn runtime_attrs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runtime_attrs.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn default_context_manager(mut self, enabled: bool) -> Self {
        self.default_context_manager = enabled;
        self
    }

    pub fn type_validation(mut self, enabled: bool) -> Self {
        self.type_validation = enabled;
        self
    }

    pub fn skip_type_validation(mut self, attribute: impl Into<String>) -> Self {
        self.type_validation_exclusions.push(attribute.into());
        self
    }

    /// Scans the template's constructor source for runtime attributes.
    pub fn detector(mut self, detector: Arc<dyn RuntimeAttrDetector>) -> Self {
        self.detector = Some(detector);
        self
    }
}

impl Default for DoubleOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a double, stored in its object's kind.
#[derive(Debug, Clone)]
pub struct DoubleData {
    template: Option<ObjectRef>,
    name: Option<String>,
    runtime_attrs: BTreeSet<String>,
    detected_attrs: BTreeSet<String>,
    type_validation: bool,
    exclusions: BTreeSet<String>,
    default_context_manager: bool,
    defaults: BTreeSet<String>,
    created_at: Option<CallSite>,
}

impl DoubleData {
    pub fn template(&self) -> Option<&ObjectRef> {
        self.template.as_ref()
    }

    pub(crate) fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| "StrictMock".into())
    }

    pub(crate) fn type_name(&self) -> String {
        self.template
            .as_ref()
            .map(|t| t.name())
            .unwrap_or_else(|| "StrictMock".into())
    }

    pub(crate) fn repr(&self, id: ObjectId) -> String {
        let mut out = format!("<StrictMock {id}");
        if let Some(name) = &self.name {
            out.push_str(&format!(" name='{name}'"));
        }
        if let Some(template) = &self.template {
            out.push_str(&format!(" template={}", template.name()));
        }
        if let Some(site) = &self.created_at {
            out.push_str(&format!(" {site}"));
        }
        out.push('>');
        out
    }

    fn checks_types_of(&self, name: &str) -> bool {
        self.type_validation && !self.exclusions.contains(name)
    }
}

/// Attribute names a double of `template` may hold.
fn interface_of(data: &DoubleData, template: &ObjectRef) -> BTreeSet<String> {
    let mut names = template.class_attr_names();
    names.extend(template.annotation_names());
    names.extend(template.slot_names());
    names.extend(data.runtime_attrs.iter().cloned());
    names.extend(data.detected_attrs.iter().cloned());
    names
}

fn snapshot(obj: &ObjectRef) -> MockResult<DoubleData> {
    obj.with_double(Clone::clone)
        .ok_or_else(|| MockError::InvalidUsage(format!("{} is not a strict double", obj.repr())))
}

/// Whether the double's template declares `name` (always true without a template).
pub fn allows_attr(obj: &ObjectRef, name: &str) -> bool {
    match snapshot(obj) {
        Ok(data) => match &data.template {
            Some(template) => interface_of(&data, template).contains(name),
            None => true,
        },
        Err(_) => false,
    }
}

/// Whether values and calls of `name` on the double are type checked.
pub fn checks_types(obj: &ObjectRef, name: &str) -> bool {
    obj.with_double(|d| d.checks_types_of(name)).unwrap_or(true)
}

pub(crate) fn get_attr(obj: &ObjectRef, name: &str) -> MockResult<Value> {
    if let Some(attr) = obj.own_attr(name) {
        return Ok(match attr {
            Attr::Data(v) => v,
            other => other.function().cloned().map(Value::Function).unwrap_or_default(),
        });
    }
    let data = snapshot(obj)?;
    match &data.template {
        Some(template) if !interface_of(&data, template).contains(name) => Err(MockError::NoSuchAttribute {
            target: obj.repr(),
            attribute: name.to_string(),
        }),
        _ => Err(MockError::UndefinedBehavior {
            double: obj.repr(),
            attribute: name.to_string(),
        }),
    }
}

pub(crate) fn set_attr(obj: &ObjectRef, name: &str, value: Value) -> MockResult<()> {
    let stored = validate_write(obj, name, value)?;
    obj.set_own_attr(name, Attr::Data(stored));
    obj.with_double_mut(|d| d.defaults.remove(name));
    Ok(())
}

pub(crate) fn del_attr(obj: &ObjectRef, name: &str) -> MockResult<()> {
    obj.remove_own_attr(name);
    obj.with_double_mut(|d| d.defaults.remove(name));
    Ok(())
}

/// Checks a write against the template interface and returns the value to store,
/// wrapped with validation for callable-shaped slots.
pub fn validate_write(obj: &ObjectRef, name: &str, value: Value) -> MockResult<Value> {
    let data = snapshot(obj)?;
    let Some(template) = &data.template else {
        return Ok(value);
    };
    if !interface_of(&data, template).contains(name) {
        return Err(MockError::CanNotSetNonExistentAttribute {
            double: obj.repr(),
            attribute: name.to_string(),
        });
    }
    let check_types = data.checks_types_of(name);
    let context = format!("{}, '{name}'", obj.repr());
    match template.lookup_class_attr(name) {
        Some((_, attr)) if attr.is_callable() => {
            let function = match value {
                Value::Function(f) => f,
                other if other.is_callable() => {
                    Function::new(name, move |args: &CallArgs| call_value(&other, args))
                }
                _ => {
                    return Err(MockError::NonCallableValue {
                        double: obj.repr(),
                        attribute: name.to_string(),
                    });
                }
            };
            Ok(Value::Function(wrap_callable(&context, &attr, function, check_types)))
        }
        Some((_, Attr::Property { getter, .. })) => {
            if check_types
                && let Some(hint) = getter.as_ref().and_then(|g| g.signature()).and_then(|s| s.returns.clone())
            {
                typing::check_value(&context, name, &hint, &value)?;
            }
            Ok(value)
        }
        _ => {
            if check_types && let Some(hint) = template.annotation(name) {
                typing::check_value(&context, name, &hint, &value)?;
            }
            Ok(value)
        }
    }
}

/// Signature of `attr` as seen by callers of the double.
pub fn callable_signature(attr: &Attr) -> Option<Signature> {
    let sig = attr.function()?.signature()?;
    Some(match attr {
        Attr::Method(_) | Attr::ClassMethod(_) => sig.without_first(),
        _ => sig.clone(),
    })
}

fn wrap_callable(context: &str, attr: &Attr, function: Function, check_types: bool) -> Function {
    let validated = match callable_signature(attr) {
        Some(sig) => function.with_validation(context, sig, check_types),
        None => function,
    };
    let is_async = attr.function().is_some_and(Function::is_coroutine);
    if !is_async {
        return validated;
    }
    let target = context.to_string();
    Function::new(validated.name().to_string(), move |args: &CallArgs| {
        let result = validated.call_inner(args)?;
        match result {
            Value::Awaitable(_) => Ok(result),
            other => Err(MockError::NonAwaitableReturn {
                target: target.clone(),
                received: other.repr(),
            }),
        }
    })
    .as_coroutine()
}

fn install_context_manager(obj: &ObjectRef, data: &DoubleData) -> BTreeSet<String> {
    let mut installed = BTreeSet::new();
    let Some(template) = &data.template else {
        return installed;
    };
    if !data.default_context_manager {
        return installed;
    }
    for (enter, exit, is_async) in CONTEXT_MANAGER_PAIRS {
        if template.lookup_class_attr(enter).is_none() || template.lookup_class_attr(exit).is_none() {
            continue;
        }
        let this = obj.downgrade();
        let enter_fn = Function::new(enter, move |_: &CallArgs| {
            let value = this.upgrade().map(Value::Object).unwrap_or_default();
            Ok(if is_async {
                Value::Awaitable(Awaitable::ready("__aenter__", value))
            } else {
                value
            })
        });
        let exit_fn = Function::new(exit, move |_: &CallArgs| {
            Ok(if is_async {
                Value::Awaitable(Awaitable::ready("__aexit__", Value::None))
            } else {
                Value::None
            })
        });
        obj.set_own_attr(enter, Attr::Data(Value::Function(enter_fn)));
        obj.set_own_attr(exit, Attr::Data(Value::Function(exit_fn)));
        installed.insert(enter.to_string());
        installed.insert(exit.to_string());
    }
    installed
}

/// Handle to a strict double. Dereferences to the underlying object so it can be
/// used anywhere an [`ObjectRef`] is expected, including as a mock container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrictDouble(ObjectRef);

impl StrictDouble {
    #[track_caller]
    pub fn new(options: DoubleOptions) -> MockResult<Self> {
        let created_at = CallSite::from_location(Location::caller());
        if let Some(template) = &options.template
            && !template.is_class()
        {
            return Err(MockError::InvalidUsage("Template must be a class.".into()));
        }
        let detected_attrs = match (&options.template, &options.detector) {
            (Some(template), Some(detector)) => template
                .init_sources()
                .iter()
                .flat_map(|src| detector.detect(src))
                .collect(),
            _ => BTreeSet::new(),
        };
        let data = DoubleData {
            template: options.template,
            name: options.name,
            runtime_attrs: options.runtime_attrs.into_iter().collect(),
            detected_attrs,
            type_validation: options.type_validation,
            exclusions: options.type_validation_exclusions.into_iter().collect(),
            default_context_manager: options.default_context_manager,
            defaults: BTreeSet::new(),
            created_at: Some(created_at),
        };
        Ok(Self::from_data(data))
    }

    fn from_data(mut data: DoubleData) -> Self {
        data.defaults.clear();
        let obj = ObjectRef::new_double(data.clone());
        let installed = install_context_manager(&obj, &data);
        obj.with_double_mut(|d| d.defaults = installed);
        Self(obj)
    }

    /// Independent double with identical configured behavior.
    pub fn copy(&self) -> MockResult<StrictDouble> {
        let data = snapshot(&self.0)?;
        let defaults = data.defaults.clone();
        let copy = Self::from_data(data);
        for name in self.0.own_attr_names() {
            if defaults.contains(&name) {
                continue;
            }
            if let Some(attr) = self.0.own_attr(&name) {
                copy.0.set_own_attr(name.as_str(), attr);
                copy.0.with_double_mut(|d| d.defaults.remove(&name));
            }
        }
        Ok(copy)
    }
}

impl Deref for StrictDouble {
    type Target = ObjectRef;

    fn deref(&self) -> &ObjectRef {
        &self.0
    }
}

impl From<StrictDouble> for Value {
    fn from(double: StrictDouble) -> Self {
        Value::Object(double.0)
    }
}

impl From<&StrictDouble> for Value {
    fn from(double: &StrictDouble) -> Self {
        Value::Object(double.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::domain::object::ClassBuilder;
    use crate::domain::typing::TypeHint;

    fn calculator() -> ObjectRef {
        ClassBuilder::new("Calculator")
            .method(
                "is_odd",
                Function::new("is_odd", |a: &CallArgs| Ok(Value::Bool(a.args[1].as_int().unwrap_or(0) % 2 == 1)))
                    .with_signature(Signature::new().param("self").typed("x", TypeHint::Int).returns(TypeHint::Bool)),
            )
            .annotate("precision", TypeHint::Int)
            .build()
    }

    #[test]
    fn test_unset_read_fails_every_time() {
        let double = StrictDouble::new(DoubleOptions::new().template(&calculator())).unwrap();
        for _ in 0..2 {
            assert!(matches!(double.get_attr("is_odd"), Err(MockError::UndefinedBehavior { .. })));
        }
        assert!(matches!(double.get_attr("nope"), Err(MockError::NoSuchAttribute { .. })));
    }

    #[test]
    fn test_write_then_read_returns_value() {
        let double = StrictDouble::new(DoubleOptions::new().template(&calculator())).unwrap();
        double.set_attr("precision", 3).unwrap();
        assert_eq!(double.get_attr("precision").unwrap(), Value::Int(3));
        assert!(matches!(
            double.set_attr("precision", "high"),
            Err(MockError::TypeCheckError { .. })
        ));
        double.del_attr("precision").unwrap();
        assert!(matches!(double.get_attr("precision"), Err(MockError::UndefinedBehavior { .. })));
    }

    #[test]
    fn test_callable_slot_requires_callable() {
        let double = StrictDouble::new(DoubleOptions::new().template(&calculator())).unwrap();
        assert!(matches!(
            double.set_attr("is_odd", 1),
            Err(MockError::NonCallableValue { .. })
        ));
        assert!(matches!(
            double.set_attr("missing", 1),
            Err(MockError::CanNotSetNonExistentAttribute { .. })
        ));
    }

    #[test]
    fn test_no_template_accepts_any_write() {
        let double = StrictDouble::new(DoubleOptions::new().name("free")).unwrap();
        double.set_attr("anything", 1).unwrap();
        assert_eq!(double.get_attr("anything").unwrap(), Value::Int(1));
        assert!(matches!(double.get_attr("other"), Err(MockError::UndefinedBehavior { .. })));
        assert!(double.repr().contains("name='free'"));
    }

    #[test]
    fn test_copy_is_independent() {
        let double = StrictDouble::new(DoubleOptions::new().template(&calculator())).unwrap();
        double.set_attr("precision", 1).unwrap();
        let copy = double.copy().unwrap();
        assert_eq!(copy.get_attr("precision").unwrap(), Value::Int(1));
        copy.set_attr("precision", 2).unwrap();
        assert_eq!(double.get_attr("precision").unwrap(), Value::Int(1));
        assert_ne!(copy.id(), double.id());
    }

    #[test]
    fn test_default_context_manager_yields_itself() {
        let noop = || Function::new("noop", |_: &CallArgs| Ok(Value::None));
        let resource = ClassBuilder::new("Resource")
            .method("__enter__", noop())
            .method("__exit__", noop())
            .build();
        let double = StrictDouble::new(DoubleOptions::new().template(&resource)).unwrap();
        let entered = double.invoke_magic("__enter__", &args![]).unwrap();
        assert_eq!(entered, Value::from(&double));
        assert_eq!(double.invoke_magic("__exit__", &args![(), (), ()]).unwrap(), Value::None);

        let copy = double.copy().unwrap();
        assert_eq!(copy.invoke_magic("__enter__", &args![]).unwrap(), Value::from(&copy));
    }
}
