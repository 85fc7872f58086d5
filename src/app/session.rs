//! The per-test mocking scope.
//!
//! A [`MockSession`] owns the behavior registry, the patch manager and every
//! deferred assertion of one test. All entry points (`mock_callable`,
//! `mock_async_callable`, `mock_constructor`, `patch_attribute`) go through it, and
//! [`MockSession::teardown`] evaluates assertions and restores every patch.

use crate::app::dsl::MockCallable;
use crate::domain::errors::{FailureCollector, MockError, MockResult};
use crate::domain::function::{Function, Signature};
use crate::domain::object::{Attr, ObjectRef, call_value};
use crate::domain::patch::{PatchKind, PatchManager, PatchSite, SiteContent};
use crate::domain::recorder::{self, OrderedCall, SequenceCounter};
use crate::domain::registry::{BehaviorRegistry, BindingHandle, CallableMock, MockKind, MockSettings, MockTarget};
use crate::domain::strict::{self, DoubleOptions, StrictDouble};
use crate::domain::typing::{self, TypeHint};
use crate::domain::value::{CallArgs, Value};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Per-call options of the patching entry points.
#[derive(Debug, Clone, Copy)]
pub struct MockOptions {
    pub type_validation: bool,
    pub allow_private: bool,
    pub callable_returns_coroutine: bool,
    pub allow_missing: bool,
}

impl MockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_validation(mut self, enabled: bool) -> Self {
        self.type_validation = enabled;
        self
    }

    pub fn allow_private(mut self, allowed: bool) -> Self {
        self.allow_private = allowed;
        self
    }

    /// Lets an async mock replace a plain callable that returns awaitables, and
    /// lets a sync mock return awaitables.
    pub fn callable_returns_coroutine(mut self, enabled: bool) -> Self {
        self.callable_returns_coroutine = enabled;
        self
    }

    /// Lets the entry points create attributes that do not exist yet.
    pub fn allow_missing(mut self, allowed: bool) -> Self {
        self.allow_missing = allowed;
        self
    }
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            type_validation: true,
            allow_private: false,
            callable_returns_coroutine: false,
            allow_missing: false,
        }
    }
}

type DeferredAssertion = Box<dyn FnOnce() -> MockResult<()> + Send>;

struct SessionInner {
    registry: BehaviorRegistry,
    patches: PatchManager,
    counter: SequenceCounter,
    assertions: Mutex<Vec<DeferredAssertion>>,
    ordered: Mutex<Vec<BindingHandle>>,
    torn_down: AtomicBool,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if !self.torn_down.load(Ordering::SeqCst) && !self.patches.is_empty() {
            warn!(patches = self.patches.len(), "session dropped without teardown; restoring patches");
            if let Err(e) = self.patches.unpatch_all() {
                warn!(error = %e, "restoring patches failed");
            }
        }
    }
}

/// Where and how a callable proxy gets installed.
struct CallablePlan {
    site: PatchSite,
    original: Option<Function>,
    signature: Option<Signature>,
    type_validation: bool,
    /// Classmethods and staticmethods patched at the class become static slots.
    as_static: bool,
}

/// Explicit mocking scope of one test. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MockSession {
    inner: Arc<SessionInner>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                registry: BehaviorRegistry::new(),
                patches: PatchManager::new(),
                counter: SequenceCounter::new(),
                assertions: Mutex::new(Vec::new()),
                ordered: Mutex::new(Vec::new()),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.inner.registry
    }

    pub fn patches(&self) -> &PatchManager {
        &self.inner.patches
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    /// Intercepts the callable `name` of `container`.
    pub fn mock_callable(&self, container: &ObjectRef, name: &str) -> MockResult<MockCallable> {
        self.mock_callable_with(container, name, MockOptions::default())
    }

    pub fn mock_callable_with(
        &self,
        container: &ObjectRef,
        name: &str,
        options: MockOptions,
    ) -> MockResult<MockCallable> {
        let mock = self.install_callable(container, name, options, MockKind::Sync)?;
        Ok(MockCallable::new(self.clone(), mock))
    }

    /// Intercepts the coroutine function `name` of `container`; calls return
    /// awaitables.
    pub fn mock_async_callable(&self, container: &ObjectRef, name: &str) -> MockResult<MockCallable> {
        self.mock_async_callable_with(container, name, MockOptions::default())
    }

    pub fn mock_async_callable_with(
        &self,
        container: &ObjectRef,
        name: &str,
        options: MockOptions,
    ) -> MockResult<MockCallable> {
        let mock = self.install_callable(container, name, options, MockKind::Async)?;
        Ok(MockCallable::new(self.clone(), mock))
    }

    /// Intercepts construction of the class found at `container.class_name`.
    pub fn mock_constructor(&self, container: &ObjectRef, class_name: &str) -> MockResult<MockCallable> {
        self.mock_constructor_with(container, class_name, MockOptions::default())
    }

    pub fn mock_constructor_with(
        &self,
        container: &ObjectRef,
        class_name: &str,
        options: MockOptions,
    ) -> MockResult<MockCallable> {
        check_private(container, class_name, options)?;
        let class = match container.get_attr(class_name)? {
            Value::Object(obj) if obj.is_class() => obj,
            other => {
                return Err(MockError::InvalidUsage(format!(
                    "{}, '{class_name}': mock_constructor() requires a class, got {}",
                    container.repr(),
                    other.repr()
                )));
            }
        };
        let target = MockTarget::new(&class, "__new__");
        if let Some(existing) = self.inner.registry.get(&target) {
            return Ok(MockCallable::new(self.clone(), existing));
        }
        let constructed = class.clone();
        let original = Function::new(class_name, move |args: &CallArgs| constructed.construct_original(args));
        let signature = match class.lookup_class_attr("__init__") {
            Some((_, Attr::Method(init))) => init.signature().map(Signature::without_first),
            _ => Some(Signature::new()),
        };
        let mock = CallableMock::new(
            target.clone(),
            MockSettings {
                kind: MockKind::Constructor,
                type_validation: options.type_validation,
                callable_returns_coroutine: false,
            },
            Some(original),
            signature,
            self.inner.counter.clone(),
        );
        self.inner.patches.patch_factory(&target, mock.proxy())?;
        self.inner.registry.insert(mock.clone());
        debug!(class = %class.name(), "constructor mocked");
        Ok(MockCallable::new(self.clone(), mock))
    }

    /// Replaces the non-callable attribute `name` of `container` with `value`.
    pub fn patch_attribute(&self, container: &ObjectRef, name: &str, value: impl Into<Value>) -> MockResult<()> {
        self.patch_attribute_with(container, name, value, MockOptions::default())
    }

    pub fn patch_attribute_with(
        &self,
        container: &ObjectRef,
        name: &str,
        value: impl Into<Value>,
        options: MockOptions,
    ) -> MockResult<()> {
        let value = value.into();
        check_private(container, name, options)?;
        let target = MockTarget::new(container, name);
        if self.inner.registry.get(&target).is_some() {
            return Err(MockError::InvalidUsage(format!(
                "{target}: already mocked as a callable, patch_attribute() can not be used on it"
            )));
        }
        if holds_callable(container, name) {
            return Err(MockError::InvalidUsage(format!(
                "{target}: patch_attribute() can not be used with callables or classes; use mock_callable() or mock_constructor()"
            )));
        }
        let (site, content) = if container.is_double() {
            let stored = strict::validate_write(container, name, value)?;
            (PatchSite::Slot, SiteContent::Attr(Attr::Data(stored)))
        } else {
            if !options.allow_missing && !container.has_attr(name) {
                return Err(missing_attribute(container, name));
            }
            if options.type_validation {
                check_attribute_type(container, name, &value)?;
            }
            match container.class_of() {
                Some(class) if needs_override(&class, name) => {
                    (PatchSite::InstanceOverride { class }, SiteContent::Value(value))
                }
                _ => (PatchSite::Slot, SiteContent::Attr(Attr::Data(value))),
            }
        };
        match self.inner.patches.patched_kind(&target) {
            Some(PatchKind::Attribute) => self.inner.patches.replace(&target, content),
            Some(kind) => Err(MockError::InvalidUsage(format!(
                "{target}: already patched ({kind:?}), patch_attribute() can not be used on it"
            ))),
            None => self
                .inner
                .patches
                .patch(&target, site, PatchKind::Attribute, content)
                .map(|_| ()),
        }
    }

    /// A strict double whose lifetime is not tied to the session.
    #[track_caller]
    pub fn double(&self, options: DoubleOptions) -> MockResult<StrictDouble> {
        StrictDouble::new(options)
    }

    /// Adds a check evaluated at teardown together with the call assertions.
    pub fn register_assertion<F>(&self, assertion: F)
    where
        F: FnOnce() -> MockResult<()> + Send + 'static,
    {
        self.inner.assertions.lock().push(Box::new(assertion));
    }

    pub(crate) fn push_ordered(&self, handle: BindingHandle) {
        self.inner.ordered.lock().push(handle);
    }

    /// Ends the test: evaluates every assertion, then restores every patch (newest
    /// first). The body's own failure is reported with the assertion failures.
    pub fn teardown(&self, body: MockResult<()>) -> MockResult<()> {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return Err(MockError::InvalidUsage("teardown already ran for this session".into()));
        }
        let mut failures = FailureCollector::new();
        if let Err(e) = body {
            failures.push(e);
        }
        let checks = panic::catch_unwind(AssertUnwindSafe(|| self.evaluate_assertions()));
        match checks {
            Ok(found) => found.into_iter().for_each(|e| failures.push(e)),
            Err(payload) => failures.push(MockError::Panicked(panic_message(payload.as_ref()))),
        }
        failures.catch(self.inner.patches.unpatch_all());
        self.inner.registry.clear();
        self.inner.ordered.lock().clear();
        debug!(failures = failures.len(), "session torn down");
        failures.into_result()
    }

    fn evaluate_assertions(&self) -> Vec<MockError> {
        let mut found: Vec<MockError> = self
            .inner
            .registry
            .mocks()
            .iter()
            .flat_map(|m| m.assertion_failures())
            .collect();

        let ordered = self.inner.ordered.lock().clone();
        if !ordered.is_empty() {
            let collected: Vec<_> = ordered
                .iter()
                .map(|h| (h.label(), h.binding().pattern(), h.mock().records()))
                .collect();
            let calls: Vec<OrderedCall<'_>> = collected
                .iter()
                .map(|(label, pattern, records)| OrderedCall {
                    label: label.clone(),
                    pattern,
                    records,
                })
                .collect();
            found.extend(
                recorder::evaluate_order(&calls)
                    .into_iter()
                    .map(MockError::AssertionFailed),
            );
        }

        let deferred = std::mem::take(&mut *self.inner.assertions.lock());
        for assertion in deferred {
            match panic::catch_unwind(AssertUnwindSafe(assertion)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => found.push(e),
                Err(payload) => found.push(MockError::Panicked(panic_message(payload.as_ref()))),
            }
        }
        found
    }

    fn install_callable(
        &self,
        container: &ObjectRef,
        name: &str,
        options: MockOptions,
        kind: MockKind,
    ) -> MockResult<Arc<CallableMock>> {
        check_private(container, name, options)?;
        let target = MockTarget::new(container, name);
        if let Some(existing) = self.inner.registry.get(&target) {
            if existing.kind() != kind {
                return Err(MockError::InvalidUsage(format!(
                    "{target}: already mocked as {:?}, can not mock it as {kind:?}",
                    existing.kind()
                )));
            }
            return Ok(existing);
        }
        if let Some(patched) = self.inner.patches.patched_kind(&target) {
            return Err(MockError::InvalidUsage(format!(
                "{target}: already patched ({patched:?}), can not mock it as a callable"
            )));
        }

        let plan = plan_callable(container, name, options)?;
        let is_coroutine = plan.original.as_ref().is_some_and(Function::is_coroutine)
            || double_attr_is_coroutine(container, name);
        match kind {
            MockKind::Sync if is_coroutine => {
                return Err(MockError::InvalidUsage(format!(
                    "{target} is a coroutine function; use mock_async_callable() instead"
                )));
            }
            MockKind::Async if !is_coroutine && plan.original.is_some() && !options.callable_returns_coroutine => {
                return Err(MockError::InvalidUsage(format!(
                    "{target} is not a coroutine function; use mock_callable(), or set callable_returns_coroutine"
                )));
            }
            _ => {}
        }

        let mock = CallableMock::new(
            target.clone(),
            MockSettings {
                kind,
                type_validation: plan.type_validation,
                callable_returns_coroutine: options.callable_returns_coroutine,
            },
            plan.original,
            plan.signature,
            self.inner.counter.clone(),
        );
        let proxy = mock.proxy();
        let content = match (&plan.site, plan.as_static) {
            (PatchSite::InstanceOverride { .. }, _) => SiteContent::Value(Value::Function(proxy)),
            (_, true) => SiteContent::Attr(Attr::StaticMethod(proxy)),
            (_, false) => SiteContent::Attr(Attr::Data(Value::Function(proxy))),
        };
        self.inner
            .patches
            .patch(&target, plan.site, PatchKind::Callable, content)?;
        self.inner.registry.insert(mock.clone());
        Ok(mock)
    }
}

fn is_private(name: &str) -> bool {
    name.starts_with('_') && !(name.starts_with("__") && name.ends_with("__"))
}

/// Instance attributes that type-level lookup would shadow: descriptors and magic
/// methods. Plain data lives in the instance's own table.
fn needs_override(class: &ObjectRef, name: &str) -> bool {
    is_magic(name) || matches!(class.lookup_class_attr(name), Some((_, Attr::Property { .. })))
}

fn is_magic(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn check_private(container: &ObjectRef, name: &str, options: MockOptions) -> MockResult<()> {
    if is_private(name) && !options.allow_private {
        return Err(MockError::InvalidUsage(format!(
            "{}, '{name}': mocking private attributes is not allowed; set allow_private to do it anyway",
            container.repr()
        )));
    }
    Ok(())
}

fn missing_attribute(container: &ObjectRef, name: &str) -> MockError {
    MockError::NoSuchAttribute {
        target: container.repr(),
        attribute: name.to_string(),
    }
}

fn describes_callable(attr: &Attr) -> bool {
    attr.is_callable() || matches!(attr, Attr::Data(Value::Object(obj)) if obj.is_class())
}

/// Whether the current content of `name` is a callable or a class.
fn holds_callable(container: &ObjectRef, name: &str) -> bool {
    if container.is_double() {
        let declared = container
            .with_double(|data| data.template().cloned())
            .flatten()
            .and_then(|t| t.lookup_class_attr(name))
            .is_some_and(|(_, attr)| describes_callable(&attr));
        return declared || container.own_attr(name).is_some_and(|attr| describes_callable(&attr));
    }
    if let Some(class) = container.class_of() {
        if let Some(value) = class.instance_override(container.id(), name) {
            return value.is_callable();
        }
        if let Some(attr) = container.own_attr(name) {
            return describes_callable(&attr);
        }
        return class
            .lookup_class_attr(name)
            .is_some_and(|(_, attr)| describes_callable(&attr));
    }
    if container.is_class() {
        return container
            .lookup_class_attr(name)
            .is_some_and(|(_, attr)| describes_callable(&attr));
    }
    container.own_attr(name).is_some_and(|attr| describes_callable(&attr))
}

/// Declared type of a data attribute: class annotations, or a property getter's
/// return hint.
fn check_attribute_type(container: &ObjectRef, name: &str, value: &Value) -> MockResult<()> {
    let class = match container.class_of() {
        Some(class) => class,
        None if container.is_class() => container.clone(),
        None => return Ok(()),
    };
    let hint: Option<TypeHint> = match class.lookup_class_attr(name) {
        Some((_, Attr::Property { getter, .. })) => getter
            .as_ref()
            .and_then(|g| g.signature())
            .and_then(|s| s.returns.clone()),
        _ => class.annotation(name),
    };
    match hint {
        Some(hint) => typing::check_value(&format!("{}, '{name}'", container.repr()), name, &hint, value),
        None => Ok(()),
    }
}

fn double_attr_is_coroutine(container: &ObjectRef, name: &str) -> bool {
    container
        .with_double(|d| d.template().cloned())
        .flatten()
        .and_then(|t| t.lookup_class_attr(name))
        .and_then(|(_, attr)| attr.function().map(Function::is_coroutine))
        .unwrap_or(false)
}

/// Turns a callable value into a function usable as an original.
fn as_function(name: &str, value: Value) -> Option<Function> {
    match value {
        Value::Function(f) => Some(f),
        other if other.is_callable() => {
            Some(Function::new(name, move |args: &CallArgs| call_value(&other, args)))
        }
        _ => None,
    }
}

fn not_callable(container: &ObjectRef, name: &str) -> MockError {
    MockError::InvalidUsage(format!(
        "{}, '{name}' is not callable; use patch_attribute() instead",
        container.repr()
    ))
}

fn plan_callable(container: &ObjectRef, name: &str, options: MockOptions) -> MockResult<CallablePlan> {
    if container.is_double() {
        return plan_double(container, name, options);
    }
    let mut plan = CallablePlan {
        site: PatchSite::Slot,
        original: None,
        signature: None,
        type_validation: options.type_validation,
        as_static: false,
    };
    if container.is_class() {
        match container.lookup_class_attr(name) {
            Some((_, Attr::Method(_))) => {
                return Err(MockError::InvalidUsage(format!(
                    "{}, '{name}' is an instance method; mock it on an instance instead of the class",
                    container.repr()
                )));
            }
            Some((_, Attr::Property { .. })) => return Err(not_callable(container, name)),
            Some((_, attr)) => {
                plan.as_static = matches!(attr, Attr::ClassMethod(_) | Attr::StaticMethod(_));
                let value = container.get_attr(name)?;
                plan.original = Some(as_function(name, value).ok_or_else(|| not_callable(container, name))?);
            }
            None if options.allow_missing => {}
            None => return Err(missing_attribute(container, name)),
        }
    } else if let Some(class) = container.class_of() {
        plan.site = PatchSite::InstanceOverride { class: class.clone() };
        if container.has_attr(name) {
            if matches!(class.lookup_class_attr(name), Some((_, Attr::Property { .. })))
                && class.instance_override(container.id(), name).is_none()
            {
                return Err(not_callable(container, name));
            }
            let value = container.get_attr(name)?;
            plan.original = Some(as_function(name, value).ok_or_else(|| not_callable(container, name))?);
        } else if !options.allow_missing {
            return Err(missing_attribute(container, name));
        }
    } else {
        match container.own_attr(name) {
            Some(attr) if describes_callable(&attr) => {
                let value = container.get_attr(name)?;
                plan.original = as_function(name, value);
            }
            Some(_) => return Err(not_callable(container, name)),
            None if options.allow_missing => {}
            None => return Err(missing_attribute(container, name)),
        }
    }
    plan.signature = plan.original.as_ref().and_then(|f| f.signature().cloned());
    Ok(plan)
}

/// Doubles have no original: the template only provides the interface.
fn plan_double(container: &ObjectRef, name: &str, options: MockOptions) -> MockResult<CallablePlan> {
    if !strict::allows_attr(container, name) {
        return Err(missing_attribute(container, name));
    }
    let template = container.with_double(|d| d.template().cloned()).flatten();
    let signature = match template.as_ref().and_then(|t| t.lookup_class_attr(name)) {
        Some((_, attr)) if attr.is_callable() => strict::callable_signature(&attr),
        Some((_, Attr::Property { .. })) => return Err(not_callable(container, name)),
        _ => None,
    };
    Ok(CallablePlan {
        site: PatchSite::Slot,
        original: None,
        signature,
        type_validation: options.type_validation && strict::checks_types(container, name),
        as_static: false,
    })
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::domain::object::ClassBuilder;

    fn os_module() -> ObjectRef {
        let os = ObjectRef::namespace("os");
        os.set_attr(
            "remove",
            Function::new("remove", |_: &CallArgs| Ok(Value::None)).with_signature(Signature::new().param("path")),
        )
        .unwrap();
        os.set_attr("sep", "/").unwrap();
        os
    }

    #[test]
    fn test_private_names_need_allowance() {
        assert!(is_private("_cache"));
        assert!(!is_private("__init__"));
        assert!(!is_private("public"));
        let ns = ObjectRef::namespace("m");
        ns.set_attr("_hidden", 1).unwrap();
        let session = MockSession::new();
        assert!(session.patch_attribute(&ns, "_hidden", 2).is_err());
        session
            .patch_attribute_with(&ns, "_hidden", 2, MockOptions::new().allow_private(true))
            .unwrap();
        session.teardown(Ok(())).unwrap();
        assert_eq!(ns.get_attr("_hidden").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_patch_attribute_rejects_callables() {
        let os = os_module();
        let session = MockSession::new();
        assert!(matches!(
            session.patch_attribute(&os, "remove", 1),
            Err(MockError::InvalidUsage(_))
        ));
        session.teardown(Ok(())).unwrap();
    }

    #[test]
    fn test_mock_callable_rejects_data_and_missing() {
        let os = os_module();
        let session = MockSession::new();
        assert!(session.mock_callable(&os, "sep").is_err());
        assert!(matches!(
            session.mock_callable(&os, "rmdir"),
            Err(MockError::NoSuchAttribute { .. })
        ));
        session
            .mock_callable_with(&os, "rmdir", MockOptions::new().allow_missing(true))
            .unwrap();
        session.teardown(Ok(())).unwrap();
        assert!(!os.has_attr("rmdir"));
    }

    #[test]
    fn test_instance_method_at_class_is_rejected() {
        let class = ClassBuilder::new("Repo")
            .method("save", Function::new("save", |_: &CallArgs| Ok(Value::None)))
            .build();
        let session = MockSession::new();
        assert!(session.mock_callable(&class, "save").is_err());
        let instance = class.instantiate(&args![]).unwrap();
        let instance = instance.as_object().unwrap();
        session.mock_callable(instance, "save").unwrap();
        session.teardown(Ok(())).unwrap();
    }

    #[test]
    fn test_mixing_patch_kinds_is_rejected() {
        let ns = ObjectRef::namespace("m");
        ns.set_attr("level", 1).unwrap();
        let session = MockSession::new();
        session.patch_attribute(&ns, "level", 2).unwrap();
        session.patch_attribute(&ns, "level", 3).unwrap();
        assert!(session.mock_callable(&ns, "level").is_err());
        session.teardown(Ok(())).unwrap();
        assert_eq!(ns.get_attr("level").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_teardown_runs_once_and_collects_deferred() {
        let session = MockSession::new();
        session.register_assertion(|| Err(MockError::AssertionFailed("first".into())));
        session.register_assertion(|| panic!("boom"));
        let err = session.teardown(Ok(())).unwrap_err();
        assert!(matches!(&err, MockError::AggregatedFailures(list) if list.len() == 2));
        assert!(session.is_torn_down());
        assert!(matches!(session.teardown(Ok(())), Err(MockError::InvalidUsage(_))));
    }

    #[test]
    fn test_drop_without_teardown_restores() {
        let os = os_module();
        {
            let session = MockSession::new();
            session
                .mock_callable(&os, "remove")
                .unwrap()
                .to_return_value(Value::Int(7))
                .unwrap();
            assert_eq!(os.call_method("remove", &args!["/x"]).unwrap(), Value::Int(7));
        }
        assert_eq!(os.call_method("remove", &args!["/x"]).unwrap(), Value::None);
    }
}
