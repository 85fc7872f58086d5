//! Callable values and their signatures.
//!
//! A [`Function`] wraps a native closure together with an optional declared
//! [`Signature`]. Signatures drive argument binding (with the host language's
//! positional / keyword rules) and supply the type hints checked by validation.

use crate::domain::errors::{MockError, MockResult};
use crate::domain::recorder::{self, CallSite};
use crate::domain::typing::{self, TypeHint};
use crate::domain::value::{Awaitable, CallArgs, Value, next_handle_id};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

pub type NativeFn = dyn Fn(&CallArgs) -> MockResult<Value> + Send + Sync;

#[derive(Clone)]
struct FunctionInner {
    id: u64,
    name: String,
    signature: Option<Signature>,
    is_coroutine: bool,
    body: Arc<NativeFn>,
}

/// A callable value.
#[derive(Clone)]
pub struct Function {
    inner: Arc<FunctionInner>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&CallArgs) -> MockResult<Value> + Send + Sync + 'static,
    {
        Self::from_parts(name.into(), None, false, Arc::new(body))
    }

    /// A coroutine function: calling it returns an [`Awaitable`] running `body`.
    pub fn coroutine<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MockResult<Value>> + Send + 'static,
    {
        let name = name.into();
        let label = name.clone();
        let wrapped = move |args: &CallArgs| {
            Ok(Value::Awaitable(Awaitable::new(label.clone(), body(args.clone()))))
        };
        Self::from_parts(name, None, true, Arc::new(wrapped))
    }

    fn from_parts(
        name: String,
        signature: Option<Signature>,
        is_coroutine: bool,
        body: Arc<NativeFn>,
    ) -> Self {
        Self {
            inner: Arc::new(FunctionInner {
                id: next_handle_id(),
                name,
                signature,
                is_coroutine,
                body,
            }),
        }
    }

    fn rebuilt(&self, edit: impl FnOnce(&mut FunctionInner)) -> Self {
        let mut inner = (*self.inner).clone();
        inner.id = next_handle_id();
        edit(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn with_signature(self, signature: Signature) -> Self {
        self.rebuilt(|f| f.signature = Some(signature))
    }

    /// Marks the function as returning awaitables even though it was built with
    /// [`Function::new`].
    pub fn as_coroutine(self) -> Self {
        self.rebuilt(|f| f.is_coroutine = true)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.inner.signature.as_ref()
    }

    pub fn is_coroutine(&self) -> bool {
        self.inner.is_coroutine
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Invokes the function, recording the caller's location as the current call site.
    #[track_caller]
    pub fn call(&self, args: &CallArgs) -> MockResult<Value> {
        let _site = recorder::enter_call_site(CallSite::from_location(Location::caller()));
        (self.inner.body)(args)
    }

    /// Invokes the function without touching the call-site stack.
    pub(crate) fn call_inner(&self, args: &CallArgs) -> MockResult<Value> {
        (self.inner.body)(args)
    }

    /// Binds `receiver` as first positional argument, as attribute lookup does for
    /// methods. The bound signature drops its first parameter.
    pub fn bind(&self, receiver: Value) -> Function {
        let body = self.inner.body.clone();
        let bound = move |args: &CallArgs| body(&args.prepend(receiver.clone()));
        let signature = self.inner.signature.as_ref().map(Signature::without_first);
        Self::from_parts(
            self.inner.name.clone(),
            signature,
            self.inner.is_coroutine,
            Arc::new(bound),
        )
    }

    /// Wraps the function with signature and type checks against `signature`.
    ///
    /// `context` names the checked slot in error messages. Argument types and the
    /// return type are only checked when `check_types` is set.
    pub fn with_validation(&self, context: impl Into<String>, signature: Signature, check_types: bool) -> Function {
        let context = context.into();
        let body = self.inner.body.clone();
        let sig = signature.clone();
        let validated = move |args: &CallArgs| {
            let bound = sig.bind(args).map_err(|message| MockError::SignatureMismatch {
                target: context.clone(),
                message,
            })?;
            if check_types {
                typing::check_bound_args(&context, &bound)?;
            }
            let result = body(args)?;
            if check_types && let Some(hint) = &sig.returns {
                if let Value::Awaitable(inner) = &result
                    && *hint != TypeHint::Awaitable
                {
                    let (ctx, hint, inner) = (context.clone(), hint.clone(), inner.clone());
                    let label = inner.label().to_string();
                    return Ok(Value::Awaitable(Awaitable::new(label, async move {
                        let value = inner.await?;
                        typing::check_return(&ctx, &hint, &value)?;
                        Ok(value)
                    })));
                }
                typing::check_return(&context, hint, &result)?;
            }
            Ok(result)
        };
        Self::from_parts(
            self.inner.name.clone(),
            Some(signature),
            self.inner.is_coroutine,
            Arc::new(validated),
        )
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.inner.name)
            .field("is_coroutine", &self.inner.is_coroutine)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarArgs,
    KeywordOnly,
    VarKwargs,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub hint: Option<TypeHint>,
}

/// Declared parameters and return type of a callable.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Option<TypeHint>,
}

/// Arguments bound to parameter names, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    pub values: Vec<(String, Value, Option<TypeHint>)>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _, _)| n == name).map(|(_, v, _)| v)
    }
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &str, kind: ParamKind, default: Option<Value>, hint: Option<TypeHint>) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            kind,
            default,
            hint,
        });
        self
    }

    pub fn param(self, name: &str) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, None, None)
    }

    pub fn typed(self, name: &str, hint: TypeHint) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, None, Some(hint))
    }

    pub fn optional(self, name: &str, default: impl Into<Value>) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, Some(default.into()), None)
    }

    pub fn typed_optional(self, name: &str, hint: TypeHint, default: impl Into<Value>) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, Some(default.into()), Some(hint))
    }

    pub fn positional_only(self, name: &str) -> Self {
        self.push(name, ParamKind::PositionalOnly, None, None)
    }

    pub fn var_args(self, name: &str) -> Self {
        self.push(name, ParamKind::VarArgs, None, None)
    }

    pub fn keyword_only(self, name: &str) -> Self {
        self.push(name, ParamKind::KeywordOnly, None, None)
    }

    pub fn typed_keyword_only(self, name: &str, hint: TypeHint) -> Self {
        self.push(name, ParamKind::KeywordOnly, None, Some(hint))
    }

    pub fn var_kwargs(self, name: &str) -> Self {
        self.push(name, ParamKind::VarKwargs, None, None)
    }

    pub fn returns(mut self, hint: TypeHint) -> Self {
        self.returns = Some(hint);
        self
    }

    /// The signature seen through a bound receiver.
    pub fn without_first(&self) -> Signature {
        let mut params = self.params.clone();
        if params
            .first()
            .is_some_and(|p| matches!(p.kind, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword))
        {
            params.remove(0);
        }
        Signature {
            params,
            returns: self.returns.clone(),
        }
    }

    /// Binds call arguments to parameters, failing with the host language's
    /// messages when they do not fit.
    pub fn bind(&self, call: &CallArgs) -> Result<BoundArgs, String> {
        let mut bound = BoundArgs::default();
        let mut assigned: BTreeSet<&str> = BTreeSet::new();
        let mut positional = call.args.iter();

        let var_args = self.params.iter().find(|p| p.kind == ParamKind::VarArgs);
        let var_kwargs = self.params.iter().find(|p| p.kind == ParamKind::VarKwargs);

        for param in self
            .params
            .iter()
            .filter(|p| matches!(p.kind, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword))
        {
            match positional.next() {
                Some(value) => {
                    bound.values.push((param.name.clone(), value.clone(), param.hint.clone()));
                    assigned.insert(param.name.as_str());
                }
                None => break,
            }
        }
        let extra: Vec<Value> = positional.cloned().collect();
        if !extra.is_empty() {
            match var_args {
                Some(p) => {
                    for value in extra {
                        bound.values.push((p.name.clone(), value, p.hint.clone()));
                    }
                }
                None => return Err("too many positional arguments".into()),
            }
        }

        let mut extra_kwargs: BTreeMap<String, Value> = BTreeMap::new();
        for (key, value) in &call.kwargs {
            let param = self.params.iter().find(|p| {
                p.name == *key && matches!(p.kind, ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly)
            });
            match param {
                Some(p) => {
                    if assigned.contains(p.name.as_str()) {
                        return Err(format!("multiple values for argument '{key}'"));
                    }
                    bound.values.push((p.name.clone(), value.clone(), p.hint.clone()));
                    assigned.insert(p.name.as_str());
                }
                None if var_kwargs.is_some() => {
                    extra_kwargs.insert(key.clone(), value.clone());
                }
                None => {
                    if self
                        .params
                        .iter()
                        .any(|p| p.name == *key && p.kind == ParamKind::PositionalOnly)
                    {
                        return Err(format!(
                            "'{key}' parameter is positional only, but was passed as a keyword"
                        ));
                    }
                    return Err(format!("got an unexpected keyword argument '{key}'"));
                }
            }
        }
        if let Some(p) = var_kwargs {
            for (_, value) in extra_kwargs {
                bound.values.push((p.name.clone(), value, p.hint.clone()));
            }
        }

        for param in &self.params {
            if matches!(param.kind, ParamKind::VarArgs | ParamKind::VarKwargs) {
                continue;
            }
            if !assigned.contains(param.name.as_str()) {
                match &param.default {
                    Some(default) => {
                        bound.values.push((param.name.clone(), default.clone(), None));
                    }
                    None => return Err(format!("missing a required argument: '{}'", param.name)),
                }
            }
        }
        Ok(bound)
    }
}
