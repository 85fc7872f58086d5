//! Call-signature matching.
//!
//! An [`ArgPattern`] decides whether an actual call fits a declared expectation.
//! Declared arguments are either literal values compared for equality or
//! [`Matcher`] predicates. Matchers compose with `&`, `|`, `^` and `!`.

use crate::domain::errors::{MockError, MockResult};
use crate::domain::object::ObjectRef;
use crate::domain::value::{CallArgs, Value};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A composable predicate over a single argument value.
#[derive(Clone)]
pub enum Matcher {
    Predicate { repr: String, test: Predicate },
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Xor(Box<Matcher>, Box<Matcher>),
    Not(Box<Matcher>),
}

impl Matcher {
    pub fn new<F>(repr: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate {
            repr: repr.into(),
            test: Arc::new(test),
        }
    }

    /// Evaluates the matcher; `And` and `Or` stop at the first deciding operand.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Matcher::Predicate { test, .. } => test(value),
            Matcher::And(all) => all.iter().all(|m| m.matches(value)),
            Matcher::Or(any) => any.iter().any(|m| m.matches(value)),
            Matcher::Xor(a, b) => a.matches(value) != b.matches(value),
            Matcher::Not(inner) => !inner.matches(value),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |parts: &[Matcher], op: &str| {
            parts
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(op)
        };
        match self {
            Matcher::Predicate { repr, .. } => f.write_str(repr),
            Matcher::And(all) => write!(f, "({})", join(all, " & ")),
            Matcher::Or(any) => write!(f, "({})", join(any, " | ")),
            Matcher::Xor(a, b) => write!(f, "({a} ^ {b})"),
            Matcher::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl BitAnd for Matcher {
    type Output = Matcher;

    fn bitand(self, rhs: Matcher) -> Matcher {
        let mut all = match self {
            Matcher::And(all) => all,
            other => vec![other],
        };
        match rhs {
            Matcher::And(more) => all.extend(more),
            other => all.push(other),
        }
        Matcher::And(all)
    }
}

impl BitOr for Matcher {
    type Output = Matcher;

    fn bitor(self, rhs: Matcher) -> Matcher {
        let mut any = match self {
            Matcher::Or(any) => any,
            other => vec![other],
        };
        match rhs {
            Matcher::Or(more) => any.extend(more),
            other => any.push(other),
        }
        Matcher::Or(any)
    }
}

impl BitXor for Matcher {
    type Output = Matcher;

    fn bitxor(self, rhs: Matcher) -> Matcher {
        Matcher::Xor(Box::new(self), Box::new(rhs))
    }
}

impl Not for Matcher {
    type Output = Matcher;

    fn not(self) -> Matcher {
        match self {
            Matcher::Not(inner) => *inner,
            other => Matcher::Not(Box::new(other)),
        }
    }
}

// Primitive matchers.

pub fn any() -> Matcher {
    Matcher::new("Any()", |_| true)
}

pub fn truthy() -> Matcher {
    Matcher::new("AnyTruthy()", Value::is_truthy)
}

pub fn falsey() -> Matcher {
    Matcher::new("AnyFalsey()", |v| !v.is_truthy())
}

/// Instances (or doubles) of `class` and its subclasses.
pub fn instance_of(class: &ObjectRef) -> Matcher {
    let class = class.clone();
    Matcher::new(format!("AnyInstanceOf({})", class.name()), move |v| {
        v.as_object().is_some_and(|o| o.conforms_to(&class))
    })
}

pub fn any_int() -> Matcher {
    Matcher::new("AnyInt()", |v| matches!(v, Value::Int(_)))
}

fn int_matcher(repr: String, test: impl Fn(i64) -> bool + Send + Sync + 'static) -> Matcher {
    Matcher::new(repr, move |v| v.as_int().is_some_and(&test))
}

pub fn not_this_int(n: i64) -> Matcher {
    int_matcher(format!("NotThisInt({n})"), move |i| i != n)
}

pub fn int_between(lower: i64, upper: i64) -> Matcher {
    int_matcher(format!("IntBetween({lower}, {upper})"), move |i| lower <= i && i <= upper)
}

pub fn int_greater_than(n: i64) -> Matcher {
    int_matcher(format!("IntGreaterThan({n})"), move |i| i > n)
}

pub fn int_greater_or_equals(n: i64) -> Matcher {
    int_matcher(format!("IntGreaterOrEquals({n})"), move |i| i >= n)
}

pub fn int_less_than(n: i64) -> Matcher {
    int_matcher(format!("IntLessThan({n})"), move |i| i < n)
}

pub fn int_less_or_equals(n: i64) -> Matcher {
    int_matcher(format!("IntLessOrEquals({n})"), move |i| i <= n)
}

pub fn any_float() -> Matcher {
    Matcher::new("AnyFloat()", |v| matches!(v, Value::Float(_)))
}

fn float_matcher(repr: String, test: impl Fn(f64) -> bool + Send + Sync + 'static) -> Matcher {
    Matcher::new(repr, move |v| matches!(v, Value::Float(f) if test(*f)))
}

pub fn not_this_float(n: f64) -> Matcher {
    float_matcher(format!("NotThisFloat({n})"), move |f| f != n)
}

pub fn float_between(lower: f64, upper: f64) -> Matcher {
    float_matcher(format!("FloatBetween({lower}, {upper})"), move |f| lower <= f && f <= upper)
}

pub fn float_greater_than(n: f64) -> Matcher {
    float_matcher(format!("FloatGreaterThan({n})"), move |f| f > n)
}

pub fn float_greater_or_equals(n: f64) -> Matcher {
    float_matcher(format!("FloatGreaterOrEquals({n})"), move |f| f >= n)
}

pub fn float_less_than(n: f64) -> Matcher {
    float_matcher(format!("FloatLessThan({n})"), move |f| f < n)
}

pub fn float_less_or_equals(n: f64) -> Matcher {
    float_matcher(format!("FloatLessOrEquals({n})"), move |f| f <= n)
}

pub fn any_str() -> Matcher {
    Matcher::new("AnyStr()", |v| matches!(v, Value::Str(_)))
}

/// Strings matching `pattern` at their start, like the host's `re.match`.
pub fn regex_matches(pattern: &str) -> MockResult<Matcher> {
    let anchored = Regex::new(&format!("^(?:{pattern})"))
        .map_err(|e| MockError::InvalidUsage(format!("Invalid regex {pattern:?}: {e}")))?;
    Ok(Matcher::new(format!("RegexMatches({pattern:?})"), move |v| {
        v.as_str().is_some_and(|s| anchored.is_match(s))
    }))
}

pub fn str_containing(needle: &str) -> Matcher {
    let needle = needle.to_string();
    Matcher::new(format!("StrContaining({needle:?})"), move |v| {
        v.as_str().is_some_and(|s| s.contains(needle.as_str()))
    })
}

pub fn str_starting_with(prefix: &str) -> Matcher {
    let prefix = prefix.to_string();
    Matcher::new(format!("StrStartingWith({prefix:?})"), move |v| {
        v.as_str().is_some_and(|s| s.starts_with(prefix.as_str()))
    })
}

pub fn str_ending_with(suffix: &str) -> Matcher {
    let suffix = suffix.to_string();
    Matcher::new(format!("StrEndingWith({suffix:?})"), move |v| {
        v.as_str().is_some_and(|s| s.ends_with(suffix.as_str()))
    })
}

pub fn any_list() -> Matcher {
    Matcher::new("AnyList()", |v| matches!(v, Value::List(_)))
}

pub fn list_containing(item: impl Into<Value>) -> Matcher {
    let item = item.into();
    Matcher::new(format!("ListContaining({})", item.repr()), move |v| {
        v.as_list().is_some_and(|l| l.contains(&item))
    })
}

pub fn list_containing_all(items: Vec<Value>) -> Matcher {
    let repr = format!("ListContainingAll({})", Value::List(items.clone()).repr());
    Matcher::new(repr, move |v| {
        v.as_list().is_some_and(|l| items.iter().all(|i| l.contains(i)))
    })
}

pub fn empty_list() -> Matcher {
    Matcher::new("EmptyList()", |v| v.as_list().is_some_and(<[Value]>::is_empty))
}

pub fn not_empty_list() -> Matcher {
    Matcher::new("NotEmptyList()", |v| v.as_list().is_some_and(|l| !l.is_empty()))
}

pub fn any_dict() -> Matcher {
    Matcher::new("AnyDict()", |v| matches!(v, Value::Dict(_)))
}

pub fn empty_dict() -> Matcher {
    Matcher::new("EmptyDict()", |v| v.as_dict().is_some_and(BTreeMap::is_empty))
}

pub fn not_empty_dict() -> Matcher {
    Matcher::new("NotEmptyDict()", |v| v.as_dict().is_some_and(|d| !d.is_empty()))
}

pub fn dict_containing_keys<I, S>(keys: I) -> Matcher
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
    Matcher::new(format!("DictContainingKeys({keys:?})"), move |v| {
        v.as_dict().is_some_and(|d| keys.iter().all(|k| d.contains_key(k)))
    })
}

/// Dicts containing every entry of `subset`.
pub fn dict_superset_of(subset: BTreeMap<String, Value>) -> Matcher {
    let repr = format!("DictSupersetOf({})", Value::Dict(subset.clone()).repr());
    Matcher::new(repr, move |v| {
        v.as_dict()
            .is_some_and(|d| subset.iter().all(|(k, val)| d.get(k) == Some(val)))
    })
}

/// Any container (list, dict keys, string) holding `item`.
pub fn any_containing(item: impl Into<Value>) -> Matcher {
    let item = item.into();
    Matcher::new(format!("AnyContaining({})", item.repr()), move |v| v.contains(&item))
}

pub fn any_containing_all(items: Vec<Value>) -> Matcher {
    let repr = format!("AnyContainingAll({})", Value::List(items.clone()).repr());
    Matcher::new(repr, move |v| items.iter().all(|i| v.contains(i)))
}

pub fn any_iterable() -> Matcher {
    Matcher::new("AnyIterable()", |v| {
        matches!(v, Value::List(_) | Value::Dict(_) | Value::Str(_) | Value::Iterator(_))
    })
}

/// Lists whose elements equal `items`, in order.
pub fn iterable_with_elements(items: Vec<Value>) -> Matcher {
    let repr = format!("IterableWithElements({})", Value::List(items.clone()).repr());
    Matcher::new(repr, move |v| v.as_list().is_some_and(|l| l == items.as_slice()))
}

pub fn any_empty() -> Matcher {
    Matcher::new("AnyEmpty()", |v| v.len() == Some(0))
}

pub fn any_not_empty() -> Matcher {
    Matcher::new("AnyNotEmpty()", |v| v.len().is_some_and(|n| n > 0))
}

/// One declared argument: a literal or a predicate.
#[derive(Clone)]
pub enum ArgMatcher {
    Eq(Value),
    Matches(Matcher),
}

impl ArgMatcher {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ArgMatcher::Eq(expected) => expected == value,
            ArgMatcher::Matches(m) => m.matches(value),
        }
    }
}

impl fmt::Display for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgMatcher::Eq(v) => f.write_str(&v.repr()),
            ArgMatcher::Matches(m) => write!(f, "{m}"),
        }
    }
}

impl From<Matcher> for ArgMatcher {
    fn from(m: Matcher) -> Self {
        ArgMatcher::Matches(m)
    }
}

impl From<Value> for ArgMatcher {
    fn from(v: Value) -> Self {
        ArgMatcher::Eq(v)
    }
}

macro_rules! literal_arg_matcher {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ArgMatcher {
                fn from(v: $ty) -> Self {
                    ArgMatcher::Eq(Value::from(v))
                }
            }
        )*
    };
}

literal_arg_matcher!((), bool, i32, i64, usize, f64, &str, String, Vec<Value>, ObjectRef, &ObjectRef);

/// Declared positional and keyword arguments.
#[derive(Clone, Default)]
pub struct ArgSpec {
    pub args: Vec<ArgMatcher>,
    pub kwargs: BTreeMap<String, ArgMatcher>,
}

impl ArgSpec {
    pub fn new(args: Vec<ArgMatcher>) -> Self {
        Self {
            args,
            kwargs: BTreeMap::new(),
        }
    }

    pub fn kwarg(mut self, name: impl Into<String>, matcher: impl Into<ArgMatcher>) -> Self {
        self.kwargs.insert(name.into(), matcher.into());
        self
    }
}

impl From<CallArgs> for ArgSpec {
    fn from(call: CallArgs) -> Self {
        Self {
            args: call.args.into_iter().map(ArgMatcher::Eq).collect(),
            kwargs: call
                .kwargs
                .into_iter()
                .map(|(k, v)| (k, ArgMatcher::Eq(v)))
                .collect(),
        }
    }
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        parts.extend(self.kwargs.iter().map(|(k, v)| format!("{k}={v}")));
        write!(f, "({})", parts.join(", "))
    }
}

/// Builds an [`ArgSpec`] from literals and matchers: `pattern![1, any_str()]`.
#[macro_export]
macro_rules! pattern {
    () => { $crate::domain::matcher::ArgSpec::default() };
    ($($arg:expr),+ $(,)?) => {
        $crate::domain::matcher::ArgSpec::new(vec![$($crate::domain::matcher::ArgMatcher::from($arg)),+])
    };
}

/// How a binding selects the calls it applies to.
#[derive(Clone, Default)]
pub enum ArgPattern {
    /// Accept every call.
    #[default]
    Any,
    /// Every argument must be declared and match; nothing extra allowed.
    Exact(ArgSpec),
    /// Declared arguments must be present and match; others are ignored.
    Partial(ArgSpec),
}

impl ArgPattern {
    pub fn exact(spec: impl Into<ArgSpec>) -> Self {
        ArgPattern::Exact(spec.into())
    }

    pub fn partial(spec: impl Into<ArgSpec>) -> Self {
        ArgPattern::Partial(spec.into())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, ArgPattern::Any)
    }

    pub fn matches(&self, call: &CallArgs) -> bool {
        match self {
            ArgPattern::Any => true,
            ArgPattern::Exact(spec) => {
                spec.args.len() == call.args.len()
                    && spec.kwargs.len() == call.kwargs.len()
                    && spec.args.iter().zip(&call.args).all(|(m, v)| m.matches(v))
                    && spec
                        .kwargs
                        .iter()
                        .all(|(k, m)| call.kwargs.get(k).is_some_and(|v| m.matches(v)))
            }
            ArgPattern::Partial(spec) => {
                spec.args.len() <= call.args.len()
                    && spec.args.iter().zip(&call.args).all(|(m, v)| m.matches(v))
                    && spec
                        .kwargs
                        .iter()
                        .all(|(k, m)| call.kwargs.get(k).is_some_and(|v| m.matches(v)))
            }
        }
    }
}

impl fmt::Display for ArgPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgPattern::Any => f.write_str("(*args, **kwargs)"),
            ArgPattern::Exact(spec) => write!(f, "{spec}"),
            ArgPattern::Partial(spec) => write!(f, "partial{spec}"),
        }
    }
}

impl fmt::Debug for ArgPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    #[test]
    fn test_exact_requires_same_arity() {
        let p = ArgPattern::exact(pattern!["/file"]);
        assert!(p.matches(&args!["/file"]));
        assert!(!p.matches(&args!["/file", 1]));
        assert!(!p.matches(&args![]));
        assert!(!p.matches(&args!["/file"].kwarg("force", true)));
    }

    #[test]
    fn test_partial_ignores_extra_arguments() {
        let p = ArgPattern::partial(pattern!["a"].kwarg("mode", any_str()));
        assert!(p.matches(&args!["a", 2, 3].kwarg("mode", "r").kwarg("x", 1)));
        assert!(!p.matches(&args!["a", 2]));
        assert!(!p.matches(&args!["b"].kwarg("mode", "r")));
    }

    #[test]
    fn test_composition() {
        let small_even = int_between(0, 10) & Matcher::new("Even()", |v| v.as_int().is_some_and(|i| i % 2 == 0));
        assert!(small_even.matches(&Value::Int(4)));
        assert!(!small_even.matches(&Value::Int(5)));
        assert!(!small_even.matches(&Value::Int(12)));

        let either = any_str() | any_int();
        assert!(either.matches(&Value::from("x")));
        assert!(!either.matches(&Value::None));

        let one_of = int_greater_than(5) ^ int_less_than(10);
        assert!(one_of.matches(&Value::Int(2)));
        assert!(!one_of.matches(&Value::Int(7)));

        assert!((!any_int()).matches(&Value::from("x")));
        assert_eq!((!!any_int()).to_string(), "AnyInt()");
    }

    #[test]
    fn test_and_or_are_associative() {
        let a = || int_greater_than(0);
        let b = || int_less_than(10);
        let c = || not_this_int(5);
        let left = (a() & b()) & c();
        let right = a() & (b() & c());
        for i in -2..14 {
            let v = Value::Int(i);
            assert_eq!(left.matches(&v), right.matches(&v));
        }
        assert_eq!(left.to_string(), right.to_string());
        let left = (a() | b()) | c();
        let right = a() | (b() | c());
        assert_eq!(left.to_string(), right.to_string());
    }

    #[test]
    fn test_short_circuit() {
        let boom = Matcher::new("Boom()", |_| panic!("must not be evaluated"));
        assert!(!(Matcher::new("Never()", |_| false) & boom.clone()).matches(&Value::None));
        assert!((any() | boom).matches(&Value::None));
    }

    #[test]
    fn test_string_and_container_matchers() {
        assert!(regex_matches("ab+").unwrap().matches(&Value::from("abbbc")));
        assert!(!regex_matches("b").unwrap().matches(&Value::from("abc")));
        assert!(str_ending_with(".py").matches(&Value::from("x.py")));
        let list = Value::List(vec![1.into(), 2.into()]);
        assert!(list_containing_all(vec![2.into(), 1.into()]).matches(&list));
        assert!(iterable_with_elements(vec![1.into(), 2.into()]).matches(&list));
        assert!(any_not_empty().matches(&list));
        let mut d = BTreeMap::new();
        d.insert("k".to_string(), Value::Int(1));
        d.insert("j".to_string(), Value::Int(2));
        let mut sub = BTreeMap::new();
        sub.insert("k".to_string(), Value::Int(1));
        assert!(dict_superset_of(sub).matches(&Value::Dict(d.clone())));
        assert!(dict_containing_keys(["j"]).matches(&Value::Dict(d)));
        assert!(any_empty().matches(&Value::from("")));
    }

    #[test]
    fn test_invalid_regex_is_rejected_up_front() {
        match regex_matches("(") {
            Err(MockError::InvalidUsage(message)) => assert!(message.contains("Invalid regex")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("an unbalanced pattern must not build a matcher"),
        }
    }

    #[test]
    fn test_pattern_display() {
        let p = ArgPattern::exact(pattern!["/a", any_int()].kwarg("force", true));
        assert_eq!(p.to_string(), "('/a', AnyInt(), force=True)");
        assert_eq!(ArgPattern::Any.to_string(), "(*args, **kwargs)");
    }
}
