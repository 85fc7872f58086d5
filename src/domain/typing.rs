//! Type hints and runtime type-conformance checks.

use crate::domain::errors::{MockError, MockResult};
use crate::domain::function::BoundArgs;
use crate::domain::object::ObjectRef;
use crate::domain::value::Value;
use std::fmt;

/// Declared type of a parameter, return value or attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeHint {
    Any,
    None,
    Bool,
    Int,
    /// Accepts ints as well, like the host's numeric tower.
    Float,
    Str,
    List(Box<TypeHint>),
    Dict(Box<TypeHint>),
    Callable,
    Awaitable,
    Iterator,
    Optional(Box<TypeHint>),
    Union(Vec<TypeHint>),
    /// Instances of a class or any of its subclasses.
    Instance(ObjectRef),
}

impl TypeHint {
    pub fn list_of(inner: TypeHint) -> Self {
        TypeHint::List(Box::new(inner))
    }

    pub fn dict_of(inner: TypeHint) -> Self {
        TypeHint::Dict(Box::new(inner))
    }

    pub fn optional(inner: TypeHint) -> Self {
        TypeHint::Optional(Box::new(inner))
    }

    pub fn instance_of(class: &ObjectRef) -> Self {
        TypeHint::Instance(class.clone())
    }

    /// Whether `value` conforms to this hint.
    ///
    /// Strict doubles conform to the class they were templated on; a double
    /// without a template conforms to any class.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeHint::Any, _) => true,
            (TypeHint::None, Value::None) => true,
            (TypeHint::Bool, Value::Bool(_)) => true,
            (TypeHint::Int, Value::Int(_)) => true,
            (TypeHint::Float, Value::Float(_) | Value::Int(_)) => true,
            (TypeHint::Str, Value::Str(_)) => true,
            (TypeHint::List(inner), Value::List(items)) => items.iter().all(|v| inner.accepts(v)),
            (TypeHint::Dict(inner), Value::Dict(map)) => map.values().all(|v| inner.accepts(v)),
            (TypeHint::Callable, v) => v.is_callable(),
            (TypeHint::Awaitable, Value::Awaitable(_)) => true,
            (TypeHint::Iterator, Value::Iterator(_) | Value::List(_)) => true,
            (TypeHint::Optional(inner), v) => v.is_none() || inner.accepts(v),
            (TypeHint::Union(options), v) => options.iter().any(|h| h.accepts(v)),
            (TypeHint::Instance(class), Value::Object(obj)) => obj.conforms_to(class),
            _ => false,
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHint::Any => write!(f, "Any"),
            TypeHint::None => write!(f, "None"),
            TypeHint::Bool => write!(f, "bool"),
            TypeHint::Int => write!(f, "int"),
            TypeHint::Float => write!(f, "float"),
            TypeHint::Str => write!(f, "str"),
            TypeHint::List(inner) => write!(f, "List[{inner}]"),
            TypeHint::Dict(inner) => write!(f, "Dict[str, {inner}]"),
            TypeHint::Callable => write!(f, "Callable"),
            TypeHint::Awaitable => write!(f, "Awaitable"),
            TypeHint::Iterator => write!(f, "Iterator"),
            TypeHint::Optional(inner) => write!(f, "Optional[{inner}]"),
            TypeHint::Union(options) => {
                let names: Vec<String> = options.iter().map(|h| h.to_string()).collect();
                write!(f, "Union[{}]", names.join(", "))
            }
            TypeHint::Instance(class) => write!(f, "{}", class.name()),
        }
    }
}

fn mismatch(context: &str, what: &str, hint: &TypeHint, value: &Value) -> MockError {
    MockError::TypeCheckError {
        context: context.to_string(),
        message: format!(
            "type of {what} must be {hint}; got {} instead",
            value.type_name()
        ),
    }
}

/// Checks a value against a hint, naming it `what` on failure.
pub fn check_value(context: &str, what: &str, hint: &TypeHint, value: &Value) -> MockResult<()> {
    if hint.accepts(value) {
        Ok(())
    } else {
        Err(mismatch(context, what, hint, value))
    }
}

/// Checks every bound argument carrying a hint.
pub fn check_bound_args(context: &str, bound: &BoundArgs) -> MockResult<()> {
    for (name, value, hint) in &bound.values {
        if let Some(hint) = hint {
            check_value(context, name, hint, value)?;
        }
    }
    Ok(())
}

pub fn check_return(context: &str, hint: &TypeHint, value: &Value) -> MockResult<()> {
    check_value(context, "the return value", hint, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::object::ClassBuilder;

    #[test]
    fn test_float_accepts_int() {
        assert!(TypeHint::Float.accepts(&Value::Int(1)));
        assert!(!TypeHint::Int.accepts(&Value::Float(1.0)));
    }

    #[test]
    fn test_containers_check_elements() {
        let hint = TypeHint::list_of(TypeHint::Str);
        assert!(hint.accepts(&Value::List(vec!["a".into()])));
        assert!(!hint.accepts(&Value::List(vec!["a".into(), 1.into()])));
        assert!(TypeHint::optional(TypeHint::Int).accepts(&Value::None));
    }

    #[test]
    fn test_instance_hint_follows_class_chain() {
        let base = ClassBuilder::new("Base").build();
        let child = ClassBuilder::new("Child").base(&base).build();
        let other = ClassBuilder::new("Other").build();
        let obj = child.construct_original(&crate::args![]).unwrap();
        assert!(TypeHint::instance_of(&base).accepts(&obj));
        assert!(!TypeHint::instance_of(&other).accepts(&obj));
    }

    #[test]
    fn test_mismatch_message() {
        let err = check_value("Calc.add", "x", &TypeHint::Int, &Value::from("1")).unwrap_err();
        assert_eq!(err.to_string(), "Calc.add: type of x must be int; got str instead");
    }
}
