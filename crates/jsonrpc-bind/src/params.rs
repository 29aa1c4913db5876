//! Declared parameter shapes and value coercion.
//!
//! A [`MethodSignature`] is what the binder matches JSON params against. Parameter
//! names are optional on purpose: a host that cannot recover formal parameter
//! names still registers positional-only signatures, and the binder refuses
//! by-name calls against them instead of guessing.

use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Semantic type tag of one formal parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Any JSON value, passed through untouched.
    Any,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// A string holding exactly one character.
    Char,
    String,
    /// Homogeneous array.
    Array(Box<ParamType>),
    /// Object with homogeneous values.
    Map(Box<ParamType>),
    /// Any JSON object, left for the method to destructure.
    Object,
    /// `null` or the inner type.
    Nullable(Box<ParamType>),
}

impl ParamType {
    pub fn array_of(inner: ParamType) -> Self {
        ParamType::Array(Box::new(inner))
    }

    pub fn map_of(inner: ParamType) -> Self {
        ParamType::Map(Box::new(inner))
    }

    pub fn nullable(inner: ParamType) -> Self {
        ParamType::Nullable(Box::new(inner))
    }

    /// Coerce a raw JSON value to this type.
    ///
    /// Numbers are normalized (an integral float such as `2.0` satisfies an
    /// integer type and is emitted as `2`); everything else is checked and
    /// passed through. Strings are never parsed into numbers.
    pub fn coerce(&self, value: Value) -> Result<Value, CoercionError> {
        match self {
            ParamType::Any => Ok(value),
            ParamType::Nullable(inner) => match value {
                Value::Null => Ok(Value::Null),
                other => inner.coerce(other),
            },
            ParamType::Bool => match value {
                Value::Bool(_) => Ok(value),
                other => Err(self.mismatch(&other)),
            },
            ParamType::I8 => self.signed(value, i8::MIN as i64, i8::MAX as i64),
            ParamType::I16 => self.signed(value, i16::MIN as i64, i16::MAX as i64),
            ParamType::I32 => self.signed(value, i32::MIN as i64, i32::MAX as i64),
            ParamType::I64 => self.signed(value, i64::MIN, i64::MAX),
            ParamType::U8 => self.unsigned(value, u8::MAX as u64),
            ParamType::U16 => self.unsigned(value, u16::MAX as u64),
            ParamType::U32 => self.unsigned(value, u32::MAX as u64),
            ParamType::U64 => self.unsigned(value, u64::MAX),
            ParamType::F32 => {
                let f = self.float(&value)?;
                if f.abs() > f32::MAX as f64 {
                    return Err(CoercionError::out_of_range(&value, "must fit a 32-bit float"));
                }
                Ok(value)
            }
            ParamType::F64 => {
                self.float(&value)?;
                Ok(value)
            }
            ParamType::Char => match value {
                Value::String(ref s) if s.chars().count() == 1 => Ok(value),
                Value::String(s) => Err(CoercionError::Malformed {
                    path: String::new(),
                    reason: format!("expected a single character, got {} characters", s.chars().count()),
                }),
                other => Err(self.mismatch(&other)),
            },
            ParamType::String => match value {
                Value::String(_) => Ok(value),
                other => Err(self.mismatch(&other)),
            },
            ParamType::Array(inner) => match value {
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| inner.coerce(item).map_err(|e| e.within(&format!("[{}]", i))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                other => Err(self.mismatch(&other)),
            },
            ParamType::Map(inner) => match value {
                Value::Object(entries) => entries
                    .into_iter()
                    .map(|(k, v)| {
                        let coerced = inner.coerce(v).map_err(|e| e.within(&format!(".{}", k)))?;
                        Ok((k, coerced))
                    })
                    .collect::<Result<Map<_, _>, _>>()
                    .map(Value::Object),
                other => Err(self.mismatch(&other)),
            },
            ParamType::Object => match value {
                Value::Object(_) => Ok(value),
                other => Err(self.mismatch(&other)),
            },
        }
    }

    fn mismatch(&self, actual: &Value) -> CoercionError {
        CoercionError::TypeMismatch {
            path: String::new(),
            expected: self.to_string(),
            actual: json_kind(actual),
        }
    }

    fn float(&self, value: &Value) -> Result<f64, CoercionError> {
        value.as_f64().ok_or_else(|| self.mismatch(value))
    }

    /// Integral value of a number, accepting floats with no fractional part.
    fn integral(&self, value: &Value) -> Result<Integral, CoercionError> {
        let Value::Number(n) = value else {
            return Err(self.mismatch(value));
        };
        if let Some(i) = n.as_i64() {
            return Ok(Integral::Signed(i));
        }
        if let Some(u) = n.as_u64() {
            return Ok(Integral::Unsigned(u));
        }
        match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => Ok(Integral::Float(f)),
            _ => Err(CoercionError::TypeMismatch {
                path: String::new(),
                expected: self.to_string(),
                actual: "fractional number",
            }),
        }
    }

    fn signed(&self, value: Value, min: i64, max: i64) -> Result<Value, CoercionError> {
        let constraint = || format!("must be between {} and {}", min, max);
        let n = match self.integral(&value)? {
            Integral::Signed(i) => i,
            Integral::Unsigned(_) => {
                return Err(CoercionError::out_of_range(&value, &constraint()));
            }
            Integral::Float(f) if f >= min as f64 && f <= max as f64 => f as i64,
            Integral::Float(_) => return Err(CoercionError::out_of_range(&value, &constraint())),
        };
        if n < min || n > max {
            return Err(CoercionError::out_of_range(&value, &constraint()));
        }
        Ok(Value::Number(Number::from(n)))
    }

    fn unsigned(&self, value: Value, max: u64) -> Result<Value, CoercionError> {
        let constraint = || format!("must be between 0 and {}", max);
        let n = match self.integral(&value)? {
            Integral::Signed(i) if i < 0 => {
                return Err(CoercionError::out_of_range(&value, &constraint()));
            }
            Integral::Signed(i) => i as u64,
            Integral::Unsigned(u) => u,
            Integral::Float(f) if f >= 0.0 && f <= max as f64 => f as u64,
            Integral::Float(_) => return Err(CoercionError::out_of_range(&value, &constraint())),
        };
        if n > max {
            return Err(CoercionError::out_of_range(&value, &constraint()));
        }
        Ok(Value::Number(Number::from(n)))
    }
}

enum Integral {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => write!(f, "any"),
            ParamType::Bool => write!(f, "bool"),
            ParamType::I8 => write!(f, "i8"),
            ParamType::I16 => write!(f, "i16"),
            ParamType::I32 => write!(f, "i32"),
            ParamType::I64 => write!(f, "i64"),
            ParamType::U8 => write!(f, "u8"),
            ParamType::U16 => write!(f, "u16"),
            ParamType::U32 => write!(f, "u32"),
            ParamType::U64 => write!(f, "u64"),
            ParamType::F32 => write!(f, "f32"),
            ParamType::F64 => write!(f, "f64"),
            ParamType::Char => write!(f, "char"),
            ParamType::String => write!(f, "string"),
            ParamType::Array(inner) => write!(f, "array<{}>", inner),
            ParamType::Map(inner) => write!(f, "map<{}>", inner),
            ParamType::Object => write!(f, "object"),
            ParamType::Nullable(inner) => write!(f, "{}?", inner),
        }
    }
}

/// JSON kind name used in mismatch messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Why a single value could not be coerced. `path` locates the offending
/// element inside the value (`[2]`, `.key`), empty for the value itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("type mismatch{}: expected {expected}, got {actual}", at(path))]
    TypeMismatch {
        path: String,
        expected: String,
        actual: &'static str,
    },

    #[error("value {value}{} is out of range: {constraint}", at(path))]
    OutOfRange {
        path: String,
        value: String,
        constraint: String,
    },

    #[error("malformed value{}: {reason}", at(path))]
    Malformed { path: String, reason: String },
}

fn at(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" at {}", path)
    }
}

impl CoercionError {
    fn out_of_range(value: &Value, constraint: &str) -> Self {
        CoercionError::OutOfRange {
            path: String::new(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Prefix the error location with an enclosing segment.
    fn within(mut self, segment: &str) -> Self {
        let path = match &mut self {
            CoercionError::TypeMismatch { path, .. }
            | CoercionError::OutOfRange { path, .. }
            | CoercionError::Malformed { path, .. } => path,
        };
        path.insert_str(0, segment);
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CoercionError::TypeMismatch { .. } => "type_mismatch",
            CoercionError::OutOfRange { .. } => "out_of_range",
            CoercionError::Malformed { .. } => "malformed",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            CoercionError::TypeMismatch { path, .. }
            | CoercionError::OutOfRange { path, .. }
            | CoercionError::Malformed { path, .. } => path,
        }
    }
}

/// Declared shape of one formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    /// `None` when the host could not retain the parameter's name.
    pub declared_name: Option<String>,
    pub param_type: ParamType,
    pub required: bool,
    /// Value bound when an optional parameter is not supplied.
    pub default: Option<Value>,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            declared_name: Some(name.into()),
            param_type,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, default: Value) -> Self {
        Self {
            declared_name: Some(name.into()),
            param_type,
            required: false,
            default: Some(default),
        }
    }

    /// A required parameter whose name is unknown at runtime.
    pub fn unnamed(param_type: ParamType) -> Self {
        Self {
            declared_name: None,
            param_type,
            required: true,
            default: None,
        }
    }

    /// An optional parameter whose name is unknown at runtime.
    pub fn unnamed_optional(param_type: ParamType, default: Value) -> Self {
        Self {
            declared_name: None,
            param_type,
            required: false,
            default: Some(default),
        }
    }

    /// Drop the name, as if metadata had been stripped.
    pub fn without_name(mut self) -> Self {
        self.declared_name = None;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.declared_name.as_deref()
    }

    /// Name for messages: the declared name, or `#index`.
    pub fn label(&self, index: usize) -> String {
        match &self.declared_name {
            Some(name) => name.clone(),
            None => format!("#{}", index),
        }
    }
}

/// Contract violations in a declared signature. Raised once, at registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("method name must not be empty")]
    EmptyMethodName,

    #[error("method '{method}': optional parameter {parameter} has no default")]
    MissingDefault { method: String, parameter: String },

    #[error("method '{method}': default for {parameter} does not fit its type: {source}")]
    InvalidDefault {
        method: String,
        parameter: String,
        #[source]
        source: CoercionError,
    },

    #[error("method '{method}': required parameter {parameter} follows an optional one")]
    RequiredAfterOptional { method: String, parameter: String },

    #[error("method '{method}': parameter name '{parameter}' is declared twice")]
    DuplicateName { method: String, parameter: String },

    #[error("method '{method}': the variadic tail {parameter} cannot be optional")]
    OptionalVariadic { method: String, parameter: String },
}

/// Name plus ordered formal parameters of one callable.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<ParameterSpec>,
    /// Trailing parameter that absorbs any extra positional values as an array.
    pub variadic: Option<ParameterSpec>,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, params: Vec<ParameterSpec>) -> Self {
        Self {
            name: name.into(),
            params,
            variadic: None,
        }
    }

    pub fn with_variadic(mut self, tail: ParameterSpec) -> Self {
        self.variadic = Some(tail);
        self
    }

    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.required).count()
    }

    /// Every parameter, including the variadic tail, has a declared name.
    pub fn has_full_metadata(&self) -> bool {
        self.params
            .iter()
            .chain(self.variadic.iter())
            .all(|p| p.declared_name.is_some())
    }

    /// Identity of this signature within an overload set: the ordered type tags.
    pub fn overload_key(&self) -> OverloadKey {
        OverloadKey {
            params: self.params.iter().map(|p| p.param_type.clone()).collect(),
            variadic: self.variadic.as_ref().map(|p| p.param_type.clone()),
        }
    }

    /// Check the declaration-time contract.
    pub fn validate(&self) -> Result<(), DeclarationError> {
        if self.name.trim().is_empty() {
            return Err(DeclarationError::EmptyMethodName);
        }

        let mut seen_optional = false;
        let mut names = HashSet::new();
        for (index, spec) in self.params.iter().enumerate() {
            let parameter = spec.label(index);
            if let Some(name) = &spec.declared_name {
                if !names.insert(name.as_str()) {
                    return Err(DeclarationError::DuplicateName {
                        method: self.name.clone(),
                        parameter,
                    });
                }
            }
            if spec.required {
                if seen_optional {
                    return Err(DeclarationError::RequiredAfterOptional {
                        method: self.name.clone(),
                        parameter,
                    });
                }
                continue;
            }
            seen_optional = true;
            let Some(default) = &spec.default else {
                return Err(DeclarationError::MissingDefault {
                    method: self.name.clone(),
                    parameter,
                });
            };
            spec.param_type
                .coerce(default.clone())
                .map_err(|source| DeclarationError::InvalidDefault {
                    method: self.name.clone(),
                    parameter: parameter.clone(),
                    source,
                })?;
        }

        if let Some(tail) = &self.variadic {
            let parameter = tail.label(self.params.len());
            if !tail.required {
                return Err(DeclarationError::OptionalVariadic {
                    method: self.name.clone(),
                    parameter,
                });
            }
            if let Some(name) = &tail.declared_name {
                if names.contains(name.as_str()) {
                    return Err(DeclarationError::DuplicateName {
                        method: self.name.clone(),
                        parameter,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Overload identity: two registrations with equal keys under one name replace each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverloadKey {
    pub params: Vec<ParamType>,
    pub variadic: Option<ParamType>,
}

impl fmt::Display for OverloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, ty) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        if let Some(tail) = &self.variadic {
            if !self.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "{}...", tail)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_coercion() {
        assert_eq!(ParamType::I32.coerce(json!(42)).unwrap(), json!(42));
        assert_eq!(ParamType::I32.coerce(json!(2.0)).unwrap(), json!(2));
        assert_eq!(ParamType::U64.coerce(json!(u64::MAX)).unwrap(), json!(u64::MAX));

        let err = ParamType::I8.coerce(json!(300)).unwrap_err();
        assert_eq!(err.kind(), "out_of_range");

        let err = ParamType::U32.coerce(json!(-1)).unwrap_err();
        assert_eq!(err.kind(), "out_of_range");

        let err = ParamType::I64.coerce(json!(1.5)).unwrap_err();
        assert_eq!(err.kind(), "type_mismatch");

        let err = ParamType::I32.coerce(json!("42")).unwrap_err();
        assert_eq!(
            err,
            CoercionError::TypeMismatch {
                path: String::new(),
                expected: "i32".to_string(),
                actual: "string",
            }
        );
    }

    #[test]
    fn test_float_and_char_coercion() {
        assert_eq!(ParamType::F64.coerce(json!(1)).unwrap(), json!(1));
        assert_eq!(ParamType::F32.coerce(json!(1e300)).unwrap_err().kind(), "out_of_range");
        assert_eq!(ParamType::Char.coerce(json!("é")).unwrap(), json!("é"));
        assert_eq!(ParamType::Char.coerce(json!("ab")).unwrap_err().kind(), "malformed");
    }

    #[test]
    fn test_nested_coercion_reports_path() {
        let ty = ParamType::map_of(ParamType::array_of(ParamType::U8));
        let err = ty.coerce(json!({"xs": [1, 2, 256]})).unwrap_err();
        assert_eq!(err.path(), ".xs[2]");
        assert!(err.to_string().contains("at .xs[2]"));
    }

    #[test]
    fn test_nullable() {
        let ty = ParamType::nullable(ParamType::String);
        assert_eq!(ty.coerce(Value::Null).unwrap(), Value::Null);
        assert!(ty.coerce(json!(1)).is_err());
        assert!(ParamType::String.coerce(Value::Null).is_err());
        assert_eq!(ty.to_string(), "string?");
    }

    #[test]
    fn test_signature_validation() {
        let ok = MethodSignature::new(
            "m",
            vec![
                ParameterSpec::required("a", ParamType::I32),
                ParameterSpec::optional("b", ParamType::I32, json!(0)),
            ],
        );
        assert!(ok.validate().is_ok());

        let reordered = MethodSignature::new(
            "m",
            vec![
                ParameterSpec::optional("b", ParamType::I32, json!(0)),
                ParameterSpec::required("a", ParamType::I32),
            ],
        );
        assert!(matches!(
            reordered.validate(),
            Err(DeclarationError::RequiredAfterOptional { .. })
        ));

        let mut no_default = ParameterSpec::optional("b", ParamType::I32, json!(0));
        no_default.default = None;
        assert!(matches!(
            MethodSignature::new("m", vec![no_default]).validate(),
            Err(DeclarationError::MissingDefault { .. })
        ));

        let bad_default = MethodSignature::new(
            "m",
            vec![ParameterSpec::optional("b", ParamType::I32, json!("zero"))],
        );
        assert!(matches!(
            bad_default.validate(),
            Err(DeclarationError::InvalidDefault { .. })
        ));

        let duplicate = MethodSignature::new(
            "m",
            vec![
                ParameterSpec::required("a", ParamType::I32),
                ParameterSpec::required("a", ParamType::String),
            ],
        );
        assert!(matches!(
            duplicate.validate(),
            Err(DeclarationError::DuplicateName { .. })
        ));

        assert_eq!(
            MethodSignature::new(" ", vec![]).validate(),
            Err(DeclarationError::EmptyMethodName)
        );
    }

    #[test]
    fn test_metadata_and_overload_key() {
        let named = MethodSignature::new(
            "sum",
            vec![ParameterSpec::required("a", ParamType::I64)],
        )
        .with_variadic(ParameterSpec::required("rest", ParamType::I64));
        assert!(named.has_full_metadata());
        assert_eq!(named.overload_key().to_string(), "(i64, i64...)");

        let stripped = MethodSignature::new(
            "sum",
            vec![ParameterSpec::unnamed(ParamType::I64)],
        );
        assert!(!stripped.has_full_metadata());
        assert_ne!(named.overload_key(), stripped.overload_key());
    }
}
