//! Parameter binding: JSON params against a declared signature.
//!
//! Binding is all-or-nothing per signature. The dispatcher tries each
//! overload in registration order and keeps the first that binds.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::trace;

use crate::{
    config::UnknownParamPolicy,
    error::{JsonRpcErrorObject, MethodError},
    params::{CoercionError, MethodSignature, ParamType, ParameterSpec},
    request::RequestParams,
};

/// Argument list ready for invocation, one slot per formal parameter.
///
/// When the signature has a variadic tail, its values sit in the last slot as
/// a JSON array (empty when nothing extra was supplied).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    values: Vec<Value>,
    names: Vec<Option<String>>,
}

impl BoundArguments {
    fn push(&mut self, name: Option<&str>, value: Value) {
        self.values.push(value);
        self.names.push(name.map(str::to_string));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Look up a slot by its declared name.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .and_then(|i| self.values.get(i))
    }

    /// Deserialize slot `index` into `T`.
    ///
    /// The binder has already checked the value against the declared type,
    /// so a failure here means the handler asked for a type its signature
    /// does not declare; it surfaces as an internal error.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, MethodError> {
        let value = self.values.get(index).ok_or_else(|| {
            MethodError::internal(format!("no bound argument at position {}", index))
        })?;
        serde_json::from_value(value.clone()).map_err(MethodError::internal)
    }

    pub fn named<T: DeserializeOwned>(&self, name: &str) -> Result<T, MethodError> {
        let value = self
            .get_named(name)
            .ok_or_else(|| MethodError::internal(format!("no bound argument named '{}'", name)))?;
        serde_json::from_value(value.clone()).map_err(MethodError::internal)
    }
}

/// Why a signature did not accept the supplied params.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("expected at least {required} argument(s), got {supplied}")]
    MissingArguments { required: usize, supplied: usize },

    #[error("expected at most {max} argument(s), got {supplied}")]
    TooManyArguments { max: usize, supplied: usize },

    #[error("missing required parameter(s): {}", .names.join(", "))]
    MissingParameters { names: Vec<String> },

    #[error("unknown parameter(s): {}", .names.join(", "))]
    UnknownParameters { names: Vec<String> },

    #[error("method '{method}' was registered without parameter names and cannot be called with named parameters")]
    NoParameterMetadata { method: String },

    #[error("invalid value for parameter '{parameter}': {source}")]
    Coercion {
        parameter: String,
        #[source]
        source: CoercionError,
    },
}

impl BindError {
    /// Stable machine-readable reason, carried in error `data`.
    pub fn reason(&self) -> &'static str {
        match self {
            BindError::MissingArguments { .. } => "missing_arguments",
            BindError::TooManyArguments { .. } => "too_many_arguments",
            BindError::MissingParameters { .. } => "missing_parameters",
            BindError::UnknownParameters { .. } => "unknown_parameters",
            BindError::NoParameterMetadata { .. } => "no_parameter_metadata",
            BindError::Coercion { .. } => "coercion",
        }
    }

    pub fn is_missing_metadata(&self) -> bool {
        matches!(self, BindError::NoParameterMetadata { .. })
    }

    /// Structured detail for error `data`.
    pub fn detail(&self) -> Value {
        let mut data = json!({ "reason": self.reason() });
        match self {
            BindError::MissingParameters { names } | BindError::UnknownParameters { names } => {
                data["parameters"] = json!(names);
            }
            BindError::NoParameterMetadata { method } => {
                data["method"] = json!(method);
                data["detail"] =
                    json!("named-parameter dispatch requires retained parameter-name metadata");
            }
            BindError::Coercion { parameter, source } => {
                data["parameter"] = json!(parameter);
                data["kind"] = json!(source.kind());
                data["message"] = json!(source.to_string());
            }
            BindError::MissingArguments { .. } | BindError::TooManyArguments { .. } => {}
        }
        data
    }

    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        JsonRpcErrorObject::invalid_params(&self.to_string()).with_data(self.detail())
    }
}

pub type BindingResult = Result<BoundArguments, BindError>;

/// A raw value awaiting coercion, or a declared default used as-is.
enum Slot<'a> {
    Supplied {
        label: String,
        spec: &'a ParameterSpec,
        value: Value,
    },
    Variadic {
        label: String,
        spec: &'a ParameterSpec,
        values: Vec<Value>,
    },
    Default {
        spec: &'a ParameterSpec,
        value: Value,
    },
}

/// Matches JSON params against one [`MethodSignature`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterBinder {
    unknown_params: UnknownParamPolicy,
}

impl ParameterBinder {
    pub fn new(unknown_params: UnknownParamPolicy) -> Self {
        Self { unknown_params }
    }

    pub fn unknown_params(&self) -> UnknownParamPolicy {
        self.unknown_params
    }

    /// Bind `params` to `signature`; `None` means params were absent or null.
    pub fn bind(&self, signature: &MethodSignature, params: Option<&RequestParams>) -> BindingResult {
        let slots = match params {
            None => Self::bind_empty(signature)?,
            Some(RequestParams::Array(values)) => Self::bind_positional(signature, values)?,
            Some(RequestParams::Object(map)) => self.bind_named(signature, map)?,
        };

        let mut bound = BoundArguments::default();
        for slot in slots {
            match slot {
                Slot::Supplied { label, spec, value } => {
                    let value = spec
                        .param_type
                        .coerce(value)
                        .map_err(|source| BindError::Coercion { parameter: label, source })?;
                    bound.push(spec.name(), value);
                }
                Slot::Variadic { label, spec, values } => {
                    let mut coerced = Vec::with_capacity(values.len());
                    for (i, value) in values.into_iter().enumerate() {
                        let value = spec.param_type.coerce(value).map_err(|source| {
                            BindError::Coercion {
                                parameter: format!("{}[{}]", label, i),
                                source,
                            }
                        })?;
                        coerced.push(value);
                    }
                    bound.push(spec.name(), Value::Array(coerced));
                }
                Slot::Default { spec, value } => bound.push(spec.name(), value),
            }
        }

        trace!(method = %signature.name, arity = bound.len(), "params bound");
        Ok(bound)
    }

    fn bind_empty(signature: &MethodSignature) -> Result<Vec<Slot<'_>>, BindError> {
        let required = signature.required_count();
        if required > 0 {
            return Err(BindError::MissingArguments {
                required,
                supplied: 0,
            });
        }
        Ok(Self::fill(signature, Vec::new(), Vec::new()))
    }

    fn bind_positional<'a>(
        signature: &'a MethodSignature,
        values: &[Value],
    ) -> Result<Vec<Slot<'a>>, BindError> {
        let fixed = signature.params.len();
        let required = signature.required_count();
        if values.len() < required {
            return Err(BindError::MissingArguments {
                required,
                supplied: values.len(),
            });
        }
        if values.len() > fixed && signature.variadic.is_none() {
            return Err(BindError::TooManyArguments {
                max: fixed,
                supplied: values.len(),
            });
        }

        let split = values.len().min(fixed);
        Ok(Self::fill(
            signature,
            values[..split].to_vec(),
            values[split..].to_vec(),
        ))
    }

    fn bind_named<'a>(
        &self,
        signature: &'a MethodSignature,
        map: &Map<String, Value>,
    ) -> Result<Vec<Slot<'a>>, BindError> {
        if !signature.has_full_metadata() {
            return Err(BindError::NoParameterMetadata {
                method: signature.name.clone(),
            });
        }

        let mut slots = Vec::with_capacity(signature.params.len() + 1);
        let mut missing = Vec::new();
        for (index, spec) in signature.params.iter().enumerate() {
            let label = spec.label(index);
            match spec.name().and_then(|name| map.get(name)) {
                Some(value) => slots.push(Slot::Supplied {
                    label,
                    spec,
                    value: value.clone(),
                }),
                None => match &spec.default {
                    Some(default) if !spec.required => slots.push(Slot::Default {
                        spec,
                        value: default.clone(),
                    }),
                    _ => missing.push(label),
                },
            }
        }
        if !missing.is_empty() {
            return Err(BindError::MissingParameters { names: missing });
        }

        if let Some(tail) = &signature.variadic {
            let label = tail.label(signature.params.len());
            let values = match tail.name().and_then(|name| map.get(name)) {
                None => Vec::new(),
                Some(Value::Array(items)) => items.clone(),
                Some(other) => {
                    return Err(BindError::Coercion {
                        parameter: label,
                        source: CoercionError::TypeMismatch {
                            path: String::new(),
                            expected: ParamType::array_of(tail.param_type.clone()).to_string(),
                            actual: crate::params::json_kind(other),
                        },
                    });
                }
            };
            slots.push(Slot::Variadic {
                label,
                spec: tail,
                values,
            });
        }

        if self.unknown_params == UnknownParamPolicy::Reject {
            let unknown: Vec<String> = map
                .keys()
                .filter(|key| {
                    !signature
                        .params
                        .iter()
                        .chain(signature.variadic.iter())
                        .any(|spec| spec.name() == Some(key.as_str()))
                })
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(BindError::UnknownParameters { names: unknown });
            }
        }

        Ok(slots)
    }

    /// Positional slots: supplied values first, then defaults, then the tail.
    fn fill(signature: &MethodSignature, supplied: Vec<Value>, extra: Vec<Value>) -> Vec<Slot<'_>> {
        let mut supplied = supplied.into_iter();
        let mut slots = Vec::with_capacity(signature.params.len() + 1);
        for (index, spec) in signature.params.iter().enumerate() {
            match supplied.next() {
                Some(value) => slots.push(Slot::Supplied {
                    label: spec.label(index),
                    spec,
                    value,
                }),
                // Arity checks guarantee only optional parameters reach here.
                None => slots.push(Slot::Default {
                    spec,
                    value: spec.default.clone().unwrap_or(Value::Null),
                }),
            }
        }
        if let Some(tail) = &signature.variadic {
            slots.push(Slot::Variadic {
                label: tail.label(signature.params.len()),
                spec: tail,
                values: extra,
            });
        }
        slots
    }
}
