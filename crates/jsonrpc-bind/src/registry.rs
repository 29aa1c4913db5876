//! Method registry: name to ordered overload set.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{
    handler::MethodHandler,
    params::{DeclarationError, MethodSignature, OverloadKey, ParamType, ParameterSpec},
};

/// One registered callable: its signature plus the code behind it.
#[derive(Clone)]
pub struct MethodTarget {
    signature: MethodSignature,
    overload_key: OverloadKey,
    handler: Arc<dyn MethodHandler>,
}

impl MethodTarget {
    /// Build a target from an explicit signature, validating it.
    pub fn new<H>(signature: MethodSignature, handler: H) -> Result<Self, DeclarationError>
    where
        H: MethodHandler + 'static,
    {
        Self::from_arc(signature, Arc::new(handler))
    }

    pub fn from_arc(
        signature: MethodSignature,
        handler: Arc<dyn MethodHandler>,
    ) -> Result<Self, DeclarationError> {
        signature.validate()?;
        let overload_key = signature.overload_key();
        Ok(Self {
            signature,
            overload_key,
            handler,
        })
    }

    pub fn builder(name: impl Into<String>) -> MethodTargetBuilder {
        MethodTargetBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn overload_key(&self) -> &OverloadKey {
        &self.overload_key
    }

    pub fn handler(&self) -> &Arc<dyn MethodHandler> {
        &self.handler
    }
}

impl fmt::Debug for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTarget")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Fluent declaration of a [`MethodTarget`].
///
/// ```rust
/// use jsonrpc_bind::prelude::*;
/// use serde_json::json;
///
/// let target = MethodTarget::builder("divide")
///     .param("dividend", ParamType::F64)
///     .param("divisor", ParamType::F64)
///     .optional("round", ParamType::Bool, json!(false))
///     .build(handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
///         Ok::<_, MethodError>(args.arg::<f64>(0)? / args.arg::<f64>(1)?)
///     }))
///     .unwrap();
/// assert_eq!(target.signature().params.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MethodTargetBuilder {
    signature: MethodSignature,
}

impl MethodTargetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            signature: MethodSignature::new(name, Vec::new()),
        }
    }

    /// Add a required named parameter
    pub fn param(self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.spec(ParameterSpec::required(name, param_type))
    }

    /// Add an optional named parameter bound to `default` when not supplied
    pub fn optional(self, name: impl Into<String>, param_type: ParamType, default: Value) -> Self {
        self.spec(ParameterSpec::optional(name, param_type, default))
    }

    /// Add a required parameter with no retained name
    pub fn positional(self, param_type: ParamType) -> Self {
        self.spec(ParameterSpec::unnamed(param_type))
    }

    pub fn spec(mut self, spec: ParameterSpec) -> Self {
        self.signature.params.push(spec);
        self
    }

    /// Declare the variadic tail. A second call replaces the first.
    pub fn variadic(mut self, spec: ParameterSpec) -> Self {
        self.signature.variadic = Some(spec);
        self
    }

    /// Drop every parameter name, as a host without name metadata would.
    pub fn strip_names(mut self) -> Self {
        for spec in self.signature.params.iter_mut().chain(self.signature.variadic.iter_mut()) {
            spec.declared_name = None;
        }
        self
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn build<H>(self, handler: H) -> Result<MethodTarget, DeclarationError>
    where
        H: MethodHandler + 'static,
    {
        MethodTarget::new(self.signature, handler)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("Method '{0}' not found")]
    MethodNotFound(String),
}

#[derive(Default)]
struct Registrations {
    /// Names in first-registration order.
    order: Vec<String>,
    overloads: HashMap<String, Vec<Arc<MethodTarget>>>,
}

/// Name-keyed overload sets, safe to read from concurrent dispatches.
///
/// Within one name, overloads keep registration order; re-registering an
/// existing overload key replaces that entry in place.
#[derive(Default)]
pub struct MethodRegistry {
    inner: RwLock<Registrations>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target under its signature's name.
    ///
    /// Returns the target it replaced, if any.
    pub fn register(&self, target: MethodTarget) -> Option<Arc<MethodTarget>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let name = target.name().to_string();
        let target = Arc::new(target);

        let registrations = &mut *inner;
        if !registrations.overloads.contains_key(&name) {
            registrations.order.push(name.clone());
        }
        let overloads = registrations.overloads.entry(name.clone()).or_default();

        match overloads
            .iter_mut()
            .find(|existing| existing.overload_key() == target.overload_key())
        {
            Some(existing) => {
                debug!(method = %name, overload = %target.overload_key(), "replacing overload");
                Some(std::mem::replace(existing, target))
            }
            None => {
                debug!(method = %name, overload = %target.overload_key(), "registered overload");
                overloads.push(target);
                None
            }
        }
    }

    /// Remove every overload registered under `name`.
    pub fn unregister(&self, name: &str) -> Vec<Arc<MethodTarget>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.order.retain(|n| n != name);
        inner.overloads.remove(name).unwrap_or_default()
    }

    /// All overloads for `name`, in registration order.
    pub fn lookup(&self, name: &str) -> Result<Vec<Arc<MethodTarget>>, LookupError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match inner.overloads.get(name) {
            Some(overloads) if !overloads.is_empty() => Ok(overloads.clone()),
            _ => Err(LookupError::MethodNotFound(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Registered method names, in first-registration order.
    pub fn registered_methods(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.order.clone()
    }

    /// Signatures registered under `name`, in registration order.
    pub fn overloads(&self, name: &str) -> Vec<MethodSignature> {
        self.lookup(name)
            .map(|targets| targets.iter().map(|t| t.signature().clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.registered_methods())
            .finish()
    }
}
