//! Call arguments, host context and method failures.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use courier_protocol::{Params, REQUEST_PARAM, Request, RpcError};

use crate::signature::Signature;

/// A context value as stored by the host.
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Host-supplied values injected into calls by parameter name.
///
/// A method receives a context value only when it declares a parameter of
/// that name. Callers can never supply or override one.
#[derive(Clone, Default)]
pub struct Context {
    values: HashMap<String, ContextValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), Arc::new(value));
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Context").field("names", &names).finish()
    }
}

/// Failure of a method invocation.
#[derive(Debug, Error)]
pub enum MethodError {
    /// A taxonomy error, passed to the caller unchanged.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The arguments did not fit the method's parameters.
    #[error("SignatureError: {0}")]
    Signature(String),

    /// Any other failure. Reported to the caller as a `ServerError`.
    #[error("{kind}: {description}")]
    Failure { kind: String, description: String },
}

impl MethodError {
    pub fn failure(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Failure {
            kind: kind.into(),
            description: description.into(),
        }
    }

    /// Wraps a native error, naming it by its type.
    pub fn other<E: std::error::Error>(err: E) -> Self {
        let kind = std::any::type_name::<E>()
            .rsplit("::")
            .next()
            .unwrap_or("Error");
        Self::failure(kind, err.to_string())
    }
}

/// Arguments handed to a method.
///
/// Built by [`Args::bind`] from the request parameters, the host context
/// and the method's [`Signature`].
#[derive(Default)]
pub struct Args {
    values: Params,
    extra: Params,
    context: HashMap<String, ContextValue>,
    request: Option<Arc<Request>>,
}

impl Args {
    /// Matches a request against a signature.
    ///
    /// Fails with [`MethodError::Signature`] when a parameter is missing, a
    /// name is not declared and the method has no open sink, or the
    /// request supplies a name reserved for the host.
    pub fn bind(
        signature: &Signature,
        request: &Arc<Request>,
        context: &Context,
    ) -> Result<Self, MethodError> {
        if let Some(name) = request
            .params
            .keys()
            .find(|n| n.as_str() == REQUEST_PARAM || context.contains(n))
        {
            return Err(MethodError::Signature(format!(
                "got multiple values for argument '{name}'"
            )));
        }

        let mut args = Self::default();
        for param in signature.params() {
            let name = param.name.as_str();
            if name == REQUEST_PARAM {
                args.request = Some(Arc::clone(request));
            } else if let Some(value) = context.get(name) {
                args.context.insert(name.to_string(), Arc::clone(value));
            } else if let Some(value) = request.params.get(name) {
                args.values.insert(name.to_string(), value.clone());
            } else if !param.has_default {
                return Err(MethodError::Signature(format!(
                    "missing required argument '{name}'"
                )));
            }
        }

        for (name, value) in &request.params {
            if signature.declares(name) {
                continue;
            }
            if !signature.has_extra() {
                return Err(MethodError::Signature(format!(
                    "got an unexpected keyword argument '{name}'"
                )));
            }
            args.extra.insert(name.clone(), value.clone());
        }

        Ok(args)
    }

    /// Builds arguments directly from named values.
    pub fn from_params(values: Params) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Deserializes a supplied argument.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, MethodError> {
        match self.values.get(name) {
            Some(value) => decode(name, value.clone()),
            None => Err(MethodError::Signature(format!(
                "argument '{name}' was not supplied"
            ))),
        }
    }

    /// Deserializes an argument that may be absent or null.
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, MethodError> {
        match self.values.get(name) {
            Some(value) => decode(name, value.clone()),
            None => Ok(None),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Supplied declared arguments.
    pub fn values(&self) -> &Params {
        &self.values
    }

    /// Supplied names the method did not declare. Empty unless the
    /// signature accepts extra names.
    pub fn extra(&self) -> &Params {
        &self.extra
    }

    /// The request being served, when the method declares `rpc_request`.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_deref()
    }

    /// A context value the method declared.
    pub fn context<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, MethodError> {
        let value = self
            .context
            .get(name)
            .ok_or_else(|| MethodError::failure("ContextError", format!("no context value '{name}'")))?;
        Arc::clone(value).downcast::<T>().map_err(|_| {
            MethodError::failure(
                "ContextError",
                format!(
                    "context value '{name}' is not a {}",
                    std::any::type_name::<T>()
                ),
            )
        })
    }
}

fn decode<T: DeserializeOwned>(name: &str, value: Value) -> Result<T, MethodError> {
    serde_json::from_value(value)
        .map_err(|e| RpcError::invalid_params(format!("Bad \"{name}\" value: {e}")).into())
}
