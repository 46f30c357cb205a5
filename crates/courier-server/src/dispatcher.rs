//! Method table.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use serde::Serialize;
use serde_json::Value;

use courier_protocol::RpcError;

use crate::args::{Args, MethodError};
use crate::signature::Signature;

/// Future returned by [`Method::invoke`].
pub type MethodFuture = BoxFuture<'static, Result<Value, MethodError>>;

/// A callable exposed over RPC.
pub trait Method: Send + Sync {
    /// Declared parameters, used to bind arguments and explain mismatches.
    fn signature(&self) -> &Signature;

    fn invoke(&self, args: Args) -> MethodFuture;
}

/// A method backed by a synchronous closure.
pub struct FnMethod<F, R> {
    signature: Signature,
    f: F,
    _result: PhantomData<fn() -> R>,
}

impl<F, R> FnMethod<F, R>
where
    F: Fn(Args) -> Result<R, MethodError> + Send + Sync + 'static,
    R: Serialize,
{
    pub fn new(signature: Signature, f: F) -> Self {
        Self {
            signature,
            f,
            _result: PhantomData,
        }
    }
}

impl<F, R> Method for FnMethod<F, R>
where
    F: Fn(Args) -> Result<R, MethodError> + Send + Sync + 'static,
    R: Serialize,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&self, args: Args) -> MethodFuture {
        let result = (self.f)(args).and_then(to_value);
        future::ready(result).boxed()
    }
}

/// A method backed by a closure returning a future.
pub struct AsyncFnMethod<F, Fut> {
    signature: Signature,
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

impl<F, Fut, R> AsyncFnMethod<F, Fut>
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
    R: Serialize,
{
    pub fn new(signature: Signature, f: F) -> Self {
        Self {
            signature,
            f,
            _future: PhantomData,
        }
    }
}

impl<F, Fut, R> Method for AsyncFnMethod<F, Fut>
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
    R: Serialize,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&self, args: Args) -> MethodFuture {
        (self.f)(args)
            .map(|result| result.and_then(to_value))
            .boxed()
    }
}

fn to_value<R: Serialize>(result: R) -> Result<Value, MethodError> {
    serde_json::to_value(result).map_err(MethodError::other)
}

/// Maps method names to methods.
///
/// Registration overwrites silently, so tables for sub-APIs can be built
/// separately and combined with [`Dispatcher::merge`].
#[derive(Clone, Default)]
pub struct Dispatcher {
    methods: HashMap<String, Arc<dyn Method>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `method` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, method: Arc<dyn Method>) -> &mut Self {
        self.methods.insert(name.into(), method);
        self
    }

    /// Registers a synchronous closure.
    pub fn register_fn<F, R>(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
        f: F,
    ) -> &mut Self
    where
        F: Fn(Args) -> Result<R, MethodError> + Send + Sync + 'static,
        R: Serialize + 'static,
    {
        self.register(name, Arc::new(FnMethod::new(signature, f)))
    }

    /// Registers a closure returning a future.
    pub fn register_async<F, Fut, R>(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
        f: F,
    ) -> &mut Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
        R: Serialize + 'static,
    {
        self.register(name, Arc::new(AsyncFnMethod::new(signature, f)))
    }

    /// Returns the method registered under `name`.
    ///
    /// Fails with `MethodNotFound` carrying the name.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Method>, RpcError> {
        self.methods
            .get(name)
            .cloned()
            .ok_or_else(|| RpcError::method_not_found(name))
    }

    /// Copies every entry of `other` into this table, `other` winning on
    /// name collisions.
    pub fn merge(&mut self, other: &Dispatcher) -> &mut Self {
        self.methods.extend(
            other
                .methods
                .iter()
                .map(|(name, method)| (name.clone(), Arc::clone(method))),
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("methods", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_protocol::ErrorKind;
    use serde_json::json;

    fn constant(value: i64) -> impl Fn(Args) -> Result<i64, MethodError> + Send + Sync + 'static {
        move |_| Ok(value)
    }

    async fn call(dispatcher: &Dispatcher, name: &str) -> Value {
        let method = dispatcher.lookup(name).unwrap();
        method.invoke(Args::default()).await.unwrap()
    }

    #[tokio::test]
    async fn register_and_lookup() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_fn("one", Signature::new(), constant(1));
        assert!(dispatcher.contains("one"));
        assert_eq!(call(&dispatcher, "one").await, json!(1));
    }

    #[test]
    fn missing_method_names_itself() {
        let err = Dispatcher::new().lookup("cook_salad").err().unwrap();
        assert!(err.is(ErrorKind::MethodNotFound));
        assert_eq!(err.data(), &json!("cook_salad"));
    }

    #[tokio::test]
    async fn registration_overwrites() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register_fn("n", Signature::new(), constant(1))
            .register_fn("n", Signature::new(), constant(2));
        assert_eq!(dispatcher.len(), 1);
        assert_eq!(call(&dispatcher, "n").await, json!(2));
    }

    #[tokio::test]
    async fn merge_prefers_incoming_entries() {
        let mut base = Dispatcher::new();
        base.register_fn("a", Signature::new(), constant(1))
            .register_fn("shared", Signature::new(), constant(1));

        let mut sub = Dispatcher::new();
        sub.register_fn("b", Signature::new(), constant(2))
            .register_fn("shared", Signature::new(), constant(2));

        base.merge(&sub);
        assert_eq!(base.names(), ["a", "b", "shared"]);
        assert_eq!(call(&base, "shared").await, json!(2));
        assert_eq!(sub.len(), 2);
    }

    #[tokio::test]
    async fn async_methods() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_async("echo", Signature::new().required("x"), |args| async move {
            tokio::task::yield_now().await;
            args.get::<String>("x")
        });

        let method = dispatcher.lookup("echo").unwrap();
        assert_eq!(method.signature(), &Signature::new().required("x"));
        let args = Args::from_params(json!({"x": "hi"}).as_object().cloned().unwrap());
        assert_eq!(method.invoke(args).await.unwrap(), json!("hi"));
    }

    #[tokio::test]
    async fn results_are_serialized() {
        #[derive(Serialize)]
        struct Salad {
            name: &'static str,
            leaves: u8,
        }

        let mut dispatcher = Dispatcher::new();
        dispatcher.register_fn("salad", Signature::new(), |_| {
            Ok(Salad {
                name: "Caesar",
                leaves: 12,
            })
        });
        assert_eq!(
            call(&dispatcher, "salad").await,
            json!({"name": "Caesar", "leaves": 12})
        );
    }

    #[test]
    fn debug_lists_sorted_names() {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register_fn("z", Signature::new(), constant(0))
            .register_fn("a", Signature::new(), constant(0));
        assert_eq!(
            format!("{dispatcher:?}"),
            r#"Dispatcher { methods: ["a", "z"] }"#
        );
    }
}
