//! Handler objects, their method tables and receivers.
//!
//! A [`Handler`] lists its callable methods once, at registration, as a
//! [`MethodTable`]. Each entry is a typed async closure: its argument is
//! deserialized from the request params and its result serialized back,
//! so dispatch never inspects types at runtime.

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use microrpc_core::{RequestContext, RpcError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Trait implemented by every callable method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the method with decoded params and the request context.
    async fn handle(&self, params: Value, ctx: &RequestContext) -> Result<Value, RpcError>;
}

/// Adapter turning a typed async closure into a [`MethodHandler`].
struct FnMethod<F, P, R, Fut> {
    f: F,
    _marker: PhantomData<fn(P) -> (R, Fut)>,
}

#[async_trait]
impl<F, P, R, Fut> MethodHandler for FnMethod<F, P, R, Fut>
where
    F: Fn(RequestContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, RpcError>> + Send + 'static,
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    async fn handle(&self, params: Value, ctx: &RequestContext) -> Result<Value, RpcError> {
        let params: P = serde_json::from_value(params).map_err(|e| RpcError::InvalidParams {
            message: e.to_string(),
        })?;
        let result = (self.f)(ctx.clone(), params).await?;
        serde_json::to_value(result).map_err(|e| RpcError::Internal {
            message: format!("failed to encode result: {e}"),
        })
    }
}

/// Method name to invoker table exposed by a [`Handler`].
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: BTreeMap<String, Arc<dyn MethodHandler>>,
}

impl MethodTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typed method. A later entry with the same name replaces the
    /// earlier one.
    #[must_use]
    pub fn method<F, P, R, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(RequestContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, RpcError>> + Send + 'static,
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
    {
        self.handler(
            name,
            FnMethod {
                f,
                _marker: PhantomData,
            },
        )
    }

    /// Add an untyped method working directly on JSON values.
    #[must_use]
    pub fn handler(mut self, name: impl Into<String>, handler: impl MethodHandler + 'static) -> Self {
        let _ = self.methods.insert(name.into(), Arc::new(handler));
        self
    }

    /// Number of methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the table has no methods.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Method names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub(crate) fn into_methods(self) -> BTreeMap<String, Arc<dyn MethodHandler>> {
        self.methods
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.methods.keys()).finish()
    }
}

/// A service object whose methods can be registered with the server.
pub trait Handler: Send + Sync + 'static {
    /// Build the method table. Called once per registration.
    fn methods(self: Arc<Self>) -> MethodTable;

    /// Name used when the handler is registered without an explicit one.
    /// Defaults to the handler's type name.
    fn name(&self) -> String {
        type_derived_name::<Self>()
    }
}

/// Last path segment of a type's name, generic arguments stripped.
pub fn type_derived_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_owned()
}

/// A handler paired with an optional registration name.
#[derive(Clone)]
pub struct Receiver {
    name: Option<String>,
    handler: Arc<dyn Handler>,
}

impl Receiver {
    /// Wrap a handler to be registered under its derived name.
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            name: None,
            handler,
        }
    }

    /// Wrap a handler to be registered under `name`. An empty name falls
    /// back to the derived name.
    pub fn named(name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        let name = name.into();
        Self {
            name: (!name.is_empty()).then_some(name),
            handler,
        }
    }

    /// The service name methods will be reachable under.
    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.handler.name())
    }

    /// Whether the name was given explicitly.
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Build the handler's method table.
    pub fn methods(&self) -> MethodTable {
        Arc::clone(&self.handler).methods()
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("name", &self.name())
            .field("named", &self.is_named())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Greet {
        name: String,
    }

    struct Greeter {
        greeting: String,
    }

    impl Handler for Greeter {
        fn methods(self: Arc<Self>) -> MethodTable {
            MethodTable::new().method("Hello", move |_ctx, req: Greet| {
                let this = Arc::clone(&self);
                async move { Ok::<_, RpcError>(format!("{} {}", this.greeting, req.name)) }
            })
        }
    }

    fn greeter() -> Arc<dyn Handler> {
        Arc::new(Greeter {
            greeting: "hello".into(),
        })
    }

    #[tokio::test]
    async fn typed_method_decodes_params_and_encodes_result() {
        let table = greeter().methods();
        let method = table.into_methods().remove("Hello").unwrap();
        let out = method
            .handle(json!({"name": "ada"}), &RequestContext::background())
            .await
            .unwrap();
        assert_eq!(out, json!("hello ada"));
    }

    #[tokio::test]
    async fn bad_params_are_invalid_params() {
        let method = greeter().methods().into_methods().remove("Hello").unwrap();
        let err = method
            .handle(json!({"nom": 1}), &RequestContext::background())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn handler_error_passes_through() {
        let table = MethodTable::new().method("Fail", |_ctx, _: Value| async {
            Err::<Value, _>(RpcError::Custom {
                code: "TEAPOT".into(),
                message: "short and stout".into(),
            })
        });
        let method = table.into_methods().remove("Fail").unwrap();
        let err = method
            .handle(Value::Null, &RequestContext::background())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TEAPOT");
    }

    #[tokio::test]
    async fn context_metadata_reaches_method() {
        let table = MethodTable::new().method("Who", |ctx: RequestContext, _: Value| async move {
            Ok::<_, RpcError>(ctx.metadata().get("X-User").map(str::to_owned))
        });
        let method = table.into_methods().remove("Who").unwrap();
        let metadata: microrpc_core::Metadata = [("X-User", "ada")].into_iter().collect();
        let ctx = RequestContext::background().with_metadata(metadata);
        assert_eq!(method.handle(Value::Null, &ctx).await.unwrap(), json!("ada"));
    }

    #[test]
    fn derived_name_is_last_segment() {
        assert_eq!(greeter().name(), "Greeter");
        assert_eq!(type_derived_name::<Vec<String>>(), "Vec");
        assert_eq!(
            type_derived_name::<std::collections::HashMap<String, Vec<u8>>>(),
            "HashMap"
        );
    }

    #[test]
    fn receiver_names() {
        assert_eq!(Receiver::new(greeter()).name(), "Greeter");
        assert!(!Receiver::new(greeter()).is_named());
        let named = Receiver::named("Hi", greeter());
        assert_eq!(named.name(), "Hi");
        assert!(named.is_named());
        assert_eq!(Receiver::named("", greeter()).name(), "Greeter");
    }

    #[test]
    fn table_names_sorted_and_deduplicated() {
        let table = MethodTable::new()
            .method("B", |_ctx, v: Value| async move { Ok::<_, RpcError>(v) })
            .method("A", |_ctx, v: Value| async move { Ok::<_, RpcError>(v) })
            .method("B", |_ctx, v: Value| async move { Ok::<_, RpcError>(v) });
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(table.len(), 2);
        assert!(MethodTable::new().is_empty());
    }
}
