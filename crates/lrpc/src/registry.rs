//! Handler registry mapping endpoint paths to type-erased handlers.
//!
//! A service type lists its handlers once through [`Service::methods`]. Each
//! handler is a plain function taking the service, a request and a response to
//! fill in:
//!
//! ```ignore
//! impl Service for Master {
//!     fn methods(methods: &mut Methods<'_, Self>) {
//!         methods.method("HandleTest", Master::handle_test);
//!     }
//! }
//! ```
//!
//! Only names starting with `Handle` become endpoints. The path is
//! `/qrpc/<lowercase type name>/<lowercase name without "Handle">`, so the
//! example above is served at `/qrpc/master/test`.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::{debug, info, warn, Span};

use crate::error::{LrpcError, Result};

/// Method name prefix marking a handler.
pub const HANDLE_PREFIX: &str = "Handle";

/// Path prefix shared by every endpoint.
pub const PATH_PREFIX: &str = "/qrpc/";

/// Derive the endpoint path for a method, or `None` if it is not a handler.
pub fn endpoint_path(type_name: &str, method_name: &str) -> Option<String> {
    let suffix = method_name.strip_prefix(HANDLE_PREFIX)?;
    Some(format!(
        "{}{}/{}",
        PATH_PREFIX,
        type_name.to_lowercase(),
        suffix.to_lowercase()
    ))
}

/// Last path segment of a Rust type name, without generic arguments.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A service object whose handlers can be registered.
pub trait Service: Send + Sync + Sized + 'static {
    /// Name used to derive endpoint paths. Defaults to the Rust type name.
    fn type_name() -> &'static str {
        short_type_name::<Self>()
    }

    /// List the service's methods.
    fn methods(methods: &mut Methods<'_, Self>);
}

/// Result of invoking a handler that ran to completion.
#[derive(Debug)]
pub enum Invocation {
    /// Serialized response value.
    Reply(Box<RawValue>),
    /// The handler reported an error with this message.
    Failed(String),
}

/// Uniform interface over handlers of any request/response type.
pub trait ErasedHandler: Send + Sync + 'static {
    /// Decode `body`, run the handler and encode its response.
    ///
    /// Decode and encode failures are returned as errors. A failure reported
    /// by the handler is an [`Invocation::Failed`].
    fn invoke(&self, body: &RawValue) -> Result<Invocation>;
}

/// Handler bound to its service object.
struct TypedHandler<S, Req, Rsp, E, F> {
    service: Arc<S>,
    handler: F,
    _phantom: PhantomData<fn(&Req, &mut Rsp) -> E>,
}

impl<S, Req, Rsp, E, F> ErasedHandler for TypedHandler<S, Req, Rsp, E, F>
where
    S: Service,
    Req: DeserializeOwned + 'static,
    Rsp: Serialize + Default + 'static,
    E: fmt::Display + 'static,
    F: Fn(&S, &Req, &mut Rsp) -> std::result::Result<(), E> + Send + Sync + 'static,
{
    fn invoke(&self, body: &RawValue) -> Result<Invocation> {
        let request: Req = serde_json::from_str(body.get()).map_err(LrpcError::Decode)?;
        let mut response = Rsp::default();

        match (self.handler)(&self.service, &request, &mut response) {
            Ok(()) => {
                let raw = serde_json::value::to_raw_value(&response).map_err(LrpcError::Encode)?;
                Ok(Invocation::Reply(raw))
            }
            Err(e) => Ok(Invocation::Failed(e.to_string())),
        }
    }
}

/// One registered endpoint.
pub struct HandlerDescriptor {
    name: String,
    path: String,
    request_type: &'static str,
    response_type: &'static str,
    handler: Box<dyn ErasedHandler>,
}

impl HandlerDescriptor {
    /// Qualified name, `<ServiceType>.<MethodName>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn request_type(&self) -> &'static str {
        self.request_type
    }

    pub fn response_type(&self) -> &'static str {
        self.response_type
    }

    pub fn invoke(&self, body: &RawValue) -> Result<Invocation> {
        self.handler.invoke(body)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("request_type", &self.request_type)
            .field("response_type", &self.response_type)
            .finish_non_exhaustive()
    }
}

/// Collects the handlers of one service during [`Registry::register`].
pub struct Methods<'a, S> {
    registry: &'a mut Registry,
    service: Arc<S>,
    type_name: &'static str,
}

impl<S: Service> Methods<'_, S> {
    /// Register `handler` under `name`.
    ///
    /// Names without the `Handle` prefix are skipped.
    pub fn method<Req, Rsp, E, F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        Req: DeserializeOwned + 'static,
        Rsp: Serialize + Default + 'static,
        E: fmt::Display + 'static,
        F: Fn(&S, &Req, &mut Rsp) -> std::result::Result<(), E> + Send + Sync + 'static,
    {
        let Some(path) = endpoint_path(self.type_name, name) else {
            debug!(
                parent: &self.registry.span,
                "skipping {}.{}: not a handler", self.type_name, name
            );
            return self;
        };

        let descriptor = HandlerDescriptor {
            name: format!("{}.{}", self.type_name, name),
            path,
            request_type: std::any::type_name::<Req>(),
            response_type: std::any::type_name::<Rsp>(),
            handler: Box::new(TypedHandler {
                service: Arc::clone(&self.service),
                handler,
                _phantom: PhantomData,
            }),
        };
        self.registry.insert(descriptor);
        self
    }
}

/// Endpoint path to handler mapping.
///
/// Filled before serving starts, then shared read-only between calls.
pub struct Registry {
    handlers: HashMap<String, HandlerDescriptor>,
    span: Span,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            span: Span::current(),
        }
    }

    /// Attach registration diagnostics to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub(crate) fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    /// Register every handler of `service`.
    ///
    /// A handler whose path is already taken replaces the earlier one.
    pub fn register<S: Service>(&mut self, service: Arc<S>) {
        let mut methods = Methods {
            registry: self,
            service,
            type_name: S::type_name(),
        };
        S::methods(&mut methods);
    }

    fn insert(&mut self, descriptor: HandlerDescriptor) {
        info!(
            parent: &self.span,
            "register handle {} to {}", descriptor.name, descriptor.path
        );
        let path = descriptor.path.clone();
        if let Some(previous) = self.handlers.insert(path, descriptor) {
            warn!(
                parent: &self.span,
                "handler {} at {} was replaced", previous.name, previous.path
            );
        }
    }

    /// Look up a handler. Paths are case-insensitive.
    pub fn get(&self, path: &str) -> Option<&HandlerDescriptor> {
        self.handlers.get(&path.to_lowercase())
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("paths", &self.paths())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, Deserialize)]
    struct Ping {
        #[serde(default)]
        n: u32,
    }

    #[derive(Debug, Default, Serialize)]
    struct Pong {
        n: u32,
    }

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
    }

    impl Counter {
        fn handle_ping(&self, req: &Ping, rsp: &mut Pong) -> std::result::Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            rsp.n = req.n + 1;
            Ok(())
        }

        fn handle_fail(&self, _req: &Ping, rsp: &mut Pong) -> std::result::Result<(), String> {
            rsp.n = 99;
            Err("counter is broken".to_string())
        }
    }

    impl Service for Counter {
        fn methods(methods: &mut Methods<'_, Self>) {
            methods
                .method("HandlePing", Counter::handle_ping)
                .method("HandleFail", Counter::handle_fail)
                .method("Reset", Counter::handle_ping)
                .method("handlePing", Counter::handle_ping);
        }
    }

    struct Renamed;

    impl Service for Renamed {
        fn type_name() -> &'static str {
            "Counter"
        }

        fn methods(methods: &mut Methods<'_, Self>) {
            methods.method("HandlePing", |_: &Renamed, _: &Ping, rsp: &mut Pong| {
                rsp.n = 1000;
                Ok::<(), String>(())
            });
        }
    }

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    #[test]
    fn test_endpoint_path_derivation() {
        assert_eq!(
            endpoint_path("Master", "HandleTest").as_deref(),
            Some("/qrpc/master/test")
        );
        assert_eq!(
            endpoint_path("NodeAgent", "HandleGetStatus").as_deref(),
            Some("/qrpc/nodeagent/getstatus")
        );
        assert_eq!(endpoint_path("Master", "Run"), None);
        assert_eq!(endpoint_path("Master", "handleTest"), None);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Counter>(), "Counter");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
        assert_eq!(short_type_name::<u32>(), "u32");
    }

    #[test]
    fn test_register_only_eligible_methods() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Counter::default()));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.paths(), vec!["/qrpc/counter/fail", "/qrpc/counter/ping"]);

        let descriptor = registry.get("/qrpc/counter/ping").unwrap();
        assert_eq!(descriptor.name(), "Counter.HandlePing");
        assert!(descriptor.request_type().ends_with("Ping"));
        assert!(descriptor.response_type().ends_with("Pong"));
    }

    #[test]
    fn test_registration_is_deterministic() {
        let mut first = Registry::new();
        first.register(Arc::new(Counter::default()));
        let mut second = Registry::new();
        second.register(Arc::new(Counter::default()));

        assert_eq!(first.paths(), second.paths());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Counter::default()));

        assert!(registry.get("/QRPC/Counter/PING").is_some());
        assert!(registry.get("/qrpc/counter/missing").is_none());
    }

    #[test]
    fn test_later_registration_overwrites() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Counter::default()));
        registry.register(Arc::new(Renamed));

        assert_eq!(registry.len(), 2);
        let outcome = registry
            .get("/qrpc/counter/ping")
            .unwrap()
            .invoke(&raw("{}"))
            .unwrap();
        match outcome {
            Invocation::Reply(body) => assert_eq!(body.get(), r#"{"n":1000}"#),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_invoke_reply_and_failure() {
        let counter = Arc::new(Counter::default());
        let mut registry = Registry::new();
        registry.register(Arc::clone(&counter));

        let reply = registry
            .get("/qrpc/counter/ping")
            .unwrap()
            .invoke(&raw(r#"{"n":41}"#))
            .unwrap();
        match reply {
            Invocation::Reply(body) => assert_eq!(body.get(), r#"{"n":42}"#),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

        let failed = registry
            .get("/qrpc/counter/fail")
            .unwrap()
            .invoke(&raw("{}"))
            .unwrap();
        match failed {
            Invocation::Failed(message) => assert_eq!(message, "counter is broken"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_invoke_decode_error_skips_handler() {
        let counter = Arc::new(Counter::default());
        let mut registry = Registry::new();
        registry.register(Arc::clone(&counter));

        let result = registry
            .get("/qrpc/counter/ping")
            .unwrap()
            .invoke(&raw(r#"{"n":"not a number"}"#));

        assert!(matches!(result, Err(LrpcError::Decode(_))));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }
}
