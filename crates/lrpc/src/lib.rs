//! lrpc - JSON-over-HTTP RPC between detriot processes.
//!
//! A service type lists its handlers through [`Service`]; a [`Server`] maps
//! each one to `/qrpc/<type>/<method>` and dispatches calls to it. Requests
//! and responses travel in the envelopes defined in [`envelope`].
//!
//! # Example
//!
//! ```rust,ignore
//! use lrpc::{Methods, Server, Service};
//! use std::sync::Arc;
//!
//! #[derive(Default, serde::Deserialize)]
//! struct EchoRequest { text: String }
//!
//! #[derive(Default, serde::Serialize)]
//! struct EchoResponse { text: String }
//!
//! struct Echo;
//!
//! impl Echo {
//!     fn handle_say(&self, req: &EchoRequest, rsp: &mut EchoResponse) -> Result<(), String> {
//!         rsp.text = req.text.clone();
//!         Ok(())
//!     }
//! }
//!
//! impl Service for Echo {
//!     fn methods(methods: &mut Methods<'_, Self>) {
//!         methods.method("HandleSay", Echo::handle_say);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> lrpc::Result<()> {
//!     let mut server = Server::new(":8000");
//!     server.register(Arc::new(Echo));
//!     // POST /qrpc/echo/say {"head":{},"body":{"text":"hi"}}
//!     server.run().await
//! }
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod log;
pub mod registry;
pub mod server;

pub use client::Client;
pub use config::{parse_bind_addr, ServerConfig};
pub use dispatch::{Dispatcher, Outcome};
pub use envelope::{
    FailureCode, RequestEnvelope, RequestHead, ResponseEnvelope, ResponseHead, CODE_HEADER,
    MESSAGE_HEADER,
};
pub use error::{LrpcError, Result};
pub use log::LogConfig;
pub use registry::{endpoint_path, HandlerDescriptor, Methods, Registry, Service};
pub use server::{Server, ServerHandle};
