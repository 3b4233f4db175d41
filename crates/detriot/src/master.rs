//! Master role.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use lrpc::{Methods, Server, Service};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RoleConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRequest {
    pub hello: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResponse {
    #[serde(rename = "Message")]
    pub message: String,
}

/// RPC service exposed by the master.
#[derive(Debug, Default)]
pub struct Master;

impl Master {
    pub fn new() -> Self {
        Self
    }

    pub fn handle_test(&self, req: &TestRequest, rsp: &mut TestResponse) -> Result<(), Infallible> {
        rsp.message = format!("rsp: {}", req.hello);
        Ok(())
    }
}

impl Service for Master {
    fn methods(methods: &mut Methods<'_, Self>) {
        methods.method("HandleTest", Master::handle_test);
    }
}

/// Build the master's server with its services registered.
pub fn build_server(config: &RoleConfig) -> Server {
    let mut server = Server::from_config(config.server_config());
    server.register(Arc::new(Master::new()));
    server
}

/// Serve the master until `shutdown` resolves or the listener fails.
pub async fn run<F>(config: &RoleConfig, shutdown: F) -> lrpc::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("master bind: {}", config.bind);
    build_server(config).run_until(shutdown).await
}
