//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP. Binds to localhost unless configured otherwise.

use crate::handler::RpcHandler;
use crate::rate_limiter::RateLimiter;
use crate::types::{
    CompletePaymentRequest, CreateListingRequest, GetListingRequest, ListListingsRequest,
    OwnedListingRequest, UpdateListingRequest,
};
use jobboard_core::application::LifecycleOrchestrator;
use jobboard_core::port::TimerQueue;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9640;
const DEFAULT_RATE_LIMIT_BURST: u32 = 200;
const DEFAULT_RATE_LIMIT_PER_SEC: u32 = 100;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: u32,
    /// Register `payment.complete.v1`; only for the sandbox gateway
    pub allow_manual_completion: bool,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            rate_limit_per_sec: DEFAULT_RATE_LIMIT_PER_SEC,
            allow_manual_completion: false,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        orchestrator: Arc<LifecycleOrchestrator>,
        timers: Arc<dyn TimerQueue>,
    ) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_burst, config.rate_limit_per_sec);
        Self {
            config,
            handler: Arc::new(RpcHandler::new(orchestrator, timers, limiter)),
        }
    }

    fn build_module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("listing.create.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CreateListingRequest = params.parse()?;
                    handler.create_listing(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("listing.update.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: UpdateListingRequest = params.parse()?;
                    handler.update_listing(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("listing.get.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: GetListingRequest = params.parse()?;
                    handler.get_listing(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("listing.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ListListingsRequest = params.parse()?;
                    handler.list_listings(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("listing.delete.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: OwnedListingRequest = params.parse()?;
                    handler.delete_listing(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("listing.retry_payment.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: OwnedListingRequest = params.parse()?;
                    handler.retry_payment(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Manual completion bypasses the gateway; sandbox only
        if self.config.allow_manual_completion {
            let handler = self.handler.clone();
            module
                .register_async_method("payment.complete.v1", move |params, _, _| {
                    let handler = handler.clone();
                    async move {
                        let req: CompletePaymentRequest = params.parse()?;
                        handler.complete_payment(req).await
                    }
                })
                .map_err(|e| e.to_string())?;
        }

        // Parameterless methods ignore whatever params are sent
        let handler = self.handler.clone();
        module
            .register_method("pricing.tiers.v1", move |_, _, _| {
                Ok::<_, ErrorObjectOwned>(handler.pricing_tiers())
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.stats.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.stats().await }
            })
            .map_err(|e| e.to_string())?;

        Ok(module)
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the running handle and the bound address (port 0 picks a free port).
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = self.build_module()?;
        let handle = server.start(module);

        info!(
            addr = %local_addr,
            manual_completion = self.config.allow_manual_completion,
            "JSON-RPC server started"
        );
        Ok((handle, local_addr))
    }
}
