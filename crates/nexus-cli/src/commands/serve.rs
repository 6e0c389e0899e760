//! `nexus serve`: the stdio gateway.

use std::sync::Arc;

use anyhow::{Context, Result};
use nexus_config::Config;
use nexus_gateway::Server;
use tracing::info;

use crate::theme::print_banner;

/// Build the gateway and serve until stdin closes.
pub(crate) async fn run(config: &Config) -> Result<()> {
    print_banner(config);
    let dispatcher = super::build_dispatcher(config)?;
    info!(
        tools = dispatcher.advertised_tools().len(),
        safe_mode = config.server.safe_mode,
        "gateway ready"
    );
    Server::new(Arc::new(dispatcher), config)
        .serve_stdio()
        .await
        .context("stdio transport failed")
}
