use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agents::TesterRegistry;
use crate::api;
use crate::audit::{AuditTrail, AuditWriter};
use crate::catalog::Catalog;
use crate::cli::commands::ServeArgs;
use crate::errors::ApexError;
use crate::pipeline::{Dispatcher, Orchestrator};

pub async fn handle_serve(args: ServeArgs) -> Result<(), ApexError> {
    let mut config = super::load_config(args.config.as_deref()).await?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.audit_dir.is_some() {
        config.audit.directory = args.audit_dir;
    }

    let catalog = Catalog::load(config.catalog.extensions_dir.as_deref().map(Path::new))?;

    let (audit, audit_task) = match config.audit.directory.as_deref() {
        Some(dir) => {
            let writer = AuditWriter::open(Path::new(dir)).await?;
            info!(path = %writer.path().display(), "Audit log enabled");
            let (trail, rx) = AuditTrail::channel();
            (trail, Some(writer.spawn(rx)))
        }
        None => (AuditTrail::disabled(), None),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    // Testers attach over HTTP in pull mode; none are registered in-process.
    let orchestrator = Orchestrator::new(config, catalog, TesterRegistry::new(), audit);

    let shutdown = CancellationToken::new();
    let dispatcher = Dispatcher::new(orchestrator.clone(), shutdown.clone()).spawn();

    let app = api::build_router(api::AppState::new(orchestrator));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            signal.cancel();
        })
        .await
        .map_err(|e| ApexError::Internal(format!("Server error: {}", e)))?;

    shutdown.cancel();
    let _ = dispatcher.await;
    if let Some(task) = audit_task {
        // The writer drains once every trail handle is dropped.
        let _ = task.await;
    }
    Ok(())
}
