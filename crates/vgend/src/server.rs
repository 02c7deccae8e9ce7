//! Server wiring and lifecycle

use std::sync::Arc;

use tokio::net::TcpListener;
use vgen_core::{ArtifactStore, Orchestrator, Pipeline, RunRegistry, TextGenerator, Verifier};
use vgen_llm::HttpTextGenerator;
use vgen_sim::IcarusVerifier;

use crate::api::{create_router, AppState};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};

pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Build the collaborators named by `config` and the run orchestrator.
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let generator: Arc<dyn TextGenerator> = Arc::new(
            HttpTextGenerator::new(config.llm.clone())
                .map_err(|e| DaemonError::Config(e.to_string()))?,
        );

        let mut verifier = IcarusVerifier::new(config.sim.clone());
        if config.sim.llm_reports {
            verifier = verifier.with_reviewer(generator.clone());
        }
        let verifier: Arc<dyn Verifier> = Arc::new(verifier);

        let pipeline = Pipeline::new(generator, verifier, config.pipeline.clone());
        let store = ArtifactStore::new(&config.pipeline.workspace)
            .map_err(|e| DaemonError::Config(e.to_string()))?;
        let orchestrator = Orchestrator::new(pipeline, store, Arc::new(RunRegistry::new()));

        Ok(Self {
            state: AppState::new(orchestrator),
            config,
        })
    }

    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            %addr,
            backend = self.config.llm.backend.as_str(),
            model = self.config.llm.model(),
            workspace = %self.config.pipeline.workspace.display(),
            "vgend listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("vgend shutting down");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
