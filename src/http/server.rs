//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the guarded demo routes and the status route
//! - Wire up middleware (request ID, tracing, timeout)
//! - Start the background tasks of the active strategy
//! - Bind server to listener and stop on the shutdown broadcast

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admission::AdmissionFacade;
use crate::backend::{Backend, BackendRequest, UnstableBackend};
use crate::config::{ConfigError, GuardConfig};
use crate::http::request::{request_id, MakeRequestUuidV4};
use crate::http::response::verdict_response;
use crate::lifecycle::Shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<AdmissionFacade>,
}

/// HTTP server in front of the guarded backend.
pub struct HttpServer {
    router: Router,
    config: GuardConfig,
    facade: Arc<AdmissionFacade>,
}

impl HttpServer {
    /// Create a server around the simulated unstable backend.
    pub fn new(config: GuardConfig) -> Result<Self, ConfigError> {
        let backend = Arc::new(UnstableBackend::from_config(&config.backend));
        Self::with_backend(config, backend)
    }

    /// Create a server around any backend.
    pub fn with_backend(config: GuardConfig, backend: Arc<dyn Backend>) -> Result<Self, ConfigError> {
        let facade = Arc::new(AdmissionFacade::from_config(&config, backend)?);
        let state = AppState {
            facade: facade.clone(),
        };
        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            facade,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, state: AppState) -> Router {
        let mut router = Router::new().route("/", get(guarded_handler));
        if config.backend.failure_path != "/" {
            router = router.route(&config.backend.failure_path, get(guarded_handler));
        }

        router
            .route("/admin/status", get(status_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            strategy = self.config.strategy.as_str(),
            "HTTP server starting"
        );

        let background = self.facade.spawn_background(&shutdown);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut shutdown_rx = shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        for task in background {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed during shutdown");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn facade(&self) -> &Arc<AdmissionFacade> {
        &self.facade
    }
}

/// Demo route handler. Runs the request through the admission facade.
async fn guarded_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let request_id = request_id(request.headers());
    let backend_request = BackendRequest::new(
        request.method().clone(),
        request.uri().path(),
        addr.ip().to_string(),
    )
    .with_request_id(request_id.clone());

    let (verdict, quota) = state.facade.admit(backend_request).await;

    tracing::debug!(
        request_id = %request_id,
        client = %addr.ip(),
        verdict = verdict.label(),
        "Request decided"
    );

    verdict_response(verdict, quota)
}

/// Read-only view of the active strategy.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.facade.snapshot())
}
