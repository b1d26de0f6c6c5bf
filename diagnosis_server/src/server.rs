use crate::{
    advisory::AdvisoryTable,
    config::Config,
    routes::api_routes,
    telemetry::Metrics,
    upload::{SavedUpload, UploadError, UploadStore, UPLOAD_URL_PREFIX},
};
use axum::{extract::DefaultBodyLimit, extract::Multipart, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use plant_diagnosis::{Diagnose, PredictionResult};
use std::{sync::Arc, time::Instant};
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct SharedState {
    pub diagnoser: Arc<dyn Diagnose>,
    pub advisories: Arc<AdvisoryTable>,
    pub uploads: UploadStore,
    pub metrics: Arc<Metrics>,
}

pub struct Diagnosis {
    pub upload: SavedUpload,
    pub result: PredictionResult,
}

impl SharedState {
    /// Stores the upload and runs the pipeline on the blocking pool.
    pub async fn diagnose_upload(
        &self,
        multipart: Multipart,
        route: &str,
    ) -> Result<Diagnosis, UploadError> {
        self.metrics.record_request(route);
        let upload = self.uploads.save(multipart).await?;

        let diagnoser = self.diagnoser.clone();
        let path = upload.path.clone();
        let started = Instant::now();
        let result = match tokio::task::spawn_blocking(move || diagnoser.run(&path)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Diagnosis task failed: {}", e);
                PredictionResult::server_error()
            }
        };

        self.metrics
            .record_prediction_duration(started.elapsed().as_millis() as u64, route);
        self.metrics.record_outcome(result.outcome, route);

        Ok(Diagnosis { upload, result })
    }
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(diagnoser: Arc<dyn Diagnose>, config: &Config) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let uploads = UploadStore::new(&config.upload);
        uploads.ensure_dir().await?;

        let metrics = Arc::new(Metrics::new()?);
        let metrics_layer = HttpMetricsLayerBuilder::new().build();

        let app_state = SharedState {
            diagnoser,
            advisories: Arc::new(AdvisoryTable::load()?),
            uploads: uploads.clone(),
            metrics,
        };

        let router = Router::new()
            .merge(api_routes())
            .nest_service(UPLOAD_URL_PREFIX, ServeDir::new(uploads.dir()))
            .with_state(app_state)
            .layer(DefaultBodyLimit::max(
                uploads.max_bytes() + MULTIPART_OVERHEAD_BYTES,
            ))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .layer(metrics_layer);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        mut shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok(())
        });

        Ok(server_handle)
    }
}
