use anyhow::Context;
use ci_status_resolver::application::use_cases::cached_resolve_ci_status::CachedResolveCiStatusInteractor;
use ci_status_resolver::application::use_cases::resolve_ci_status::{
    CREDENTIAL_NAME, ResolveCiStatusInteractor, ResolveCiStatusUseCase,
};
use ci_status_resolver::application::use_cases::stream_ci_status::StreamCiStatusInteractor;
use ci_status_resolver::config::AppConfig;
use ci_status_resolver::domain::external_apis::github::GitHubApi;
use ci_status_resolver::infrastructures::adapters::primary::web::{AppState, create_router};
use ci_status_resolver::infrastructures::adapters::secondary::cache::InMemoryStatusCache;
use ci_status_resolver::infrastructures::adapters::secondary::external_apis::github::GitHubApiAdapter;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::env;
use std::sync::Arc;
use tracing::{info, info_span, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the fmt subscriber, plus OTLP export when a collector endpoint is configured.
fn init_tracing() -> anyhow::Result<Option<SdkTracerProvider>> {
    let provider = if env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .build()
            .context("Failed to create OTLP exporter")?;
        Some(
            SdkTracerProvider::builder()
                .with_batch_exporter(otlp_exporter)
                .build(),
        )
    } else {
        None
    };
    let telemetry = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer("ci-status-resolver"))
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(telemetry)
        .with(fmt_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Ok(provider)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let tracer_provider = init_tracing()?;

    let (app, listen_addr) = {
        let initialize_span = info_span!("initialize");
        let _enter = initialize_span.enter();
        info!("Application starting");

        let config = AppConfig::from_env().context("Failed to load configuration")?;

        // Build dependencies
        let github_api_adapter = Arc::new(GitHubApiAdapter::new(
            config.github_api_url.clone(),
            config.github_token.clone(),
            config.request_timeout,
        )?);
        if !github_api_adapter.has_credentials() {
            warn!("{} is not set; every repository will report unknown", CREDENTIAL_NAME);
        }

        let resolver: Arc<dyn ResolveCiStatusUseCase> = Arc::new(
            ResolveCiStatusInteractor::new(github_api_adapter)
                .with_request_timeout(config.request_timeout)
                .with_max_concurrency(config.max_concurrency),
        );
        let resolver: Arc<dyn ResolveCiStatusUseCase> = if config.cache_ttl.is_zero() {
            info!("Status cache disabled");
            resolver
        } else {
            info!("Caching statuses for {:?}", config.cache_ttl);
            Arc::new(CachedResolveCiStatusInteractor::new(
                resolver,
                Arc::new(InMemoryStatusCache::new(config.cache_ttl)),
            ))
        };
        let stream_use_case = Arc::new(StreamCiStatusInteractor::new(resolver.clone()));
        let app_state = Arc::new(AppState {
            resolve_use_case: resolver,
            stream_use_case,
        });

        (create_router(app_state), config.listen_addr)
    };

    info!("Listening on {}", listen_addr);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            warn!("Failed to flush traces: {}", e);
        }
    }

    Ok(())
}
