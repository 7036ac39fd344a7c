use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{AppointmentState, AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
use schedule_cell::{InMemoryTemplateStore, ScheduleState, SupabaseTemplateStore, TemplateStore};
use shared_config::{AppConfig, StorageBackend};

fn select_stores(config: &AppConfig) -> (Arc<dyn TemplateStore>, Arc<dyn AppointmentStore>) {
    match config.storage_backend {
        StorageBackend::Supabase if config.is_supabase_configured() => {
            info!("Using Supabase storage at {}", config.supabase_url);
            (
                Arc::new(SupabaseTemplateStore::new(config)),
                Arc::new(SupabaseAppointmentStore::new(config)),
            )
        }
        backend => {
            if backend == StorageBackend::Supabase {
                warn!("Supabase storage requested but SUPABASE_URL or SUPABASE_ANON_PUBLIC_KEY is missing; using in-memory storage");
            } else {
                info!("Using in-memory storage");
            }
            (
                Arc::new(InMemoryTemplateStore::new()),
                Arc::new(InMemoryAppointmentStore::new()),
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    let config = Arc::new(AppConfig::from_env());
    if !config.is_configured() {
        warn!("SUPABASE_JWT_SECRET is not set; every authenticated request will be rejected");
    }

    let (template_store, appointment_store) = select_stores(&config);

    let schedule_state = ScheduleState::new(config.clone(), template_store);
    let appointment_state = AppointmentState::new(
        config.clone(),
        schedule_state.templates.clone(),
        appointment_store,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(Arc::new(schedule_state), Arc::new(appointment_state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
