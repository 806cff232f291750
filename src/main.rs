//! Takeout Orders - order lifecycle service for a food-delivery shop

use anyhow::{Context, Result};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use takeout_orders::cart::CartService;
use takeout_orders::config::Config;
use takeout_orders::engine::{EngineConfig, OrderEngine};
use takeout_orders::events::{EventPublisher, LogPublisher, NatsPublisher};
use takeout_orders::geo::{BaiduMapClient, GeoValidator};
use takeout_orders::payment::{PaymentGateway, SimulatedGateway};
use takeout_orders::reporting::ReportService;
use takeout_orders::routes::{router, AppState};
use takeout_orders::store::PgStore;
use takeout_orders::tasks::Sweeper;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(PgStore::connect(&config.database_url).await.context("connecting to database")?);
    sqlx::migrate!("./migrations").run(store.pool()).await?;

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, order events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };
    let payments: Arc<dyn PaymentGateway> = Arc::new(SimulatedGateway);
    let map = BaiduMapClient::new(&config.map.base_url, &config.map.api_key, config.map.timeout)?;

    let cart = CartService::new(store.clone(), store.clone(), store.clone());
    let engine = Arc::new(OrderEngine::new(
        store.clone(),
        store.clone(),
        cart.clone(),
        GeoValidator::new(Arc::new(map), config.delivery_radius_m),
        payments.clone(),
        events,
        EngineConfig { shop_address: config.shop_address.clone(), delivery_fee: config.delivery_fee },
    ));
    let reports = ReportService::new(store.clone(), store.clone());

    tokio::spawn(Sweeper::new(engine.clone(), store.clone(), payments, config.sweep).run());

    let app = router(AppState { engine, cart, reports })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()));

    let addr = config.socket_addr();
    tracing::info!("Takeout orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
