use magnate::config::Config;
use magnate::services::{
    EconomyEngine, EventEngine, LiquidationEngine, Notifier, PositionLedger, PriceCache,
    Scheduler, SqliteStore,
};
use magnate::sources::CoinGeckoClient;
use magnate::AppState;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "magnate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Starting Magnate server on {}:{}", config.host, config.port);

    // Open the ledger database
    let store = Arc::new(SqliteStore::new(&config.db_path)?);
    info!("Database ready at {}", config.db_path);

    // Price cache, seeded with fallback quotes until the first refresh
    let price_cache = Arc::new(PriceCache::new());

    // Quote source
    let quotes = Arc::new(CoinGeckoClient::new(&config, price_cache.clone()));
    quotes.refresh().await;

    // Telegram notifier, or a drain when no token is configured
    let notifier = match config.telegram_token.clone() {
        Some(token) => Notifier::telegram(token, config.telegram_api_url.clone()),
        None => {
            warn!("BOT_TOKEN not set, notifications disabled");
            Notifier::disabled()
        }
    };

    // Trading and economy engines
    let ledger = Arc::new(PositionLedger::new(store.clone(), config.trade_fee_rate));
    let liquidation = Arc::new(LiquidationEngine::new(
        store.clone(),
        ledger.clone(),
        price_cache.clone(),
        notifier.clone(),
    ));
    let economy = Arc::new(EconomyEngine::new(
        store.clone(),
        notifier.clone(),
        config.economy.clone(),
        config.unlock_volume_threshold,
    ));
    let events = Arc::new(EventEngine::new(
        store.clone(),
        notifier.clone(),
        config.economy.market_event_chance,
    ));

    // Background loops
    let scheduler = Arc::new(Scheduler::new(
        config.clone(),
        store.clone(),
        quotes.clone(),
        liquidation,
        economy,
        events,
    ));
    scheduler.start();

    // Create application state
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        price_cache,
        ledger,
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = magnate::api::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Magnate server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
