use std::fs::File;
use std::sync::Mutex;

use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use futsal_reservations::config::Config;
use futsal_reservations::store::{MemoryStore, PgStore};
use futsal_reservations::web;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing()?;

    let config = Config::from_env()?.with_port_arg(std::env::args().nth(1));
    info!("Access the site at http://localhost:{}", config.port);

    match config.database_url.clone() {
        Some(url) => {
            let store = PgStore::connect(&url).await?;
            store.migrate().await?;
            info!("Successfully connected to the database");
            web::start_server(config, store).await?;
        }
        None => {
            warn!("DATABASE_URL not set, bookings are kept in memory and lost on restart");
            web::start_server(config, MemoryStore::new()).await?;
        }
    }
    Ok(())
}

/// Pretty, `RUST_LOG`-filtered output in debug builds; errors only, written
/// to `server.log`, in release builds. Request logs from actix's `Logger`
/// arrive through the `log` bridge.
fn setup_tracing() -> Result<(), Box<dyn std::error::Error>> {
    if cfg!(debug_assertions) {
        let filter = EnvFilter::from_default_env()
            .add_directive("futsal_reservations=info".parse()?)
            .add_directive("actix_web=info".parse()?);

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::NONE)
            .pretty()
            .init();
        return Ok(());
    }

    let log_file = File::create("server.log")?;
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::NONE)
        .with_max_level(LevelFilter::ERROR)
        .with_writer(Mutex::new(log_file))
        .init();
    Ok(())
}
