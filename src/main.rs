use std::path::Path;
use std::sync::Arc;

mod cache;
mod chart;
mod config;
mod error;
mod handler;
mod http;
mod logger;
mod server;
mod store;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg.logging).map_err(|e| format!("Failed to initialize logging: {e}"))?;

    // The dataset is read-only; refuse to start without it
    if !Path::new(&cfg.data.database).is_file() {
        logger::log_error(&format!("Database not found: {}", cfg.data.database));
        return Err(format!("Database not found: {}", cfg.data.database).into());
    }

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let state = Arc::new(config::AppState::open(&cfg)?);
    tokio::fs::create_dir_all(cfg.chart_dir()).await?;

    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, &cfg);

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            state,
            server::signal::shutdown_signal(),
        ))
        .await;
    Ok(())
}
