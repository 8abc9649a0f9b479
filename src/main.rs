use std::time::Duration;
use tokio::net::TcpListener;

use slidecast::config::Config;
use slidecast::state::AppState;

/// How often idle bus channels are swept.
const REAP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slidecast=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let db = slidecast::db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    let state = AppState::new(db, &config);

    // Sweep bus channels nobody is using any more
    let reaper_bus = state.bus.clone();
    let idle = config.bus_idle;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAP_INTERVAL);
        loop {
            interval.tick().await;
            let reaped = reaper_bus.reap_idle(idle);
            if reaped > 0 {
                tracing::info!(
                    "reaped {reaped} idle session channel(s), {} active",
                    reaper_bus.session_count()
                );
            }
        }
    });

    let app = slidecast::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app).await.expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36mslidecast\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mdatabase\x1b[0m     {}", config.database_url);
    eprintln!("  \x1b[2mbuffer\x1b[0m       {} per spectator", config.spectator_buffer);
    eprintln!("  \x1b[2mbus idle\x1b[0m     {}s", config.bus_idle.as_secs());
    eprintln!();
}
