use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tower::limit::ConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use queued_daemon::config::DaemonConfig;
use queued_daemon::db::connection::create_pool;
use queued_daemon::handlers;
use queued_daemon::services::core::Core;
use queued_daemon::services::settings::SettingKey;
use queued_daemon::state::AppState;
use queued_daemon::utils::system::HostResources;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "queued_daemon=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(Into::into)
        .unwrap_or_else(DaemonConfig::default_path);
    let config = DaemonConfig::load(&config_path)?;
    tracing::info!(
        config = %config_path.display(),
        database = %config.database.path,
        admin = %config.administrator.username,
        "loaded configuration"
    );

    let pool = create_pool(&config.database_url()?).await?;
    let host = HostResources::detect();
    tracing::info!(cpu = host.cpu, memory = host.memory, "detected host resources");

    let core = Core::init(&config, pool, host).await?;

    let address: IpAddr = {
        let raw = core.settings.get_known(SettingKey::ServerAddress);
        if raw.is_empty() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            raw.parse()?
        }
    };
    let port = core.settings.get_known_i64(SettingKey::ServerPort) as u16;
    let addr = SocketAddr::from((address, port));
    let max_connections = core
        .settings
        .get_known_i64(SettingKey::ServerMaxConnections)
        .max(1) as usize;
    let timeout = core.settings.get_known_i64(SettingKey::ServerTimeout);

    let mut app = handlers::router(AppState::new(core)).layer(TraceLayer::new_for_http());
    app = app.layer(ConcurrencyLimitLayer::new(max_connections));
    if timeout > 0 {
        app = app.layer(TimeoutLayer::new(Duration::from_millis(timeout as u64)));
    }

    tracing::info!("server listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
