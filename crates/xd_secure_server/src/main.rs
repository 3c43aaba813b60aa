use pingora::server::Server;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};
use xd_secure::Config;
use xd_secure::stats::{CounterStore, SystemClock};

fn main() {
    // INFO by default, RUST_LOG overrides
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_span_events(FmtSpan::CLOSE)
        .init();

    if let Err(e) = run() {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = Arc::new(CounterStore::open(&config.data_file, Arc::new(SystemClock))?);
    let app = xd_secure::build_app(&config, store);

    let mut server = Server::new(None)?;
    server.bootstrap();

    let addr = config.listen_addr();
    let mut service = app.to_service("xd-secure http");
    service.add_tcp(&addr);
    server.add_service(service);

    tracing::info!(
        addr = %addr,
        data_file = %config.data_file.display(),
        frontend_dir = %config.frontend_dir.display(),
        "listening"
    );
    server.run_forever()
}
