use std::path::Path;
use std::sync::Arc;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onbase::api::{AppState, ResourceLinks};
use onbase::config::{Overrides, ServiceConfig, Settings};
use onbase::sql::PgConnectionProvider;
use onbase::{OnBase, create_router};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Args {
    #[arrrg(optional, "Path to a YAML configuration file")]
    config: Option<String>,
    #[arrrg(optional, "PostgreSQL connection URL")]
    database_url: Option<String>,
    #[arrrg(optional, "Host to bind the HTTP server")]
    host: Option<String>,
    #[arrrg(optional, "Port to bind the HTTP server")]
    port: Option<u16>,
    #[arrrg(optional, "Public base URL used in self links")]
    base_url: Option<String>,
    #[arrrg(optional, "Maximum pooled database connections")]
    max_connections: Option<u32>,
    #[arrrg(flag, "Enable verbose logging")]
    verbose: bool,
}

const HELP_TEXT: &str = r#"onbased - OnBase records daemon

USAGE:
    onbased [OPTIONS]

OPTIONS:
    --config <PATH>            YAML configuration file
    --database-url <URL>       PostgreSQL URL [default: $DATABASE_URL]
    --host <HOST>              Host to bind the HTTP server [default: 127.0.0.1]
    --port <PORT>              Port to bind the HTTP server [default: 8080]
    --base-url <URL>           Base URL for self links [default: http://HOST:PORT/api/v1]
    --max-connections <N>      Maximum pooled database connections [default: 10]
    --verbose                  Enable debug logging

DESCRIPTION:
    Serves OnBase admission, financial aid, hold and document resources
    under /api/v1/. Flags take precedence over the configuration file.

    The server supports graceful shutdown via Ctrl+C.

API ENDPOINTS:
    GET    /api/v1/onbase/admissions/{osuId}      ?applicationNumber=
    PATCH  /api/v1/onbase/admissions/{osuId}
    GET    /api/v1/onbase/financial-aid/{osuId}   ?financialAidYear=
    PATCH  /api/v1/onbase/financial-aid/{osuId}
    GET    /api/v1/onbase/holds/{osuId}           ?codes=
    POST   /api/v1/onbase/documents"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, free) = Args::from_command_line("USAGE: onbased [OPTIONS]");

    if !free.is_empty() && free[0] == "help" {
        println!("{}", HELP_TEXT);
        return Ok(());
    }

    let default_filter = if args.verbose {
        "onbase=debug,tower_http=debug"
    } else {
        "onbase=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &args.config {
        Some(path) => ServiceConfig::load(Path::new(path))?,
        None => ServiceConfig::default(),
    };
    let overrides = Overrides {
        database_url: args.database_url,
        host: args.host,
        port: args.port,
        base_url: args.base_url,
        max_connections: args.max_connections,
    };
    let settings = Settings::resolve(overrides, &config, std::env::var("DATABASE_URL").ok())?;

    tracing::info!(
        bind = %settings.bind_address(),
        base_url = %settings.base_url,
        max_connections = settings.max_connections,
        "starting onbased"
    );

    let provider =
        PgConnectionProvider::connect(&settings.database_url, settings.max_connections).await?;
    let onbase = OnBase::new(Arc::new(provider))
        .with_formats(config.line_formats()?)
        .with_reader(config.line_reader()?);
    let state = AppState::new(onbase, ResourceLinks::new(&settings.base_url));
    let app = create_router(state);

    let addr = settings.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("onbased stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
