use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;
use snowtrip::{AppState, SnowtripConfig, telemetry, web};

/// Ski resort snow forecasts and traffic-aware drive times
#[derive(FromArgs, Debug)]
struct Args {
    /// path to the config file (default: platform config dir snowtrip/config.toml)
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// port to listen on, overrides server.port
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// log level (error, warn, info, debug, trace), overrides logging.level
    #[argh(option, short = 'l')]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let mut config = SnowtripConfig::load_from_path(args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
        config.validate()?;
    }

    let _telemetry = telemetry::init(&config.logging)?;
    tracing::info!("snowtrip {} starting", snowtrip::VERSION);

    let state = AppState::from_config(&config)?;
    web::run(&config.server, state).await
}
