use anyhow::Context;
use clap::Parser;
use mocks_server::config::{CliArgs, LogLevel, MocksConfig};
use mocks_server::MocksServer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the fmt subscriber. `RUST_LOG` wins over the `log` option.
fn init_tracing(level: LogLevel) -> Option<FilterHandle> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
        Err(_) => {
            let (filter, handle) = reload::Layer::new(EnvFilter::new(level.filter_directive()));
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            Some(handle)
        }
    }
}

fn load_config(args: &CliArgs) -> anyhow::Result<MocksConfig> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let path = args
        .config
        .clone()
        .or_else(|| MocksConfig::discover(&cwd));
    let mut config = match &path {
        Some(path) => MocksConfig::from_file(path)?,
        None => MocksConfig::default(),
    };
    args.apply(&mut config);
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = load_config(&args)?;
    let filter = init_tracing(config.log);

    let server = MocksServer::builder(config).build().await?;

    let _log_subscription = filter.map(|handle| {
        server.options().log.on_change(move |level| {
            if let Err(e) = handle.reload(EnvFilter::new(level.filter_directive())) {
                warn!("Failed to change log level: {}", e);
            }
        })
    });

    server.init().await;
    if let Err(e) = server.start().await {
        error!("{}", e);
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");
    server.stop().await;
    Ok(())
}
