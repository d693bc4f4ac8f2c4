//! pricecutter entry point: CLI wiring, config loading, and engine startup.

use std::error::Error;
use std::path::Path;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pricecutter::cli::{Cli, Commands};
use pricecutter::config::ControllerConfig;
use pricecutter::engine::{Engine, EngineSettings, LoggingSink, SystemClock};
use pricecutter::fetch::Fetcher;
use pricecutter::io::export::export_timeline_csv;

type AppResult = Result<(), Box<dyn Error>>;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

/// Loads the config file (or defaults), applies CLI overrides, and validates.
fn load_config(cli: &Cli) -> ControllerConfig {
    let mut config = match &cli.config {
        Some(path) => match ControllerConfig::from_toml_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        },
        None => ControllerConfig::default(),
    };

    cli.apply_overrides(&mut config);

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    config
}

fn build_engine(config: &ControllerConfig) -> Result<Engine, Box<dyn Error>> {
    Ok(Engine::new(
        EngineSettings::from_config(config),
        Arc::new(LoggingSink),
        Arc::new(SystemClock),
    )?)
}

async fn run(config: &ControllerConfig, serve: bool) -> AppResult {
    let engine = Arc::new(build_engine(config)?);
    engine.start(Fetcher::from_config(config)?)?;

    wait_for_exit(&engine, config, serve).await?;
    info!("shutting down");
    engine.shutdown();
    Ok(())
}

#[cfg(feature = "api")]
async fn wait_for_exit(engine: &Arc<Engine>, config: &ControllerConfig, serve: bool) -> AppResult {
    use std::net::SocketAddr;

    use pricecutter::api::{self, AppState};
    use tokio::sync::oneshot;

    if !serve {
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    let addr = SocketAddr::new(config.api.bind.parse()?, config.api.port);
    let state = Arc::new(AppState {
        engine: Arc::clone(engine),
    });
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(api::serve(state, addr, async move {
        let _ = stop_rx.await;
    }));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            let _ = stop_tx.send(());
            server.await??;
        }
        finished = &mut server => {
            finished??;
        }
    }
    Ok(())
}

#[cfg(not(feature = "api"))]
async fn wait_for_exit(_engine: &Arc<Engine>, _config: &ControllerConfig, serve: bool) -> AppResult {
    if serve {
        tracing::warn!("built without the `api` feature, --serve ignored");
    }
    tokio::signal::ctrl_c().await?;
    Ok(())
}

async fn once(config: &ControllerConfig, timeline_out: Option<&Path>) -> AppResult {
    let engine = build_engine(config)?;
    let fetcher = Fetcher::from_config(config)?;
    engine.run_fetch_cycle(&fetcher).await;

    let snapshot = engine.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if let Some(path) = timeline_out {
        let timeline = engine.price_timeline(engine.settings().resolution);
        export_timeline_csv(&timeline, path)?;
        eprintln!("Timeline written to {}", path.display());
    }

    engine.shutdown();
    if snapshot.revision.is_none() {
        return Err("no control payload could be fetched".into());
    }
    Ok(())
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });

    let result = runtime.block_on(async {
        match &cli.command {
            Commands::Run { serve, .. } => run(&config, *serve).await,
            Commands::Once { timeline_out } => once(&config, timeline_out.as_deref()).await,
        }
    });

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
