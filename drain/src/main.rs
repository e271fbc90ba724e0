use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use drain::cli::Cli;
use drain::logging::init_logging;
use drain::{spawn_signal_listener, BatchWorker, IronMqClient, SimulatedWork, WorkerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.log_format) {
        eprintln!("failed to initialise logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!(
        task_id = cli.id.as_deref().unwrap_or("-"),
        config = ?cli.config,
        payload = ?cli.payload,
        "drain starting"
    );

    #[cfg(feature = "metrics")]
    drain::metrics::init_metrics()?;

    let config = WorkerConfig::load(cli.config.as_deref())?;
    tracing::info!("Config:\n{}", config.masked_json()?);

    let queue = IronMqClient::new(&config.env, &config.queue_name)
        .context("building queue client")?;
    let error_queue = config
        .error_queue_name
        .as_deref()
        .map(|name| queue.for_queue(name))
        .transpose()
        .context("building error queue client")?;
    let handler = SimulatedWork::new(config.msg_duration);

    let mut builder = BatchWorker::builder(config)
        .with_queue(Arc::new(queue))
        .with_handler(Arc::new(handler));
    if let Some(error_queue) = error_queue {
        builder = builder.with_error_queue(Arc::new(error_queue));
    }
    let worker = builder.build()?;

    let signals = spawn_signal_listener(worker.shutdown_token());
    let result = worker.run().await;
    signals.abort();

    let summary = result?;
    tracing::debug!(summary = ?summary, "run finished");

    #[cfg(feature = "metrics")]
    tracing::debug!("metrics:\n{}", drain::metrics::gather_metrics()?);

    Ok(())
}
