use clap::Parser;
use std::sync::Arc;
use stratus_core::restic::Restic;
use stratus_daemon::{metrics::Metrics, runner::Runner, scheduler::Scheduler, web};

mod cli;

fn setup_logger(debug: bool) -> eyre::Result<()> {
    use tracing::Level;
    use tracing_subscriber::{
        filter::LevelFilter,
        fmt::{layer, time::LocalTime},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        Registry,
    };

    let level = if debug { Level::DEBUG } else { Level::INFO };
    let time_format = time::macros::format_description!(
        "[year]-[month]-[day] [hour repr:24]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
    );

    Registry::default()
        .with(LevelFilter::from(level))
        .with(
            layer()
                .with_target(false)
                .with_timer(LocalTime::new(time_format)),
        )
        .try_init()?;

    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = cli::Cli::parse();
    setup_logger(args.debug)?;

    for path in std::iter::once(args.prometheus_endpoint.as_str()).chain(args.trigger_path()) {
        eyre::ensure!(path.starts_with('/'), "endpoint '{}' must start with '/'", path);
    }
    if let Some(trigger_path) = args.trigger_path() {
        if args.http_address().is_some() {
            eyre::ensure!(
                trigger_path != args.prometheus_endpoint,
                "metrics and trigger endpoints must differ, both are '{}'",
                trigger_path
            );
        }
    }

    let job = args.backup_job();
    let restic = Arc::new(Restic::new(&args.restic_binary));

    tracing::info!("stratus: {}", stratus_core::VERSION);
    match restic.version_string().await {
        Ok(restic_version) => tracing::info!("restic: {}", restic_version),
        Err(e) => tracing::warn!("failed to query restic version: {}", e),
    }

    restic.ensure_repository(&job).await?;

    let metrics = Arc::new(Metrics::new()?);
    let runner = Arc::new(Runner::new(job, restic, metrics));

    if let Some(address) = args.http_address() {
        let router = web::router(
            web::AppState {
                runner: runner.clone(),
            },
            &args.prometheus_endpoint,
            args.trigger_path(),
        );
        let listener = web::bind(address).await?;
        tokio::spawn(async move {
            if let Err(error) = web::serve(listener, router).await {
                tracing::error!(%error, "HTTP server failed");
            }
        });
    }

    if args.run_on_boot {
        runner.run().await;
    }

    tracing::info!("running forever...");
    let scheduler = Scheduler::new(args.schedule, runner);
    tokio::select! {
        result = scheduler.run() => result?,
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
