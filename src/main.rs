//! Main entry point for tubemap CLI

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tubemap::cli::{Args, OutputFormatter, VerbosityLevel};
use tubemap::{Resolver, TubemapError};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbosity_level());

    let formatter = OutputFormatter::new(args.verbosity_level());
    if let Err(e) = run(&args, &formatter).await {
        formatter.error(&format!("{:#}", e));
        if let Some(err) = e.downcast_ref::<TubemapError>() {
            if err.is_upstream_change() {
                formatter.warning("the page or player script layout may have changed");
            }
        }
        std::process::exit(1);
    }
}

async fn run(args: &Args, formatter: &OutputFormatter) -> anyhow::Result<()> {
    debug!("Starting tubemap with args: {:?}", args);

    let resolver = Resolver::with_options(args.resolver_options())?;
    let info = resolver
        .resolve_url(&args.url)
        .await
        .with_context(|| format!("failed to resolve {}", args.url))?;
    info!("{} streams available", info.streams.len());

    // Print URL only mode
    if args.print_url {
        let stream = if args.has_filters() {
            info.get(&args.query())?
        } else {
            info.best()
        };
        let stream = stream.context("no stream matches the given filters")?;
        println!("{}", stream.url);
        return Ok(());
    }

    if args.json {
        let selection = info.select(&args.query())?;
        println!("{}", serde_json::to_string_pretty(&selection)?);
        return Ok(());
    }

    let streams = info.filter(&args.query());

    if streams.is_empty() {
        formatter.warning("no stream matches the given filters");
    }
    formatter.print_video(&info, &streams);
    if let Some(best) = streams.first() {
        formatter.info(&format!("suggested filename: {}", info.filename(best.extension())));
    }

    Ok(())
}

/// Initialize logging system
fn init_logging(verbosity: VerbosityLevel) {
    // RUST_LOG wins over the verbosity flags
    let default_level = match verbosity {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "info",
        VerbosityLevel::Verbose => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}
