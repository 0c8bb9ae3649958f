use anyhow::{bail, Context};
use clap::Parser;
use kinesis_shipper::observer::CountingObserver;
use kinesis_shipper::{Config, Dispatcher, Event};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "kinesis-shipper")]
#[command(about = "Ship newline-delimited JSON events to a Kinesis data stream", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, value_name = "FILE", help = "NDJSON input (defaults to stdin)")]
    input: Option<PathBuf>,

    #[arg(short, long, help = "Treat every event as delivery-guaranteed")]
    guaranteed: bool,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting kinesis-shipper");
    info!("Loading configuration from {:?}", args.config);

    let config = match Config::from_file(&args.config) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        region = %config.stream.region,
        stream_name = %config.stream.stream_name,
        batch_size = config.stream.batch_size,
        batch_size_bytes = config.stream.batch_size_bytes,
        partition_key = ?config.stream.partition_key,
        partition_key_provider = ?config.stream.partition_key_provider,
        "Configuration summary"
    );

    let events = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open input {:?}", path))?;
            read_events(BufReader::new(file), args.guaranteed).await?
        }
        None => read_events(BufReader::new(tokio::io::stdin()), args.guaranteed).await?,
    };
    info!("Read {} events", events.len());

    let observer = Arc::new(CountingObserver::new());
    let dispatcher = Dispatcher::from_config(&config)
        .await?
        .with_observer(observer.clone());

    let mut pending = events;
    let mut attempt = 0;
    loop {
        let dispatched = dispatcher.dispatch(pending).await;
        if let Some(e) = &dispatched.error {
            warn!("Dispatch reported an error: {}", e);
        }
        pending = dispatched.retriable;

        if pending.is_empty() || attempt >= config.stream.max_retries {
            break;
        }
        attempt += 1;
        info!(attempt, "Retrying {} events", pending.len());
    }

    let stats = observer.snapshot();
    info!(
        batches = stats.batches,
        acked = stats.acked,
        dropped = stats.dropped,
        failed = stats.failed,
        permanently_failed = stats.permanently_failed,
        "Shipping finished"
    );

    if !pending.is_empty() {
        bail!(
            "{} events still undelivered after {} retries",
            pending.len(),
            config.stream.max_retries
        );
    }

    Ok(())
}

async fn read_events<R>(reader: R, guaranteed: bool) -> anyhow::Result<Vec<Event>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut events = Vec::new();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value @ serde_json::Value::Object(_)) => {
                events.push(Event::new(value).with_guaranteed(guaranteed));
            }
            Ok(_) => warn!(line = line_number, "Skipping input line that is not a JSON object"),
            Err(e) => warn!(line = line_number, "Skipping invalid JSON: {}", e),
        }
    }

    Ok(events)
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("kinesis_shipper=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("kinesis_shipper=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
