//! herakles-process-watch - version 0.1.0
//!
//! Live process lifecycle monitor with tracing logging.
//! This is the main entry point that starts the monitor and handles subcommands.

use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};

use herakles_process_watch::cli::{Args, Commands, LogLevel, OutputFormat};
use herakles_process_watch::commands::{command_classify, command_config, command_sample};
use herakles_process_watch::config::{
    resolve_config, show_config, validate_effective_config, Config,
};
use herakles_process_watch::{
    build_classifier, startup_checks, ChangeEvent, Classifier, DisabledClassifier, EventSink,
    Monitor, MonitorSettings, ProcSampler,
};

/// Initializes tracing logging subsystem with configured log level.
///
/// Logs go to stderr; stdout carries events only.
fn setup_logging(config: &Config) {
    let level = config.log_level();
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Falls back to the disabled classifier when the configured one cannot be built.
fn select_classifier(config: &Config) -> Arc<dyn Classifier> {
    match build_classifier(&config.classifier) {
        Ok(classifier) => {
            info!("Classifier backend: {}", classifier.name());
            classifier
        }
        Err(e) => {
            error!("❌ Cannot build classifier: {}", e);
            warn!("   New processes will be reported as 'AI analysis unavailable'");
            Arc::new(DisabledClassifier)
        }
    }
}

fn print_event(event: &ChangeEvent, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", event),
        OutputFormat::Json => match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        },
    }
}

/// Resolves once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        if let Commands::Config { output, format } = command {
            return command_config(output.clone(), *format);
        }

        let config = load_validated_config(&args)?;
        setup_logging(&config);

        return match command {
            Commands::Sample { limit, verbose } => {
                Ok(command_sample(*limit, *verbose, &config).await?)
            }
            Commands::Classify { pid } => Ok(command_classify(*pid, &config).await?),
            Commands::CheckRequirements => {
                println!("🔍 Checking Runtime Requirements");
                println!("================================\n");

                match startup_checks::validate_requirements(&config) {
                    Ok(_) => {
                        println!("\n✅ All requirements met - ready to monitor!");
                        Ok(())
                    }
                    Err(e) => {
                        eprintln!("\n❌ Requirements check failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    // Load configuration for monitor mode
    let config = load_validated_config(&args)?;
    setup_logging(&config);

    info!("Starting herakles-process-watch");

    if let Err(e) = startup_checks::validate_requirements(&config) {
        error!("❌ Startup validation failed: {}", e);
        error!("   The monitor will start but may not see every process!");
    }

    let classifier = select_classifier(&config);
    let sampler = Arc::new(ProcSampler::new(
        config.proc_root(),
        config.sample_concurrency(),
    ));
    let (sink, mut events) = EventSink::channel(config.event_buffer());
    let monitor = Monitor::new(
        sampler,
        classifier,
        sink,
        MonitorSettings::from_config(&config),
    );
    let handle = monitor.start();

    info!(
        "Watching {} every {} ms",
        config.proc_root().display(),
        config.poll_interval().as_millis()
    );

    let format = args.format;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            maybe_event = events.recv() => match maybe_event {
                Some(event) => print_event(&event, format),
                None => {
                    warn!("Event channel closed, monitor exited");
                    break;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    // Keep reading while the monitor winds down so a full channel cannot
    // block its last emits.
    handle.cancel();
    let stopped = handle.stopped();
    tokio::pin!(stopped);
    let report = loop {
        tokio::select! {
            report = &mut stopped => break report,
            Some(event) = events.recv() => print_event(&event, format),
        }
    };
    drain_remaining(&mut events, format);

    info!(
        cycles = report.stats.cycles,
        started = report.stats.started,
        stopped = report.stats.stopped,
        status_changes = report.stats.status_changes,
        suspicious = report.stats.suspicious,
        sampling_failures = report.stats.sampling_failures,
        abandoned_enrichments = report.abandoned_enrichments,
        "herakles-process-watch stopped gracefully"
    );
    Ok(())
}

/// Prints events that were queued before the monitor stopped.
fn drain_remaining(events: &mut mpsc::Receiver<ChangeEvent>, format: OutputFormat) {
    while let Ok(event) = events.try_recv() {
        print_event(&event, format);
    }
}
