use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::{error, info};
use std::process;
use std::sync::Arc;
use subprobe::config;
use subprobe::output::OutputManager;
use subprobe::types::{Config, OutputFormat};
use subprobe::{web, Args, EventSink, ScanEngine};

const BANNER: &str = r#"
           _                      _
 ___ _   _| |__  _ __  _ __ ___ | |__   ___
/ __| | | | '_ \| '_ \| '__/ _ \| '_ \ / _ \
\__ \ |_| | |_) | |_) | | | (_) | |_) |  __/
|___/\__,_|_.__/| .__/|_|  \___/|_.__/ \___|
                |_|
      wordlist + dnsdumpster subdomain prober
"#;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else if args.silent {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(message) = args.validate() {
        Args::command()
            .error(clap::error::ErrorKind::ValueValidation, message)
            .exit();
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if !args.silent && atty::is(atty::Stream::Stdout) {
        println!("{}      {} v{}\n", BANNER, subprobe::NAME, subprobe::VERSION);
    }

    let engine = match ScanEngine::new(config.clone()) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if let Some(port) = args.ui {
        info!("Subdomains dictionary file: {}", args.wordlist.display());
        web::serve(engine, args.wordlist.clone(), port).await?;
        return Ok(());
    }

    let settings = args.scan_settings();
    if let Err(e) = settings.validate() {
        error!("{}", e);
        process::exit(1);
    }

    info!("Find subdomains for site: {}", settings.domain);
    info!("Subdomains dictionary file: {}", settings.wordlist.display());
    info!("Threads: {}", settings.workers);

    let (sink, events) = EventSink::direct(None);
    let output = OutputManager::new(config.output.clone());
    let printer = tokio::spawn(async move { output.consume(events).await });

    let result = engine.run(&settings, sink).await;
    let printed = printer.await?;

    match result {
        Ok(stats) => {
            if let Err(e) = printed {
                error!("{}", e);
                process::exit(1);
            }
            if !args.silent {
                info!(
                    "Scan completed: {} live subdomains from {} candidates in {:.2}s",
                    stats.records_emitted,
                    stats.candidates_queued + stats.cnames_requeued,
                    stats.duration.as_secs_f64()
                );
            }
            Ok(())
        }
        Err(e) => {
            error!("Scan failed: {}", e);
            process::exit(1);
        }
    }
}

fn load_config(args: &Args) -> Result<Config, subprobe::SubprobeError> {
    let mut config = match args.config_path.as_deref() {
        Some(path) => config::load_config(path)?,
        None => config::default_config()?,
    };

    // Override config with command line arguments
    if let Some(output_file) = args.output_file.clone() {
        config.output.file = Some(output_file);
    }
    if args.json {
        config.output.format = OutputFormat::Json;
    }
    if args.csv {
        config.output.format = OutputFormat::Csv;
    }
    if args.no_aggregator {
        config.aggregator.enabled = false;
    }

    Ok(config)
}
