#![warn(clippy::all)]

use clap::{crate_version, Parser, Subcommand};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use hostsplit::monitor::ConfigMonitor;
use hostsplit::replay::ReplayChannel;
use libhostsplit::{AppConfig, Engine, Error, ProtocolSettings, RuleHandle};

/// Host header splitting tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        value_name = "CONFIG",
        default_value = "hostsplit.toml",
        global = true
    )]
    config: String,

    /// Be verbose
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the log to this directory instead of stderr
    #[arg(long, value_name = "DIR", global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a capture file through the splitting engine
    Replay {
        /// Input pcap or pcap-ng file
        #[arg(short, long, value_name = "FILE")]
        input: String,

        /// Output pcap file
        #[arg(short, long, value_name = "FILE")]
        output: String,

        /// Reload the configuration while running
        #[arg(long)]
        watch_config: bool,

        /// Configuration poll interval in seconds
        #[arg(long, value_name = "SECS", default_value_t = 2)]
        poll_interval: u64,
    },
    /// Validate the configuration and print the effective rules
    Check,
    /// Write a default configuration file
    Init,
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let env_filter = EnvFilter::try_from_env("HOSTSPLIT_LOG")
        .unwrap_or_else(|_| EnvFilter::from_default_env().add_directive(default_level.into()));
    match cli.log_dir.as_deref() {
        Some(dir) => {
            let file_appender = RollingFileAppender::new(Rotation::NEVER, dir, "hostsplit.log");
            tracing_subscriber::fmt()
                .with_writer(file_appender)
                .with_env_filter(env_filter)
                .with_ansi(false)
                .compact()
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_env_filter(env_filter)
                .with_ansi(false)
                .compact()
                .init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);
    info!("hostsplit {}", crate_version!());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let config_path = PathBuf::from(&cli.config);
    match cli.command {
        Command::Replay {
            input,
            output,
            watch_config,
            poll_interval,
        } => replay_cmd(
            &config_path,
            &input,
            &output,
            watch_config,
            Duration::from_secs(poll_interval),
        ),
        Command::Check => check_cmd(&config_path),
        Command::Init => init_cmd(&config_path),
    }
}

fn replay_cmd(
    config_path: &Path,
    input: &str,
    output: &str,
    watch_config: bool,
    poll_interval: Duration,
) -> Result<(), Error> {
    let config = AppConfig::load_or_create(config_path)?;
    let rules = RuleHandle::default();
    rules.install(config.rule_set());
    info!(
        "loaded {} rules from {}",
        rules.current().len(),
        config_path.display()
    );

    let input_file = File::open(input).map_err(|e| {
        error!("could not open input file '{input}'");
        e
    })?;
    let output_file = File::create(output).map_err(|e| {
        error!("could not create output file '{output}'");
        e
    })?;
    let channel = ReplayChannel::new(input_file, output_file)?;
    let mut engine = Engine::new(channel, rules.clone());

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .expect("failed to set the signal handler");

    let monitor = watch_config
        .then(|| ConfigMonitor::spawn(config_path.to_path_buf(), rules.clone(), poll_interval));

    let result = engine.run(running);
    if let Some(monitor) = monitor {
        monitor.stop();
    }
    result
}

fn check_cmd(config_path: &Path) -> Result<(), Error> {
    let config = AppConfig::load(config_path)?;
    let rules = config.rule_set();
    println!("{}: {} rules", config_path.display(), rules.len());
    for rule in rules.iter() {
        println!("  {} ({})", rule.domain(), rule.patterns().join(", "));
        println!("    https: {}", describe(rule.https));
        println!("    http:  {}", describe(rule.http));
    }
    Ok(())
}

fn describe(settings: ProtocolSettings) -> String {
    if !settings.enabled {
        return "disabled".to_owned();
    }
    let mut out = format!("split at {}", settings.offset);
    if settings.out_of_order {
        out.push_str(", out of order");
    }
    out
}

fn init_cmd(config_path: &Path) -> Result<(), Error> {
    if config_path.exists() {
        return Err(Error::Config(format!(
            "{} already exists, not overwriting",
            config_path.display()
        )));
    }
    AppConfig::default().save(config_path)?;
    println!("wrote {}", config_path.display());
    Ok(())
}
