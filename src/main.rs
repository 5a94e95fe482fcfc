use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use syncsongs_lib::commands::{default_factory, run_diff, run_services, run_sync};
use syncsongs_lib::config::AppConfig;
use syncsongs_lib::error::exit_code;
use syncsongs_lib::logging::{LogConfig, SizeRotatingWriter};
use syncsongs_lib::ui::TerminalUi;
use syncsongs_lib::{resolve_data_dir, SyncError, SyncOptions};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "syncsongs",
    version,
    about = "Synchronize song collections between music services"
)]
struct Cli {
    /// List the songs added or missing per endpoint
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding config.json and the log files
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Timeout for a single backend operation, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Propagate songs between endpoints given as owner:service:type
    Sync {
        #[arg(required = true, value_name = "ENDPOINT")]
        endpoints: Vec<String>,

        /// One of '<', '=', '>' per endpoint pair, in pair order
        #[arg(long, value_name = "CHARS")]
        directions: Option<String>,

        /// Never prompt: add every match found
        #[arg(long)]
        batch: bool,

        /// Match similar songs too, not only identical ones (with --batch)
        #[arg(long)]
        wide_search: bool,
    },
    /// Show the songs each endpoint is missing, without writing anything
    Diff {
        #[arg(required = true, value_name = "ENDPOINT")]
        endpoints: Vec<String>,

        /// Match similar songs too, not only identical ones
        #[arg(long)]
        wide_search: bool,
    },
    /// List supported services, collection types and actions
    Services,
}

/// 初始化日志系统
fn init_logging(data_dir: &Path, verbose: bool) {
    let config = LogConfig::load(data_dir);

    // 控制台默认只显示警告，RUST_LOG 可以覆盖
    let console_default = if verbose { "info" } else { "warn" };
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_default));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file_layer = if config.enabled {
        match SizeRotatingWriter::new(data_dir, config.max_size_mb) {
            Ok(file_writer) => {
                let file_filter = EnvFilter::new(format!(
                    "{},hyper=warn,reqwest=warn",
                    config.tracing_level().as_str().to_lowercase()
                ));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file_writer)
                        .with_ansi(false)
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_thread_names(false)
                        .with_filter(file_filter),
                )
            }
            Err(e) => {
                eprintln!("warning: cannot open log file in {}: {}", data_dir.display(), e);
                None
            }
        }
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

fn prepare_data_dir(custom: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let data_dir = resolve_data_dir(custom);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("cannot create data directory {}", data_dir.display()))?;
    Ok(data_dir)
}

async fn run(cli: Cli, data_dir: &Path) -> Result<(), SyncError> {
    let mut config = AppConfig::load(data_dir)?;
    if let Some(secs) = cli.timeout {
        config.sync.timeout_secs = secs;
    }
    let timeout = config.sync.timeout();
    let factory = default_factory(config)?;

    let output = match cli.command {
        Command::Services => run_services(factory.as_ref()),
        Command::Sync {
            endpoints,
            directions,
            batch,
            wide_search,
        } => {
            let options = SyncOptions {
                timeout,
                directions,
                batch,
                wide_search,
            };
            let mut ui = TerminalUi::stdio();
            run_sync(factory, &endpoints, options, cli.verbose, &mut ui).await?
        }
        Command::Diff {
            endpoints,
            wide_search,
        } => {
            let options = SyncOptions {
                timeout,
                wide_search,
                ..Default::default()
            };
            run_diff(factory, &endpoints, options, cli.verbose).await?
        }
    };

    print!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let data_dir = match prepare_data_dir(cli.config_dir.clone()) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(exit_code::INPUT);
        }
    };
    init_logging(&data_dir, cli.verbose);
    tracing::debug!("数据目录: {}", data_dir.display());

    let code = match run(cli, &data_dir).await {
        Ok(()) => exit_code::SUCCESS,
        Err(SyncError::Quit) => {
            eprintln!("aborted");
            exit_code::QUIT
        }
        Err(e) => {
            tracing::error!("运行失败: {}", e);
            eprintln!("error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}
