use clap::Parser;
use tracing_subscriber::EnvFilter;

use authwatch_cli::cli::{Cli, Commands};
use authwatch_cli::commands;
use authwatch_cli::error::CliError;
use authwatch_cli::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_deref());

    let writer = OutputWriter::new(cli.output);

    if let Err(e) = run(cli, &writer).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

/// 진단 로그는 stderr로 보냄 -- stdout은 명령 결과 전용
fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(cli: Cli, writer: &OutputWriter) -> Result<(), CliError> {
    let config_path = cli.config;

    match cli.command {
        Commands::Fetch(args) => commands::fetch::execute(args, &config_path, writer).await,
        Commands::Status(args) => commands::status::execute(args, &config_path, writer).await,
        Commands::Alerts(args) => commands::alerts::execute(args, &config_path, writer).await,
        Commands::Ips(args) => commands::ips::execute(args, &config_path, writer).await,
        Commands::Config(args) => commands::config::execute(args, &config_path, writer).await,
    }
}
