use anyhow::Result;
use clap::Parser;

use authwatch_core::config::AuthwatchConfig;
use authwatch_daemon::cli::DaemonCli;
use authwatch_daemon::logging;
use authwatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드 -- 로깅이 아직 없으므로 실패는 stderr로 보고
    let mut config = match AuthwatchConfig::load(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "authwatch-daemon: cannot load {}: {e}",
                cli.config.display()
            );
            std::process::exit(2);
        }
    };

    // CLI 인자가 설정 파일보다 우선
    cli.apply_overrides(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("authwatch-daemon: invalid configuration: {e}");
        std::process::exit(2);
    }

    if cli.validate {
        println!("{}: configuration OK", cli.config.display());
        return Ok(());
    }

    // 로깅 초기화
    logging::init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        hosts = config.fleet.hosts.len(),
        "authwatch-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("authwatch-daemon shut down");
    Ok(())
}
