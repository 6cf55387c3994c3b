use clap::{Parser, Subcommand};
use std::process::Command;

/// Authwatch 개발 태스크
#[derive(Parser)]
#[command(name = "xtask")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 로컬 CI 게이트 (fmt 검사, clippy, 테스트)
    Ci,
    /// 워크스페이스 전체 포맷
    Fmt,
    /// clippy 린트 (경고를 에러로 처리)
    Lint,
    /// 퍼즈 타깃 실행 (cargo-fuzz와 nightly 필요)
    Fuzz {
        /// 타깃 이름 (fuzz/fuzz_targets/ 의 파일명)
        target: String,
        /// 실행 횟수 제한 (기본값: 무제한)
        #[arg(long)]
        runs: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci => {
            run_step("fmt check", &["fmt", "--all", "--", "--check"]);
            run_step(
                "clippy",
                &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
            );
            run_step("test", &["test", "--workspace"]);
            println!("ci gate passed");
        }
        Commands::Fmt => {
            run_step("fmt", &["fmt", "--all"]);
        }
        Commands::Lint => {
            run_step(
                "clippy",
                &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
            );
        }
        Commands::Fuzz { target, runs } => {
            run_fuzz(&target, runs);
        }
    }
}

fn run_step(label: &str, args: &[&str]) {
    let status = Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to run cargo");
    if !status.success() {
        eprintln!("{label} failed");
        std::process::exit(1);
    }
}

fn run_fuzz(target: &str, runs: Option<u64>) {
    let mut cmd = Command::new("cargo");
    cmd.current_dir("fuzz");
    cmd.args(["+nightly", "fuzz", "run", target]);

    if let Some(runs) = runs {
        cmd.args(["--", &format!("-runs={runs}")]);
    }

    let status = cmd.status().expect("failed to run cargo fuzz");
    if !status.success() {
        eprintln!("fuzz run failed");
        std::process::exit(1);
    }
}
