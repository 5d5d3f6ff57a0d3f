mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::ProjectArgs;
use stackflow::{DeployError, DeployFailure};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(about = "IoT スタックを一発でデプロイし、失敗したら元に戻す", long_about = None)]
struct Cli {
    #[command(flatten)]
    project: ProjectArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// スタックをデプロイ（失敗時は自動でロールバック）
    Deploy {
        /// スキップするステップ（カンマ区切り: deps, dashboard）
        #[arg(long)]
        skip: Option<String>,
        /// 管理者権限の確認を省略する
        #[arg(long)]
        no_root_check: bool,
    },
    /// 前提条件だけを検証（何も変更しない）
    Validate {
        /// 管理者権限の確認を省略する
        #[arg(long)]
        no_root_check: bool,
    },
    /// スタックを停止・削除
    Down {
        /// 確認なしで実行
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// サービスの稼働状況を表示
    Ps,
    /// .env のテンプレートを作成（秘密情報は自動生成）
    InitEnv {
        /// 既存ファイルに不足しているキーを追記する
        #[arg(long)]
        force: bool,
    },
    /// バージョン情報を表示
    Version,
}

/// エラーに対応する終了コード
fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(failure) = error.downcast_ref::<DeployFailure>() {
        return failure.exit_code();
    }
    error
        .downcast_ref::<DeployError>()
        .map(DeployError::exit_code)
        .unwrap_or(1)
}

#[tokio::main]
async fn main() {
    // ログは stderr に出力（stdout は進捗表示に使う）
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Deploy {
            skip,
            no_root_check,
        } => commands::deploy::handle(&cli.project, skip.as_deref(), no_root_check).await,
        Commands::Validate { no_root_check } => {
            commands::validate::handle(&cli.project, no_root_check).await
        }
        Commands::Down { yes } => commands::down::handle(&cli.project, yes).await,
        Commands::Ps => commands::ps::handle(&cli.project).await,
        Commands::InitEnv { force } => commands::init_env::handle(&cli.project, force),
    };

    if let Err(e) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(exit_code(&e));
    }
}
