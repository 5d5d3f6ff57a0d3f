use super::{Project, ProjectArgs};
use colored::Colorize;
use stackflow::{DeployError, LocalHost, Pipeline, PipelineOptions};
use stackflow_core::LogSink;
use std::sync::Arc;

pub async fn handle(args: &ProjectArgs, no_root_check: bool) -> anyhow::Result<()> {
    println!("{}", "前提条件を検証中...".blue());

    let project = Project::load(args)?;
    project.print_loaded_files();

    let pipeline = Pipeline::new(
        project.settings.clone(),
        Arc::new(project.runtime()),
        Arc::new(LocalHost),
    )
    .with_options(PipelineOptions {
        require_privilege: !no_root_check,
        skip: Vec::new(),
    });
    let ctx = project.context(LogSink::memory());

    match pipeline.validate(&ctx) {
        Ok(()) => {
            println!("{}", "✓ 前提条件を満たしています".green().bold());
            println!();
            println!("サマリー:");
            println!("  プロジェクト: {}", project.name().cyan());
            println!(
                "  compose ファイル: {}",
                project.settings.compose_file.display()
            );
            println!("  設定キー: {}個", project.configuration.len());
            println!("  サービス: {}個", ctx.services.len());
            for service in ctx.services.iter() {
                println!("    - {} ({})", service.name.cyan(), service.role.label());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 検証エラー".red().bold());
            Err(DeployError::from(e).into())
        }
    }
}
