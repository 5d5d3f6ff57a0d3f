use super::{Project, ProjectArgs};
use colored::Colorize;
use stackflow::{LocalHost, Pipeline, PipelineOptions, StepTracker, parse_skip_steps};
use stackflow_core::LogSink;
use std::sync::Arc;

/// Ctrl+C を待つ（シグナルを受け取れない環境では完了しない）
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

pub async fn handle(
    args: &ProjectArgs,
    skip: Option<&str>,
    no_root_check: bool,
) -> anyhow::Result<()> {
    let project = Project::load(args)?;

    println!("{}", "デプロイを開始します...".blue().bold());
    println!("プロジェクト: {}", project.name().cyan());
    project.print_loaded_files();
    println!();

    let log = LogSink::to_file(project.log_path())?;
    let log_path = log.path().map(|p| p.to_path_buf());
    let mut ctx = project.context(log);

    let pipeline = Pipeline::new(
        project.settings.clone(),
        Arc::new(project.runtime()),
        Arc::new(LocalHost),
    )
    .with_options(PipelineOptions {
        require_privilege: !no_root_check,
        skip: parse_skip_steps(skip),
    });

    let mut tracker = StepTracker::new();
    let result = pipeline
        .execute(&mut ctx, &mut tracker, shutdown_signal())
        .await;

    tracker.print_summary(&project.name());
    if let Some(ref path) = log_path {
        println!("ログ: {}", path.display().to_string().dimmed());
    }

    match result {
        Ok(outcome) => {
            println!();
            println!("{}", "✓ デプロイが完了しました".green().bold());
            print!("{}", outcome.health);
            for dashboard in &outcome.dashboards {
                println!("  📊 {} → {}", dashboard.uid, dashboard.public_url.cyan());
            }
            Ok(())
        }
        Err(failure) => {
            if !failure.rollback.steps.is_empty() {
                eprintln!();
                eprintln!("{}", "ロールバック:".yellow().bold());
                for step in &failure.rollback.steps {
                    match step.error {
                        None => eprintln!("  ✓ {}", step.label),
                        Some(ref error) => {
                            eprintln!("  {} {}: {}", "✗".red(), step.label, error)
                        }
                    }
                }
            }
            Err(failure.into())
        }
    }
}
