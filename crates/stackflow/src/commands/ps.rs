use super::{Project, ProjectArgs};
use colored::Colorize;
use stackflow::DeployError;
use stackflow_container::{ComposeRuntime, HealthReport};

pub async fn handle(args: &ProjectArgs) -> anyhow::Result<()> {
    let project = Project::load(args)?;
    println!("{}", "サービスの状態を取得中...".blue());

    let running = project
        .runtime()
        .list_running_services()
        .await
        .map_err(DeployError::from)?;
    let services = project.settings.service_set();
    let report = HealthReport::observe(&services.names(), &running);

    println!();
    println!(
        "{:<14} {:<20} {}",
        "ROLE".bold(),
        "SERVICE".bold(),
        "STATE".bold()
    );
    for service in services.iter() {
        let state = match report.is_running(&service.name) {
            Some(true) => "running".green(),
            _ => "not running".red(),
        };
        println!(
            "{:<14} {:<20} {}",
            service.role.label(),
            service.name.cyan(),
            state
        );
    }

    // compose ファイルにあって監視対象でないもの
    let extra: Vec<&String> = running
        .iter()
        .filter(|name| report.is_running(name).is_none())
        .collect();
    if !extra.is_empty() {
        println!();
        println!("その他の稼働中サービス:");
        for name in extra {
            println!("  • {}", name);
        }
    }

    println!();
    if report.all_running() {
        println!("{}", "✓ 全サービスが稼働中です".green());
    } else {
        println!(
            "{} {}",
            "⚠ 停止中:".yellow(),
            report.not_running().join(", ")
        );
    }
    Ok(())
}
