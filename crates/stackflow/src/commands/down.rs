use super::{Project, ProjectArgs};
use colored::Colorize;
use stackflow::DeployError;
use stackflow_container::ComposeRuntime;

pub async fn handle(args: &ProjectArgs, yes: bool) -> anyhow::Result<()> {
    let project = Project::load(args)?;
    println!("プロジェクト: {}", project.name().cyan());

    // 確認（--yesが指定されていない場合）
    if !yes {
        println!();
        println!(
            "{}",
            "警告: スタックの全コンテナを停止・削除します（ボリュームは残ります）。".yellow()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    println!("{}", "スタックを停止中...".blue());
    project
        .runtime()
        .tear_down()
        .await
        .map_err(DeployError::from)?;
    println!("{}", "✓ スタックを停止しました".green());
    Ok(())
}
