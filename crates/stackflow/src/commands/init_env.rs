use super::ProjectArgs;
use colored::Colorize;
use stackflow::init_env;

pub fn handle(args: &ProjectArgs, force: bool) -> anyhow::Result<()> {
    let path = match args.env_file {
        Some(ref path) => path.clone(),
        None => args.resolve_dir()?.join(".env"),
    };

    let report = init_env(&path, force)?;

    println!(
        "{} {}",
        "✓ 環境変数ファイルを書き込みました:".green(),
        report.path.display().to_string().cyan()
    );
    if report.added.is_empty() {
        println!("  追加したキーはありません");
    }
    for key in &report.added {
        if report.generated.contains(key) {
            println!("  + {} {}", key, "(自動生成)".dimmed());
        } else {
            println!("  + {}", key);
        }
    }
    if !report.preserved.is_empty() {
        println!("  既存の値を保持: {}", report.preserved.join(", "));
    }
    Ok(())
}
