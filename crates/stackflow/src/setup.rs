//! デプロイステップの進捗記録
//!
//! 各ステップの開始・結果・所要時間を LogSink に記録し、最後にサマリーを表示する。

use colored::Colorize;
use stackflow_core::LogSink;
use std::time::{Duration, Instant};

/// デプロイの各ステップ（実行順）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    /// 前提条件の検証
    Prerequisites,
    /// デプロイロック取得
    AcquireLock,
    /// 依存ツールのインストール
    Dependencies,
    /// ディレクトリ作成
    Directories,
    /// スタック起動
    Launch,
    /// 起動後の初期設定
    Configure,
    /// ダッシュボード公開
    Dashboard,
}

impl DeployStep {
    /// ステップの日本語名
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prerequisites => "前提条件の検証",
            Self::AcquireLock => "デプロイロック取得",
            Self::Dependencies => "依存ツールのインストール",
            Self::Directories => "ディレクトリ作成",
            Self::Launch => "スタック起動",
            Self::Configure => "起動後の初期設定",
            Self::Dashboard => "ダッシュボード公開",
        }
    }

    /// ステップのID（--skipで使用）
    pub fn id(&self) -> &'static str {
        match self {
            Self::Prerequisites => "prerequisites",
            Self::AcquireLock => "lock",
            Self::Dependencies => "deps",
            Self::Directories => "dirs",
            Self::Launch => "launch",
            Self::Configure => "configure",
            Self::Dashboard => "dashboard",
        }
    }

    /// --skip で飛ばせるステップか
    pub fn skippable(&self) -> bool {
        matches!(self, Self::Dependencies | Self::Dashboard)
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::Prerequisites,
            Self::AcquireLock,
            Self::Dependencies,
            Self::Directories,
            Self::Launch,
            Self::Configure,
            Self::Dashboard,
        ]
    }
}

/// ステップの実行結果
#[derive(Debug, Clone)]
pub enum StepResult {
    /// 成功
    Success {
        duration: Duration,
        message: Option<String>,
    },
    /// スキップ
    Skipped { reason: String },
    /// 失敗
    Failed { error: String, duration: Duration },
    /// リトライ後に成功
    SuccessWithRetry { duration: Duration, retries: u32 },
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::SuccessWithRetry { .. } | Self::Skipped { .. }
        )
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Success { duration, .. } => Some(*duration),
            Self::Failed { duration, .. } => Some(*duration),
            Self::SuccessWithRetry { duration, .. } => Some(*duration),
            Self::Skipped { .. } => None,
        }
    }
}

/// ステップ進捗の記録器
pub struct StepTracker {
    start_time: Instant,
    step_results: Vec<(DeployStep, StepResult)>,
    current_step: Option<(DeployStep, Instant)>,
    pending_retries: u32,
}

impl StepTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            step_results: Vec::new(),
            current_step: None,
            pending_retries: 0,
        }
    }

    /// ステップ開始を記録
    pub fn start_step(&mut self, log: &mut LogSink, step: DeployStep) {
        log.info(step.name());
        self.current_step = Some((step, Instant::now()));
        self.pending_retries = 0;
    }

    /// 実行中のステップ
    pub fn current(&self) -> Option<DeployStep> {
        self.current_step.map(|(step, _)| step)
    }

    /// ステップ成功を記録（途中でリトライがあればリトライ付き成功として記録）
    pub fn step_success(&mut self, log: &mut LogSink, message: Option<&str>) {
        if let Some((step, start)) = self.current_step.take() {
            let duration = start.elapsed();
            let duration_str = format_duration(duration);
            let text = message.unwrap_or(step.name());

            if self.pending_retries > 0 {
                log.success(format!(
                    "{} 完了 ({}, {} retries)",
                    text, duration_str, self.pending_retries
                ));
                self.step_results.push((
                    step,
                    StepResult::SuccessWithRetry {
                        duration,
                        retries: self.pending_retries,
                    },
                ));
            } else {
                log.success(format!("{} 完了 ({})", text, duration_str));
                self.step_results.push((
                    step,
                    StepResult::Success {
                        duration,
                        message: message.map(String::from),
                    },
                ));
            }
            self.pending_retries = 0;
        }
    }

    /// ステップを実行せずにスキップとして記録
    pub fn skip_step(&mut self, log: &mut LogSink, step: DeployStep, reason: &str) {
        log.info(format!("{} をスキップ ({})", step.name(), reason));
        self.step_results.push((
            step,
            StepResult::Skipped {
                reason: reason.to_string(),
            },
        ));
    }

    /// ステップ失敗を記録
    pub fn step_failed(&mut self, log: &mut LogSink, error: &str) {
        if let Some((step, start)) = self.current_step.take() {
            let duration = start.elapsed();
            log.error(format!("{}: {}", step.name(), error));
            self.step_results.push((
                step,
                StepResult::Failed {
                    error: error.to_string(),
                    duration,
                },
            ));
        }
    }

    /// リトライを記録
    pub fn log_retry(&mut self, log: &mut LogSink, attempt: u32, max_attempts: u32, error: &str) {
        self.pending_retries += 1;
        log.warn(format!("⟳ リトライ {}/{}: {}", attempt, max_attempts, error));
    }

    pub fn results(&self) -> &[(DeployStep, StepResult)] {
        &self.step_results
    }

    pub fn result_of(&self, step: DeployStep) -> Option<&StepResult> {
        self.step_results
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, result)| result)
    }

    pub fn total_retries(&self) -> u32 {
        self.step_results
            .iter()
            .filter_map(|(_, result)| {
                if let StepResult::SuccessWithRetry { retries, .. } = result {
                    Some(*retries)
                } else {
                    None
                }
            })
            .sum()
    }

    pub fn error_count(&self) -> usize {
        self.step_results
            .iter()
            .filter(|(_, result)| matches!(result, StepResult::Failed { .. }))
            .count()
    }

    /// サマリーを出力
    pub fn print_summary(&self, title: &str) {
        let total_duration = self.start_time.elapsed();
        let total_retries = self.total_retries();
        let error_count = self.error_count();

        let slowest_step = self
            .step_results
            .iter()
            .filter_map(|(step, result)| result.duration().map(|d| (step, d)))
            .max_by_key(|(_, d)| *d);

        println!();
        println!("{}", "═".repeat(44));
        println!("Deploy Summary: {}", title.cyan().bold());
        println!("{}", "─".repeat(44));
        println!("Total time:    {}", format_duration(total_duration).green());

        if let Some((step, duration)) = slowest_step {
            println!(
                "Slowest step:  {} ({})",
                step.name(),
                format_duration(duration)
            );
        }

        let skipped: Vec<&str> = self
            .step_results
            .iter()
            .filter(|(_, result)| matches!(result, StepResult::Skipped { .. }))
            .map(|(step, _)| step.id())
            .collect();
        if !skipped.is_empty() {
            println!("Skipped:       {}", skipped.join(", ").dimmed());
        }

        if total_retries > 0 {
            println!("Retries:       {}", total_retries.to_string().yellow());
        } else {
            println!("Retries:       0");
        }

        if error_count > 0 {
            println!("Errors:        {}", error_count.to_string().red().bold());
        } else {
            println!("Errors:        {}", "0".green());
        }
        println!("{}", "═".repeat(44));
    }

    /// 全ステップが成功したか
    pub fn all_success(&self) -> bool {
        self.step_results
            .iter()
            .all(|(_, result)| result.is_success())
    }
}

impl Default for StepTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Duration を読みやすい形式にフォーマット
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let minutes = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", minutes, secs)
    } else if total_secs >= 1 {
        format!("{}.{}s", total_secs, millis / 100)
    } else {
        format!("{}ms", millis)
    }
}

/// スキップするステップを解析（スキップ不可のIDは無視する）
pub fn parse_skip_steps(skip_arg: Option<&str>) -> Vec<DeployStep> {
    let Some(skip_str) = skip_arg else {
        return Vec::new();
    };

    skip_str
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            DeployStep::all()
                .into_iter()
                .find(|step| step.id() == s && step.skippable())
        })
        .collect()
}
