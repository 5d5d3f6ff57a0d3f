//! 補償アクション（ロールバック）レジストリ
//!
//! 副作用を起こしたステージが「失敗したらこれで元に戻す」を登録し、
//! 失敗時にトップレベルのハンドラが登録と逆順にベストエフォートで実行する。
//! 個々の補償アクションが失敗・panic しても残りは必ず実行される。

use crate::log::LogSink;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;

pub type CleanupFuture = BoxFuture<'static, anyhow::Result<()>>;

struct CleanupAction {
    label: String,
    undo: Box<dyn FnOnce() -> CleanupFuture + Send>,
}

#[derive(Default)]
pub struct CleanupRegistry {
    actions: Vec<CleanupAction>,
}

/// 実行された補償アクション1件の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackStep {
    pub label: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RollbackReport {
    /// 実行順
    pub steps: Vec<RollbackStep>,
}

impl RollbackReport {
    pub fn executed_labels(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RollbackStep> {
        self.steps.iter().filter(|s| s.error.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|s| s.error.is_none())
    }
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 補償アクションを登録する
    pub fn register<F, Fut>(&mut self, label: impl Into<String>, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let label = label.into();
        tracing::debug!("補償アクションを登録: {}", label);
        self.actions.push(CleanupAction {
            label,
            undo: Box::new(move || async move { undo().await }.boxed()),
        });
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// 登録順のラベル
    pub fn labels(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.label.as_str()).collect()
    }

    /// 登録と逆順に全アクションを実行する
    pub async fn unwind(&mut self, log: &mut LogSink) -> RollbackReport {
        let mut report = RollbackReport::default();
        if self.actions.is_empty() {
            return report;
        }

        log.warn(format!(
            "ロールバックを開始します（{} 件）",
            self.actions.len()
        ));

        while let Some(action) = self.actions.pop() {
            log.info(format!("ロールバック: {}", action.label));

            let outcome = AssertUnwindSafe((action.undo)()).catch_unwind().await;
            let error = match outcome {
                Ok(Ok(())) => {
                    log.success(format!("ロールバック完了: {}", action.label));
                    None
                }
                Ok(Err(e)) => Some(format!("{:#}", e)),
                Err(_) => Some("補償アクションが panic しました".to_string()),
            };

            if let Some(ref message) = error {
                tracing::warn!("ロールバック失敗 '{}': {}", action.label, message);
                log.error(format!("ロールバック失敗: {}: {}", action.label, message));
            }

            report.steps.push(RollbackStep {
                label: action.label,
                error,
            });
        }

        report
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.labels()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_unwind_runs_in_reverse_order() {
        let calls = recorder();
        let mut registry = CleanupRegistry::new();

        for label in ["A", "B", "C"] {
            let calls = calls.clone();
            registry.register(label, move || async move {
                calls.lock().unwrap().push(label);
                Ok(())
            });
        }
        assert_eq!(registry.labels(), vec!["A", "B", "C"]);

        let mut log = LogSink::memory();
        let report = registry.unwind(&mut log).await;

        assert_eq!(*calls.lock().unwrap(), vec!["C", "B", "A"]);
        assert_eq!(report.executed_labels(), vec!["C", "B", "A"]);
        assert!(report.is_clean());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failing_step_does_not_halt_unwind() {
        let calls = recorder();
        let mut registry = CleanupRegistry::new();

        let a = calls.clone();
        registry.register("A", move || async move {
            a.lock().unwrap().push("A");
            Ok(())
        });
        registry.register("B", || async { Err(anyhow::anyhow!("B は元に戻せません")) });
        let c = calls.clone();
        registry.register("C", move || async move {
            c.lock().unwrap().push("C");
            Ok(())
        });

        let mut log = LogSink::memory();
        let report = registry.unwind(&mut log).await;

        assert_eq!(*calls.lock().unwrap(), vec!["C", "A"]);
        assert_eq!(report.executed_labels(), vec!["C", "B", "A"]);
        let failures: Vec<&str> = report.failures().map(|s| s.label.as_str()).collect();
        assert_eq!(failures, vec!["B"]);
        assert!(log.contains("B は元に戻せません"));
    }

    #[tokio::test]
    async fn test_panicking_step_is_contained() {
        let calls = recorder();
        let mut registry = CleanupRegistry::new();

        let a = calls.clone();
        registry.register("A", move || async move {
            a.lock().unwrap().push("A");
            Ok(())
        });
        registry.register("B", || async {
            if true {
                panic!("boom");
            }
            Ok(())
        });

        let mut log = LogSink::memory();
        let report = registry.unwind(&mut log).await;

        assert_eq!(*calls.lock().unwrap(), vec!["A"]);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let mut registry = CleanupRegistry::new();
        let mut log = LogSink::memory();
        let report = registry.unwind(&mut log).await;
        assert!(report.steps.is_empty());
        assert!(log.entries().is_empty());
    }
}
