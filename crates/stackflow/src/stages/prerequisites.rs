//! 前提条件の検証
//!
//! 何も変更しないうちに、権限・必須ファイル・必須設定キーを順に確認する。
//! 最初に見つかった不足をエラーとして返す。

use crate::host::HostSystem;
use stackflow_core::{Configuration, StackError};
use std::path::{Path, PathBuf};

/// 検証内容
#[derive(Debug, Clone)]
pub struct PrerequisiteCheck {
    pub require_privilege: bool,
    /// プロジェクトディレクトリからの相対パス
    pub required_files: Vec<PathBuf>,
    pub required_keys: Vec<String>,
}

pub fn validate_prerequisites(
    host: &dyn HostSystem,
    project_dir: &Path,
    configuration: &Configuration,
    check: &PrerequisiteCheck,
) -> Result<(), StackError> {
    if check.require_privilege && !host.is_privileged() {
        return Err(StackError::MissingPrivilege);
    }

    for file in &check.required_files {
        let path = if file.is_absolute() {
            file.clone()
        } else {
            project_dir.join(file)
        };
        if !path.is_file() {
            return Err(StackError::MissingFile { path });
        }
    }

    match configuration.missing_or_empty(&check.required_keys) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use stackflow_container::ExecOutput;
    use stackflow_core::REQUIRED_KEYS;
    use std::fs;

    struct FakeHost {
        privileged: bool,
    }

    #[async_trait]
    impl HostSystem for FakeHost {
        fn is_privileged(&self) -> bool {
            self.privileged
        }

        async fn probe(&self, _program: &str, _args: &[&str]) -> Option<String> {
            None
        }

        async fn run_script(&self, _name: &str, _script: &str) -> std::io::Result<ExecOutput> {
            unreachable!("validation never installs anything")
        }
    }

    fn full_configuration() -> Configuration {
        Configuration::from_pairs(REQUIRED_KEYS.iter().map(|k| (*k, "value")))
    }

    fn check() -> PrerequisiteCheck {
        PrerequisiteCheck {
            require_privilege: true,
            required_files: vec![PathBuf::from(".env"), PathBuf::from("docker-compose.yml")],
            required_keys: REQUIRED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "").unwrap();
        fs::write(dir.path().join("docker-compose.yml"), "services: {}").unwrap();
        dir
    }

    #[test]
    fn test_all_present() {
        let dir = project();
        let host = FakeHost { privileged: true };
        assert!(validate_prerequisites(&host, dir.path(), &full_configuration(), &check()).is_ok());
    }

    #[test]
    fn test_privilege_checked_first() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost { privileged: false };
        let err = validate_prerequisites(&host, dir.path(), &Configuration::new(), &check())
            .unwrap_err();
        assert!(matches!(err, StackError::MissingPrivilege));

        let mut no_root = check();
        no_root.require_privilege = false;
        let dir = project();
        assert!(validate_prerequisites(&host, dir.path(), &full_configuration(), &no_root).is_ok());
    }

    #[test]
    fn test_first_missing_file_is_named() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "").unwrap();
        let host = FakeHost { privileged: true };

        let err = validate_prerequisites(&host, dir.path(), &full_configuration(), &check())
            .unwrap_err();
        match err {
            StackError::MissingFile { path } => assert!(path.ends_with("docker-compose.yml")),
            other => panic!("Expected MissingFile, got {:?}", other),
        }
    }

    #[test]
    fn test_single_empty_key_is_named() {
        let dir = project();
        let host = FakeHost { privileged: true };
        let mut configuration = full_configuration();
        configuration.insert("INFLUX_TOKEN", "   ");

        let err = validate_prerequisites(&host, dir.path(), &configuration, &check()).unwrap_err();
        match &err {
            StackError::EmptyConfigKey { key } => assert_eq!(key, "INFLUX_TOKEN"),
            other => panic!("Expected EmptyConfigKey, got {:?}", other),
        }
        assert!(err.is_validation());
    }
}
