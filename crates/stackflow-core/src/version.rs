//! バージョン下限チェック
//!
//! ツールが出力するバージョン文字列（`Docker version 24.0.7, build afdd53b`、
//! `v2.24.5-desktop.1`、`2.21` など）を寛容に解釈し、セマンティックバージョンの
//! 順序で下限と比較する。

use crate::error::{Result, StackError};
use semver::Version;

/// 文字列中の最初のバージョン番号を取り出して解釈する
pub fn parse_lenient(raw: &str) -> Result<Version> {
    let start = raw
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| StackError::InvalidVersion(raw.trim().to_string()))?;
    let rest = &raw[start..];

    let numeric_end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let numeric = rest[..numeric_end].trim_end_matches('.');

    let mut parts = numeric.split('.').map(|p| p.parse::<u64>());
    let major = parts
        .next()
        .and_then(|p| p.ok())
        .ok_or_else(|| StackError::InvalidVersion(raw.trim().to_string()))?;
    let minor = parts.next().and_then(|p| p.ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.ok()).unwrap_or(0);

    let mut version = Version::new(major, minor, patch);

    // "-desktop.1" のようなサフィックスはプレリリースとして保持する
    let suffix = &rest[numeric_end..];
    if let Some(pre) = suffix.strip_prefix('-') {
        let pre: String = pre
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-')
            .collect();
        if let Ok(pre) = semver::Prerelease::new(&pre) {
            version.pre = pre;
        }
    }

    Ok(version)
}

/// プレリリース部分を無視して下限以上か判定する
pub fn meets_floor(installed: &Version, floor: &Version) -> bool {
    Version::new(installed.major, installed.minor, installed.patch) >= *floor
}

/// バージョン出力を解釈して下限を満たすか検査する
pub fn check_floor(name: &str, raw_installed: &str, floor: &Version) -> Result<Version> {
    let installed = parse_lenient(raw_installed)?;
    if meets_floor(&installed, floor) {
        Ok(installed)
    } else {
        Err(StackError::VersionTooOld {
            name: name.to_string(),
            installed: installed.to_string(),
            required: floor.to_string(),
        })
    }
}
