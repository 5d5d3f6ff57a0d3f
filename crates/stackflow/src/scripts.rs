//! 依存ツールのインストールスクリプト
//!
//! Debian / Ubuntu 系ホストを想定。いずれも既にインストール済みなら何もしない。

/// git
pub const GIT_SETUP: &str = r#"#!/bin/sh
set -e

echo "=== stackflow: git セットアップ ==="

if ! command -v git >/dev/null 2>&1; then
    echo ">>> git をインストール中..."
    apt-get update -qq
    DEBIAN_FRONTEND=noninteractive apt-get install -y -qq git
fi

echo "git インストール完了"
"#;

/// Docker Engine
pub const DOCKER_SETUP: &str = r#"#!/bin/sh
set -e

echo "=== stackflow: Docker セットアップ ==="

if ! command -v docker >/dev/null 2>&1; then
    echo ">>> Docker をインストール中..."
    curl -fsSL https://get.docker.com | sh

    if [ -n "$SUDO_USER" ]; then
        usermod -aG docker "$SUDO_USER"
    fi
fi

if command -v systemctl >/dev/null 2>&1; then
    systemctl enable docker
    systemctl start docker
fi

echo "Docker インストール完了"
"#;

/// docker compose プラグイン
pub const COMPOSE_SETUP: &str = r#"#!/bin/sh
set -e

echo "=== stackflow: docker compose プラグイン セットアップ ==="

if ! docker compose version >/dev/null 2>&1; then
    echo ">>> docker compose プラグインをインストール中..."
    apt-get update -qq
    DEBIAN_FRONTEND=noninteractive apt-get install -y -qq docker-compose-plugin
fi

echo "docker compose インストール完了"
"#;

/// 名前から組み込みスクリプトを取得
pub fn get_builtin_script(name: &str) -> Option<&'static str> {
    match name {
        "git" => Some(GIT_SETUP),
        "docker" => Some(DOCKER_SETUP),
        "docker compose" => Some(COMPOSE_SETUP),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_are_idempotent_guards() {
        for name in ["git", "docker", "docker compose"] {
            let script = get_builtin_script(name).unwrap();
            assert!(script.starts_with("#!/bin/sh"));
            assert!(script.contains("set -e"));
            assert!(script.contains("if !"), "{} has no presence guard", name);
        }
        assert!(get_builtin_script("podman").is_none());
    }
}
