use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from `respec.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RespecConfig {
    pub runner: RunnerConfig,
    pub session: SessionConfig,
    pub watch: WatchConfig,
    pub notify: NotifyConfig,
}

/// Run policy: entry point and what to run when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunnerConfig {
    pub top_spec: String,
    pub ghci_options: Vec<String>,
    pub all_on_start: bool,
    pub all_on_pass: bool,
    pub focus_on_fail: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            top_spec: "test/Spec.hs".to_string(),
            ghci_options: Vec::new(),
            all_on_start: false,
            all_on_pass: false,
            focus_on_fail: true,
        }
    }
}

/// Interactive session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
    pub program: String,
    pub sandbox_glob: String,
    /// `"ignore"` skips `.ghci` files; any other value is a script path.
    pub dot_ghci: Option<String>,
    pub poll_interval_ms: u64,
    pub quit_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: "ghci".to_string(),
            sandbox_glob: ".cabal-sandbox/*packages.conf.d".to_string(),
            dot_ghci: None,
            poll_interval_ms: 10,
            quit_grace_ms: 2000,
        }
    }
}

/// File watching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WatchConfig {
    pub source_root: Option<String>,
    pub extensions: Vec<String>,
    pub manifest_patterns: Vec<String>,
    pub debounce_ms: u64,
    pub ignore: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            source_root: None,
            extensions: vec!["hs".to_string(), "lhs".to_string()],
            manifest_patterns: vec![
                "*.cabal".to_string(),
                "cabal.project".to_string(),
                "stack.yaml".to_string(),
                "package.yaml".to_string(),
            ],
            debounce_ms: 100,
            ignore: vec![
                ".git".to_string(),
                ".cabal-sandbox".to_string(),
                ".stack-work".to_string(),
                "dist".to_string(),
                "dist-newstyle".to_string(),
            ],
        }
    }
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NotifyConfig {
    pub enabled: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
