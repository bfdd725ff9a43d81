//! Resolved server settings supplied by the embedding application.
//!
//! Raw deserialization structs (with `Option` fields) stay private; the
//! validated type is the only thing the engine sees, so a non-empty server
//! path holds by construction.

use serde::Deserialize;

const DEFAULT_WATCH_PATTERN: &str = "**/*";
const DEFAULT_DEBOUNCE_MS: u64 = 1000;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServerSettingsError {
    #[error("cannot start mutation server: missing server path setting")]
    MissingServerPath,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServerSettings {
    #[serde(default)]
    server_path: String,
    #[serde(default)]
    server_args: Vec<String>,
    current_working_directory: Option<String>,
    config_file_path: Option<String>,
    #[serde(default)]
    enabled: bool,
    watch_pattern: Option<String>,
    watch_debounce_ms: Option<u64>,
}

/// Validated settings for one workspace's mutation server.
///
/// Invariant: `server_path` is non-empty (enforced via `#[serde(try_from)]`
/// at the deserialization boundary).
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawServerSettings")]
pub struct ServerSettings {
    server_path: String,
    server_args: Vec<String>,
    current_working_directory: Option<String>,
    config_file_path: Option<String>,
    enabled: bool,
    watch_pattern: String,
    watch_debounce_ms: u64,
}

impl TryFrom<RawServerSettings> for ServerSettings {
    type Error = ServerSettingsError;

    fn try_from(raw: RawServerSettings) -> Result<Self, Self::Error> {
        if raw.server_path.trim().is_empty() {
            return Err(ServerSettingsError::MissingServerPath);
        }
        Ok(Self {
            server_path: raw.server_path,
            server_args: raw.server_args,
            current_working_directory: raw.current_working_directory,
            config_file_path: raw.config_file_path,
            enabled: raw.enabled,
            watch_pattern: raw
                .watch_pattern
                .unwrap_or_else(|| DEFAULT_WATCH_PATTERN.to_string()),
            watch_debounce_ms: raw.watch_debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
        })
    }
}

impl ServerSettings {
    pub fn new(server_path: impl Into<String>) -> Result<Self, ServerSettingsError> {
        let server_path = server_path.into();
        if server_path.trim().is_empty() {
            return Err(ServerSettingsError::MissingServerPath);
        }
        Ok(Self {
            server_path,
            server_args: Vec::new(),
            current_working_directory: None,
            config_file_path: None,
            enabled: true,
            watch_pattern: DEFAULT_WATCH_PATTERN.to_string(),
            watch_debounce_ms: DEFAULT_DEBOUNCE_MS,
        })
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.server_args = args;
        self
    }

    #[must_use]
    pub fn with_working_directory(mut self, cwd: impl Into<String>) -> Self {
        self.current_working_directory = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_watch_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.watch_pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn with_watch_debounce_ms(mut self, millis: u64) -> Self {
        self.watch_debounce_ms = millis;
        self
    }

    #[must_use]
    pub fn server_path(&self) -> &str {
        &self.server_path
    }

    #[must_use]
    pub fn server_args(&self) -> &[String] {
        &self.server_args
    }

    #[must_use]
    pub fn current_working_directory(&self) -> Option<&str> {
        self.current_working_directory.as_deref()
    }

    /// Path forwarded to the server's `configure` call, if configured.
    #[must_use]
    pub fn config_file_path(&self) -> Option<&str> {
        self.config_file_path.as_deref()
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn watch_pattern(&self) -> &str {
        &self.watch_pattern
    }

    #[must_use]
    pub fn watch_debounce_ms(&self) -> u64 {
        self.watch_debounce_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_server_path_is_rejected() {
        let result: Result<ServerSettings, _> = serde_json::from_str("{}")
            .map_err(|e| e.to_string());
        assert!(result.unwrap_err().contains("missing server path"));
    }

    #[test]
    fn test_blank_server_path_is_rejected() {
        assert!(ServerSettings::new("   ").is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let settings: ServerSettings = serde_json::from_value(serde_json::json!({
            "serverPath": "/usr/local/bin/stryker-server"
        }))
        .unwrap();
        assert_eq!(settings.server_path(), "/usr/local/bin/stryker-server");
        assert!(settings.server_args().is_empty());
        assert!(!settings.enabled());
        assert_eq!(settings.watch_pattern(), "**/*");
        assert_eq!(settings.watch_debounce_ms(), 1000);
    }

    #[test]
    fn test_full_settings_deserialize() {
        let settings: ServerSettings = serde_json::from_value(serde_json::json!({
            "serverPath": "node",
            "serverArgs": ["server.js", "--stdio"],
            "currentWorkingDirectory": "/work/project",
            "configFilePath": "stryker.conf.json",
            "enabled": true,
            "watchPattern": "src/**/*.ts",
            "watchDebounceMs": 250
        }))
        .unwrap();
        assert_eq!(settings.server_args(), ["server.js", "--stdio"]);
        assert_eq!(settings.current_working_directory(), Some("/work/project"));
        assert_eq!(settings.config_file_path(), Some("stryker.conf.json"));
        assert!(settings.enabled());
        assert_eq!(settings.watch_pattern(), "src/**/*.ts");
        assert_eq!(settings.watch_debounce_ms(), 250);
    }

    #[test]
    fn test_builder_style_construction() {
        let settings = ServerSettings::new("stryker-server")
            .unwrap()
            .with_args(vec!["--port".to_string(), "0".to_string()])
            .with_working_directory("/work")
            .with_config_file("stryker.conf.json");
        assert_eq!(settings.server_path(), "stryker-server");
        assert_eq!(settings.server_args().len(), 2);
        assert_eq!(settings.current_working_directory(), Some("/work"));
    }
}
