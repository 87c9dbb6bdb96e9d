// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

/// Default upper bound on resolved identifier length
pub const DEFAULT_MAX_NAME_LENGTH: usize = 46;

/// Smallest accepted identifier length bound
pub const MIN_MAX_NAME_LENGTH: usize = 8;

/// Default orchestration runtime package imported by generated programs
pub const DEFAULT_RUNTIME_PACKAGE: &str = "autogen";

/// Export configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Maximum length of any resolved identifier
    pub max_name_length: usize,
    /// Top-level package of the orchestration runtime
    pub runtime_package: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            runtime_package: DEFAULT_RUNTIME_PACKAGE.to_string(),
        }
    }
}

impl ExportConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `FLOWGEN_MAX_NAME_LENGTH`: identifier length bound (default: 46, minimum: 8)
    /// - `FLOWGEN_RUNTIME_PACKAGE`: runtime package name (default: autogen)
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_name_length = match std::env::var("FLOWGEN_MAX_NAME_LENGTH") {
            Ok(raw) => parse_max_name_length(&raw)?,
            Err(_) => DEFAULT_MAX_NAME_LENGTH,
        };

        let runtime_package = match std::env::var("FLOWGEN_RUNTIME_PACKAGE") {
            Ok(raw) => parse_runtime_package(&raw)?,
            Err(_) => DEFAULT_RUNTIME_PACKAGE.to_string(),
        };

        Ok(Self {
            max_name_length,
            runtime_package,
        })
    }

    /// Override the identifier length bound, validating it.
    pub fn with_max_name_length(mut self, max_name_length: usize) -> Result<Self, ConfigError> {
        if max_name_length < MIN_MAX_NAME_LENGTH {
            return Err(ConfigError::Invalid(
                "FLOWGEN_MAX_NAME_LENGTH",
                "must be at least 8",
            ));
        }
        self.max_name_length = max_name_length;
        Ok(self)
    }

    /// Override the runtime package, validating it.
    pub fn with_runtime_package(mut self, runtime_package: &str) -> Result<Self, ConfigError> {
        self.runtime_package = parse_runtime_package(runtime_package)?;
        Ok(self)
    }
}

fn parse_max_name_length(raw: &str) -> Result<usize, ConfigError> {
    let value: usize = raw.trim().parse().map_err(|_| {
        ConfigError::Invalid("FLOWGEN_MAX_NAME_LENGTH", "must be a positive integer")
    })?;
    if value < MIN_MAX_NAME_LENGTH {
        return Err(ConfigError::Invalid(
            "FLOWGEN_MAX_NAME_LENGTH",
            "must be at least 8",
        ));
    }
    Ok(value)
}

fn parse_runtime_package(raw: &str) -> Result<String, ConfigError> {
    let value = raw.trim();
    let valid = !value.is_empty()
        && !value.starts_with(|c: char| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ConfigError::Invalid(
            "FLOWGEN_RUNTIME_PACKAGE",
            "must be a bare package name",
        ));
    }
    Ok(value.to_string())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.remove("FLOWGEN_MAX_NAME_LENGTH");
        guard.remove("FLOWGEN_RUNTIME_PACKAGE");

        let config = ExportConfig::from_env().unwrap();
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.max_name_length, 46);
        assert_eq!(config.runtime_package, "autogen");
    }

    #[test]
    fn test_config_from_env_with_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.set("FLOWGEN_MAX_NAME_LENGTH", "20");
        guard.set("FLOWGEN_RUNTIME_PACKAGE", "ag2");

        let config = ExportConfig::from_env().unwrap();
        assert_eq!(config.max_name_length, 20);
        assert_eq!(config.runtime_package, "ag2");
    }

    #[test]
    fn test_config_from_env_rejects_small_length() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.set("FLOWGEN_MAX_NAME_LENGTH", "3");
        guard.remove("FLOWGEN_RUNTIME_PACKAGE");

        let err = ExportConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("FLOWGEN_MAX_NAME_LENGTH"));
    }

    #[test]
    fn test_config_from_env_rejects_garbage() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        guard.set("FLOWGEN_MAX_NAME_LENGTH", "lots");
        guard.remove("FLOWGEN_RUNTIME_PACKAGE");
        assert!(ExportConfig::from_env().is_err());

        guard.set("FLOWGEN_MAX_NAME_LENGTH", "46");
        guard.set("FLOWGEN_RUNTIME_PACKAGE", "auto gen");
        assert!(ExportConfig::from_env().is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ExportConfig::default()
            .with_max_name_length(12)
            .unwrap()
            .with_runtime_package("ag2")
            .unwrap();
        assert_eq!(config.max_name_length, 12);
        assert_eq!(config.runtime_package, "ag2");
        assert!(ExportConfig::default().with_max_name_length(2).is_err());
        assert!(ExportConfig::default().with_runtime_package("").is_err());
    }
}
