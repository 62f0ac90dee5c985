// src/config.rs

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FlowError;

/// The four directories every run depends on. Resolved once from the
/// environment, confirmed interactively, validated, then read-only.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Working tree of the code generator itself.
    pub root: PathBuf,
    /// Checkout of the host CLI.
    pub host_cli: PathBuf,
    /// Checkout of the host CLI extensions repository; generated modules
    /// land under `src/<module>` here.
    pub host_cli_extensions: PathBuf,
    /// Checkout of the API specification repository.
    pub spec_root: PathBuf,
}

impl Paths {
    pub fn from_env() -> Self {
        Self {
            root: env_path("CLIFORGE_ROOT", "/workspaces/forge"),
            host_cli: env_path("CLIFORGE_HOST_CLI", "/workspaces/host-cli"),
            host_cli_extensions: env_path(
                "CLIFORGE_HOST_CLI_EXTENSIONS",
                "/workspaces/host-cli-extensions",
            ),
            spec_root: env_path("CLIFORGE_SPEC_ROOT", "/workspaces/api-specs"),
        }
    }

    pub fn entries(&self) -> [(&'static str, &Path); 4] {
        [
            ("root", self.root.as_path()),
            ("host_cli", self.host_cli.as_path()),
            ("host_cli_extensions", self.host_cli_extensions.as_path()),
            ("spec_root", self.spec_root.as_path()),
        ]
    }

    pub fn fields_mut(&mut self) -> [(&'static str, &mut PathBuf); 4] {
        [
            ("root", &mut self.root),
            ("host_cli", &mut self.host_cli),
            ("host_cli_extensions", &mut self.host_cli_extensions),
            ("spec_root", &mut self.spec_root),
        ]
    }

    /// Every configured directory must exist before any step runs.
    pub fn validate(&self) -> Result<(), FlowError> {
        for (key, path) in self.entries() {
            if !path.exists() {
                return Err(FlowError::PathNotFound {
                    key,
                    path: path.display().to_string(),
                });
            }
        }
        Ok(())
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

/// Retry knobs for the sampling loop.
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetrySettings {
    pub fn from_env() -> Self {
        Self {
            max_retries: parse_retries(env::var("CLIFORGE_TESTGEN_RETRIES").ok()),
            base_delay: parse_base_delay(env::var("CLIFORGE_TESTGEN_RETRY_BASE_DELAY").ok()),
        }
    }
}

fn parse_retries(raw: Option<String>) -> u32 {
    raw.and_then(|v| v.trim().parse().ok())
        .unwrap_or(RetrySettings::default().max_retries)
}

fn parse_base_delay(raw: Option<String>) -> Duration {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| *secs > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(RetrySettings::default().base_delay)
}

/// Locate the external code generator: explicit override first, then PATH,
/// finally the bare name so the shell gets a chance to resolve it.
pub fn resolve_generator() -> String {
    if let Ok(exe) = env::var("CLIFORGE_GENERATOR") {
        if !exe.trim().is_empty() {
            return exe;
        }
    }

    if let Some(found) = find_in_path("cli-codegen") {
        return found.display().to_string();
    }

    "cli-codegen".to_string()
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
