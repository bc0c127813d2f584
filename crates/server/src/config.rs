use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use session::rules::STANDARD_START;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub mailbox_capacity: usize,
    pub announce_out_of_turn: bool,
    pub initial_fen: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            mailbox_capacity: 256,
            announce_out_of_turn: false,
            initial_fen: STANDARD_START.into(),
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    bind_addr: Option<String>,
    mailbox_capacity: Option<usize>,
    announce_out_of_turn: Option<bool>,
    initial_fen: Option<String>,
    log_filter: Option<String>,
}

/// Defaults, then `server.toml` (or `path`), then environment overrides.
/// A missing file is fine; an unreadable or malformed one is an error.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = path.unwrap_or_else(|| Path::new("server.toml"));
    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from '{}'", path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings in '{}'", path.display()))?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.mailbox_capacity {
        settings.mailbox_capacity = v;
    }
    if let Some(v) = file_cfg.announce_out_of_turn {
        settings.announce_out_of_turn = v;
    }
    if let Some(v) = file_cfg.initial_fen {
        settings.initial_fen = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = lookup("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = lookup("APP__MAILBOX_CAPACITY") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.mailbox_capacity = parsed;
        }
    }

    if let Some(v) = lookup("APP__ANNOUNCE_OUT_OF_TURN") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.announce_out_of_turn = parsed;
        }
    }

    if let Some(v) = lookup("APP__INITIAL_FEN") {
        settings.initial_fen = v;
    }

    if let Some(v) = lookup("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
