use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use shared::protocol::{LAST_UPDATE_KEY, REACTIONS_KEY};

pub const SETTINGS_FILE: &str = "quotes.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub quotes_path: Option<PathBuf>,
    pub rotation_secs: u64,
    pub poll_millis: u64,
    pub reactions_key: String,
    pub last_update_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/quotes.db".into(),
            quotes_path: None,
            rotation_secs: 10,
            poll_millis: 500,
            reactions_key: REACTIONS_KEY.into(),
            last_update_key: LAST_UPDATE_KEY.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    quotes_path: Option<PathBuf>,
    rotation_secs: Option<u64>,
    poll_millis: Option<u64>,
    reactions_key: Option<String>,
    last_update_key: Option<String>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |name| std::env::var(name).ok())
}

/// Defaults, then the settings file if it parses, then environment variables.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "config: ignoring settings file")
            }
        }
    }

    if let Some(v) = env("QUOTES_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__QUOTES_PATH") {
        settings.quotes_path = Some(PathBuf::from(v));
    }

    if let Some(v) = env("APP__ROTATION_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.rotation_secs = parsed;
        }
    }

    if let Some(v) = env("APP__POLL_MILLIS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_millis = parsed;
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.quotes_path {
        settings.quotes_path = Some(v);
    }
    if let Some(v) = file_cfg.rotation_secs {
        settings.rotation_secs = v;
    }
    if let Some(v) = file_cfg.poll_millis {
        settings.poll_millis = v;
    }
    if let Some(v) = file_cfg.reactions_key {
        settings.reactions_key = v;
    }
    if let Some(v) = file_cfg.last_update_key {
        settings.last_update_key = v;
    }
}

/// Turns a bare path or loosely written sqlite url into one sqlx accepts.
/// The store creates missing parent directories when it opens the url.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        if has_windows_drive(path) {
            return format!("sqlite:{}", path.replace('\\', "/"));
        }
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        if has_windows_drive(&path) {
            return format!("sqlite:{path}");
        }
        return format!("sqlite://{path}");
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url.replace('\\', "/");
    if has_windows_drive(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_windows_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
