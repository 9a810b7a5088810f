use std::{collections::HashMap, fs};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Rest,
}

impl StoreBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(StoreBackend::Sqlite),
            "rest" | "postgrest" | "supabase" => Some(StoreBackend::Rest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub rest_url: Option<String>,
    pub rest_api_key: Option<String>,
    pub admin_password: Option<String>,
    pub token_secret: Option<String>,
    pub token_ttl_seconds: i64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8000".into(),
            store_backend: StoreBackend::Sqlite,
            database_url: "sqlite://./data/schedule.db".into(),
            rest_url: None,
            rest_api_key: None,
            admin_password: None,
            token_secret: None,
            token_ttl_seconds: 3600,
            log_filter: "info".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `server.toml` keys, then environment variables. Later
/// names in each env list win.
pub fn settings_from(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                let lookup = |key: &str| {
                    file_cfg.get(key).map(|value| match value {
                        toml::Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                };
                apply(&mut settings, lookup, FILE_KEYS);
            }
            Err(error) => warn!(%error, "ignoring unreadable server.toml"),
        }
    }

    apply(&mut settings, env, ENV_KEYS);
    settings
}

struct Keys {
    bind: &'static [&'static str],
    backend: &'static [&'static str],
    database_url: &'static [&'static str],
    rest_url: &'static [&'static str],
    rest_api_key: &'static [&'static str],
    admin_password: &'static [&'static str],
    token_secret: &'static [&'static str],
    token_ttl: &'static [&'static str],
    log_filter: &'static [&'static str],
}

const FILE_KEYS: Keys = Keys {
    bind: &["bind_addr"],
    backend: &["store_backend"],
    database_url: &["database_url"],
    rest_url: &["rest_url"],
    rest_api_key: &["rest_api_key"],
    admin_password: &["admin_password"],
    token_secret: &["token_secret"],
    token_ttl: &["token_ttl_seconds"],
    log_filter: &["log_filter"],
};

const ENV_KEYS: Keys = Keys {
    bind: &["SERVER_BIND", "APP__BIND_ADDR"],
    backend: &["APP__STORE_BACKEND"],
    database_url: &["DATABASE_URL", "APP__DATABASE_URL"],
    rest_url: &["SUPABASE_URL", "APP__REST_URL"],
    rest_api_key: &["SUPABASE_ANON_KEY", "APP__REST_API_KEY"],
    admin_password: &["APP__ADMIN_PASSWORD"],
    token_secret: &["APP__TOKEN_SECRET"],
    token_ttl: &["APP__TOKEN_TTL_SECONDS"],
    log_filter: &["RUST_LOG"],
};

fn apply(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>, keys: Keys) {
    let last = |names: &[&str]| names.iter().filter_map(|&name| lookup(name)).last();

    if let Some(v) = last(keys.bind) {
        settings.server_bind = v;
    }
    if let Some(v) = last(keys.backend) {
        match StoreBackend::parse(&v) {
            Some(backend) => settings.store_backend = backend,
            None => warn!(
                value = %v,
                "unknown store backend, keeping {:?}",
                settings.store_backend
            ),
        }
    }
    if let Some(v) = last(keys.database_url) {
        settings.database_url = v;
    }
    if let Some(v) = last(keys.rest_url) {
        settings.rest_url = Some(v);
    }
    if let Some(v) = last(keys.rest_api_key) {
        settings.rest_api_key = Some(v);
    }
    if let Some(v) = last(keys.admin_password) {
        settings.admin_password = Some(v).filter(|p| !p.is_empty());
    }
    if let Some(v) = last(keys.token_secret) {
        settings.token_secret = Some(v).filter(|s| !s.trim().is_empty());
    }
    if let Some(v) = last(keys.token_ttl) {
        match v.parse::<i64>() {
            Ok(parsed) if parsed > 0 => settings.token_ttl_seconds = parsed,
            _ => warn!(value = %v, "ignoring invalid token ttl"),
        }
    }
    if let Some(v) = last(keys.log_filter) {
        settings.log_filter = v;
    }
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    let path = if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        path
    } else if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        path
    } else if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    } else {
        raw_database_url
    };

    let path = path.replace('\\', "/");
    if has_drive_prefix(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/')
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
