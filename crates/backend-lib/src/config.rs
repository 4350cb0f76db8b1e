// ============================
// labpass-backend/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub codes: CodeSettings,
    pub rate_limit: RateLimitSettings,
    pub attempts: AttemptSettings,
    pub event: EventSettings,
    /// Bootstrap credentials for the officers account
    pub officers: Option<OfficerSettings>,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON formatted logs
    pub json_logs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Data directory for the flat-file store
    pub path: PathBuf,
}

/// Rotation and watchdog timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSettings {
    /// Seconds between booth code rotations
    pub countdown_period_secs: u64,
    /// Seconds between talk code rotations; unset means talk codes rotate with booth codes
    #[serde(default)]
    pub talk_countdown_secs: Option<u64>,
    /// Seconds without a ping before a lab is deactivated
    pub heartbeat_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: u32,
}

/// Wrong-code lockout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSettings {
    pub max_attempts: u32,
    pub lockout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    /// Lab head account name with access to every lab, the keynote and the admin API
    pub officers_name: String,
    /// End the session right after registration
    pub register_only: bool,
    /// Labs written to an empty catalog on first start
    pub seed_labs: Vec<String>,
    pub session_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficerSettings {
    pub username: String,
    pub password: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
            codes: CodeSettings::default(),
            rate_limit: RateLimitSettings::default(),
            attempts: AttemptSettings::default(),
            event: EventSettings::default(),
            officers: None,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data"),
        }
    }
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            countdown_period_secs: 60,
            talk_countdown_secs: None,
            heartbeat_secs: 90,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 120,
        }
    }
}

impl Default for AttemptSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 5 * 60,
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            officers_name: "ACM Officers".to_string(),
            register_only: false,
            seed_labs: Vec::new(),
            session_ttl_secs: 60 * 60 * 12,
        }
    }
}

impl CodeSettings {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

impl Settings {
    /// Layered sources: defaults, `config/default.toml`, `config.toml`, then the environment
    pub fn figment() -> Figment {
        Self::figment_with(Path::new("config.toml"))
    }

    /// Same layering with an explicit top-level config file
    pub fn figment_with(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Toml::file(path))
            .merge(Env::prefixed("LABPASS_").split("__"))
            .merge(legacy_env())
    }

    /// Load and validate settings from the default locations
    pub fn load() -> Result<Self, AppError> {
        Self::from_figment(Self::figment())
    }

    /// Load and validate settings with `path` as the top-level config file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        Self::from_figment(Self::figment_with(path.as_ref()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, AppError> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server must not start with
    pub fn validate(&self) -> Result<(), AppError> {
        let codes = &self.codes;
        if codes.countdown_period_secs == 0 {
            return Err(AppError::Configuration(
                "countdown_period_secs must be greater than zero".to_string(),
            ));
        }
        if codes.heartbeat_secs <= codes.countdown_period_secs {
            return Err(AppError::Configuration(format!(
                "heartbeat_secs ({}) must be greater than countdown_period_secs ({})",
                codes.heartbeat_secs, codes.countdown_period_secs
            )));
        }
        if codes.talk_countdown_secs == Some(0) {
            return Err(AppError::Configuration(
                "talk_countdown_secs must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(AppError::Configuration(
                "rate_limit window and max_requests must be greater than zero".to_string(),
            ));
        }
        if self.attempts.max_attempts == 0 {
            return Err(AppError::Configuration(
                "attempts.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.event.officers_name.trim().is_empty() {
            return Err(AppError::Configuration(
                "event.officers_name must not be empty".to_string(),
            ));
        }
        if self.event.session_ttl_secs == 0 {
            return Err(AppError::Configuration(
                "event.session_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(AppError::Configuration(format!(
                "unknown log_level {}",
                self.log_level
            )));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| AppError::Configuration(format!("invalid bind address: {e}")))
    }
}

/// Variable names used by earlier deployments of the event app
fn legacy_env() -> Env {
    Env::raw()
        .only(&["COUNTDOWN", "TALK_COUNTDOWN", "LAB_HEARTBEAT", "REGISTER_ONLY"])
        .map(|key| {
            if key == "COUNTDOWN" {
                "codes.countdown_period_secs".into()
            } else if key == "TALK_COUNTDOWN" {
                "codes.talk_countdown_secs".into()
            } else if key == "LAB_HEARTBEAT" {
                "codes.heartbeat_secs".into()
            } else if key == "REGISTER_ONLY" {
                "event.register_only".into()
            } else {
                key.into()
            }
        })
}
