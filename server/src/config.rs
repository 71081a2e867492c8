use chrono::FixedOffset;
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Command-line flags. Every field is optional so that an absent flag never
/// shadows a value coming from the TOML file or the environment.
#[derive(Parser, Serialize, Debug, Default)]
#[command(name = "cohort-server", version, about = "Cohort community site server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "COHORT_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long, env = "COHORT_BIND_ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,

    /// Enable structured JSON logging
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "COHORT_DATA_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// JSON roster of users and projects loaded at startup
    #[arg(long, env = "COHORT_ROSTER_FILE")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roster_file: Option<String>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub config: String,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default)]
    pub generate_config: bool,
    pub data_dir: String,
    #[serde(default)]
    pub roster_file: Option<String>,

    /// Chat room behaviour (loaded from [chat] section in TOML)
    #[serde(default)]
    pub chat: ChatConfig,

    /// Login settings (loaded from [auth] section in TOML)
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Configuration for the broadcast chat room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Number of stored messages replayed to a new connection (default: 100)
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Reference UTC offset for chat and status timestamps (default: "+09:00")
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// Broadcast a greeting when someone joins (default: false)
    #[serde(default)]
    pub announce_joins: bool,

    /// Still broadcast a chat line whose insert failed (default: true)
    #[serde(default = "default_true")]
    pub broadcast_on_store_failure: bool,

    /// Seconds between server pings; 0 disables keepalive (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            utc_offset: default_utc_offset(),
            announce_joins: false,
            broadcast_on_store_failure: true,
            ping_interval_secs: default_ping_interval(),
        }
    }
}

impl ChatConfig {
    /// Parse `utc_offset` into a chrono offset.
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Configuration for the answer-gated login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expected answers for week 1 through week 4, in order
    #[serde(default = "default_answers")]
    pub answers: Vec<String>,

    /// Access token lifetime in hours (default: 6)
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            answers: default_answers(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

fn default_history_limit() -> u32 {
    100
}

fn default_utc_offset() -> String {
    "+09:00".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ping_interval() -> u64 {
    30
}

fn default_answers() -> Vec<String> {
    ["화채", "2주답", "3주답", "4주답"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_token_ttl_hours() -> i64 {
    6
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            config: "./cohort.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            roster_file: None,
            chat: ChatConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),
    #[error("invalid utc_offset {0:?}: expected +HH:MM, -HH:MM or Z")]
    InvalidOffset(String),
    #[error("auth.answers must hold exactly 4 entries, got {0}")]
    AnswerCount(usize),
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (COHORT_*) < CLI args
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Cli::parse())
    }

    pub fn load_from(cli: Cli) -> Result<Self, ConfigError> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| Config::default().config);

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("COHORT_").split("__"))
            .merge(Serialized::defaults(cli))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.chat.offset()?;
        if self.auth.answers.len() != 4 {
            return Err(ConfigError::AnswerCount(self.auth.answers.len()));
        }
        Ok(())
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM` or `Z`/`UTC` into a fixed offset.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || ConfigError::InvalidOffset(raw.to_string());
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Cohort Server Configuration
# Place this file at ./cohort.toml or specify with --config <path>
# All settings can be overridden via environment variables (COHORT_PORT,
# COHORT_CHAT__HISTORY_LIMIT, etc.) or CLI flags (--port, etc.)

# Server port (default: 8000)
# port = 8000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging
# json_logs = false

# Data directory for the SQLite database and token signing key
# data_dir = "./data"

# JSON roster of members and gallery projects, loaded on every boot
# (existing rows are left untouched)
# roster_file = "./roster.json"

# ---- Chat Room ----
# [chat]

# Stored messages replayed to each new connection (default: 100)
# history_limit = 100

# Reference offset for chat and status timestamps (default: +09:00)
# utc_offset = "+09:00"

# Greet each newcomer in the room (default: false)
# announce_joins = false

# Broadcast a line even when storing it failed (default: true)
# broadcast_on_store_failure = true

# Server ping interval in seconds, 0 disables (default: 30)
# ping_interval_secs = 30

# ---- Login ----
# [auth]

# Answers for week 1..4, all four must match
# answers = ["화채", "2주답", "3주답", "4주답"]

# Access token lifetime in hours (default: 6)
# token_ttl_hours = 6
"#
    .to_string()
}
