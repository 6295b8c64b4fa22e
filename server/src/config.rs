use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// sport2meet backend server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "sport2meet-server", version, about = "sport2meet backend server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "SPORT2MEET_PORT", default_value = "3000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "SPORT2MEET_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./sport2meet.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "SPORT2MEET_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys)
    #[arg(long, env = "SPORT2MEET_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Access token lifetime in days
    #[arg(long, env = "SPORT2MEET_TOKEN_TTL_DAYS", default_value = "7")]
    pub token_ttl_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            config: "./sport2meet.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            token_ttl_days: 7,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (SPORT2MEET_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("SPORT2MEET_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# sport2meet Server Configuration
# Place this file at ./sport2meet.toml or specify with --config <path>
# All settings can be overridden via environment variables (SPORT2MEET_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for SQLite database and JWT signing key
# data_dir = "./data"

# Access token lifetime in days (default: 7)
# token_ttl_days = 7
"#
    .to_string()
}
