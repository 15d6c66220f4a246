use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Proposal-authoring server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "proposal-server", version, about = "Collaborative proposal-authoring server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PROPOSAL_PORT", default_value = "8000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "PROPOSAL_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./proposal.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PROPOSAL_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys)
    #[arg(long, env = "PROPOSAL_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Access token lifetime in minutes
    #[arg(long, env = "PROPOSAL_TOKEN_EXPIRE_MINUTES", default_value = "480")]
    pub token_expire_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            config: "./proposal.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            token_expire_minutes: 480,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PROPOSAL_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("PROPOSAL_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Proposal Server Configuration
# Place this file at ./proposal.toml or specify with --config <path>
# All settings can be overridden via environment variables (PROPOSAL_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8000)
# port = 8000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for SQLite database and JWT signing key
# data_dir = "./data"

# Access token lifetime in minutes (default: 480 = one working day)
# token_expire_minutes = 480
"#
    .to_string()
}
