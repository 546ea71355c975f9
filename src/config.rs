use clap::Parser;
use std::path::PathBuf;

const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_GROUPS_LIMIT: usize = 100;
const DEFAULT_CONNS_LIMIT: usize = 1000;

/// Multiplayer arcade snake server.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    /// Address to serve on.
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Terminate TLS in-process.
    #[arg(long)]
    pub tls_enable: bool,

    /// Path to the certificate file.
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to the key file.
    #[arg(long)]
    pub tls_key: Option<PathBuf>,

    /// Maximum number of simultaneous game groups.
    #[arg(long, default_value_t = DEFAULT_GROUPS_LIMIT)]
    pub groups_limit: usize,

    /// Host-wide cap on the summed capacity of all groups.
    #[arg(long, default_value_t = DEFAULT_CONNS_LIMIT)]
    pub conns_limit: usize,

    /// Seed for random placement; defaults to entropy.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,

    /// Log level: trace, debug, info, warn or error.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
