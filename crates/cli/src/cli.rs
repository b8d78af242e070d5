//! Command-line definition.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "adtc")]
#[command(about = "Talk to an ADT server through a managed session")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv every call, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(flatten)]
    pub connection: Connection,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct Connection {
    /// Base address, e.g. https://dev.example.com:44300
    #[arg(long, env = "ADT_URL", global = true)]
    pub url: Option<String>,

    #[arg(long, env = "ADT_USER", global = true)]
    pub user: Option<String>,

    #[arg(long, env = "ADT_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// System client (sap-client)
    #[arg(long, env = "ADT_CLIENT", global = true)]
    pub client: Option<String>,

    /// Logon language (sap-language)
    #[arg(long, env = "ADT_LANGUAGE", global = true)]
    pub language: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Extra trusted root certificate (PEM)
    #[arg(long, value_name = "FILE", global = true)]
    pub ca_cert: Option<PathBuf>,

    /// Per-call timeout in seconds
    #[arg(long, value_name = "SECS", global = true, value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// Use a stateful session
    #[arg(long, global = true)]
    pub stateful: bool,

    /// Ping the server while idle
    #[arg(long, global = true)]
    pub keep_alive: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and print a JSON summary of the session
    Session,

    /// Print the discovery document
    Discovery,

    /// GET a path and print the body
    Get {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Print a reentrance ticket
    Ticket,

    /// Log in, then log out again
    Logout,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| format!("invalid number of seconds: {e}"))
}
