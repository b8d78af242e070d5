//! `adtc` entry point.
//!
//! The composition root: parses arguments, installs the `tracing`
//! subscriber, builds a [`SessionConfig`] and an [`AdtClient`] over the HTTP
//! transport, and runs one command against it.

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use http_transport::HttpTransportConfig;
use protocol::RequestOptions;
use serde::Serialize;
use session::{AdtClient, SessionConfig};
use tracing::debug;

use crate::cli::{Cli, Command, Connection};

#[derive(Debug, Serialize)]
struct SessionSummary {
    logged_in: bool,
    stateful: bool,
    session_id: Option<String>,
    instance: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_json);

    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = connect(&cli.connection)?;
    if cli.connection.stateful {
        client.set_stateful(true)?;
    }

    match cli.command {
        Command::Session => {
            client.login().await?;
            let summary = SessionSummary {
                logged_in: client.is_logged_in(),
                stateful: client.is_stateful(),
                session_id: client.session_id(),
                instance: client.engine().instance_id().to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Discovery => println!("{}", client.discovery().await?),
        Command::Get { path } => {
            let response = client.request(&path, RequestOptions::get()).await?;
            println!("{}", response.body);
        }
        Command::Ticket => println!("{}", client.reentrance_ticket().await?),
        Command::Logout => {
            client.login().await?;
            client.logout().await?;
            println!("logged out");
        }
    }

    if client.is_logged_in() && client.is_stateful() {
        client
            .drop_session()
            .await
            .context("releasing the stateful session")?;
    }
    Ok(())
}

fn connect(connection: &Connection) -> Result<AdtClient> {
    let url = connection
        .url
        .as_deref()
        .context("no server address: pass --url or set ADT_URL")?;
    let user = connection
        .user
        .as_deref()
        .context("no user: pass --user or set ADT_USER")?;
    let password = connection
        .password
        .as_deref()
        .context("no password: pass --password or set ADT_PASSWORD")?;

    let mut http = HttpTransportConfig {
        accept_invalid_certs: connection.insecure,
        ..HttpTransportConfig::default()
    };
    if let Some(path) = &connection.ca_cert {
        let pem = std::fs::read(path)
            .with_context(|| format!("reading certificate {}", path.display()))?;
        http.root_certificates.push(pem);
    }

    let mut builder = SessionConfig::builder(url, user)
        .password(password)
        .keep_alive(connection.keep_alive)
        .http(http);
    if let Some(client) = &connection.client {
        builder = builder.client(client);
    }
    if let Some(language) = &connection.language {
        builder = builder.language(language);
    }
    if let Some(timeout) = connection.timeout {
        builder = builder.timeout(timeout);
    }

    let client = AdtClient::new(builder.build()?)?;
    debug!(client = ?client, "client ready");
    Ok(client)
}
