#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]
// The CLI prints its results.
#![allow(clippy::print_stdout)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use courier::adapters::database::{self, message_repo::PgMessageStore};
use courier::adapters::memory::{InMemoryDirectory, RealmFixture};
use courier::config::Config;
use courier::domain::payload::SendMessagePayload;
use courier::domain::search::MessageDto;
use courier::domain::sender::SenderSettings;
use courier::services::message_service::RequestContext;
use courier::{AppBuilder, telemetry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Compose and deliver localized, encrypted messages")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a message described by a JSON payload
    Send {
        /// Realm fixture with senders, templates, users and dictionaries
        #[arg(long)]
        fixture: PathBuf,
        /// SendMessagePayload JSON
        #[arg(long)]
        payload: PathBuf,
        /// Actor recorded on the messages
        #[arg(long)]
        actor: Option<Uuid>,
    },
    /// Print a stored message with its content decrypted
    Read {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        id: Uuid,
        /// Show the message as it was at this version
        #[arg(long)]
        version: Option<i64>,
    },
    /// Encrypt provider settings JSON for a realm, for use in a fixture
    Encrypt {
        #[arg(long)]
        realm: Uuid,
        /// Settings JSON, e.g. {"provider":"SendGridEmail","apiKey":"..."}
        #[arg(long)]
        settings: String,
    },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry_guard = telemetry::init_telemetry(&cli.config.telemetry)?;

    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }

    telemetry_guard.shutdown();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config;

    match cli.command {
        Command::Encrypt { realm, settings } => {
            let settings: SenderSettings = serde_json::from_str(&settings).context("parsing settings")?;
            let app = AppBuilder::new(config).with_directory(Arc::new(InMemoryDirectory::default())).build()?;
            let encrypted = app.crypto_service.encrypt_settings(&settings, realm)?;
            println!("{}", encrypted.as_str());
        }
        Command::Send { fixture, payload, actor } => {
            let fixture: RealmFixture = read_json(&fixture)?;
            let payload: SendMessagePayload = read_json(&payload)?;
            let realm_id = fixture.realm_id;

            let mut builder = AppBuilder::new(config.clone()).with_directory(Arc::new(InMemoryDirectory::from_fixture(fixture)));
            if config.database.url.is_some() {
                let pool = database::init_pool(&config.database).await?;
                database::run_migrations(&pool).await?;
                builder = builder.with_message_store(Arc::new(PgMessageStore::new(pool)));
            }
            let app = builder.build()?;

            let cancellation = CancellationToken::new();
            let on_signal = cancellation.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, finishing in-flight sends");
                    on_signal.cancel();
                }
            });

            let ctx = RequestContext::new(realm_id, actor.unwrap_or_else(Uuid::nil)).with_cancellation(cancellation);
            let sent = app.message_service.send_message(&ctx, payload).await?;
            println!("{}", serde_json::to_string_pretty(&sent)?);
        }
        Command::Read { fixture, id, version } => {
            anyhow::ensure!(config.database.url.is_some(), "reading a message requires --database-url");
            let fixture: RealmFixture = read_json(&fixture)?;
            let realm_id = fixture.realm_id;

            let pool = database::init_pool(&config.database).await?;
            database::run_migrations(&pool).await?;
            let app = AppBuilder::new(config)
                .with_directory(Arc::new(InMemoryDirectory::from_fixture(fixture)))
                .with_message_store(Arc::new(PgMessageStore::new(pool)))
                .build()?;

            let message = app
                .message_service
                .load_message(realm_id, id, version)
                .await?
                .with_context(|| format!("message {id} not found"))?;
            let dto = app.message_service.decrypt_message(MessageDto::from(&message))?;
            println!("{}", serde_json::to_string_pretty(&dto)?);
        }
    }

    Ok(())
}
