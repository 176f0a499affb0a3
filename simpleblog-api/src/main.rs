use crate::{
    logging::{SuppressMessages, install_tracing},
    mail::{MailError, SmtpMailer, SmtpSettings},
    server::{ServerState, Settings},
};
use secrecy::SecretString;
use serde::Deserialize;
use simpleblog_common::{
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};
use simpleblog_db::client::{DbClient, MIGRATOR};
use sqlx::{migrate::MigrateError, postgres::PgPoolOptions};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use time::Duration;
use tracing::{debug, info, warn};

mod logging;
mod mail;
mod server;
mod service;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error connecting to the database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Error running migrations: {0}")]
    Migrate(#[from] MigrateError),
    #[error("Error setting up mail transport: {0}")]
    Mail(#[from] MailError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Debug, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    worker_id: WorkerId,
    process_id: ProcessId,
    public_base_url: String,
    smtp_host: String,
    #[serde(default = "default_smtp_port")]
    smtp_port: u16,
    smtp_username: String,
    smtp_password: SecretString,
    email_from: String,
    #[serde(default = "default_auth_token_lifetime_hours")]
    auth_token_lifetime_hours: i64,
    /// Comma separated message fragments that are never logged.
    #[serde(default)]
    log_suppress: String,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_smtp_port() -> u16 {
    587
}

fn default_auth_token_lifetime_hours() -> i64 {
    720
}

impl Env {
    fn settings(&self) -> Settings {
        Settings {
            public_base_url: self.public_base_url.trim_end_matches('/').to_owned(),
            auth_token_lifetime: PositiveDuration::new(Duration::hours(
                self.auth_token_lifetime_hours,
            )),
        }
    }

    fn into_smtp_settings(self) -> SmtpSettings {
        SmtpSettings {
            host: self.smtp_host,
            port: self.smtp_port,
            username: self.smtp_username,
            password: self.smtp_password,
            from: self.email_from,
        }
    }
}

/// Loads `.env` before tracing exists, so the outcome is returned for
/// logging afterwards.
fn load_dotenv() -> Result<bool, InitError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "Could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(%err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    let dotenv_found = load_dotenv()?;
    let env: Env = envy::from_env()?;

    install_tracing(SuppressMessages::from_list(&env.log_suppress));
    if dotenv_found {
        debug!("Loaded .env file");
    } else {
        debug!("No .env file found");
    }

    let pool = PgPoolOptions::new()
        .max_connections(env.database_max_connections)
        .connect(&env.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;
    info!("Database migrations applied");

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let store = DbClient::new(pool.clone(), env.worker_id, env.process_id);
    let settings = env.settings();
    let mailer = SmtpMailer::new(&env.into_smtp_settings())?;

    let state = ServerState {
        store: Arc::new(store),
        mailer: Arc::new(mailer),
        settings: Arc::new(settings),
    };
    let app = server::app(state);

    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    pool.close().await;
    Ok(())
}
