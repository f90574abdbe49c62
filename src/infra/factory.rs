use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::domain::ports::{Clock, Notifier};
use crate::error::AppError;
use crate::infra::clock::SystemClock;
use crate::infra::notify::{http_notifier::HttpNotifier, log_notifier::LogNotifier};
use crate::infra::repositories::{
    postgres_event_repo::PostgresEventRepo, postgres_password_reset_repo::PostgresPasswordResetRepo,
    postgres_registration_repo::PostgresRegistrationRepo, postgres_user_repo::PostgresUserRepo,
    sqlite_event_repo::SqliteEventRepo, sqlite_password_reset_repo::SqlitePasswordResetRepo,
    sqlite_registration_repo::SqliteRegistrationRepo, sqlite_user_repo::SqliteUserRepo,
};
use crate::state::{AppState, Repositories};

pub async fn bootstrap_state(config: &Config) -> Result<AppState, AppError> {
    let notifier: Arc<dyn Notifier> = match &config.mail_service_url {
        Some(url) => {
            info!("Notifications will be relayed to {}", url);
            Arc::new(HttpNotifier::new(url.clone(), config.mail_service_token.clone()))
        }
        None => Arc::new(LogNotifier),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let database_url = &config.database_url;
    let repositories = if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        let pool = connect_postgres(database_url).await?;
        postgres_repositories(pool)
    } else {
        let pool = connect_sqlite(database_url).await?;
        sqlite_repositories(pool)
    };

    Ok(AppState::new(config.clone(), repositories, clock, notifier))
}

pub async fn connect_postgres(database_url: &str) -> Result<PgPool, AppError> {
    info!("Initializing PostgreSQL connection...");

    let opts: PgConnectOptions = database_url.parse().map_err(AppError::Database)?;
    let opts = opts.log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(opts)
        .await
        .map_err(AppError::Database)?;

    sqlx::migrate!("./migrations/postgres")
        .run(&pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("Postgres migrations failed: {}", e)))?;

    Ok(pool)
}

pub async fn connect_sqlite(database_url: &str) -> Result<SqlitePool, AppError> {
    info!("Initializing SQLite connection with WAL Mode...");

    let opts = SqliteConnectOptions::from_str(database_url)
        .map_err(AppError::Database)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .map_err(AppError::Database)?;

    sqlx::migrate!("./migrations/sqlite")
        .run(&pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("SQLite migrations failed: {}", e)))?;

    Ok(pool)
}

pub fn sqlite_repositories(pool: SqlitePool) -> Repositories {
    Repositories {
        users: Arc::new(SqliteUserRepo::new(pool.clone())),
        events: Arc::new(SqliteEventRepo::new(pool.clone())),
        registrations: Arc::new(SqliteRegistrationRepo::new(pool.clone())),
        password_resets: Arc::new(SqlitePasswordResetRepo::new(pool)),
    }
}

pub fn postgres_repositories(pool: PgPool) -> Repositories {
    Repositories {
        users: Arc::new(PostgresUserRepo::new(pool.clone())),
        events: Arc::new(PostgresEventRepo::new(pool.clone())),
        registrations: Arc::new(PostgresRegistrationRepo::new(pool.clone())),
        password_resets: Arc::new(PostgresPasswordResetRepo::new(pool)),
    }
}
