use crate::error::DbError;
use configuration::DatabaseSettings;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

/// Builds the connect options described by `settings`.
///
/// A full `url` wins over the discrete fields. A Cloud SQL instance name
/// replaces the host with the instance's unix socket directory. An explicit
/// `ssl_mode` applies to either form.
pub fn connect_options(settings: &DatabaseSettings) -> Result<PgConnectOptions, DbError> {
    let ssl_mode = settings
        .ssl_mode
        .as_deref()
        .map(|mode| {
            PgSslMode::from_str(mode).map_err(|e| {
                DbError::ConnectionConfigError(format!("ssl_mode '{mode}': {e}"))
            })
        })
        .transpose()?;

    let mut options = match &settings.url {
        Some(url) => PgConnectOptions::from_str(url)
            .map_err(|e| DbError::ConnectionConfigError(e.to_string()))?,
        None => {
            let options = PgConnectOptions::new()
                .port(settings.port)
                .database(&settings.name)
                .username(&settings.user)
                .password(&settings.password);
            match &settings.cloud_sql_connection_name {
                Some(instance) => options.socket(format!("/cloudsql/{instance}")),
                None => options.host(&settings.host),
            }
        }
    };

    if let Some(ssl_mode) = ssl_mode {
        options = options.ssl_mode(ssl_mode);
    }
    if let Some(root_cert) = &settings.ssl_root_cert {
        options = options.ssl_root_cert(root_cert);
    }

    Ok(options)
}

/// Establishes a connection pool to the PostgreSQL database.
///
/// Every repository call checks a connection out of this pool for the length
/// of one transaction and returns it when the call ends, however it ends.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, DbError> {
    let options = connect_options(settings)?;

    tracing::info!(
        host = options.get_host(),
        database = options.get_database().unwrap_or_default(),
        "Connecting to database."
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect_with(options)
        .await?;

    tracing::info!("Connected to database.");
    Ok(pool)
}

/// Applies the embedded migrations, creating the show and association tables
/// when they are missing.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database schema is up to date.");
    Ok(())
}
