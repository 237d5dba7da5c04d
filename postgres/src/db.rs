use config::shared::PgConnectionConfig;
use sqlx::{PgPool, postgres::PgPoolOptions};

/// Connect to the target database with a small connection pool.
pub async fn connect_to_target_database(
    config: &PgConnectionConfig,
    min_connections: u32,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .min_connections(min_connections)
        .max_connections(max_connections)
        .connect_with(config.connect_options())
        .await?;

    Ok(pool)
}
