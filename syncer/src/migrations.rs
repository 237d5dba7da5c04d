use config::shared::PgConnectionConfig;
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;

const NUM_POOL_CONNECTIONS: u32 = 1;

/// Runs the sync log migrations against the target database.
///
/// The migrations create the `sync` schema with the `sync_log` table and its enum types.
pub async fn migrate_sync_log(config: &PgConnectionConfig) -> Result<(), sqlx::Error> {
    let options = config.connect_options().application_name("syncer_migrator");

    let pool = PgPoolOptions::new()
        .max_connections(NUM_POOL_CONNECTIONS)
        .min_connections(NUM_POOL_CONNECTIONS)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("create schema if not exists sync;").await?;
                // The `_sqlx_migrations` bookkeeping table is created in the first schema of the
                // search path, which must not be the schema holding synchronized tables.
                conn.execute("set search_path = 'sync';").await?;

                Ok(())
            })
        })
        .connect_with(options)
        .await?;

    let migrator = sqlx::migrate!("./migrations");
    migrator.run(&pool).await?;

    pool.close().await;

    Ok(())
}
