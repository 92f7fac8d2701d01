pub mod activity;
pub mod ads;
pub mod brands;
pub mod error;
pub mod runs;
pub mod stats;

pub use ads::AdStore;
pub use error::{Result, StoreError};
pub use runs::{RunProgress, RunStore};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect a small pool. Transactions here are short (one upsert batch is
/// at most 50 rows), so a handful of connections is plenty.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
