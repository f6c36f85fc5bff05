pub mod ledger;
pub mod models;

pub mod queries {
    pub mod runs;
}

pub use ledger::{MemoryLedger, PgLedger, RunLedger};

/// Apply the embedded schema migrations.
pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
