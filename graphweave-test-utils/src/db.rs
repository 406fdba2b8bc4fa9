use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Connection factory for test databases. Migrations are applied by the
/// caller so this crate does not depend on the engine itself.
pub struct TestDb {
    url: String,
}

impl TestDb {
    pub fn new_in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }

    pub fn new_file(path: impl Into<String>) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path.into()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
        // A single pooled connection keeps every query on the same in-memory database.
        let mut opt = ConnectOptions::new(self.url.clone());
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        Database::connect(opt).await
    }
}
