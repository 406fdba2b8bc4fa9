use graphweave_test_utils::TestDb;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

use crate::database::migrations::Migrator;

/// Migrated in-memory database for unit tests.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = TestDb::new_in_memory()
        .connect()
        .await
        .expect("connect to test database");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}
