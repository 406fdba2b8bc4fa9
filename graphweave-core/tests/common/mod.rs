#![allow(dead_code)]

use graphweave::database::migrations::Migrator;
use graphweave::domain::{DataType, KeyKind, OntologyKey};
use graphweave::ontology::DatabaseOntology;
use graphweave_test_utils::TestDb;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

pub async fn setup_db() -> DatabaseConnection {
    let db = TestDb::new_in_memory()
        .connect()
        .await
        .expect("connect to test database");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

/// Metatype keys for cars and manufacturers from `car_maintenance.json`.
pub async fn seed_car_ontology(db: &DatabaseConnection) {
    let ontology = DatabaseOntology::new(db.clone());
    let keys = [
        ("car", OntologyKey::new("car_id", "id", DataType::String, true)),
        ("car", OntologyKey::new("car_name", "name", DataType::String, false)),
        ("car", OntologyKey::new("vin", "vin", DataType::String, true)),
        (
            "manufacturer",
            OntologyKey::new("manufacturer_id", "id", DataType::String, true),
        ),
        (
            "manufacturer",
            OntologyKey::new("manufacturer_name", "name", DataType::String, false),
        ),
    ];
    for (metatype, key) in keys {
        ontology
            .save_key(KeyKind::Metatype, Some(metatype), &key)
            .await
            .expect("save ontology key");
    }
}
