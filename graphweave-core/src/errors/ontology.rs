use thiserror::Error;

#[derive(Error, Debug)]
pub enum OntologyError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Ontology backend unavailable: {0}")]
    Unavailable(String),
}
