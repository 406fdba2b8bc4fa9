//! Shared helpers for graphweave integration tests.

pub mod db;
pub mod fixtures;

pub use db::TestDb;
pub use fixtures::{load_fixture, load_json_fixture};
