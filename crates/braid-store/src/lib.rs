pub mod database;
pub mod error;
pub mod messages;
pub mod objects;
pub mod row_helpers;
pub mod schema;
pub mod threads;
pub mod track;

pub use database::Database;
pub use error::StoreError;
pub use track::Track;
