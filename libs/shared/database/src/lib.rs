pub mod error;
pub mod table;

pub use error::DbError;
pub use table::{Record, Table};
