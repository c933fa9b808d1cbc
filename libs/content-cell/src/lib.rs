pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::ContentError;
pub use models::*;
pub use router::{page_routes, site_routes};
pub use services::*;
