pub mod cache;
pub mod pages;
pub mod site;
pub mod templates;

pub use cache::PageCache;
pub use pages::{is_valid_slug, PageService};
pub use site::normalize_path;
pub use templates::{markdown_to_html, SiteTemplates};
