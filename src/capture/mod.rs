pub mod render;
pub mod warc;
pub mod worker;

pub use render::PageRenderer;
pub use worker::capture_site;
