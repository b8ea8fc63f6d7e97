pub mod classify;
pub mod client;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod render;
pub mod snapshot;

pub use classify::classify;
pub use client::{HttpPage, HttpRenderer};
pub use error::ScraperError;
pub use extract::{extract, extract_fields};
pub use normalize::{is_high_price, normalize_price, resolve_price};
pub use render::{Element, Page, Renderer};
pub use snapshot::{capture_snapshot, READY_SELECTORS};
