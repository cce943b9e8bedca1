pub mod category_loader;

pub use category_loader::{category_from_url, dedup_preserving_order, load_categories};
