pub mod listing;
pub mod product;
pub mod runner;
pub mod spider;

pub use listing::ListingSpider;
pub use product::ProductSpider;
pub use spider::Spider;
