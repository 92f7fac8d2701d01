pub mod batch;
pub mod cache;
pub mod google;
pub mod http;
pub mod meta;
pub mod meta_api;
pub mod serpapi;
pub mod tiktok;
pub mod traits;

pub use batch::{BatchBuffer, BATCH_SIZE};
pub use google::GoogleScraper;
pub use meta::MetaScraper;
pub use meta_api::MetaApiScraper;
pub use serpapi::SerpApiScraper;
pub use tiktok::TikTokScraper;
pub use traits::{AdScraper, BatchSink, ScrapeOptions};
