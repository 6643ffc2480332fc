// Declare all our modules
mod aggregator;
mod client;
mod config;
mod error;
mod models;
pub mod digest;
pub mod parsers;
pub mod reconciler;
pub mod relevance;
pub mod store;

// Publicly export the parts of our library that users will need
pub use aggregator::request_data;
pub use client::{LmsClient, Page, PageSource};
pub use config::Config;
pub use error::{Result, ScraperError};
pub use models::*; // CourseRef, Vod, Assign, Quiz and the per-page records
pub use reconciler::{Activation, Reconciler, RefreshPolicy, RefreshReport};
pub use store::{FileStore, MemoryStore, Storage};
