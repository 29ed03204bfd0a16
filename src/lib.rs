pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod service;

pub use config::AppConfig;
pub use error::ExtractError;
pub use models::{Product, QuantityMeasure, Receipt, Store};
pub use service::ReceiptExtractor;
