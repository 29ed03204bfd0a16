pub mod receipt;

pub use receipt::{parse_receipt_datetime, Product, QuantityMeasure, Receipt, Store};
