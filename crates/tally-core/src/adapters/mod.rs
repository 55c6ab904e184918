//! Per-exchange adapter implementations.

mod bitmex;

pub use bitmex::BitmexAdapter;
