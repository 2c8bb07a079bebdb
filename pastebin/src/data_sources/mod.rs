//! Data source implementations

pub mod paste;

pub use paste::PasteDataSource;
