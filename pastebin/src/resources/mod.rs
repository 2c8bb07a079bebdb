//! Resource implementations

pub mod paste;

pub use paste::PasteResource;
