pub mod client;
pub mod crypto;
pub mod error;
pub mod paste;

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
pub(crate) mod test_helpers;

pub use client::{Client, ClientConfig};
pub use crypto::CompressionAlgorithm;
pub use error::ApiError;
pub use paste::{
    CreatePasteOptions, CreatePasteResult, PasteData, ShowPasteOptions, ShowPasteResult,
};
