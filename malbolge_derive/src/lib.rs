//! Derive macros for the malbolge crate.
//!
//! Provides:
//! - `#[derive(Error)]` - error type boilerplate (thiserror replacement)

mod error;

use proc_macro::TokenStream;

/// Automatically implements `Display` and `Error` traits for error enums.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
