//! Request and response bodies of the draft API.
//!
//! Field names are camelCase to match the form frontend.

mod draft;
mod form;

pub use draft::*;
pub use form::*;
