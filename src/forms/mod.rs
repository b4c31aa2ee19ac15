//! Form hydration: controllers and the session registry serving the API.

mod controller;
mod sessions;

pub use controller::*;
pub use sessions::*;
