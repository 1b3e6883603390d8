//! # Warmer abstractions and registry.
//!
//! This module provides the warmer-related types:
//! - [`Warmer`] - trait implemented by pluggable warm-up units (`init` + `next`)
//! - [`WarmerRegistry`] - maps config classes to warmer factories
//! - [`EchoWarmer`] - built-in warmer that logs a configured text
//! - `HttpWarmer` - built-in warmer that issues HTTP requests (feature `http`)

mod echo;
#[cfg(feature = "http")]
mod http;
mod registry;
mod warmer;

pub use echo::EchoWarmer;
#[cfg(feature = "http")]
pub use http::HttpWarmer;
pub use registry::{BuiltWarmer, WarmerRegistry};
pub use warmer::Warmer;
