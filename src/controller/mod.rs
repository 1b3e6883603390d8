//! # Remote control surface.
//!
//! [`Controller`] is a cloneable handle that exposes `start`/`stop` of an
//! engine (or anything implementing [`Control`]) to an outer layer such as an
//! admin endpoint, without handing out the engine itself.

mod core;

pub use self::core::{Control, Controller};
