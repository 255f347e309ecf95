//! The huddle session engine: in-memory registries of live meetings and streams,
//! and the admission policy that guards stream hosting capacity.
//!
//! Nothing in here performs I/O, every lock is held only for map updates.

mod admission;
mod config;
mod registry;
mod session;
mod util;

pub use admission::*;
pub use config::*;
pub use registry::*;
pub use session::*;
pub use util::*;
