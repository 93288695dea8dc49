//! Request handlers for queue reconciliation.

mod context;
mod sync;

pub use context::*;
pub use sync::*;
