//! Durable storage for purchase records.

mod memory;
mod pool;
mod purchases;
mod store;

pub use memory::*;
pub use pool::*;
pub use purchases::*;
pub use store::*;
