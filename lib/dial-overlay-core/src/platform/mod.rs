pub use common::*;
pub use listener_scope::*;
pub use traits::*;

mod common;
mod listener_scope;
pub mod memory;
mod traits;
