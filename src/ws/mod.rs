pub mod actor;
pub mod dispatch;
pub mod writer;

pub use crate::core::*;

pub use actor::*;
pub use dispatch::*;
pub use writer::*;
