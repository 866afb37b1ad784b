//! Pure data structures shared by every pipeline component.

pub mod event;
pub mod message;
pub mod order;
pub mod subscription;

pub use event::*;
pub use message::*;
pub use order::*;
pub use subscription::*;
