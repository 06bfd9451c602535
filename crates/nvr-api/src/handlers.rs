//! Request handlers.

pub mod cameras;
pub mod config;
pub mod health;
pub mod stream;

pub use cameras::*;
pub use config::*;
pub use health::*;
pub use stream::*;
