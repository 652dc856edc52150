//! Conversation types shared by the provider, engine and agent layers.

pub mod content;
pub mod messages;

pub use content::*;
pub use messages::*;
