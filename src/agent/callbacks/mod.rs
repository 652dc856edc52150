//! Callbacks for observing engine runs: model calls, tool executions, completion and
//! errors. Handler failures are logged by the engine and never change the reply.

pub mod error;
pub mod events;
pub mod handlers;
pub mod traits;

pub use error::CallbackError;
pub use events::{CallbackEvent, ToolEvent};
pub use handlers::{
    CompositeCallbackHandler, NullCallbackHandler, PrintingCallbackHandler, PrintingConfig,
};
pub use traits::CallbackHandler;
