//! A burger-shop assistant built on a tool-calling language model.
//!
//! The crate wires a chat completion endpoint to two tools: a semantic price lookup over
//! a small menu knowledge base and a stub order-placement action. Every call to
//! [`Agent::respond`](agent::Agent::respond) turns one user message into one reply string
//! plus an optional observability trace id.
//!
//! # Quick Start
//!
//! ```no_run
//! use menu_agent::agent::Agent;
//! use menu_agent::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load(None)?;
//!     let agent = Agent::from_config(&config).await?;
//!
//!     let reply = agent.respond("How much is a Big Mac and please order one.").await?;
//!     println!("{}", reply.text);
//!     if let Some(trace_id) = reply.trace_id {
//!         println!("trace: {}", trace_id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Custom Tools
//!
//! Tools are plain functions turned into [`tools::Tool`] implementations by the
//! [`tool`] attribute:
//!
//! ```no_run
//! use menu_agent::tool;
//!
//! #[tool]
//! /// Report today's special.
//! async fn daily_special() -> Result<String, String> {
//!     Ok("Whopper: $6".to_string())
//! }
//! ```
//!
//! # Modules
//!
//! - [`knowledge`] embeds the menu once and answers nearest-neighbour queries
//! - [`tools`] defines the tool contract, the registry and the two menu tools
//! - [`llm`] talks to an OpenAI-compatible chat completion endpoint
//! - [`agent`] runs the tool-calling loop and extracts the final reply
//! - [`telemetry`] covers logging and trace export
//! - [`evaluation`] scores agent replies against fixed expectations

// lets `#[tool]` expansions name `menu_agent::tools` from inside this crate
extern crate self as menu_agent;

pub mod agent;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod knowledge;
pub mod llm;
pub mod telemetry;
pub mod tools;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::MenuAgentError;
pub use types::*;

pub use menu_agent_macros::tool;

pub type Result<T> = std::result::Result<T, MenuAgentError>;
