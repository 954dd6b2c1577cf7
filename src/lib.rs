//! Tandem: session and agent execution engine for tool-calling generation.
//!
//! A [`session::Session`] owns a conversation, its tools and configuration,
//! and runs one generate cycle at a time against a [`transport::Transport`].
//! An [`agent::Agent`] wraps a session in an iteration-bounded loop that
//! executes requested tools and can delegate to, or hand off to, other
//! agents.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem::prelude::*;
//!
//! # async fn example(transport: Arc<dyn Transport>) -> tandem::error::Result<()> {
//! let agent = Agent::new(transport, AgentSettings::named("assistant"));
//! agent
//!     .session()
//!     .add_tool(ToolDescriptor::new(
//!         "get_time",
//!         "Current UTC time",
//!         ParameterShape::empty(),
//!         |_args, _ctx| async { Ok(serde_json::json!(chrono::Utc::now().to_rfc3339())) },
//!     ))
//!     .await;
//! let result = agent.prompt("What time is it?", PromptHandlers::new()).await?;
//! println!("{}", result.final_text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod scheduler;
pub mod schema;
pub mod session;
pub mod stream;
pub mod tools;
pub mod transport;
pub mod types;
pub mod util;

#[cfg(feature = "agent")]
pub mod agent;
