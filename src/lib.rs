//! copilot-llm: GitHub Copilot completions for Rust.
//!
//! Two pieces do the work:
//!
//! - [`auth`] obtains and refreshes Copilot credentials: direct personal
//!   access tokens, the OAuth device-code flow, and token exchange with an
//!   expiry-aware cache shared between concurrent callers.
//! - [`bridge`] turns a push session's callbacks or an SSE response body into
//!   one cancellable stream of response fragments.
//!
//! [`generation::CopilotLlm`] ties them together.
//!
//! # Quick Start
//!
//! ```no_run
//! use copilot_llm::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> copilot_llm::error::Result<()> {
//! let llm = CopilotLlm::new(CopilotConfig::from_env())?;
//! let request = GenerationRequest::new(vec![ModelMessage::user("Hello!")]);
//! let result = llm.generate(request, CancellationToken::new()).await?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod bridge;
pub mod config;
pub mod error;
pub mod generation;
pub mod prelude;
pub mod provider;
pub mod types;
pub mod util;
