//! Model side: wire types, the provider seam, system framing and the conversation driver.

mod conversation;
mod prompt;
mod provider;
mod types;

pub use conversation::Conversation;
pub use provider::{AnthropicProvider, ModelProvider};
