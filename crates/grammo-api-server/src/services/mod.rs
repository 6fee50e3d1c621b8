pub mod agent;
pub mod formatter;
pub mod prompt;
pub mod session;

pub use agent::{ChatModel, ConversationAgent, HostedChatModel};
pub use session::SessionRegistry;
