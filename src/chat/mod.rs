pub mod message;
pub mod orchestrator;

pub use message::{Message, MessageSource, MessageType, Transcript, TYPING_INDICATOR_ID};
pub use orchestrator::{classify, ChatOrchestrator, Route};
