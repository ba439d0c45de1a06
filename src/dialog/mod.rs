//! 对话层：一次 ask 的提示词、工具调用识别、编排与调试事件记录

pub mod events;
pub mod logger;
pub mod orchestrator;
pub mod parser;
pub mod prompt;

pub use events::{DebugEvent, EventKind};
pub use logger::InteractionLogger;
pub use orchestrator::{AskOutcome, DialogOrchestrator, FAILURE_RESPONSE};
pub use parser::{parse_reply, ParsedReply, ToolCall};
pub use prompt::PromptBuilder;
