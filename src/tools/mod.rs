//! 工具层：HTTP 工具执行器、占位符模板、调用接口与调试轨迹

pub mod http;
pub mod invoker;
pub mod template;

pub use http::{HttpToolInvoker, PreparedRequest};
pub use invoker::{RequestTrace, ResponseTrace, ToolInvoker, ToolOutcome, ToolTrace};
