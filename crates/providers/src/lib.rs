pub mod openai_compat;
pub mod test_client;
pub mod traits;
pub(crate) mod util;

pub use openai_compat::OpenAiCompatClient;
pub use test_client::TestModelClient;
pub use traits::{
    ModelClient, ModelMessage, ModelReply, ModelRequest, Role, ToolCallRequest, ToolSchema,
};
