//! Deterministic in-memory `ModelClient` for tests: no network, scripted
//! replies, and a queryable call log.

use parking_lot::Mutex;

use ac_domain::error::Result;
use ac_domain::usage::Usage;

use crate::traits::{ModelClient, ModelReply, ModelRequest};

pub struct TestModelClient {
    id: String,
    scripted_replies: Mutex<Vec<ModelReply>>,
    calls: Mutex<Vec<ModelRequest>>,
}

impl TestModelClient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scripted_replies: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply to return on the next `complete` call, in FIFO order.
    /// Callers who enqueue nothing get a generic reply sized by `tokens`.
    pub fn push_reply(&self, reply: ModelReply) {
        self.scripted_replies.lock().push(reply);
    }

    pub fn push_text_reply(&self, content: impl Into<String>, input: u64, output: u64) {
        self.push_reply(ModelReply {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: Usage::new(input, output, 0, 0),
            model: "test-model".into(),
            finish_reason: Some("stop".into()),
        });
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl ModelClient for TestModelClient {
    async fn complete(&self, req: ModelRequest) -> Result<ModelReply> {
        self.calls.lock().push(req);
        let mut queue = self.scripted_replies.lock();
        if !queue.is_empty() {
            Ok(queue.remove(0))
        } else {
            Ok(ModelReply {
                content: String::new(),
                tool_calls: Vec::new(),
                usage: Usage::new(0, 0, 0, 0),
                model: "test-model".into(),
                finish_reason: Some("stop".into()),
            })
        }
    }

    fn client_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ModelRequest;

    #[tokio::test]
    async fn returns_scripted_replies_in_order() {
        let client = TestModelClient::new("test");
        client.push_text_reply("first", 10, 5);
        client.push_text_reply("second", 20, 8);

        let r1 = client.complete(ModelRequest::default()).await.unwrap();
        let r2 = client.complete(ModelRequest::default()).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_queue_returns_empty_reply() {
        let client = TestModelClient::new("test");
        let reply = client.complete(ModelRequest::default()).await.unwrap();
        assert_eq!(reply.content, "");
    }
}
