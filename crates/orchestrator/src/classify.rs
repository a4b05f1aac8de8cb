//! Message classification: a two-stage decision — first the message's
//! category, then (only for a brand new task) the workflow template it
//! starts.
//!
//! Grounded on the teacher's provider-routing shape (`sa_providers`'s
//! classification-as-a-pluggable-step), generalized from picking a model
//! tier by embedding distance to picking first a category, then (for
//! `new_task`) a `WorkflowTemplate`, by asking the model client directly —
//! no separate embedding index is warranted at this scale (five or six
//! labels per stage).

use ac_domain::config::WorkflowTemplate;
use ac_providers::{ModelClient, ModelMessage, ModelRequest, Role};

/// The six message categories an inbound message classifies into. Every
/// variant but `NewTask` routes to the already-active workflow for the
/// task instead of starting a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    Greeting,
    StatusQuery,
    Refinement,
    Cancellation,
    NewTask,
    Smalltalk,
}

impl MessageCategory {
    const ALL: [MessageCategory; 6] = [
        MessageCategory::Greeting,
        MessageCategory::StatusQuery,
        MessageCategory::Refinement,
        MessageCategory::Cancellation,
        MessageCategory::NewTask,
        MessageCategory::Smalltalk,
    ];

    fn as_str(self) -> &'static str {
        match self {
            MessageCategory::Greeting => "greeting",
            MessageCategory::StatusQuery => "status_query",
            MessageCategory::Refinement => "refinement",
            MessageCategory::Cancellation => "cancellation",
            MessageCategory::NewTask => "new_task",
            MessageCategory::Smalltalk => "smalltalk",
        }
    }

    /// Whether this category starts a brand new workflow rather than
    /// routing to the task already in progress.
    pub fn is_new_task(self) -> bool {
        matches!(self, MessageCategory::NewTask)
    }
}

fn category_prompt(message: &str) -> String {
    format!(
        "Classify the following message into exactly one of these labels: \
         greeting, status_query, refinement, cancellation, new_task, smalltalk. \
         Reply with only the label, nothing else.\n\nMESSAGE:\n{message}"
    )
}

fn parse_category(raw: &str) -> MessageCategory {
    let label = raw.trim().to_lowercase();
    MessageCategory::ALL
        .into_iter()
        .find(|c| label.contains(c.as_str()))
        .unwrap_or(MessageCategory::NewTask)
}

/// Stage 1: classify `message` into a [`MessageCategory`]. Falls back to
/// `NewTask` on any model error or an unrecognized reply — `spec.md`'s
/// `ClassificationFailed` error kind defaults to `new_task`.
pub async fn classify_category(client: &dyn ModelClient, message: &str) -> MessageCategory {
    let request = ModelRequest {
        messages: vec![ModelMessage {
            role: Role::User,
            content: category_prompt(message),
        }],
        temperature: Some(0.0),
        max_tokens: Some(16),
        ..Default::default()
    };

    match client.complete(request).await {
        Ok(reply) => parse_category(&reply.content),
        Err(e) => {
            tracing::warn!(error = %e, "category classification call failed, defaulting to new_task");
            MessageCategory::NewTask
        }
    }
}

fn template_prompt(message: &str) -> String {
    format!(
        "Classify the following request into exactly one of these labels: \
         full_build, bug_fix, design_only, deploy_only, conversational. \
         Reply with only the label, nothing else.\n\nREQUEST:\n{message}"
    )
}

fn parse_template_label(raw: &str) -> WorkflowTemplate {
    let label = raw.trim().to_lowercase();
    WorkflowTemplate::ALL
        .into_iter()
        .find(|t| label.contains(t.as_str()))
        .unwrap_or(WorkflowTemplate::Conversational)
}

/// Stage 2, only reached for a `new_task` message: classify `message` into
/// the [`WorkflowTemplate`] that starts it. Falls back to `Conversational`
/// on any model error or an unrecognized reply — an unclassifiable message
/// is always safe to treat as a conversation.
pub async fn classify_template(client: &dyn ModelClient, message: &str) -> WorkflowTemplate {
    let request = ModelRequest {
        messages: vec![ModelMessage {
            role: Role::User,
            content: template_prompt(message),
        }],
        temperature: Some(0.0),
        max_tokens: Some(16),
        ..Default::default()
    };

    match client.complete(request).await {
        Ok(reply) => parse_template_label(&reply.content),
        Err(e) => {
            tracing::warn!(error = %e, "template classification call failed, defaulting to conversational");
            WorkflowTemplate::Conversational
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_providers::test_client::TestModelClient;

    #[tokio::test]
    async fn recognized_template_label_is_parsed() {
        let client = TestModelClient::new("test");
        client.push_text_reply("bug_fix", 5, 1);
        assert_eq!(
            classify_template(&client, "fix the login crash").await,
            WorkflowTemplate::BugFix
        );
    }

    #[tokio::test]
    async fn unrecognized_template_reply_defaults_to_conversational() {
        let client = TestModelClient::new("test");
        client.push_text_reply("not a label", 5, 1);
        assert_eq!(
            classify_template(&client, "hello").await,
            WorkflowTemplate::Conversational
        );
    }

    #[tokio::test]
    async fn recognized_category_is_parsed() {
        let client = TestModelClient::new("test");
        client.push_text_reply("status_query", 5, 1);
        assert_eq!(
            classify_category(&client, "how's it going?").await,
            MessageCategory::StatusQuery
        );
    }

    #[tokio::test]
    async fn unrecognized_category_reply_defaults_to_new_task() {
        let client = TestModelClient::new("test");
        client.push_text_reply("not a label", 5, 1);
        assert_eq!(
            classify_category(&client, "build me a thing").await,
            MessageCategory::NewTask
        );
    }

    #[test]
    fn only_new_task_starts_a_new_workflow() {
        assert!(MessageCategory::NewTask.is_new_task());
        assert!(!MessageCategory::StatusQuery.is_new_task());
        assert!(!MessageCategory::Refinement.is_new_task());
        assert!(!MessageCategory::Cancellation.is_new_task());
        assert!(!MessageCategory::Greeting.is_new_task());
        assert!(!MessageCategory::Smalltalk.is_new_task());
    }
}
