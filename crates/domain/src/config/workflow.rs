use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::agent::AgentType;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workflow templates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One of the fixed workflow shapes the orchestrator selects between when
/// classifying an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowTemplate {
    FullBuild,
    BugFix,
    DesignOnly,
    DeployOnly,
    Conversational,
}

impl WorkflowTemplate {
    pub const ALL: [WorkflowTemplate; 5] = [
        WorkflowTemplate::FullBuild,
        WorkflowTemplate::BugFix,
        WorkflowTemplate::DesignOnly,
        WorkflowTemplate::DeployOnly,
        WorkflowTemplate::Conversational,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowTemplate::FullBuild => "full_build",
            WorkflowTemplate::BugFix => "bug_fix",
            WorkflowTemplate::DesignOnly => "design_only",
            WorkflowTemplate::DeployOnly => "deploy_only",
            WorkflowTemplate::Conversational => "conversational",
        }
    }
}

impl std::fmt::Display for WorkflowTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The ordered sequence of agent types a template drives through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDefinition {
    #[serde(default)]
    pub stages: Vec<AgentType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "d_templates")]
    pub templates: HashMap<String, TemplateDefinition>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            templates: d_templates(),
        }
    }
}

fn d_templates() -> HashMap<String, TemplateDefinition> {
    use AgentType::*;
    let mut m = HashMap::new();
    m.insert(
        WorkflowTemplate::FullBuild.as_str().to_string(),
        TemplateDefinition {
            stages: vec![Designer, Backend, Frontend, Qa, Devops],
        },
    );
    m.insert(
        WorkflowTemplate::BugFix.as_str().to_string(),
        TemplateDefinition {
            stages: vec![Backend, Qa],
        },
    );
    m.insert(
        WorkflowTemplate::DesignOnly.as_str().to_string(),
        TemplateDefinition {
            stages: vec![Designer],
        },
    );
    m.insert(
        WorkflowTemplate::DeployOnly.as_str().to_string(),
        TemplateDefinition {
            stages: vec![Devops],
        },
    );
    m.insert(
        WorkflowTemplate::Conversational.as_str().to_string(),
        TemplateDefinition {
            stages: vec![Conversational],
        },
    );
    m
}
