// ABOUTME: Cold-tier message documents with assistant-only payload fields
// ABOUTME: Payload kind is a tagged enum chosen at construction, never re-inferred on read
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Role of the message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End user
    User,
    /// The agent
    Assistant,
    /// System/instruction message
    System,
}

impl MessageRole {
    /// Stable lowercase representation stored in the cold tier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Parse a stored role; unknown values yield `None`
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    /// Tool returned a result
    Success,
    /// Tool failed
    Error,
    /// Tool did not finish before the response was produced
    Pending,
}

/// One tool invocation made while producing an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name
    pub name: String,
    /// Invocation outcome
    pub status: ToolCallStatus,
    /// Tool output, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Arguments the tool was called with
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    /// Successful call with arguments and no recorded output
    pub fn success(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            status: ToolCallStatus::Success,
            output: None,
            arguments,
        }
    }
}

/// Retrieved source that grounded an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Source text
    pub content: String,
    /// Source metadata (url, title, score, ...)
    #[serde(default)]
    pub metadata: Metadata,
}

/// Assistant payload beyond the plain response text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentOutput {
    /// Rendered text (markdown, plain)
    Text {
        /// The text
        text: String,
    },
    /// Tabular result set
    Tabular {
        /// Column names
        columns: Vec<String>,
        /// Rows, each with one value per column
        rows: Vec<Vec<Value>>,
    },
    /// Arbitrary structured output (chart spec, form, ...)
    Structured {
        /// The structured value
        value: Value,
    },
}

impl AgentOutput {
    /// Output mode recorded alongside the payload
    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        match self {
            Self::Text { .. } => OutputMode::Text,
            Self::Tabular { .. } => OutputMode::Tabular,
            Self::Structured { .. } => OutputMode::Structured,
        }
    }
}

/// Payload kind of an assistant message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// See [`AgentOutput::Text`]
    Text,
    /// See [`AgentOutput::Tabular`]
    Tabular,
    /// See [`AgentOutput::Structured`]
    Structured,
}

impl OutputMode {
    /// Stable lowercase representation stored in the cold tier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Tabular => "tabular",
            Self::Structured => "structured",
        }
    }

    /// Parse a stored output mode
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "tabular" => Some(Self::Tabular),
            "structured" => Some(Self::Structured),
            _ => None,
        }
    }
}

/// One message document (one per direction of a turn)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id, `{turn_id}_user` or `{turn_id}_assistant`
    pub message_id: String,
    /// Session identifier
    pub session_id: String,
    /// User identifier
    pub user_id: String,
    /// Owning agent/bot identifier
    pub agent_id: String,
    /// Sender role
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// When the message was recorded
    pub timestamp: DateTime<Utc>,
    /// Assistant payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<AgentOutput>,
    /// Kind of `output`, derived once at construction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_mode: Option<OutputMode>,
    /// Extra structured data attached by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Value>,
    /// Code the agent generated or executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// LLM model that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// LLM provider that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// End-to-end response latency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Tool invocations
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Retrieved sources
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl Message {
    /// Plain message with no assistant payload
    #[must_use]
    pub fn plain(
        message_id: String,
        role: MessageRole,
        content: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            session_id: String::new(),
            user_id: String::new(),
            agent_id: String::new(),
            role,
            content,
            timestamp,
            output: None,
            output_mode: None,
            structured_data: None,
            code: None,
            model: None,
            provider: None,
            response_time_ms: None,
            tool_calls: Vec::new(),
            sources: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Set the owning session identity
    #[must_use]
    pub fn in_session(mut self, user_id: &str, session_id: &str, agent_id: &str) -> Self {
        user_id.clone_into(&mut self.user_id);
        session_id.clone_into(&mut self.session_id);
        agent_id.clone_into(&mut self.agent_id);
        self
    }

    /// Attach an assistant payload and derive its output mode
    #[must_use]
    pub fn with_output(mut self, output: Option<AgentOutput>) -> Self {
        self.output_mode = output.as_ref().map(AgentOutput::mode);
        self.output = output;
        self
    }

    /// Message id for one direction of a turn
    #[must_use]
    pub fn id_for(turn_id: &str, role: MessageRole) -> String {
        format!("{turn_id}_{}", role.as_str())
    }

    /// Turn id recovered from a derived message id
    #[must_use]
    pub fn turn_id(&self) -> Option<&str> {
        self.message_id
            .strip_suffix("_user")
            .or_else(|| self.message_id.strip_suffix("_assistant"))
    }
}

/// Minimal agent-facing projection of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// Sender role
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl From<&Message> for ContextMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

impl From<Message> for ContextMessage {
    fn from(message: Message) -> Self {
        Self {
            role: message.role,
            content: message.content,
        }
    }
}
