// ABOUTME: Request object for recording one agent turn across both storage tiers
// ABOUTME: Derives the hot-tier Turn, the paired cold-tier Messages, and the Conversation update
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{
    derive_title, AgentOutput, ConversationUpdate, Message, MessageRole, Metadata, Source,
    ToolCall, Turn,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Everything a platform adapter knows after the agent answered
///
/// Required fields go through [`NewTurn::new`]; optional assistant details are
/// attached with the `with_*` builders.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    /// User identifier
    pub user_id: String,
    /// Session identifier
    pub session_id: String,
    /// Owning agent/bot identifier (tenant)
    pub agent_id: String,
    /// What the user said
    pub user_message: String,
    /// What the assistant answered
    pub assistant_response: String,
    /// Tool invocations, in call order
    pub tool_calls: Vec<ToolCall>,
    /// Retrieved sources
    pub sources: Vec<Source>,
    /// LLM model
    pub model: Option<String>,
    /// LLM provider
    pub provider: Option<String>,
    /// End-to-end response latency
    pub response_time_ms: Option<u64>,
    /// Free-form metadata copied onto the turn and both messages
    pub metadata: Metadata,
    /// Assistant payload
    pub output: Option<AgentOutput>,
    /// Extra structured data
    pub structured_data: Option<Value>,
    /// Code generated or executed by the agent
    pub code: Option<String>,
}

impl NewTurn {
    /// Turn with the required identity and text fields
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        agent_id: impl Into<String>,
        user_message: impl Into<String>,
        assistant_response: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            agent_id: agent_id.into(),
            user_message: user_message.into(),
            assistant_response: assistant_response.into(),
            tool_calls: Vec::new(),
            sources: Vec::new(),
            model: None,
            provider: None,
            response_time_ms: None,
            metadata: Metadata::new(),
            output: None,
            structured_data: None,
            code: None,
        }
    }

    /// Attach tool invocations
    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Attach retrieved sources
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    /// Record the model and provider that answered
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>, provider: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self.provider = Some(provider.into());
        self
    }

    /// Record response latency
    #[must_use]
    pub const fn with_response_time_ms(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }

    /// Attach metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach an assistant payload
    #[must_use]
    pub fn with_output(mut self, output: AgentOutput) -> Self {
        self.output = Some(output);
        self
    }

    /// Attach structured data
    #[must_use]
    pub fn with_structured_data(mut self, structured_data: Value) -> Self {
        self.structured_data = Some(structured_data);
        self
    }

    /// Attach generated code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Hot-tier turn
    #[must_use]
    pub fn to_turn(&self, turn_id: &str, timestamp: DateTime<Utc>) -> Turn {
        Turn {
            turn_id: turn_id.to_owned(),
            user_id: self.user_id.clone(),
            user_message: self.user_message.clone(),
            assistant_response: self.assistant_response.clone(),
            tools_used: self.tool_calls.iter().map(|call| call.name.clone()).collect(),
            timestamp,
            metadata: self.metadata.clone(),
        }
    }

    /// Cold-tier message pair: user first, then assistant
    #[must_use]
    pub fn to_messages(&self, turn_id: &str, timestamp: DateTime<Utc>) -> [Message; 2] {
        let mut user = Message::plain(
            Message::id_for(turn_id, MessageRole::User),
            MessageRole::User,
            self.user_message.clone(),
            timestamp,
        )
        .in_session(&self.user_id, &self.session_id, &self.agent_id);
        user.metadata.clone_from(&self.metadata);

        let mut assistant = Message::plain(
            Message::id_for(turn_id, MessageRole::Assistant),
            MessageRole::Assistant,
            self.assistant_response.clone(),
            timestamp,
        )
        .in_session(&self.user_id, &self.session_id, &self.agent_id)
        .with_output(self.output.clone());
        assistant.structured_data.clone_from(&self.structured_data);
        assistant.code.clone_from(&self.code);
        assistant.model.clone_from(&self.model);
        assistant.provider.clone_from(&self.provider);
        assistant.response_time_ms = self.response_time_ms;
        assistant.tool_calls.clone_from(&self.tool_calls);
        assistant.sources.clone_from(&self.sources);
        assistant.metadata.clone_from(&self.metadata);

        [user, assistant]
    }

    /// Conversation upsert payload
    #[must_use]
    pub fn to_conversation_update(&self, timestamp: DateTime<Utc>) -> ConversationUpdate {
        ConversationUpdate {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            agent_id: self.agent_id.clone(),
            title: derive_title(&self.user_message),
            last_user_message: self.user_message.clone(),
            last_assistant_message: self.assistant_response.clone(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            metadata: self.metadata.clone(),
            timestamp,
        }
    }
}
