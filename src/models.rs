// ABOUTME: Conversation data model for the conversation store
// ABOUTME: Re-exports turns, histories, messages, and conversation records from chatstore-core
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use chatstore_core::models::*;
