// ABOUTME: Error types for the conversation store
// ABOUTME: Re-exports the application and storage tier errors from chatstore-core
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use chatstore_core::errors::*;
