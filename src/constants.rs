// ABOUTME: Constants for the conversation store
// ABOUTME: Re-exports key layout, Redis, persistence, and schema constants from chatstore-core
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use chatstore_core::constants::*;
