// ABOUTME: Core types and constants for the chatstore conversation engine
// ABOUTME: Foundation crate with error handling, the conversation data model, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Chatstore Core
//!
//! Foundation crate providing shared types and constants for the chatstore
//! two-tier conversation engine. This crate is designed to change infrequently,
//! enabling incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Application errors (`AppError`, `ErrorCode`) and tier errors (`StorageError`)
//! - **constants**: Key layout, TTL, connection and queue defaults
//! - **models**: Turn/History (hot tier) and Message/Conversation (cold tier) value types

/// Unified error handling with application error codes and storage tier errors
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Conversation data model shared by both storage tiers
pub mod models;
