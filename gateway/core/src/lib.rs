// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! DocGate Core
//!
//! Permission-aware retrieval for the SharePoint document assistant.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Aggregates SharePoint sharing permissions into a normalized
//!   record, decides per-user access, and filters similarity search results
//!   before they reach response generation.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
