// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Permission, access policy, document and configuration types shared by the
//! application services, plus the ports the infrastructure layer implements.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer

pub mod access;
pub mod directory;
pub mod document;
pub mod gateway_config;
pub mod graph_permission;
pub mod llm;
pub mod permission;
pub mod principals;
pub mod user;
