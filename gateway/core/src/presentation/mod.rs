// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`docgate-core`)
//!
//! HTTP surface that translates external requests into application service
//! calls. Request identity is resolved in [`auth`]; everything else is
//! delegated to `crate::application`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Chat, search and permission check endpoints |
//! | [`auth`] | HTTP headers | SharePoint, development and bearer token identity |

pub mod api;
pub mod auth;
