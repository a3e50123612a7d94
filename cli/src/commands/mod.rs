// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for DocGate CLI

pub mod config;
pub mod permissions;

pub use self::config::ConfigCommand;
pub use self::permissions::PermissionsCommand;
