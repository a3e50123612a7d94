// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod anthropic;
pub mod openai;
pub mod registry;

pub use registry::ProviderRegistry;
