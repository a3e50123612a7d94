// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

pub const DEV_USER_EMAIL: &str = "dev@example.com";

/// The identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Trimmed, lowercased email
    pub email: String,
    pub name: String,
    /// True only when both the deployment and the request enabled dev mode
    pub dev_mode: bool,
}

impl UserContext {
    pub fn new(email: &str, name: Option<&str>, dev_mode: bool) -> Self {
        let email = email.trim().to_lowercase();
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        Self { email, name, dev_mode }
    }

    pub fn dev() -> Self {
        Self::new(DEV_USER_EMAIL, Some("Developer"), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_defaults_to_local_part() {
        let user = UserContext::new(" Alice@Acme.com ", None, false);
        assert_eq!(user.email, "alice@acme.com");
        assert_eq!(user.name, "alice");

        let user = UserContext::new("bob@acme.com", Some("  "), false);
        assert_eq!(user.name, "bob");
    }
}
