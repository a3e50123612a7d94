// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Permission Aggregator
//!
//! Flattens the raw Graph sharing entries of one drive item into a
//! [`PermissionRecord`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Used by indexing to compute the permission fields stored on
//!   every chunk, and by the permission check endpoint.
//!
//! Aggregation never fails. Directory lookups for group emails fall back to
//! the group's display name or id, and a failed permissions fetch yields
//! [`PermissionRecord::unavailable`].

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::directory::{DirectoryClient, PermissionSource};
use crate::domain::graph_permission::{non_empty, Identity, IdentitySet, RawPermission};
use crate::domain::permission::{PermissionRecord, SharingLink};

pub struct PermissionAggregator {
    directory: Option<Arc<dyn DirectoryClient>>,
}

impl PermissionAggregator {
    /// Without a directory, group entries that carry no email resolve to
    /// their display name or id.
    pub fn new(directory: Option<Arc<dyn DirectoryClient>>) -> Self {
        Self { directory }
    }

    pub async fn aggregate(&self, entries: &[RawPermission]) -> PermissionRecord {
        let mut record = PermissionRecord::new();

        for entry in entries {
            self.process_entry(entry, &mut record).await;
        }

        record.finalize();

        info!(
            entries = record.raw_entry_count(),
            users = record.users().len(),
            groups = record.groups().len(),
            links = record.sharing_links().len(),
            access_level = %record.access_level(),
            inherited = record.inheritance(),
            "Aggregated document permissions"
        );

        record
    }

    /// Fetch the raw entries of a drive item and aggregate them.
    pub async fn fetch_document_permissions(
        &self,
        source: &dyn PermissionSource,
        drive_id: &str,
        item_id: &str,
    ) -> PermissionRecord {
        match source.get_permissions(drive_id, item_id).await {
            Ok(entries) => self.aggregate(&entries).await,
            Err(e) => {
                warn!(drive_id, item_id, error = %e, "Failed to fetch document permissions");
                PermissionRecord::unavailable(e.to_string())
            }
        }
    }

    async fn process_entry(&self, entry: &RawPermission, record: &mut PermissionRecord) {
        record.count_entry();

        if let Some(link) = &entry.link {
            let application = link
                .application
                .as_ref()
                .and_then(|app| app.id.clone())
                .unwrap_or_default();
            record.add_application(&application);
            record.add_sharing_link(SharingLink {
                link_type: link.link_type.clone().unwrap_or_default(),
                scope: link.scope.clone().unwrap_or_default(),
                web_url: link.web_url.clone().unwrap_or_default(),
                application,
            });
        }

        for identities in entry.granted_entities() {
            self.process_identities(identities, record).await;
        }

        if entry.is_inherited() {
            record.mark_inherited();
        }

        debug!(
            permission_id = entry.id.as_deref().unwrap_or_default(),
            access_level = %record.access_level(),
            "Processed permission entry"
        );
    }

    async fn process_identities(&self, identities: &IdentitySet, record: &mut PermissionRecord) {
        if let Some(email) = identities.user.as_ref().and_then(|u| non_empty(&u.email)) {
            record.add_user(email);
        }

        if let Some(name) = identities.site_group.as_ref().and_then(|g| g.preferred_name()) {
            record.add_group(name);
        }

        if let Some(group) = &identities.group {
            if let Some(identifier) = self.group_identifier(group).await {
                record.add_group(&identifier);
            }
        }

        if let Some(app) = &identities.application {
            if let Some(id) = non_empty(&app.id).or_else(|| non_empty(&app.display_name)) {
                record.add_application(id);
            }
        }
    }

    /// Email on the entry, else the directory's mail/UPN for the group id,
    /// else display name, else id.
    async fn group_identifier(&self, group: &Identity) -> Option<String> {
        if let Some(email) = non_empty(&group.email) {
            return Some(email.trim().to_lowercase());
        }

        if let (Some(directory), Some(id)) = (&self.directory, non_empty(&group.id)) {
            match directory.get_group(id).await {
                Ok(details) => {
                    if let Some(email) = details.resolved_email() {
                        return Some(email);
                    }
                }
                Err(e) => {
                    warn!(group_id = id, error = %e, "Group lookup failed, using raw identifier");
                }
            }
        }

        non_empty(&group.display_name)
            .or_else(|| non_empty(&group.id))
            .map(str::to_string)
    }
}
