// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Publisher Contract - Change notifications for connected clients
//
// The websocket/pub-sub transport lives outside this crate; the datastore
// only forwards "entity X changed for site Y" notifications to it.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publish failed: {0}")]
    Failed(String),

    #[error("Publisher closed")]
    Closed,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Notify subscribers of `site_ulid` that `ids` of `entity` changed
    async fn publish(
        &self,
        site_ulid: &str,
        entity: &str,
        message_type: &str,
        ids: &[String],
    ) -> Result<(), PublishError>;
}
