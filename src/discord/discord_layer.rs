// Discord layer - commands and event handlers.

#[path = "moderation/commands.rs"]
pub mod commands;

#[path = "moderation/filter_handler.rs"]
pub mod filter_handler;

use crate::core::group_filter::GroupFilterService;
use crate::infra::group_filter::SqliteGroupStore;
use std::sync::Arc;

/// Shared state available to every command and event handler.
pub struct Data {
    pub group_filter: Arc<GroupFilterService<SqliteGroupStore>>,
    /// Prefix that marks a message as a bot command
    pub command_prefix: String,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
