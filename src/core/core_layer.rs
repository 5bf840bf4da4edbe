// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "group_filter/mod.rs"]
pub mod group_filter;

// Media resource models; nothing in the bot uploads yet.
#[allow(dead_code)]
#[path = "resources/resource_models.rs"]
pub mod resources;
