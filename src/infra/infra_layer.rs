// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "group_filter/mod.rs"]
pub mod group_filter;
