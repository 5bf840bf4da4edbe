// Core group filter module - per-group message filtering rules and the checker.

pub mod filter_checker;
pub mod group_filter_models;
pub mod group_filter_service;

pub use filter_checker::*;
pub use group_filter_models::*;
pub use group_filter_service::*;
