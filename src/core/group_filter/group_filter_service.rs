// Group filter service - owns one compiled checker per group.
//
// This service handles:
// - Lazily compiling a group's checker from its stored config
// - Evaluating messages and planning the moderation action
// - Replacing a group's config wholesale (new checker, swapped in atomically)
// - Small editing helpers used by the admin commands
//
// Writes to one group are serialized by a per-group lock so the cached checker
// always matches the stored record.
//
// NO Discord dependencies here - just pure domain logic.

use super::filter_checker::FilterChecker;
use super::group_filter_models::{
    ForwardMessageFilter, GroupConfig, GroupRecord, JoinOptions, MemberMessageFilter,
    MessageDescriptor, MessageKind, ModerationAction, SensitiveWordAction, SensitiveWordRule,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum GroupFilterError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid group config: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting group records.
///
/// Stores deal in serialized configs only; decoding happens in the service.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Load a group's record, if one was ever saved.
    async fn get_group(&self, group_id: u64) -> Result<Option<GroupRecord>, GroupFilterError>;

    /// Insert or replace a group's record.
    async fn save_group(&self, record: GroupRecord) -> Result<(), GroupFilterError>;

    /// Remove a group's record. Returns whether one existed.
    async fn delete_group(&self, group_id: u64) -> Result<bool, GroupFilterError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct GroupFilterService<S: GroupStore> {
    store: S,
    /// Group ID -> compiled checker for its current config
    checkers: DashMap<u64, Arc<FilterChecker>>,
    /// Group ID -> lock held while loading or writing that group
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl<S: GroupStore> GroupFilterService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            checkers: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn group_lock(&self, group_id: u64) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(group_id).or_default().value())
    }

    /// Shared checker for a group, compiling it on first use.
    ///
    /// A group without a record, or whose stored config no longer decodes,
    /// gets a checker that never fires.
    pub async fn checker(&self, group_id: u64) -> Result<Arc<FilterChecker>, GroupFilterError> {
        if let Some(checker) = self.checkers.get(&group_id) {
            return Ok(Arc::clone(checker.value()));
        }

        let lock = self.group_lock(group_id);
        let _guard = lock.lock().await;

        // Someone else may have compiled or replaced it while we waited.
        if let Some(checker) = self.checkers.get(&group_id) {
            return Ok(Arc::clone(checker.value()));
        }

        let config = match self.store.get_group(group_id).await? {
            Some(record) => record.decode_config().unwrap_or_else(|e| {
                tracing::warn!(
                    group_id,
                    error = %e,
                    "Stored group config is unreadable, filtering disabled"
                );
                GroupConfig::default()
            }),
            None => GroupConfig::default(),
        };

        let compiled = Arc::new(FilterChecker::new(config));
        self.checkers.insert(group_id, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Evaluate a message and plan what the platform layer should do.
    pub async fn evaluate(
        &self,
        group_id: u64,
        message: &MessageDescriptor,
    ) -> Result<ModerationAction, GroupFilterError> {
        let checker = self.checker(group_id).await?;
        let result = checker.check_all(message.kind, &message.content, message.is_forwarded);
        if result.is_pass() {
            return Ok(ModerationAction::None);
        }

        if result.sensitive_hit {
            if let Some(rule) = result.sensitive_rule {
                tracing::info!(
                    group_id,
                    keyword = %rule.keyword,
                    action = ?rule.action,
                    ban_duration_secs = rule.ban_duration_secs,
                    "Sensitive word hit"
                );
            }
        } else if result.should_delete {
            tracing::debug!(
                group_id,
                kind = %message.kind,
                forwarded = message.is_forwarded,
                reason = result.reason,
                "Message filtered"
            );
        }

        Ok(result.to_action())
    }

    /// Decoded config for a group. Unlike `checker`, a corrupt record is an error
    /// here so an edit never silently overwrites it.
    pub async fn get_config(&self, group_id: u64) -> Result<GroupConfig, GroupFilterError> {
        match self.store.get_group(group_id).await? {
            Some(record) => record.decode_config(),
            None => Ok(GroupConfig::default()),
        }
    }

    /// Persist a new config and swap in a freshly compiled checker.
    pub async fn replace_config(
        &self,
        group_id: u64,
        config: GroupConfig,
    ) -> Result<Arc<FilterChecker>, GroupFilterError> {
        let lock = self.group_lock(group_id);
        let _guard = lock.lock().await;
        self.store_and_swap(group_id, config).await
    }

    /// Caller must hold the group's lock.
    async fn store_and_swap(
        &self,
        group_id: u64,
        config: GroupConfig,
    ) -> Result<Arc<FilterChecker>, GroupFilterError> {
        let record = GroupRecord::new(group_id, &config)?;
        self.store.save_group(record).await?;

        let compiled = Arc::new(FilterChecker::new(config));
        self.checkers.insert(group_id, Arc::clone(&compiled));

        tracing::info!(
            group_id,
            rules = compiled.rule_count(),
            "Group filter config replaced"
        );
        Ok(compiled)
    }

    /// Forget a group's compiled checker; the next evaluation reloads it.
    pub fn invalidate(&self, group_id: u64) {
        self.checkers.remove(&group_id);
    }

    /// Delete a group's record and its checker.
    pub async fn remove_group(&self, group_id: u64) -> Result<bool, GroupFilterError> {
        let lock = self.group_lock(group_id);
        let _guard = lock.lock().await;

        let existed = self.store.delete_group(group_id).await?;
        self.invalidate(group_id);
        Ok(existed)
    }

    /// Pretty-printed config document for a group.
    pub async fn export_config(&self, group_id: u64) -> Result<String, GroupFilterError> {
        let config = self.get_config(group_id).await?;
        serde_json::to_string_pretty(&config)
            .map_err(|e| GroupFilterError::InvalidConfig(e.to_string()))
    }

    // ------------------------------------------------------------------------
    // Editing helpers: load, change a copy, replace wholesale, all under the
    // group's lock.
    // ------------------------------------------------------------------------

    async fn update_config<F, R>(&self, group_id: u64, edit: F) -> Result<R, GroupFilterError>
    where
        F: FnOnce(&mut GroupConfig) -> R + Send,
        R: Send,
    {
        let lock = self.group_lock(group_id);
        let _guard = lock.lock().await;

        let mut config = self.get_config(group_id).await?;
        let outcome = edit(&mut config);
        self.store_and_swap(group_id, config).await?;
        Ok(outcome)
    }

    /// Append a sensitive-word rule (lowest priority).
    pub async fn add_sensitive_word(
        &self,
        group_id: u64,
        keyword: &str,
        action: SensitiveWordAction,
        ban_duration_secs: i64,
    ) -> Result<(), GroupFilterError> {
        if keyword.is_empty() {
            return Err(GroupFilterError::InvalidConfig(
                "keyword must not be empty".to_string(),
            ));
        }

        let rule = SensitiveWordRule::new(keyword, action, ban_duration_secs);
        self.update_config(group_id, move |config| {
            config.sensitive_words_mut().push(rule);
        })
        .await
    }

    /// Remove every rule for `keyword`. Returns how many were removed.
    pub async fn remove_sensitive_word(
        &self,
        group_id: u64,
        keyword: &str,
    ) -> Result<usize, GroupFilterError> {
        let keyword = keyword.to_string();
        self.update_config(group_id, move |config| {
            let words = config.sensitive_words_mut();
            let before = words.len();
            words.retain(|rule| rule.keyword != keyword);
            before - words.len()
        })
        .await
    }

    pub async fn set_link_filter_enabled(
        &self,
        group_id: u64,
        enabled: bool,
    ) -> Result<(), GroupFilterError> {
        self.update_config(group_id, move |config| {
            config.link_filter_mut().delete_link_messages = enabled;
        })
        .await
    }

    /// Returns `false` if the domain was already whitelisted.
    pub async fn add_whitelist_domain(
        &self,
        group_id: u64,
        domain: &str,
    ) -> Result<bool, GroupFilterError> {
        let domain = domain.trim().to_string();
        if domain.is_empty() {
            return Err(GroupFilterError::InvalidConfig(
                "domain must not be empty".to_string(),
            ));
        }

        self.update_config(group_id, move |config| {
            let whitelist = &mut config.link_filter_mut().domain_whitelist;
            if whitelist.contains(&domain) {
                false
            } else {
                whitelist.push(domain);
                true
            }
        })
        .await
    }

    /// Returns `false` if the domain was not whitelisted.
    pub async fn remove_whitelist_domain(
        &self,
        group_id: u64,
        domain: &str,
    ) -> Result<bool, GroupFilterError> {
        let domain = domain.trim().to_string();
        self.update_config(group_id, move |config| {
            let whitelist = &mut config.link_filter_mut().domain_whitelist;
            let before = whitelist.len();
            whitelist.retain(|d| *d != domain);
            whitelist.len() != before
        })
        .await
    }

    /// Toggle deletion of members' messages of one kind.
    pub async fn set_member_filter(
        &self,
        group_id: u64,
        kind: MessageKind,
        enabled: bool,
    ) -> Result<(), GroupFilterError> {
        if MemberMessageFilter::default().toggle_mut(kind).is_none() {
            return Err(GroupFilterError::InvalidConfig(format!(
                "{} messages cannot be filtered for members",
                kind
            )));
        }

        self.update_config(group_id, move |config| {
            if let Some(toggle) = config.member_filter_mut().toggle_mut(kind) {
                *toggle = enabled;
            }
        })
        .await
    }

    /// Toggle deletion of forwarded messages of one kind.
    pub async fn set_forward_filter(
        &self,
        group_id: u64,
        kind: MessageKind,
        enabled: bool,
    ) -> Result<(), GroupFilterError> {
        if ForwardMessageFilter::default().toggle_mut(kind).is_none() {
            return Err(GroupFilterError::InvalidConfig(format!(
                "forwarded {} messages cannot be filtered",
                kind
            )));
        }

        self.update_config(group_id, move |config| {
            if let Some(toggle) = config.forward_filter_mut().toggle_mut(kind) {
                *toggle = enabled;
            }
        })
        .await
    }

    /// Toggle deletion of every forwarded message.
    pub async fn set_forward_all(
        &self,
        group_id: u64,
        enabled: bool,
    ) -> Result<(), GroupFilterError> {
        self.update_config(group_id, move |config| {
            config.forward_filter_mut().delete_all_forward_msg = enabled;
        })
        .await
    }

    pub async fn set_join_options(
        &self,
        group_id: u64,
        options: JoinOptions,
    ) -> Result<(), GroupFilterError> {
        self.update_config(group_id, move |config| {
            config.join_options = Some(options);
        })
        .await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::group_filter::{JoinMethod, VerificationConfig, VerificationMethod};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory store for testing
    struct MockGroupStore {
        groups: DashMap<u64, GroupRecord>,
    }

    impl MockGroupStore {
        fn new() -> Self {
            Self {
                groups: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl GroupStore for MockGroupStore {
        async fn get_group(&self, group_id: u64) -> Result<Option<GroupRecord>, GroupFilterError> {
            Ok(self.groups.get(&group_id).map(|r| r.clone()))
        }

        async fn save_group(&self, record: GroupRecord) -> Result<(), GroupFilterError> {
            self.groups.insert(record.group_id, record);
            Ok(())
        }

        async fn delete_group(&self, group_id: u64) -> Result<bool, GroupFilterError> {
            Ok(self.groups.remove(&group_id).is_some())
        }
    }

    /// Store whose reads and writes take effect, then stall, so concurrent
    /// callers interleave at the worst point.
    struct SlowGroupStore {
        inner: MockGroupStore,
        read_delay: Duration,
        first_save_delay: Duration,
        saves: AtomicUsize,
    }

    impl SlowGroupStore {
        fn new(read_delay: Duration, first_save_delay: Duration) -> Self {
            Self {
                inner: MockGroupStore::new(),
                read_delay,
                first_save_delay,
                saves: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GroupStore for SlowGroupStore {
        async fn get_group(&self, group_id: u64) -> Result<Option<GroupRecord>, GroupFilterError> {
            let record = self.inner.get_group(group_id).await;
            tokio::time::sleep(self.read_delay).await;
            record
        }

        async fn save_group(&self, record: GroupRecord) -> Result<(), GroupFilterError> {
            self.inner.save_group(record).await?;
            if self.saves.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(self.first_save_delay).await;
            }
            Ok(())
        }

        async fn delete_group(&self, group_id: u64) -> Result<bool, GroupFilterError> {
            self.inner.delete_group(group_id).await
        }
    }

    fn text(content: &str) -> MessageDescriptor {
        MessageDescriptor {
            kind: MessageKind::Text,
            content: content.to_string(),
            is_forwarded: false,
        }
    }

    #[tokio::test]
    async fn test_unknown_group_passes_everything() {
        let service = GroupFilterService::new(MockGroupStore::new());

        let action = service.evaluate(1, &text("http://evil.org")).await.unwrap();
        assert_eq!(action, ModerationAction::None);
    }

    #[tokio::test]
    async fn test_checker_is_shared_until_replaced() {
        let service = GroupFilterService::new(MockGroupStore::new());

        let first = service.checker(1).await.unwrap();
        let again = service.checker(1).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        service.set_link_filter_enabled(1, true).await.unwrap();
        let replaced = service.checker(1).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &replaced));

        // The old checker keeps answering from its own snapshot.
        assert!(first.check_all(MessageKind::Text, "http://evil.org", false).is_pass());
        assert!(replaced
            .check_all(MessageKind::Text, "http://evil.org", false)
            .should_delete);
    }

    #[tokio::test]
    async fn test_sensitive_word_plans_mute() {
        let service = GroupFilterService::new(MockGroupStore::new());
        service
            .add_sensitive_word(7, "spam", SensitiveWordAction::BanUser, 60)
            .await
            .unwrap();

        let action = service.evaluate(7, &text("buy spam now")).await.unwrap();
        assert_eq!(
            action,
            ModerationAction::Mute {
                keyword: "spam".to_string(),
                duration: Some(Duration::from_secs(60)),
            }
        );

        // Other groups are unaffected.
        let action = service.evaluate(8, &text("buy spam now")).await.unwrap();
        assert_eq!(action, ModerationAction::None);
    }

    #[tokio::test]
    async fn test_rules_keep_insertion_order() {
        let service = GroupFilterService::new(MockGroupStore::new());
        service
            .add_sensitive_word(1, "spam", SensitiveWordAction::NoAction, 0)
            .await
            .unwrap();
        service
            .add_sensitive_word(1, "spammer", SensitiveWordAction::BanUser, 60)
            .await
            .unwrap();

        let action = service.evaluate(1, &text("spammer")).await.unwrap();
        assert_eq!(
            action,
            ModerationAction::Flag {
                keyword: "spam".to_string()
            }
        );

        assert_eq!(service.remove_sensitive_word(1, "spam").await.unwrap(), 1);
        let action = service.evaluate(1, &text("spammer")).await.unwrap();
        assert!(matches!(action, ModerationAction::Mute { .. }));
    }

    #[tokio::test]
    async fn test_empty_keyword_is_rejected() {
        let service = GroupFilterService::new(MockGroupStore::new());
        let err = service
            .add_sensitive_word(1, "", SensitiveWordAction::BanUser, 60)
            .await
            .unwrap_err();
        assert!(matches!(err, GroupFilterError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_whitelist_editing() {
        let service = GroupFilterService::new(MockGroupStore::new());
        service.set_link_filter_enabled(1, true).await.unwrap();

        assert!(service.add_whitelist_domain(1, " example.com ").await.unwrap());
        assert!(!service.add_whitelist_domain(1, "example.com").await.unwrap());

        let action = service
            .evaluate(1, &text("visit http://example.com/page"))
            .await
            .unwrap();
        assert_eq!(action, ModerationAction::None);

        let action = service.evaluate(1, &text("visit http://evil.org")).await.unwrap();
        assert_eq!(
            action,
            ModerationAction::DeleteMessage {
                reason: "delete link: not in whitelist".to_string()
            }
        );

        assert!(service.remove_whitelist_domain(1, "example.com").await.unwrap());
        assert!(!service.remove_whitelist_domain(1, "example.com").await.unwrap());
        let action = service
            .evaluate(1, &text("visit http://example.com/page"))
            .await
            .unwrap();
        assert!(matches!(action, ModerationAction::DeleteMessage { .. }));
    }

    #[tokio::test]
    async fn test_type_filters() {
        let service = GroupFilterService::new(MockGroupStore::new());
        service
            .set_member_filter(1, MessageKind::Sticker, true)
            .await
            .unwrap();
        service
            .set_forward_filter(1, MessageKind::Video, true)
            .await
            .unwrap();

        let sticker = MessageDescriptor {
            kind: MessageKind::Sticker,
            content: "😀".to_string(),
            is_forwarded: false,
        };
        assert_eq!(
            service.evaluate(1, &sticker).await.unwrap(),
            ModerationAction::DeleteMessage {
                reason: "delete sticker".to_string()
            }
        );

        let video = MessageDescriptor {
            kind: MessageKind::Video,
            content: String::new(),
            is_forwarded: true,
        };
        assert_eq!(
            service.evaluate(1, &video).await.unwrap(),
            ModerationAction::DeleteMessage {
                reason: "delete video in forward".to_string()
            }
        );

        service.set_forward_all(1, true).await.unwrap();
        let forwarded_text = MessageDescriptor {
            is_forwarded: true,
            ..text("hello")
        };
        assert_eq!(
            service.evaluate(1, &forwarded_text).await.unwrap(),
            ModerationAction::DeleteMessage {
                reason: "delete all forward".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unfilterable_kinds_are_rejected() {
        let service = GroupFilterService::new(MockGroupStore::new());
        assert!(service
            .set_member_filter(1, MessageKind::Video, true)
            .await
            .is_err());
        assert!(service
            .set_forward_filter(1, MessageKind::Dice, true)
            .await
            .is_err());
        // Nothing was written.
        assert_eq!(service.get_config(1).await.unwrap(), GroupConfig::default());
    }

    #[tokio::test]
    async fn test_join_options_are_stored_only() {
        let service = GroupFilterService::new(MockGroupStore::new());
        let options = JoinOptions {
            method: JoinMethod::Verification,
            verification_config: Some(VerificationConfig {
                wait_time_seconds: 300,
                rejoin_cooldown_seconds: 600,
                method: VerificationMethod::Manual,
                prompt_message: "An admin will approve you shortly".to_string(),
            }),
        };
        service.set_join_options(1, options.clone()).await.unwrap();

        let config = service.get_config(1).await.unwrap();
        assert_eq!(config.join_options, Some(options));
        assert_eq!(
            service.evaluate(1, &text("hello")).await.unwrap(),
            ModerationAction::None
        );
    }

    #[tokio::test]
    async fn test_corrupt_record_disables_filtering_but_blocks_edits() {
        let store = MockGroupStore::new();
        store
            .save_group(GroupRecord {
                group_id: 1,
                config_json: "{not json".to_string(),
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        let service = GroupFilterService::new(store);

        assert_eq!(
            service.evaluate(1, &text("http://evil.org")).await.unwrap(),
            ModerationAction::None
        );
        assert!(matches!(
            service.set_link_filter_enabled(1, true).await,
            Err(GroupFilterError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_reloads_from_store() {
        let store = MockGroupStore::new();
        let service = GroupFilterService::new(store);
        assert!(service.checker(1).await.unwrap().config().link_message_filter.is_none());

        // Simulate another writer updating the store behind our back.
        let mut config = GroupConfig::default();
        config.link_filter_mut().delete_link_messages = true;
        service
            .store
            .save_group(GroupRecord::new(1, &config).unwrap())
            .await
            .unwrap();
        assert!(service.checker(1).await.unwrap().config().link_message_filter.is_none());

        service.invalidate(1);
        assert!(service.checker(1).await.unwrap().config().link_message_filter.is_some());
    }

    #[tokio::test]
    async fn test_remove_group() {
        let service = GroupFilterService::new(MockGroupStore::new());
        service.set_link_filter_enabled(1, true).await.unwrap();

        assert!(service.remove_group(1).await.unwrap());
        assert!(!service.remove_group(1).await.unwrap());
        assert_eq!(
            service.evaluate(1, &text("http://evil.org")).await.unwrap(),
            ModerationAction::None
        );
    }

    #[tokio::test]
    async fn test_export_config() {
        let service = GroupFilterService::new(MockGroupStore::new());
        service.add_whitelist_domain(1, "example.com").await.unwrap();

        let exported = service.export_config(1).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(
            value["link_message_filter"]["domain_whitelist"][0],
            "example.com"
        );
    }

    #[tokio::test]
    async fn test_concurrent_edits_to_one_group_both_apply() {
        let service = GroupFilterService::new(SlowGroupStore::new(
            Duration::from_millis(20),
            Duration::ZERO,
        ));

        let (word, link) = tokio::join!(
            service.add_sensitive_word(1, "spam", SensitiveWordAction::BanUser, 60),
            service.set_link_filter_enabled(1, true)
        );
        word.unwrap();
        link.unwrap();

        let config = service.get_config(1).await.unwrap();
        assert_eq!(config.sensitive_word_config.unwrap().words.len(), 1);
        assert!(config.link_message_filter.unwrap().delete_link_messages);
    }

    #[tokio::test]
    async fn test_overlapping_replacements_cache_the_stored_config() {
        let service = GroupFilterService::new(SlowGroupStore::new(
            Duration::ZERO,
            Duration::from_millis(30),
        ));

        let mut first = GroupConfig::default();
        first.link_filter_mut().delete_link_messages = true;
        let second = GroupConfig::default();

        let (a, b) = tokio::join!(
            service.replace_config(1, first),
            service.replace_config(1, second)
        );
        a.unwrap();
        b.unwrap();

        let stored = service.get_config(1).await.unwrap();
        let cached = service.checker(1).await.unwrap();
        assert_eq!(cached.config(), &stored);
    }

    #[tokio::test]
    async fn test_remove_during_first_load_leaves_no_stale_checker() {
        let store = SlowGroupStore::new(Duration::from_millis(30), Duration::ZERO);
        let mut config = GroupConfig::default();
        config.link_filter_mut().delete_link_messages = true;
        store
            .inner
            .save_group(GroupRecord::new(1, &config).unwrap())
            .await
            .unwrap();
        let service = GroupFilterService::new(store);

        let (loaded, removed) = tokio::join!(service.checker(1), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            service.remove_group(1).await
        });
        loaded.unwrap();
        assert!(removed.unwrap());

        assert!(service.checker(1).await.unwrap().config().link_message_filter.is_none());
        assert_eq!(
            service.evaluate(1, &text("http://evil.org")).await.unwrap(),
            ModerationAction::None
        );
    }
}
