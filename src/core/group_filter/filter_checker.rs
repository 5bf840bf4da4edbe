// Filter checker - compiles a group's config once, then classifies messages.
//
// Precedence is fixed: sensitive words, then message type, then links.
// The first stage that fires decides the verdict.
//
// NO Discord dependencies here and no I/O. A checker is immutable after
// construction, so one `Arc<FilterChecker>` can serve every concurrent
// message for its group.

use super::group_filter_models::{FilterResult, GroupConfig, MessageKind, SensitiveWordRule};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

// Permissive URL token: scheme plus ASCII word/dot/hyphen characters.
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[0-9A-Za-z_.\-]+").expect("link pattern compiles"));

/// Compiled, read-only evaluator for one group's config.
#[derive(Debug, Clone, Default)]
pub struct FilterChecker {
    config: GroupConfig,
    /// Rules with non-empty keywords, in config order
    sensitive_word_rules: Vec<SensitiveWordRule>,
    domain_whitelist: HashSet<String>,
}

impl FilterChecker {
    /// Compile a config. Absent filter blocks simply never fire.
    pub fn new(config: GroupConfig) -> Self {
        let sensitive_word_rules = config
            .sensitive_word_config
            .as_ref()
            .map(|c| {
                c.words
                    .iter()
                    .filter(|rule| !rule.keyword.is_empty())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let domain_whitelist = config
            .link_message_filter
            .as_ref()
            .map(|f| {
                f.domain_whitelist
                    .iter()
                    .filter(|domain| !domain.is_empty())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            config,
            sensitive_word_rules,
            domain_whitelist,
        }
    }

    /// The config this checker was compiled from.
    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    /// Number of usable sensitive-word rules.
    pub fn rule_count(&self) -> usize {
        self.sensitive_word_rules.len()
    }

    /// Evaluate one message.
    ///
    /// # Arguments
    /// * `kind` - Classified message type
    /// * `content` - Text (or caption) of the message
    /// * `is_forwarded` - Whether the message was forwarded from elsewhere
    ///
    /// # Returns
    /// The verdict of the first stage that fires, or a pass.
    pub fn check_all(
        &self,
        kind: MessageKind,
        content: &str,
        is_forwarded: bool,
    ) -> FilterResult<'_> {
        if let Some(rule) = self.check_sensitive_word(content) {
            return FilterResult::sensitive(rule);
        }

        let by_type = if is_forwarded {
            self.check_forward_message(kind)
        } else {
            self.check_member_message(kind)
        };
        if let Some(reason) = by_type {
            return FilterResult::delete(reason);
        }

        if let Some(reason) = self.check_link_message(content) {
            return FilterResult::delete(reason);
        }

        FilterResult::pass()
    }

    /// First rule whose keyword occurs in `content`.
    pub fn check_sensitive_word(&self, content: &str) -> Option<&SensitiveWordRule> {
        self.sensitive_word_rules
            .iter()
            .find(|rule| content.contains(rule.keyword.as_str()))
    }

    /// Type-based check for messages a member sent directly.
    pub fn check_member_message(&self, kind: MessageKind) -> Option<&'static str> {
        let filter = self
            .config
            .message_filter
            .as_ref()?
            .member_message_filter
            .as_ref()?;

        match kind {
            MessageKind::BotCommand if filter.delete_bot_command_msg => Some("delete bot command"),
            MessageKind::Image if filter.delete_image_msg => Some("delete image"),
            MessageKind::Voice if filter.delete_voice_msg => Some("delete voice"),
            MessageKind::Document if filter.delete_document_msg => Some("delete document"),
            MessageKind::Sticker if filter.delete_sticker_msg => Some("delete sticker"),
            MessageKind::Dice if filter.delete_dice_msg => Some("delete dice"),
            _ => None,
        }
    }

    /// Type-based check for forwarded messages.
    pub fn check_forward_message(&self, kind: MessageKind) -> Option<&'static str> {
        let filter = self
            .config
            .message_filter
            .as_ref()?
            .forward_message_filter
            .as_ref()?;

        if filter.delete_all_forward_msg {
            return Some("delete all forward");
        }

        match kind {
            MessageKind::Image if filter.delete_image_msg => Some("delete image in forward"),
            MessageKind::Animation if filter.delete_animation_msg => {
                Some("delete animation in forward")
            }
            MessageKind::Video if filter.delete_video_msg => Some("delete video in forward"),
            _ => None,
        }
    }

    /// Link check. Stops at the first link no whitelist entry covers.
    pub fn check_link_message(&self, content: &str) -> Option<&'static str> {
        let filter = self.config.link_message_filter.as_ref()?;
        if !filter.delete_link_messages {
            return None;
        }

        LINK_RE
            .find_iter(content)
            .any(|link| !self.is_whitelisted(link.as_str()))
            .then_some("delete link: not in whitelist")
    }

    // Substring match, not host-boundary aware.
    fn is_whitelisted(&self, link: &str) -> bool {
        self.domain_whitelist
            .iter()
            .any(|domain| link.contains(domain.as_str()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
