// Group filter domain models - the declarative shape of a group's moderation policy.
//
// These are pure domain types with no Discord dependencies.
// Every field defaults to "do not filter", so a partially populated
// document decodes into a config that only restricts what it names.

use super::group_filter_service::GroupFilterError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Full moderation policy for one group.
///
/// A missing sub-filter means that dimension is not filtered at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_options: Option<JoinOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_filter: Option<MessageFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_message_filter: Option<LinkMessageFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive_word_config: Option<SensitiveWordConfig>,
}

impl GroupConfig {
    /// Decode a config document. An empty or blank document is the default config.
    pub fn from_json(raw: &str) -> Result<Self, GroupFilterError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|e| GroupFilterError::InvalidConfig(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, GroupFilterError> {
        serde_json::to_string(self).map_err(|e| GroupFilterError::InvalidConfig(e.to_string()))
    }

    /// Sensitive-word rules, creating the block if it is absent.
    pub fn sensitive_words_mut(&mut self) -> &mut Vec<SensitiveWordRule> {
        &mut self
            .sensitive_word_config
            .get_or_insert_with(SensitiveWordConfig::default)
            .words
    }

    pub fn link_filter_mut(&mut self) -> &mut LinkMessageFilter {
        self.link_message_filter
            .get_or_insert_with(LinkMessageFilter::default)
    }

    pub fn member_filter_mut(&mut self) -> &mut MemberMessageFilter {
        self.message_filter
            .get_or_insert_with(MessageFilter::default)
            .member_message_filter
            .get_or_insert_with(MemberMessageFilter::default)
    }

    pub fn forward_filter_mut(&mut self) -> &mut ForwardMessageFilter {
        self.message_filter
            .get_or_insert_with(MessageFilter::default)
            .forward_message_filter
            .get_or_insert_with(ForwardMessageFilter::default)
    }
}

/// Ordered sensitive-word rules. The first matching rule wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitiveWordConfig {
    pub words: Vec<SensitiveWordRule>,
}

/// A single keyword-to-action mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitiveWordRule {
    /// Plain substring, matched case-sensitively
    pub keyword: String,
    #[serde(rename = "handle_action")]
    pub action: SensitiveWordAction,
    /// Only meaningful for `BanUser`
    #[serde(rename = "ban_duration")]
    pub ban_duration_secs: i64,
}

impl SensitiveWordRule {
    pub fn new(keyword: impl Into<String>, action: SensitiveWordAction, ban_duration_secs: i64) -> Self {
        Self {
            keyword: keyword.into(),
            action,
            ban_duration_secs,
        }
    }
}

/// What the action layer should do with the sender when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SensitiveWordAction {
    /// Record the hit, leave the sender alone
    #[default]
    NoAction,
    /// Mute/ban the sender for `ban_duration_secs`
    BanUser,
}

impl From<SensitiveWordAction> for u8 {
    fn from(action: SensitiveWordAction) -> Self {
        match action {
            SensitiveWordAction::NoAction => 0,
            SensitiveWordAction::BanUser => 1,
        }
    }
}

impl TryFrom<u8> for SensitiveWordAction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SensitiveWordAction::NoAction),
            1 => Ok(SensitiveWordAction::BanUser),
            other => Err(format!("unknown sensitive word action {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_message_filter: Option<MemberMessageFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_message_filter: Option<ForwardMessageFilter>,
}

/// Link deletion with a domain whitelist.
///
/// Whitelist entries are matched as substrings of the link text, not as hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkMessageFilter {
    #[serde(rename = "delete_link_msg")]
    pub delete_link_messages: bool,
    pub domain_whitelist: Vec<String>,
}

/// Per-type deletion toggles for messages members send directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberMessageFilter {
    pub delete_bot_command_msg: bool,
    pub delete_image_msg: bool,
    pub delete_voice_msg: bool,
    pub delete_document_msg: bool,
    pub delete_sticker_msg: bool,
    pub delete_dice_msg: bool,
}

impl MemberMessageFilter {
    /// The toggle governing `kind`, if members' messages of that kind are filterable.
    pub fn toggle_mut(&mut self, kind: MessageKind) -> Option<&mut bool> {
        match kind {
            MessageKind::BotCommand => Some(&mut self.delete_bot_command_msg),
            MessageKind::Image => Some(&mut self.delete_image_msg),
            MessageKind::Voice => Some(&mut self.delete_voice_msg),
            MessageKind::Document => Some(&mut self.delete_document_msg),
            MessageKind::Sticker => Some(&mut self.delete_sticker_msg),
            MessageKind::Dice => Some(&mut self.delete_dice_msg),
            _ => None,
        }
    }
}

/// Deletion toggles for forwarded messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardMessageFilter {
    pub delete_image_msg: bool,
    pub delete_animation_msg: bool,
    pub delete_video_msg: bool,
    pub delete_all_forward_msg: bool,
}

impl ForwardMessageFilter {
    pub fn toggle_mut(&mut self, kind: MessageKind) -> Option<&mut bool> {
        match kind {
            MessageKind::Image => Some(&mut self.delete_image_msg),
            MessageKind::Animation => Some(&mut self.delete_animation_msg),
            MessageKind::Video => Some(&mut self.delete_video_msg),
            _ => None,
        }
    }
}

// ============================================================================
// JOIN OPTIONS (stored only, nothing evaluates these yet)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinOptions {
    pub method: JoinMethod,
    /// Only meaningful when `method` is `Verification`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_config: Option<VerificationConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum JoinMethod {
    #[default]
    Anyone,
    InviteOnly,
    Verification,
    Closed,
}

impl From<JoinMethod> for u8 {
    fn from(method: JoinMethod) -> Self {
        match method {
            JoinMethod::Anyone => 0,
            JoinMethod::InviteOnly => 1,
            JoinMethod::Verification => 2,
            JoinMethod::Closed => 3,
        }
    }
}

impl TryFrom<u8> for JoinMethod {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(JoinMethod::Anyone),
            1 => Ok(JoinMethod::InviteOnly),
            2 => Ok(JoinMethod::Verification),
            3 => Ok(JoinMethod::Closed),
            other => Err(format!("unknown join method {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// How long a new member has to pass verification
    pub wait_time_seconds: i64,
    /// How long a rejected member must wait before rejoining
    pub rejoin_cooldown_seconds: i64,
    pub method: VerificationMethod,
    pub prompt_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VerificationMethod {
    #[default]
    None,
    Question,
    Manual,
}

impl From<VerificationMethod> for u8 {
    fn from(method: VerificationMethod) -> Self {
        match method {
            VerificationMethod::None => 0,
            VerificationMethod::Question => 1,
            VerificationMethod::Manual => 2,
        }
    }
}

impl TryFrom<u8> for VerificationMethod {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VerificationMethod::None),
            1 => Ok(VerificationMethod::Question),
            2 => Ok(VerificationMethod::Manual),
            other => Err(format!("unknown verification method {}", other)),
        }
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

/// Message type vocabulary understood by the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    BotCommand,
    Image,
    Voice,
    Document,
    Sticker,
    Dice,
    Animation,
    Video,
    /// Anything the checker does not special-case
    Other,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::BotCommand => "bot_command",
            MessageKind::Image => "image",
            MessageKind::Voice => "voice",
            MessageKind::Document => "document",
            MessageKind::Sticker => "sticker",
            MessageKind::Dice => "dice",
            MessageKind::Animation => "animation",
            MessageKind::Video => "video",
            MessageKind::Other => "other",
        }
    }
}

impl From<&str> for MessageKind {
    fn from(value: &str) -> Self {
        match value {
            "text" => MessageKind::Text,
            "bot_command" => MessageKind::BotCommand,
            "image" => MessageKind::Image,
            "voice" => MessageKind::Voice,
            "document" => MessageKind::Document,
            "sticker" => MessageKind::Sticker,
            "dice" => MessageKind::Dice,
            "animation" => MessageKind::Animation,
            "video" => MessageKind::Video,
            _ => MessageKind::Other,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform-neutral description of an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    pub kind: MessageKind,
    pub content: String,
    pub is_forwarded: bool,
}

// ============================================================================
// VERDICTS
// ============================================================================

/// Verdict for one message, borrowing the matched rule from its checker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterResult<'a> {
    pub should_delete: bool,
    /// Short diagnostic, empty when nothing fired
    pub reason: &'static str,
    pub sensitive_hit: bool,
    pub sensitive_rule: Option<&'a SensitiveWordRule>,
}

impl<'a> FilterResult<'a> {
    /// Nothing to do.
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn delete(reason: &'static str) -> Self {
        Self {
            should_delete: true,
            reason,
            ..Self::default()
        }
    }

    pub fn sensitive(rule: &'a SensitiveWordRule) -> Self {
        Self {
            sensitive_hit: true,
            sensitive_rule: Some(rule),
            ..Self::default()
        }
    }

    pub fn is_pass(&self) -> bool {
        !self.should_delete && !self.sensitive_hit
    }

    /// Turn the verdict into an owned plan for the action layer.
    pub fn to_action(&self) -> ModerationAction {
        if let Some(rule) = self.sensitive_rule.filter(|_| self.sensitive_hit) {
            return match rule.action {
                SensitiveWordAction::NoAction => ModerationAction::Flag {
                    keyword: rule.keyword.clone(),
                },
                SensitiveWordAction::BanUser => ModerationAction::Mute {
                    keyword: rule.keyword.clone(),
                    duration: u64::try_from(rule.ban_duration_secs)
                        .ok()
                        .filter(|secs| *secs > 0)
                        .map(Duration::from_secs),
                },
            };
        }

        if self.should_delete {
            ModerationAction::DeleteMessage {
                reason: self.reason.to_string(),
            }
        } else {
            ModerationAction::None
        }
    }
}

/// What the platform layer should actually do about a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAction {
    /// Message is fine
    None,
    /// Sensitive word hit on a rule with no sanction - log only
    Flag { keyword: String },
    /// Sensitive word hit on a ban rule. `None` duration means indefinitely.
    Mute {
        keyword: String,
        duration: Option<Duration>,
    },
    /// Delete the message without sanctioning the sender
    DeleteMessage { reason: String },
}

// ============================================================================
// STORAGE RECORD
// ============================================================================

/// A group as the store persists it: the config stays serialized here and is
/// only decoded into a `GroupConfig` at the service boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub group_id: u64,
    pub config_json: String,
    pub updated_at: DateTime<Utc>,
}

impl GroupRecord {
    pub fn new(group_id: u64, config: &GroupConfig) -> Result<Self, GroupFilterError> {
        Ok(Self {
            group_id,
            config_json: config.to_json()?,
            updated_at: Utc::now(),
        })
    }

    pub fn decode_config(&self) -> Result<GroupConfig, GroupFilterError> {
        GroupConfig::from_json(&self.config_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_leaves_other_dimensions_absent() {
        let config = GroupConfig::from_json(
            r#"{"link_message_filter":{"delete_link_msg":true,"domain_whitelist":["example.com"]}}"#,
        )
        .unwrap();

        let links = config.link_message_filter.as_ref().unwrap();
        assert!(links.delete_link_messages);
        assert_eq!(links.domain_whitelist, vec!["example.com".to_string()]);
        assert!(config.message_filter.is_none());
        assert!(config.sensitive_word_config.is_none());
        assert!(config.join_options.is_none());
    }

    #[test]
    fn test_blank_document_is_default_config() {
        assert_eq!(GroupConfig::from_json("").unwrap(), GroupConfig::default());
        assert_eq!(GroupConfig::from_json("  \n").unwrap(), GroupConfig::default());
        assert_eq!(GroupConfig::from_json("{}").unwrap(), GroupConfig::default());
    }

    #[test]
    fn test_enums_are_encoded_as_integers() {
        let config = GroupConfig::from_json(
            r#"{
                "sensitive_word_config": {"words": [
                    {"keyword": "spam", "handle_action": 1, "ban_duration": 60},
                    {"keyword": "meh"}
                ]},
                "join_options": {
                    "method": 2,
                    "verification_config": {"wait_time_seconds": 120, "method": 1, "prompt_message": "2+2?"}
                }
            }"#,
        )
        .unwrap();

        let words = &config.sensitive_word_config.as_ref().unwrap().words;
        assert_eq!(words[0], SensitiveWordRule::new("spam", SensitiveWordAction::BanUser, 60));
        assert_eq!(words[1], SensitiveWordRule::new("meh", SensitiveWordAction::NoAction, 0));

        let join = config.join_options.as_ref().unwrap();
        assert_eq!(join.method, JoinMethod::Verification);
        let verification = join.verification_config.as_ref().unwrap();
        assert_eq!(verification.wait_time_seconds, 120);
        assert_eq!(verification.rejoin_cooldown_seconds, 0);
        assert_eq!(verification.method, VerificationMethod::Question);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["sensitive_word_config"]["words"][0]["handle_action"], 1);
        assert_eq!(json["join_options"]["method"], 2);
    }

    #[test]
    fn test_unknown_discriminant_is_rejected() {
        let err = GroupConfig::from_json(r#"{"join_options":{"method":9}}"#).unwrap_err();
        assert!(matches!(err, GroupFilterError::InvalidConfig(_)));
    }

    #[test]
    fn test_mut_accessors_create_missing_blocks() {
        let mut config = GroupConfig::default();
        *config.member_filter_mut().toggle_mut(MessageKind::Sticker).unwrap() = true;
        config.forward_filter_mut().delete_all_forward_msg = true;

        let filter = config.message_filter.as_ref().unwrap();
        assert!(filter.member_message_filter.unwrap().delete_sticker_msg);
        assert!(filter.forward_message_filter.unwrap().delete_all_forward_msg);
        assert!(config.member_filter_mut().toggle_mut(MessageKind::Video).is_none());
        assert!(config.forward_filter_mut().toggle_mut(MessageKind::Sticker).is_none());
    }

    #[test]
    fn test_message_kind_vocabulary() {
        for name in [
            "text",
            "bot_command",
            "image",
            "voice",
            "document",
            "sticker",
            "dice",
            "animation",
            "video",
        ] {
            assert_eq!(MessageKind::from(name).as_str(), name);
        }
        assert_eq!(MessageKind::from("poll"), MessageKind::Other);
        assert_eq!(MessageKind::from("Image"), MessageKind::Other);
    }

    #[test]
    fn test_verdict_to_action() {
        let ban = SensitiveWordRule::new("spam", SensitiveWordAction::BanUser, 60);
        assert_eq!(
            FilterResult::sensitive(&ban).to_action(),
            ModerationAction::Mute {
                keyword: "spam".to_string(),
                duration: Some(Duration::from_secs(60)),
            }
        );

        let forever = SensitiveWordRule::new("scam", SensitiveWordAction::BanUser, 0);
        assert_eq!(
            FilterResult::sensitive(&forever).to_action(),
            ModerationAction::Mute {
                keyword: "scam".to_string(),
                duration: None,
            }
        );

        let watch = SensitiveWordRule::new("hmm", SensitiveWordAction::NoAction, 60);
        assert_eq!(
            FilterResult::sensitive(&watch).to_action(),
            ModerationAction::Flag {
                keyword: "hmm".to_string()
            }
        );

        assert_eq!(
            FilterResult::delete("delete sticker").to_action(),
            ModerationAction::DeleteMessage {
                reason: "delete sticker".to_string()
            }
        );
        assert_eq!(FilterResult::pass().to_action(), ModerationAction::None);
    }

    #[test]
    fn test_record_decodes_what_it_encoded() {
        let mut config = GroupConfig::default();
        config.link_filter_mut().delete_link_messages = true;

        let record = GroupRecord::new(42, &config).unwrap();
        assert_eq!(record.group_id, 42);
        assert_eq!(record.decode_config().unwrap(), config);
    }
}
