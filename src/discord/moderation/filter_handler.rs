// Discord-specific filter handling - describes messages for the checker and
// translates its verdicts into Discord actions.

use crate::core::group_filter::{MessageDescriptor, MessageKind, ModerationAction};
use crate::discord::{Data, Error};
use once_cell::sync::Lazy;
use poise::serenity_prelude as serenity;
use regex::Regex;
use std::time::Duration;

// Discord rejects timeouts longer than 28 days.
const MAX_TIMEOUT: Duration = Duration::from_secs(28 * 24 * 60 * 60);

const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".webp", ".bmp"];
const AUDIO_EXTENSIONS: [&str; 5] = [".ogg", ".mp3", ".m4a", ".wav", ".opus"];
const VIDEO_EXTENSIONS: [&str; 4] = [".mp4", ".mov", ".webm", ".mkv"];

// A slash command name as its own first word: `/start`, not `/usr/bin` or `//`.
static SLASH_COMMAND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/[A-Za-z0-9_-]{1,32}(?:\s|$)").expect("slash command pattern compiles")
});

/// The parts of a Discord message that decide its kind.
pub struct MessageParts<'a> {
    pub content: &'a str,
    pub has_sticker: bool,
    pub is_voice_message: bool,
    /// (content type, filename) per attachment, in upload order
    pub attachments: Vec<(Option<&'a str>, &'a str)>,
}

/// Map a message onto the checker's vocabulary.
///
/// Commands win over media, stickers over attachments, and the first
/// attachment decides for multi-file uploads.
pub fn classify(parts: &MessageParts<'_>, command_prefix: &str) -> MessageKind {
    let trimmed = parts.content.trim_start();
    let is_command = SLASH_COMMAND_RE.is_match(trimmed)
        || (!command_prefix.is_empty() && trimmed.starts_with(command_prefix));
    if is_command {
        return MessageKind::BotCommand;
    }

    if parts.has_sticker {
        return MessageKind::Sticker;
    }

    if parts.is_voice_message {
        return MessageKind::Voice;
    }

    match parts.attachments.first() {
        Some((content_type, filename)) => attachment_kind(*content_type, filename),
        None => MessageKind::Text,
    }
}

fn attachment_kind(content_type: Option<&str>, filename: &str) -> MessageKind {
    let mime = content_type.unwrap_or_default().to_ascii_lowercase();
    let name = filename.to_ascii_lowercase();
    let has_ext = |exts: &[&str]| exts.iter().any(|ext| name.ends_with(ext));

    if mime == "image/gif" || name.ends_with(".gif") {
        MessageKind::Animation
    } else if mime.starts_with("image/") || has_ext(&IMAGE_EXTENSIONS) {
        MessageKind::Image
    } else if mime.starts_with("audio/") || has_ext(&AUDIO_EXTENSIONS) {
        MessageKind::Voice
    } else if mime.starts_with("video/") || has_ext(&VIDEO_EXTENSIONS) {
        MessageKind::Video
    } else {
        MessageKind::Document
    }
}

/// Whether a message reference marks a forward. Replies and crossposts
/// carry default references.
pub fn is_forward(reference: Option<&serenity::MessageReference>) -> bool {
    reference.is_some_and(|r| r.kind == serenity::MessageReferenceKind::Forward)
}

fn message_parts<'a>(
    content: &'a str,
    stickers: &[serenity::StickerItem],
    flags: Option<serenity::MessageFlags>,
    attachments: &'a [serenity::Attachment],
) -> MessageParts<'a> {
    MessageParts {
        content,
        has_sticker: !stickers.is_empty(),
        is_voice_message: flags
            .is_some_and(|flags| flags.contains(serenity::MessageFlags::IS_VOICE_MESSAGE)),
        attachments: attachments
            .iter()
            .map(|a| (a.content_type.as_deref(), a.filename.as_str()))
            .collect(),
    }
}

/// Build the platform-neutral descriptor for a Discord message.
///
/// A forward's own body is empty; its text and files live in the first
/// message snapshot, so that is what gets classified and scanned.
pub fn describe_message(msg: &serenity::Message, command_prefix: &str) -> MessageDescriptor {
    let is_forwarded = is_forward(msg.message_reference.as_ref());
    let snapshot = msg
        .message_snapshots
        .first()
        .filter(|_| is_forwarded);

    let parts = match snapshot {
        Some(snap) => message_parts(
            &snap.content,
            &snap.sticker_items,
            snap.flags,
            &snap.attachments,
        ),
        None => message_parts(&msg.content, &msg.sticker_items, msg.flags, &msg.attachments),
    };

    MessageDescriptor {
        kind: classify(&parts, command_prefix),
        content: parts.content.to_string(),
        is_forwarded,
    }
}

/// Timeout to apply for a mute. No duration means as long as Discord allows.
pub fn timeout_length(duration: Option<Duration>) -> Duration {
    duration.map_or(MAX_TIMEOUT, |d| d.min(MAX_TIMEOUT))
}

/// Run a guild message through its group's filter and apply the outcome.
///
/// Returns `true` if the message triggered a filter.
pub async fn handle_message_for_filter(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<bool, Error> {
    // Skip bots
    if msg.author.bot {
        return Ok(false);
    }

    // Only check guild messages
    let guild_id = match msg.guild_id {
        Some(id) => id.get(),
        None => return Ok(false),
    };

    let descriptor = describe_message(msg, &data.command_prefix);
    let action = data
        .group_filter
        .evaluate(guild_id, &descriptor)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if action == ModerationAction::None {
        return Ok(false);
    }

    apply_filter_action(ctx, msg, &action).await?;

    Ok(true)
}

/// Apply the planned action for a filtered message.
async fn apply_filter_action(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    action: &ModerationAction,
) -> Result<(), Error> {
    match action {
        ModerationAction::None => {}

        ModerationAction::Flag { keyword } => {
            tracing::info!(
                guild_id = ?msg.guild_id,
                user_id = msg.author.id.get(),
                message_id = msg.id.get(),
                keyword = %keyword,
                "Flagged message with sensitive word"
            );
        }

        ModerationAction::DeleteMessage { reason } => {
            if let Err(e) = msg.delete(&ctx.http).await {
                tracing::warn!("Failed to delete filtered message ({}): {}", reason, e);
            }
        }

        ModerationAction::Mute { keyword, duration } => {
            if let Err(e) = msg.delete(&ctx.http).await {
                tracing::warn!("Failed to delete message with sensitive word: {}", e);
            }

            let Some(guild_id) = msg.guild_id else {
                return Ok(());
            };

            let length = timeout_length(*duration);
            let timeout_until = match serenity::Timestamp::from_unix_timestamp(
                chrono::Utc::now().timestamp() + length.as_secs() as i64,
            ) {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::error!("Failed to create timeout timestamp: {}", e);
                    return Ok(());
                }
            };

            if let Err(e) = guild_id
                .edit_member(
                    &ctx.http,
                    msg.author.id,
                    serenity::EditMember::new().disable_communication_until_datetime(timeout_until),
                )
                .await
            {
                tracing::error!("Failed to timeout user: {}", e);
            } else {
                tracing::info!(
                    guild_id = guild_id.get(),
                    user_id = msg.author.id.get(),
                    keyword = %keyword,
                    timeout_secs = length.as_secs(),
                    "Muted member for sensitive word"
                );

                let notice = format!(
                    "🔇 <@{}> has been muted for {} minutes: message contained a blocked word.",
                    msg.author.id,
                    length.as_secs().div_ceil(60)
                );
                if let Err(e) = msg.channel_id.say(&ctx.http, &notice).await {
                    tracing::warn!("Failed to send mute notification: {}", e);
                }
            }
        }
    }

    Ok(())
}
