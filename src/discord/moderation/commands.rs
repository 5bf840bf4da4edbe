// Group filter slash commands for configuration.

use crate::core::group_filter::{
    GroupConfig, JoinMethod, JoinOptions, MessageKind, SensitiveWordAction, VerificationConfig,
    VerificationMethod,
};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use poise::ChoiceParameter;

type Context<'a> = poise::Context<'a, Data, Error>;

// Embed field values are capped at 1024 characters.
const FIELD_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum WordActionChoice {
    #[name = "Delete and mute"]
    Mute,
    #[name = "Log only"]
    Flag,
}

impl From<WordActionChoice> for SensitiveWordAction {
    fn from(choice: WordActionChoice) -> Self {
        match choice {
            WordActionChoice::Mute => SensitiveWordAction::BanUser,
            WordActionChoice::Flag => SensitiveWordAction::NoAction,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum MemberKindChoice {
    #[name = "Bot commands"]
    BotCommand,
    #[name = "Images"]
    Image,
    #[name = "Voice"]
    Voice,
    #[name = "Files"]
    Document,
    #[name = "Stickers"]
    Sticker,
    #[name = "Dice"]
    Dice,
}

impl From<MemberKindChoice> for MessageKind {
    fn from(choice: MemberKindChoice) -> Self {
        match choice {
            MemberKindChoice::BotCommand => MessageKind::BotCommand,
            MemberKindChoice::Image => MessageKind::Image,
            MemberKindChoice::Voice => MessageKind::Voice,
            MemberKindChoice::Document => MessageKind::Document,
            MemberKindChoice::Sticker => MessageKind::Sticker,
            MemberKindChoice::Dice => MessageKind::Dice,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ForwardKindChoice {
    #[name = "All forwards"]
    All,
    #[name = "Images"]
    Image,
    #[name = "GIFs"]
    Animation,
    #[name = "Videos"]
    Video,
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum JoinMethodChoice {
    #[name = "Anyone"]
    Anyone,
    #[name = "Invite only"]
    InviteOnly,
    #[name = "Verification"]
    Verification,
    #[name = "Closed"]
    Closed,
}

impl From<JoinMethodChoice> for JoinMethod {
    fn from(choice: JoinMethodChoice) -> Self {
        match choice {
            JoinMethodChoice::Anyone => JoinMethod::Anyone,
            JoinMethodChoice::InviteOnly => JoinMethod::InviteOnly,
            JoinMethodChoice::Verification => JoinMethod::Verification,
            JoinMethodChoice::Closed => JoinMethod::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum VerificationChoice {
    #[name = "None"]
    None,
    #[name = "Question"]
    Question,
    #[name = "Manual approval"]
    Manual,
}

impl From<VerificationChoice> for VerificationMethod {
    fn from(choice: VerificationChoice) -> Self {
        match choice {
            VerificationChoice::None => VerificationMethod::None,
            VerificationChoice::Question => VerificationMethod::Question,
            VerificationChoice::Manual => VerificationMethod::Manual,
        }
    }
}

/// Message filter configuration commands.
///
/// Configure sensitive words, link filtering and message type filters for your server.
#[poise::command(
    slash_command,
    subcommands(
        "status",
        "word_add",
        "word_remove",
        "links",
        "whitelist_add",
        "whitelist_remove",
        "member",
        "forward",
        "join",
        "export",
        "reset"
    ),
    required_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn groupfilter(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "✅"
    } else {
        "❌"
    }
}

fn join_method_label(method: JoinMethod) -> &'static str {
    match method {
        JoinMethod::Anyone => "Anyone",
        JoinMethod::InviteOnly => "Invite only",
        JoinMethod::Verification => "Verification",
        JoinMethod::Closed => "Closed",
    }
}

fn truncate_field(mut text: String) -> String {
    if text.len() > FIELD_LIMIT {
        let mut cut = FIELD_LIMIT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push('…');
    }
    text
}

/// Embed fields summarising a config, in display order.
fn summarize(config: &GroupConfig) -> Vec<(&'static str, String)> {
    let words = config
        .sensitive_word_config
        .as_ref()
        .map(|c| c.words.as_slice())
        .unwrap_or_default();
    let word_list = if words.is_empty() {
        "None".to_string()
    } else {
        words
            .iter()
            .map(|rule| match rule.action {
                SensitiveWordAction::BanUser if rule.ban_duration_secs > 0 => {
                    format!("`{}` → mute {}s", rule.keyword, rule.ban_duration_secs)
                }
                SensitiveWordAction::BanUser => format!("`{}` → mute", rule.keyword),
                SensitiveWordAction::NoAction => format!("`{}` → log", rule.keyword),
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let link = config.link_message_filter.clone().unwrap_or_default();
    let whitelist = if link.domain_whitelist.is_empty() {
        "no whitelist".to_string()
    } else {
        link.domain_whitelist.join(", ")
    };

    let filter = config.message_filter.clone().unwrap_or_default();
    let member = filter.member_message_filter.unwrap_or_default();
    let forward = filter.forward_message_filter.unwrap_or_default();

    let join = config.join_options.clone().unwrap_or_default();

    vec![
        ("Sensitive Words", truncate_field(word_list)),
        (
            "Links",
            truncate_field(format!(
                "{} delete links ({})",
                on_off(link.delete_link_messages),
                whitelist
            )),
        ),
        (
            "Member Messages",
            format!(
                "{} Bot commands\n{} Images\n{} Voice\n{} Files\n{} Stickers\n{} Dice",
                on_off(member.delete_bot_command_msg),
                on_off(member.delete_image_msg),
                on_off(member.delete_voice_msg),
                on_off(member.delete_document_msg),
                on_off(member.delete_sticker_msg),
                on_off(member.delete_dice_msg)
            ),
        ),
        (
            "Forwarded Messages",
            format!(
                "{} All\n{} Images\n{} GIFs\n{} Videos",
                on_off(forward.delete_all_forward_msg),
                on_off(forward.delete_image_msg),
                on_off(forward.delete_animation_msg),
                on_off(forward.delete_video_msg)
            ),
        ),
        ("Join Method", join_method_label(join.method).to_string()),
    ]
}

/// Show the filters currently enforced.
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let checker = ctx
        .data()
        .group_filter
        .checker(guild_id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    let mut embed = serenity::CreateEmbed::new()
        .title("🛡️ Group Filter Status")
        .color(0x5865F2);
    for (name, value) in summarize(checker.config()) {
        embed = embed.field(name, value, name != "Sensitive Words");
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Add a sensitive word. Earlier words take priority.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn word_add(
    ctx: Context<'_>,
    #[description = "Word or phrase to match (case-sensitive)"] keyword: String,
    #[description = "What to do when it matches"] action: WordActionChoice,
    #[description = "Mute length in minutes (default: as long as possible)"] mute_minutes: Option<
        u32,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let ban_duration_secs = mute_minutes.map_or(0, |m| i64::from(m) * 60);

    ctx.data()
        .group_filter
        .add_sensitive_word(guild_id.get(), &keyword, action.into(), ban_duration_secs)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.say(format!("✅ Added sensitive word `{}`.", keyword))
        .await?;
    Ok(())
}

/// Remove a sensitive word.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn word_remove(
    ctx: Context<'_>,
    #[description = "Word or phrase to remove"] keyword: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let removed = ctx
        .data()
        .group_filter
        .remove_sensitive_word(guild_id.get(), &keyword)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if removed == 0 {
        ctx.say(format!("❌ `{}` is not a sensitive word.", keyword))
            .await?;
    } else {
        ctx.say(format!("✅ Removed sensitive word `{}`.", keyword))
            .await?;
    }
    Ok(())
}

/// Turn link deletion on or off.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn links(
    ctx: Context<'_>,
    #[description = "Delete messages with non-whitelisted links"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    ctx.data()
        .group_filter
        .set_link_filter_enabled(guild_id.get(), enabled)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.say(format!(
        "{} Link filtering has been **{}**.",
        on_off(enabled),
        if enabled { "enabled" } else { "disabled" }
    ))
    .await?;
    Ok(())
}

/// Allow links containing a domain.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn whitelist_add(
    ctx: Context<'_>,
    #[description = "Domain, e.g. github.com"] domain: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let added = ctx
        .data()
        .group_filter
        .add_whitelist_domain(guild_id.get(), &domain)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if added {
        ctx.say(format!("✅ Links containing `{}` are now allowed.", domain.trim()))
            .await?;
    } else {
        ctx.say(format!("`{}` is already whitelisted.", domain.trim()))
            .await?;
    }
    Ok(())
}

/// Remove a domain from the link whitelist.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn whitelist_remove(
    ctx: Context<'_>,
    #[description = "Domain to remove"] domain: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let removed = ctx
        .data()
        .group_filter
        .remove_whitelist_domain(guild_id.get(), &domain)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if removed {
        ctx.say(format!("✅ Removed `{}` from the whitelist.", domain.trim()))
            .await?;
    } else {
        ctx.say(format!("❌ `{}` is not whitelisted.", domain.trim()))
            .await?;
    }
    Ok(())
}

/// Delete members' messages of a given type.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn member(
    ctx: Context<'_>,
    #[description = "Message type"] kind: MemberKindChoice,
    #[description = "Delete messages of this type"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    ctx.data()
        .group_filter
        .set_member_filter(guild_id.get(), kind.into(), enabled)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.say(format!(
        "{} Deleting {} messages: **{}**.",
        on_off(enabled),
        kind.name(),
        if enabled { "on" } else { "off" }
    ))
    .await?;
    Ok(())
}

/// Delete forwarded messages, all of them or by type.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn forward(
    ctx: Context<'_>,
    #[description = "Which forwarded messages"] kind: ForwardKindChoice,
    #[description = "Delete them"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let service = &ctx.data().group_filter;

    let result = match kind {
        ForwardKindChoice::All => service.set_forward_all(guild_id.get(), enabled).await,
        ForwardKindChoice::Image => {
            service
                .set_forward_filter(guild_id.get(), MessageKind::Image, enabled)
                .await
        }
        ForwardKindChoice::Animation => {
            service
                .set_forward_filter(guild_id.get(), MessageKind::Animation, enabled)
                .await
        }
        ForwardKindChoice::Video => {
            service
                .set_forward_filter(guild_id.get(), MessageKind::Video, enabled)
                .await
        }
    };
    result.map_err(|e| Error::from(e.to_string()))?;

    ctx.say(format!(
        "{} Deleting forwarded {}: **{}**.",
        on_off(enabled),
        kind.name(),
        if enabled { "on" } else { "off" }
    ))
    .await?;
    Ok(())
}

/// Set how new members may join. Stored with the group config.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn join(
    ctx: Context<'_>,
    #[description = "Join method"] method: JoinMethodChoice,
    #[description = "Verification method (verification only)"] verification: Option<
        VerificationChoice,
    >,
    #[description = "Seconds to pass verification (default: 300)"] wait_secs: Option<u32>,
    #[description = "Seconds before a rejected member may rejoin (default: 0)"]
    cooldown_secs: Option<u32>,
    #[description = "Message shown to new members"] prompt: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let method = JoinMethod::from(method);
    let verification_config = if method == JoinMethod::Verification {
        Some(VerificationConfig {
            wait_time_seconds: i64::from(wait_secs.unwrap_or(300)),
            rejoin_cooldown_seconds: i64::from(cooldown_secs.unwrap_or(0)),
            method: verification
                .map(VerificationMethod::from)
                .unwrap_or_default(),
            prompt_message: prompt.unwrap_or_default(),
        })
    } else {
        None
    };

    ctx.data()
        .group_filter
        .set_join_options(
            guild_id.get(),
            JoinOptions {
                method,
                verification_config,
            },
        )
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.say(format!(
        "✅ Join method set to **{}**.",
        join_method_label(method)
    ))
        .await?;
    Ok(())
}

/// Export the filter configuration as JSON.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn export(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let json = ctx
        .data()
        .group_filter
        .export_config(guild_id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    let reply = poise::CreateReply::default()
        .content("📄 Current filter configuration:")
        .attachment(serenity::CreateAttachment::bytes(
            json.into_bytes(),
            format!("group_filter_{}.json", guild_id.get()),
        ))
        .ephemeral(true);

    ctx.send(reply).await?;
    Ok(())
}

/// Remove all filters for this server.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let existed = ctx
        .data()
        .group_filter
        .remove_group(guild_id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if existed {
        ctx.say("🗑️ All filters for this server have been removed.")
            .await?;
    } else {
        ctx.say("No filters were configured.").await?;
    }
    Ok(())
}
