use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::{Command, CommandOptionType},
        channel::ChannelType,
        id::GuildId,
        permissions::Permissions,
    },
    prelude::Context,
};

/// Commands gated behind Manage Guild.
const MANAGER_COMMANDS: &[&str] = &["summon", "leave", "disconnect", "pause", "resume", "stop"];

pub fn requires_manage_guild(name: &str) -> bool {
    MANAGER_COMMANDS.contains(&name)
}

/// Registers commands globally
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    Command::set_global_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

/// Registers commands on a single guild (development)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        summon_command(),
        leave_command("leave"),
        leave_command("disconnect"),
        volume_command(),
        now_command("now"),
        now_command("current"),
        now_command("playing"),
        pause_command(),
        resume_command(),
        stop_command(),
        skip_command(),
        queue_command(),
        shuffle_command(),
        remove_command(),
        loop_command(),
        play_command(),
        whoami_command(),
        clear_command(),
    ]
}

// Connection

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Joins your voice channel")
}

fn summon_command() -> CreateCommand {
    CreateCommand::new("summon")
        .description("Summons the bot to a voice channel (yours if none is given)")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .add_option(
            CreateCommandOption::new(CommandOptionType::Channel, "channel", "Voice channel to join")
                .channel_types(vec![ChannelType::Voice]),
        )
}

fn leave_command(name: &str) -> CreateCommand {
    CreateCommand::new(name)
        .description("Clears the queue and leaves the voice channel")
        .default_member_permissions(Permissions::MANAGE_GUILD)
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Plays a song, queued after the current ones")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "search", "URL or search term")
                .required(true),
        )
}

fn now_command(name: &str) -> CreateCommand {
    CreateCommand::new(name).description("Displays the currently playing song")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause")
        .description("Pauses the currently playing song")
        .default_member_permissions(Permissions::MANAGE_GUILD)
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume")
        .description("Resumes a currently paused song")
        .default_member_permissions(Permissions::MANAGE_GUILD)
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop")
        .description("Stops playing song and clears the queue")
        .default_member_permissions(Permissions::MANAGE_GUILD)
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip")
        .description("Votes to skip a song; the requester skips immediately")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Loops the currently playing song; run again to unloop")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Sets the volume of the player")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volume (0-100)")
                .min_int_value(0)
                .max_int_value(100)
                .required(true),
        )
}

// Queue

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Shows the player's queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                .min_int_value(1),
        )
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Shuffles the queue")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Removes a song from the queue at a given position")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "index", "Queue position")
                .min_int_value(1)
                .required(true),
        )
}

// Utilities

fn whoami_command() -> CreateCommand {
    CreateCommand::new("whoami").description("Tells you who you are")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear")
        .description("Deletes the most recent messages in this channel")
        .default_member_permissions(Permissions::MANAGE_MESSAGES)
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "amount", "Messages to delete")
                .min_int_value(1)
                .max_int_value(100),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_commands() {
        for name in ["summon", "leave", "disconnect", "pause", "resume", "stop"] {
            assert!(requires_manage_guild(name), "{} should be gated", name);
        }
        for name in ["join", "play", "skip", "queue", "volume", "now", "loop"] {
            assert!(!requires_manage_guild(name), "{} should be open", name);
        }
    }

    #[test]
    fn test_every_command_registered() {
        assert_eq!(all_commands().len(), 19);
    }
}
