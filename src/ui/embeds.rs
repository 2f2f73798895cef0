use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::audio::queue::{QueuePage, QueuedTrack};

/// Standard colour palette for the bot
pub mod colors {
    use serenity::all::Colour;

    pub const BLURPLE: Colour = Colour::BLURPLE;
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Kronos";

/// "Now playing" card sent to the channel a track was requested from.
pub fn now_playing(track: &QueuedTrack) -> CreateEmbed {
    let metadata = &track.metadata;

    let duration = if metadata.duration.is_empty() {
        "🔴 Live".to_string()
    } else {
        metadata.duration.clone()
    };

    let uploader = match &metadata.uploader_url {
        Some(url) => format!("[{}]({})", metadata.uploader, url),
        None => metadata.uploader.clone(),
    };

    let mut embed = CreateEmbed::default()
        .title("Now playing")
        .description(format!("```css\n{}\n```", metadata.title))
        .color(colors::BLURPLE)
        .field("Duration", duration, true)
        .field("Requested by", format!("<@{}>", track.requested_by), true)
        .field("Uploader", uploader, true)
        .field("URL", format!("[Click]({})", metadata.url), true);

    if let Some(thumbnail) = &metadata.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// One page of pending tracks, numbered from 1.
pub fn queue_page(page: &QueuePage<QueuedTrack>) -> CreateEmbed {
    if page.total_items == 0 {
        return CreateEmbed::default()
            .description("😴 **Empty queue.**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    let listing: String = page
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "`{}.` [**{}**]({})\n",
                page.offset + i + 1,
                item.metadata.title,
                item.metadata.url
            )
        })
        .collect();

    CreateEmbed::default()
        .description(format!("**{} tracks:**\n\n{}", page.total_items, listing))
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(format!(
            "Viewing page {}/{}",
            page.current_page, page.total_pages
        )))
}

pub fn error(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(description)
        .color(colors::ERROR_RED)
}
