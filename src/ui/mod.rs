pub mod announcer;
pub mod embeds;

pub use announcer::ChannelAnnouncer;
