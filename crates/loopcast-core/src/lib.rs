//! Loopcast Core - Playlist playback through an external player
//!
//! This crate provides the playback state machine, the adapter that drives
//! an external player, and the coordinator tying them to playlist storage.

pub mod command;
pub mod coordinator;
pub mod library;
pub mod metadata;
pub mod playback;
pub mod player;
pub mod shuffle;
pub mod source;
pub mod store;
pub mod timer;
pub mod track;
pub mod transfer;

pub use command::{ Command, CommandError, PlaylistRef };
pub use coordinator::{ Coordinator, CoordinatorConfig, CoordinatorHandle, Input, Notice, NoticeLevel, Snapshot };
pub use library::{ AddOutcome, PlaylistLibrary };
pub use playback::{ PlaybackError, PlaybackRate, PlaybackState };
pub use player::{
    ExternalPlayer, PlaybackFault, PlayerAdapter, PlayerBackend, PlayerError, PlayerEvent,
    PlayerEventSink, PlayerState, RawPlayerEvent, VideoData,
};
pub use store::{ JsonStore, StoreError, TrackStore };
pub use track::{ PlaylistInfo, Track, TrackMetadata };
pub use transfer::{ PlaylistExport, TransferError };
