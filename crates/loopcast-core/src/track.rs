//! Track and playlist records
//!
//! These are the rows persisted by the track store and carried through
//! playback. Field names serialize in camelCase so exported documents stay
//! readable by other tools.

use chrono::Utc;
use serde::{ Deserialize, Serialize };
use uuid::Uuid;


/// Id of the playlist that always exists on a fresh library.
pub const DEFAULT_PLAYLIST_ID: &str = "default";

/// Display name of the default playlist.
pub const DEFAULT_PLAYLIST_NAME: &str = "Default Playlist";


/// Returns the current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}


/// Generates a fresh opaque id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}


/// Artwork sizes published for every video.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum ThumbnailQuality {
    Default,
    Medium,
    #[default]
    High,
    Standard,
    MaxRes,
}


impl ThumbnailQuality {
    fn file_stem( self ) -> &'static str {
        match self {
            ThumbnailQuality::Default => "default",
            ThumbnailQuality::Medium => "mqdefault",
            ThumbnailQuality::High => "hqdefault",
            ThumbnailQuality::Standard => "sddefault",
            ThumbnailQuality::MaxRes => "maxresdefault",
        }
    }
}


/// Builds the artwork URL for a video id.
pub fn thumbnail_url( video_id: &str, quality: ThumbnailQuality ) -> String {
    format!( "https://img.youtube.com/vi/{}/{}.jpg", video_id, quality.file_stem() )
}


/// Display fields that metadata reconciliation or a user edit may overwrite.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct TrackMetadata {
    pub title: String,
    pub artwork: Option<String>,
}


/// A single playable entry of a playlist.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "camelCase" )]
pub struct Track {
    pub id: String,
    pub playlist_id: String,
    pub url: String,
    video_id: String,
    pub title: String,
    #[serde( rename = "thumbnail", default, skip_serializing_if = "Option::is_none" )]
    pub artwork: Option<String>,
    /// Length in seconds, when known.
    #[serde( default, skip_serializing_if = "Option::is_none" )]
    pub duration: Option<u64>,
    pub added_at: i64,
}


impl Track {
    /// Creates a track with a placeholder title and a fresh id.
    pub fn new( playlist_id: impl Into<String>, url: impl Into<String>, video_id: impl Into<String> ) -> Self {
        let video_id = video_id.into();
        Self {
            id: new_id(),
            playlist_id: playlist_id.into(),
            url: url.into(),
            title: format!( "Track {}", video_id ),
            video_id,
            artwork: None,
            duration: None,
            added_at: now_millis(),
        }
    }


    /// Id of the external item this track plays. Never changes.
    pub fn video_id( &self ) -> &str {
        &self.video_id
    }


    /// Current display fields.
    pub fn metadata( &self ) -> TrackMetadata {
        TrackMetadata {
            title: self.title.clone(),
            artwork: self.artwork.clone(),
        }
    }


    /// Overwrites the display fields.
    pub fn apply_metadata( &mut self, metadata: &TrackMetadata ) {
        self.title = metadata.title.clone();
        self.artwork = metadata.artwork.clone();
    }


    /// Copies this track into another playlist under a new id.
    pub fn reassigned( &self, playlist_id: &str ) -> Self {
        Self {
            id: new_id(),
            playlist_id: playlist_id.to_string(),
            added_at: now_millis(),
            ..self.clone()
        }
    }
}


/// A named playlist.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "camelCase" )]
pub struct PlaylistInfo {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}


impl PlaylistInfo {
    /// Creates a playlist with the given id.
    pub fn new( id: impl Into<String>, name: impl Into<String> ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }


    /// The playlist every fresh library starts with.
    pub fn default_playlist() -> Self {
        Self::new( DEFAULT_PLAYLIST_ID, DEFAULT_PLAYLIST_NAME )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_new_track_placeholder_title() {
        let track = Track::new( "p1", "https://youtu.be/dQw4w9WgXcQ", "dQw4w9WgXcQ" );
        assert_eq!( track.title, "Track dQw4w9WgXcQ" );
        assert_eq!( track.video_id(), "dQw4w9WgXcQ" );
        assert!( track.artwork.is_none() );
    }


    #[test]
    fn test_reassigned_keeps_video_id() {
        let track = Track::new( "p1", "url", "abc" );
        let copy = track.reassigned( "p2" );
        assert_ne!( copy.id, track.id );
        assert_eq!( copy.playlist_id, "p2" );
        assert_eq!( copy.video_id(), "abc" );
    }


    #[test]
    fn test_serializes_camel_case() {
        let mut track = Track::new( "p1", "url", "abc" );
        track.artwork = Some( thumbnail_url( "abc", ThumbnailQuality::MaxRes ) );
        let json = serde_json::to_value( &track ).unwrap();
        assert_eq!( json[ "videoId" ], "abc" );
        assert_eq!( json[ "playlistId" ], "p1" );
        assert_eq!( json[ "thumbnail" ], "https://img.youtube.com/vi/abc/maxresdefault.jpg" );
        assert!( json.get( "duration" ).is_none() );
    }


    #[test]
    fn test_deserializes_foreign_export_row() {
        let json = r#"{
            "id": "1700000000000-0.5",
            "playlistId": "default",
            "url": "https://www.youtube.com/watch?v=abcdefghijk",
            "title": "Some title",
            "videoId": "abcdefghijk",
            "addedAt": 1700000000000
        }"#;
        let track: Track = serde_json::from_str( json ).unwrap();
        assert_eq!( track.video_id(), "abcdefghijk" );
        assert_eq!( track.artwork, None );
    }
}
