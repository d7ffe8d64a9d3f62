//! Playlist import and export documents.

use std::fs;
use std::path::Path;

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::track::{ now_millis, PlaylistInfo, Track };


/// Document format version written on export.
pub const EXPORT_VERSION: &str = "1.0";


#[derive( Debug, Error )]
pub enum TransferError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "JSON error: {0}" )]
    Json( #[from] serde_json::Error ),

    #[error( "Invalid playlist file: {0}" )]
    InvalidFormat( &'static str ),
}


/// One playlist with its tracks.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "camelCase" )]
pub struct PlaylistExport {
    pub version: String,
    pub playlist: PlaylistInfo,
    pub tracks: Vec<Track>,
    pub exported_at: i64,
}


impl PlaylistExport {
    pub fn new( playlist: PlaylistInfo, tracks: Vec<Track> ) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            playlist,
            tracks,
            exported_at: now_millis(),
        }
    }


    pub fn to_json( &self ) -> Result<String, TransferError> {
        Ok( serde_json::to_string_pretty( self )? )
    }


    /// Parses a document, rejecting it unless it has a playlist and a track list.
    pub fn from_json( json: &str ) -> Result<Self, TransferError> {
        let value: serde_json::Value = serde_json::from_str( json )?;

        if !value.get( "playlist" ).is_some_and( |p| p.is_object() ) {
            return Err( TransferError::InvalidFormat( "missing playlist" ) );
        }
        if !value.get( "tracks" ).is_some_and( |t| t.is_array() ) {
            return Err( TransferError::InvalidFormat( "missing track list" ) );
        }

        Ok( serde_json::from_value( value )? )
    }


    pub fn write_to( &self, path: &Path ) -> Result<(), TransferError> {
        fs::write( path, self.to_json()? )?;
        tracing::info!( "Exported {} tracks to {:?}", self.tracks.len(), path );
        Ok(())
    }


    pub fn read_from( path: &Path ) -> Result<Self, TransferError> {
        let contents = fs::read_to_string( path )?;
        Self::from_json( &contents )
    }


    /// Suggested file name, e.g. `My_Mix_1700000000000.json`.
    pub fn file_name( &self ) -> String {
        export_file_name( &self.playlist.name, self.exported_at )
    }
}


/// Builds an export file name from a playlist name and a timestamp.
pub fn export_file_name( name: &str, timestamp: i64 ) -> String {
    let safe: String = name
        .chars()
        .map( |c| if c.is_ascii_alphanumeric() { c } else { '_' } )
        .collect();
    format!( "{}_{}.json", safe, timestamp )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_export_document_shape() {
        let doc = PlaylistExport::new(
            PlaylistInfo::new( "p1", "Mix" ),
            vec![ Track::new( "p1", "https://youtu.be/abcdefghijk", "abcdefghijk" ) ],
        );
        let value: serde_json::Value = serde_json::from_str( &doc.to_json().unwrap() ).unwrap();

        assert_eq!( value[ "version" ], "1.0" );
        assert_eq!( value[ "playlist" ][ "name" ], "Mix" );
        assert_eq!( value[ "tracks" ][ 0 ][ "videoId" ], "abcdefghijk" );
        assert!( value[ "exportedAt" ].is_i64() );
    }


    #[test]
    fn test_rejects_missing_tracks() {
        let json = r#"{ "version": "1.0", "playlist": { "id": "p", "name": "n", "createdAt": 0, "updatedAt": 0 }, "exportedAt": 0 }"#;
        assert!( matches!( PlaylistExport::from_json( json ), Err( TransferError::InvalidFormat( _ ) ) ) );

        let json = r#"{ "playlist": { "id": "p", "name": "n", "createdAt": 0, "updatedAt": 0 }, "tracks": {} }"#;
        assert!( matches!( PlaylistExport::from_json( json ), Err( TransferError::InvalidFormat( _ ) ) ) );
    }


    #[test]
    fn test_rejects_missing_playlist() {
        let json = r#"{ "version": "1.0", "tracks": [], "exportedAt": 0 }"#;
        assert!( matches!( PlaylistExport::from_json( json ), Err( TransferError::InvalidFormat( _ ) ) ) );
    }


    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let doc = PlaylistExport::new( PlaylistInfo::new( "p1", "Road Trip!" ), Vec::new() );
        let path = dir.path().join( doc.file_name() );

        doc.write_to( &path ).unwrap();
        assert_eq!( PlaylistExport::read_from( &path ).unwrap(), doc );
    }


    #[test]
    fn test_file_name_sanitised() {
        assert_eq!( export_file_name( "Road Trip! 2024", 42 ), "Road_Trip__2024_42.json" );
    }
}
