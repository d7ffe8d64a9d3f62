//! Track list persistence
//!
//! [`TrackStore`] is the storage boundary the rest of the crate talks to.
//! [`JsonStore`] keeps everything in one JSON document, optionally backed
//! by a file that is rewritten after every mutation.

use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::{ Mutex, MutexGuard };

use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::track::{ now_millis, PlaylistInfo, Track, DEFAULT_PLAYLIST_ID };


/// Errors that can occur during storage operations.
#[derive( Debug, Error )]
pub enum StoreError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "JSON error: {0}" )]
    Json( #[from] serde_json::Error ),

    #[error( "Not found: {0}" )]
    NotFound( String ),

    #[error( "Already exists: {0}" )]
    Duplicate( String ),

    #[error( "Store lock poisoned" )]
    Poisoned,
}


/// Storage for playlists and their tracks.
pub trait TrackStore: Send + Sync {
    fn add_track( &self, track: &Track ) -> Result<(), StoreError>;

    /// Deleting an unknown id is not an error.
    fn delete_track( &self, track_id: &str ) -> Result<(), StoreError>;

    /// Replaces a stored track. Fails with NotFound for unknown ids.
    fn update_track( &self, track: &Track ) -> Result<(), StoreError>;

    /// Tracks of a playlist in insertion order.
    fn tracks_by_playlist( &self, playlist_id: &str ) -> Result<Vec<Track>, StoreError>;

    /// All playlists, oldest first.
    fn playlists( &self ) -> Result<Vec<PlaylistInfo>, StoreError>;

    fn create_playlist( &self, playlist: &PlaylistInfo ) -> Result<(), StoreError>;

    /// Replaces a playlist's name and bumps its `updated_at`.
    fn update_playlist( &self, playlist: &PlaylistInfo ) -> Result<(), StoreError>;

    /// Deletes a playlist together with its tracks.
    fn delete_playlist( &self, playlist_id: &str ) -> Result<(), StoreError>;

    fn current_playlist_id( &self ) -> Result<String, StoreError>;

    fn set_current_playlist_id( &self, playlist_id: &str ) -> Result<(), StoreError>;
}


#[derive( Debug, Clone, Default, Serialize, Deserialize )]
#[serde( default, rename_all = "camelCase" )]
struct StoreData {
    playlists: Vec<PlaylistInfo>,
    tracks: Vec<Track>,
    current_playlist_id: Option<String>,
}


impl StoreData {
    fn seeded() -> Self {
        Self {
            playlists: vec![ PlaylistInfo::default_playlist() ],
            tracks: Vec::new(),
            current_playlist_id: Some( DEFAULT_PLAYLIST_ID.to_string() ),
        }
    }
}


/// JSON document store.
#[derive( Debug )]
pub struct JsonStore {
    data: Mutex<StoreData>,
    path: Option<PathBuf>,
}


impl JsonStore {
    /// Creates a store that lives only in memory, seeded with the default playlist.
    pub fn in_memory() -> Self {
        Self {
            data: Mutex::new( StoreData::seeded() ),
            path: None,
        }
    }


    /// Opens a file-backed store, creating it if the file does not exist.
    pub fn open( path: impl Into<PathBuf> ) -> Result<Self, StoreError> {
        let path = path.into();

        let data = if path.exists() {
            let contents = fs::read_to_string( &path )?;
            let mut data: StoreData = serde_json::from_str( &contents )?;
            if data.playlists.is_empty() {
                data.playlists.push( PlaylistInfo::default_playlist() );
            }
            tracing::info!(
                "Opened store {:?}: {} playlists, {} tracks",
                path, data.playlists.len(), data.tracks.len()
            );
            data
        } else {
            tracing::info!( "Creating new store at {:?}", path );
            StoreData::seeded()
        };

        let store = Self {
            data: Mutex::new( data ),
            path: Some( path ),
        };
        {
            let data = store.lock()?;
            store.persist( &data )?;
        }
        Ok( store )
    }


    pub fn path( &self ) -> Option<&Path> {
        self.path.as_deref()
    }


    fn lock( &self ) -> Result<MutexGuard<'_, StoreData>, StoreError> {
        self.data.lock().map_err( |_| StoreError::Poisoned )
    }


    fn persist( &self, data: &StoreData ) -> Result<(), StoreError> {
        let path = match &self.path {
            Some( p ) => p,
            None => return Ok(()),
        };

        if let Some( parent ) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all( parent )?;
            }
        }

        let json = serde_json::to_string_pretty( data )?;
        let tmp = path.with_extension( "json.tmp" );
        fs::write( &tmp, json )?;
        fs::rename( &tmp, path )?;
        Ok(())
    }


    /// Applies a mutation and writes the document back.
    fn mutate<T>( &self, f: impl FnOnce( &mut StoreData ) -> Result<T, StoreError> ) -> Result<T, StoreError> {
        let mut data = self.lock()?;
        let out = f( &mut data )?;
        self.persist( &data )?;
        Ok( out )
    }
}


impl TrackStore for JsonStore {
    fn add_track( &self, track: &Track ) -> Result<(), StoreError> {
        self.mutate( |data| {
            if data.tracks.iter().any( |t| t.id == track.id ) {
                return Err( StoreError::Duplicate( track.id.clone() ) );
            }
            data.tracks.push( track.clone() );
            Ok(())
        })
    }


    fn delete_track( &self, track_id: &str ) -> Result<(), StoreError> {
        self.mutate( |data| {
            data.tracks.retain( |t| t.id != track_id );
            Ok(())
        })
    }


    fn update_track( &self, track: &Track ) -> Result<(), StoreError> {
        self.mutate( |data| {
            let slot = data.tracks.iter_mut()
                .find( |t| t.id == track.id )
                .ok_or_else( || StoreError::NotFound( track.id.clone() ) )?;
            *slot = track.clone();
            Ok(())
        })
    }


    fn tracks_by_playlist( &self, playlist_id: &str ) -> Result<Vec<Track>, StoreError> {
        let data = self.lock()?;
        Ok( data.tracks.iter().filter( |t| t.playlist_id == playlist_id ).cloned().collect() )
    }


    fn playlists( &self ) -> Result<Vec<PlaylistInfo>, StoreError> {
        let data = self.lock()?;
        let mut playlists = data.playlists.clone();
        playlists.sort_by_key( |p| p.created_at );
        Ok( playlists )
    }


    fn create_playlist( &self, playlist: &PlaylistInfo ) -> Result<(), StoreError> {
        self.mutate( |data| {
            if data.playlists.iter().any( |p| p.id == playlist.id ) {
                return Err( StoreError::Duplicate( playlist.id.clone() ) );
            }
            data.playlists.push( playlist.clone() );
            Ok(())
        })
    }


    fn update_playlist( &self, playlist: &PlaylistInfo ) -> Result<(), StoreError> {
        self.mutate( |data| {
            let slot = data.playlists.iter_mut()
                .find( |p| p.id == playlist.id )
                .ok_or_else( || StoreError::NotFound( playlist.id.clone() ) )?;
            slot.name = playlist.name.clone();
            slot.updated_at = now_millis();
            Ok(())
        })
    }


    fn delete_playlist( &self, playlist_id: &str ) -> Result<(), StoreError> {
        self.mutate( |data| {
            let before = data.playlists.len();
            data.playlists.retain( |p| p.id != playlist_id );
            if data.playlists.len() == before {
                return Err( StoreError::NotFound( playlist_id.to_string() ) );
            }
            data.tracks.retain( |t| t.playlist_id != playlist_id );
            if data.current_playlist_id.as_deref() == Some( playlist_id ) {
                data.current_playlist_id = None;
            }
            Ok(())
        })
    }


    fn current_playlist_id( &self ) -> Result<String, StoreError> {
        let data = self.lock()?;
        Ok( data.current_playlist_id.clone().unwrap_or_else( || DEFAULT_PLAYLIST_ID.to_string() ) )
    }


    fn set_current_playlist_id( &self, playlist_id: &str ) -> Result<(), StoreError> {
        self.mutate( |data| {
            data.current_playlist_id = Some( playlist_id.to_string() );
            Ok(())
        })
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_in_memory_is_seeded() {
        let store = JsonStore::in_memory();
        let playlists = store.playlists().unwrap();
        assert_eq!( playlists.len(), 1 );
        assert_eq!( playlists[ 0 ].id, DEFAULT_PLAYLIST_ID );
        assert_eq!( store.current_playlist_id().unwrap(), DEFAULT_PLAYLIST_ID );
    }


    #[test]
    fn test_tracks_filtered_by_playlist() {
        let store = JsonStore::in_memory();
        store.add_track( &Track::new( "default", "u", "a" ) ).unwrap();
        store.add_track( &Track::new( "other", "u", "b" ) ).unwrap();
        store.add_track( &Track::new( "default", "u", "c" ) ).unwrap();

        let ids: Vec<_> = store.tracks_by_playlist( "default" ).unwrap()
            .iter().map( |t| t.video_id().to_string() ).collect();
        assert_eq!( ids, vec![ "a", "c" ] );
    }


    #[test]
    fn test_duplicate_track_rejected() {
        let store = JsonStore::in_memory();
        let track = Track::new( "default", "u", "a" );
        store.add_track( &track ).unwrap();
        assert!( matches!( store.add_track( &track ), Err( StoreError::Duplicate( _ ) ) ) );
    }


    #[test]
    fn test_update_unknown_track_does_not_resurrect() {
        let store = JsonStore::in_memory();
        let track = Track::new( "default", "u", "a" );
        store.add_track( &track ).unwrap();
        store.delete_track( &track.id ).unwrap();

        assert!( matches!( store.update_track( &track ), Err( StoreError::NotFound( _ ) ) ) );
        assert!( store.tracks_by_playlist( "default" ).unwrap().is_empty() );

        // deleting again is fine
        store.delete_track( &track.id ).unwrap();
    }


    #[test]
    fn test_delete_playlist_cascades() {
        let store = JsonStore::in_memory();
        let list = PlaylistInfo::new( "p2", "Second" );
        store.create_playlist( &list ).unwrap();
        store.set_current_playlist_id( "p2" ).unwrap();
        store.add_track( &Track::new( "p2", "u", "a" ) ).unwrap();

        store.delete_playlist( "p2" ).unwrap();
        assert!( store.tracks_by_playlist( "p2" ).unwrap().is_empty() );
        assert_eq!( store.current_playlist_id().unwrap(), DEFAULT_PLAYLIST_ID );
        assert!( matches!( store.delete_playlist( "p2" ), Err( StoreError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_update_playlist_renames() {
        let store = JsonStore::in_memory();
        let mut list = PlaylistInfo::default_playlist();
        list.name = "Renamed".into();
        store.update_playlist( &list ).unwrap();
        assert_eq!( store.playlists().unwrap()[ 0 ].name, "Renamed" );
    }


    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "library.json" );

        {
            let store = JsonStore::open( &path ).unwrap();
            store.create_playlist( &PlaylistInfo::new( "p2", "Second" ) ).unwrap();
            store.add_track( &Track::new( "p2", "u", "a" ) ).unwrap();
            store.set_current_playlist_id( "p2" ).unwrap();
        }

        let store = JsonStore::open( &path ).unwrap();
        assert_eq!( store.playlists().unwrap().len(), 2 );
        assert_eq!( store.current_playlist_id().unwrap(), "p2" );
        assert_eq!( store.tracks_by_playlist( "p2" ).unwrap().len(), 1 );
        assert!( !path.with_extension( "json.tmp" ).exists() );
    }


    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "library.json" );
        fs::write( &path, "{ not json" ).unwrap();
        assert!( matches!( JsonStore::open( &path ), Err( StoreError::Json( _ ) ) ) );
    }
}
