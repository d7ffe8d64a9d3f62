//! Playlist library management
//!
//! Session view over a [`TrackStore`]: the known playlists, which one is
//! current, and its tracks. Every mutation re-reads the current playlist so
//! the caller can hand the fresh list to playback reconciliation.

use std::sync::Arc;

use crate::source::{ extract_video_id, watch_url };
use crate::store::{ StoreError, TrackStore };
use crate::track::{ new_id, PlaylistInfo, Track, DEFAULT_PLAYLIST_ID };
use crate::transfer::PlaylistExport;


/// Result of a bulk add.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct AddOutcome {
    pub added: usize,
    /// Inputs that were not recognised as links.
    pub rejected: Vec<String>,
    /// Tracks the store refused to write.
    pub failed: usize,
}


pub struct PlaylistLibrary {
    store: Arc<dyn TrackStore>,
    playlists: Vec<PlaylistInfo>,
    current_id: String,
    tracks: Vec<Track>,
}


impl PlaylistLibrary {
    /// Loads the saved current playlist, falling back to the first playlist
    /// and then to the default one.
    pub fn open( store: Arc<dyn TrackStore> ) -> Result<Self, StoreError> {
        let mut playlists = store.playlists()?;
        if playlists.is_empty() {
            let default = PlaylistInfo::default_playlist();
            store.create_playlist( &default )?;
            playlists.push( default );
        }

        let saved = store.current_playlist_id()?;
        let current_id = if playlists.iter().any( |p| p.id == saved ) {
            saved
        } else {
            playlists.first().map( |p| p.id.clone() ).unwrap_or_else( || DEFAULT_PLAYLIST_ID.to_string() )
        };
        store.set_current_playlist_id( &current_id )?;

        let tracks = store.tracks_by_playlist( &current_id )?;
        tracing::info!( "Library opened: playlist {} with {} tracks", current_id, tracks.len() );

        Ok( Self {
            store,
            playlists,
            current_id,
            tracks,
        })
    }


    pub fn store( &self ) -> &Arc<dyn TrackStore> {
        &self.store
    }


    pub fn tracks( &self ) -> &[Track] {
        &self.tracks
    }


    pub fn playlists( &self ) -> &[PlaylistInfo] {
        &self.playlists
    }


    pub fn current_playlist_id( &self ) -> &str {
        &self.current_id
    }


    pub fn current_playlist( &self ) -> Option<&PlaylistInfo> {
        self.playlists.iter().find( |p| p.id == self.current_id )
    }


    /// Re-reads playlists and the current playlist's tracks.
    pub fn refresh( &mut self ) -> Result<(), StoreError> {
        self.playlists = self.store.playlists()?;
        self.tracks = self.store.tracks_by_playlist( &self.current_id )?;
        Ok(())
    }


    /// Adds every recognised link to the current playlist.
    pub fn add_urls<S: AsRef<str>>( &mut self, inputs: &[S] ) -> Result<AddOutcome, StoreError> {
        let mut outcome = AddOutcome::default();

        for input in inputs {
            let input = input.as_ref().trim();
            if input.is_empty() {
                continue;
            }

            let video_id = match extract_video_id( input ) {
                Some( id ) => id,
                None => {
                    tracing::debug!( "Not a recognised link: {}", input );
                    outcome.rejected.push( input.to_string() );
                    continue;
                }
            };

            let url = if input == video_id { watch_url( &video_id ) } else { input.to_string() };
            let track = Track::new( self.current_id.clone(), url, video_id );

            match self.store.add_track( &track ) {
                Ok(()) => outcome.added += 1,
                Err( e ) => {
                    tracing::warn!( "Failed to add {}: {}", input, e );
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            "Added {} tracks ({} rejected, {} failed)",
            outcome.added, outcome.rejected.len(), outcome.failed
        );
        self.refresh()?;
        Ok( outcome )
    }


    pub fn remove_track( &mut self, track_id: &str ) -> Result<Track, StoreError> {
        let track = self.tracks.iter()
            .find( |t| t.id == track_id )
            .cloned()
            .ok_or_else( || StoreError::NotFound( track_id.to_string() ) )?;

        self.store.delete_track( track_id )?;
        tracing::info!( "Removed track {} ({})", track.title, track.id );
        self.refresh()?;
        Ok( track )
    }


    /// Creates a playlist and makes it current.
    pub fn create_playlist( &mut self, name: &str ) -> Result<PlaylistInfo, StoreError> {
        let playlist = PlaylistInfo::new( new_id(), name.trim() );
        self.store.create_playlist( &playlist )?;
        tracing::info!( "Created playlist {} ({})", playlist.name, playlist.id );
        self.switch_playlist( &playlist.id )?;
        Ok( playlist )
    }


    pub fn rename_playlist( &mut self, playlist_id: &str, name: &str ) -> Result<(), StoreError> {
        let mut playlist = self.playlists.iter()
            .find( |p| p.id == playlist_id )
            .cloned()
            .ok_or_else( || StoreError::NotFound( playlist_id.to_string() ) )?;

        playlist.name = name.trim().to_string();
        self.store.update_playlist( &playlist )?;
        self.refresh()
    }


    pub fn switch_playlist( &mut self, playlist_id: &str ) -> Result<(), StoreError> {
        let playlists = self.store.playlists()?;
        if !playlists.iter().any( |p| p.id == playlist_id ) {
            return Err( StoreError::NotFound( playlist_id.to_string() ) );
        }

        self.store.set_current_playlist_id( playlist_id )?;
        self.current_id = playlist_id.to_string();
        tracing::info!( "Switched to playlist {}", playlist_id );
        self.refresh()
    }


    /// Deletes a playlist. Deleting the current one moves to the first
    /// remaining playlist, or to an empty default if none is left.
    pub fn delete_playlist( &mut self, playlist_id: &str ) -> Result<(), StoreError> {
        self.store.delete_playlist( playlist_id )?;
        tracing::info!( "Deleted playlist {}", playlist_id );

        if playlist_id != self.current_id {
            return self.refresh();
        }

        let remaining = self.store.playlists()?;
        match remaining.first() {
            Some( first ) => {
                let id = first.id.clone();
                self.switch_playlist( &id )
            }
            None => {
                let default = PlaylistInfo::default_playlist();
                self.store.create_playlist( &default )?;
                self.switch_playlist( &default.id )
            }
        }
    }


    /// Copies an exported playlist's tracks into the current playlist.
    ///
    /// @returns The number of tracks imported
    pub fn import( &mut self, doc: &PlaylistExport ) -> Result<usize, StoreError> {
        let mut imported = 0;
        for track in &doc.tracks {
            self.store.add_track( &track.reassigned( &self.current_id ) )?;
            imported += 1;
        }

        tracing::info!( "Imported {} tracks from {}", imported, doc.playlist.name );
        self.refresh()?;
        Ok( imported )
    }


    /// Snapshot of the current playlist for export.
    pub fn export( &self ) -> Result<PlaylistExport, StoreError> {
        let playlist = self.current_playlist()
            .cloned()
            .ok_or_else( || StoreError::NotFound( self.current_id.clone() ) )?;
        Ok( PlaylistExport::new( playlist, self.tracks.clone() ) )
    }
}


impl std::fmt::Debug for PlaylistLibrary {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "PlaylistLibrary" )
            .field( "current_id", &self.current_id )
            .field( "playlists", &self.playlists.len() )
            .field( "tracks", &self.tracks.len() )
            .finish()
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::store::JsonStore;


    fn library() -> PlaylistLibrary {
        PlaylistLibrary::open( Arc::new( JsonStore::in_memory() ) ).unwrap()
    }


    #[test]
    fn test_open_falls_back_to_existing_playlist() {
        let store = Arc::new( JsonStore::in_memory() );
        store.set_current_playlist_id( "gone" ).unwrap();

        let library = PlaylistLibrary::open( store.clone() ).unwrap();
        assert_eq!( library.current_playlist_id(), DEFAULT_PLAYLIST_ID );
        assert_eq!( store.current_playlist_id().unwrap(), DEFAULT_PLAYLIST_ID );
    }


    #[test]
    fn test_add_urls_counts_rejections() {
        let mut library = library();
        let outcome = library.add_urls( &[
            "https://youtu.be/dQw4w9WgXcQ",
            "not a link",
            "",
            "abcdefghijk",
        ] ).unwrap();

        assert_eq!( outcome.added, 2 );
        assert_eq!( outcome.rejected, vec![ "not a link".to_string() ] );
        assert_eq!( library.tracks().len(), 2 );
        assert_eq!( library.tracks()[ 1 ].url, "https://www.youtube.com/watch?v=abcdefghijk" );
    }


    #[test]
    fn test_remove_track() {
        let mut library = library();
        library.add_urls( &[ "aaaaaaaaaaa", "bbbbbbbbbbb" ] ).unwrap();
        let id = library.tracks()[ 0 ].id.clone();

        library.remove_track( &id ).unwrap();
        assert_eq!( library.tracks().len(), 1 );
        assert!( matches!( library.remove_track( &id ), Err( StoreError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_create_switches_to_new_playlist() {
        let mut library = library();
        library.add_urls( &[ "aaaaaaaaaaa" ] ).unwrap();

        let created = library.create_playlist( "  Evening  " ).unwrap();
        assert_eq!( created.name, "Evening" );
        assert_eq!( library.current_playlist_id(), created.id );
        assert!( library.tracks().is_empty() );
        assert_eq!( library.playlists().len(), 2 );
    }


    #[test]
    fn test_delete_current_moves_to_first_remaining() {
        let mut library = library();
        let created = library.create_playlist( "Evening" ).unwrap();

        library.delete_playlist( &created.id ).unwrap();
        assert_eq!( library.current_playlist_id(), DEFAULT_PLAYLIST_ID );
    }


    #[test]
    fn test_delete_last_playlist_recreates_default() {
        let mut library = library();
        library.add_urls( &[ "aaaaaaaaaaa" ] ).unwrap();

        library.delete_playlist( DEFAULT_PLAYLIST_ID ).unwrap();
        assert_eq!( library.current_playlist_id(), DEFAULT_PLAYLIST_ID );
        assert!( library.tracks().is_empty() );
        assert_eq!( library.playlists().len(), 1 );
    }


    #[test]
    fn test_rename() {
        let mut library = library();
        library.rename_playlist( DEFAULT_PLAYLIST_ID, "Mine" ).unwrap();
        assert_eq!( library.current_playlist().unwrap().name, "Mine" );
    }


    #[test]
    fn test_export_then_import_into_other_playlist() {
        let mut library = library();
        library.add_urls( &[ "aaaaaaaaaaa", "bbbbbbbbbbb" ] ).unwrap();
        let doc = library.export().unwrap();
        assert_eq!( doc.tracks.len(), 2 );

        let target = library.create_playlist( "Copy" ).unwrap();
        assert_eq!( library.import( &doc ).unwrap(), 2 );

        let tracks = library.tracks();
        assert_eq!( tracks.len(), 2 );
        assert!( tracks.iter().all( |t| t.playlist_id == target.id ) );
        assert!( tracks.iter().all( |t| !doc.tracks.iter().any( |d| d.id == t.id ) ) );
    }
}
