//! Playback state machine
//!
//! Owns the ordered track list, the current position, the shuffle order and
//! the player status flags. Every operation is a synchronous transition with
//! no I/O; the coordinator observes the result and drives the player.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{ Deserialize, Serialize };
use thiserror::Error;

use crate::shuffle::shuffled_order_from;
use crate::track::{ Track, TrackMetadata };


/// Errors surfaced by playback transitions.
#[derive( Debug, Error, PartialEq, Eq )]
pub enum PlaybackError {
    #[error( "Nothing to play" )]
    NothingToPlay,

    #[error( "Tracks were already loaded" )]
    AlreadyLoaded,

    #[error( "Unsupported playback rate: {0}" )]
    UnsupportedRate( String ),
}


/// Playback speed, restricted to quarter steps between 0.25x and 2x.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize )]
#[serde( try_from = "f64", into = "f64" )]
pub struct PlaybackRate {
    quarters: u8,
}


impl PlaybackRate {
    /// Normal speed.
    pub const NORMAL: PlaybackRate = PlaybackRate { quarters: 4 };

    const MIN_QUARTERS: u8 = 1;
    const MAX_QUARTERS: u8 = 8;


    /// Creates a rate from a multiplier, if it is one of the supported steps.
    pub fn new( value: f64 ) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let quarters = value * 4.0;
        if ( quarters - quarters.round() ).abs() > 1e-9 {
            return None;
        }
        let quarters = quarters.round();
        if quarters < Self::MIN_QUARTERS as f64 || quarters > Self::MAX_QUARTERS as f64 {
            return None;
        }
        Some( Self { quarters: quarters as u8 } )
    }


    /// All supported rates, slowest first.
    pub fn all() -> impl Iterator<Item = PlaybackRate> {
        ( Self::MIN_QUARTERS..=Self::MAX_QUARTERS ).map( |quarters| PlaybackRate { quarters } )
    }


    /// The multiplier.
    pub fn as_f64( self ) -> f64 {
        self.quarters as f64 / 4.0
    }
}


impl Default for PlaybackRate {
    fn default() -> Self {
        Self::NORMAL
    }
}


impl fmt::Display for PlaybackRate {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{}x", self.as_f64() )
    }
}


impl FromStr for PlaybackRate {
    type Err = PlaybackError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed.strip_suffix( 'x' ).unwrap_or( trimmed );
        number.parse::<f64>()
            .ok()
            .and_then( PlaybackRate::new )
            .ok_or_else( || PlaybackError::UnsupportedRate( s.to_string() ) )
    }
}


impl TryFrom<f64> for PlaybackRate {
    type Error = PlaybackError;


    fn try_from( value: f64 ) -> Result<Self, Self::Error> {
        PlaybackRate::new( value ).ok_or_else( || PlaybackError::UnsupportedRate( value.to_string() ) )
    }
}


impl From<PlaybackRate> for f64 {
    fn from( rate: PlaybackRate ) -> f64 {
        rate.as_f64()
    }
}


/// The playback aggregate.
#[derive( Debug )]
pub struct PlaybackState {
    tracks: Vec<Track>,
    current_index: Option<usize>,
    is_playing: bool,
    /// Present exactly while shuffle is on; a permutation of `0..tracks.len()`.
    shuffle_order: Option<Vec<usize>>,
    rate: PlaybackRate,
    is_player_ready: bool,
    is_loading: bool,
    error: Option<String>,
    loaded: bool,
    rng: StdRng,
}


impl Default for PlaybackState {
    fn default() -> Self {
        Self::with_rng( StdRng::from_entropy() )
    }
}


impl PlaybackState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }


    /// Creates an empty state whose shuffles are reproducible.
    pub fn with_seed( seed: u64 ) -> Self {
        Self::with_rng( StdRng::seed_from_u64( seed ) )
    }


    fn with_rng( rng: StdRng ) -> Self {
        Self {
            tracks: Vec::new(),
            current_index: None,
            is_playing: false,
            shuffle_order: None,
            rate: PlaybackRate::default(),
            is_player_ready: false,
            is_loading: false,
            error: None,
            loaded: false,
            rng,
        }
    }


    /// Sets the initial track list. Only valid once.
    pub fn load_initial( &mut self, tracks: Vec<Track> ) -> Result<(), PlaybackError> {
        if self.loaded {
            return Err( PlaybackError::AlreadyLoaded );
        }

        tracing::info!( "Initial track list: {} tracks", tracks.len() );
        self.loaded = true;
        self.current_index = if tracks.is_empty() { None } else { Some( 0 ) };
        self.tracks = tracks;
        self.error = None;
        self.regenerate_shuffle_order();
        Ok(())
    }


    /// Replaces the track list while keeping the current track current.
    ///
    /// The current track is located by id. If it was removed, the position
    /// stays in the same slot, clamped to the new last index. Never touches
    /// `is_playing`.
    pub fn reconcile_tracks( &mut self, tracks: Vec<Track> ) {
        let previous_id = self.current_track().map( |t| t.id.clone() );
        let previous_index = self.current_index;

        let found = previous_id
            .as_deref()
            .and_then( |id| tracks.iter().position( |t| t.id == id ) );

        let new_index = match found {
            Some( index ) => Some( index ),
            None if tracks.is_empty() => None,
            None => Some( previous_index.unwrap_or( 0 ).min( tracks.len() - 1 ) ),
        };

        tracing::info!(
            "Reconciled tracks: {:?} -> {:?} ({} tracks, current {})",
            previous_index,
            new_index,
            tracks.len(),
            if found.is_some() { "kept" } else { "moved" }
        );

        self.loaded = true;
        self.tracks = tracks;
        self.current_index = new_index;
        self.error = None;
        self.regenerate_shuffle_order();
    }


    /// Jumps to a track and starts playing. Out-of-range indices are ignored.
    ///
    /// @returns true if `index` was in range
    pub fn play_at( &mut self, index: usize ) -> bool {
        if index >= self.tracks.len() {
            return false;
        }

        self.current_index = Some( index );
        self.is_playing = true;
        self.error = None;
        true
    }


    /// Plays from the top of the list.
    pub fn play_all( &mut self ) -> Result<(), PlaybackError> {
        if self.play_at( 0 ) {
            Ok(())
        } else {
            Err( PlaybackError::NothingToPlay )
        }
    }


    /// Moves to the next track, in shuffle order when shuffled, wrapping at the end.
    pub fn advance( &mut self ) -> Option<usize> {
        self.step( true )
    }


    /// Moves to the previous track, in shuffle order when shuffled, wrapping at the start.
    pub fn retreat( &mut self ) -> Option<usize> {
        self.step( false )
    }


    fn step( &mut self, forward: bool ) -> Option<usize> {
        let len = self.tracks.len();
        let current = self.current_index?;

        let next = match &self.shuffle_order {
            Some( order ) => {
                let pos = order.iter().position( |&i| i == current ).unwrap_or( 0 );
                let next_pos = if forward { ( pos + 1 ) % len } else { ( pos + len - 1 ) % len };
                order[ next_pos ]
            }
            None => {
                if forward { ( current + 1 ) % len } else { ( current + len - 1 ) % len }
            }
        };

        self.current_index = Some( next );
        self.error = None;
        Some( next )
    }


    /// Flips shuffle mode. Turning it on draws a fresh order starting at the
    /// current track.
    pub fn toggle_shuffle( &mut self ) -> bool {
        if self.shuffle_order.is_some() {
            self.shuffle_order = None;
        } else {
            self.shuffle_order = Some( shuffled_order_from( self.tracks.len(), self.current_index, &mut self.rng ) );
        }

        tracing::info!( "Shuffle: {}", self.is_shuffled() );
        self.is_shuffled()
    }


    /// Sets the desired play/pause state.
    pub fn set_playing( &mut self, playing: bool ) {
        self.is_playing = playing;
    }


    pub fn set_rate( &mut self, rate: PlaybackRate ) {
        self.rate = rate;
    }


    pub fn set_ready( &mut self, ready: bool ) {
        self.is_player_ready = ready;
    }


    pub fn set_loading( &mut self, loading: bool ) {
        self.is_loading = loading;
    }


    /// Sets or clears the error message. Either way, loading ends.
    pub fn set_error( &mut self, error: Option<String> ) {
        self.error = error;
        self.is_loading = false;
    }


    /// Patches the display fields of one track. Positional state is untouched.
    pub fn update_track_metadata( &mut self, index: usize, metadata: &TrackMetadata ) -> bool {
        match self.tracks.get_mut( index ) {
            Some( track ) => {
                track.apply_metadata( metadata );
                true
            }
            None => false,
        }
    }


    /// Position of a track by id.
    pub fn position_of( &self, track_id: &str ) -> Option<usize> {
        self.tracks.iter().position( |t| t.id == track_id )
    }


    pub fn tracks( &self ) -> &[Track] {
        &self.tracks
    }


    pub fn current_index( &self ) -> Option<usize> {
        self.current_index
    }


    pub fn current_track( &self ) -> Option<&Track> {
        self.current_index.and_then( |i| self.tracks.get( i ) )
    }


    pub fn is_playing( &self ) -> bool {
        self.is_playing
    }


    pub fn is_shuffled( &self ) -> bool {
        self.shuffle_order.is_some()
    }


    pub fn shuffle_order( &self ) -> Option<&[usize]> {
        self.shuffle_order.as_deref()
    }


    pub fn rate( &self ) -> PlaybackRate {
        self.rate
    }


    pub fn is_player_ready( &self ) -> bool {
        self.is_player_ready
    }


    pub fn is_loading( &self ) -> bool {
        self.is_loading
    }


    pub fn error( &self ) -> Option<&str> {
        self.error.as_deref()
    }


    /// True once a track list has been loaded.
    pub fn is_loaded( &self ) -> bool {
        self.loaded
    }


    pub fn len( &self ) -> usize {
        self.tracks.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.tracks.is_empty()
    }


    fn regenerate_shuffle_order( &mut self ) {
        if self.shuffle_order.is_some() {
            self.shuffle_order = Some( shuffled_order_from( self.tracks.len(), self.current_index, &mut self.rng ) );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn tracks( names: &[&str] ) -> Vec<Track> {
        names.iter()
            .map( |n| {
                let mut t = Track::new( "p", format!( "https://youtu.be/{}", n ), *n );
                t.id = n.to_string();
                t
            })
            .collect()
    }


    fn loaded( names: &[&str] ) -> PlaybackState {
        let mut state = PlaybackState::with_seed( 42 );
        state.load_initial( tracks( names ) ).unwrap();
        state
    }


    fn current_id( state: &PlaybackState ) -> Option<&str> {
        state.current_track().map( |t| t.id.as_str() )
    }


    #[test]
    fn test_load_initial_sets_first() {
        let state = loaded( &[ "a", "b" ] );
        assert_eq!( state.current_index(), Some( 0 ) );
        assert!( !state.is_playing() );
    }


    #[test]
    fn test_load_initial_empty() {
        let state = loaded( &[] );
        assert_eq!( state.current_index(), None );
    }


    #[test]
    fn test_load_initial_only_once() {
        let mut state = loaded( &[ "a" ] );
        assert_eq!( state.load_initial( tracks( &[ "b" ] ) ), Err( PlaybackError::AlreadyLoaded ) );
        assert_eq!( current_id( &state ), Some( "a" ) );
    }


    #[test]
    fn test_play_at_out_of_range_is_ignored() {
        let mut state = loaded( &[ "a", "b" ] );
        assert!( !state.play_at( 5 ) );
        assert_eq!( state.current_index(), Some( 0 ) );
        assert!( !state.is_playing() );
    }


    #[test]
    fn test_play_all_empty() {
        let mut state = loaded( &[] );
        assert_eq!( state.play_all(), Err( PlaybackError::NothingToPlay ) );
    }


    #[test]
    fn test_advance_wraps() {
        let mut state = loaded( &[ "a", "b", "c" ] );
        state.play_at( 2 );
        assert_eq!( state.advance(), Some( 0 ) );
    }


    #[test]
    fn test_retreat_wraps() {
        let mut state = loaded( &[ "a", "b", "c" ] );
        state.play_at( 0 );
        assert_eq!( state.retreat(), Some( 2 ) );
    }


    #[test]
    fn test_advance_empty_is_noop() {
        let mut state = loaded( &[] );
        assert_eq!( state.advance(), None );
        assert_eq!( state.current_index(), None );
    }


    #[test]
    fn test_advance_follows_shuffle_order() {
        let mut state = loaded( &[ "a", "b", "c", "d", "e" ] );
        state.play_at( 2 );
        state.toggle_shuffle();
        let order = state.shuffle_order().unwrap().to_vec();
        assert_eq!( order[ 0 ], 2 );

        for expected in order.iter().skip( 1 ) {
            assert_eq!( state.advance(), Some( *expected ) );
        }
        assert_eq!( state.advance(), Some( 2 ) );
    }


    #[test]
    fn test_retreat_in_shuffle_walks_backwards() {
        let mut state = loaded( &[ "a", "b", "c", "d" ] );
        state.toggle_shuffle();
        let order = state.shuffle_order().unwrap().to_vec();
        assert_eq!( state.retreat(), Some( order[ 3 ] ) );
        assert_eq!( state.retreat(), Some( order[ 2 ] ) );
    }


    #[test]
    fn test_shuffle_toggle_keeps_current() {
        let mut state = loaded( &[ "a", "b", "c", "d", "e" ] );
        state.play_at( 3 );
        state.toggle_shuffle();
        assert_eq!( current_id( &state ), Some( "d" ) );
        state.toggle_shuffle();
        assert_eq!( current_id( &state ), Some( "d" ) );
        assert!( state.shuffle_order().is_none() );
        assert_eq!( state.advance(), Some( 4 ) );
    }


    #[test]
    fn test_reconcile_keeps_current_identity() {
        let mut state = loaded( &[ "a", "b", "c" ] );
        state.play_at( 1 );
        state.reconcile_tracks( tracks( &[ "x", "a", "b", "c" ] ) );
        assert_eq!( state.current_index(), Some( 2 ) );
        assert_eq!( current_id( &state ), Some( "b" ) );
        assert!( state.is_playing() );
    }


    #[test]
    fn test_reconcile_deleted_current_stays_in_slot() {
        let mut state = loaded( &[ "a", "b", "c" ] );
        state.play_at( 1 );
        state.reconcile_tracks( tracks( &[ "a", "c" ] ) );
        assert_eq!( current_id( &state ), Some( "c" ) );
        assert!( state.is_playing() );
    }


    #[test]
    fn test_reconcile_deleted_last_clamps() {
        let mut state = loaded( &[ "a", "b", "c" ] );
        state.play_at( 2 );
        state.reconcile_tracks( tracks( &[ "a", "b" ] ) );
        assert_eq!( current_id( &state ), Some( "b" ) );
    }


    #[test]
    fn test_reconcile_to_empty_and_back() {
        let mut state = loaded( &[ "a" ] );
        state.reconcile_tracks( Vec::new() );
        assert_eq!( state.current_index(), None );
        state.reconcile_tracks( tracks( &[ "n" ] ) );
        assert_eq!( state.current_index(), Some( 0 ) );
    }


    #[test]
    fn test_reconcile_regenerates_shuffle() {
        let mut state = loaded( &[ "a", "b" ] );
        state.toggle_shuffle();
        state.reconcile_tracks( tracks( &[ "a", "b", "c", "d" ] ) );
        let mut order = state.shuffle_order().unwrap().to_vec();
        order.sort_unstable();
        assert_eq!( order, vec![ 0, 1, 2, 3 ] );
    }


    #[test]
    fn test_set_error_clears_loading() {
        let mut state = loaded( &[ "a" ] );
        state.set_loading( true );
        state.set_error( Some( "boom".into() ) );
        assert!( !state.is_loading() );
        assert_eq!( state.error(), Some( "boom" ) );
        state.set_error( None );
        assert_eq!( state.error(), None );
    }


    #[test]
    fn test_update_metadata_keeps_position() {
        let mut state = loaded( &[ "a", "b" ] );
        state.play_at( 1 );
        let meta = TrackMetadata { title: "Real title".into(), artwork: Some( "art".into() ) };
        assert!( state.update_track_metadata( 0, &meta ) );
        assert!( !state.update_track_metadata( 9, &meta ) );
        assert_eq!( state.tracks()[ 0 ].title, "Real title" );
        assert_eq!( state.current_index(), Some( 1 ) );
    }


    #[test]
    fn test_rate_parsing() {
        assert_eq!( "1.25".parse::<PlaybackRate>().unwrap().as_f64(), 1.25 );
        assert_eq!( "0.5x".parse::<PlaybackRate>().unwrap().as_f64(), 0.5 );
        assert!( "3".parse::<PlaybackRate>().is_err() );
        assert!( "0.3".parse::<PlaybackRate>().is_err() );
        assert!( "0".parse::<PlaybackRate>().is_err() );
        assert!( "NaN".parse::<PlaybackRate>().is_err() );
        assert!( "inf".parse::<PlaybackRate>().is_err() );
        assert!( PlaybackRate::new( f64::NAN ).is_none() );
        assert_eq!( PlaybackRate::all().count(), 8 );
        assert_eq!( PlaybackRate::default().to_string(), "1x" );
    }


    #[test]
    fn test_rate_serde() {
        let rate: PlaybackRate = serde_json::from_str( "1.75" ).unwrap();
        assert_eq!( rate.as_f64(), 1.75 );
        assert_eq!( serde_json::to_string( &rate ).unwrap(), "1.75" );
        assert!( serde_json::from_str::<PlaybackRate>( "2.5" ).is_err() );
    }
}
