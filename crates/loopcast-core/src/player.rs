//! External player adapter
//!
//! Wraps an external, asynchronously initialising player behind a narrow
//! command interface. Raw player notifications arrive on the coordinator's
//! input queue and are normalised here into [`PlayerEvent`]s.

use thiserror::Error;
use tokio::sync::{ mpsc, oneshot };

use crate::coordinator::Input;
use crate::playback::PlaybackRate;


/// Errors that can occur while driving the external player.
#[derive( Debug, Error )]
pub enum PlayerError {
    #[error( "Player library is not ready" )]
    LibraryNotReady,

    #[error( "Player has not been created" )]
    NotCreated,

    #[error( "Failed to create player: {0}" )]
    Construction( String ),

    #[error( "Player is disconnected" )]
    Disconnected,

    #[error( "Player command failed: {0}" )]
    Command( String ),
}


/// State reported by the external player.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}


impl PlayerState {
    /// Maps the player's numeric state code.
    pub fn from_code( code: i32 ) -> Option<Self> {
        match code {
            -1 => Some( PlayerState::Unstarted ),
            0 => Some( PlayerState::Ended ),
            1 => Some( PlayerState::Playing ),
            2 => Some( PlayerState::Paused ),
            3 => Some( PlayerState::Buffering ),
            5 => Some( PlayerState::Cued ),
            _ => None,
        }
    }


    pub fn code( self ) -> i32 {
        match self {
            PlayerState::Unstarted => -1,
            PlayerState::Ended => 0,
            PlayerState::Playing => 1,
            PlayerState::Paused => 2,
            PlayerState::Buffering => 3,
            PlayerState::Cued => 5,
        }
    }
}


/// Classes of playback failure.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum FaultKind {
    InvalidItem,
    PlayerInternal,
    NotFound,
    Restricted,
    Unknown,
}


/// A playback error reported by the player.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct PlaybackFault {
    pub code: i32,
}


impl PlaybackFault {
    pub fn kind( &self ) -> FaultKind {
        match self.code {
            2 => FaultKind::InvalidItem,
            5 => FaultKind::PlayerInternal,
            100 => FaultKind::NotFound,
            101 | 150 => FaultKind::Restricted,
            _ => FaultKind::Unknown,
        }
    }


    /// User-facing description.
    pub fn message( &self ) -> &'static str {
        match self.kind() {
            FaultKind::InvalidItem => "Invalid video id.",
            FaultKind::PlayerInternal => "The player hit an internal error.",
            FaultKind::NotFound => "Video not found.",
            FaultKind::Restricted => "The video owner does not allow playback here.",
            FaultKind::Unknown => "An error occurred during playback.",
        }
    }
}


/// Notifications as emitted by a player backend.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum RawPlayerEvent {
    Ready,
    StateChange( i32 ),
    Error( i32 ),
    /// The player instance died or never finished starting up.
    Crashed( String ),
}


/// Normalised player events consumed by the coordinator.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum PlayerEvent {
    Ready,
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
    Cued,
    Error( PlaybackFault ),
    Fatal( String ),
}


/// Metadata the player knows about the loaded item.
#[derive( Debug, Clone, PartialEq, Eq, Default )]
pub struct VideoData {
    pub video_id: String,
    pub title: String,
}


/// Handle given to a backend for reporting raw events.
#[derive( Debug, Clone )]
pub struct PlayerEventSink {
    tx: mpsc::UnboundedSender<Input>,
}


impl PlayerEventSink {
    pub( crate ) fn new( tx: mpsc::UnboundedSender<Input> ) -> Self {
        Self { tx }
    }


    /// Queues an event. Returns false once the coordinator is gone.
    pub fn emit( &self, event: RawPlayerEvent ) -> bool {
        self.tx.send( Input::Player( event ) ).is_ok()
    }
}


/// A constructed player instance.
pub trait ExternalPlayer {
    /// Loads an item and starts playing it.
    fn load_video( &mut self, video_id: &str ) -> Result<(), PlayerError>;

    /// Loads an item without starting playback.
    fn cue_video( &mut self, video_id: &str ) -> Result<(), PlayerError>;

    fn play( &mut self ) -> Result<(), PlayerError>;

    fn pause( &mut self ) -> Result<(), PlayerError>;

    fn set_playback_rate( &mut self, rate: f64 ) -> Result<(), PlayerError>;

    /// Last state the player reported, if any.
    fn state( &self ) -> Option<PlayerState>;

    /// Metadata of the loaded item, if the player has it yet.
    fn video_data( &self ) -> Option<VideoData>;
}


/// Constructs players.
pub trait PlayerBackend {
    /// Resolves once players can be constructed. If the sender is dropped
    /// instead, the library never became available.
    fn library_ready( &mut self ) -> oneshot::Receiver<()>;

    /// Constructs a player for `video_id`.
    fn create(
        &mut self,
        video_id: &str,
        autoplay: bool,
        events: PlayerEventSink,
    ) -> Result<Box<dyn ExternalPlayer>, PlayerError>;
}


/// Owns the single player instance and filters redundant commands.
pub struct PlayerAdapter {
    backend: Box<dyn PlayerBackend>,
    player: Option<Box<dyn ExternalPlayer>>,
    events: PlayerEventSink,
    library_ready: bool,
    failed: bool,
    ready: bool,
    ever_ready: bool,
    loaded_item: Option<String>,
    rate: PlaybackRate,
    applied_rate: Option<PlaybackRate>,
}


impl PlayerAdapter {
    pub fn new( backend: Box<dyn PlayerBackend>, events: PlayerEventSink ) -> Self {
        Self {
            backend,
            player: None,
            events,
            library_ready: false,
            failed: false,
            ready: false,
            ever_ready: false,
            loaded_item: None,
            rate: PlaybackRate::default(),
            applied_rate: None,
        }
    }


    /// Readiness signal of the backend's player library.
    pub fn library_ready_signal( &mut self ) -> oneshot::Receiver<()> {
        self.backend.library_ready()
    }


    pub fn mark_library_ready( &mut self ) {
        tracing::info!( "Player library ready" );
        self.library_ready = true;
    }


    pub fn is_library_ready( &self ) -> bool {
        self.library_ready
    }


    pub fn is_created( &self ) -> bool {
        self.player.is_some()
    }


    pub fn is_ready( &self ) -> bool {
        self.ready
    }


    pub fn has_failed( &self ) -> bool {
        self.failed
    }


    pub fn loaded_item( &self ) -> Option<&str> {
        self.loaded_item.as_deref()
    }


    /// True if [`create`](Self::create) would construct a player now.
    pub fn can_create( &self ) -> bool {
        self.library_ready && self.player.is_none() && !self.failed
    }


    /// Constructs the player. Only ever happens once per adapter.
    ///
    /// @returns Ok(false) if a player already exists
    pub fn create( &mut self, video_id: &str, autoplay: bool ) -> Result<bool, PlayerError> {
        if self.player.is_some() {
            return Ok( false );
        }
        if self.failed {
            return Err( PlayerError::Construction( "player failed earlier".into() ) );
        }
        if !self.library_ready {
            return Err( PlayerError::LibraryNotReady );
        }

        tracing::info!( "Creating player for {} (autoplay={})", video_id, autoplay );

        match self.backend.create( video_id, autoplay, self.events.clone() ) {
            Ok( player ) => {
                self.player = Some( player );
                self.loaded_item = Some( video_id.to_string() );
                Ok( true )
            }
            Err( e ) => {
                tracing::error!( "Player construction failed: {}", e );
                self.failed = true;
                Err( e )
            }
        }
    }


    /// Loads (when `playing`) or cues an item. Skips the item already loaded.
    ///
    /// @returns Ok(true) if a command was issued
    pub fn load_item( &mut self, video_id: &str, playing: bool ) -> Result<bool, PlayerError> {
        if self.loaded_item.as_deref() == Some( video_id ) {
            tracing::debug!( "Item {} already loaded, skipping", video_id );
            return Ok( false );
        }

        let player = self.player.as_mut().ok_or( PlayerError::NotCreated )?;

        if playing {
            tracing::info!( "Loading {}", video_id );
            player.load_video( video_id )?;
        } else {
            tracing::info!( "Cueing {}", video_id );
            player.cue_video( video_id )?;
        }

        self.loaded_item = Some( video_id.to_string() );
        Ok( true )
    }


    /// Brings the player's play/pause state in line with `playing`.
    ///
    /// @returns Ok(true) if a command was issued
    pub fn set_playback_state( &mut self, playing: bool ) -> Result<bool, PlayerError> {
        if !self.ready {
            return Ok( false );
        }

        let player = self.player.as_mut().ok_or( PlayerError::NotCreated )?;
        let current = player.state();

        if playing {
            if !matches!( current, Some( PlayerState::Playing ) | Some( PlayerState::Buffering ) ) {
                tracing::debug!( "Player reports {:?}, starting playback", current );
                player.play()?;
                return Ok( true );
            }
        } else if current == Some( PlayerState::Playing ) {
            tracing::debug!( "Pausing player" );
            player.pause()?;
            return Ok( true );
        }

        Ok( false )
    }


    /// Records the desired rate and forwards it while ready.
    ///
    /// @returns Ok(true) if a command was issued
    pub fn set_rate( &mut self, rate: PlaybackRate ) -> Result<bool, PlayerError> {
        self.rate = rate;
        if !self.ready || self.applied_rate == Some( rate ) {
            return Ok( false );
        }

        let player = self.player.as_mut().ok_or( PlayerError::NotCreated )?;
        tracing::info!( "Playback rate: {}", rate );
        player.set_playback_rate( rate.as_f64() )?;
        self.applied_rate = Some( rate );
        Ok( true )
    }


    /// Normalises a raw event, updating readiness along the way.
    pub fn observe( &mut self, raw: RawPlayerEvent ) -> Option<PlayerEvent> {
        tracing::debug!( "Raw player event: {:?}", raw );

        match raw {
            RawPlayerEvent::Ready => {
                self.become_ready();
                Some( PlayerEvent::Ready )
            }
            RawPlayerEvent::StateChange( code ) => {
                let state = match PlayerState::from_code( code ) {
                    Some( state ) => state,
                    None => {
                        tracing::warn!( "Ignoring unknown player state {}", code );
                        return None;
                    }
                };

                Some( match state {
                    PlayerState::Unstarted => PlayerEvent::Unstarted,
                    PlayerState::Ended => PlayerEvent::Ended,
                    PlayerState::Playing => {
                        if !self.ready {
                            self.become_ready();
                        }
                        PlayerEvent::Playing
                    }
                    PlayerState::Paused => PlayerEvent::Paused,
                    PlayerState::Buffering => PlayerEvent::Buffering,
                    PlayerState::Cued => PlayerEvent::Cued,
                })
            }
            RawPlayerEvent::Error( code ) => Some( PlayerEvent::Error( PlaybackFault { code } ) ),
            RawPlayerEvent::Crashed( reason ) => {
                tracing::error!( "Player crashed: {}", reason );
                self.player = None;
                self.failed = true;
                self.ready = false;
                self.loaded_item = None;
                Some( PlayerEvent::Fatal( reason ) )
            }
        }
    }


    /// Stops issuing commands until the player is ready again.
    pub fn mark_unready( &mut self ) {
        self.ready = false;
    }


    /// Makes a halted player usable again after explicit user action.
    ///
    /// @returns false if there is no player that was ever ready
    pub fn rearm( &mut self ) -> bool {
        if self.player.is_none() || !self.ever_ready {
            return false;
        }
        self.become_ready();
        true
    }


    /// Metadata of the loaded item, as the player sees it.
    pub fn video_data( &self ) -> Option<VideoData> {
        self.player.as_ref().and_then( |p| p.video_data() )
    }


    fn become_ready( &mut self ) {
        self.ready = true;
        self.ever_ready = true;
        self.applied_rate = None;
        if let Err( e ) = self.set_rate( self.rate ) {
            tracing::warn!( "Failed to re-apply playback rate: {}", e );
        }
    }
}


impl std::fmt::Debug for PlayerAdapter {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "PlayerAdapter" )
            .field( "created", &self.player.is_some() )
            .field( "library_ready", &self.library_ready )
            .field( "failed", &self.failed )
            .field( "ready", &self.ready )
            .field( "loaded_item", &self.loaded_item )
            .field( "rate", &self.rate )
            .finish()
    }
}


#[cfg( test )]
mod tests {
    use std::sync::{ Arc, Mutex };

    use super::*;


    #[derive( Debug, Clone, PartialEq )]
    enum Call {
        Load( String ),
        Cue( String ),
        Play,
        Pause,
        Rate( f64 ),
    }


    #[derive( Default )]
    struct Shared {
        calls: Vec<Call>,
        state: Option<PlayerState>,
    }


    struct FakePlayer( Arc<Mutex<Shared>> );


    impl ExternalPlayer for FakePlayer {
        fn load_video( &mut self, video_id: &str ) -> Result<(), PlayerError> {
            self.0.lock().unwrap().calls.push( Call::Load( video_id.into() ) );
            Ok(())
        }

        fn cue_video( &mut self, video_id: &str ) -> Result<(), PlayerError> {
            self.0.lock().unwrap().calls.push( Call::Cue( video_id.into() ) );
            Ok(())
        }

        fn play( &mut self ) -> Result<(), PlayerError> {
            let mut shared = self.0.lock().unwrap();
            shared.calls.push( Call::Play );
            shared.state = Some( PlayerState::Playing );
            Ok(())
        }

        fn pause( &mut self ) -> Result<(), PlayerError> {
            let mut shared = self.0.lock().unwrap();
            shared.calls.push( Call::Pause );
            shared.state = Some( PlayerState::Paused );
            Ok(())
        }

        fn set_playback_rate( &mut self, rate: f64 ) -> Result<(), PlayerError> {
            self.0.lock().unwrap().calls.push( Call::Rate( rate ) );
            Ok(())
        }

        fn state( &self ) -> Option<PlayerState> {
            self.0.lock().unwrap().state
        }

        fn video_data( &self ) -> Option<VideoData> {
            None
        }
    }


    struct FakeBackend {
        shared: Arc<Mutex<Shared>>,
        creates: Arc<Mutex<u32>>,
        fail: bool,
    }


    impl PlayerBackend for FakeBackend {
        fn library_ready( &mut self ) -> oneshot::Receiver<()> {
            let ( tx, rx ) = oneshot::channel();
            let _ = tx.send( () );
            rx
        }

        fn create(
            &mut self,
            _video_id: &str,
            _autoplay: bool,
            _events: PlayerEventSink,
        ) -> Result<Box<dyn ExternalPlayer>, PlayerError> {
            *self.creates.lock().unwrap() += 1;
            if self.fail {
                return Err( PlayerError::Construction( "no display".into() ) );
            }
            Ok( Box::new( FakePlayer( Arc::clone( &self.shared ) ) ) )
        }
    }


    fn adapter( fail: bool ) -> ( PlayerAdapter, Arc<Mutex<Shared>>, Arc<Mutex<u32>> ) {
        let shared = Arc::new( Mutex::new( Shared::default() ) );
        let creates = Arc::new( Mutex::new( 0 ) );
        let backend = FakeBackend { shared: Arc::clone( &shared ), creates: Arc::clone( &creates ), fail };
        let ( tx, _rx ) = mpsc::unbounded_channel();
        let adapter = PlayerAdapter::new( Box::new( backend ), PlayerEventSink::new( tx ) );
        ( adapter, shared, creates )
    }


    fn calls( shared: &Arc<Mutex<Shared>> ) -> Vec<Call> {
        shared.lock().unwrap().calls.clone()
    }


    #[test]
    fn test_create_requires_library() {
        let ( mut adapter, _, creates ) = adapter( false );
        assert!( matches!( adapter.create( "a", false ), Err( PlayerError::LibraryNotReady ) ) );
        assert_eq!( *creates.lock().unwrap(), 0 );
    }


    #[test]
    fn test_create_only_once() {
        let ( mut adapter, _, creates ) = adapter( false );
        adapter.mark_library_ready();
        assert!( adapter.create( "a", false ).unwrap() );
        assert!( !adapter.create( "b", true ).unwrap() );
        assert_eq!( *creates.lock().unwrap(), 1 );
        assert_eq!( adapter.loaded_item(), Some( "a" ) );
    }


    #[test]
    fn test_failed_construction_is_not_retried() {
        let ( mut adapter, _, creates ) = adapter( true );
        adapter.mark_library_ready();
        assert!( adapter.create( "a", false ).is_err() );
        assert!( !adapter.can_create() );
        assert!( adapter.create( "a", false ).is_err() );
        assert_eq!( *creates.lock().unwrap(), 1 );
    }


    #[test]
    fn test_load_vs_cue_and_same_item_suppression() {
        let ( mut adapter, shared, _ ) = adapter( false );
        adapter.mark_library_ready();
        adapter.create( "a", false ).unwrap();

        assert!( !adapter.load_item( "a", true ).unwrap() );
        assert!( adapter.load_item( "b", true ).unwrap() );
        assert!( adapter.load_item( "c", false ).unwrap() );
        assert!( !adapter.load_item( "c", false ).unwrap() );

        assert_eq!( calls( &shared ), vec![ Call::Load( "b".into() ), Call::Cue( "c".into() ) ] );
    }


    #[test]
    fn test_playback_state_only_on_disagreement() {
        let ( mut adapter, shared, _ ) = adapter( false );
        adapter.mark_library_ready();
        adapter.create( "a", true ).unwrap();

        // not ready yet
        assert!( !adapter.set_playback_state( true ).unwrap() );

        adapter.observe( RawPlayerEvent::Ready );
        shared.lock().unwrap().calls.clear();

        assert!( adapter.set_playback_state( true ).unwrap() );
        assert!( !adapter.set_playback_state( true ).unwrap() );
        assert!( adapter.set_playback_state( false ).unwrap() );
        assert!( !adapter.set_playback_state( false ).unwrap() );

        shared.lock().unwrap().state = Some( PlayerState::Buffering );
        assert!( !adapter.set_playback_state( true ).unwrap() );

        assert_eq!( calls( &shared ), vec![ Call::Play, Call::Pause ] );
    }


    #[test]
    fn test_rate_deferred_until_ready() {
        let ( mut adapter, shared, _ ) = adapter( false );
        adapter.mark_library_ready();
        adapter.create( "a", false ).unwrap();

        let fast = PlaybackRate::new( 1.5 ).unwrap();
        assert!( !adapter.set_rate( fast ).unwrap() );
        assert!( calls( &shared ).is_empty() );

        adapter.observe( RawPlayerEvent::Ready );
        assert_eq!( calls( &shared ), vec![ Call::Rate( 1.5 ) ] );

        assert!( !adapter.set_rate( fast ).unwrap() );

        // every ready transition re-sends the rate
        adapter.mark_unready();
        adapter.observe( RawPlayerEvent::Ready );
        assert_eq!( calls( &shared ), vec![ Call::Rate( 1.5 ), Call::Rate( 1.5 ) ] );
    }


    #[test]
    fn test_observe_maps_codes() {
        let ( mut adapter, _, _ ) = adapter( false );
        assert_eq!( adapter.observe( RawPlayerEvent::StateChange( 0 ) ), Some( PlayerEvent::Ended ) );
        assert_eq!( adapter.observe( RawPlayerEvent::StateChange( 3 ) ), Some( PlayerEvent::Buffering ) );
        assert_eq!( adapter.observe( RawPlayerEvent::StateChange( 5 ) ), Some( PlayerEvent::Cued ) );
        assert_eq!( adapter.observe( RawPlayerEvent::StateChange( 4 ) ), None );
        assert_eq!(
            adapter.observe( RawPlayerEvent::Error( 150 ) ),
            Some( PlayerEvent::Error( PlaybackFault { code: 150 } ) )
        );
    }


    #[test]
    fn test_fault_taxonomy() {
        assert_eq!( PlaybackFault { code: 2 }.kind(), FaultKind::InvalidItem );
        assert_eq!( PlaybackFault { code: 5 }.kind(), FaultKind::PlayerInternal );
        assert_eq!( PlaybackFault { code: 100 }.kind(), FaultKind::NotFound );
        assert_eq!( PlaybackFault { code: 101 }.kind(), FaultKind::Restricted );
        assert_eq!( PlaybackFault { code: 150 }.kind(), FaultKind::Restricted );
        assert_eq!( PlaybackFault { code: 7 }.kind(), FaultKind::Unknown );
    }


    #[test]
    fn test_crash_drops_player() {
        let ( mut adapter, _, _ ) = adapter( false );
        adapter.mark_library_ready();
        adapter.create( "a", true ).unwrap();
        adapter.observe( RawPlayerEvent::Ready );

        let event = adapter.observe( RawPlayerEvent::Crashed( "exited".into() ) );
        assert_eq!( event, Some( PlayerEvent::Fatal( "exited".into() ) ) );
        assert!( !adapter.is_created() );
        assert!( !adapter.can_create() );
        assert!( !adapter.rearm() );
    }


    #[test]
    fn test_rearm_after_unready() {
        let ( mut adapter, _, _ ) = adapter( false );
        adapter.mark_library_ready();
        adapter.create( "a", true ).unwrap();
        assert!( !adapter.rearm() );

        adapter.observe( RawPlayerEvent::Ready );
        adapter.mark_unready();
        assert!( !adapter.is_ready() );
        assert!( adapter.rearm() );
        assert!( adapter.is_ready() );
    }
}
