//! Playback coordinator
//!
//! Owns the playback state, the playlist library and the player adapter, and
//! consumes one input queue: user commands, raw player events, timer
//! firings and the player library's readiness signal. Inputs are handled
//! strictly one at a time and no handler awaits, so every transition is
//! atomic with respect to the others.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{ Deserialize, Serialize };
use tokio::sync::{ mpsc, watch };

use crate::command::{ Command, PlaylistRef };
use crate::library::PlaylistLibrary;
use crate::metadata::{ Extraction, MetadataReconciler };
use crate::playback::{ PlaybackRate, PlaybackState };
use crate::player::{ PlaybackFault, PlayerAdapter, PlayerBackend, PlayerError, PlayerEvent, PlayerEventSink, RawPlayerEvent };
use crate::store::{ StoreError, TrackStore };
use crate::timer::{ TimerFired, TimerKind, Timers };
use crate::track::{ PlaylistInfo, Track };
use crate::transfer::PlaylistExport;


/// Everything the coordinator reacts to.
#[derive( Debug )]
pub enum Input {
    Command( Command ),
    Player( RawPlayerEvent ),
    Timer( TimerFired ),
    /// The player library can construct players now.
    LibraryReady,
    /// The player library will never become available.
    LibraryUnavailable,
    Shutdown,
}


/// Timing constants, in milliseconds.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
#[serde( default )]
pub struct CoordinatorConfig {
    /// How long buffering may last before a stall warning.
    pub buffering_timeout_ms: u64,
    /// Delay before skipping an unplayable item.
    pub error_skip_delay_ms: u64,
    /// Consecutive errors that are skipped before playback halts.
    pub max_error_skips: u32,
    /// Delay before playing an item that was cued while playing.
    pub cue_play_delay_ms: u64,
    /// Base delay between metadata attempts, multiplied by the attempt number.
    pub metadata_retry_delay_ms: u64,
    pub metadata_max_retries: u32,
    pub metadata_delay_ready_ms: u64,
    pub metadata_delay_playing_ms: u64,
    pub metadata_delay_cued_ms: u64,
    pub metadata_delay_unstarted_ms: u64,
}


impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            buffering_timeout_ms: 20_000,
            error_skip_delay_ms: 2_000,
            max_error_skips: 3,
            cue_play_delay_ms: 100,
            metadata_retry_delay_ms: 1_500,
            metadata_max_retries: 3,
            metadata_delay_ready_ms: 1_000,
            metadata_delay_playing_ms: 1_500,
            metadata_delay_cued_ms: 1_000,
            metadata_delay_unstarted_ms: 1_000,
        }
    }
}


fn ms( millis: u64 ) -> Duration {
    Duration::from_millis( millis )
}


#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}


/// A user-facing message.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}


/// Read-only view of the session, published after every input.
#[derive( Debug, Clone, Default, PartialEq )]
pub struct Snapshot {
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub is_shuffled: bool,
    pub rate: PlaybackRate,
    pub is_player_ready: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub playlists: Vec<PlaylistInfo>,
    pub current_playlist_id: String,
    /// Playback stopped after too many consecutive errors.
    pub halted: bool,
}


impl Snapshot {
    pub fn current_track( &self ) -> Option<&Track> {
        self.current_index.and_then( |i| self.tracks.get( i ) )
    }


    pub fn current_playlist( &self ) -> Option<&PlaylistInfo> {
        self.playlists.iter().find( |p| p.id == self.current_playlist_id )
    }
}


/// Cloneable handle for talking to a running coordinator.
#[derive( Debug, Clone )]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Input>,
    snapshot: watch::Receiver<Snapshot>,
}


impl CoordinatorHandle {
    /// Queues a command. Returns false once the coordinator has stopped.
    pub fn send( &self, command: Command ) -> bool {
        self.tx.send( Input::Command( command ) ).is_ok()
    }


    pub fn shutdown( &self ) {
        let _ = self.tx.send( Input::Shutdown );
    }


    /// Latest published snapshot.
    pub fn snapshot( &self ) -> Snapshot {
        self.snapshot.borrow().clone()
    }


    pub fn subscribe( &self ) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }
}


pub struct Coordinator {
    state: PlaybackState,
    library: PlaylistLibrary,
    adapter: PlayerAdapter,
    timers: Timers,
    metadata: MetadataReconciler,
    config: CoordinatorConfig,
    tx: mpsc::UnboundedSender<Input>,
    rx: mpsc::UnboundedReceiver<Input>,
    snapshot_tx: watch::Sender<Snapshot>,
    notices: mpsc::UnboundedSender<Notice>,
    /// Id of the track the player was last pointed at.
    current_track_id: Option<String>,
    /// Play/pause state last pushed to the player since it became ready.
    synced_playing: Option<bool>,
    error_count: u32,
    halted: bool,
    started: bool,
    stopped: bool,
}


impl Coordinator {
    /// Creates a coordinator over the store's current playlist.
    pub fn new(
        backend: Box<dyn PlayerBackend>,
        store: Arc<dyn TrackStore>,
        config: CoordinatorConfig,
    ) -> Result<( Self, CoordinatorHandle, mpsc::UnboundedReceiver<Notice> ), StoreError> {
        Self::with_state( backend, store, config, PlaybackState::new() )
    }


    /// Like [`new`](Self::new), with reproducible shuffles.
    pub fn with_seed(
        backend: Box<dyn PlayerBackend>,
        store: Arc<dyn TrackStore>,
        config: CoordinatorConfig,
        seed: u64,
    ) -> Result<( Self, CoordinatorHandle, mpsc::UnboundedReceiver<Notice> ), StoreError> {
        Self::with_state( backend, store, config, PlaybackState::with_seed( seed ) )
    }


    fn with_state(
        backend: Box<dyn PlayerBackend>,
        store: Arc<dyn TrackStore>,
        config: CoordinatorConfig,
        mut state: PlaybackState,
    ) -> Result<( Self, CoordinatorHandle, mpsc::UnboundedReceiver<Notice> ), StoreError> {
        let library = PlaylistLibrary::open( store )?;
        if let Err( e ) = state.load_initial( library.tracks().to_vec() ) {
            tracing::warn!( "Initial load skipped: {}", e );
        }

        let ( tx, rx ) = mpsc::unbounded_channel();
        let ( notice_tx, notice_rx ) = mpsc::unbounded_channel();
        let ( snapshot_tx, snapshot_rx ) = watch::channel( Snapshot::default() );

        let adapter = PlayerAdapter::new( backend, PlayerEventSink::new( tx.clone() ) );
        let metadata = MetadataReconciler::new(
            config.metadata_max_retries,
            ms( config.metadata_retry_delay_ms ),
        );

        let coordinator = Self {
            state,
            library,
            adapter,
            timers: Timers::new( tx.clone() ),
            metadata,
            config,
            tx: tx.clone(),
            rx,
            snapshot_tx,
            notices: notice_tx,
            current_track_id: None,
            synced_playing: None,
            error_count: 0,
            halted: false,
            started: false,
            stopped: false,
        };
        coordinator.publish();

        let handle = CoordinatorHandle { tx, snapshot: snapshot_rx };
        Ok(( coordinator, handle, notice_rx ))
    }


    /// Applies saved preferences before playback starts.
    pub fn apply_preferences( &mut self, shuffle: bool, rate: PlaybackRate ) {
        if shuffle != self.state.is_shuffled() {
            self.state.toggle_shuffle();
        }
        self.state.set_rate( rate );
        self.publish();
    }


    pub fn state( &self ) -> &PlaybackState {
        &self.state
    }


    pub fn library( &self ) -> &PlaylistLibrary {
        &self.library
    }


    pub fn adapter( &self ) -> &PlayerAdapter {
        &self.adapter
    }


    pub fn error_count( &self ) -> u32 {
        self.error_count
    }


    pub fn is_halted( &self ) -> bool {
        self.halted
    }


    /// Starts waiting for the player library. Only the first call does anything.
    pub fn start( &mut self ) {
        if self.started {
            return;
        }
        self.started = true;

        let signal = self.adapter.library_ready_signal();
        let tx = self.tx.clone();
        tokio::spawn( async move {
            let input = match signal.await {
                Ok(()) => Input::LibraryReady,
                Err( _ ) => Input::LibraryUnavailable,
            };
            let _ = tx.send( input );
        });
    }


    /// Processes inputs until shutdown.
    pub async fn run( mut self ) {
        self.start();
        tracing::info!( "Coordinator running" );

        while let Some( input ) = self.rx.recv().await {
            if !self.handle( input ) {
                break;
            }
        }

        self.shutdown();
        tracing::info!( "Coordinator stopped" );
    }


    /// Handles every input that is already queued.
    ///
    /// @returns The number of inputs handled
    pub fn drain( &mut self ) -> usize {
        let mut handled = 0;
        while let Ok( input ) = self.rx.try_recv() {
            handled += 1;
            if !self.handle( input ) {
                break;
            }
        }
        handled
    }


    /// Handles one input.
    ///
    /// @returns false once the coordinator should stop
    pub fn handle( &mut self, input: Input ) -> bool {
        if self.stopped {
            return false;
        }

        match input {
            Input::Command( Command::Quit ) | Input::Shutdown => {
                self.shutdown();
                self.publish();
                return false;
            }
            Input::Command( command ) => self.on_command( command ),
            Input::Player( raw ) => {
                if let Some( event ) = self.adapter.observe( raw ) {
                    self.on_player_event( event );
                }
            }
            Input::Timer( fired ) => {
                if self.timers.take_if_current( &fired ) {
                    self.on_timer( fired.kind );
                }
            }
            Input::LibraryReady => {
                self.adapter.mark_library_ready();
                self.sync_player();
            }
            Input::LibraryUnavailable => {
                tracing::error!( "Player library never became available" );
                self.state.set_error( Some( "The player could not be loaded.".into() ) );
                self.notify( NoticeLevel::Error, "The player could not be loaded." );
            }
        }

        self.publish();
        true
    }


    /// Cancels every timer. Further inputs are ignored.
    pub fn shutdown( &mut self ) {
        if !self.stopped {
            tracing::info!( "Shutting down coordinator" );
        }
        self.stopped = true;
        self.timers.cancel_all();
    }


    // -- commands --------------------------------------------------------


    fn on_command( &mut self, command: Command ) {
        tracing::debug!( "Command: {:?}", command );

        match command {
            Command::Add { urls } => match self.library.add_urls( urls.as_slice() ) {
                Ok( outcome ) => {
                    if outcome.added > 0 {
                        self.notify( NoticeLevel::Info, format!( "Added {} track(s)", outcome.added ) );
                    }
                    for rejected in &outcome.rejected {
                        self.notify( NoticeLevel::Warning, format!( "Not a valid link: {}", rejected ) );
                    }
                    if outcome.failed > 0 {
                        self.notify( NoticeLevel::Error, format!( "Failed to save {} track(s)", outcome.failed ) );
                    }
                    self.reconcile();
                }
                Err( e ) => self.storage_failed( "add tracks", e ),
            },
            Command::Remove { index } => {
                let track_id = match self.state.tracks().get( index ) {
                    Some( track ) => track.id.clone(),
                    None => return self.no_such_track( index ),
                };
                match self.library.remove_track( &track_id ) {
                    Ok( track ) => {
                        self.notify( NoticeLevel::Info, format!( "Removed {}", track.title ) );
                        self.reconcile();
                    }
                    Err( e ) => self.storage_failed( "remove track", e ),
                }
            }

            Command::Play { index: None } => {
                if self.state.current_index().is_none() {
                    return self.notify( NoticeLevel::Warning, "Nothing to play" );
                }
                self.resume_if_halted();
                self.state.set_playing( true );
                self.sync_player();
            }
            Command::Play { index: Some( index ) } => {
                if !self.state.play_at( index ) {
                    return self.no_such_track( index );
                }
                self.resume_if_halted();
                self.sync_player();
            }
            Command::PlayAll => {
                self.resume_if_halted();
                if let Err( e ) = self.state.play_all() {
                    return self.notify( NoticeLevel::Warning, e.to_string() );
                }
                self.sync_player();
            }
            Command::Pause => {
                self.state.set_playing( false );
                self.sync_player();
            }
            Command::Toggle => {
                if self.state.is_playing() {
                    self.state.set_playing( false );
                } else if self.state.current_index().is_some() {
                    self.resume_if_halted();
                    self.state.set_playing( true );
                } else {
                    return self.notify( NoticeLevel::Warning, "Nothing to play" );
                }
                self.sync_player();
            }
            Command::Next => {
                self.resume_if_halted();
                self.state.advance();
                self.sync_player();
            }
            Command::Prev => {
                self.resume_if_halted();
                self.state.retreat();
                self.sync_player();
            }
            Command::Shuffle => {
                let on = self.state.toggle_shuffle();
                self.notify( NoticeLevel::Info, if on { "Shuffle on" } else { "Shuffle off" } );
            }
            Command::Rate { rate } => {
                tracing::info!( "Rate change: {}", rate );
                self.state.set_rate( rate );
                self.sync_player();
            }

            Command::New { name } => match self.library.create_playlist( &name ) {
                Ok( playlist ) => {
                    self.notify( NoticeLevel::Info, format!( "Created playlist {}", playlist.name ) );
                    self.reconcile();
                }
                Err( e ) => self.storage_failed( "create playlist", e ),
            },
            Command::Rename { name } => {
                let id = self.library.current_playlist_id().to_string();
                match self.library.rename_playlist( &id, &name ) {
                    Ok(()) => self.notify( NoticeLevel::Info, format!( "Renamed playlist to {}", name.trim() ) ),
                    Err( e ) => self.storage_failed( "rename playlist", e ),
                }
            }
            Command::Switch { target } => {
                let Some( id ) = self.resolve_playlist( &target ) else { return };
                match self.library.switch_playlist( &id ) {
                    Ok(()) => {
                        let name = self.library.current_playlist().map( |p| p.name.clone() ).unwrap_or( id );
                        self.notify( NoticeLevel::Info, format!( "Switched to {}", name ) );
                        self.reconcile();
                    }
                    Err( e ) => self.storage_failed( "switch playlist", e ),
                }
            }
            Command::Drop { target } => {
                let Some( id ) = self.resolve_playlist( &target ) else { return };
                match self.library.delete_playlist( &id ) {
                    Ok(()) => {
                        self.notify( NoticeLevel::Info, "Playlist deleted" );
                        self.reconcile();
                    }
                    Err( e ) => self.storage_failed( "delete playlist", e ),
                }
            }
            Command::Export { path } => self.export( path ),
            Command::Import { path } => self.import( path ),

            // answered by the front end from the snapshot
            Command::List | Command::Playlists | Command::Status | Command::Help => {}
            Command::Quit => {}
        }
    }


    fn export( &mut self, path: Option<PathBuf> ) {
        let doc = match self.library.export() {
            Ok( doc ) => doc,
            Err( e ) => return self.storage_failed( "export playlist", e ),
        };

        let path = match path {
            Some( p ) if p.is_dir() => p.join( doc.file_name() ),
            Some( p ) => p,
            None => PathBuf::from( doc.file_name() ),
        };

        match doc.write_to( &path ) {
            Ok(()) => self.notify( NoticeLevel::Info, format!( "Exported {} track(s) to {}", doc.tracks.len(), path.display() ) ),
            Err( e ) => {
                tracing::warn!( "Export failed: {}", e );
                self.notify( NoticeLevel::Error, format!( "Export failed: {}", e ) );
            }
        }
    }


    fn import( &mut self, path: PathBuf ) {
        let doc = match PlaylistExport::read_from( &path ) {
            Ok( doc ) => doc,
            Err( e ) => {
                tracing::warn!( "Import of {:?} failed: {}", path, e );
                return self.notify( NoticeLevel::Error, format!( "Import failed: {}", e ) );
            }
        };

        match self.library.import( &doc ) {
            Ok( count ) => {
                self.notify( NoticeLevel::Info, format!( "Imported {} track(s)", count ) );
                self.reconcile();
            }
            Err( e ) => {
                // some tracks may have landed before the failure
                if let Err( e ) = self.library.refresh() {
                    tracing::warn!( "Refresh after failed import failed: {}", e );
                }
                self.reconcile();
                self.storage_failed( "import playlist", e );
            }
        }
    }


    fn resolve_playlist( &mut self, target: &PlaylistRef ) -> Option<String> {
        let found = match target {
            PlaylistRef::Position( index ) => self.library.playlists().get( *index ),
            PlaylistRef::Id( id ) => self.library.playlists().iter().find( |p| &p.id == id ),
        };

        match found {
            Some( playlist ) => Some( playlist.id.clone() ),
            None => {
                self.notify( NoticeLevel::Warning, "No such playlist" );
                None
            }
        }
    }


    fn reconcile( &mut self ) {
        self.state.reconcile_tracks( self.library.tracks().to_vec() );
        self.sync_player();
    }


    fn resume_if_halted( &mut self ) {
        if !self.halted {
            return;
        }

        tracing::info!( "Resuming after halted playback" );
        self.halted = false;
        self.error_count = 0;
        if self.adapter.rearm() {
            self.state.set_ready( true );
            self.synced_playing = None;
        }
    }


    // -- player ----------------------------------------------------------


    /// Pushes the desired state to the player: rate, creation, current item
    /// and play/pause.
    fn sync_player( &mut self ) {
        let current = self.state.current_track().map( |t| ( t.id.clone(), t.video_id().to_string() ) );
        let current_id = current.as_ref().map( |( id, _ )| id.clone() );

        if current_id != self.current_track_id {
            tracing::debug!( "Current track {:?} -> {:?}", self.current_track_id, current_id );
            self.timers.cancel( TimerKind::ErrorSkip );
            self.timers.cancel( TimerKind::BufferingWatchdog );
            self.timers.cancel( TimerKind::CuePlay );
            self.timers.cancel( TimerKind::Metadata );
            self.metadata.abandon();
            self.current_track_id = current_id;
        }

        // recorded even while not ready, sent on the next ready transition
        if let Err( e ) = self.adapter.set_rate( self.state.rate() ) {
            return self.command_failed( e );
        }

        let Some(( _, video_id )) = current else { return };
        let playing = self.state.is_playing();

        if self.adapter.can_create() {
            match self.adapter.create( &video_id, playing ) {
                Ok( _ ) => self.state.set_loading( true ),
                Err( e ) => return self.player_failed( e.to_string() ),
            }
            self.synced_playing = Some( playing );
        }

        if !self.adapter.is_ready() {
            return;
        }

        match self.adapter.load_item( &video_id, playing ) {
            Ok( true ) => {
                self.state.set_loading( true );
                self.synced_playing = Some( playing );
            }
            Ok( false ) => {}
            Err( e ) => return self.command_failed( e ),
        }

        if self.synced_playing != Some( playing ) {
            match self.adapter.set_playback_state( playing ) {
                Ok( _ ) => self.synced_playing = Some( playing ),
                Err( e ) => self.command_failed( e ),
            }
        }
    }


    fn on_player_event( &mut self, event: PlayerEvent ) {
        tracing::debug!( "Player event: {:?}", event );

        if !matches!( event, PlayerEvent::Error( _ ) | PlayerEvent::Fatal( _ ) ) {
            self.timers.cancel( TimerKind::BufferingWatchdog );
        }

        match event {
            PlayerEvent::Ready => {
                tracing::info!( "Player ready" );
                self.state.set_ready( true );
                self.state.set_error( None );
                self.synced_playing = None;
                self.schedule_metadata( self.config.metadata_delay_ready_ms );
                self.sync_player();
            }
            PlayerEvent::Playing => {
                if !self.state.is_player_ready() {
                    self.synced_playing = None;
                }
                self.state.set_ready( true );
                self.state.set_error( None );
                self.error_count = 0;
                self.halted = false;
                self.schedule_metadata( self.config.metadata_delay_playing_ms );
            }
            PlayerEvent::Paused => {
                self.state.set_loading( false );
            }
            PlayerEvent::Buffering => {
                self.state.set_loading( true );
                self.timers.schedule( TimerKind::BufferingWatchdog, ms( self.config.buffering_timeout_ms ) );
            }
            PlayerEvent::Ended => {
                tracing::info!( "Track ended" );
                self.state.advance();
                self.sync_player();
            }
            PlayerEvent::Cued => {
                self.state.set_loading( false );
                if self.state.is_playing() {
                    self.timers.schedule( TimerKind::CuePlay, ms( self.config.cue_play_delay_ms ) );
                }
                self.schedule_metadata( self.config.metadata_delay_cued_ms );
            }
            PlayerEvent::Unstarted => {
                self.schedule_metadata( self.config.metadata_delay_unstarted_ms );
            }
            PlayerEvent::Error( fault ) => self.on_fault( fault ),
            PlayerEvent::Fatal( reason ) => self.player_failed( reason ),
        }
    }


    fn on_fault( &mut self, fault: PlaybackFault ) {
        tracing::error!( "Playback error {} ({:?}): {}", fault.code, fault.kind(), fault.message() );
        self.state.set_error( Some( fault.message().to_string() ) );
        self.notify( NoticeLevel::Error, format!( "Playback error: {}", fault.message() ) );

        // stays put until the user acts or the player recovers on its own
        if self.halted {
            tracing::debug!( "Playback halted, not skipping" );
            return;
        }

        if self.error_count < self.config.max_error_skips {
            self.error_count += 1;
            tracing::info!(
                "Skipping in {} ms ({}/{})",
                self.config.error_skip_delay_ms, self.error_count, self.config.max_error_skips
            );
            self.timers.schedule( TimerKind::ErrorSkip, ms( self.config.error_skip_delay_ms ) );
        } else {
            tracing::warn!( "Too many consecutive errors, halting playback" );
            self.error_count = 0;
            self.halted = true;
            self.adapter.mark_unready();
            self.state.set_ready( false );
            self.timers.cancel( TimerKind::ErrorSkip );
            self.timers.cancel( TimerKind::CuePlay );
            self.notify( NoticeLevel::Error, "Playback stopped after repeated errors. Play to try again." );
        }
    }


    fn on_timer( &mut self, kind: TimerKind ) {
        tracing::debug!( "Timer fired: {:?}", kind );

        match kind {
            TimerKind::BufferingWatchdog => {
                tracing::warn!( "Buffering timed out" );
                let message = "Video loading is taking longer than expected.";
                self.state.set_error( Some( message.into() ) );
                self.notify( NoticeLevel::Warning, message );
            }
            TimerKind::ErrorSkip => {
                tracing::info!( "Skipping unplayable item" );
                self.state.advance();
                self.sync_player();
            }
            TimerKind::CuePlay => {
                if !self.state.is_playing() {
                    return;
                }
                match self.adapter.set_playback_state( true ) {
                    Ok( _ ) => self.synced_playing = Some( true ),
                    Err( e ) => self.command_failed( e ),
                }
            }
            TimerKind::Metadata => self.extract_metadata(),
        }
    }


    // -- metadata --------------------------------------------------------


    fn schedule_metadata( &mut self, delay_ms: u64 ) {
        let Some( track ) = self.state.current_track() else { return };
        if self.metadata.begin( track.video_id() ) {
            self.timers.schedule( TimerKind::Metadata, ms( delay_ms ) );
        }
    }


    fn extract_metadata( &mut self ) {
        let ( Some( index ), Some( track ) ) = ( self.state.current_index(), self.state.current_track() ) else {
            return;
        };
        let track = track.clone();

        match self.metadata.attempt( &track, self.adapter.video_data() ) {
            Extraction::Updated( metadata ) => {
                self.state.update_track_metadata( index, &metadata );

                let mut updated = track;
                updated.apply_metadata( &metadata );
                let store = Arc::clone( self.library.store() );
                tokio::task::spawn_blocking( move || {
                    if let Err( e ) = store.update_track( &updated ) {
                        tracing::warn!( "Failed to save metadata for {} (ignored): {}", updated.id, e );
                    }
                });
            }
            Extraction::Retry { delay } => {
                self.timers.schedule( TimerKind::Metadata, delay );
            }
            Extraction::GaveUp => {
                tracing::warn!( "Metadata unavailable for {}", track.video_id() );
            }
            Extraction::AlreadyExtracted | Extraction::Unchanged => {}
        }
    }


    // -- failures --------------------------------------------------------


    fn player_failed( &mut self, reason: String ) {
        tracing::error!( "Player failed: {}", reason );
        self.timers.cancel_all();
        self.state.set_ready( false );
        self.state.set_playing( false );
        self.state.set_error( Some( format!( "Player failed: {}", reason ) ) );
        self.notify( NoticeLevel::Error, format!( "Player failed: {}", reason ) );
    }


    fn command_failed( &mut self, e: PlayerError ) {
        tracing::error!( "Player command failed: {}", e );
        self.state.set_error( Some( "Failed to load the video.".into() ) );
        self.notify( NoticeLevel::Error, format!( "Player error: {}", e ) );
    }


    fn storage_failed( &mut self, action: &str, e: StoreError ) {
        tracing::warn!( "Failed to {}: {}", action, e );
        self.notify( NoticeLevel::Error, format!( "Failed to {}: {}", action, e ) );
    }


    fn no_such_track( &mut self, index: usize ) {
        self.notify( NoticeLevel::Warning, format!( "No track {}", index + 1 ) );
    }


    fn notify( &mut self, level: NoticeLevel, message: impl Into<String> ) {
        let _ = self.notices.send( Notice { level, message: message.into() } );
    }


    fn snapshot( &self ) -> Snapshot {
        Snapshot {
            tracks: self.state.tracks().to_vec(),
            current_index: self.state.current_index(),
            is_playing: self.state.is_playing(),
            is_shuffled: self.state.is_shuffled(),
            rate: self.state.rate(),
            is_player_ready: self.state.is_player_ready(),
            is_loading: self.state.is_loading(),
            error: self.state.error().map( String::from ),
            playlists: self.library.playlists().to_vec(),
            current_playlist_id: self.library.current_playlist_id().to_string(),
            halted: self.halted,
        }
    }


    fn publish( &self ) {
        self.snapshot_tx.send_replace( self.snapshot() );
    }
}


impl std::fmt::Debug for Coordinator {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "Coordinator" )
            .field( "state", &self.state )
            .field( "adapter", &self.adapter )
            .field( "error_count", &self.error_count )
            .field( "halted", &self.halted )
            .finish()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: CoordinatorConfig = serde_json::from_str( r#"{ "max_error_skips": 5 }"# ).unwrap();
        assert_eq!( config.max_error_skips, 5 );
        assert_eq!( config.buffering_timeout_ms, 20_000 );
        assert_eq!( config.metadata_retry_delay_ms, 1_500 );
    }


    #[test]
    fn test_snapshot_current_track() {
        let mut snapshot = Snapshot::default();
        assert!( snapshot.current_track().is_none() );

        snapshot.tracks = vec![ Track::new( "p", "u", "a" ), Track::new( "p", "u", "b" ) ];
        snapshot.current_index = Some( 1 );
        assert_eq!( snapshot.current_track().map( |t| t.video_id() ), Some( "b" ) );
    }
}
