//! End-to-end coordinator behaviour against a recording fake player.

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use tokio::sync::{ mpsc, oneshot };

use loopcast_core::source::watch_url;
use loopcast_core::{
    Command, Coordinator, CoordinatorConfig, CoordinatorHandle, ExternalPlayer, Input, JsonStore,
    Notice, NoticeLevel, PlaybackRate, PlayerBackend, PlayerError, PlayerEventSink, PlayerState,
    PlaylistInfo, RawPlayerEvent, StoreError, Track, TrackStore, VideoData,
};


const IDS: [&str; 5] = [ "aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc", "ddddddddddd", "eeeeeeeeeee" ];


#[derive( Debug, Clone, PartialEq )]
enum Call {
    Load( String ),
    Cue( String ),
    Play,
    Pause,
    Rate( f64 ),
}


#[derive( Default )]
struct Recorder {
    calls: Vec<Call>,
    state: Option<PlayerState>,
    video: Option<VideoData>,
    creates: u32,
}


type Shared = Arc<Mutex<Recorder>>;


struct FakePlayer( Shared );


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
        let mut rec = self.0.lock().unwrap();
        rec.calls.push( Call::Play );
        rec.state = Some( PlayerState::Playing );
        Ok(())
    }

    fn pause( &mut self ) -> Result<(), PlayerError> {
        let mut rec = self.0.lock().unwrap();
        rec.calls.push( Call::Pause );
        rec.state = Some( PlayerState::Paused );
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
        self.0.lock().unwrap().video.clone()
    }
}


struct FakeBackend {
    shared: Shared,
    library_available: bool,
}


impl PlayerBackend for FakeBackend {
    fn library_ready( &mut self ) -> oneshot::Receiver<()> {
        let ( tx, rx ) = oneshot::channel();
        if self.library_available {
            let _ = tx.send( () );
        }
        rx
    }

    fn create(
        &mut self,
        _video_id: &str,
        _autoplay: bool,
        _events: PlayerEventSink,
    ) -> Result<Box<dyn ExternalPlayer>, PlayerError> {
        self.shared.lock().unwrap().creates += 1;
        Ok( Box::new( FakePlayer( Arc::clone( &self.shared ) ) ) )
    }
}


/// Store whose track writes can be switched off.
struct FlakyStore {
    inner: JsonStore,
    fail_writes: AtomicBool,
}


impl FlakyStore {
    fn check( &self ) -> Result<(), StoreError> {
        if self.fail_writes.load( Ordering::SeqCst ) {
            Err( StoreError::Io( std::io::Error::new( std::io::ErrorKind::Other, "disk full" ) ) )
        } else {
            Ok(())
        }
    }
}


impl TrackStore for FlakyStore {
    fn add_track( &self, track: &Track ) -> Result<(), StoreError> {
        self.check()?;
        self.inner.add_track( track )
    }

    fn delete_track( &self, track_id: &str ) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete_track( track_id )
    }

    fn update_track( &self, track: &Track ) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update_track( track )
    }

    fn tracks_by_playlist( &self, playlist_id: &str ) -> Result<Vec<Track>, StoreError> {
        self.inner.tracks_by_playlist( playlist_id )
    }

    fn playlists( &self ) -> Result<Vec<PlaylistInfo>, StoreError> {
        self.inner.playlists()
    }

    fn create_playlist( &self, playlist: &PlaylistInfo ) -> Result<(), StoreError> {
        self.inner.create_playlist( playlist )
    }

    fn update_playlist( &self, playlist: &PlaylistInfo ) -> Result<(), StoreError> {
        self.inner.update_playlist( playlist )
    }

    fn delete_playlist( &self, playlist_id: &str ) -> Result<(), StoreError> {
        self.inner.delete_playlist( playlist_id )
    }

    fn current_playlist_id( &self ) -> Result<String, StoreError> {
        self.inner.current_playlist_id()
    }

    fn set_current_playlist_id( &self, playlist_id: &str ) -> Result<(), StoreError> {
        self.inner.set_current_playlist_id( playlist_id )
    }
}


struct Harness {
    coordinator: Coordinator,
    handle: CoordinatorHandle,
    notices: mpsc::UnboundedReceiver<Notice>,
    player: Shared,
}


fn seeded_store( count: usize ) -> JsonStore {
    let store = JsonStore::in_memory();
    for id in IDS.iter().take( count ) {
        store.add_track( &Track::new( "default", watch_url( id ), *id ) ).unwrap();
    }
    store
}


fn harness_with( store: Arc<dyn TrackStore>, library_available: bool ) -> Harness {
    let player = Shared::default();
    let backend = FakeBackend { shared: Arc::clone( &player ), library_available };
    let ( coordinator, handle, notices ) =
        Coordinator::with_seed( Box::new( backend ), store, CoordinatorConfig::default(), 42 ).unwrap();
    Harness { coordinator, handle, notices, player }
}


fn harness( count: usize ) -> Harness {
    harness_with( Arc::new( seeded_store( count ) ), true )
}


impl Harness {
    fn send( &mut self, command: Command ) {
        assert!( self.coordinator.handle( Input::Command( command ) ) );
    }


    /// Reports a player state, as the real player would.
    fn emit( &mut self, state: PlayerState ) {
        self.player.lock().unwrap().state = Some( state );
        self.coordinator.handle( Input::Player( RawPlayerEvent::StateChange( state.code() ) ) );
    }


    fn error( &mut self, code: i32 ) {
        self.coordinator.handle( Input::Player( RawPlayerEvent::Error( code ) ) );
    }


    /// Library ready, player created and ready. Clears the recorded calls.
    fn bring_up( &mut self ) {
        self.coordinator.handle( Input::LibraryReady );
        self.coordinator.handle( Input::Player( RawPlayerEvent::Ready ) );
        self.player.lock().unwrap().calls.clear();
    }


    fn calls( &self ) -> Vec<Call> {
        self.player.lock().unwrap().calls.clone()
    }


    fn current_video( &self ) -> Option<String> {
        self.coordinator.state().current_track().map( |t| t.video_id().to_string() )
    }


    async fn wait( &mut self, millis: u64 ) {
        tokio::time::sleep( Duration::from_millis( millis ) ).await;
        tokio::task::yield_now().await;
        self.coordinator.drain();
    }


    fn drain_notices( &mut self ) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok( notice ) = self.notices.try_recv() {
            out.push( notice );
        }
        out
    }
}


#[tokio::test( start_paused = true )]
async fn player_created_once_and_cues_first_track() {
    let mut h = harness( 3 );
    assert_eq!( h.player.lock().unwrap().creates, 0 );

    h.coordinator.handle( Input::LibraryReady );
    assert_eq!( h.player.lock().unwrap().creates, 1 );
    assert_eq!( h.coordinator.adapter().loaded_item(), Some( IDS[ 0 ] ) );
    assert!( h.coordinator.state().is_loading() );

    h.coordinator.handle( Input::Player( RawPlayerEvent::Ready ) );
    h.send( Command::Next );
    h.send( Command::Next );

    assert_eq!( h.player.lock().unwrap().creates, 1 );
    assert_eq!( h.calls(), vec![
        Call::Rate( 1.0 ),
        Call::Cue( IDS[ 1 ].into() ),
        Call::Cue( IDS[ 2 ].into() ),
    ]);
}


#[tokio::test( start_paused = true )]
async fn ended_advances_and_deleting_current_moves_to_next_slot() {
    let mut h = harness( 3 );
    h.bring_up();

    h.send( Command::Play { index: Some( 0 ) } );
    h.emit( PlayerState::Playing );
    h.emit( PlayerState::Ended );

    assert_eq!( h.coordinator.state().current_index(), Some( 1 ) );
    assert_eq!( h.current_video().as_deref(), Some( IDS[ 1 ] ) );

    h.send( Command::Remove { index: 1 } );

    let state = h.coordinator.state();
    assert_eq!( state.current_index(), Some( 1 ) );
    assert_eq!( h.current_video().as_deref(), Some( IDS[ 2 ] ) );
    assert!( state.is_playing() );

    assert_eq!( h.calls(), vec![
        Call::Play,
        Call::Load( IDS[ 1 ].into() ),
        Call::Load( IDS[ 2 ].into() ),
    ]);
}


#[tokio::test( start_paused = true )]
async fn adding_tracks_does_not_interrupt_playback() {
    let mut h = harness( 2 );
    h.bring_up();
    h.send( Command::Play { index: Some( 1 ) } );
    h.emit( PlayerState::Playing );
    let before = h.calls();

    h.send( Command::Add { urls: vec![ format!( "https://youtu.be/{}", IDS[ 4 ] ) ] } );

    assert_eq!( h.coordinator.state().len(), 3 );
    assert_eq!( h.current_video().as_deref(), Some( IDS[ 1 ] ) );
    assert!( h.coordinator.state().is_playing() );
    assert_eq!( h.calls(), before );
}


#[tokio::test( start_paused = true )]
async fn shuffle_cycle_returns_to_start() {
    let mut h = harness( 5 );
    h.bring_up();
    h.send( Command::Play { index: Some( 2 ) } );
    h.send( Command::Shuffle );

    let order = h.coordinator.state().shuffle_order().unwrap().to_vec();
    assert!( order.contains( &2 ) );
    assert_eq!( order[ 0 ], 2 );

    let mut visited = Vec::new();
    for _ in 0..5 {
        h.send( Command::Next );
        visited.push( h.coordinator.state().current_index().unwrap() );
    }

    assert_eq!( visited.last(), Some( &2 ) );
    visited.sort_unstable();
    assert_eq!( visited, vec![ 0, 1, 2, 3, 4 ] );

    h.send( Command::Shuffle );
    assert_eq!( h.coordinator.state().current_index(), Some( 2 ) );
    h.send( Command::Next );
    assert_eq!( h.coordinator.state().current_index(), Some( 3 ) );
}


#[tokio::test( start_paused = true )]
async fn errors_skip_three_times_then_halt() {
    let mut h = harness( 5 );
    h.bring_up();
    h.send( Command::Play { index: Some( 0 ) } );

    for expected in 1..=3 {
        h.error( 101 );
        assert_eq!( h.coordinator.error_count(), expected as u32 );
        h.wait( 2_100 ).await;
        assert_eq!( h.coordinator.state().current_index(), Some( expected ) );
    }

    h.error( 101 );
    assert!( h.coordinator.is_halted() );
    assert!( !h.coordinator.state().is_player_ready() );

    h.wait( 10_000 ).await;
    assert_eq!( h.coordinator.state().current_index(), Some( 3 ) );
    assert!( h.coordinator.state().is_playing() );
    assert_eq!(
        h.coordinator.state().error(),
        Some( "The video owner does not allow playback here." )
    );

    let notices = h.drain_notices();
    assert!( notices.iter().any( |n| n.level == NoticeLevel::Error && n.message.contains( "repeated errors" ) ) );

    // explicit user action re-arms the player
    h.player.lock().unwrap().calls.clear();
    h.send( Command::Next );
    assert!( !h.coordinator.is_halted() );
    assert!( h.coordinator.state().is_player_ready() );
    assert_eq!( h.calls(), vec![ Call::Rate( 1.0 ), Call::Load( IDS[ 4 ].into() ) ] );
}


/// Plays from the first track and runs the error budget out.
async fn halt_after_errors( h: &mut Harness ) {
    h.bring_up();
    h.send( Command::Play { index: Some( 0 ) } );
    for _ in 0..3 {
        h.error( 101 );
        h.wait( 2_100 ).await;
    }
    h.error( 101 );
    assert!( h.coordinator.is_halted() );
    assert_eq!( h.coordinator.state().current_index(), Some( 3 ) );
    h.drain_notices();
    h.player.lock().unwrap().calls.clear();
}


#[tokio::test( start_paused = true )]
async fn error_after_halt_does_not_advance() {
    let mut h = harness( 5 );
    halt_after_errors( &mut h ).await;

    h.error( 150 );
    h.wait( 2_100 ).await;
    h.error( 2 );
    h.wait( 10_000 ).await;

    assert!( h.coordinator.is_halted() );
    assert_eq!( h.coordinator.state().current_index(), Some( 3 ) );
    assert_eq!( h.coordinator.error_count(), 0 );
    assert_eq!( h.coordinator.state().error(), Some( "Invalid video id." ) );
    assert!( h.calls().is_empty() );

    let errors = h.drain_notices().into_iter().filter( |n| n.level == NoticeLevel::Error ).count();
    assert_eq!( errors, 2 );
}


#[tokio::test( start_paused = true )]
async fn out_of_range_play_keeps_halt() {
    let mut h = harness( 5 );
    halt_after_errors( &mut h ).await;

    h.send( Command::Play { index: Some( 99 ) } );

    assert!( h.coordinator.is_halted() );
    assert!( !h.coordinator.state().is_player_ready() );
    assert_eq!( h.coordinator.state().current_index(), Some( 3 ) );
    assert!( h.calls().is_empty() );
    assert!( h.drain_notices().iter().any( |n| n.message == "No track 100" ) );

    // a valid position still resumes
    h.send( Command::Play { index: Some( 1 ) } );
    assert!( !h.coordinator.is_halted() );
    assert_eq!( h.calls().last(), Some( &Call::Load( IDS[ 1 ].into() ) ) );
}


#[tokio::test( start_paused = true )]
async fn playing_resets_error_budget() {
    let mut h = harness( 5 );
    h.bring_up();
    h.send( Command::Play { index: Some( 0 ) } );

    h.error( 100 );
    h.wait( 2_100 ).await;
    h.error( 100 );
    h.wait( 2_100 ).await;
    assert_eq!( h.coordinator.error_count(), 2 );

    h.emit( PlayerState::Playing );
    assert_eq!( h.coordinator.error_count(), 0 );
    assert_eq!( h.coordinator.state().error(), None );
}


#[tokio::test( start_paused = true )]
async fn user_navigation_cancels_pending_error_skip() {
    let mut h = harness( 4 );
    h.bring_up();
    h.send( Command::Play { index: Some( 0 ) } );

    h.error( 5 );
    h.send( Command::Next );
    assert_eq!( h.coordinator.state().current_index(), Some( 1 ) );

    h.wait( 5_000 ).await;
    assert_eq!( h.coordinator.state().current_index(), Some( 1 ) );
}


#[tokio::test( start_paused = true )]
async fn redundant_commands_are_suppressed() {
    let mut h = harness( 3 );
    h.bring_up();

    h.send( Command::Play { index: Some( 0 ) } );
    h.emit( PlayerState::Playing );
    h.send( Command::Play { index: None } );
    h.send( Command::Play { index: Some( 0 ) } );
    h.send( Command::Rate { rate: PlaybackRate::NORMAL } );
    h.send( Command::Add { urls: vec![ "not-a-link".into() ] } );
    assert_eq!( h.calls(), vec![ Call::Play ] );

    h.send( Command::Pause );
    h.send( Command::Pause );
    assert_eq!( h.calls(), vec![ Call::Play, Call::Pause ] );
}


#[tokio::test( start_paused = true )]
async fn stall_warns_without_skipping() {
    let mut h = harness( 3 );
    h.bring_up();
    h.send( Command::Play { index: Some( 0 ) } );

    h.emit( PlayerState::Buffering );
    assert!( h.coordinator.state().is_loading() );

    h.wait( 20_500 ).await;
    assert_eq!( h.coordinator.state().current_index(), Some( 0 ) );
    assert!( h.coordinator.state().is_playing() );
    assert_eq!( h.coordinator.state().error(), Some( "Video loading is taking longer than expected." ) );
    assert!( h.drain_notices().iter().any( |n| n.level == NoticeLevel::Warning ) );
}


#[tokio::test( start_paused = true )]
async fn resolved_buffering_cancels_watchdog() {
    let mut h = harness( 3 );
    h.bring_up();
    h.send( Command::Play { index: Some( 0 ) } );

    h.emit( PlayerState::Buffering );
    h.wait( 5_000 ).await;
    h.emit( PlayerState::Playing );
    h.wait( 30_000 ).await;

    assert_eq!( h.coordinator.state().error(), None );
    assert!( !h.coordinator.state().is_loading() );
}


#[tokio::test( start_paused = true )]
async fn cued_while_playing_starts_playback() {
    let mut h = harness( 3 );
    h.bring_up();
    h.send( Command::Play { index: Some( 0 ) } );
    h.player.lock().unwrap().calls.clear();

    h.emit( PlayerState::Cued );
    assert!( h.calls().is_empty() );

    h.wait( 150 ).await;
    assert_eq!( h.calls(), vec![ Call::Play ] );
}


#[tokio::test( start_paused = true )]
async fn metadata_retries_then_patches_track() {
    let store = Arc::new( seeded_store( 2 ) );
    let mut h = harness_with( store.clone(), true );
    h.bring_up();

    // first attempt after 1s finds nothing
    h.wait( 1_100 ).await;
    assert!( h.coordinator.state().tracks()[ 0 ].title.starts_with( "Track " ) );

    h.player.lock().unwrap().video = Some( VideoData { video_id: IDS[ 0 ].into(), title: "First Song".into() } );
    h.wait( 1_600 ).await;

    let track = &h.coordinator.state().tracks()[ 0 ];
    assert_eq!( track.title, "First Song" );
    assert_eq!(
        track.artwork.as_deref(),
        Some( "https://img.youtube.com/vi/aaaaaaaaaaa/maxresdefault.jpg" )
    );

    // persistence happens off the coordinator; give it a moment
    let mut persisted = false;
    for _ in 0..200 {
        if store.tracks_by_playlist( "default" ).unwrap()[ 0 ].title == "First Song" {
            persisted = true;
            break;
        }
        std::thread::sleep( Duration::from_millis( 5 ) );
        tokio::task::yield_now().await;
    }
    assert!( persisted );
}


#[tokio::test( start_paused = true )]
async fn metadata_gives_up_silently() {
    let mut h = harness( 1 );
    h.bring_up();
    h.drain_notices();

    // every attempt schedules the next one, so step through all of them
    for _ in 0..6 {
        h.wait( 5_000 ).await;
    }
    assert!( h.coordinator.state().tracks()[ 0 ].title.starts_with( "Track " ) );
    assert!( h.drain_notices().is_empty() );
}


#[tokio::test( start_paused = true )]
async fn rate_is_applied_once_ready() {
    let mut h = harness( 2 );
    h.coordinator.handle( Input::LibraryReady );
    h.send( Command::Rate { rate: PlaybackRate::new( 1.5 ).unwrap() } );
    assert!( h.calls().is_empty() );

    h.coordinator.handle( Input::Player( RawPlayerEvent::Ready ) );
    assert_eq!( h.calls(), vec![ Call::Rate( 1.5 ) ] );
}


#[tokio::test( start_paused = true )]
async fn crash_is_fatal_and_never_reconstructs() {
    let mut h = harness( 3 );
    h.bring_up();
    h.send( Command::Play { index: Some( 0 ) } );

    h.coordinator.handle( Input::Player( RawPlayerEvent::Crashed( "mpv exited".into() ) ) );
    assert!( !h.coordinator.state().is_playing() );
    assert!( !h.coordinator.state().is_player_ready() );
    assert!( h.coordinator.state().error().unwrap().contains( "mpv exited" ) );

    h.send( Command::Next );
    h.send( Command::Play { index: None } );
    assert_eq!( h.player.lock().unwrap().creates, 1 );
}


#[tokio::test( start_paused = true )]
async fn unavailable_library_leaves_player_unready() {
    let mut h = harness_with( Arc::new( seeded_store( 2 ) ), false );
    h.coordinator.start();
    h.wait( 10 ).await;

    assert_eq!( h.player.lock().unwrap().creates, 0 );
    assert!( !h.coordinator.state().is_player_ready() );
    assert!( h.coordinator.state().error().is_some() );
}


#[tokio::test( start_paused = true )]
async fn failed_metadata_write_is_swallowed() {
    let store = Arc::new( FlakyStore { inner: seeded_store( 2 ), fail_writes: AtomicBool::new( false ) } );
    let mut h = harness_with( store.clone(), true );
    h.bring_up();
    h.send( Command::Play { index: Some( 0 ) } );
    h.drain_notices();

    store.fail_writes.store( true, Ordering::SeqCst );
    h.player.lock().unwrap().video = Some( VideoData { video_id: IDS[ 0 ].into(), title: "First Song".into() } );
    h.wait( 1_100 ).await;

    assert_eq!( h.coordinator.state().tracks()[ 0 ].title, "First Song" );
    assert_eq!( h.coordinator.state().current_index(), Some( 0 ) );
    assert!( h.coordinator.state().is_playing() );

    // let the background write run and fail
    for _ in 0..20 {
        std::thread::sleep( Duration::from_millis( 5 ) );
        tokio::task::yield_now().await;
    }
    assert!( store.tracks_by_playlist( "default" ).unwrap()[ 0 ].title.starts_with( "Track " ) );
    assert!( h.drain_notices().iter().all( |n| n.level != NoticeLevel::Error ) );

    // already extracted: a later title from the player is not picked up
    h.player.lock().unwrap().video = Some( VideoData { video_id: IDS[ 0 ].into(), title: "Renamed".into() } );
    h.emit( PlayerState::Playing );
    h.wait( 10_000 ).await;
    assert_eq!( h.coordinator.state().tracks()[ 0 ].title, "First Song" );
    assert_eq!( h.coordinator.state().current_index(), Some( 0 ) );
}


#[tokio::test( start_paused = true )]
async fn storage_failure_leaves_playback_untouched() {
    let store = Arc::new( FlakyStore { inner: seeded_store( 3 ), fail_writes: AtomicBool::new( false ) } );
    let mut h = harness_with( store.clone(), true );
    h.bring_up();
    h.send( Command::Play { index: Some( 1 ) } );

    store.fail_writes.store( true, Ordering::SeqCst );
    h.send( Command::Remove { index: 1 } );
    h.send( Command::Add { urls: vec![ IDS[ 4 ].into() ] } );

    assert_eq!( h.coordinator.state().len(), 3 );
    assert_eq!( h.coordinator.state().current_index(), Some( 1 ) );
    assert!( h.coordinator.state().is_playing() );

    let errors: Vec<_> = h.drain_notices().into_iter().filter( |n| n.level == NoticeLevel::Error ).collect();
    assert_eq!( errors.len(), 2 );
}


#[tokio::test( start_paused = true )]
async fn playlist_switch_reconciles_tracks() {
    let mut h = harness( 3 );
    h.bring_up();
    h.send( Command::Play { index: Some( 2 ) } );

    h.send( Command::New { name: "Empty".into() } );
    assert!( h.coordinator.state().is_empty() );
    assert_eq!( h.coordinator.state().current_index(), None );

    h.send( Command::Add { urls: vec![ IDS[ 3 ].into() ] } );
    assert_eq!( h.coordinator.state().current_index(), Some( 0 ) );
    assert_eq!( h.current_video().as_deref(), Some( IDS[ 3 ] ) );
    assert_eq!( h.calls().last(), Some( &Call::Load( IDS[ 3 ].into() ) ) );

    let snapshot = h.handle.snapshot();
    assert_eq!( snapshot.playlists.len(), 2 );
    assert_eq!( snapshot.current_playlist().map( |p| p.name.as_str() ), Some( "Empty" ) );
}


#[tokio::test( start_paused = true )]
async fn run_loop_serves_handle_until_shutdown() {
    let Harness { coordinator, handle, .. } = harness( 0 );
    let mut snapshots = handle.subscribe();

    let client = async {
        handle.send( Command::Add { urls: vec![ IDS[ 0 ].into() ] } );
        loop {
            snapshots.changed().await.unwrap();
            if snapshots.borrow().tracks.len() == 1 {
                break;
            }
        }
        handle.shutdown();
    };

    tokio::join!( coordinator.run(), client );

    let snapshot = handle.snapshot();
    assert_eq!( snapshot.current_index, Some( 0 ) );
    assert!( !handle.send( Command::Next ) );
}
