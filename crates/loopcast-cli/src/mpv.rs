//! mpv player backend.
//!
//! One `mpv --idle` process is spawned per player and driven over its JSON
//! IPC socket. Player state is observation driven: on connect we send
//! `observe_property` for pause, paused-for-cache and media-title, and mpv
//! pushes a `property-change` event whenever one of them changes. Those and
//! the start-file / file-loaded / end-file events are mapped onto the
//! player state codes the coordinator understands.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{ Arc, Mutex };

use serde_json::{ json, Value };
use tokio::sync::{ mpsc, oneshot };

use loopcast_core::source::watch_url;
use loopcast_core::{
    ExternalPlayer, PlayerBackend, PlayerError, PlayerEventSink, PlayerState, RawPlayerEvent, VideoData,
};


const OBS_PAUSE: u64 = 1;
const OBS_PAUSED_FOR_CACHE: u64 = 2;
const OBS_MEDIA_TITLE: u64 = 3;

/// Error code reported when mpv could not open the item at all.
const ERROR_NOT_FOUND: i32 = 100;
/// Error code for any other playback failure.
const ERROR_PLAYER: i32 = 5;


/// Constructs mpv players.
pub struct MpvBackend {
    mpv_path: PathBuf,
    extra_args: Vec<String>,
    socket_path: PathBuf,
}


impl MpvBackend {
    pub fn new( mpv_path: PathBuf, extra_args: Vec<String> ) -> Self {
        let socket_path = std::env::temp_dir().join( format!( "loopcast-{}.sock", std::process::id() ) );
        Self { mpv_path, extra_args, socket_path }
    }
}


impl PlayerBackend for MpvBackend {
    /// Resolves once `mpv --version` succeeds. Checked once, never retried.
    fn library_ready( &mut self ) -> oneshot::Receiver<()> {
        let ( tx, rx ) = oneshot::channel();
        let path = self.mpv_path.clone();

        tokio::spawn( async move {
            let status = tokio::process::Command::new( &path )
                .arg( "--version" )
                .stdin( Stdio::null() )
                .stdout( Stdio::null() )
                .stderr( Stdio::null() )
                .status()
                .await;

            match status {
                Ok( status ) if status.success() => {
                    tracing::info!( "mpv available at {}", path.display() );
                    let _ = tx.send( () );
                }
                Ok( status ) => tracing::error!( "mpv --version exited with {}", status ),
                Err( e ) => tracing::error!( "Failed to run {}: {}", path.display(), e ),
            }
        });

        rx
    }


    fn create(
        &mut self,
        video_id: &str,
        autoplay: bool,
        events: PlayerEventSink,
    ) -> Result<Box<dyn ExternalPlayer>, PlayerError> {
        let _ = std::fs::remove_file( &self.socket_path );

        let child = tokio::process::Command::new( &self.mpv_path )
            .arg( "--idle=yes" )
            .arg( "--no-video" )
            .arg( "--no-terminal" )
            .arg( format!( "--input-ipc-server={}", self.socket_path.display() ) )
            .args( &self.extra_args )
            .stdin( Stdio::null() )
            .stdout( Stdio::null() )
            .stderr( Stdio::null() )
            .kill_on_drop( true )
            .spawn()
            .map_err( |e| PlayerError::Construction( format!( "failed to start mpv: {}", e ) ) )?;

        tracing::info!( "Spawned mpv (pid {:?}), socket {}", child.id(), self.socket_path.display() );

        let shared = Arc::new( Mutex::new( MpvState::default() ) );
        let ( commands, command_rx ) = mpsc::unbounded_channel();
        let mut player = MpvPlayer { commands, shared: shared.clone() };

        // Queued until the socket connects.
        if autoplay {
            player.load_video( video_id )?;
        } else {
            player.cue_video( video_id )?;
        }

        spawn_session( child, self.socket_path.clone(), command_rx, shared, events )?;
        Ok( Box::new( player ) )
    }
}


/// What we know about mpv from the events it pushed.
#[derive( Debug, Default )]
struct MpvState {
    state: Option<PlayerState>,
    video_id: Option<String>,
    title: Option<String>,
    paused: bool,
    /// A file is loaded and pause changes mean play/pause.
    loaded: bool,
}


impl MpvState {
    /// Records that an item was sent to mpv.
    fn begin_item( &mut self, video_id: &str, paused: bool ) {
        self.video_id = Some( video_id.to_string() );
        self.title = None;
        self.paused = paused;
        self.loaded = false;
    }


    /// Maps one IPC message to a player event, updating the known state.
    fn apply( &mut self, msg: &Value ) -> Option<RawPlayerEvent> {
        match msg.get( "event" ).and_then( Value::as_str )? {
            "property-change" => self.apply_property( msg ),
            "start-file" => {
                self.loaded = false;
                self.title = None;
                self.state_change( PlayerState::Unstarted )
            }
            "file-loaded" => {
                self.loaded = true;
                if self.paused {
                    self.state_change( PlayerState::Cued )
                } else {
                    self.state_change( PlayerState::Playing )
                }
            }
            "end-file" => {
                let reason = msg.get( "reason" ).and_then( Value::as_str ).unwrap_or( "unknown" );
                tracing::info!( "mpv: end-file reason={}", reason );
                match reason {
                    "eof" => {
                        self.loaded = false;
                        self.state_change( PlayerState::Ended )
                    }
                    "error" => {
                        let file_error = msg.get( "file_error" ).and_then( Value::as_str ).unwrap_or( "" );
                        tracing::warn!( "mpv: playback error: {}", file_error );
                        self.loaded = false;
                        let code = if self.state == Some( PlayerState::Unstarted ) {
                            ERROR_NOT_FOUND
                        } else {
                            ERROR_PLAYER
                        };
                        Some( RawPlayerEvent::Error( code ) )
                    }
                    // stop, quit and redirect follow our own commands
                    _ => None,
                }
            }
            _ => None,
        }
    }


    fn apply_property( &mut self, msg: &Value ) -> Option<RawPlayerEvent> {
        let data = msg.get( "data" );
        match msg.get( "name" ).and_then( Value::as_str )? {
            "pause" => {
                self.paused = data.and_then( Value::as_bool ).unwrap_or( false );
                if !self.loaded {
                    return None;
                }
                if self.paused {
                    self.state_change( PlayerState::Paused )
                } else {
                    self.state_change( PlayerState::Playing )
                }
            }
            "paused-for-cache" => {
                if !self.loaded {
                    return None;
                }
                if data.and_then( Value::as_bool ).unwrap_or( false ) {
                    self.state_change( PlayerState::Buffering )
                } else if !self.paused {
                    self.state_change( PlayerState::Playing )
                } else {
                    None
                }
            }
            "media-title" => {
                self.title = data.and_then( Value::as_str ).map( String::from );
                None
            }
            _ => None,
        }
    }


    fn state_change( &mut self, state: PlayerState ) -> Option<RawPlayerEvent> {
        if self.state == Some( state ) && state != PlayerState::Unstarted {
            return None;
        }
        self.state = Some( state );
        Some( RawPlayerEvent::StateChange( state.code() ) )
    }


    /// The loaded item's metadata, once mpv has a real title for it.
    fn video_data( &self ) -> Option<VideoData> {
        let video_id = self.video_id.as_ref()?;
        let title = self.title.as_deref().unwrap_or( "" );

        // Until the title is resolved mpv reports the file name or URL
        let resolved = !title.is_empty() && !title.contains( video_id.as_str() ) && !title.starts_with( "http" );

        Some( VideoData {
            video_id: video_id.clone(),
            title: if resolved { title.to_string() } else { String::new() },
        })
    }
}


/// A running mpv process.
struct MpvPlayer {
    commands: mpsc::UnboundedSender<Value>,
    shared: Arc<Mutex<MpvState>>,
}


impl MpvPlayer {
    fn send( &self, command: Value ) -> Result<(), PlayerError> {
        tracing::debug!( "mpv <- {}", command );
        self.commands.send( json!({ "command": command }) ).map_err( |_| PlayerError::Disconnected )
    }


    fn load( &mut self, video_id: &str, paused: bool ) -> Result<(), PlayerError> {
        self.shared.lock()
            .map_err( |_| PlayerError::Command( "player state lock poisoned".into() ) )?
            .begin_item( video_id, paused );
        self.send( json!([ "set_property", "pause", paused ]) )?;
        self.send( json!([ "loadfile", watch_url( video_id ), "replace" ]) )
    }
}


impl ExternalPlayer for MpvPlayer {
    fn load_video( &mut self, video_id: &str ) -> Result<(), PlayerError> {
        self.load( video_id, false )
    }


    fn cue_video( &mut self, video_id: &str ) -> Result<(), PlayerError> {
        self.load( video_id, true )
    }


    fn play( &mut self ) -> Result<(), PlayerError> {
        self.send( json!([ "set_property", "pause", false ]) )
    }


    fn pause( &mut self ) -> Result<(), PlayerError> {
        self.send( json!([ "set_property", "pause", true ]) )
    }


    fn set_playback_rate( &mut self, rate: f64 ) -> Result<(), PlayerError> {
        self.send( json!([ "set_property", "speed", rate ]) )
    }


    fn state( &self ) -> Option<PlayerState> {
        self.shared.lock().ok().and_then( |s| s.state )
    }


    fn video_data( &self ) -> Option<VideoData> {
        self.shared.lock().ok().and_then( |s| s.video_data() )
    }
}


#[cfg( unix )]
fn spawn_session(
    child: tokio::process::Child,
    socket_path: PathBuf,
    commands: mpsc::UnboundedReceiver<Value>,
    shared: Arc<Mutex<MpvState>>,
    events: PlayerEventSink,
) -> Result<(), PlayerError> {
    tokio::spawn( session::run( child, socket_path, commands, shared, events ) );
    Ok(())
}


#[cfg( not( unix ) )]
fn spawn_session(
    _child: tokio::process::Child,
    _socket_path: PathBuf,
    _commands: mpsc::UnboundedReceiver<Value>,
    _shared: Arc<Mutex<MpvState>>,
    _events: PlayerEventSink,
) -> Result<(), PlayerError> {
    Err( PlayerError::Construction( "mpv IPC needs a Unix socket".into() ) )
}


#[cfg( unix )]
mod session {
    use std::io;
    use std::path::{ Path, PathBuf };
    use std::sync::{ Arc, Mutex };
    use std::time::Duration;

    use serde_json::{ json, Value };
    use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };
    use tokio::net::UnixStream;
    use tokio::sync::mpsc;

    use loopcast_core::{ PlayerEventSink, RawPlayerEvent };

    use super::{ MpvState, OBS_MEDIA_TITLE, OBS_PAUSE, OBS_PAUSED_FOR_CACHE };


    const CONNECT_ATTEMPTS: u32 = 50;
    const CONNECT_INTERVAL: Duration = Duration::from_millis( 100 );


    /// Connects to the IPC socket, waiting for mpv to create it.
    async fn connect( path: &Path ) -> io::Result<UnixStream> {
        let mut last_error = io::Error::new( io::ErrorKind::NotFound, "socket never appeared" );
        for _ in 0..CONNECT_ATTEMPTS {
            match UnixStream::connect( path ).await {
                Ok( stream ) => return Ok( stream ),
                Err( e ) => last_error = e,
            }
            tokio::time::sleep( CONNECT_INTERVAL ).await;
        }
        Err( last_error )
    }


    /// Owns the mpv process and its socket until either goes away.
    pub( super ) async fn run(
        mut child: tokio::process::Child,
        socket_path: PathBuf,
        mut commands: mpsc::UnboundedReceiver<Value>,
        shared: Arc<Mutex<MpvState>>,
        events: PlayerEventSink,
    ) {
        let stream = tokio::select! {
            stream = connect( &socket_path ) => stream,
            status = child.wait() => {
                let reason = match status {
                    Ok( status ) => format!( "mpv exited during startup ({})", status ),
                    Err( e ) => format!( "mpv exited during startup: {}", e ),
                };
                events.emit( RawPlayerEvent::Crashed( reason ) );
                return;
            }
        };

        let stream = match stream {
            Ok( stream ) => stream,
            Err( e ) => {
                events.emit( RawPlayerEvent::Crashed( format!( "could not connect to mpv: {}", e ) ) );
                return;
            }
        };

        tracing::info!( "Connected to mpv at {}", socket_path.display() );
        let ( read_half, mut write_half ) = stream.into_split();
        let mut lines = BufReader::new( read_half ).lines();

        let observe = [
            ( OBS_PAUSE, "pause" ),
            ( OBS_PAUSED_FOR_CACHE, "paused-for-cache" ),
            ( OBS_MEDIA_TITLE, "media-title" ),
        ];
        for ( id, name ) in observe {
            let msg = json!({ "command": [ "observe_property", id, name ] });
            if let Err( e ) = write_line( &mut write_half, &msg ).await {
                events.emit( RawPlayerEvent::Crashed( format!( "mpv socket write failed: {}", e ) ) );
                return;
            }
        }

        if !events.emit( RawPlayerEvent::Ready ) {
            return;
        }

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some( command ) = command else {
                        tracing::debug!( "Player dropped, stopping mpv" );
                        let _ = write_line( &mut write_half, &json!({ "command": [ "quit" ] }) ).await;
                        break;
                    };
                    if let Err( e ) = write_line( &mut write_half, &command ).await {
                        events.emit( RawPlayerEvent::Crashed( format!( "mpv socket write failed: {}", e ) ) );
                        break;
                    }
                }
                line = lines.next_line() => {
                    let line = match line {
                        Ok( Some( line ) ) => line,
                        Ok( None ) => {
                            events.emit( RawPlayerEvent::Crashed( "mpv closed the IPC connection".into() ) );
                            break;
                        }
                        Err( e ) => {
                            events.emit( RawPlayerEvent::Crashed( format!( "mpv socket read failed: {}", e ) ) );
                            break;
                        }
                    };

                    let msg: Value = match serde_json::from_str( &line ) {
                        Ok( msg ) => msg,
                        Err( e ) => {
                            tracing::warn!( "Unparseable mpv message {:?}: {}", line, e );
                            continue;
                        }
                    };

                    if let Some( error ) = msg.get( "error" ).and_then( Value::as_str ) {
                        if error != "success" {
                            tracing::warn!( "mpv command failed: {}", error );
                        }
                        continue;
                    }

                    let event = match shared.lock() {
                        Ok( mut state ) => state.apply( &msg ),
                        Err( _ ) => {
                            events.emit( RawPlayerEvent::Crashed( "player state lock poisoned".into() ) );
                            break;
                        }
                    };
                    if let Some( event ) = event {
                        if !events.emit( event ) {
                            break;
                        }
                    }
                }
                status = child.wait() => {
                    let reason = match status {
                        Ok( status ) => format!( "mpv exited ({})", status ),
                        Err( e ) => format!( "mpv exited: {}", e ),
                    };
                    events.emit( RawPlayerEvent::Crashed( reason ) );
                    break;
                }
            }
        }

        let _ = std::fs::remove_file( &socket_path );
    }


    async fn write_line( writer: &mut tokio::net::unix::OwnedWriteHalf, msg: &Value ) -> io::Result<()> {
        let mut line = msg.to_string();
        line.push( '\n' );
        writer.write_all( line.as_bytes() ).await
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn event( name: &str ) -> Value {
        json!({ "event": name })
    }


    fn property( name: &str, data: Value ) -> Value {
        json!({ "event": "property-change", "name": name, "data": data })
    }


    fn code( state: PlayerState ) -> Option<RawPlayerEvent> {
        Some( RawPlayerEvent::StateChange( state.code() ) )
    }


    #[test]
    fn test_autoplay_sequence() {
        let mut mpv = MpvState::default();
        mpv.begin_item( "dQw4w9WgXcQ", false );

        assert_eq!( mpv.apply( &property( "pause", json!( false ) ) ), None );
        assert_eq!( mpv.apply( &event( "start-file" ) ), code( PlayerState::Unstarted ) );
        assert_eq!( mpv.apply( &event( "file-loaded" ) ), code( PlayerState::Playing ) );
        assert_eq!( mpv.apply( &property( "paused-for-cache", json!( true ) ) ), code( PlayerState::Buffering ) );
        assert_eq!( mpv.apply( &property( "paused-for-cache", json!( false ) ) ), code( PlayerState::Playing ) );
        assert_eq!(
            mpv.apply( &json!({ "event": "end-file", "reason": "eof" }) ),
            code( PlayerState::Ended )
        );
    }


    #[test]
    fn test_cue_then_play() {
        let mut mpv = MpvState::default();
        mpv.begin_item( "dQw4w9WgXcQ", true );

        mpv.apply( &event( "start-file" ) );
        assert_eq!( mpv.apply( &event( "file-loaded" ) ), code( PlayerState::Cued ) );
        assert_eq!( mpv.apply( &property( "pause", json!( false ) ) ), code( PlayerState::Playing ) );
        assert_eq!( mpv.apply( &property( "pause", json!( true ) ) ), code( PlayerState::Paused ) );
        assert_eq!( mpv.state, Some( PlayerState::Paused ) );
    }


    #[test]
    fn test_load_failure_is_not_found() {
        let mut mpv = MpvState::default();
        mpv.begin_item( "aaaaaaaaaaa", false );
        mpv.apply( &event( "start-file" ) );

        let failed = json!({ "event": "end-file", "reason": "error", "file_error": "loading failed" });
        assert_eq!( mpv.apply( &failed ), Some( RawPlayerEvent::Error( ERROR_NOT_FOUND ) ) );
    }


    #[test]
    fn test_error_mid_playback_is_player_fault() {
        let mut mpv = MpvState::default();
        mpv.begin_item( "aaaaaaaaaaa", false );
        mpv.apply( &event( "start-file" ) );
        mpv.apply( &event( "file-loaded" ) );

        let failed = json!({ "event": "end-file", "reason": "error" });
        assert_eq!( mpv.apply( &failed ), Some( RawPlayerEvent::Error( ERROR_PLAYER ) ) );
    }


    #[test]
    fn test_replacing_item_is_silent() {
        let mut mpv = MpvState::default();
        mpv.begin_item( "aaaaaaaaaaa", false );
        assert_eq!( mpv.apply( &json!({ "event": "end-file", "reason": "stop" }) ), None );
    }


    #[test]
    fn test_title_resolution() {
        let mut mpv = MpvState::default();
        mpv.begin_item( "dQw4w9WgXcQ", false );

        mpv.apply( &property( "media-title", json!( "watch?v=dQw4w9WgXcQ" ) ) );
        assert_eq!( mpv.video_data().unwrap().title, "" );

        mpv.apply( &property( "media-title", json!( "Never Gonna Give You Up" ) ) );
        let data = mpv.video_data().unwrap();
        assert_eq!( data.video_id, "dQw4w9WgXcQ" );
        assert_eq!( data.title, "Never Gonna Give You Up" );

        mpv.begin_item( "aaaaaaaaaaa", false );
        assert_eq!( mpv.video_data().unwrap().title, "" );
    }
}
