//! Loopcast CLI - Loop playlists of video links through mpv

mod cli;
mod mpv;
mod settings;
mod view;

use std::fs::{ self, OpenOptions };
use std::path::PathBuf;
use std::sync::{ Arc, Mutex };

use anyhow::{ Context, Result };
use clap::Parser;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::{ mpsc, watch };

use cli::Args;
use mpv::MpvBackend;
use settings::Settings;

use loopcast_core::{
    command::help_text,
    Command, Coordinator, CoordinatorHandle, JsonStore, Notice, Snapshot,
};


/// Directory holding the library and the log file.
fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map( |p| p.join( "loopcast" ) )
}


/// Logs to a file so output never interleaves with the prompt.
fn setup_logging( verbose: bool ) -> Result<PathBuf> {
    let dir = data_dir().context( "no data directory on this system" )?;
    fs::create_dir_all( &dir )?;
    let path = dir.join( "loopcast.log" );
    let file = OpenOptions::new().create( true ).append( true ).open( &path )?;

    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_writer( Mutex::new( file ) )
        .with_ansi( false )
        .with_target( true )
        .with_max_level( level )
        .init();

    Ok( path )
}


fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging before anything else
    match setup_logging( args.verbose ) {
        Ok( path ) => tracing::info!( "Starting loopcast, logging to {}", path.display() ),
        Err( e ) => eprintln!( "warning: logging disabled: {}", e ),
    }

    let settings = Settings::load( args.config.as_deref() );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on( run( args, settings ) );

    // stdin reads sit on a blocking thread that may never return
    runtime.shutdown_background();
    result
}


async fn run( args: Args, mut settings: Settings ) -> Result<()> {
    let library_path = match args.library {
        Some( path ) => path,
        None => data_dir().context( "no data directory on this system" )?.join( "library.json" ),
    };
    let store = JsonStore::open( &library_path )
        .with_context( || format!( "failed to open library {}", library_path.display() ) )?;
    tracing::info!( "Library: {}", library_path.display() );

    let mpv_path = args.mpv.clone().unwrap_or_else( || settings.mpv_path.clone() );
    let backend = MpvBackend::new( mpv_path, settings.mpv_args.clone() );

    let ( mut coordinator, handle, notices ) =
        Coordinator::new( Box::new( backend ), Arc::new( store ), settings.coordinator.clone() )?;
    coordinator.apply_preferences( settings.shuffle, settings.playback_rate );

    if !args.urls.is_empty() {
        let first_new = handle.snapshot().tracks.len();
        handle.send( Command::Add { urls: args.urls } );
        handle.send( Command::Play { index: Some( first_new ) } );
    }

    println!( "loopcast {} - type /help for commands", env!( "CARGO_PKG_VERSION" ) );
    println!( "{}", view::render_tracks( &handle.snapshot() ) );

    tokio::spawn( print_notices( notices ) );
    tokio::spawn( announce_tracks( handle.subscribe() ) );
    tokio::spawn( read_commands( handle.clone() ) );

    coordinator.run().await;

    let last = handle.snapshot();
    if last.is_shuffled != settings.shuffle || last.rate != settings.playback_rate {
        settings.shuffle = last.is_shuffled;
        settings.playback_rate = last.rate;
        settings.save( args.config.as_deref() );
    }

    tracing::info!( "loopcast exiting" );
    Ok(())
}


/// Reads slash commands from stdin until quit or end of input.
async fn read_commands( handle: CoordinatorHandle ) {
    let mut lines = BufReader::new( tokio::io::stdin() ).lines();

    loop {
        let line = match lines.next_line().await {
            Ok( Some( line ) ) => line,
            Ok( None ) => break,
            Err( e ) => {
                tracing::warn!( "Failed to read input: {}", e );
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse( &line ) {
            Ok( command ) if command.is_local() => {
                println!( "{}", render_local( &command, &handle.snapshot() ) );
            }
            Ok( command ) => {
                tracing::debug!( "Command: {}", command.description() );
                let quit = command == Command::Quit;
                if !handle.send( command ) || quit {
                    return;
                }
            }
            Err( e ) => println!( "{} (try /help)", e ),
        }
    }

    handle.shutdown();
}


/// Answers a local command from a snapshot.
fn render_local( command: &Command, snapshot: &Snapshot ) -> String {
    match command {
        Command::List => view::render_tracks( snapshot ),
        Command::Playlists => view::render_playlists( snapshot ),
        Command::Status => view::render_status( snapshot ),
        _ => help_text().to_string(),
    }
}


async fn print_notices( mut notices: mpsc::UnboundedReceiver<Notice> ) {
    while let Some( notice ) = notices.recv().await {
        println!( "{}", view::render_notice( &notice ) );
    }
}


/// Prints a line whenever a different track starts playing.
async fn announce_tracks( mut snapshots: watch::Receiver<Snapshot> ) {
    let mut announced: Option<String> = None;

    while snapshots.changed().await.is_ok() {
        let line = {
            let snapshot = snapshots.borrow_and_update();
            match snapshot.current_track() {
                Some( track ) if snapshot.is_playing && snapshot.is_player_ready => {
                    if announced.as_deref() == Some( track.id.as_str() ) {
                        None
                    } else {
                        announced = Some( track.id.clone() );
                        Some( format!( "Now playing: {}", track.title ) )
                    }
                }
                _ => None,
            }
        };

        if let Some( line ) = line {
            println!( "{}", line );
        }
    }
}
