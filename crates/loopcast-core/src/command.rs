//! Slash command parsing.
//!
//! Commands are parsed from user input and handed to the coordinator.
//! List positions are typed 1-based and stored 0-based.

use std::path::PathBuf;

use thiserror::Error;

use crate::playback::PlaybackRate;


/// Errors that can occur during command parsing.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// A playlist named by list position or by id.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum PlaylistRef {
    Position( usize ),
    Id( String ),
}


impl PlaylistRef {
    fn parse( s: &str ) -> Self {
        match parse_position( s ) {
            Ok( index ) => PlaylistRef::Position( index ),
            Err( _ ) => PlaylistRef::Id( s.to_string() ),
        }
    }
}


/// Parsed slash command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Track commands
    Add { urls: Vec<String> },
    Remove { index: usize },

    // Playback commands
    Play { index: Option<usize> },
    PlayAll,
    Pause,
    Toggle,
    Next,
    Prev,
    Shuffle,
    Rate { rate: PlaybackRate },

    // Playlist commands
    List,
    Playlists,
    New { name: String },
    Rename { name: String },
    Switch { target: PlaylistRef },
    Drop { target: PlaylistRef },
    Export { path: Option<PathBuf> },
    Import { path: PathBuf },

    // Session commands
    Status,
    Help,
    Quit,
}


impl Command {
    /// Parses a command string. The leading `/` is optional.
    ///
    /// @param input - The command string to parse
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let input = input.strip_prefix( '/' ).unwrap_or( input );
        let mut parts = input.splitn( 2, char::is_whitespace );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            "add" | "a" => {
                let args = args.ok_or_else( || CommandError::MissingArgument( "url".into() ) )?;
                let urls = args.split_whitespace().map( String::from ).collect();
                Ok( Command::Add { urls } )
            }
            "remove" | "rm" | "del" => {
                let pos = args.ok_or_else( || CommandError::MissingArgument( "track number".into() ) )?;
                Ok( Command::Remove { index: parse_position( pos )? } )
            }

            "play" | "p" => {
                let index = args.map( parse_position ).transpose()?;
                Ok( Command::Play { index } )
            }
            "all" | "playall" => Ok( Command::PlayAll ),
            "pause" | "pa" => Ok( Command::Pause ),
            "toggle" | "t" => Ok( Command::Toggle ),
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "pr" => Ok( Command::Prev ),
            "shuffle" | "sh" => Ok( Command::Shuffle ),
            "rate" | "speed" => {
                let arg = args.ok_or_else( || CommandError::MissingArgument( "rate".into() ) )?;
                let rate = arg.parse().map_err( |_| CommandError::InvalidArgument(
                    format!( "Invalid rate: '{}'. Use one of 0.25, 0.5, ... 2", arg )
                ))?;
                Ok( Command::Rate { rate } )
            }

            "list" | "ls" | "l" => Ok( Command::List ),
            "playlists" | "pls" => Ok( Command::Playlists ),
            "new" => {
                let name = args.ok_or_else( || CommandError::MissingArgument( "playlist name".into() ) )?;
                Ok( Command::New { name: name.to_string() } )
            }
            "rename" | "mv" => {
                let name = args.ok_or_else( || CommandError::MissingArgument( "playlist name".into() ) )?;
                Ok( Command::Rename { name: name.to_string() } )
            }
            "switch" | "sw" => {
                let target = args.ok_or_else( || CommandError::MissingArgument( "playlist".into() ) )?;
                Ok( Command::Switch { target: PlaylistRef::parse( target ) } )
            }
            "drop" => {
                let target = args.ok_or_else( || CommandError::MissingArgument( "playlist".into() ) )?;
                Ok( Command::Drop { target: PlaylistRef::parse( target ) } )
            }
            "export" | "ex" => Ok( Command::Export { path: args.map( PathBuf::from ) } ),
            "import" | "im" => {
                let path = args.ok_or_else( || CommandError::MissingArgument( "path".into() ) )?;
                Ok( Command::Import { path: PathBuf::from( path ) } )
            }

            "status" | "st" => Ok( Command::Status ),
            "help" | "h" | "?" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns a brief description of the command for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            Command::Add { .. } => "Add links to the playlist",
            Command::Remove { .. } => "Remove a track",
            Command::Play { .. } => "Play, or play track n",
            Command::PlayAll => "Play from the first track",
            Command::Pause => "Pause playback",
            Command::Toggle => "Toggle play/pause",
            Command::Next => "Next track",
            Command::Prev => "Previous track",
            Command::Shuffle => "Toggle shuffle",
            Command::Rate { .. } => "Set playback rate",
            Command::List => "List tracks",
            Command::Playlists => "List playlists",
            Command::New { .. } => "Create a playlist",
            Command::Rename { .. } => "Rename the current playlist",
            Command::Switch { .. } => "Switch playlist",
            Command::Drop { .. } => "Delete a playlist",
            Command::Export { .. } => "Export the current playlist",
            Command::Import { .. } => "Import tracks from a file",
            Command::Status => "Show playback status",
            Command::Help => "Show help",
            Command::Quit => "Quit application",
        }
    }


    /// True for commands the front end answers without the coordinator.
    pub fn is_local( &self ) -> bool {
        matches!(
            self,
            Command::List | Command::Playlists | Command::Status | Command::Help
        )
    }
}


/// Parses a 1-based list position into an index.
fn parse_position( s: &str ) -> Result<usize, CommandError> {
    match s.trim().parse::<usize>() {
        Ok( n ) if n > 0 => Ok( n - 1 ),
        _ => Err( CommandError::InvalidArgument( format!( "Invalid position: {}", s ) ) ),
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Track Commands:
  /add <url...>    Add links or video ids
  /remove <n>      Remove track n

Playback Commands:
  /play [n]        Play, or play track n
  /all             Play from the first track
  /pause           Pause playback
  /toggle          Toggle play/pause
  /next            Next track
  /prev            Previous track
  /shuffle         Toggle shuffle
  /rate <r>        Playback rate (0.25 - 2)

Playlist Commands:
  /list            List tracks
  /playlists       List playlists
  /new <name>      Create and switch to a playlist
  /rename <name>   Rename the current playlist
  /switch <n|id>   Switch playlist
  /drop <n|id>     Delete a playlist
  /export [path]   Export the current playlist
  /import <path>   Import tracks into the current playlist

Other Commands:
  /status          Show playback status
  /help            Show this help
  /quit            Exit loopcast"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_add_many() {
        let cmd = Command::parse( "/add https://youtu.be/abc  dQw4w9WgXcQ" ).unwrap();
        assert_eq!( cmd, Command::Add { urls: vec![ "https://youtu.be/abc".into(), "dQw4w9WgXcQ".into() ] } );
    }


    #[test]
    fn test_parse_play_position() {
        assert_eq!( Command::parse( "play" ).unwrap(), Command::Play { index: None } );
        assert_eq!( Command::parse( "p 3" ).unwrap(), Command::Play { index: Some( 2 ) } );
        assert!( matches!( Command::parse( "play 0" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_rate() {
        let cmd = Command::parse( "rate 1.5x" ).unwrap();
        assert_eq!( cmd, Command::Rate { rate: PlaybackRate::new( 1.5 ).unwrap() } );
        assert!( matches!( Command::parse( "rate 3" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_playlist_ref() {
        assert_eq!( Command::parse( "switch 2" ).unwrap(), Command::Switch { target: PlaylistRef::Position( 1 ) } );
        assert_eq!(
            Command::parse( "drop default" ).unwrap(),
            Command::Drop { target: PlaylistRef::Id( "default".into() ) }
        );
    }


    #[test]
    fn test_parse_export_optional_path() {
        assert_eq!( Command::parse( "export" ).unwrap(), Command::Export { path: None } );
        assert_eq!(
            Command::parse( "export /tmp/mix.json" ).unwrap(),
            Command::Export { path: Some( PathBuf::from( "/tmp/mix.json" ) ) }
        );
    }


    #[test]
    fn test_local_commands() {
        assert!( Command::parse( "ls" ).unwrap().is_local() );
        assert!( !Command::parse( "next" ).unwrap().is_local() );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        assert!( matches!( Command::parse( "add" ), Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "remove  " ), Err( CommandError::MissingArgument( _ ) ) ) );
    }
}
