//! Application settings management
//!
//! Handles persistent settings: the mpv invocation, startup preferences and
//! the coordinator's timing constants.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };

use loopcast_core::{ CoordinatorConfig, PlaybackRate };


/// Application settings.
#[derive( Debug, Clone, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// mpv executable, looked up on PATH when bare
    pub mpv_path: PathBuf,

    /// Extra arguments passed to mpv
    pub mpv_args: Vec<String>,

    /// Start with shuffle on
    pub shuffle: bool,

    /// Initial playback rate
    pub playback_rate: PlaybackRate,

    pub coordinator: CoordinatorConfig,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            mpv_path: PathBuf::from( "mpv" ),
            mpv_args: Vec::new(),
            shuffle: false,
            playback_rate: PlaybackRate::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}


impl Settings {
    /// Returns the path to the default settings file.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "loopcast" ).join( "settings.json" ) )
    }


    /// Loads settings from `path`, or from the default location.
    /// Returns defaults if the file is missing or unreadable.
    pub fn load( path: Option<&Path> ) -> Self {
        let path = match path.map( Path::to_path_buf ).or_else( Self::settings_path ) {
            Some( p ) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( &path ) {
            Ok( contents ) => match serde_json::from_str( &contents ) {
                Ok( settings ) => settings,
                Err( e ) => {
                    tracing::warn!( "Invalid settings in {}: {}", path.display(), e );
                    Self::default()
                }
            },
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Saves settings to `path`, or to the default location.
    pub fn save( &self, path: Option<&Path> ) {
        let path = match path.map( Path::to_path_buf ).or_else( Self::settings_path ) {
            Some( p ) => p,
            None => return,
        };

        // Create parent directory if needed
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( &path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load( Some( &dir.path().join( "absent.json" ) ) );
        assert_eq!( settings.mpv_path, PathBuf::from( "mpv" ) );
        assert_eq!( settings.coordinator.max_error_skips, 3 );
    }


    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, r#"{ "shuffle": true, "coordinator": { "buffering_timeout_ms": 5000 } }"# ).unwrap();

        let settings = Settings::load( Some( &path ) );
        assert!( settings.shuffle );
        assert_eq!( settings.coordinator.buffering_timeout_ms, 5000 );
        assert_eq!( settings.coordinator.error_skip_delay_ms, 2000 );
    }


    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "settings.json" );
        let settings = Settings {
            mpv_args: vec![ "--volume=50".into() ],
            playback_rate: PlaybackRate::new( 1.5 ).unwrap(),
            ..Settings::default()
        };
        settings.save( Some( &path ) );

        let loaded = Settings::load( Some( &path ) );
        assert_eq!( loaded.mpv_args, vec![ "--volume=50".to_string() ] );
        assert_eq!( loaded.playback_rate, PlaybackRate::new( 1.5 ).unwrap() );
    }


    #[test]
    fn test_garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, "not json" ).unwrap();
        assert!( !Settings::load( Some( &path ) ).shuffle );
    }
}
