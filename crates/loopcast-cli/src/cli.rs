//! Command-line argument parsing for Loopcast.

use std::path::PathBuf;

use clap::Parser;


/// Loopcast - Loop a playlist of video links through mpv.
#[derive( Parser, Debug )]
#[command( name = "loopcast" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Settings file to use instead of the default location.
    #[arg( short, long )]
    pub config: Option<PathBuf>,

    /// Library file holding playlists and tracks.
    #[arg( short, long )]
    pub library: Option<PathBuf>,

    /// Path to the mpv executable.
    #[arg( long )]
    pub mpv: Option<PathBuf>,

    /// Log at debug level.
    #[arg( short, long )]
    pub verbose: bool,

    /// Links or video ids to add and start playing.
    #[arg( trailing_var_arg = true )]
    pub urls: Vec<String>,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_trailing_urls() {
        let args = Args::parse_from([ "loopcast", "--verbose", "dQw4w9WgXcQ", "https://youtu.be/abc" ]);
        assert!( args.verbose );
        assert_eq!( args.urls, vec![ "dQw4w9WgXcQ", "https://youtu.be/abc" ] );
        assert!( args.library.is_none() );
    }
}
