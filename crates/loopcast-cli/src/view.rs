//! Text rendering of coordinator snapshots.
//!
//! Local commands (`list`, `playlists`, `status`) are answered from the
//! latest snapshot without a round trip through the coordinator.

use std::fmt::Write;

use loopcast_core::{ Notice, NoticeLevel, Snapshot };


/// Renders the current playlist's tracks, marking the current one.
pub fn render_tracks( snapshot: &Snapshot ) -> String {
    let name = snapshot.current_playlist().map( |p| p.name.as_str() ).unwrap_or( "Playlist" );
    let mut out = format!( "{} ({} tracks)\n", name, snapshot.tracks.len() );

    if snapshot.tracks.is_empty() {
        out.push_str( "  (empty, use /add <url>)\n" );
        return out;
    }

    for ( i, track ) in snapshot.tracks.iter().enumerate() {
        let marker = if snapshot.current_index == Some( i ) {
            if snapshot.is_playing { ">" } else { "=" }
        } else {
            " "
        };
        let _ = writeln!( out, "{} {:>3}. {}", marker, i + 1, track.title );
    }
    out
}


/// Renders the saved playlists, marking the current one.
pub fn render_playlists( snapshot: &Snapshot ) -> String {
    let mut out = String::new();
    for ( i, playlist ) in snapshot.playlists.iter().enumerate() {
        let marker = if playlist.id == snapshot.current_playlist_id { "*" } else { " " };
        let _ = writeln!( out, "{} {:>3}. {} [{}]", marker, i + 1, playlist.name, playlist.id );
    }
    out
}


/// One-line playback status.
pub fn render_status( snapshot: &Snapshot ) -> String {
    let state = if snapshot.is_loading {
        "Loading"
    } else if snapshot.is_playing {
        "Playing"
    } else {
        "Paused"
    };

    let mut out = match ( snapshot.current_index, snapshot.current_track() ) {
        ( Some( i ), Some( track ) ) => {
            format!( "{}: {} ({}/{})", state, track.title, i + 1, snapshot.tracks.len() )
        }
        _ => "Stopped: nothing to play".to_string(),
    };

    let _ = write!( out, " | rate {}", snapshot.rate );
    if snapshot.is_shuffled {
        out.push_str( " | shuffle" );
    }
    if !snapshot.is_player_ready {
        out.push_str( " | player not ready" );
    }
    if snapshot.halted {
        out.push_str( " | halted" );
    }
    if let Some( ref error ) = snapshot.error {
        let _ = write!( out, "\n  {}", error );
    }
    out
}


/// Formats a notice for the terminal.
pub fn render_notice( notice: &Notice ) -> String {
    match notice.level {
        NoticeLevel::Info => notice.message.clone(),
        NoticeLevel::Warning => format!( "warning: {}", notice.message ),
        NoticeLevel::Error => format!( "error: {}", notice.message ),
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use loopcast_core::{ PlaylistInfo, Track };


    fn snapshot() -> Snapshot {
        let tracks = vec![
            Track::new( "default", "u", "aaaaaaaaaaa" ),
            Track::new( "default", "u", "bbbbbbbbbbb" ),
        ];
        Snapshot {
            tracks,
            current_index: Some( 1 ),
            is_playing: true,
            playlists: vec![ PlaylistInfo::default_playlist() ],
            current_playlist_id: "default".into(),
            ..Snapshot::default()
        }
    }


    #[test]
    fn test_tracks_mark_current() {
        let out = render_tracks( &snapshot() );
        assert!( out.starts_with( "Default Playlist (2 tracks)" ) );
        assert!( out.contains( ">   2. Track bbbbbbbbbbb" ) );
        assert!( out.contains( "    1. Track aaaaaaaaaaa" ) );
    }


    #[test]
    fn test_status_line() {
        let mut snap = snapshot();
        snap.is_player_ready = true;
        snap.error = Some( "Video not found.".into() );
        let out = render_status( &snap );
        assert!( out.starts_with( "Playing: Track bbbbbbbbbbb (2/2) | rate 1x" ) );
        assert!( out.ends_with( "Video not found." ) );
    }


    #[test]
    fn test_status_empty() {
        let out = render_status( &Snapshot::default() );
        assert!( out.starts_with( "Stopped" ) );
        assert!( out.contains( "player not ready" ) );
    }


    #[test]
    fn test_playlists_mark_current() {
        let out = render_playlists( &snapshot() );
        assert_eq!( out, "*   1. Default Playlist [default]\n" );
    }
}
