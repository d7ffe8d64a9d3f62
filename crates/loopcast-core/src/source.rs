//! Extracting video ids from user supplied links.


/// Prefixes that are followed directly by a video id.
const ID_MARKERS: &[&str] = &[
    "youtube.com/watch?v=",
    "youtu.be/",
    "youtube.com/embed/",
];

/// Length of a bare video id.
const BARE_ID_LEN: usize = 11;


/// Extracts the video id from a watch/share/embed URL or a bare id.
///
/// @param input - URL or id as typed by the user
///
/// @returns The id, or None if the input is not recognised
pub fn extract_video_id( input: &str ) -> Option<String> {
    let input = input.trim();

    for marker in ID_MARKERS {
        if let Some( start ) = input.find( marker ) {
            let rest = &input[ start + marker.len().. ];
            let end = rest.find( [ '&', '?', '#', '\n' ] ).unwrap_or( rest.len() );
            let id = &rest[ ..end ];
            if !id.is_empty() {
                return Some( id.to_string() );
            }
        }
    }

    if is_bare_id( input ) {
        return Some( input.to_string() );
    }

    None
}


fn is_bare_id( s: &str ) -> bool {
    s.len() == BARE_ID_LEN
        && s.chars().all( |c| c.is_ascii_alphanumeric() || c == '_' || c == '-' )
}


/// Canonical watch URL for an id.
pub fn watch_url( video_id: &str ) -> String {
    format!( "https://www.youtube.com/watch?v={}", video_id )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_watch_url() {
        assert_eq!(
            extract_video_id( "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42" ).as_deref(),
            Some( "dQw4w9WgXcQ" )
        );
    }


    #[test]
    fn test_short_link() {
        assert_eq!( extract_video_id( "https://youtu.be/dQw4w9WgXcQ?si=xyz" ).as_deref(), Some( "dQw4w9WgXcQ" ) );
    }


    #[test]
    fn test_embed_link() {
        assert_eq!( extract_video_id( "youtube.com/embed/abc123#frag" ).as_deref(), Some( "abc123" ) );
    }


    #[test]
    fn test_bare_id() {
        assert_eq!( extract_video_id( "  dQw4w9WgXcQ " ).as_deref(), Some( "dQw4w9WgXcQ" ) );
    }


    #[test]
    fn test_rejects_garbage() {
        assert_eq!( extract_video_id( "https://example.com/video" ), None );
        assert_eq!( extract_video_id( "short" ), None );
        assert_eq!( extract_video_id( "https://youtu.be/" ), None );
        assert_eq!( extract_video_id( "dQw4w9WgXc!" ), None );
    }


    #[test]
    fn test_watch_url_round_trip() {
        assert_eq!( extract_video_id( &watch_url( "dQw4w9WgXcQ" ) ).as_deref(), Some( "dQw4w9WgXcQ" ) );
    }
}
