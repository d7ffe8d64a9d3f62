//! Metadata reconciliation
//!
//! Reads title and artwork of the loaded item back from the player and
//! decides whether the stored track needs patching. Each item id is
//! extracted at most once per session.

use std::collections::HashSet;
use std::time::Duration;

use crate::player::VideoData;
use crate::track::{ thumbnail_url, ThumbnailQuality, Track, TrackMetadata };


/// Outcome of one extraction attempt.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Extraction {
    /// The item was handled earlier in this session.
    AlreadyExtracted,
    /// The track already carries the player's metadata.
    Unchanged,
    /// The track should be patched with these fields.
    Updated( TrackMetadata ),
    /// Nothing usable yet; try again after `delay`.
    Retry { delay: Duration },
    /// Retries exhausted for this item.
    GaveUp,
}


#[derive( Debug )]
struct Job {
    video_id: String,
    attempt: u32,
}


#[derive( Debug )]
pub struct MetadataReconciler {
    extracted: HashSet<String>,
    job: Option<Job>,
    max_retries: u32,
    retry_delay: Duration,
}


impl MetadataReconciler {
    pub fn new( max_retries: u32, retry_delay: Duration ) -> Self {
        Self {
            extracted: HashSet::new(),
            job: None,
            max_retries,
            retry_delay,
        }
    }


    pub fn is_extracted( &self, video_id: &str ) -> bool {
        self.extracted.contains( video_id )
    }


    /// Starts (or restarts) extraction for an item.
    ///
    /// @returns false if the item was already extracted
    pub fn begin( &mut self, video_id: &str ) -> bool {
        if self.is_extracted( video_id ) {
            return false;
        }
        if self.job.as_ref().map( |j| j.video_id.as_str() ) != Some( video_id ) {
            self.job = Some( Job { video_id: video_id.to_string(), attempt: 0 } );
        }
        true
    }


    /// Drops the in-flight job, e.g. when the current item changes.
    pub fn abandon( &mut self ) {
        self.job = None;
    }


    /// Compares what the player reports with the current track.
    pub fn attempt( &mut self, track: &Track, data: Option<VideoData> ) -> Extraction {
        let video_id = track.video_id();
        if self.is_extracted( video_id ) {
            return Extraction::AlreadyExtracted;
        }

        let title = data
            .filter( |d| d.video_id == video_id )
            .map( |d| d.title.trim().to_string() )
            .filter( |t| !t.is_empty() );

        if let Some( title ) = title {
            self.extracted.insert( video_id.to_string() );
            self.job = None;

            let metadata = TrackMetadata {
                title,
                artwork: Some( thumbnail_url( video_id, ThumbnailQuality::MaxRes ) ),
            };

            if track.metadata() == metadata {
                tracing::debug!( "Metadata for {} already current", video_id );
                return Extraction::Unchanged;
            }

            tracing::info!( "Extracted metadata for {}: {}", video_id, metadata.title );
            return Extraction::Updated( metadata );
        }

        if !self.begin( video_id ) {
            return Extraction::AlreadyExtracted;
        }
        let attempt = match self.job.as_mut() {
            Some( job ) => {
                job.attempt += 1;
                job.attempt
            }
            None => 1,
        };

        if attempt > self.max_retries {
            tracing::debug!( "Giving up on metadata for {}", video_id );
            self.job = None;
            return Extraction::GaveUp;
        }

        let delay = self.retry_delay * attempt;
        tracing::debug!( "Metadata for {} incomplete, retry {} in {:?}", video_id, attempt, delay );
        Extraction::Retry { delay }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn reconciler() -> MetadataReconciler {
        MetadataReconciler::new( 3, Duration::from_millis( 1500 ) )
    }


    fn data( video_id: &str, title: &str ) -> Option<VideoData> {
        Some( VideoData { video_id: video_id.into(), title: title.into() } )
    }


    #[test]
    fn test_updates_placeholder_title() {
        let mut r = reconciler();
        let track = Track::new( "p", "url", "abc" );
        assert!( r.begin( "abc" ) );

        match r.attempt( &track, data( "abc", "Real Title" ) ) {
            Extraction::Updated( meta ) => {
                assert_eq!( meta.title, "Real Title" );
                assert_eq!( meta.artwork.as_deref(), Some( "https://img.youtube.com/vi/abc/maxresdefault.jpg" ) );
            }
            other => panic!( "unexpected {:?}", other ),
        }

        assert!( r.is_extracted( "abc" ) );
        assert!( !r.begin( "abc" ) );
        assert_eq!( r.attempt( &track, data( "abc", "Other" ) ), Extraction::AlreadyExtracted );
    }


    #[test]
    fn test_unchanged_still_marks_extracted() {
        let mut r = reconciler();
        let mut track = Track::new( "p", "url", "abc" );
        track.title = "Same".into();
        track.artwork = Some( thumbnail_url( "abc", ThumbnailQuality::MaxRes ) );

        assert_eq!( r.attempt( &track, data( "abc", "Same" ) ), Extraction::Unchanged );
        assert!( r.is_extracted( "abc" ) );
    }


    #[test]
    fn test_linear_backoff_then_give_up() {
        let mut r = reconciler();
        let track = Track::new( "p", "url", "abc" );
        r.begin( "abc" );

        assert_eq!( r.attempt( &track, None ), Extraction::Retry { delay: Duration::from_millis( 1500 ) } );
        assert_eq!( r.attempt( &track, data( "abc", "  " ) ), Extraction::Retry { delay: Duration::from_millis( 3000 ) } );
        assert_eq!( r.attempt( &track, None ), Extraction::Retry { delay: Duration::from_millis( 4500 ) } );
        assert_eq!( r.attempt( &track, None ), Extraction::GaveUp );
        assert!( !r.is_extracted( "abc" ) );
    }


    #[test]
    fn test_mismatched_item_is_incomplete() {
        let mut r = reconciler();
        let track = Track::new( "p", "url", "abc" );
        assert!( matches!( r.attempt( &track, data( "other", "Title" ) ), Extraction::Retry { .. } ) );
    }


    #[test]
    fn test_new_item_restarts_attempts() {
        let mut r = reconciler();
        let a = Track::new( "p", "url", "aaa" );
        let b = Track::new( "p", "url", "bbb" );

        r.attempt( &a, None );
        r.attempt( &a, None );
        r.begin( "bbb" );
        assert_eq!( r.attempt( &b, None ), Extraction::Retry { delay: Duration::from_millis( 1500 ) } );
    }
}
