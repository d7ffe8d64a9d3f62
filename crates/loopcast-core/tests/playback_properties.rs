//! Property tests for the playback state machine.

use proptest::prelude::*;

use loopcast_core::{ PlaybackState, Track };


fn tracks( n: usize ) -> Vec<Track> {
    ( 0..n ).map( |i| Track::new( "p", "url", format!( "video{:06}", i ) ) ).collect()
}


fn state_with( n: usize, current: usize, shuffled: bool, playing: bool, seed: u64 ) -> PlaybackState {
    let mut state = PlaybackState::with_seed( seed );
    state.load_initial( tracks( n ) ).unwrap();
    state.play_at( current );
    state.set_playing( playing );
    if shuffled {
        state.toggle_shuffle();
    }
    state
}


/// A list length plus a valid position in it.
fn list_and_position() -> impl Strategy<Value = ( usize, usize )> {
    ( 1usize..30 ).prop_flat_map( |n| ( Just( n ), 0..n ) )
}


proptest! {
    #[test]
    fn advancing_len_times_returns_to_start(
        ( n, current ) in list_and_position(),
        shuffled in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let mut state = state_with( n, current, shuffled, true, seed );
        for _ in 0..n {
            state.advance();
        }
        prop_assert_eq!( state.current_index(), Some( current ) );
    }


    #[test]
    fn retreat_undoes_advance(
        ( n, current ) in list_and_position(),
        shuffled in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let mut state = state_with( n, current, shuffled, false, seed );
        state.advance();
        state.retreat();
        prop_assert_eq!( state.current_index(), Some( current ) );
    }


    #[test]
    fn reconcile_keeps_current_identity_and_play_flag(
        ( n, current ) in list_and_position(),
        keep in prop::collection::vec( any::<bool>(), 30 ),
        extra in 0usize..5,
        playing in any::<bool>(),
        shuffled in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let mut state = state_with( n, current, shuffled, playing, seed );
        let current_id = state.current_track().unwrap().id.clone();

        let mut next: Vec<Track> = state.tracks().iter()
            .zip( keep.iter() )
            .filter( |( _, keep )| **keep )
            .map( |( t, _ )| t.clone() )
            .collect();
        for i in 0..extra {
            next.insert( ( i * 7 ) % ( next.len() + 1 ), Track::new( "p", "url", format!( "added{:06}", i ) ) );
        }

        let still_there = next.iter().any( |t| t.id == current_id );
        let remaining = next.len();
        state.reconcile_tracks( next );

        prop_assert_eq!( state.is_playing(), playing );
        if still_there {
            prop_assert_eq!( &state.current_track().unwrap().id, &current_id );
        }
        match state.current_index() {
            Some( i ) => prop_assert!( i < remaining ),
            None => prop_assert_eq!( remaining, 0 ),
        }
        if let Some( order ) = state.shuffle_order() {
            let mut sorted = order.to_vec();
            sorted.sort_unstable();
            prop_assert_eq!( sorted, ( 0..remaining ).collect::<Vec<_>>() );
        }
    }


    #[test]
    fn deleting_current_lands_on_a_remaining_track(
        ( n, current ) in ( 2usize..30 ).prop_flat_map( |n| ( Just( n ), 0..n ) ),
        seed in any::<u64>(),
    ) {
        let mut state = state_with( n, current, false, true, seed );
        let mut next = state.tracks().to_vec();
        next.remove( current );

        state.reconcile_tracks( next );

        let index = state.current_index();
        prop_assert!( index.is_some() );
        prop_assert_eq!( index, Some( current.min( n - 2 ) ) );
        prop_assert!( state.is_playing() );
    }


    #[test]
    fn shuffle_on_then_off_restores_list_order(
        ( n, current ) in list_and_position(),
        seed in any::<u64>(),
    ) {
        let mut state = state_with( n, current, false, true, seed );
        let id = state.current_track().unwrap().id.clone();

        state.toggle_shuffle();
        prop_assert!( state.shuffle_order().unwrap().contains( &current ) );
        state.toggle_shuffle();

        prop_assert_eq!( &state.current_track().unwrap().id, &id );
        state.advance();
        prop_assert_eq!( state.current_index(), Some( ( current + 1 ) % n ) );
    }
}


#[test]
fn deleting_the_only_track_empties_position() {
    let mut state = state_with( 1, 0, false, true, 1 );
    state.reconcile_tracks( Vec::new() );
    assert_eq!( state.current_index(), None );
    assert!( state.is_playing() );
}
