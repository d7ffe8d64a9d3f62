//! Shuffle order generation
//!
//! Produces the permutation of list positions that playback walks while
//! shuffle is enabled.

use rand::Rng;


/// Returns a uniformly random permutation of `0..len`.
///
/// Fisher-Yates: walks from the last slot down to the second, swapping each
/// with a uniformly chosen slot at or before it.
pub fn shuffled_order<R: Rng + ?Sized>( len: usize, rng: &mut R ) -> Vec<usize> {
    let mut order: Vec<usize> = ( 0..len ).collect();

    for i in ( 1..len ).rev() {
        let j = rng.gen_range( 0..=i );
        order.swap( i, j );
    }

    order
}


/// Like [`shuffled_order`], but rotates `first` to the front so the track
/// that is already playing starts the cycle.
pub fn shuffled_order_from<R: Rng + ?Sized>( len: usize, first: Option<usize>, rng: &mut R ) -> Vec<usize> {
    let mut order = shuffled_order( len, rng );

    if let Some( first ) = first {
        if let Some( pos ) = order.iter().position( |&i| i == first ) {
            order.swap( 0, pos );
        }
    }

    order
}


#[cfg( test )]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;


    fn is_permutation( order: &[usize] ) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == ( 0..order.len() ).collect::<Vec<_>>()
    }


    #[test]
    fn test_empty() {
        let mut rng = StdRng::seed_from_u64( 1 );
        assert!( shuffled_order( 0, &mut rng ).is_empty() );
    }


    #[test]
    fn test_is_permutation() {
        let mut rng = StdRng::seed_from_u64( 7 );
        for len in 1..40 {
            assert!( is_permutation( &shuffled_order( len, &mut rng ) ) );
        }
    }


    #[test]
    fn test_deterministic_for_seed() {
        let a = shuffled_order( 25, &mut StdRng::seed_from_u64( 99 ) );
        let b = shuffled_order( 25, &mut StdRng::seed_from_u64( 99 ) );
        assert_eq!( a, b );
    }


    #[test]
    fn test_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64( 1234 );
        let mut counts: HashMap<Vec<usize>, u32> = HashMap::new();

        for _ in 0..6000 {
            *counts.entry( shuffled_order( 3, &mut rng ) ).or_default() += 1;
        }

        assert_eq!( counts.len(), 6 );
        for count in counts.values() {
            assert!( ( 800..1200 ).contains( count ), "skewed count {}", count );
        }
    }


    #[test]
    fn test_from_puts_current_first() {
        let mut rng = StdRng::seed_from_u64( 5 );
        for first in 0..5 {
            let order = shuffled_order_from( 5, Some( first ), &mut rng );
            assert_eq!( order[ 0 ], first );
            assert!( is_permutation( &order ) );
        }
    }


    #[test]
    fn test_from_ignores_out_of_range() {
        let mut rng = StdRng::seed_from_u64( 5 );
        let order = shuffled_order_from( 3, Some( 9 ), &mut rng );
        assert!( is_permutation( &order ) );
    }
}
