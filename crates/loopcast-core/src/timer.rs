//! Cancellable one-shot timers
//!
//! Each timer is a tokio task that sleeps and then posts a [`TimerFired`]
//! into the coordinator's input queue. Every scheduled timer gets a fresh
//! epoch token; a firing is acted on only if its token is still the one on
//! record for that kind, so a timer cancelled after it already posted is
//! still ignored.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::coordinator::Input;


/// What a timer is for. At most one of each kind is pending.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum TimerKind {
    /// Buffering has not resolved in time.
    BufferingWatchdog,
    /// Skip past an unplayable item.
    ErrorSkip,
    /// Start playback of an item that was cued while playing.
    CuePlay,
    /// Next metadata read attempt.
    Metadata,
}


/// Posted when a timer expires.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct TimerFired {
    pub kind: TimerKind,
    pub epoch: u64,
}


struct Pending {
    epoch: u64,
    handle: AbortHandle,
}


pub struct Timers {
    tx: mpsc::UnboundedSender<Input>,
    pending: HashMap<TimerKind, Pending>,
    next_epoch: u64,
}


impl Timers {
    pub fn new( tx: mpsc::UnboundedSender<Input> ) -> Self {
        Self {
            tx,
            pending: HashMap::new(),
            next_epoch: 1,
        }
    }


    /// Schedules a timer, replacing any pending timer of the same kind.
    ///
    /// @returns The epoch token of the new timer
    pub fn schedule( &mut self, kind: TimerKind, delay: Duration ) -> u64 {
        self.cancel( kind );

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let tx = self.tx.clone();
        let task = tokio::spawn( async move {
            tokio::time::sleep( delay ).await;
            let _ = tx.send( Input::Timer( TimerFired { kind, epoch } ) );
        });

        tracing::debug!( "Scheduled {:?} #{} in {:?}", kind, epoch, delay );
        self.pending.insert( kind, Pending { epoch, handle: task.abort_handle() } );
        epoch
    }


    pub fn cancel( &mut self, kind: TimerKind ) {
        if let Some( pending ) = self.pending.remove( &kind ) {
            tracing::debug!( "Cancelled {:?} #{}", kind, pending.epoch );
            pending.handle.abort();
        }
    }


    pub fn cancel_all( &mut self ) {
        for ( _, pending ) in self.pending.drain() {
            pending.handle.abort();
        }
    }


    pub fn is_pending( &self, kind: TimerKind ) -> bool {
        self.pending.contains_key( &kind )
    }


    /// Consumes a firing if it belongs to the timer currently on record.
    pub fn take_if_current( &mut self, fired: &TimerFired ) -> bool {
        match self.pending.get( &fired.kind ) {
            Some( pending ) if pending.epoch == fired.epoch => {
                self.pending.remove( &fired.kind );
                true
            }
            _ => {
                tracing::debug!( "Dropping stale {:?} #{}", fired.kind, fired.epoch );
                false
            }
        }
    }
}


impl Drop for Timers {
    fn drop( &mut self ) {
        self.cancel_all();
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    async fn next_fired( rx: &mut mpsc::UnboundedReceiver<Input> ) -> TimerFired {
        match rx.recv().await {
            Some( Input::Timer( fired ) ) => fired,
            other => panic!( "expected timer, got {:?}", other ),
        }
    }


    #[tokio::test( start_paused = true )]
    async fn test_fires_after_delay() {
        let ( tx, mut rx ) = mpsc::unbounded_channel();
        let mut timers = Timers::new( tx );

        let epoch = timers.schedule( TimerKind::ErrorSkip, Duration::from_secs( 2 ) );
        let fired = next_fired( &mut rx ).await;

        assert_eq!( fired, TimerFired { kind: TimerKind::ErrorSkip, epoch } );
        assert!( timers.take_if_current( &fired ) );
        assert!( !timers.is_pending( TimerKind::ErrorSkip ) );
    }


    #[tokio::test( start_paused = true )]
    async fn test_cancelled_timer_never_fires() {
        let ( tx, mut rx ) = mpsc::unbounded_channel();
        let mut timers = Timers::new( tx );

        timers.schedule( TimerKind::BufferingWatchdog, Duration::from_secs( 20 ) );
        timers.cancel( TimerKind::BufferingWatchdog );

        tokio::time::sleep( Duration::from_secs( 30 ) ).await;
        assert!( rx.try_recv().is_err() );
    }


    #[tokio::test( start_paused = true )]
    async fn test_reschedule_invalidates_old_epoch() {
        let ( tx, mut rx ) = mpsc::unbounded_channel();
        let mut timers = Timers::new( tx );

        let first = timers.schedule( TimerKind::Metadata, Duration::from_millis( 100 ) );
        let second = timers.schedule( TimerKind::Metadata, Duration::from_millis( 500 ) );
        assert_ne!( first, second );

        // a firing that raced the cancellation is still rejected
        let stale = TimerFired { kind: TimerKind::Metadata, epoch: first };
        assert!( !timers.take_if_current( &stale ) );

        let fired = next_fired( &mut rx ).await;
        assert_eq!( fired.epoch, second );
        assert!( timers.take_if_current( &fired ) );
    }


    #[tokio::test( start_paused = true )]
    async fn test_kinds_are_independent() {
        let ( tx, mut rx ) = mpsc::unbounded_channel();
        let mut timers = Timers::new( tx );

        timers.schedule( TimerKind::CuePlay, Duration::from_millis( 100 ) );
        timers.schedule( TimerKind::ErrorSkip, Duration::from_millis( 50 ) );

        assert_eq!( next_fired( &mut rx ).await.kind, TimerKind::ErrorSkip );
        assert_eq!( next_fired( &mut rx ).await.kind, TimerKind::CuePlay );
    }


    #[tokio::test( start_paused = true )]
    async fn test_cancel_all() {
        let ( tx, mut rx ) = mpsc::unbounded_channel();
        let mut timers = Timers::new( tx );

        timers.schedule( TimerKind::CuePlay, Duration::from_millis( 100 ) );
        timers.schedule( TimerKind::Metadata, Duration::from_millis( 100 ) );
        timers.cancel_all();

        tokio::time::sleep( Duration::from_secs( 1 ) ).await;
        assert!( rx.try_recv().is_err() );
    }
}
