//! Cancellable periodic frame task.
//!
//! Stands in for an animation-frame loop: the callback runs once per tick
//! until it asks to stop or its [`CancelToken`] is cancelled. No timer state
//! lives outside the token.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Cancellation flag shared between a [`CancelToken`] and its callback.
///
/// On a multi-threaded runtime a callback can already be running when the
/// token is cancelled. Callbacks that publish state check the flag at the
/// point of publishing, under whatever lock guards the published value.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Handle to a running frame loop. Cancels the loop when dropped.
#[derive(Debug)]
pub struct CancelToken {
    flag: CancelFlag,
    handle: JoinHandle<()>,
}

impl CancelToken {
    /// Stop the loop. No callback starts after this returns, but one that
    /// is already running on another worker finishes its tick and sees
    /// [`CancelFlag::is_cancelled`] return true.
    pub fn cancel(&self) {
        self.flag.cancel();
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.is_cancelled()
    }

    /// True once the task has exited, by cancellation or by the callback.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CancelToken {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct FrameLoop;

impl FrameLoop {
    /// Spawn a loop calling `on_frame(elapsed, flag)` every `interval`.
    ///
    /// `elapsed` is measured from the start of the loop. `flag` is the
    /// loop's own cancellation flag. Returning `ControlFlow::Break` ends the
    /// loop from inside. Must be called from within a tokio runtime.
    pub fn start<F>(interval: Duration, mut on_frame: F) -> CancelToken
    where
        F: FnMut(Duration, &CancelFlag) -> ControlFlow<()> + Send + 'static,
    {
        let flag = CancelFlag::default();
        let seen = flag.clone();

        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if seen.is_cancelled() {
                    break;
                }
                if on_frame(start.elapsed(), &seen).is_break() {
                    break;
                }
            }
            log::trace!("frame loop exited");
        });

        CancelToken { flag, handle }
    }
}
