use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, TryRecvError};

/// Runs a callback every `interval` on a dedicated timer thread until
/// cancelled.
///
/// The callback runs on the timer thread, so it should only hand work off
/// (e.g. spawn a thread) rather than block. Once `cancel` returns, the
/// callback is never invoked again.
pub struct RepeatingTask {
    interval: Duration,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    /// Schedules `task`; the first invocation happens one `interval` from now.
    pub fn spawn(interval: Duration, task: impl Fn() + Send + 'static) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = std::thread::spawn(move || {
            let ticker = crossbeam_channel::tick(interval);
            loop {
                crossbeam_channel::select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        // select! picks randomly when both are ready.
                        if let Err(TryRecvError::Disconnected) = stop_rx.try_recv() {
                            break;
                        }
                        task();
                    }
                }
            }
        });

        Self {
            interval,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stops the timer and waits for the timer thread to exit.
    pub fn cancel(&mut self) {
        // Dropping the sender disconnects the stop channel.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Timer thread panicked");
            }
        }
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
