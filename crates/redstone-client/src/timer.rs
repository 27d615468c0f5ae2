//! A resettable single-shot timer; the keep-alive watchdog runs on one.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

type Callback = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

enum Command {
    Reset,
    Stop,
}

/// Fires its callback exactly once, `timeout` after the last `start`/`reset`,
/// unless stopped first.
pub struct Timer {
    timeout: Duration,
    callback: Callback,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl Timer {
    pub fn new<F, Fut>(timeout: Duration, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            timeout,
            callback: Arc::new(move || Box::pin(callback())),
            commands: Mutex::new(None),
        }
    }

    /// Arms the timer. A second `start` while armed does nothing.
    pub fn start(&self) {
        let mut guard = self.commands.lock().unwrap_or_else(|err| err.into_inner());
        if guard.is_some() {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        *guard = Some(tx);

        let callback = self.callback.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let mut due = Instant::now() + timeout;
            loop {
                tokio::select! {
                    _ = sleep_until(due) => {
                        callback().await;
                        break;
                    }
                    command = rx.recv() => match command {
                        Some(Command::Reset) => due = Instant::now() + timeout,
                        Some(Command::Stop) | None => break,
                    },
                }
            }
        });
    }

    /// Pushes the deadline out by the full timeout.
    pub fn reset(&self) {
        let guard = self.commands.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(Command::Reset);
        }
    }

    /// Cancels the timer. Idempotent, and safe after expiry.
    pub fn stop(&self) {
        let mut guard = self.commands.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(tx) = guard.take() {
            let _ = tx.send(Command::Stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_timer(timeout: Duration) -> (Timer, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        let timer = Timer::new(timeout, move || {
            let count = count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
        (timer, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_exactly_once() {
        let (timer, fired) = counting_timer(Duration::from_secs(20));
        timer.start();
        sleep(Duration::from_secs(19)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_extends_the_deadline() {
        let (timer, fired) = counting_timer(Duration::from_secs(20));
        timer.start();
        for _ in 0..5 {
            sleep(Duration::from_secs(15)).await;
            timer.reset();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sleep(Duration::from_secs(21)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_firing_and_is_idempotent() {
        let (timer, fired) = counting_timer(Duration::from_secs(20));
        timer.start();
        sleep(Duration::from_secs(10)).await;
        timer.stop();
        timer.stop();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        // Stop after expiry of a second run is also fine.
        timer.start();
        sleep(Duration::from_secs(21)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        timer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_does_not_rearm() {
        let (timer, fired) = counting_timer(Duration::from_secs(20));
        timer.start();
        sleep(Duration::from_secs(15)).await;
        timer.start(); // no-op: the original deadline stands
        sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
