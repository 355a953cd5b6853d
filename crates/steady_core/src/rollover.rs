use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::clock::{self, Clock};
use crate::date_key::DateKey;

#[derive(Debug, Default)]
struct Signal {
    stopped: bool,
    forced: bool,
}

#[derive(Debug, Default)]
struct Shared {
    signal: Mutex<Signal>,
    wake: Condvar,
}

/// Re-arming timer that calls back at every local midnight.
///
/// Stopping (or dropping) the handle cancels the timer and joins its worker.
///
/// The wait is measured on the monotonic clock while the day comes from the
/// wall clock. After a suspend the callback fires late, and it can fire twice
/// near midnight with the old day first. Callers should only re-derive views
/// from it, never mutate state.
pub struct DayRollover {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl DayRollover {
    #[tracing::instrument(skip_all)]
    pub fn start<F>(clock: Arc<dyn Clock>, on_rollover: F) -> std::io::Result<Self>
    where
        F: FnMut(DateKey) + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("steady-rollover".into())
            .spawn(move || run(worker_shared, clock, on_rollover))?;
        info!("day rollover timer started");
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Fires the callback now instead of waiting for midnight.
    pub fn trigger(&self) {
        self.shared.signal.lock().forced = true;
        self.shared.wake.notify_one();
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.is_finished())
            .unwrap_or(false)
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.signal.lock().stopped = true;
        self.shared.wake.notify_one();
        if worker.join().is_err() {
            warn!("day rollover worker panicked");
        }
        debug!("day rollover timer stopped");
    }
}

impl Drop for DayRollover {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<F>(shared: Arc<Shared>, clock: Arc<dyn Clock>, mut on_rollover: F)
where
    F: FnMut(DateKey),
{
    let mut signal = shared.signal.lock();
    loop {
        if signal.stopped {
            break;
        }
        let timed_out = if signal.forced {
            false
        } else {
            let wait = clock::until_next_midnight(&clock.now());
            debug!(wait_secs = wait.as_secs(), "armed for next midnight");
            shared.wake.wait_for(&mut signal, wait).timed_out()
        };
        if signal.stopped {
            break;
        }
        let forced = std::mem::take(&mut signal.forced);
        if !timed_out && !forced {
            continue;
        }
        let today = clock.today();
        info!(day = %today, forced, "day rolled over");
        parking_lot::MutexGuard::unlocked(&mut signal, || on_rollover(today));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;
    use std::sync::mpsc;
    use std::time::Duration;

    fn fixed(date: NaiveDate) -> Arc<FixedClock> {
        Arc::new(FixedClock::on(date))
    }

    #[test]
    fn trigger_fires_with_the_clock_day() {
        let clock = fixed(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let (tx, rx) = mpsc::channel();
        let timer = DayRollover::start(clock.clone(), move |day| {
            let _ = tx.send(day);
        })
        .expect("spawn timer");

        timer.trigger();
        let first = rx.recv_timeout(Duration::from_secs(5)).expect("first fire");
        assert_eq!(first.to_string(), "2024-05-01");

        clock.set_day(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        timer.trigger();
        let second = rx.recv_timeout(Duration::from_secs(5)).expect("second fire");
        assert_eq!(second.to_string(), "2024-05-02");
        timer.stop();
    }

    #[test]
    fn stop_cancels_pending_fire() {
        let clock = fixed(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let (tx, rx) = mpsc::channel::<DateKey>();
        let timer = DayRollover::start(clock, move |day| {
            let _ = tx.send(day);
        })
        .expect("spawn timer");
        assert!(timer.is_running());
        timer.stop();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn replacing_a_timer_stops_the_old_one() {
        let clock = fixed(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let (tx, rx) = mpsc::channel();
        let old_tx = tx.clone();
        let mut slot = Some(
            DayRollover::start(clock.clone(), move |_| {
                let _ = old_tx.send("old");
            })
            .unwrap(),
        );
        let previous = slot.replace(
            DayRollover::start(clock, move |_| {
                let _ = tx.send("new");
            })
            .unwrap(),
        );
        drop(previous);
        if let Some(timer) = &slot {
            timer.trigger();
        }
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "new");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
