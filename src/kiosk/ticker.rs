//! Periodic screen furniture: the clock and the schedule banner.
//!
//! Each runs as its own task, publishes on its own `watch` channel and is
//! stopped on its own. Neither knows about the scan state machine.

use crate::attendance::ScheduleSummary;
use crate::kiosk::api::KioskApi;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A running periodic task and the latest value it produced
///
/// Dropping the ticker stops the task.
pub struct Ticker<T> {
    rx: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Ticker<T> {
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.rx.clone()
    }

    pub fn latest(&self) -> T
    where
        T: Clone,
    {
        self.rx.borrow().clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl<T> Drop for Ticker<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Wall clock, refreshed every `tick`
pub fn clock(tick: Duration) -> Ticker<DateTime<Local>> {
    let (tx, rx) = watch::channel(Local::now());

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if tx.send(Local::now()).is_err() {
                break;
            }
        }
    });

    Ticker { rx, task }
}

/// Class banner for the terminal's location, refreshed every `refresh`
///
/// A failed refresh keeps the previous banner on screen.
pub fn schedule_banner(api: Arc<dyn KioskApi>, refresh: Duration) -> Ticker<Option<ScheduleSummary>> {
    let (tx, rx) = watch::channel(None);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match api.current_schedule().await {
                Ok(schedule) => {
                    tx.send_if_modified(|current| {
                        if *current == schedule {
                            return false;
                        }
                        *current = schedule;
                        true
                    });
                }
                Err(e) => tracing::warn!(error = ?e, "schedule refresh failed"),
            }
            if tx.is_closed() {
                break;
            }
        }
    });

    Ticker { rx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::AttendanceAction;
    use crate::kiosk::api::fake::{self, FakeApi, Reply};
    use crate::kiosk::error::KioskError;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_banner_refreshes_and_survives_errors() {
        let api = Arc::new(FakeApi::new(Reply::Ok(fake::outcome(AttendanceAction::Entry)), Duration::ZERO));
        *api.banner.lock().unwrap() = Ok(Some(fake::schedule()));

        let banner = schedule_banner(api.clone(), Duration::from_secs(60));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(banner.latest(), Some(fake::schedule()));
        assert_eq!(api.calls(), 1);

        *api.banner.lock().unwrap() = Err(KioskError::Network("down".into()));
        sleep(Duration::from_secs(60)).await;
        assert_eq!(api.calls(), 2);
        assert_eq!(banner.latest(), Some(fake::schedule()));

        *api.banner.lock().unwrap() = Ok(None);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(banner.latest(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tickers_stop_independently() {
        let api = Arc::new(FakeApi::new(Reply::Ok(fake::outcome(AttendanceAction::Entry)), Duration::ZERO));
        let banner = schedule_banner(api.clone(), Duration::from_secs(60));
        let wall = clock(Duration::from_secs(1));
        let mut ticks = wall.subscribe();

        sleep(Duration::from_millis(10)).await;
        banner.stop();
        let calls = api.calls();

        sleep(Duration::from_secs(300)).await;
        assert_eq!(api.calls(), calls);

        // The clock keeps going
        ticks.borrow_and_update();
        sleep(Duration::from_secs(2)).await;
        assert!(ticks.has_changed().unwrap());
    }
}
