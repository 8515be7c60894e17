use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

use crate::config::MaintenanceConfig;
use crate::error::Result;
use crate::VisitDb;

/// Handle to the background maintenance thread. Dropping it stops the thread.
pub struct MaintenanceHandle {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Signals the thread and waits for it to exit. A pass already running
    /// is allowed to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Closing the channel wakes the thread out of its wait
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("[MAINTENANCE] Thread panicked");
            }
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Starts the background maintenance thread.
/// First pass after `initial_delay`, then one every `interval`.
pub fn start_maintenance_thread(db: Arc<VisitDb>, config: &MaintenanceConfig) -> MaintenanceHandle {
    spawn_schedule(config.initial_delay(), config.interval(), move || db.perform_maintenance())
}

/// Runs `pass` on its own thread. A failed pass is logged and the schedule
/// carries on.
fn spawn_schedule<T, F>(initial_delay: Duration, interval: Duration, mut pass: F) -> MaintenanceHandle
where
    F: FnMut() -> Result<T> + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let worker = thread::spawn(move || {
        info!("[MAINTENANCE] Background thread started");
        let mut wait = initial_delay;
        loop {
            match stop_rx.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                // Explicit stop or handle dropped
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Err(e) = pass() {
                error!("[MAINTENANCE] Pass failed: {}", e);
            }
            wait = interval;
        }
        info!("[MAINTENANCE] Background thread stopped");
    });

    MaintenanceHandle { stop: Some(stop_tx), worker: Some(worker) }
}

/// Runs a single pass on the calling thread.
pub fn run_once(db: &VisitDb) -> bool {
    match db.perform_maintenance() {
        Ok(_) => true,
        Err(e) => {
            error!("[MAINTENANCE] Pass failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierConfig;
    use crate::model::{VisitRecord, VisitStatus};
    use crate::storage::MemoryStore;
    use crate::error::Error;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Mutex;
    use std::time::Instant;

    fn aged(id: &str, days: i64) -> VisitRecord {
        VisitRecord {
            id: id.into(),
            date: Some((Utc::now() - ChronoDuration::days(days)).date_naive()),
            status: Some(VisitStatus::Completed),
            ..Default::default()
        }
    }

    #[test]
    fn test_stop_returns_promptly() {
        let db = Arc::new(VisitDb::open(Arc::new(MemoryStore::new()), TierConfig::default()).unwrap());
        let handle = start_maintenance_thread(db, &MaintenanceConfig::default());

        let started = Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_schedule_survives_failed_pass() {
        let started = Instant::now();
        let passes = Arc::new(Mutex::new(Vec::new()));

        let recorded = passes.clone();
        let handle = spawn_schedule(Duration::from_millis(100), Duration::from_millis(20), move || {
            let mut recorded = recorded.lock().unwrap();
            recorded.push(started.elapsed());
            if recorded.len() == 2 {
                return Err(Error::Config("pass failed".into()));
            }
            Ok(())
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        while passes.lock().unwrap().len() < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        handle.stop();

        let passes = passes.lock().unwrap();
        assert!(passes.len() >= 4, "only {} passes ran", passes.len());
        assert!(passes[0] >= Duration::from_millis(100));
        // Each later pass waits a full interval after the previous one
        for pair in passes.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_no_pass_before_initial_delay() {
        let passes = Arc::new(Mutex::new(0));
        let counted = passes.clone();
        let handle = spawn_schedule(Duration::from_secs(60), Duration::from_millis(10), move || {
            *counted.lock().unwrap() += 1;
            Ok(())
        });

        thread::sleep(Duration::from_millis(100));
        handle.stop();
        assert_eq!(*passes.lock().unwrap(), 0);
    }

    #[test]
    fn test_pass_sweeps_near_capacity() {
        let config = TierConfig { max_active: 4, ..Default::default() };
        let db = VisitDb::open(Arc::new(MemoryStore::new()), config).unwrap();
        let bundle = crate::model::ExportBundle {
            active_visits: Some(vec![aged("a", 1), aged("b", 2), aged("c", 3), aged("d", 150)]),
            archived_visits: None,
            metadata: None,
            export_date: Utc::now(),
            version: None,
        };
        db.import_data(bundle).unwrap();

        assert!(run_once(&db));
        assert_eq!(db.active_visits().unwrap().len(), 3);
        assert_eq!(db.archived_visits().unwrap().len(), 1);
    }

    #[test]
    fn test_pass_leaves_quiet_store_alone() {
        let db = VisitDb::open(Arc::new(MemoryStore::new()), TierConfig::default()).unwrap();
        db.import_data(crate::model::ExportBundle {
            active_visits: Some(vec![aged("old", 150)]),
            archived_visits: None,
            metadata: None,
            export_date: Utc::now(),
            version: None,
        })
        .unwrap();

        // One record against a capacity of 500: below the sweep ratio
        let report = db.perform_maintenance().unwrap();
        assert_eq!(report.swept, 0);
        assert_eq!(db.active_visits().unwrap().len(), 1);
    }
}
