use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Arguments used across the suites: two numbers and a label.
pub type Sample = (i32, i32, String);

#[must_use]
pub fn sample(a: i32, b: i32, label: &str) -> Sample {
    (a, b, label.to_owned())
}

/// Shared log for single-threaded handlers.
pub type Log<T> = Rc<RefCell<Vec<T>>>;

#[must_use]
pub fn log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

/// Shared log for handlers that may run on other threads.
pub type SyncLog<T> = Arc<Mutex<Vec<T>>>;

#[must_use]
pub fn sync_log<T>() -> SyncLog<T> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of a [`SyncLog`].
///
/// # Panics
/// * If a handler panicked while holding the log.
#[must_use]
pub fn entries<T: Clone>(log: &SyncLog<T>) -> Vec<T> {
    log.lock().expect("log poisoned").clone()
}

/// Polls `condition` every few milliseconds until it holds or two seconds pass.
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    condition()
}
