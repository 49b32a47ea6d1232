//! Supervised background tasks started by [`Container::go`](super::Container::go).

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;

use super::ContainerError;
use crate::config::BoxError;

/// Join handles of every task that has not been waited for.
#[derive(Debug, Default)]
pub(crate) struct TaskTracker {
    handles: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicUsize,
}

impl TaskTracker {
    /// Runs `task` on a named thread. Errors and panics are logged, never
    /// propagated to the caller or to other tasks.
    pub fn spawn<F>(&self, task: F) -> Result<(), ContainerError>
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("container-task-{id}");
        let thread_name = name.clone();

        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => tracing::debug!(task = %name, "task finished"),
                Ok(Err(e)) => tracing::error!(task = %name, error = %e, "task failed"),
                Err(payload) => {
                    tracing::error!(task = %name, panic = %panic_message(payload.as_ref()), "task panicked")
                }
            })
            .map_err(ContainerError::Spawn)?;

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        // reap finished tasks
        for finished in extract_finished(&mut handles) {
            let _ = finished.join();
        }
        handles.push(handle);
        tracing::debug!(task = id, running = handles.len(), "task spawned");
        Ok(())
    }

    /// Joins every task, including ones spawned while waiting.
    pub fn wait(&self) {
        loop {
            let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                // panics are caught inside the thread
                let _ = handle.join();
            }
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn extract_finished(handles: &mut Vec<JoinHandle<()>>) -> Vec<JoinHandle<()>> {
    let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(handles).into_iter().partition(|h| h.is_finished());
    *handles = running;
    finished
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<unknown panic>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_panicking_task_does_not_affect_others() {
        let tracker = TaskTracker::default();
        let done = Arc::new(AtomicUsize::new(0));

        tracker.spawn(|| panic!("boom")).unwrap();
        for _ in 0..3 {
            let done = Arc::clone(&done);
            tracker
                .spawn(move || {
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        tracker.spawn(|| Err("failed".into())).unwrap();

        tracker.wait();
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.tracked(), 0);
    }

    #[test]
    fn test_spawn_joins_finished_tasks() {
        let tracker = TaskTracker::default();
        for _ in 0..8 {
            tracker.spawn(|| Ok(())).unwrap();
        }
        while tracker
            .handles
            .lock()
            .unwrap()
            .iter()
            .any(|h| !h.is_finished())
        {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let (release, blocked) = std::sync::mpsc::channel::<()>();
        tracker
            .spawn(move || {
                let _ = blocked.recv();
                Ok(())
            })
            .unwrap();
        assert_eq!(tracker.tracked(), 1);

        release.send(()).unwrap();
        tracker.wait();
        assert_eq!(tracker.tracked(), 0);
    }

    #[test]
    fn test_panic_message() {
        let payload = catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload = catch_unwind(|| panic!("formatted {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 1");

        let payload = catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "<unknown panic>");
    }
}
