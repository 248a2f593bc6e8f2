use std::future::Future;

use tokio::task::JoinHandle;

/// The two scheduled tasks a live session owns.
///
/// Dropping the set aborts whatever is still scheduled, so removing a session from
/// the registry never leaves a countdown or autosave loop behind.
#[derive(Debug, Default)]
pub(crate) struct SessionTimers {
    countdown: Option<JoinHandle<()>>,
    autosave: Option<JoinHandle<()>>,
}

impl SessionTimers {
    pub(crate) fn start_countdown<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel_countdown();
        self.countdown = Some(tokio::spawn(task));
    }

    pub(crate) fn start_autosave<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel_autosave();
        self.autosave = Some(tokio::spawn(task));
    }

    pub(crate) fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    pub(crate) fn cancel_autosave(&mut self) {
        if let Some(handle) = self.autosave.take() {
            handle.abort();
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        self.cancel_countdown();
        self.cancel_autosave();
    }

    pub(crate) fn countdown_running(&self) -> bool {
        self.countdown.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub(crate) fn autosave_running(&self) -> bool {
        self.autosave.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
