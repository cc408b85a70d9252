use tokio::sync::watch;

/// Whether the watcher service is running, observable from UI code
#[derive(Debug, Clone)]
pub struct RunningState {
    tx: watch::Sender<bool>,
}

impl RunningState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn is_running(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn set(&self, running: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != running;
            *current = running;
            changed
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for RunningState {
    fn default() -> Self {
        Self::new()
    }
}
