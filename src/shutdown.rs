use tokio::sync::watch;

/// Fires the shutdown signal for every `Shutdown` handed out by `channel`.
pub struct Trigger {
    tx: watch::Sender<bool>,
}

/// Observes the shutdown signal. Cheap to clone, one per task.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (Trigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (Trigger { tx }, Shutdown { rx })
}

impl Trigger {
    pub fn fire(&self) {
        // No receivers left means nothing is waiting to be stopped.
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// Resolves once the trigger fires or is dropped.
    pub async fn recv(&mut self) {
        let _ = self.rx.wait_for(|&fired| fired).await;
    }
}
