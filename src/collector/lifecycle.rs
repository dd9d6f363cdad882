use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Running {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Tracks the tasks a collector spawned while running.
///
/// A fresh `CancellationToken` is minted on every `begin`, so a collector can
/// be restarted after `end` without inheriting a cancelled token.
#[derive(Default)]
pub struct Lifecycle {
    state: Mutex<Option<Running>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the run token, or `None` if already running.
    pub fn begin(&self) -> Option<CancellationToken> {
        let mut state = self.state.lock();
        if state.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *state = Some(Running {
            token: token.clone(),
            tasks: Vec::new(),
        });
        Some(token)
    }

    /// Attaches a task to the current run. Aborted immediately if not running.
    pub fn register(&self, task: JoinHandle<()>) {
        let mut state = self.state.lock();
        match state.as_mut() {
            Some(running) => {
                running.tasks.retain(|t| !t.is_finished());
                running.tasks.push(task);
            }
            None => task.abort(),
        }
    }

    /// Cancels the run token and aborts every registered task.
    /// Returns `false` if nothing was running.
    pub fn end(&self) -> bool {
        let Some(running) = self.state.lock().take() else {
            return false;
        };
        running.token.cancel();
        for task in running.tasks {
            task.abort();
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().is_some()
    }

    pub fn token(&self) -> Option<CancellationToken> {
        self.state.lock().as_ref().map(|r| r.token.clone())
    }

    pub fn active_tasks(&self) -> usize {
        self.state
            .lock()
            .as_ref()
            .map(|r| r.tasks.iter().filter(|t| !t.is_finished()).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_begin_and_end_are_idempotent() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.end(), "end before begin is a no-op");

        let token = lifecycle.begin().expect("first begin starts");
        assert!(lifecycle.begin().is_none(), "second begin is a no-op");

        let handle = tokio::spawn(async {
            std::future::pending::<()>().await;
        });
        lifecycle.register(handle);
        assert_eq!(lifecycle.active_tasks(), 1);

        assert!(lifecycle.end());
        assert!(token.is_cancelled());
        assert!(!lifecycle.is_running());
        assert!(!lifecycle.end());

        let restarted = lifecycle.begin().expect("restart after end");
        assert!(!restarted.is_cancelled());
    }
}
