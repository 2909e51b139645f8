use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Messages a countdown task sends to the engine that owns the giveaway.
#[derive(Debug)]
pub enum CountdownEvent {
    /// Announce `remaining`. The engine answers `false` to stop the countdown.
    Step {
        giveaway_id: Uuid,
        run_id: Uuid,
        remaining: u64,
        respond_to: oneshot::Sender<bool>,
    },
    /// The count reached zero and the giveaway should end.
    Elapsed { giveaway_id: Uuid, run_id: Uuid },
}

struct CountdownTask {
    run_id: Uuid,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// At most one countdown task per giveaway. Stopping a countdown signals the task
/// and waits for it to exit.
pub struct CountdownRegistry<M> {
    tasks: HashMap<Uuid, CountdownTask>,
    events_tx: mpsc::Sender<M>,
    step: Duration,
}

impl<M> CountdownRegistry<M>
where
    M: From<CountdownEvent> + Send + 'static,
{
    pub fn new(events_tx: mpsc::Sender<M>) -> Self {
        Self {
            tasks: HashMap::new(),
            events_tx,
            step: Duration::from_secs(1),
        }
    }

    /// Starts a fresh countdown, replacing any running one for the same giveaway.
    pub async fn start(&mut self, giveaway_id: Uuid, seconds: u64) -> Uuid {
        self.stop(giveaway_id).await;

        let run_id = Uuid::new_v4();
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_countdown(
            giveaway_id,
            run_id,
            seconds,
            self.step,
            self.events_tx.clone(),
            stop_rx,
        ));
        tracing::info!(giveaway.id = %giveaway_id, countdown.run = %run_id, seconds, "Final countdown started");
        self.tasks.insert(
            giveaway_id,
            CountdownTask {
                run_id,
                stop_tx,
                handle,
            },
        );
        run_id
    }

    pub fn is_current(&self, giveaway_id: Uuid, run_id: Uuid) -> bool {
        self.tasks
            .get(&giveaway_id)
            .is_some_and(|task| task.run_id == run_id)
    }

    /// Forgets a countdown that finished by itself. Returns whether it was current.
    pub fn finish(&mut self, giveaway_id: Uuid, run_id: Uuid) -> bool {
        if self.is_current(giveaway_id, run_id) {
            self.tasks.remove(&giveaway_id);
            true
        } else {
            false
        }
    }

    /// Returns whether a countdown was running.
    pub async fn stop(&mut self, giveaway_id: Uuid) -> bool {
        let Some(task) = self.tasks.remove(&giveaway_id) else {
            return false;
        };
        let _ = task.stop_tx.send(());
        if let Err(e) = task.handle.await {
            tracing::warn!(giveaway.id = %giveaway_id, error = %e, "Countdown task ended abnormally");
        }
        tracing::debug!(giveaway.id = %giveaway_id, countdown.run = %task.run_id, "Final countdown stopped");
        true
    }

    pub async fn stop_all(&mut self) {
        let ids: Vec<Uuid> = self.tasks.keys().copied().collect();
        for id in ids {
            self.stop(id).await;
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

async fn run_countdown<M>(
    giveaway_id: Uuid,
    run_id: Uuid,
    seconds: u64,
    step: Duration,
    events_tx: mpsc::Sender<M>,
    mut stop_rx: oneshot::Receiver<()>,
) where
    M: From<CountdownEvent> + Send + 'static,
{
    for remaining in (1..=seconds).rev() {
        let (respond_to, reply) = oneshot::channel();
        let event = CountdownEvent::Step {
            giveaway_id,
            run_id,
            remaining,
            respond_to,
        };
        tokio::select! {
            biased;
            _ = &mut stop_rx => return,
            sent = events_tx.send(M::from(event)) => {
                if sent.is_err() {
                    return;
                }
            }
        }
        let keep_going = tokio::select! {
            biased;
            _ = &mut stop_rx => return,
            answer = reply => answer.unwrap_or(false),
        };
        if !keep_going {
            tracing::debug!(giveaway.id = %giveaway_id, "Countdown aborted by engine");
            return;
        }
        tokio::select! {
            biased;
            _ = &mut stop_rx => return,
            _ = tokio::time::sleep(step) => {}
        }
    }

    tokio::select! {
        biased;
        _ = &mut stop_rx => {}
        _ = events_tx.send(M::from(CountdownEvent::Elapsed { giveaway_id, run_id })) => {}
    }
}
