use std::{collections::HashMap, time::Duration};

use common::actors::{Actor, ActorType, ControlMessage};
use futures_util::future::join_all;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

pub type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

const STALE_AFTER: Duration = Duration::from_secs(3);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Keeps one instance of every registered actor alive. An actor that stops
/// heartbeating or crashes is aborted and rebuilt from its factory.
pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    actor_ids: HashMap<Uuid, ActorType>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
    stale_after: Duration,
    shutdown_grace: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            actor_factories: HashMap::new(),
            actor_ids: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            stale_after: STALE_AFTER,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    /// Runs until `shutdown` fires, then waits up to the grace period for the
    /// actors (which watch the same token) to finish.
    pub async fn start(&mut self, shutdown: CancellationToken) {
        let mut check_interval = time::interval(Duration::from_secs(1));
        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor in actors {
            self.spawn_actor(actor, supervisor_tx.clone());
        }

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(id) => {
                            if let Some(&actor_type) = self.actor_ids.get(&id) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(id) => {
                            if let Some(actor_type) = self.actor_ids.remove(&id) {
                                warn!("{:?} is shutting down gracefully.", actor_type);
                                self.pulses.remove(&actor_type);
                            }
                        }
                        ControlMessage::Error(id, error_msg) => {
                            let Some(&actor_type) = self.actor_ids.get(&id) else {
                                continue;
                            };
                            error!("Actor {:?} reported error: {}", actor_type, error_msg);
                            let finished = self
                                .handles
                                .get(&actor_type)
                                .is_none_or(|h| h.is_finished());
                            if finished && !shutdown.is_cancelled() {
                                self.restart(actor_type, supervisor_tx.clone());
                            }
                        }
                    }
                }

                _ = check_interval.tick() => {
                    let deadline = Instant::now() - self.stale_after;
                    let dead_actors: Vec<ActorType> = self
                        .pulses
                        .iter()
                        .filter(|&(_, &last)| last < deadline)
                        .map(|(&actor_type, _)| actor_type)
                        .collect();

                    for actor_type in dead_actors {
                        warn!("{:?} is unresponsive!", actor_type);
                        self.restart(actor_type, supervisor_tx.clone());
                    }
                }
            }
        }

        info!("Shutdown requested, waiting for {} actors", self.handles.len());
        let handles: Vec<JoinHandle<()>> = self.handles.drain().map(|(_, h)| h).collect();
        if time::timeout(self.shutdown_grace, join_all(handles)).await.is_err() {
            warn!("Actors did not stop within {:?}", self.shutdown_grace);
        }
    }

    fn restart(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        if let Some(handle) = self.handles.remove(&actor_type) {
            handle.abort();
        }
        self.actor_ids.retain(|_, t| *t != actor_type);
        self.spawn_actor(actor_type, tx);
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            return;
        };
        let mut new_actor = factory();
        let id = new_actor.id();
        let new_actor_handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx.clone()).await {
                error!("Actor {:?} crashed: {}", actor_type, e);
                let _ = tx.send(ControlMessage::Error(id, e.to_string())).await;
            }
        });
        self.actor_ids.insert(id, actor_type);
        self.handles.insert(actor_type, new_actor_handle);
        self.pulses.insert(actor_type, Instant::now());
    }

    #[cfg(test)]
    fn with_timings(mut self, stale_after: Duration, shutdown_grace: Duration) -> Self {
        self.stale_after = stale_after;
        self.shutdown_grace = shutdown_grace;
        self
    }
}
