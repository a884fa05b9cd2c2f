use std::{collections::HashMap, future::Future, hash::Hash, sync::Arc};

use tokio::sync::{
    watch::{channel as watch_channel, Receiver, Sender},
    RwLock,
};

use crate::{CoalescerConfig, Error};

type Broadcast<Value> = Receiver<Option<Result<Arc<Value>, Error>>>;

/// One in-flight call, alive between registration and completion.
///
/// The generation guards deregistration: after a `forget`, a newer call
/// may own the same id, and only the call that created a registration is
/// allowed to remove it.
#[derive(Debug)]
struct Call<Value> {
    generation: u64,
    receiver: Broadcast<Value>,
}

#[derive(Debug)]
struct Registry<Id, Value> {
    calls: HashMap<Id, Call<Value>>,
    next_generation: u64,
}

impl<Id: Hash + Eq + Clone, Value> Registry<Id, Value> {
    fn register(&mut self, id: Id, receiver: Broadcast<Value>) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;

        self.calls.insert(
            id,
            Call {
                generation,
                receiver,
            },
        );

        generation
    }
}

impl<Id, Value> Default for Registry<Id, Value> {
    fn default() -> Self {
        Self {
            calls: HashMap::new(),
            next_generation: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Coalescer<Id: Hash + Eq, Value> {
    config: Arc<CoalescerConfig>,
    registry: Arc<RwLock<Registry<Id, Value>>>,
}

impl<Id: Hash + PartialEq + Eq + Clone, Value> Coalescer<Id, Value> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: CoalescerConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(RwLock::new(Registry::default())),
        }
    }

    async fn wait_for(&self, mut receiver: Broadcast<Value>) -> Result<Arc<Value>, Error> {
        receiver
            .wait_for(|v| v.is_some())
            .await
            .map_err(|_| Error::RecvError)
            .and_then(|r| r.clone().unwrap())
    }

    /// Run `func` for `id`, or join the call already running for it.
    ///
    /// Every caller that joined the same call receives the same
    /// `Arc<Value>`; `func` runs exactly once per call generation.
    pub async fn execute<F: FnOnce() -> Fut, Fut: Future<Output = Value>>(
        &self,
        id: Id,
        func: F,
    ) -> Result<Arc<Value>, Error> {
        // Look up or register under one lock hold; anything less lets two
        // calls race into existence for the same id.
        let lead = {
            let mut registry = self.registry.write().await;

            if let Some(call) = registry.calls.get(&id) {
                Err(call.receiver.clone())
            } else {
                match self.config.max_concurrent {
                    Some(max_concurrent) if registry.calls.len() >= max_concurrent => {
                        return Err(Error::MaxConcurrent)
                    }
                    _ => {}
                }

                let (send, recv) = watch_channel(None);
                let generation = registry.register(id.clone(), recv);
                Ok((send, generation))
            }
        };

        match lead {
            Err(receiver) => self.wait_for(receiver).await,
            Ok((send, generation)) => self.execute_and_broadcast(id, generation, send, func).await,
        }
    }

    async fn execute_and_broadcast<F: FnOnce() -> Fut, Fut: Future<Output = Value>>(
        &self,
        id: Id,
        generation: u64,
        send: Sender<Option<Result<Arc<Value>, Error>>>,
        func: F,
    ) -> Result<Arc<Value>, Error> {
        let value = Ok(Arc::new(func().await));

        send.send_modify(|opt| {
            opt.replace(value.clone());
        });

        self.deregister(&id, generation).await;

        value
    }

    /// Remove the registration for `id`, but only if this call still owns it.
    async fn deregister(&self, id: &Id, generation: u64) {
        let mut registry = self.registry.write().await;

        if registry
            .calls
            .get(id)
            .is_some_and(|call| call.generation == generation)
        {
            registry.calls.remove(id);
        }
    }

    /// Detach the registered call for `id` without waiting for it.
    ///
    /// Waiters that already joined keep their receivers and still observe
    /// the result; the next `execute` for `id` starts a fresh call.
    pub async fn forget(&self, id: &Id) {
        self.registry.write().await.calls.remove(id);
    }

    pub async fn current_task_count(&self) -> usize {
        self.registry.read().await.calls.len()
    }
}

impl<Id: Hash + PartialEq + Eq + Clone, Value> Default for Coalescer<Id, Value> {
    fn default() -> Self {
        Self::from_config(CoalescerConfig::default())
    }
}
