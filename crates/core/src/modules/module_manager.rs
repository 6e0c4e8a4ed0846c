use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};

/// Capacity of each module's event queue and of the shared message queue.
const CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module {0:?} is not running")]
    NotRunning(ModuleId),

    #[error("module {0:?} event queue is full")]
    QueueFull(ModuleId),

    #[error("module manager is already running")]
    AlreadyRunning,

    #[error("module {id:?} failed to initialize: {reason}")]
    Initialize { id: ModuleId, reason: String },
}

/// A started module: its event queue and the task running it.
struct RunningModule {
    events: mpsc::Sender<ModuleEvent>,
    task: JoinHandle<()>,
}

/// Owns the registered modules, runs each on its own task and routes events
/// to them. Modules report back through a single shared message queue.
pub struct ModuleManager {
    pending: HashMap<ModuleId, Box<dyn AsyncModule>>,
    running: HashMap<ModuleId, RunningModule>,
    message_receiver: Option<mpsc::Receiver<ModuleMessage>>,
    message_sender: mpsc::Sender<ModuleMessage>,
}

impl ModuleManager {
    pub fn new() -> Self {
        let (message_sender, message_receiver) = mpsc::channel(CHANNEL_CAPACITY);

        Self {
            pending: HashMap::new(),
            running: HashMap::new(),
            message_receiver: Some(message_receiver),
            message_sender,
        }
    }

    /// Register a module. A second module with the same id replaces the
    /// first.
    pub fn register_module(&mut self, module: Box<dyn AsyncModule>) {
        let id = module.id();
        if self.pending.insert(id.clone(), module).is_some() {
            log::warn!("Module {:?} registered twice, keeping the last one", id);
        }
    }

    /// Initialize every registered module, stopping at the first failure.
    pub async fn initialize(&mut self) -> Result<(), ModuleError> {
        for (id, module) in &mut self.pending {
            module
                .initialize()
                .await
                .map_err(|e| ModuleError::Initialize {
                    id: id.clone(),
                    reason: e.to_string(),
                })?;
            log::info!("Module {:?} initialized", id);
        }
        Ok(())
    }

    /// Start every registered module on its own task. A module's `shutdown`
    /// runs on the same task once its `run` loop returns.
    pub fn start(&mut self) -> Result<(), ModuleError> {
        if self.is_running() {
            return Err(ModuleError::AlreadyRunning);
        }

        for (id, mut module) in std::mem::take(&mut self.pending) {
            let (events, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
            let messages = self.message_sender.clone();
            let module_id = id.clone();

            let task = tokio::spawn(async move {
                if let Err(e) = module.run(event_rx, messages.clone()).await {
                    let _ = messages
                        .send(ModuleMessage::Error(format!(
                            "Module {:?} error: {}",
                            module_id, e
                        )))
                        .await;
                }
                if let Err(e) = module.shutdown().await {
                    log::error!("Module {:?} shutdown error: {}", module_id, e);
                }
            });

            log::info!("Module {:?} started", id);
            self.running.insert(id, RunningModule { events, task });
        }

        Ok(())
    }

    /// Send an event to a module, waiting for room in its queue.
    pub async fn send_to_module(
        &self,
        module_id: ModuleId,
        event: ModuleEvent,
    ) -> Result<(), ModuleError> {
        let module = self
            .running
            .get(&module_id)
            .ok_or_else(|| ModuleError::NotRunning(module_id.clone()))?;
        module
            .events
            .send(event)
            .await
            .map_err(|_| ModuleError::NotRunning(module_id))
    }

    /// Send an event without waiting. Used for note traffic, where a late
    /// event is worth less than a stalled router.
    pub fn try_send_to_module(
        &self,
        module_id: ModuleId,
        event: ModuleEvent,
    ) -> Result<(), ModuleError> {
        let module = self
            .running
            .get(&module_id)
            .ok_or_else(|| ModuleError::NotRunning(module_id.clone()))?;
        module.events.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ModuleError::QueueFull(module_id),
            mpsc::error::TrySendError::Closed(_) => ModuleError::NotRunning(module_id),
        })
    }

    /// Broadcast an event to all running modules
    pub async fn broadcast_event(&self, event: ModuleEvent) {
        for (id, module) in &self.running {
            if module.events.send(event.clone()).await.is_err() {
                log::warn!("Module {:?} stopped before receiving {:?}", id, event);
            }
        }
    }

    /// Get the message receiver (should only be called once)
    pub fn take_message_receiver(&mut self) -> Option<mpsc::Receiver<ModuleMessage>> {
        self.message_receiver.take()
    }

    /// Ask every module to stop and wait for their tasks to finish.
    pub async fn shutdown(&mut self) {
        if !self.is_running() {
            return;
        }

        log::info!("Shutting down modules...");
        self.broadcast_event(ModuleEvent::Shutdown).await;

        for (id, module) in std::mem::take(&mut self.running) {
            if let Err(e) = module.task.await {
                log::error!("Module {:?} task failed: {}", id, e);
            }
        }

        log::info!("All modules stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.running.is_empty()
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::messages::LightingCommand;

    struct EchoModule {
        shut_down: Arc<AtomicBool>,
        fail_init: bool,
    }

    impl EchoModule {
        fn new(shut_down: Arc<AtomicBool>) -> Self {
            Self {
                shut_down,
                fail_init: false,
            }
        }
    }

    #[async_trait]
    impl AsyncModule for EchoModule {
        fn id(&self) -> ModuleId {
            ModuleId::Lighting
        }

        async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if self.fail_init {
                return Err("no device".into());
            }
            Ok(())
        }

        async fn run(
            &mut self,
            mut rx: mpsc::Receiver<ModuleEvent>,
            tx: mpsc::Sender<ModuleMessage>,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            while let Some(event) = rx.recv().await {
                match event {
                    ModuleEvent::Shutdown => break,
                    other => {
                        let _ = tx.send(ModuleMessage::Event(other)).await;
                    }
                }
            }
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.shut_down.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn status(&self) -> HashMap<String, String> {
            HashMap::new()
        }
    }

    #[tokio::test]
    async fn test_route_event_and_shutdown() {
        let shut_down = Arc::new(AtomicBool::new(false));
        let mut manager = ModuleManager::new();
        manager.register_module(Box::new(EchoModule::new(shut_down.clone())));
        manager.initialize().await.unwrap();
        manager.start().unwrap();
        assert!(manager.is_running());
        assert!(matches!(manager.start(), Err(ModuleError::AlreadyRunning)));

        let mut rx = manager.take_message_receiver().unwrap();
        manager
            .send_to_module(
                ModuleId::Lighting,
                ModuleEvent::Lighting(LightingCommand::SetBlackout(true)),
            )
            .await
            .unwrap();
        manager
            .try_send_to_module(
                ModuleId::Lighting,
                ModuleEvent::Lighting(LightingCommand::SetDecayMs(300.0)),
            )
            .unwrap();

        match rx.recv().await {
            Some(ModuleMessage::Event(ModuleEvent::Lighting(LightingCommand::SetBlackout(
                true,
            )))) => {}
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(matches!(
            rx.recv().await,
            Some(ModuleMessage::Event(ModuleEvent::Lighting(
                LightingCommand::SetDecayMs(_)
            )))
        ));

        manager.shutdown().await;
        assert!(!manager.is_running());
        assert!(shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_send_to_unknown_module() {
        let manager = ModuleManager::new();
        assert!(matches!(
            manager
                .send_to_module(ModuleId::Midi, ModuleEvent::Shutdown)
                .await,
            Err(ModuleError::NotRunning(ModuleId::Midi))
        ));
        assert!(manager
            .try_send_to_module(ModuleId::Midi, ModuleEvent::Shutdown)
            .is_err());
    }

    #[tokio::test]
    async fn test_initialize_failure_names_module() {
        let mut manager = ModuleManager::new();
        manager.register_module(Box::new(EchoModule {
            shut_down: Arc::new(AtomicBool::new(false)),
            fail_init: true,
        }));

        match manager.initialize().await {
            Err(ModuleError::Initialize { id, reason }) => {
                assert_eq!(id, ModuleId::Lighting);
                assert_eq!(reason, "no device");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
