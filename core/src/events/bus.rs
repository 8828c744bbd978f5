use std::sync::Mutex;

use tokio::sync::mpsc;

use super::{GameSignal, SignalHandler};

/// Fan-out of signals to registered handlers and channel subscribers.
///
/// Dispatch happens with no other tracker lock held. Subscribers whose
/// receiver was dropped are pruned on the next dispatch.
#[derive(Default)]
pub struct SignalBus {
    handlers: Mutex<Vec<Box<dyn SignalHandler + Send>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<GameSignal>>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: Box<dyn SignalHandler + Send>) {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handler);
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<GameSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    pub fn dispatch(&self, signals: Vec<GameSignal>) {
        if signals.is_empty() {
            return;
        }
        for handler in self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter_mut()
        {
            handler.handle_signals(&signals);
        }

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| signals.iter().all(|s| tx.send(s.clone()).is_ok()));
    }
}
