//! Test handlers.

use async_trait::async_trait;
use parking_lot::Mutex;

use queue_dispatch::consumer::BatchScope;
use queue_dispatch::messaging::Message;
use queue_dispatch::registry::MessageHandler;

/// Behaves according to the message body:
///
/// - `fail...`  → `Err`
/// - `panic...` → panics
/// - `false...` → `Ok(false)`
/// - anything else → `Ok(true)`
#[derive(Debug, Default)]
pub struct ScriptedHandler {
    calls: Mutex<Vec<String>>,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl MessageHandler for ScriptedHandler {
    async fn handle(&self, _scope: &BatchScope, message: &Message) -> anyhow::Result<bool> {
        self.calls.lock().push(message.body.clone());
        let body = message.body.as_str();
        if body.starts_with("fail") {
            anyhow::bail!("scripted failure for {body}");
        }
        if body.starts_with("panic") {
            panic!("scripted panic for {body}");
        }
        Ok(!body.starts_with("false"))
    }
}
