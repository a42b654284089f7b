//! # Handler Registry
//!
//! Immutable map from queue identifier to the handler bound to it.
//!
//! Handlers are collected explicitly at startup through [`RegistryBuilder`]
//! and validated once in [`RegistryBuilder::build`]. The resulting
//! [`HandlerRegistry`] is never mutated, so the polling loop shares it
//! through an `Arc` without locking.
//!
//! ## Usage
//!
//! ```rust
//! use queue_dispatch::registry::{HandlerRegistry, QueueBinding};
//! use queue_dispatch::messaging::Message;
//! use queue_dispatch::consumer::BatchScope;
//!
//! # fn example() -> Result<(), queue_dispatch::registry::RegistryError> {
//! let registry = HandlerRegistry::builder()
//!     .register_fn(QueueBinding::new("orders"), |_scope: BatchScope, message: Message| async move {
//!         Ok(message.body.starts_with('{'))
//!     })
//!     .build()?;
//!
//! assert!(registry.resolve("orders").is_some());
//! assert!(registry.resolve("unknown").is_none());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::binding::QueueBinding;
use super::handler::{FnHandler, HandlerModule, MessageHandler};
use crate::consumer::scope::BatchScope;
use crate::messaging::message::Message;

/// Method invoked on every registered handler
const HANDLER_METHOD: &str = "handle";

/// Startup-time registration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Queue {queue_id} is bound to both {existing_handler} and {duplicate_handler}")]
    DuplicateBinding {
        queue_id: String,
        existing_handler: String,
        duplicate_handler: String,
    },

    #[error("Invalid binding for queue '{queue_id}': {reason}")]
    InvalidBinding { queue_id: String, reason: String },
}

impl RegistryError {
    pub fn invalid_binding(queue_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBinding {
            queue_id: queue_id.into(),
            reason: reason.into(),
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// A handler together with the binding it was registered under
#[derive(Clone)]
pub struct RegisteredHandler {
    pub binding: QueueBinding,
    pub handler: Arc<dyn MessageHandler>,
    pub handler_type: &'static str,
}

impl std::fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("binding", &self.binding)
            .field("handler_type", &self.handler_type)
            .finish()
    }
}

/// Collects registrations before the registry is frozen
#[derive(Default)]
pub struct RegistryBuilder {
    registrations: Vec<RegisteredHandler>,
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("registration_count", &self.registrations.len())
            .finish()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to a queue
    pub fn register<H: MessageHandler>(self, binding: QueueBinding, handler: H) -> Self {
        self.register_arc(binding, Arc::new(handler))
    }

    /// Bind an already shared handler to a queue
    pub fn register_arc(mut self, binding: QueueBinding, handler: Arc<dyn MessageHandler>) -> Self {
        let handler_type = handler.handler_name();
        self.registrations.push(RegisteredHandler {
            binding,
            handler,
            handler_type,
        });
        self
    }

    /// Bind an async closure to a queue
    pub fn register_fn<F, Fut>(self, binding: QueueBinding, f: F) -> Self
    where
        F: Fn(BatchScope, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.register(binding, FnHandler::new(f))
    }

    /// Let a module add its handlers
    pub fn module<M: HandlerModule + ?Sized>(self, module: &M) -> Self {
        module.register_handlers(self)
    }

    /// Number of registrations collected so far
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Validate every registration and freeze the registry.
    ///
    /// Emits one diagnostic record per binding.
    pub fn build(self) -> RegistryResult<HandlerRegistry> {
        let mut handlers: HashMap<String, RegisteredHandler> =
            HashMap::with_capacity(self.registrations.len());

        for registration in self.registrations {
            let queue_id = registration.binding.queue_id.clone();
            if queue_id.trim().is_empty() {
                return Err(RegistryError::invalid_binding(
                    queue_id,
                    "queue identifier cannot be empty",
                ));
            }
            if registration.binding.max_messages == 0 {
                return Err(RegistryError::invalid_binding(
                    queue_id,
                    "max_messages must be at least 1",
                ));
            }
            if let Some(existing) = handlers.get(&queue_id) {
                return Err(RegistryError::DuplicateBinding {
                    queue_id,
                    existing_handler: existing.handler_type.to_string(),
                    duplicate_handler: registration.handler_type.to_string(),
                });
            }

            info!(
                queue = %queue_id,
                handler_type = registration.handler_type,
                method = HANDLER_METHOD,
                max_messages = registration.binding.max_messages,
                "📋 Registered queue handler"
            );
            handlers.insert(queue_id, registration);
        }

        let mut queue_ids: Vec<String> = handlers.keys().cloned().collect();
        queue_ids.sort();

        debug!(handler_count = handlers.len(), "✅ Handler registry built");
        Ok(HandlerRegistry {
            handlers,
            queue_ids,
        })
    }
}

/// Read-only mapping from queue identifier to handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, RegisteredHandler>,
    queue_ids: Vec<String>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.handlers.len())
            .field("queue_ids", &self.queue_ids)
            .finish()
    }
}

impl HandlerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with no bindings
    pub fn empty() -> Self {
        Self::default()
    }

    /// Handler bound to `queue_id`, if any
    pub fn resolve(&self, queue_id: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers
            .get(queue_id)
            .map(|registered| registered.handler.clone())
    }

    /// Binding declared for `queue_id`, if any
    pub fn binding(&self, queue_id: &str) -> Option<&QueueBinding> {
        self.handlers
            .get(queue_id)
            .map(|registered| &registered.binding)
    }

    /// Full registration for `queue_id`, if any
    pub fn registration(&self, queue_id: &str) -> Option<&RegisteredHandler> {
        self.handlers.get(queue_id)
    }

    /// Registered queue identifiers in sorted order
    pub fn queue_ids(&self) -> &[String] {
        &self.queue_ids
    }

    /// Registered bindings in queue order
    pub fn bindings(&self) -> impl Iterator<Item = &QueueBinding> {
        self.queue_ids
            .iter()
            .filter_map(|queue_id| self.binding(queue_id))
    }

    pub fn has_handler(&self, queue_id: &str) -> bool {
        self.handlers.contains_key(queue_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
