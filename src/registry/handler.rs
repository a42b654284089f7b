//! # Message Handlers
//!
//! The trait application code implements to process messages from a bound
//! queue, a closure adapter, and [`HandlerModule`] for registering a group of
//! handlers in one call.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::handler_registry::RegistryBuilder;
use crate::consumer::scope::BatchScope;
use crate::messaging::message::Message;

/// Processes messages received from one queue.
///
/// Return `Ok(true)` to have the message deleted. `Ok(false)` and `Err(_)`
/// both leave it on the queue to be redelivered once its visibility timeout
/// expires; an `Err` is additionally logged as a handler error.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, scope: &BatchScope, message: &Message) -> anyhow::Result<bool>;

    /// Name used in registration diagnostics
    fn handler_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Adapts an async closure into a [`MessageHandler`]
///
/// The closure receives owned copies of the scope and message so the
/// returned future can be `'static`.
pub struct FnHandler<F, Fut> {
    f: F,
    name: &'static str,
    _future: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(BatchScope, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            name: std::any::type_name::<F>(),
            _future: PhantomData,
        }
    }

    pub fn named(name: &'static str, f: F) -> Self {
        Self {
            f,
            name,
            _future: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F, Fut>
where
    F: Fn(BatchScope, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    async fn handle(&self, scope: &BatchScope, message: &Message) -> anyhow::Result<bool> {
        (self.f)(scope.clone(), message.clone()).await
    }

    fn handler_name(&self) -> &'static str {
        self.name
    }
}

/// Build a [`MessageHandler`] from an async closure
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F, Fut>
where
    F: Fn(BatchScope, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    FnHandler::new(f)
}

/// A group of handlers that registers itself.
///
/// Typically one module per application component:
///
/// ```rust
/// use queue_dispatch::consumer::BatchScope;
/// use queue_dispatch::messaging::Message;
/// use queue_dispatch::registry::{HandlerModule, MessageHandler, QueueBinding, RegistryBuilder};
///
/// struct BillingHandlers;
///
/// struct InvoiceCreated;
///
/// #[async_trait::async_trait]
/// impl MessageHandler for InvoiceCreated {
///     async fn handle(&self, _scope: &BatchScope, message: &Message) -> anyhow::Result<bool> {
///         Ok(!message.body.is_empty())
///     }
/// }
///
/// impl HandlerModule for BillingHandlers {
///     fn register_handlers(&self, builder: RegistryBuilder) -> RegistryBuilder {
///         builder.register(QueueBinding::new("invoices"), InvoiceCreated)
///     }
/// }
/// ```
pub trait HandlerModule {
    fn register_handlers(&self, builder: RegistryBuilder) -> RegistryBuilder;
}
