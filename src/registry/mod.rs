//! # Handler Registry
//!
//! Explicit registration of queue handlers.
//!
//! ```text
//! Registry
//! ├── QueueBinding      (queue identifier + batch-size hint)
//! ├── MessageHandler    (handler trait, closure adapter, modules)
//! └── HandlerRegistry   (immutable queue → handler map, built once)
//! ```

pub mod binding;
pub mod handler;
pub mod handler_registry;

pub use binding::QueueBinding;
pub use handler::{handler_fn, FnHandler, HandlerModule, MessageHandler};
pub use handler_registry::{
    HandlerRegistry, RegisteredHandler, RegistryBuilder, RegistryError, RegistryResult,
};
