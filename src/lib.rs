//! Shared multi-view chat client for a hosted chatbot endpoint.
//!
//! DESIGN
//! ======
//! One [`store::ChatStore`] per tab owns the session, the message log, and
//! the loading/error flags. A [`dispatcher::ChatDispatcher`] runs each
//! send through the endpoint with per-attempt timeouts and exponential
//! backoff, then reconciles the reply into the store. Any number of
//! [`view::ChatView`]s subscribe to the store's change notifications and
//! keep their own render copy in sync.
//!
//! Around that core: env-driven config, a tab-scoped storage seam, a clock
//! seam for simulated time, transcript export, and demo share links.

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod export;
pub mod share;
pub mod storage;
pub mod store;
pub mod transport;
pub mod types;
pub mod view;

pub use config::ChatConfig;
pub use dispatcher::ChatDispatcher;
pub use error::{ChatError, ErrorKind};
pub use events::Subscription;
pub use store::ChatStore;
pub use types::{ChatHistory, Message, Session, SharedChatState, SyncEvent};
pub use view::{ChatView, ViewOptions};
