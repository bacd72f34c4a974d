//! Notification fan-out for work unit transitions.
//!
//! Delivery is best-effort: the dispatcher reports what happened per
//! recipient and never fails a transition that was already committed.

#![warn(missing_docs)]

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod resolver;
pub mod template;

pub use channel::{ChannelError, LogChannel, MessageChannel, WebhookChannel};
pub use config::{ChannelConfig, NotifyConfig};
pub use dispatcher::{DispatchError, DispatchReport, Dispatcher, TransitionEvent};
pub use resolver::{DirectoryResolver, RecipientResolver};
pub use template::{TemplateContext, TemplateKind, TemplateSet};
