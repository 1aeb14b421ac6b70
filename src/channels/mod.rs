//! Notification transport clients.
//!
//! Each channel is a thin HTTP client over an external provider. Clients are
//! constructed once at startup from explicit configuration and injected into
//! the dispatcher; an absent client means the channel is unconfigured and
//! every attempt on it records `skipped-unconfigured`.
//!
//! # Channels
//!
//! - [`email`]: transactional email API (recipient, subject, HTML body)
//! - [`messaging`]: WhatsApp Cloud API (text and structured location messages)
//!
//! Every request carries a bounded timeout so a hung provider can never hang
//! a dispatch.

pub mod email;
pub mod messaging;

pub use email::EmailClient;
pub use messaging::MessagingClient;

/// Upper bound on any single channel request.
pub(crate) const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
