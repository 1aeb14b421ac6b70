//! Pettag: recoverable digital identities for pets.
//!
//! A pet gets a permanent public code and a QR visual token pointing at its
//! public lookup URL. Anyone scanning the tag sees a redacted pet profile;
//! every scan and every finder report is recorded and fanned out to the
//! owner's configured alert channels.

pub mod api;
pub mod channels;
pub mod dispatch;
pub mod error;
pub mod lookup;
pub mod model;
pub mod sighting;
pub mod storage;
pub mod token;
