//! Watches a PC/SC card reader for user identity cards.
//!
//! A [`CardSession`] polls one reader on a background thread, authenticates
//! and decodes the identity record of each card placed on it, and reports
//! arrivals, removals, and the loss of the reader to an [`EventSink`]. The
//! platform service is reached through [`PcscSubsystem`]; the
//! [`CardSubsystem`] and [`CardConnection`] traits keep the polling logic
//! testable without hardware.

pub mod apdu;
pub mod atr;
pub mod mifare;

mod backend;
mod reader;
mod session;
mod subsystem;

pub use backend::{PcscCard, PcscSubsystem};
pub use reader::StartError;
pub use session::{CardEvent, CardSession, EventSink, SessionConfig, GUEST_IDENTITY};
pub use subsystem::{CardConnection, CardFault, CardSubsystem, Protocol};
