//! Resolving the configured reader name against the subsystem's enumeration.

use crate::subsystem::CardFault;

/// Why a session could not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    /// Reader enumeration failed or returned nothing.
    #[error("no card readers found")]
    NoReadersFound,
    /// The requested reader is not attached.
    #[error("reader not found: {0}")]
    ReaderNotFound(String),
    /// The polling worker could not be spawned.
    #[error("polling thread failed to start")]
    PollingThreadFailed,
    /// The platform card service rejected us before polling began.
    #[error("card subsystem failed: {0}")]
    Subsystem(#[from] CardFault),
}

/// Picks the reader to poll. An empty request selects the first reader
/// enumerated; anything else must match a listed name exactly.
pub fn select_reader(names: &[String], requested: &str) -> Result<String, StartError> {
    let Some(first) = names.first() else {
        return Err(StartError::NoReadersFound);
    };

    if requested.is_empty() {
        return Ok(first.clone());
    }

    names
        .iter()
        .find(|name| name.as_str() == requested)
        .cloned()
        .ok_or_else(|| StartError::ReaderNotFound(requested.to_owned()))
}
