//! Traits over the platform smart-card service. The production implementation
//! lives in [`crate::backend`]; tests substitute scripted fakes.

/// Protocol negotiated for a card connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    T0,
    T1,
}

/// The failure classes the session reacts to. Every raw platform error
/// collapses into one of these: the card left the reader, the reader left the
/// system, or something transient worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CardFault {
    #[error("card removed")]
    Removed,
    #[error("reader gone")]
    ReaderGone,
    #[error("pc/sc error: {0}")]
    Transient(pcsc::Error),
}

impl CardFault {
    /// Buckets a raw platform error. `ReaderUnavailable` and `UnknownReader`
    /// both mean the reader is no longer usable and are treated alike.
    pub fn classify(err: pcsc::Error) -> Self {
        match err {
            pcsc::Error::RemovedCard => Self::Removed,
            pcsc::Error::ReaderUnavailable | pcsc::Error::UnknownReader => Self::ReaderGone,
            other => Self::Transient(other),
        }
    }
}

/// Access to the platform smart-card service: reader discovery and
/// connection establishment.
pub trait CardSubsystem {
    type Card: CardConnection;

    /// Names of the readers currently attached to the system.
    fn reader_names(&self) -> Result<Vec<String>, CardFault>;

    /// Connects to the card currently on `reader`.
    fn connect(&self, reader: &str) -> Result<Self::Card, CardFault>;
}

/// A live connection to a single card.
pub trait CardConnection {
    /// The protocol negotiated at connect time.
    fn protocol(&self) -> Protocol;

    /// The card's answer-to-reset, used to fingerprint the card model.
    fn atr(&self) -> Result<Vec<u8>, CardFault>;

    /// Checks that the card is still on the reader.
    fn status(&self) -> Result<(), CardFault>;

    /// Sends a command APDU and returns the raw response, status word
    /// included.
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, CardFault>;
}
