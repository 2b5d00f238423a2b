//! Card model detection from the answer-to-reset.
//!
//! The two tag models we provision have stable, distinguishable ATRs (see
//! <http://smartcard-atr.appspot.com>). The whole ATR is matched rather than
//! masking out the historical bytes.

/// NXP MIFARE Classic 1K.
pub const ATR_MIFARE_CLASSIC_1K: [u8; 20] = [
    0x3b, 0x8f, 0x80, 0x01, 0x80, 0x4f, 0x0c, 0xa0, 0x00, 0x00, 0x03, 0x06, 0x03, 0x00, 0x03,
    0x00, 0x00, 0x00, 0x00, 0x68,
];

/// NXP NTAG203.
pub const ATR_NTAG203: [u8; 20] = [
    0x3b, 0x8f, 0x80, 0x01, 0x80, 0x4f, 0x0c, 0xa0, 0x00, 0x00, 0x03, 0x06, 0x03, 0x00, 0x01,
    0x00, 0x00, 0x00, 0x00, 0x6a,
];

/// The card models the record reader knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardKind {
    #[default]
    Unspecified,
    MifareClassic1k,
    Ntag203,
}

impl CardKind {
    /// Matches an ATR against the known tag models. Anything unrecognized is
    /// [`CardKind::Unspecified`] and carries no readable identity.
    #[must_use]
    pub fn from_atr(atr: &[u8]) -> Self {
        if atr == ATR_MIFARE_CLASSIC_1K {
            Self::MifareClassic1k
        } else if atr == ATR_NTAG203 {
            Self::Ntag203
        } else {
            Self::Unspecified
        }
    }
}
