//! PC/SC-backed card subsystem.

use std::ffi::CString;

use pcsc::{Attribute, Context, Protocols, Scope, ShareMode};
use tracing::trace;

use crate::subsystem::{CardConnection, CardFault, CardSubsystem, Protocol};

/// The platform smart-card service.
pub struct PcscSubsystem {
    context: Context,
}

impl PcscSubsystem {
    pub fn new() -> Result<Self, CardFault> {
        let context = Context::establish(Scope::User).map_err(CardFault::classify)?;
        Ok(Self { context })
    }
}

impl CardSubsystem for PcscSubsystem {
    type Card = PcscCard;

    fn reader_names(&self) -> Result<Vec<String>, CardFault> {
        let names = self
            .context
            .list_readers_owned()
            .map_err(CardFault::classify)?;
        Ok(names
            .into_iter()
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn connect(&self, reader: &str) -> Result<PcscCard, CardFault> {
        // a name the platform cannot encode matches no reader
        let reader = CString::new(reader).map_err(|_| CardFault::ReaderGone)?;
        let card = self
            .context
            .connect(&reader, ShareMode::Shared, Protocols::ANY)
            .map_err(CardFault::classify)?;
        let status = card.status2_owned().map_err(CardFault::classify)?;
        let protocol = match status.protocol2() {
            Some(pcsc::Protocol::T0) => Protocol::T0,
            Some(pcsc::Protocol::T1) => Protocol::T1,
            _ => return Err(CardFault::Transient(pcsc::Error::ProtoMismatch)),
        };
        Ok(PcscCard { card, protocol })
    }
}

/// A card connected over PC/SC. Dropping it disconnects with a card reset.
pub struct PcscCard {
    card: pcsc::Card,
    protocol: Protocol,
}

impl CardConnection for PcscCard {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn atr(&self) -> Result<Vec<u8>, CardFault> {
        self.card
            .get_attribute_owned(Attribute::AtrString)
            .map_err(CardFault::classify)
    }

    fn status(&self) -> Result<(), CardFault> {
        self.card
            .status2_owned()
            .map(|_| ())
            .map_err(CardFault::classify)
    }

    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, CardFault> {
        let mut buffer = [0; pcsc::MAX_BUFFER_SIZE];
        let response = self
            .card
            .transmit(command, &mut buffer)
            .map_err(CardFault::classify)?;
        trace!(
            command = %hex::encode(command),
            response = %hex::encode(response),
            "apdu exchange"
        );
        Ok(response.to_vec())
    }
}
