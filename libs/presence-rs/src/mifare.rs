//! User-record operations over a live card connection: sector
//! authentication, the identity record scan, and a diagnostic card dump.

use tracing::{debug, trace, warn};

use crate::{
    apdu::{self, KeyType, RecordStep, BLOCK_SIZE, USER_DATA_BLOCK},
    subsystem::{CardConnection, CardFault},
};

/// Outcome of the two-key authentication sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Authenticated(KeyType),
    Failed,
}

/// Reads one 16-byte block. `Ok(None)` when the card answers with anything
/// other than a full block, typically a bare status word on a block the
/// current grant does not cover.
pub fn read_block<C>(card: &mut C, block: u8) -> Result<Option<[u8; BLOCK_SIZE]>, CardFault>
where
    C: CardConnection + ?Sized,
{
    let response = card.transceive(&apdu::read_block_command(block))?;
    Ok(apdu::response_payload(&response).and_then(|payload| payload.try_into().ok()))
}

/// Runs the key A, then key B, authentication sequence for the user-data
/// sector. Each grant is probed with a read of the user-data block; the
/// card acknowledges an authenticate command regardless of whether the key
/// matched, so only the probe tells.
///
/// A hard transmit failure of an authenticate command fails the sequence
/// immediately. A probe read that comes back short or faulted moves on to
/// the next key.
pub fn authenticate<C>(card: &mut C) -> AuthResult
where
    C: CardConnection + ?Sized,
{
    debug!("authenticating");

    for key in [KeyType::A, KeyType::B] {
        if let Err(fault) = card.transceive(&apdu::authenticate_command(key)) {
            warn!("authenticate transmit failed: {}", fault);
            return AuthResult::Failed;
        }

        match read_block(card, USER_DATA_BLOCK) {
            Ok(Some(_)) => {
                debug!("authenticated with key {:?}", key);
                return AuthResult::Authenticated(key);
            }
            Ok(None) => {}
            Err(fault) => warn!("probe read failed: {}", fault),
        }
    }

    debug!("authentication failed");
    AuthResult::Failed
}

/// Scans the user-data blocks for the identity record, stopping at the
/// record terminator or once the blocks covering `max_len` bytes are
/// exhausted. An unreadable block ends the scan early; whatever text
/// accumulated by then still counts.
pub fn read_record<C>(card: &mut C, max_len: usize) -> String
where
    C: CardConnection + ?Sized,
{
    let mut record = String::new();

    for block in (USER_DATA_BLOCK..=u8::MAX).take(max_len.div_ceil(BLOCK_SIZE)) {
        match read_block(card, block) {
            Ok(Some(bytes)) => {
                if apdu::append_ascii_record(&mut record, &bytes) == RecordStep::Complete {
                    break;
                }
            }
            Ok(None) => {
                debug!("block {} unreadable, keeping partial record", block);
                break;
            }
            Err(fault) => {
                warn!("block {} read failed, keeping partial record: {}", block, fault);
                break;
            }
        }
    }

    record
}

/// Logs the first eight sectors block by block at trace level, each line
/// prefixed `sector-block`. Unreadable blocks are noted and skipped; a card
/// fault stops the dump.
pub fn dump_card<C>(card: &mut C)
where
    C: CardConnection + ?Sized,
{
    const DUMP_BLOCKS: u8 = 4 * 8;

    trace!("card dump");
    for block in 0..DUMP_BLOCKS {
        let (sector, index) = (block / 4, block % 4);
        match read_block(card, block) {
            Ok(Some(bytes)) => trace!("{:02}-{:02} {}", sector, index, hex::encode(bytes)),
            Ok(None) => trace!("{:02}-{:02} unreadable", sector, index),
            Err(fault) => {
                trace!("{:02}-{:02} {}", sector, index, fault);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::subsystem::Protocol;

    /// Pops one scripted reply per transceive and records every command.
    struct ScriptedCard {
        replies: VecDeque<Result<Vec<u8>, CardFault>>,
        sent: Vec<Vec<u8>>,
    }

    impl ScriptedCard {
        fn new(replies: impl IntoIterator<Item = Result<Vec<u8>, CardFault>>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl CardConnection for ScriptedCard {
        fn protocol(&self) -> Protocol {
            Protocol::T1
        }

        fn atr(&self) -> Result<Vec<u8>, CardFault> {
            Ok(Vec::new())
        }

        fn status(&self) -> Result<(), CardFault> {
            Ok(())
        }

        fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, CardFault> {
            self.sent.push(command.to_vec());
            self.replies
                .pop_front()
                .unwrap_or(Err(CardFault::Removed))
        }
    }

    fn status_word() -> Result<Vec<u8>, CardFault> {
        Ok(vec![0x90, 0x00])
    }

    fn full_block(fill: u8) -> Result<Vec<u8>, CardFault> {
        let mut raw = vec![fill; BLOCK_SIZE];
        raw.extend([0x90, 0x00]);
        Ok(raw)
    }

    fn record_block(text: &[u8]) -> Result<Vec<u8>, CardFault> {
        let mut raw = vec![0x00; BLOCK_SIZE];
        raw[0] = 0xd1;
        raw[7..7 + text.len()].copy_from_slice(text);
        raw.extend([0x90, 0x00]);
        Ok(raw)
    }

    #[test]
    fn test_read_block_strips_status_word() {
        let mut card = ScriptedCard::new([full_block(0xab)]);
        let block = read_block(&mut card, 9).unwrap().unwrap();
        assert_eq!(block, [0xab; BLOCK_SIZE]);
        assert_eq!(card.sent, vec![apdu::read_block_command(9).to_vec()]);
    }

    #[test]
    fn test_read_block_short_payload_is_none() {
        let mut card = ScriptedCard::new([Ok(vec![0x01, 0x02, 0x03, 0x90, 0x00])]);
        assert_eq!(read_block(&mut card, 4).unwrap(), None);
    }

    #[test]
    fn test_authenticate_with_key_a() {
        let mut card = ScriptedCard::new([status_word(), full_block(0x00)]);
        assert_eq!(
            authenticate(&mut card),
            AuthResult::Authenticated(KeyType::A)
        );
        assert_eq!(
            card.sent,
            vec![
                apdu::authenticate_command(KeyType::A).to_vec(),
                apdu::read_block_command(USER_DATA_BLOCK).to_vec(),
            ]
        );
    }

    #[test]
    fn test_authenticate_falls_back_to_key_b() {
        let mut card = ScriptedCard::new([
            status_word(),
            status_word(), // probe read yields no block under key A
            status_word(),
            full_block(0x00),
        ]);
        assert_eq!(
            authenticate(&mut card),
            AuthResult::Authenticated(KeyType::B)
        );
        assert_eq!(card.sent.len(), 4);
        assert_eq!(card.sent[2], apdu::authenticate_command(KeyType::B).to_vec());
    }

    #[test]
    fn test_authenticate_probe_fault_moves_to_next_key() {
        let mut card = ScriptedCard::new([
            status_word(),
            Err(CardFault::Transient(pcsc::Error::NoSmartcard)),
            status_word(),
            full_block(0x00),
        ]);
        assert_eq!(
            authenticate(&mut card),
            AuthResult::Authenticated(KeyType::B)
        );
    }

    #[test]
    fn test_authenticate_transmit_fault_fails_immediately() {
        let mut card = ScriptedCard::new([Err(CardFault::Transient(pcsc::Error::NoSmartcard))]);
        assert_eq!(authenticate(&mut card), AuthResult::Failed);
        assert_eq!(card.sent.len(), 1);
    }

    #[test]
    fn test_authenticate_never_probes_a_third_key() {
        let mut card = ScriptedCard::new([
            status_word(),
            status_word(),
            status_word(),
            status_word(),
        ]);
        assert_eq!(authenticate(&mut card), AuthResult::Failed);
        assert_eq!(card.sent.len(), 4);
    }

    #[test]
    fn test_read_record_single_block() {
        let mut card = ScriptedCard::new([record_block(b"bob")]);
        assert_eq!(read_record(&mut card, 256), "bob");
        assert_eq!(card.sent.len(), 1);
    }

    #[test]
    fn test_read_record_keeps_partial_text_on_fault() {
        let mut card = ScriptedCard::new([
            record_block(b"partialis"), // fills the block, no terminator
            Err(CardFault::Transient(pcsc::Error::NoSmartcard)),
        ]);
        assert_eq!(read_record(&mut card, 256), "partialis");
    }

    #[test]
    fn test_read_record_keeps_partial_text_on_short_read() {
        let mut card = ScriptedCard::new([record_block(b"partialis"), status_word()]);
        assert_eq!(read_record(&mut card, 256), "partialis");
    }

    #[test]
    fn test_read_record_malformed_payload_reads_empty() {
        // a record in a later block must not supply the identity
        let mut raw = vec![0x00; BLOCK_SIZE];
        raw[0] = 0xd1;
        raw[7] = 0xfe;
        raw.extend([0x90, 0x00]);
        let mut card = ScriptedCard::new([Ok(raw), record_block(b"leftover")]);
        assert_eq!(read_record(&mut card, 256), "");
        assert_eq!(card.sent.len(), 1);
    }

    #[test]
    fn test_read_record_block_limit() {
        // markerless blocks never complete the record, so the block limit is
        // the only bound: ceil(max_len / block) reads from the user block on
        let mut card = ScriptedCard::new((0..16).map(|_| full_block(0x00)));
        assert_eq!(read_record(&mut card, 256), "");
        assert_eq!(card.sent.len(), 16);
        assert_eq!(card.sent[0], apdu::read_block_command(4).to_vec());
        assert_eq!(card.sent[15], apdu::read_block_command(19).to_vec());

        let mut card = ScriptedCard::new((0..3).map(|_| full_block(0x00)));
        assert_eq!(read_record(&mut card, 40), "");
        assert_eq!(card.sent.len(), 3);

        let mut card = ScriptedCard::new([]);
        assert_eq!(read_record(&mut card, 0), "");
        assert_eq!(card.sent.len(), 0);
    }

    #[test]
    fn test_dump_card_walks_eight_sectors() {
        let mut card = ScriptedCard::new((0..32).map(|_| full_block(0xee)));
        dump_card(&mut card);
        assert_eq!(card.sent.len(), 32);
        assert_eq!(card.sent[0], apdu::read_block_command(0).to_vec());
        assert_eq!(card.sent[31], apdu::read_block_command(31).to_vec());
    }

    #[test]
    fn test_dump_card_stops_on_fault() {
        let mut card = ScriptedCard::new([full_block(0xee), Err(CardFault::Removed)]);
        dump_card(&mut card);
        assert_eq!(card.sent.len(), 2);
    }
}
