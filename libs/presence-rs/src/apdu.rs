//! Command templates and response decoding for the contactless reader.
//!
//! Commands follow the PC/SC pseudo-APDU set the ACR122U family exposes
//! (class `0xff`): READ BINARY for 16-byte blocks and GENERAL AUTHENTICATE
//! for MIFARE Classic sectors.

/// Bytes in one MIFARE block.
pub const BLOCK_SIZE: usize = 16;

/// First block of user data. Blocks 0–3 are the manufacturer sector.
pub const USER_DATA_BLOCK: u8 = 4;

/// Leading byte of an NFC well-known record header.
const WELL_KNOWN_RECORD: u8 = 0xd1;

/// Offset within a record's first block where text payload begins.
const TEXT_DATA_OFFSET: usize = 7;

const ASCII_MIN: u8 = 0x20;
const ASCII_MAX: u8 = 0x7e;

/// MIFARE Classic key slots for GENERAL AUTHENTICATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    A = 0x60,
    B = 0x61,
}

/// READ BINARY for one block.
#[must_use]
pub fn read_block_command(block: u8) -> [u8; 5] {
    [0xff, 0xb0, 0x00, block, BLOCK_SIZE as u8]
}

/// GENERAL AUTHENTICATE for the user-data block, using the key loaded in
/// volatile key slot 0.
#[must_use]
pub fn authenticate_command(key: KeyType) -> [u8; 10] {
    [
        0xff,
        0x86,
        0x00,
        0x00,
        0x05,
        0x01,
        0x00,
        USER_DATA_BLOCK,
        key as u8,
        0x00,
    ]
}

/// Strips the trailing 2-byte status word from a raw response. `None` when
/// the response is too short to carry one.
#[must_use]
pub fn response_payload(raw: &[u8]) -> Option<&[u8]> {
    raw.len().checked_sub(2).map(|len| &raw[..len])
}

/// Whether the block scan should read another block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStep {
    Continue,
    Complete,
}

/// Appends one block's worth of record text to `record`.
///
/// While `record` is empty the block is searched for a well-known-record
/// header byte before the text offset; on a hit, text begins at the fixed
/// text offset of the same block. From there printable ASCII accumulates
/// and the first non-printable byte completes the record, even one right
/// at the text offset: a malformed record reads as empty. Blocks before
/// the header leave the scan running.
pub fn append_ascii_record(record: &mut String, block: &[u8; BLOCK_SIZE]) -> RecordStep {
    let bytes = if record.is_empty() {
        if !block[..TEXT_DATA_OFFSET].contains(&WELL_KNOWN_RECORD) {
            return RecordStep::Continue;
        }
        &block[TEXT_DATA_OFFSET..]
    } else {
        &block[..]
    };

    for &byte in bytes {
        if (ASCII_MIN..=ASCII_MAX).contains(&byte) {
            record.push(byte as char);
        } else {
            return RecordStep::Complete;
        }
    }

    RecordStep::Continue
}
