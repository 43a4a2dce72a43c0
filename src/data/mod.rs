// Copyright 2013-2014 The rust-url developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Normalization data: source tables, the builder that serializes them, and
//! the loader that validates the serialized form and publishes it process-wide.
//!
//! The data blob is built once at first use and parsed back through the same
//! documented format the original data files use, so both the writer and the
//! reader side of the format are exercised. Readers share the parsed data
//! through a `OnceLock`; nothing is mutated after publication.

pub(crate) mod builder;
pub(crate) mod mapping;
pub(crate) mod nfc;

use std::sync::OnceLock;

use crate::normalizer::{DELTA_SHIFT, MAX_DELTA, MIN_NORMAL_MAYBE_YES};
use crate::trie::CodePointTrie;
use crate::ProcessingError;

pub(crate) struct NormalizerData {
    pub(crate) min_decomp_no_cp: u32,
    pub(crate) min_comp_no_maybe_cp: u32,
    pub(crate) min_yes_no: u16,
    pub(crate) min_yes_no_mappings_only: u16,
    pub(crate) min_no_no: u16,
    pub(crate) min_no_no_comp_boundary_before: u16,
    pub(crate) min_no_no_comp_no_maybe_cc: u16,
    pub(crate) min_no_no_empty: u16,
    pub(crate) limit_no_no: u16,
    pub(crate) center_no_no_delta: u16,
    pub(crate) min_maybe_yes: u16,
    pub(crate) trie: CodePointTrie,
    /// The `maybeYesCompositions` array; mappings and compositions for
    /// yes-no and no-no characters start at `extra_base`.
    pub(crate) extra: Vec<u16>,
    pub(crate) extra_base: usize,
    pub(crate) small_fcd: [u8; 256],
}

#[inline]
fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes([
        *bytes.get(at)?,
        *bytes.get(at + 1)?,
    ]))
}

#[inline]
fn read_i32(bytes: &[u8], at: usize) -> Option<i32> {
    Some(i32::from_le_bytes([
        *bytes.get(at)?,
        *bytes.get(at + 1)?,
        *bytes.get(at + 2)?,
        *bytes.get(at + 3)?,
    ]))
}

/// Parses and validates a serialized normalization data blob.
pub(crate) fn parse(blob: &[u8]) -> Result<NormalizerData, ProcessingError> {
    let err = ProcessingError::InvalidFormat;

    // DataHeader { MappedData { headerSize, magic1, magic2 }, UDataInfo }
    let header_size = read_u16(blob, 0).ok_or(err)? as usize;
    if header_size < builder::DATA_HEADER_SIZE
        || header_size & 3 != 0
        || blob.len() < header_size
        || blob[2] != builder::MAGIC1
        || blob[3] != builder::MAGIC2
    {
        return Err(err);
    }
    let info_size = read_u16(blob, 4).ok_or(err)? as usize;
    if info_size < 20 || blob[8] != 0 /* little-endian only */ {
        return Err(err);
    }
    if blob[12..16] != builder::DATA_FORMAT || blob[16] != builder::FORMAT_VERSION {
        return Err(err);
    }

    let bytes = &blob[header_size..];
    let trie_offset = read_i32(bytes, 4 * builder::IX_NORM_TRIE_OFFSET).ok_or(err)? as usize;
    if trie_offset / 4 <= builder::IX_MIN_LCCC_CP {
        return Err(err); // not enough indexes
    }
    let extra_offset = read_i32(bytes, 4 * builder::IX_EXTRA_DATA_OFFSET).ok_or(err)? as usize;
    let small_fcd_offset = read_i32(bytes, 4 * builder::IX_SMALL_FCD_OFFSET).ok_or(err)? as usize;
    if trie_offset > extra_offset
        || extra_offset > small_fcd_offset
        || bytes.len() < small_fcd_offset + 256
    {
        return Err(err);
    }

    let ix = |n: usize| read_i32(bytes, 4 * n).unwrap_or(0);

    let (trie, _consumed) = CodePointTrie::from_bytes(&bytes[trie_offset..extra_offset])?;

    let extra_bytes = &bytes[extra_offset..small_fcd_offset];
    if extra_bytes.len() & 1 != 0 {
        return Err(err);
    }
    let extra: Vec<u16> = extra_bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();

    let mut small_fcd = [0u8; 256];
    small_fcd.copy_from_slice(&bytes[small_fcd_offset..small_fcd_offset + 256]);

    let min_maybe_yes = ix(builder::IX_MIN_MAYBE_YES) as u16;
    // The mappings-and-compositions array starts after the compositions of
    // maybe-yes characters that combine both backward and forward.
    let extra_base = ((MIN_NORMAL_MAYBE_YES - min_maybe_yes) >> 1) as usize;
    if extra_base > extra.len() {
        return Err(err);
    }

    Ok(NormalizerData {
        min_decomp_no_cp: ix(builder::IX_MIN_DECOMP_NO_CP) as u32,
        min_comp_no_maybe_cp: ix(builder::IX_MIN_COMP_NO_MAYBE_CP) as u32,
        min_yes_no: ix(builder::IX_MIN_YES_NO) as u16,
        min_yes_no_mappings_only: ix(builder::IX_MIN_YES_NO_MAPPINGS_ONLY) as u16,
        min_no_no: ix(builder::IX_MIN_NO_NO) as u16,
        min_no_no_comp_boundary_before: ix(builder::IX_MIN_NO_NO_COMP_BOUNDARY_BEFORE) as u16,
        min_no_no_comp_no_maybe_cc: ix(builder::IX_MIN_NO_NO_COMP_NO_MAYBE_CC) as u16,
        min_no_no_empty: ix(builder::IX_MIN_NO_NO_EMPTY) as u16,
        limit_no_no: ix(builder::IX_LIMIT_NO_NO) as u16,
        center_no_no_delta: (min_maybe_yes >> DELTA_SHIFT) - MAX_DELTA - 1,
        min_maybe_yes,
        trie,
        extra,
        extra_base,
        small_fcd,
    })
}

/// The NFC profile, built and parsed on first use, immutable afterwards.
pub(crate) fn nfc_data() -> Result<&'static NormalizerData, ProcessingError> {
    static DATA: OnceLock<Result<NormalizerData, ProcessingError>> = OnceLock::new();
    DATA.get_or_init(|| parse(&builder::build_nfc_blob()))
        .as_ref()
        .map_err(|&e| e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trips() {
        let blob = builder::build_nfc_blob();
        let data = parse(&blob).unwrap();
        assert!(data.min_yes_no < data.min_yes_no_mappings_only);
        assert!(data.min_yes_no_mappings_only < data.min_no_no);
        assert!(data.min_no_no <= data.min_no_no_comp_boundary_before);
        assert!(data.min_no_no_comp_boundary_before <= data.min_no_no_comp_no_maybe_cc);
        assert!(data.min_no_no_comp_no_maybe_cc <= data.min_no_no_empty);
        assert_eq!(data.min_no_no_empty, data.limit_no_no);
        assert!(data.limit_no_no < data.min_maybe_yes);
        assert_eq!(data.min_decomp_no_cp, 0xc0);
        assert_eq!(data.min_comp_no_maybe_cp, 0x300);
    }

    #[test]
    fn corrupted_blob_is_rejected() {
        let mut blob = builder::build_nfc_blob();
        blob[12] ^= 0xff; // dataFormat
        assert!(parse(&blob).is_err());

        let mut blob = builder::build_nfc_blob();
        blob[16] = 3; // formatVersion: only 4 is supported
        assert!(parse(&blob).is_err());

        let blob = builder::build_nfc_blob();
        assert!(parse(&blob[..200]).is_err());
    }

    #[test]
    fn shared_instance_is_published_once() {
        let a = nfc_data().unwrap() as *const NormalizerData;
        let b = nfc_data().unwrap() as *const NormalizerData;
        assert_eq!(a, b);
    }
}
