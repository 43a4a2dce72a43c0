// Copyright 2013-2014 The rust-url developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Assembles the serialized normalization data from the source tables.
//!
//! This is the in-process equivalent of the offline data compiler: it closes
//! the raw decompositions to NFD, inverts the non-excluded pairs into
//! composition lists, assigns each code point a Norm16 value in the band
//! layout the normalizer expects, builds the code point trie and serializes
//! everything into the documented binary form (data header, `int32` indexes,
//! trie, `uint16` extra data, `smallFCD` bit table).

use std::collections::{HashMap, HashSet};

use super::nfc::{ccc, COMPOSITION_EXCLUSIONS, DECOMPOSITIONS};
use crate::normalizer::{
    COMP_1_LAST_TUPLE, COMP_1_TRAIL_LIMIT, COMP_1_TRAIL_SHIFT, COMP_1_TRIPLE, COMP_2_TRAIL_MASK,
    COMP_2_TRAIL_SHIFT, HANGUL_BASE, HANGUL_LIMIT, INERT, JAMO_L, JAMO_L_BASE, JAMO_L_COUNT,
    JAMO_T_BASE, JAMO_T_COUNT, JAMO_VT, JAMO_V_BASE, JAMO_V_COUNT, MAPPING_HAS_CCC_LCCC_WORD,
    MIN_NORMAL_MAYBE_YES,
};
use crate::trie;

/// Byte offsets of the pieces inside the assembled blob, after the data
/// header: 20 `int32` indexes, then the trie, extra data and smallFCD.
pub(crate) const IX_COUNT: usize = 20;
pub(crate) const IX_NORM_TRIE_OFFSET: usize = 0;
pub(crate) const IX_EXTRA_DATA_OFFSET: usize = 1;
pub(crate) const IX_SMALL_FCD_OFFSET: usize = 2;
pub(crate) const IX_TOTAL_SIZE: usize = 7;
pub(crate) const IX_MIN_DECOMP_NO_CP: usize = 8;
pub(crate) const IX_MIN_COMP_NO_MAYBE_CP: usize = 9;
pub(crate) const IX_MIN_YES_NO: usize = 10;
pub(crate) const IX_MIN_NO_NO: usize = 11;
pub(crate) const IX_LIMIT_NO_NO: usize = 12;
pub(crate) const IX_MIN_MAYBE_YES: usize = 13;
pub(crate) const IX_MIN_YES_NO_MAPPINGS_ONLY: usize = 14;
pub(crate) const IX_MIN_NO_NO_COMP_BOUNDARY_BEFORE: usize = 15;
pub(crate) const IX_MIN_NO_NO_COMP_NO_MAYBE_CC: usize = 16;
pub(crate) const IX_MIN_NO_NO_EMPTY: usize = 17;
pub(crate) const IX_MIN_LCCC_CP: usize = 18;

pub(crate) const DATA_FORMAT: [u8; 4] = *b"Nrm2";
pub(crate) const FORMAT_VERSION: u8 = 4;
pub(crate) const DATA_HEADER_SIZE: usize = 24;
pub(crate) const MAGIC1: u8 = 0xda;
pub(crate) const MAGIC2: u8 = 0x27;

fn push_utf16(out: &mut Vec<u16>, c: u32) {
    if c <= 0xffff {
        out.push(c as u16);
    } else {
        out.push(((c >> 10) + 0xd7c0) as u16);
        out.push(((c & 0x3ff) | 0xdc00) as u16);
    }
}

/// Recursively expands `c` to its NFD form.
fn nfd_of(c: u32, raw: &HashMap<u32, (u32, u32)>, memo: &mut HashMap<u32, Vec<u32>>) -> Vec<u32> {
    if let Some(cached) = memo.get(&c) {
        return cached.clone();
    }
    let expanded = match raw.get(&c) {
        Some(&(a, b)) => {
            let mut v = nfd_of(a, raw, memo);
            if b != 0 {
                v.extend(nfd_of(b, raw, memo));
            }
            v
        }
        None => vec![c],
    };
    memo.insert(c, expanded.clone());
    expanded
}

/// Sorts combining marks into canonical order (stable, within runs of
/// nonzero combining class).
fn canonical_sort(v: &mut [u32]) {
    for i in 1..v.len() {
        let cc = ccc(v[i]);
        if cc == 0 {
            continue;
        }
        let mut j = i;
        while j > 0 && ccc(v[j - 1]) > cc {
            v.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// The canonical composition of an NFD sequence, using the derived pairs.
fn nfc_of(nfd: &[u32], pairs: &HashMap<(u32, u32), u32>) -> Vec<u32> {
    let mut out: Vec<u32> = Vec::with_capacity(nfd.len());
    let mut starter: Option<usize> = None;
    let mut prev_cc = 0u8;
    for &c in nfd {
        let cc = ccc(c);
        if let Some(si) = starter {
            // Not blocked: the mark directly follows the starter, or every
            // intervening mark has a lower combining class.
            let not_blocked = out.len() == si + 1 || prev_cc < cc;
            if cc != 0 && not_blocked {
                if let Some(&composite) = pairs.get(&(out[si], c)) {
                    out[si] = composite;
                    // prev_cc unchanged: the mark was absorbed
                    continue;
                }
            }
        }
        if cc == 0 {
            starter = Some(out.len());
        }
        out.push(c);
        prev_cc = cc;
    }
    out
}

enum MappingKind<'a> {
    /// Two-way mapping with a trailing compositions list.
    WithCompositions(&'a [(u32, u32, bool)]),
    /// Two-way or one-way mapping without compositions.
    Plain,
}

struct ExtraData {
    units: Vec<u16>,
}

impl ExtraData {
    fn new() -> Self {
        // Offsets 0 and 1 correspond to the INERT and JAMO_L norm16 values;
        // a COMP_1_LAST_TUPLE unit makes them read as empty composition lists.
        ExtraData {
            units: vec![COMP_1_LAST_TUPLE, COMP_1_LAST_TUPLE],
        }
    }

    fn mark(&self) -> u16 {
        (self.units.len() as u16) << 1
    }

    fn write_compositions(&mut self, entries: &[(u32, u32, bool)]) {
        // entries are (trail, composite, composite-combines-forward)
        let mut keyed: Vec<(u16, u16, usize)> = entries
            .iter()
            .enumerate()
            .map(|(i, &(t, _, _))| {
                if t < COMP_1_TRAIL_LIMIT as u32 {
                    ((t << 1) as u16, 0u16, i)
                } else {
                    (
                        (COMP_1_TRAIL_LIMIT
                            + (((t >> COMP_1_TRAIL_SHIFT) as u16) & !COMP_1_TRIPLE)),
                        ((t << COMP_2_TRAIL_SHIFT) as u16) & COMP_2_TRAIL_MASK,
                        i,
                    )
                }
            })
            .collect();
        keyed.sort();
        let last = keyed.len() - 1;
        for (pos, &(key1, key2, i)) in keyed.iter().enumerate() {
            let (trail, composite, fwd) = entries[i];
            let value = (composite << 1) | fwd as u32;
            let last_flag = if pos == last { COMP_1_LAST_TUPLE } else { 0 };
            if trail < COMP_1_TRAIL_LIMIT as u32 {
                if value <= 0xffff {
                    self.units.push(key1 | last_flag);
                    self.units.push(value as u16);
                } else {
                    self.units.push(key1 | COMP_1_TRIPLE | last_flag);
                    self.units.push((value >> 16) as u16);
                    self.units.push(value as u16);
                }
            } else {
                self.units.push(key1 | COMP_1_TRIPLE | last_flag);
                self.units
                    .push(key2 | ((value >> 16) as u16 & !COMP_2_TRAIL_MASK));
                self.units.push(value as u16);
            }
        }
    }

    /// Writes one mapping record and returns the norm16 value for its owner.
    fn write_mapping(
        &mut self,
        nfd: &[u32],
        own_cc: u8,
        kind: MappingKind<'_>,
        forward_combining_last: bool,
    ) -> u16 {
        let mut units = Vec::new();
        for &c in nfd {
            push_utf16(&mut units, c);
        }
        debug_assert!(units.len() <= 0x1f);
        let lccc = ccc(nfd[0]);
        let tccc = ccc(*nfd.last().unwrap());
        let needs_word = lccc != 0 || own_cc != 0;
        if needs_word {
            self.units.push(((lccc as u16) << 8) | own_cc as u16);
        }
        let offset = self.units.len() as u16;
        let mut first_unit = ((tccc as u16) << 8) | units.len() as u16;
        if needs_word {
            first_unit |= MAPPING_HAS_CCC_LCCC_WORD;
        }
        self.units.push(first_unit);
        self.units.extend_from_slice(&units);
        let has_compositions = match kind {
            MappingKind::WithCompositions(entries) => {
                self.write_compositions(entries);
                true
            }
            MappingKind::Plain => false,
        };
        let boundary_after = !has_compositions && tccc == 0 && !forward_combining_last;
        (offset << 1) | boundary_after as u16
    }
}

/// Builds the complete serialized normalization data blob.
pub(crate) fn build_nfc_blob() -> Vec<u8> {
    let raw: HashMap<u32, (u32, u32)> = DECOMPOSITIONS
        .iter()
        .map(|&(cp, a, b)| (cp, (a, b)))
        .collect();
    let excluded: HashSet<u32> = COMPOSITION_EXCLUSIONS.iter().copied().collect();
    let mut memo = HashMap::new();

    // Non-excluded two-way pairs, keyed both ways.
    let mut pairs: HashMap<(u32, u32), u32> = HashMap::new();
    let mut lists: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
    for &(cp, a, b) in DECOMPOSITIONS {
        if b != 0 && !excluded.contains(&cp) && ccc(a) == 0 {
            pairs.insert((a, b), cp);
            lists.entry(a).or_default().push((b, cp));
        }
    }
    let backward: HashSet<u32> = pairs.keys().map(|&(_, b)| b).collect();
    let composes_forward = |c: u32| lists.contains_key(&c);

    // NFD closure with canonical ordering for every decomposable character.
    let mut nfd_map: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(cp, _, _) in DECOMPOSITIONS {
        let mut v = nfd_of(cp, &raw, &mut memo);
        canonical_sort(&mut v);
        nfd_map.insert(cp, v);
    }

    // Classify decomposable characters into bands.
    let mut yes_no_comp: Vec<u32> = Vec::new();
    let mut yes_no_only: Vec<u32> = Vec::new();
    let mut no_no_a: Vec<u32> = Vec::new(); // comp-normalized, boundary before
    let mut no_no_b: Vec<u32> = Vec::new(); // boundary before, not comp-normalized
    let mut no_no_c: Vec<u32> = Vec::new(); // no comp boundary before
    for &(cp, a, b) in DECOMPOSITIONS {
        let two_way = b != 0 && !excluded.contains(&cp) && ccc(a) == 0;
        if two_way {
            if composes_forward(cp) {
                yes_no_comp.push(cp);
            } else {
                yes_no_only.push(cp);
            }
        } else {
            let nfd = &nfd_map[&cp];
            if ccc(nfd[0]) != 0 || backward.contains(&nfd[0]) {
                no_no_c.push(cp);
            } else if nfc_of(nfd, &pairs) == *nfd {
                no_no_a.push(cp);
            } else {
                no_no_b.push(cp);
            }
        }
    }

    // Starters that combine forward but have no decomposition of their own.
    let mut yes_yes_comp: Vec<u32> = lists
        .keys()
        .copied()
        .filter(|c| !nfd_map.contains_key(c))
        .collect();
    yes_yes_comp.sort_unstable();

    // Assemble the extra data and per-character norm16 values.
    let mut extra = ExtraData::new();
    let mut norm16: HashMap<u32, u16> = HashMap::new();

    for &cp in &yes_yes_comp {
        let offset = extra.units.len() as u16;
        let mut entries: Vec<(u32, u32, bool)> = lists[&cp]
            .iter()
            .map(|&(t, comp)| (t, comp, composes_forward(comp)))
            .collect();
        entries.sort_unstable();
        extra.write_compositions(&entries);
        norm16.insert(cp, offset << 1);
    }

    let min_yes_no = extra.mark();
    extra.units.push(0); // Hangul LV reads this slot; tccc must be 0
    for &cp in &yes_no_comp {
        let mut entries: Vec<(u32, u32, bool)> = lists[&cp]
            .iter()
            .map(|&(t, comp)| (t, comp, composes_forward(comp)))
            .collect();
        entries.sort_unstable();
        let n16 = extra.write_mapping(
            &nfd_map[&cp],
            ccc(cp),
            MappingKind::WithCompositions(&entries),
            composes_forward(*nfd_map[&cp].last().unwrap()),
        );
        norm16.insert(cp, n16);
    }

    let min_yes_no_mappings_only = extra.mark();
    extra.units.push(0); // Hangul LVT reads this slot; tccc must be 0
    for &cp in &yes_no_only {
        let n16 = extra.write_mapping(
            &nfd_map[&cp],
            ccc(cp),
            MappingKind::Plain,
            composes_forward(*nfd_map[&cp].last().unwrap()),
        );
        norm16.insert(cp, n16);
    }

    let min_no_no = extra.mark();
    for &cp in &no_no_a {
        let n16 = extra.write_mapping(
            &nfd_map[&cp],
            ccc(cp),
            MappingKind::Plain,
            composes_forward(*nfd_map[&cp].last().unwrap()),
        );
        norm16.insert(cp, n16);
    }
    let min_no_no_comp_boundary_before = extra.mark();
    for &cp in &no_no_b {
        let n16 = extra.write_mapping(
            &nfd_map[&cp],
            ccc(cp),
            MappingKind::Plain,
            composes_forward(*nfd_map[&cp].last().unwrap()),
        );
        norm16.insert(cp, n16);
    }
    let min_no_no_comp_no_maybe_cc = extra.mark();
    for &cp in &no_no_c {
        let n16 = extra.write_mapping(
            &nfd_map[&cp],
            ccc(cp),
            MappingKind::Plain,
            composes_forward(*nfd_map[&cp].last().unwrap()),
        );
        norm16.insert(cp, n16);
    }
    let min_no_no_empty = extra.mark();
    let limit_no_no = min_no_no_empty;
    let min_maybe_yes = MIN_NORMAL_MAYBE_YES;
    assert!(limit_no_no < min_maybe_yes, "extra data too large");

    // Combining marks and backward combiners.
    for &(from, to, cc) in super::nfc::CCC_RANGES {
        for cp in from..=to {
            if norm16.contains_key(&cp) {
                continue; // decomposable marks keep their mapping value
            }
            let value = if backward.contains(&cp) {
                MIN_NORMAL_MAYBE_YES + ((cc as u16) << 1)
            } else {
                JAMO_VT + ((cc as u16) << 1)
            };
            norm16.insert(cp, value);
        }
    }
    // Backward combiners with zero combining class (none in the current
    // tables, but the band exists).
    for &cp in &backward {
        norm16.entry(cp).or_insert(MIN_NORMAL_MAYBE_YES);
    }

    // Populate the full code point value array.
    let mut values = vec![INERT; 0x110000];
    for (&cp, &n16) in &norm16 {
        values[cp as usize] = n16;
    }
    for cp in JAMO_L_BASE..JAMO_L_BASE + JAMO_L_COUNT {
        values[cp as usize] = JAMO_L;
    }
    for cp in JAMO_V_BASE..JAMO_V_BASE + JAMO_V_COUNT {
        values[cp as usize] = JAMO_VT;
    }
    for cp in JAMO_T_BASE + 1..JAMO_T_BASE + JAMO_T_COUNT {
        values[cp as usize] = JAMO_VT;
    }
    for cp in HANGUL_BASE..HANGUL_LIMIT {
        values[cp as usize] = if (cp - HANGUL_BASE) % JAMO_T_COUNT == 0 {
            min_yes_no
        } else {
            min_yes_no_mappings_only | 1
        };
    }
    // Mark lead surrogate units whose 1024-code-point range carries data, so
    // that the UTF-16 fast path leaves the per-unit loop and decodes the pair.
    for lead in 0xd800u32..0xdc00 {
        let start = 0x10000 + ((lead - 0xd800) << 10);
        if (start..start + 0x400).any(|c| values[c as usize] != INERT) {
            values[lead as usize] = min_no_no;
        }
    }

    let (trie_bytes, min_decomp_no_cp, min_comp_no_maybe_cp, min_lccc_cp) = {
        let mut min_decomp = 0xffffu32;
        let mut min_comp = 0xffffu32;
        let mut min_lccc = 0xffffu32;
        for &(cp, _, _) in DECOMPOSITIONS {
            min_decomp = min_decomp.min(cp);
        }
        for (&cp, &n16) in &norm16 {
            if n16 >= min_no_no {
                min_comp = min_comp.min(cp);
            }
        }
        for &(from, _, _) in super::nfc::CCC_RANGES {
            min_lccc = min_lccc.min(from);
        }
        (serialize_trie(&values), min_decomp, min_comp, min_lccc)
    };

    // smallFCD: one bit per 32 BMP code points, set iff any has FCD16 != 0.
    let mut small_fcd = [0u8; 256];
    for cp in 0u32..0x10000 {
        if fcd16_of(cp, &nfd_map) != 0 {
            small_fcd[(cp >> 8) as usize] |= 1 << ((cp >> 5) & 7);
        }
    }

    // Assemble the blob: data header, indexes, trie, extra data, smallFCD.
    let trie_offset = (IX_COUNT * 4) as i32;
    let extra_offset = trie_offset + trie_bytes.len() as i32;
    let small_fcd_offset = extra_offset + (extra.units.len() * 2) as i32;
    let total_size = small_fcd_offset + 256;

    let mut indexes = [0i32; IX_COUNT];
    indexes[IX_NORM_TRIE_OFFSET] = trie_offset;
    indexes[IX_EXTRA_DATA_OFFSET] = extra_offset;
    indexes[IX_SMALL_FCD_OFFSET] = small_fcd_offset;
    for ix in IX_SMALL_FCD_OFFSET + 1..IX_TOTAL_SIZE {
        indexes[ix] = total_size;
    }
    indexes[IX_TOTAL_SIZE] = total_size;
    indexes[IX_MIN_DECOMP_NO_CP] = min_decomp_no_cp as i32;
    indexes[IX_MIN_COMP_NO_MAYBE_CP] = min_comp_no_maybe_cp as i32;
    indexes[IX_MIN_YES_NO] = min_yes_no as i32;
    indexes[IX_MIN_NO_NO] = min_no_no as i32;
    indexes[IX_LIMIT_NO_NO] = limit_no_no as i32;
    indexes[IX_MIN_MAYBE_YES] = min_maybe_yes as i32;
    indexes[IX_MIN_YES_NO_MAPPINGS_ONLY] = min_yes_no_mappings_only as i32;
    indexes[IX_MIN_NO_NO_COMP_BOUNDARY_BEFORE] = min_no_no_comp_boundary_before as i32;
    indexes[IX_MIN_NO_NO_COMP_NO_MAYBE_CC] = min_no_no_comp_no_maybe_cc as i32;
    indexes[IX_MIN_NO_NO_EMPTY] = min_no_no_empty as i32;
    indexes[IX_MIN_LCCC_CP] = min_lccc_cp as i32;

    let mut blob = Vec::with_capacity(DATA_HEADER_SIZE + total_size as usize);
    // MappedData { headerSize, magic1, magic2 }
    blob.extend_from_slice(&(DATA_HEADER_SIZE as u16).to_le_bytes());
    blob.push(MAGIC1);
    blob.push(MAGIC2);
    // UDataInfo { size, reserved, isBigEndian, charsetFamily, sizeofUChar,
    //             reserved, dataFormat, formatVersion, dataVersion }
    blob.extend_from_slice(&20u16.to_le_bytes());
    blob.extend_from_slice(&0u16.to_le_bytes());
    blob.push(0); // little-endian
    blob.push(0); // ASCII charset family
    blob.push(2); // sizeof(UChar)
    blob.push(0);
    blob.extend_from_slice(&DATA_FORMAT);
    blob.extend_from_slice(&[FORMAT_VERSION, 0, 0, 0]);
    blob.extend_from_slice(&[16, 0, 0, 0]); // dataVersion: Unicode 16.0
    debug_assert_eq!(blob.len(), DATA_HEADER_SIZE);

    for ix in indexes {
        blob.extend_from_slice(&ix.to_le_bytes());
    }
    blob.extend_from_slice(&trie_bytes);
    for unit in &extra.units {
        blob.extend_from_slice(&unit.to_le_bytes());
    }
    blob.extend_from_slice(&small_fcd);
    blob
}

/// FCD16 of a code point, computed directly from the source tables.
/// Hangul syllables and Jamo all have FCD16 == 0.
fn fcd16_of(cp: u32, nfd_map: &HashMap<u32, Vec<u32>>) -> u16 {
    if let Some(nfd) = nfd_map.get(&cp) {
        let lccc = ccc(nfd[0]) as u16;
        let tccc = ccc(*nfd.last().unwrap()) as u16;
        return (lccc << 8) | tccc;
    }
    let cc = ccc(cp) as u16;
    (cc << 8) | cc
}

/// Serializes a fast-type 16-bit trie over the full code point range.
fn serialize_trie(values: &[u16]) -> Vec<u8> {
    assert_eq!(values.len(), 0x110000);

    // The high start is the first code point of the uniform inert tail,
    // rounded up to a multiple of 0x200. Everything below the BMP limit is
    // always indexed directly.
    let mut high_start = 0x110000u32;
    while high_start > 0x10000 && values[(high_start - 1) as usize] == INERT {
        high_start -= 1;
    }
    high_start = (high_start + 0x1ff) & !0x1ff;

    let mut data: Vec<u16> = Vec::new();
    let mut block64: HashMap<Vec<u16>, u16> = HashMap::new();
    let mut bmp_index = [0u16; trie::BMP_INDEX_LENGTH as usize];
    for block in 0..trie::BMP_INDEX_LENGTH as usize {
        let start = block * 64;
        let chunk = values[start..start + 64].to_vec();
        let offset = *block64.entry(chunk.clone()).or_insert_with(|| {
            let at = data.len() as u16;
            data.extend_from_slice(&chunk);
            at
        });
        bmp_index[block] = offset;
    }

    let supp_groups = ((high_start - 0x10000) >> trie::SHIFT_2) as usize;
    let mut block16: HashMap<Vec<u16>, u16> = HashMap::new();
    let mut i3_blocks: Vec<Vec<u16>> = Vec::new();
    let mut i3_ids: HashMap<Vec<u16>, u16> = HashMap::new();
    let mut group_i3: Vec<u16> = Vec::with_capacity(supp_groups);
    for group in 0..supp_groups {
        let group_start = 0x10000 + (group << trie::SHIFT_2) as u32;
        let mut i3 = Vec::with_capacity(trie::INDEX_3_BLOCK_LENGTH as usize);
        for sub in 0..trie::INDEX_3_BLOCK_LENGTH {
            let start = (group_start + (sub << trie::SHIFT_3)) as usize;
            let chunk = values[start..start + trie::SMALL_DATA_BLOCK_LENGTH as usize].to_vec();
            let offset = *block16.entry(chunk.clone()).or_insert_with(|| {
                let at = data.len() as u16;
                data.extend_from_slice(&chunk);
                at
            });
            i3.push(offset);
        }
        let id = *i3_ids.entry(i3.clone()).or_insert_with(|| {
            i3_blocks.push(i3.clone());
            (i3_blocks.len() - 1) as u16
        });
        group_i3.push(id);
    }

    // Index-1 entries cover 1 << SHIFT_1 code points each; index-2 blocks
    // hold 32 index-3 block references.
    let i1_len = if supp_groups == 0 {
        0
    } else {
        (supp_groups + trie::INDEX_2_BLOCK_LENGTH as usize - 1) / trie::INDEX_2_BLOCK_LENGTH as usize
    };
    let null_i3_id = if supp_groups != 0 && supp_groups % trie::INDEX_2_BLOCK_LENGTH as usize != 0 {
        // Pad the last index-2 block with references to an all-inert
        // index-3 block; those entries are unreachable (>= high_start).
        let inert16 = vec![INERT; trie::SMALL_DATA_BLOCK_LENGTH as usize];
        let inert_offset = *block16.entry(inert16.clone()).or_insert_with(|| {
            let at = data.len() as u16;
            data.extend_from_slice(&inert16);
            at
        });
        let i3 = vec![inert_offset; trie::INDEX_3_BLOCK_LENGTH as usize];
        Some(*i3_ids.entry(i3.clone()).or_insert_with(|| {
            i3_blocks.push(i3.clone());
            (i3_blocks.len() - 1) as u16
        }))
    } else {
        None
    };

    let mut i2_blocks: Vec<Vec<u16>> = Vec::new();
    let mut i2_ids: HashMap<Vec<u16>, u16> = HashMap::new();
    let mut i1_entries: Vec<u16> = Vec::with_capacity(i1_len);
    for slot in 0..i1_len {
        let mut i2 = Vec::with_capacity(trie::INDEX_2_BLOCK_LENGTH as usize);
        for k in 0..trie::INDEX_2_BLOCK_LENGTH as usize {
            let group = slot * trie::INDEX_2_BLOCK_LENGTH as usize + k;
            if group < supp_groups {
                i2.push(group_i3[group]);
            } else {
                i2.push(null_i3_id.expect("padding without a null index-3 block"));
            }
        }
        let id = *i2_ids.entry(i2.clone()).or_insert_with(|| {
            i2_blocks.push(i2.clone());
            (i2_blocks.len() - 1) as u16
        });
        i1_entries.push(id);
    }

    // Reserved slots: the high value, then the error value.
    data.push(INERT);
    data.push(INERT);

    let i2_base = trie::BMP_INDEX_LENGTH as usize + i1_len;
    let i3_base = i2_base + i2_blocks.len() * trie::INDEX_2_BLOCK_LENGTH as usize;
    let index_length = i3_base + i3_blocks.len() * trie::INDEX_3_BLOCK_LENGTH as usize;

    let mut index: Vec<u16> = Vec::with_capacity(index_length);
    index.extend_from_slice(&bmp_index);
    for &i2_id in &i1_entries {
        index.push((i2_base + i2_id as usize * trie::INDEX_2_BLOCK_LENGTH as usize) as u16);
    }
    for i2 in &i2_blocks {
        for &i3_id in i2 {
            index.push((i3_base + i3_id as usize * trie::INDEX_3_BLOCK_LENGTH as usize) as u16);
        }
    }
    for i3 in &i3_blocks {
        index.extend_from_slice(i3);
    }
    debug_assert_eq!(index.len(), index_length);

    let data_length = data.len();
    assert!(data_length <= 0xffff && index_length <= 0xffff);

    let mut out = Vec::with_capacity(trie::HEADER_LEN + 2 * (index_length + data_length));
    out.extend_from_slice(&trie::SIGNATURE.to_le_bytes());
    // options: fast type, 16-bit values, data null offset high bits all set
    // (no dedicated null block).
    let options: u16 = ((trie::NO_DATA_NULL_OFFSET >> 8) & 0xf00) as u16;
    out.extend_from_slice(&options.to_le_bytes());
    out.extend_from_slice(&(index_length as u16).to_le_bytes());
    out.extend_from_slice(&(data_length as u16).to_le_bytes());
    out.extend_from_slice(&trie::NO_INDEX3_NULL_OFFSET.to_le_bytes());
    out.extend_from_slice(&((trie::NO_DATA_NULL_OFFSET & 0xffff) as u16).to_le_bytes());
    out.extend_from_slice(&((high_start >> trie::SHIFT_2) as u16).to_le_bytes());
    for &u in &index {
        out.extend_from_slice(&u.to_le_bytes());
    }
    for &u in &data {
        out.extend_from_slice(&u.to_le_bytes());
    }
    out
}
