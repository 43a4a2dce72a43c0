// Copyright 2013-2014 The rust-url developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Trie-driven canonical normalization (an NFC-shaped composing normalizer).
//!
//! Each code point maps to a 16-bit value partitioned into bands by the
//! thresholds carried in the data: inert, Hangul Jamo, two-way mappings
//! (with or without compositions), one-way mappings, backward-combining
//! characters and combining marks with their class in the upper bits.
//! Bit 0 of a value is the has-composition-boundary-after flag.
//!
//! `compose` runs three tiers: a fast scan over characters that are already
//! composed and have class zero, a medium tier for single mappings and
//! Hangul surrounded by boundaries, and a slow tier that decomposes the
//! segment between the nearest boundaries and recomposes it in place.

use crate::buffer::{lead, prev_code_point, trail, ReorderingBuffer};
use crate::data::{nfc_data, NormalizerData};
use crate::ProcessingError;

// Fixed norm16 values.
pub(crate) const MIN_YES_YES_WITH_CC: u16 = 0xfe02;
pub(crate) const JAMO_VT: u16 = 0xfe00;
pub(crate) const MIN_NORMAL_MAYBE_YES: u16 = 0xfc00;
pub(crate) const JAMO_L: u16 = 2;
pub(crate) const INERT: u16 = 1;

// norm16 bit 0 is the has-composition-boundary-after flag.
pub(crate) const HAS_COMP_BOUNDARY_AFTER: u16 = 1;
pub(crate) const OFFSET_SHIFT: u16 = 1;

// For algorithmic one-way mappings, norm16 bits 2..1 indicate the
// trail combining class (0, 1, >1) for fast FCC boundary-after tests.
pub(crate) const DELTA_TCCC_1: u16 = 2;
pub(crate) const DELTA_TCCC_MASK: u16 = 6;
pub(crate) const DELTA_SHIFT: u16 = 3;
pub(crate) const MAX_DELTA: u16 = 0x40;

// Mapping record first-unit bits.
pub(crate) const MAPPING_HAS_CCC_LCCC_WORD: u16 = 0x80;
pub(crate) const MAPPING_LENGTH_MASK: u16 = 0x1f;

// Compositions list encoding.
pub(crate) const COMP_1_LAST_TUPLE: u16 = 0x8000;
pub(crate) const COMP_1_TRIPLE: u16 = 1;
pub(crate) const COMP_1_TRAIL_LIMIT: u16 = 0x3400;
pub(crate) const COMP_1_TRAIL_MASK: u16 = 0x7ffe;
pub(crate) const COMP_1_TRAIL_SHIFT: u32 = 9; // 10 - 1 for the triple bit
pub(crate) const COMP_2_TRAIL_SHIFT: u32 = 6;
pub(crate) const COMP_2_TRAIL_MASK: u16 = 0xffc0;

// Korean Hangul and Jamo constants.
pub(crate) const JAMO_L_BASE: u32 = 0x1100;
pub(crate) const JAMO_V_BASE: u32 = 0x1161;
pub(crate) const JAMO_T_BASE: u32 = 0x11a7;
pub(crate) const HANGUL_BASE: u32 = 0xac00;
pub(crate) const JAMO_L_COUNT: u32 = 19;
pub(crate) const JAMO_V_COUNT: u32 = 21;
pub(crate) const JAMO_T_COUNT: u32 = 28;
pub(crate) const HANGUL_COUNT: u32 = JAMO_L_COUNT * JAMO_V_COUNT * JAMO_T_COUNT;
pub(crate) const HANGUL_LIMIT: u32 = HANGUL_BASE + HANGUL_COUNT;

/// Decomposes a Hangul syllable into 2 or 3 Jamo code units.
pub(crate) fn hangul_decompose(c: u32, jamos: &mut [u16; 3]) -> usize {
    let c = c - HANGUL_BASE;
    let t = c % JAMO_T_COUNT;
    let lv = c / JAMO_T_COUNT;
    jamos[0] = (JAMO_L_BASE + lv / JAMO_V_COUNT) as u16;
    jamos[1] = (JAMO_V_BASE + lv % JAMO_V_COUNT) as u16;
    if t == 0 {
        2
    } else {
        jamos[2] = (JAMO_T_BASE + t) as u16;
        3
    }
}

#[inline]
fn is_hangul_lv_cp(c: u32) -> bool {
    match c.checked_sub(HANGUL_BASE) {
        Some(d) => d < HANGUL_COUNT && d % JAMO_T_COUNT == 0,
        None => false,
    }
}

#[inline]
fn is_lead_unit(u: u16) -> bool {
    u & 0xfc00 == 0xd800
}

#[inline]
fn is_trail_unit(u: u16) -> bool {
    u & 0xfc00 == 0xdc00
}

/// A composing normalizer: the shared immutable data plus the contiguous
/// (FCC) mode flag.
#[derive(Clone, Copy)]
pub(crate) struct NormalizerCore {
    d: &'static NormalizerData,
    only_contiguous: bool,
}

impl NormalizerCore {
    /// The canonical-composition instance over the embedded data.
    pub(crate) fn nfc() -> Result<NormalizerCore, ProcessingError> {
        Ok(NormalizerCore {
            d: nfc_data()?,
            only_contiguous: false,
        })
    }

    // --- low-level properties -------------------------------------------

    /// Norm16 for a code point. Lead surrogate code points are inert; the
    /// trie stores values for lead surrogate code *units* only for the
    /// benefit of the UTF-16 fast path.
    #[inline]
    pub(crate) fn norm16(&self, c: u32) -> u16 {
        if c & 0xfffffc00 == 0xd800 {
            INERT
        } else {
            self.d.trie.get16(c)
        }
    }

    #[inline]
    pub(crate) fn raw_norm16(&self, c: u32) -> u16 {
        self.d.trie.get16(c)
    }

    #[inline]
    fn is_maybe(&self, norm16: u16) -> bool {
        self.d.min_maybe_yes <= norm16 && norm16 <= JAMO_VT
    }

    #[inline]
    fn is_maybe_or_non_zero_cc(&self, norm16: u16) -> bool {
        norm16 >= self.d.min_maybe_yes
    }

    #[inline]
    fn is_inert(norm16: u16) -> bool {
        norm16 == INERT
    }

    #[inline]
    fn is_jamo_vt(norm16: u16) -> bool {
        norm16 == JAMO_VT
    }

    #[inline]
    fn hangul_lvt(&self) -> u16 {
        self.d.min_yes_no_mappings_only | HAS_COMP_BOUNDARY_AFTER
    }

    #[inline]
    fn is_hangul_lv(&self, norm16: u16) -> bool {
        norm16 == self.d.min_yes_no
    }

    #[inline]
    fn is_hangul_lvt(&self, norm16: u16) -> bool {
        norm16 == self.hangul_lvt()
    }

    #[inline]
    fn is_comp_yes_and_zero_cc(&self, norm16: u16) -> bool {
        norm16 < self.d.min_no_no
    }

    #[inline]
    fn is_decomp_no_algorithmic(&self, norm16: u16) -> bool {
        norm16 >= self.d.limit_no_no
    }

    #[inline]
    fn is_algorithmic_no_no(&self, norm16: u16) -> bool {
        self.d.limit_no_no <= norm16 && norm16 < self.d.min_maybe_yes
    }

    #[inline]
    pub(crate) fn cc_from_normal_yes_or_maybe(norm16: u16) -> u8 {
        (norm16 >> OFFSET_SHIFT) as u8
    }

    #[inline]
    pub(crate) fn cc_from_yes_or_maybe(norm16: u16) -> u8 {
        if norm16 >= MIN_NORMAL_MAYBE_YES {
            Self::cc_from_normal_yes_or_maybe(norm16)
        } else {
            0
        }
    }

    #[inline]
    pub(crate) fn cc_from_yes_or_maybe_cp(&self, c: u32) -> u8 {
        if c < self.d.min_comp_no_maybe_cp {
            0
        } else {
            Self::cc_from_yes_or_maybe(self.norm16(c))
        }
    }

    /// Canonical combining class from a norm16 value.
    pub(crate) fn get_cc(&self, norm16: u16) -> u8 {
        if norm16 >= MIN_NORMAL_MAYBE_YES {
            return Self::cc_from_normal_yes_or_maybe(norm16);
        }
        if norm16 < self.d.min_no_no || self.d.limit_no_no <= norm16 {
            return 0;
        }
        self.cc_from_no_no(norm16)
    }

    /// Canonical combining class for a code point.
    pub(crate) fn cc(&self, c: u32) -> u8 {
        self.get_cc(self.norm16(c))
    }

    fn cc_from_no_no(&self, norm16: u16) -> u8 {
        let m = self.mapping_index(norm16);
        if self.d.extra[m] & MAPPING_HAS_CCC_LCCC_WORD != 0 {
            self.d.extra[m - 1] as u8
        } else {
            0
        }
    }

    /// Trail combining class for a character passing
    /// `is_comp_yes_and_zero_cc`.
    fn trail_cc_from_comp_yes_and_zero_cc(&self, norm16: u16) -> u8 {
        if norm16 <= self.d.min_yes_no {
            0 // yes-yes and Hangul LV have ccc = tccc = 0
        } else {
            // For Hangul LVT this harmlessly reads a unit with tccc = 0.
            (self.d.extra[self.mapping_index(norm16)] >> 8) as u8
        }
    }

    /// Requires an algorithmic no-no value.
    #[inline]
    fn map_algorithmic(&self, c: u32, norm16: u16) -> u32 {
        (c as i32 + (norm16 >> DELTA_SHIFT) as i32 - self.d.center_no_no_delta as i32) as u32
    }

    /// Requires `min_yes_no <= norm16 < limit_no_no`; index of the mapping
    /// record's first unit in the extra data.
    #[inline]
    fn mapping_index(&self, norm16: u16) -> usize {
        self.d.extra_base + (norm16 >> OFFSET_SHIFT) as usize
    }

    fn compositions_list_for_decomp_yes(&self, norm16: u16) -> Option<usize> {
        if norm16 < JAMO_L || MIN_NORMAL_MAYBE_YES <= norm16 {
            None
        } else if norm16 < self.d.min_maybe_yes {
            // For yes-yes; if Jamo L this is a harmless empty list.
            Some(self.mapping_index(norm16))
        } else {
            Some(((norm16 - self.d.min_maybe_yes) >> OFFSET_SHIFT) as usize)
        }
    }

    fn compositions_list_for_composite(&self, norm16: u16) -> usize {
        // A composite has both a mapping and a compositions list.
        let m = self.mapping_index(norm16);
        m + 1 + (self.d.extra[m] & MAPPING_LENGTH_MASK) as usize
    }

    // --- boundary predicates --------------------------------------------

    #[inline]
    fn norm16_has_comp_boundary_before(&self, norm16: u16) -> bool {
        norm16 < self.d.min_no_no_comp_no_maybe_cc || self.is_algorithmic_no_no(norm16)
    }

    pub(crate) fn has_comp_boundary_before(&self, c: u32) -> bool {
        c < self.d.min_comp_no_maybe_cp || self.norm16_has_comp_boundary_before(self.norm16(c))
    }

    fn has_comp_boundary_before_at(&self, s: &[u16], i: usize) -> bool {
        if i == s.len() || (s[i] as u32) < self.d.min_comp_no_maybe_cp {
            return true;
        }
        let mut j = i;
        let (_, norm16) = self.d.trie.next16(s, &mut j);
        self.norm16_has_comp_boundary_before(norm16)
    }

    fn has_comp_boundary_after_range(&self, s: &[u16], start: usize, p: usize) -> bool {
        if start == p {
            return true;
        }
        let mut rel = p - start;
        let (_, norm16) = self.d.trie.prev16(&s[start..p], &mut rel);
        self.norm16_has_comp_boundary_after(norm16)
    }

    #[inline]
    fn norm16_has_comp_boundary_after(&self, norm16: u16) -> bool {
        norm16 & HAS_COMP_BOUNDARY_AFTER != 0
            && (!self.only_contiguous || self.is_trail_cc01_for_comp_boundary_after(norm16))
    }

    /// For FCC: given a value with the boundary-after bit, is tccc <= 1?
    fn is_trail_cc01_for_comp_boundary_after(&self, norm16: u16) -> bool {
        Self::is_inert(norm16)
            || if self.is_decomp_no_algorithmic(norm16) {
                norm16 & DELTA_TCCC_MASK <= DELTA_TCCC_1
            } else {
                self.d.extra[self.mapping_index(norm16)] <= 0x1ff
            }
    }

    pub(crate) fn has_comp_boundary_after(&self, c: u32) -> bool {
        self.norm16_has_comp_boundary_after(self.norm16(c))
    }

    pub(crate) fn is_comp_inert(&self, c: u32) -> bool {
        let norm16 = self.norm16(c);
        self.is_comp_yes_and_zero_cc(norm16)
            && (norm16 & HAS_COMP_BOUNDARY_AFTER) != 0
            && (!self.only_contiguous
                || Self::is_inert(norm16)
                || self.d.extra[self.mapping_index(norm16)] <= 0x1ff)
    }

    // --- FCD -------------------------------------------------------------

    /// True if the single-or-lead code unit might have non-zero FCD data.
    #[inline]
    fn single_lead_might_have_non_zero_fcd16(&self, lead: u32) -> bool {
        let bits = self.d.small_fcd[(lead >> 8) as usize];
        if bits == 0 {
            return false;
        }
        (bits >> ((lead >> 5) & 7)) & 1 != 0
    }

    /// `lccc(c)` in bits 15..8 and `tccc(c)` in bits 7..0.
    pub(crate) fn get_fcd16(&self, c: u32) -> u16 {
        if c < self.d.min_decomp_no_cp {
            return 0;
        }
        if c <= 0xffff && !self.single_lead_might_have_non_zero_fcd16(c) {
            return 0;
        }
        self.get_fcd16_from_norm_data(c)
    }

    fn get_fcd16_from_norm_data(&self, c: u32) -> u16 {
        let mut c = c;
        let mut norm16 = self.norm16(c);
        if norm16 >= self.d.limit_no_no {
            if norm16 >= MIN_NORMAL_MAYBE_YES {
                // combining mark
                let cc = Self::cc_from_normal_yes_or_maybe(norm16) as u16;
                return cc | (cc << 8);
            } else if norm16 >= self.d.min_maybe_yes {
                return 0;
            } else {
                // algorithmic one-way mapping
                let delta_trail_cc = norm16 & DELTA_TCCC_MASK;
                if delta_trail_cc <= DELTA_TCCC_1 {
                    return delta_trail_cc >> OFFSET_SHIFT;
                }
                c = self.map_algorithmic(c, norm16);
                norm16 = self.raw_norm16(c);
            }
        }
        if norm16 <= self.d.min_yes_no || self.is_hangul_lvt(norm16) {
            // no decomposition or Hangul syllable, all zeros
            return 0;
        }
        let m = self.mapping_index(norm16);
        let mut fcd = self.d.extra[m] >> 8; // tccc
        if self.d.extra[m] & MAPPING_HAS_CCC_LCCC_WORD != 0 {
            fcd |= self.d.extra[m - 1] & 0xff00; // lccc
        }
        fcd
    }

    fn get_previous_trail_cc(&self, s: &[u16], start: usize, p: usize) -> u8 {
        if start == p {
            return 0;
        }
        let (c, _) = prev_code_point(&s[start..p], p - start);
        self.get_fcd16(c) as u8
    }

    // --- decomposition ---------------------------------------------------

    /// Decomposes one code point into the buffer.
    pub(crate) fn decompose(&self, c: u32, norm16: u16, buffer: &mut ReorderingBuffer) {
        let mut c = c;
        let mut norm16 = norm16;
        if norm16 >= self.d.limit_no_no {
            if self.is_maybe_or_non_zero_cc(norm16) {
                buffer.append(c, Self::cc_from_yes_or_maybe(norm16));
                return;
            }
            // Maps to a comp-yes zero-cc character.
            c = self.map_algorithmic(c, norm16);
            norm16 = self.raw_norm16(c);
        }
        if norm16 < self.d.min_yes_no {
            // c does not decompose
            buffer.append(c, 0);
        } else if self.is_hangul_lv(norm16) || self.is_hangul_lvt(norm16) {
            let mut jamos = [0u16; 3];
            let n = hangul_decompose(c, &mut jamos);
            buffer.append_zero_cc_slice(&jamos[..n]);
        } else {
            // The character decomposes; everything is in the extra data.
            let m = self.mapping_index(norm16);
            let first_unit = self.d.extra[m];
            let length = (first_unit & MAPPING_LENGTH_MASK) as usize;
            let trail_cc = (first_unit >> 8) as u8;
            let lead_cc = if first_unit & MAPPING_HAS_CCC_LCCC_WORD != 0 {
                (self.d.extra[m - 1] >> 8) as u8
            } else {
                0
            };
            buffer.append_slice(&self.d.extra[m + 1..m + 1 + length], true, lead_cc, trail_cc);
        }
    }

    /// Decomposes `[from, to)`; when `stop_at_comp_boundary` is set, stops
    /// at the first composition boundary and returns the stop position.
    fn decompose_short(
        &self,
        s: &[u16],
        from: usize,
        to: usize,
        stop_at_comp_boundary: bool,
        buffer: &mut ReorderingBuffer,
    ) -> usize {
        let mut i = from;
        while i < to {
            if stop_at_comp_boundary && (s[i] as u32) < self.d.min_comp_no_maybe_cp {
                return i;
            }
            let prev = i;
            let (c, norm16) = self.d.trie.next16(&s[..to], &mut i);
            if stop_at_comp_boundary && self.norm16_has_comp_boundary_before(norm16) {
                return prev;
            }
            self.decompose(c, norm16, buffer);
            if stop_at_comp_boundary && self.norm16_has_comp_boundary_after(norm16) {
                return i;
            }
        }
        to
    }

    // --- composition ------------------------------------------------------

    /// Looks `trail` up in a compositions list. Returns the composite
    /// shifted left by one, with bit 0 set when the composite itself
    /// combines forward; -1 when the pair does not compose.
    fn combine(&self, list: usize, trail: u32) -> i32 {
        let extra = &self.d.extra[..];
        let mut i = list;
        if trail < COMP_1_TRAIL_LIMIT as u32 {
            // trail character is 0..33FF: entries have 2 or 3 units
            let key1 = (trail << 1) as u16;
            let mut first_unit = extra[i];
            while key1 > first_unit {
                i += 2 + (first_unit & COMP_1_TRIPLE) as usize;
                first_unit = extra[i];
            }
            if key1 == first_unit & COMP_1_TRAIL_MASK {
                if first_unit & COMP_1_TRIPLE != 0 {
                    return ((extra[i + 1] as i32) << 16) | extra[i + 2] as i32;
                } else {
                    return extra[i + 1] as i32;
                }
            }
        } else {
            // trail character is 3400..10FFFF: entries have 3 units
            let key1 = COMP_1_TRAIL_LIMIT
                + (((trail >> COMP_1_TRAIL_SHIFT) as u16) & !COMP_1_TRIPLE);
            let key2 = ((trail << COMP_2_TRAIL_SHIFT) as u16) & COMP_2_TRAIL_MASK;
            loop {
                let first_unit = extra[i];
                if key1 > first_unit {
                    i += 2 + (first_unit & COMP_1_TRIPLE) as usize;
                } else if key1 == first_unit & COMP_1_TRAIL_MASK {
                    let second_unit = extra[i + 1];
                    if key2 > second_unit {
                        if first_unit & COMP_1_LAST_TUPLE != 0 {
                            break;
                        }
                        i += 3;
                    } else if key2 == second_unit & COMP_2_TRAIL_MASK {
                        return (((second_unit & !COMP_2_TRAIL_MASK) as i32) << 16)
                            | extra[i + 2] as i32;
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            }
        }
        -1
    }

    /// Recomposes the buffer contents from `from` to the end, in place.
    fn recompose(&self, buffer: &mut ReorderingBuffer, from: usize) {
        let mut p = from;
        let mut limit = buffer.s.len();
        if p == limit {
            return;
        }

        let mut starter = 0usize;
        let mut starter_is_supplementary = false;
        let mut compositions_list: Option<usize> = None;
        let mut prev_cc = 0u8;

        loop {
            let (c, norm16) = self.d.trie.next16(&buffer.s[..limit], &mut p);
            let cc = Self::cc_from_yes_or_maybe(norm16);
            if self.is_maybe(norm16)
                && compositions_list.is_some()
                && (prev_cc < cc || prev_cc == 0)
            {
                if Self::is_jamo_vt(norm16) {
                    // c is a Jamo V/T; try to compose with the previous character.
                    if c < JAMO_T_BASE {
                        // Jamo V: compose with a previous Jamo L and a following Jamo T.
                        let prev = (buffer.s[starter] as u32).wrapping_sub(JAMO_L_BASE);
                        if prev < JAMO_L_COUNT {
                            let p_remove = p - 1;
                            let mut syllable = HANGUL_BASE
                                + (prev * JAMO_V_COUNT + (c - JAMO_V_BASE)) * JAMO_T_COUNT;
                            if p != limit {
                                let t = (buffer.s[p] as u32).wrapping_sub(JAMO_T_BASE);
                                if t > 0 && t < JAMO_T_COUNT {
                                    p += 1;
                                    syllable += t;
                                }
                            }
                            buffer.s[starter] = syllable as u16;
                            // remove the Jamo V/T
                            buffer.s.copy_within(p..limit, p_remove);
                            limit -= p - p_remove;
                            p = p_remove;
                        }
                    }
                    // No branch for Jamo T: the input is NFD, so there are no
                    // Hangul LV syllables a T could combine with here; Ts are
                    // consumed above while handling the V.
                    if p == limit {
                        break;
                    }
                    compositions_list = None;
                    continue;
                }
                let composite_and_fwd = self.combine(compositions_list.unwrap(), c);
                if composite_and_fwd >= 0 {
                    // The starter and the combining mark do combine.
                    let composite = (composite_and_fwd >> 1) as u32;
                    let c_width = if c <= 0xffff { 1 } else { 2 };
                    let mut p_remove = p - c_width;
                    if starter_is_supplementary {
                        if composite > 0xffff {
                            buffer.s[starter] = lead(composite);
                            buffer.s[starter + 1] = trail(composite);
                        } else {
                            // The composite is shorter than the starter;
                            // move the intermediate characters forward one.
                            buffer.s[starter] = composite as u16;
                            buffer.s.copy_within(starter + 2..p_remove, starter + 1);
                            starter_is_supplementary = false;
                            p_remove -= 1;
                        }
                    } else if composite > 0xffff {
                        // The composite is longer than the starter;
                        // move the intermediate characters back one.
                        starter_is_supplementary = true;
                        buffer.s.copy_within(starter + 1..p_remove, starter + 2);
                        buffer.s[starter] = lead(composite);
                        buffer.s[starter + 1] = trail(composite);
                        p_remove += 1;
                    } else {
                        buffer.s[starter] = composite as u16;
                    }
                    // Remove the combining mark.
                    if p_remove < p {
                        buffer.s.copy_within(p..limit, p_remove);
                        limit -= p - p_remove;
                        p = p_remove;
                    }
                    // Keep prev_cc: the combining mark was removed.
                    if p == limit {
                        break;
                    }
                    // Is the composite a starter that combines forward?
                    if composite_and_fwd & 1 != 0 {
                        compositions_list =
                            Some(self.compositions_list_for_composite(self.raw_norm16(composite)));
                    } else {
                        compositions_list = None;
                    }
                    continue;
                }
            }

            // No combination this time.
            prev_cc = cc;
            if p == limit {
                break;
            }

            if cc == 0 {
                // Found a new starter.
                compositions_list = self.compositions_list_for_decomp_yes(norm16);
                if compositions_list.is_some() {
                    if c <= 0xffff {
                        starter_is_supplementary = false;
                        starter = p - 1;
                    } else {
                        starter_is_supplementary = true;
                        starter = p - 2;
                    }
                }
            } else if self.only_contiguous {
                // FCC: any intervening character blocks further composition.
                compositions_list = None;
            }
        }
        buffer.set_reordering_limit(limit);
    }

    /// Composes `src`. With `do_compose` the result is written to `buffer`;
    /// without it, returns whether `src` is already in composed form
    /// (the buffer is scratch space for substring normalization).
    pub(crate) fn compose(
        &self,
        src: &[u16],
        do_compose: bool,
        buffer: &mut ReorderingBuffer,
    ) -> bool {
        let mut src_i = 0usize;
        let mut prev_boundary = 0usize;
        let min_no_maybe_cp = self.d.min_comp_no_maybe_cp;

        'outer: loop {
            // Fast path: scan over characters below the minimum no-or-maybe
            // code point and over comp-yes characters with class zero.
            let mut prev_src;
            let mut c;
            let mut norm16;
            loop {
                if src_i == src.len() {
                    if prev_boundary != src.len() && do_compose {
                        buffer.append_zero_cc_slice(&src[prev_boundary..]);
                    }
                    return true;
                }
                c = src[src_i] as u32;
                if c < min_no_maybe_cp {
                    src_i += 1;
                    continue;
                }
                norm16 = self.d.trie.fast_bmp_get(c);
                if self.is_comp_yes_and_zero_cc(norm16) {
                    src_i += 1;
                    continue;
                }
                prev_src = src_i;
                src_i += 1;
                if !is_lead_unit(c as u16) {
                    break;
                }
                if src_i < src.len() && is_trail_unit(src[src_i]) {
                    let c2 = src[src_i];
                    src_i += 1;
                    c = (((c as u32) << 10) + c2 as u32)
                        - ((0xd800u32 << 10) + 0xdc00 - 0x10000);
                    norm16 = self.d.trie.supp_get(c);
                    if !self.is_comp_yes_and_zero_cc(norm16) {
                        break;
                    }
                }
                // Unpaired lead surrogate, or a supplementary character that
                // needs no work: keep scanning.
            }
            // norm16 >= minNoNo: the current character has a mapping, combines
            // backward, or is a combining mark with non-zero class. It is not
            // a Hangul syllable or Jamo L; those have yes properties.

            // Medium path: cases that need no full decompose-and-recompose.
            if !self.is_maybe_or_non_zero_cc(norm16) {
                if !do_compose {
                    return false;
                }
                if self.is_decomp_no_algorithmic(norm16) {
                    // Maps to a single comp-yes zero-cc character, which also
                    // implies a boundary before it.
                    if self.norm16_has_comp_boundary_after(norm16)
                        || self.has_comp_boundary_before_at(src, src_i)
                    {
                        if prev_boundary != prev_src {
                            buffer.append_zero_cc_slice(&src[prev_boundary..prev_src]);
                        }
                        buffer.append(self.map_algorithmic(c, norm16), 0);
                        prev_boundary = src_i;
                        continue 'outer;
                    }
                } else if norm16 < self.d.min_no_no_comp_boundary_before {
                    // The mapping is comp-normalized, implying a boundary before.
                    if self.norm16_has_comp_boundary_after(norm16)
                        || self.has_comp_boundary_before_at(src, src_i)
                    {
                        if prev_boundary != prev_src {
                            buffer.append_zero_cc_slice(&src[prev_boundary..prev_src]);
                        }
                        let m = self.mapping_index(norm16);
                        let length = (self.d.extra[m] & MAPPING_LENGTH_MASK) as usize;
                        buffer.append_zero_cc_slice(&self.d.extra[m + 1..m + 1 + length]);
                        prev_boundary = src_i;
                        continue 'outer;
                    }
                } else if norm16 >= self.d.min_no_no_empty {
                    // The character maps to nothing: omit it when there is a
                    // boundary on either side; the character itself implies
                    // no boundaries.
                    if self.has_comp_boundary_before_at(src, src_i)
                        || self.has_comp_boundary_after_range(src, prev_boundary, prev_src)
                    {
                        if prev_boundary != prev_src {
                            buffer.append_zero_cc_slice(&src[prev_boundary..prev_src]);
                        }
                        prev_boundary = src_i;
                        continue 'outer;
                    }
                }
                // Other no-no, or more context is needed: slow path.
            } else if Self::is_jamo_vt(norm16) && prev_boundary != prev_src {
                let prev = src[prev_src - 1];
                if c < JAMO_T_BASE {
                    // Jamo Vowel: compose with the previous Jamo L and a
                    // following Jamo T.
                    let l = (prev as u32).wrapping_sub(JAMO_L_BASE);
                    if l < JAMO_L_COUNT {
                        if !do_compose {
                            return false;
                        }
                        let mut t = -1i32;
                        if src_i < src.len() {
                            let t2 = src[src_i] as i32 - JAMO_T_BASE as i32;
                            if t2 > 0 && t2 < JAMO_T_COUNT as i32 {
                                t = t2;
                                src_i += 1;
                            }
                        }
                        if t < 0 && self.has_comp_boundary_before_at(src, src_i) {
                            // No Jamo T follows, not even via decomposition.
                            t = 0;
                        }
                        if t >= 0 {
                            let syllable = HANGUL_BASE
                                + (l * JAMO_V_COUNT + (c - JAMO_V_BASE)) * JAMO_T_COUNT
                                + t as u32;
                            let replace_from = prev_src - 1; // replace the Jamo L too
                            if prev_boundary != replace_from {
                                buffer.append_zero_cc_slice(&src[prev_boundary..replace_from]);
                            }
                            buffer.append_bmp(syllable as u16, 0);
                            prev_boundary = src_i;
                            continue 'outer;
                        }
                        // L+V+x with x != T: decompose and recompose to deal
                        // with a compatibility variant of a T.
                    }
                } else if is_hangul_lv_cp(prev as u32) {
                    // Jamo T after an LV syllable without a T.
                    if !do_compose {
                        return false;
                    }
                    let syllable = prev as u32 + c - JAMO_T_BASE;
                    let replace_from = prev_src - 1; // replace the LV too
                    if prev_boundary != replace_from {
                        buffer.append_zero_cc_slice(&src[prev_boundary..replace_from]);
                    }
                    buffer.append_bmp(syllable as u16, 0);
                    prev_boundary = src_i;
                    continue 'outer;
                }
                // No matching context: slow path.
            } else if norm16 > JAMO_VT {
                // One or more combining marks that do not combine backward:
                // copy unchanged when in canonical order and followed by a
                // character with a boundary before it.
                let cc = Self::cc_from_normal_yes_or_maybe(norm16);
                if self.only_contiguous
                    && self.get_previous_trail_cc(src, prev_boundary, prev_src) > cc
                {
                    // Fails the FCD test: decompose and contiguously recompose.
                    if !do_compose {
                        return false;
                    }
                } else {
                    let mut cc = cc;
                    let mut next_src;
                    let n16;
                    loop {
                        if src_i == src.len() {
                            if do_compose {
                                buffer.append_zero_cc_slice(&src[prev_boundary..]);
                            }
                            return true;
                        }
                        let prev_cc = cc;
                        next_src = src_i;
                        let (_, next16) = self.d.trie.next16(src, &mut next_src);
                        if next16 >= MIN_YES_YES_WITH_CC {
                            cc = Self::cc_from_normal_yes_or_maybe(next16);
                            if prev_cc > cc {
                                if !do_compose {
                                    return false;
                                }
                                n16 = next16;
                                break;
                            }
                        } else {
                            n16 = next16;
                            break;
                        }
                        src_i = next_src;
                    }
                    // src_i is after the last in-order combining mark.
                    if self.norm16_has_comp_boundary_before(n16) {
                        if self.is_comp_yes_and_zero_cc(n16) {
                            src_i = next_src;
                        }
                        continue 'outer;
                    }
                    // No boundary in [prev_src, src_i): slow path.
                }
            }

            // Slow path: find the nearest boundaries around the current
            // character, decompose and recompose.
            if prev_boundary != prev_src && !self.norm16_has_comp_boundary_before(norm16) {
                let mut rel = prev_src - prev_boundary;
                let (_, n2) = self.d.trie.prev16(&src[prev_boundary..prev_src], &mut rel);
                if !self.norm16_has_comp_boundary_after(n2) {
                    prev_src = prev_boundary + rel;
                }
            }
            if do_compose && prev_boundary != prev_src {
                buffer.append_zero_cc_slice(&src[prev_boundary..prev_src]);
            }
            let recompose_start = buffer.len();
            // There is no boundary inside this segment.
            self.decompose_short(src, prev_src, src_i, false, buffer);
            src_i = self.decompose_short(src, src_i, src.len(), true, buffer);
            self.recompose(buffer, recompose_start);
            if !do_compose {
                if !buffer.equals(&src[prev_src..src_i]) {
                    return false;
                }
                buffer.clear();
            }
            prev_boundary = src_i;
        }
    }

    /// Composes into a fresh vector.
    pub(crate) fn normalize(&self, src: &[u16]) -> Vec<u16> {
        let mut buffer = ReorderingBuffer::new(*self);
        self.compose(src, true, &mut buffer);
        buffer.into_vec()
    }

    /// Quick check: is `src` already in composed form?
    pub(crate) fn is_normalized(&self, src: &[u16]) -> bool {
        let mut buffer = ReorderingBuffer::new(*self);
        self.compose(src, false, &mut buffer)
    }

    /// Conservative UTF-8 quick check driven by the trie's byte cursor:
    /// true only when every code point is comp-yes with class zero or an
    /// in-order combining mark that does not combine backward. Ill-formed
    /// bytes and maybe-band characters report false.
    pub(crate) fn is_normalized_utf8(&self, s: &[u8]) -> bool {
        // The error slot holds the inert value, so an ill-formed sequence is
        // re-checked for well-formedness before it may pass.
        let error_value = self.d.trie.error_value();
        let mut i = 0usize;
        let mut prev_cc = 0u8;
        while i < s.len() {
            if s[i] < 0x80 {
                i += 1;
                prev_cc = 0;
                continue;
            }
            let start = i;
            let norm16 = self.d.trie.next16_u8(s, &mut i);
            if norm16 == error_value && !well_formed(s, start, i) {
                return false;
            }
            if self.is_comp_yes_and_zero_cc(norm16) {
                prev_cc = self.trail_cc_from_comp_yes_and_zero_cc(norm16);
            } else if norm16 >= MIN_YES_YES_WITH_CC {
                let cc = Self::cc_from_normal_yes_or_maybe(norm16);
                if prev_cc > cc {
                    return false;
                }
                prev_cc = cc;
            } else {
                // A mapping, a backward combiner, or Jamo V/T.
                return false;
            }
        }
        true
    }
}

/// Whether `s[start..end]` is one well-formed UTF-8 sequence.
fn well_formed(s: &[u8], start: usize, end: usize) -> bool {
    std::str::from_utf8(&s[start..end]).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nfc() -> NormalizerCore {
        NormalizerCore::nfc().unwrap()
    }

    fn utf16(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn norm_str(s: &str) -> String {
        String::from_utf16(&nfc().normalize(&utf16(s))).unwrap()
    }

    #[test]
    fn composes_latin() {
        assert_eq!(norm_str("e\u{301}"), "é");
        assert_eq!(norm_str("u\u{308}"), "ü");
        assert_eq!(norm_str("Bu\u{308}cher"), "Bücher");
        assert_eq!(norm_str("abc"), "abc");
    }

    #[test]
    fn progressive_composition() {
        // a + circumflex + acute composes through â to ấ
        assert_eq!(norm_str("a\u{302}\u{301}"), "\u{1EA5}");
        // dot below reorders before the circumflex, then both compose
        assert_eq!(norm_str("a\u{302}\u{323}"), "\u{1EAD}");
        assert_eq!(norm_str("\u{3B1}\u{313}\u{301}"), "\u{1F04}");
        assert_eq!(norm_str("\u{3B9}\u{308}\u{301}"), "\u{390}");
    }

    #[test]
    fn reorders_marks() {
        // acute (230) then dot below (220): the dot reorders in front and
        // composes; the acute stays as a lone mark
        let out = nfc().normalize(&utf16("e\u{301}\u{323}"));
        assert_eq!(out, utf16("\u{1EB9}\u{301}"));
    }

    #[test]
    fn hangul() {
        assert_eq!(norm_str("\u{1100}\u{1161}"), "\u{AC00}");
        assert_eq!(norm_str("\u{1100}\u{1161}\u{11A8}"), "\u{AC01}");
        assert_eq!(norm_str("\u{AC00}\u{11A8}"), "\u{AC01}");
        assert!(nfc().is_normalized(&utf16("\u{AC01}")));
        assert!(!nfc().is_normalized(&utf16("\u{1100}\u{1161}")));

        let mut jamos = [0u16; 3];
        assert_eq!(hangul_decompose(0xAC01, &mut jamos), 3);
        assert_eq!(jamos, [0x1100, 0x1161, 0x11A8]);
        assert_eq!(hangul_decompose(0xAC00, &mut jamos), 2);
    }

    #[test]
    fn singletons_and_exclusions() {
        assert_eq!(norm_str("\u{212B}"), "Å");
        assert_eq!(norm_str("\u{2126}"), "Ω");
        assert_eq!(norm_str("\u{0958}"), "\u{0915}\u{093C}");
        // excluded pair: no recomposition
        assert_eq!(norm_str("\u{0915}\u{093C}"), "\u{0915}\u{093C}");
        assert_eq!(norm_str("\u{FB31}"), "\u{05D1}\u{05BC}");
        assert_eq!(norm_str("\u{2F800}"), "\u{4E3D}");
    }

    #[test]
    fn idempotent_and_quick_check() {
        let samples = [
            "\u{1EA5}\u{1EAD}\u{1EB7}",
            "éèêëē",
            "ангстрём \u{212B}",
            "가각힣 \u{1100}\u{1161}\u{11A8}",
            "\u{5E9}\u{5B8}\u{5C1}",
            "\u{958}\u{300}",
            "xn--bcher-kva",
        ];
        for s in samples {
            let once = nfc().normalize(&utf16(s));
            let twice = nfc().normalize(&once);
            assert_eq!(once, twice, "not idempotent for {s:?}");
            assert!(nfc().is_normalized(&once));
        }
    }

    #[test]
    fn predicates() {
        let n = nfc();
        assert!(n.is_comp_inert('x' as u32));
        assert!(!n.is_comp_inert(0x301));
        assert!(!n.is_comp_inert('e' as u32)); // combines forward
        assert!(n.has_comp_boundary_before('a' as u32));
        assert!(!n.has_comp_boundary_before(0x301));
        assert!(!n.has_comp_boundary_after(0xE9)); // é can take more marks
        assert_eq!(n.cc(0x301), 230);
        assert_eq!(n.cc(0x323), 220);
        assert_eq!(n.cc(0x94D), 9);
        assert_eq!(n.cc('a' as u32), 0);
        assert_eq!(n.get_fcd16(0xE9), 230);
        assert_eq!(n.get_fcd16(0x301), (230 << 8) | 230);
        assert_eq!(n.get_fcd16('A' as u32), 0);
    }

    #[test]
    fn utf8_quick_check() {
        let n = nfc();
        assert!(n.is_normalized_utf8(b"hello"));
        assert!(n.is_normalized_utf8("héllo".as_bytes()));
        assert!(n.is_normalized_utf8("日本語".as_bytes()));
        // 0301 combines backward: maybe, not a definite yes
        assert!(!n.is_normalized_utf8("he\u{301}llo".as_bytes()));
        // truncated sequence
        assert!(!n.is_normalized_utf8(&[0x66, 0xC3]));
    }
}
