// Copyright 2013-2014 The rust-url developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [*Unicode IDNA Compatibility Processing*
//! (Unicode Technical Standard #46)](http://www.unicode.org/reports/tr46/)
//!
//! The processor maps the input through the UTS #46 character table,
//! normalizes it, splits it into labels, decodes and revalidates ACE
//! (`xn--`) labels, applies the validity criteria with the BiDi, CONTEXTJ
//! and CONTEXTO rules, and assembles the requested form. Validation
//! failures accumulate into an [`IdnaInfo`] bitset and never abort
//! processing; output is always produced on a best-effort basis so that
//! callers can show diagnostics. Lookup callers must treat any error bit
//! as failure.

use bitflags::bitflags;

use crate::buffer::next_code_point;
use crate::data::mapping::{map_char, Mapping};
use crate::normalizer::NormalizerCore;
use crate::properties::{
    bidi_class, is_combining_mark, joining_type, script, BidiClass, JoiningType, Script,
};
use crate::punycode;
use crate::ProcessingError;

/// The ACE prefix "xn--" as UTF-16 units.
const ACE_PREFIX: [u16; 4] = [0x78, 0x6e, 0x2d, 0x2d];

bitflags! {
    /// IDNA processing error kinds; the numeric values are stable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IdnaErrors: u32 {
        /// A non-final label was empty.
        const EMPTY_LABEL = 0x0001;
        /// A label was longer than 63 octets in its ASCII form.
        const LABEL_TOO_LONG = 0x0002;
        /// The domain name was longer than 253 octets, or empty.
        const DOMAIN_NAME_TOO_LONG = 0x0004;
        /// A label started with "-".
        const LEADING_HYPHEN = 0x0008;
        /// A label ended with "-".
        const TRAILING_HYPHEN = 0x0010;
        /// A label contained hyphens in the third and fourth positions.
        const HYPHEN_3_4 = 0x0020;
        /// A label started with a combining mark.
        const LEADING_COMBINING_MARK = 0x0040;
        /// A label or the domain name contained a disallowed character.
        const DISALLOWED = 0x0080;
        /// A label started with "xn--" but did not decode as Punycode.
        const PUNYCODE = 0x0100;
        /// A label contained a dot (only possible after ACE decoding or in
        /// single-label processing).
        const LABEL_HAS_DOT = 0x0200;
        /// An "xn--" label did not round-trip through mapping and
        /// normalization.
        const INVALID_ACE_LABEL = 0x0400;
        /// The domain name violated the BiDi rules (RFC 5893).
        const BIDI = 0x0800;
        /// A joiner violated the CONTEXTJ rules (RFC 5892 Appendix A).
        const CONTEXTJ = 0x1000;
        /// A punctuation character violated its CONTEXTO rule.
        const CONTEXTO_PUNCTUATION = 0x2000;
        /// Arabic-Indic and Extended Arabic-Indic digits were mixed.
        const CONTEXTO_DIGITS = 0x4000;
    }
}

bitflags! {
    /// Processing options; the numeric values follow the original API.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Uts46Options: u32 {
        /// Only letters, digits and hyphens are allowed in ASCII.
        const USE_STD3_RULES = 2;
        /// Apply the RFC 5893 BiDi rules.
        const CHECK_BIDI = 4;
        /// Apply the RFC 5892 CONTEXTJ rules for joiners.
        const CHECK_CONTEXTJ = 8;
        /// Use nontransitional processing for ToASCII.
        const NONTRANSITIONAL_TO_ASCII = 0x10;
        /// Use nontransitional processing for ToUnicode.
        const NONTRANSITIONAL_TO_UNICODE = 0x20;
        /// Apply the CONTEXTO rules for punctuation and digits.
        const CHECK_CONTEXTO = 0x40;
    }
}

impl Uts46Options {
    /// IDNA2008 lookup options: BiDi, CONTEXTJ and CONTEXTO checks with
    /// nontransitional processing in both directions.
    pub fn lookup() -> Uts46Options {
        Uts46Options::CHECK_BIDI
            | Uts46Options::CHECK_CONTEXTJ
            | Uts46Options::CHECK_CONTEXTO
            | Uts46Options::NONTRANSITIONAL_TO_ASCII
            | Uts46Options::NONTRANSITIONAL_TO_UNICODE
    }
}

/// Per-call processing results: the accumulated error bits, whether any
/// deviation character made transitional and nontransitional processing
/// differ, and the BiDi state. Reset at the start of every public call.
#[derive(Debug)]
pub struct IdnaInfo {
    errors: IdnaErrors,
    is_transitional_different: bool,
    is_bidi: bool,
    is_ok_bidi: bool,
}

impl Default for IdnaInfo {
    fn default() -> Self {
        IdnaInfo {
            errors: IdnaErrors::empty(),
            is_transitional_different: false,
            is_bidi: false,
            is_ok_bidi: true,
        }
    }
}

impl IdnaInfo {
    pub fn new() -> IdnaInfo {
        IdnaInfo::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> IdnaErrors {
        self.errors
    }

    pub fn is_transitional_different(&self) -> bool {
        self.is_transitional_different
    }

    fn reset(&mut self) {
        *self = IdnaInfo::default();
    }
}

/// Byte-oriented output abstraction for the UTF-8 entry points: an append
/// buffer plus a flush signal.
pub trait ByteSink {
    fn append(&mut self, bytes: &[u8]);
    fn flush(&mut self) {}
}

impl ByteSink for Vec<u8> {
    fn append(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl ByteSink for String {
    fn append(&mut self, bytes: &[u8]) {
        // The processor only emits well-formed UTF-8.
        self.push_str(std::str::from_utf8(bytes).unwrap_or("\u{FFFD}"));
    }
}

/// A UTS #46 processor with a fixed option set.
pub struct Uts46 {
    options: Uts46Options,
    norm: NormalizerCore,
}

impl Uts46 {
    pub fn new(options: Uts46Options) -> Result<Uts46, ProcessingError> {
        Ok(Uts46 {
            options,
            norm: NormalizerCore::nfc()?,
        })
    }

    pub fn options(&self) -> Uts46Options {
        self.options
    }

    // --- UTF-16 entry points --------------------------------------------

    pub fn label_to_ascii(
        &self,
        label: &[u16],
        info: &mut IdnaInfo,
    ) -> Result<Vec<u16>, ProcessingError> {
        info.reset();
        self.process(label, true, true, info)
    }

    pub fn label_to_unicode(
        &self,
        label: &[u16],
        info: &mut IdnaInfo,
    ) -> Result<Vec<u16>, ProcessingError> {
        info.reset();
        self.process(label, true, false, info)
    }

    pub fn name_to_ascii(
        &self,
        name: &[u16],
        info: &mut IdnaInfo,
    ) -> Result<Vec<u16>, ProcessingError> {
        info.reset();
        self.process(name, false, true, info)
    }

    pub fn name_to_unicode(
        &self,
        name: &[u16],
        info: &mut IdnaInfo,
    ) -> Result<Vec<u16>, ProcessingError> {
        info.reset();
        self.process(name, false, false, info)
    }

    // --- UTF-8 entry points ---------------------------------------------

    pub fn label_to_ascii_utf8<S: ByteSink + ?Sized>(
        &self,
        label: &[u8],
        sink: &mut S,
        info: &mut IdnaInfo,
    ) -> Result<(), ProcessingError> {
        self.process_utf8(label, true, true, sink, info)
    }

    pub fn label_to_unicode_utf8<S: ByteSink + ?Sized>(
        &self,
        label: &[u8],
        sink: &mut S,
        info: &mut IdnaInfo,
    ) -> Result<(), ProcessingError> {
        self.process_utf8(label, true, false, sink, info)
    }

    pub fn name_to_ascii_utf8<S: ByteSink + ?Sized>(
        &self,
        name: &[u8],
        sink: &mut S,
        info: &mut IdnaInfo,
    ) -> Result<(), ProcessingError> {
        self.process_utf8(name, false, true, sink, info)
    }

    pub fn name_to_unicode_utf8<S: ByteSink + ?Sized>(
        &self,
        name: &[u8],
        sink: &mut S,
        info: &mut IdnaInfo,
    ) -> Result<(), ProcessingError> {
        self.process_utf8(name, false, false, sink, info)
    }

    // --- pipeline --------------------------------------------------------

    fn process(
        &self,
        src: &[u16],
        is_label: bool,
        to_ascii: bool,
        info: &mut IdnaInfo,
    ) -> Result<Vec<u16>, ProcessingError> {
        if src.is_empty() {
            if is_label {
                info.errors |= IdnaErrors::EMPTY_LABEL;
            }
            return Ok(Vec::new());
        }
        if is_simple(src.iter().map(|&u| u as u32), is_label) {
            return Ok(src.to_vec());
        }
        let mapped = self.map_units(src, self.transitional(to_ascii), info);
        let normalized = self.norm.normalize(&mapped);
        self.process_labels(&normalized, is_label, to_ascii, info)
    }

    fn process_utf8<S: ByteSink + ?Sized>(
        &self,
        src: &[u8],
        is_label: bool,
        to_ascii: bool,
        sink: &mut S,
        info: &mut IdnaInfo,
    ) -> Result<(), ProcessingError> {
        info.reset();
        if src.is_empty() {
            if is_label {
                info.errors |= IdnaErrors::EMPTY_LABEL;
            }
            sink.flush();
            return Ok(());
        }
        if is_simple(src.iter().map(|&b| b as u32), is_label) {
            sink.append(src);
            sink.flush();
            return Ok(());
        }
        let (units, had_errors) = utf8_to_utf16(src);
        if had_errors {
            info.errors |= IdnaErrors::DISALLOWED;
        }
        // When the input is already valid, lower-case and normalized (checked
        // with the trie's byte cursor), the mapping and normalization passes
        // can be skipped entirely.
        let out = if !had_errors
            && self.norm.is_normalized_utf8(src)
            && all_chars_valid(&units)
        {
            self.process_labels(&units, is_label, to_ascii, info)?
        } else {
            let mapped = self.map_units(&units, self.transitional(to_ascii), info);
            let normalized = self.norm.normalize(&mapped);
            self.process_labels(&normalized, is_label, to_ascii, info)?
        };
        let text = String::from_utf16_lossy(&out);
        sink.append(text.as_bytes());
        sink.flush();
        Ok(())
    }

    fn transitional(&self, to_ascii: bool) -> bool {
        if to_ascii {
            !self.options.contains(Uts46Options::NONTRANSITIONAL_TO_ASCII)
        } else {
            !self.options.contains(Uts46Options::NONTRANSITIONAL_TO_UNICODE)
        }
    }

    /// Applies the character mapping table to a UTF-16 sequence.
    fn map_units(&self, src: &[u16], transitional: bool, info: &mut IdnaInfo) -> Vec<u16> {
        let mut out = Vec::with_capacity(src.len());
        let mut i = 0;
        while i < src.len() {
            let (cp, next) = next_code_point(src, i);
            i = next;
            match char::from_u32(cp) {
                Some(c) => self.map_char_into(c, transitional, info, &mut out),
                None => {
                    // unpaired surrogate
                    info.errors |= IdnaErrors::DISALLOWED;
                    out.push(0xFFFD);
                }
            }
        }
        out
    }

    fn map_char_into(
        &self,
        c: char,
        transitional: bool,
        info: &mut IdnaInfo,
        out: &mut Vec<u16>,
    ) {
        let std3 = self.options.contains(Uts46Options::USE_STD3_RULES);
        match map_char(c) {
            Mapping::Valid => push_char(out, c),
            Mapping::Ignored => {}
            Mapping::Mapped(s) => push_str(out, s),
            Mapping::MappedChar(m) => push_char(out, m),
            Mapping::Deviation(s) => {
                info.is_transitional_different = true;
                if transitional {
                    push_str(out, s);
                } else {
                    push_char(out, c);
                }
            }
            Mapping::Disallowed => {
                info.errors |= IdnaErrors::DISALLOWED;
                push_char(out, c);
            }
            Mapping::DisallowedStd3Valid => {
                if std3 {
                    info.errors |= IdnaErrors::DISALLOWED;
                }
                push_char(out, c);
            }
            Mapping::DisallowedStd3Mapped(s) => {
                if std3 {
                    info.errors |= IdnaErrors::DISALLOWED;
                }
                push_str(out, s);
            }
            Mapping::DisallowedStd3MappedChar(m) => {
                if std3 {
                    info.errors |= IdnaErrors::DISALLOWED;
                }
                push_char(out, m);
            }
        }
    }

    /// Mapping plus normalization without touching the caller's info; used
    /// for the ACE round-trip comparison.
    fn map_normalize_quiet(&self, units: &[u16]) -> Vec<u16> {
        let mut scratch = IdnaInfo::default();
        let mapped = self.map_units(units, false, &mut scratch);
        self.norm.normalize(&mapped)
    }

    /// Splits on '.' and processes each label; assembles the output.
    fn process_labels(
        &self,
        normalized: &[u16],
        is_label: bool,
        to_ascii: bool,
        info: &mut IdnaInfo,
    ) -> Result<Vec<u16>, ProcessingError> {
        let mut out: Vec<u16>;
        if is_label {
            out = self.process_label(normalized, to_ascii, info)?;
        } else {
            out = Vec::with_capacity(normalized.len());
            let mut start = 0usize;
            let mut first = true;
            loop {
                let end = normalized[start..]
                    .iter()
                    .position(|&u| u == b'.' as u16)
                    .map(|p| start + p)
                    .unwrap_or(normalized.len());
                let is_last = end == normalized.len();
                if !first {
                    out.push(b'.' as u16);
                }
                first = false;
                let label = &normalized[start..end];
                if label.is_empty() {
                    // The root label is permitted; any other empty label is
                    // an error.
                    if !is_last {
                        info.errors |= IdnaErrors::EMPTY_LABEL;
                    }
                } else {
                    let processed = self.process_label(label, to_ascii, info)?;
                    out.extend_from_slice(&processed);
                }
                if is_last {
                    break;
                }
                start = end + 1;
            }
        }
        if to_ascii && !is_label {
            let effective = if out.last() == Some(&(b'.' as u16)) {
                out.len() - 1
            } else {
                out.len()
            };
            if effective == 0 || effective > 253 {
                info.errors |= IdnaErrors::DOMAIN_NAME_TOO_LONG;
            }
        }
        if self.options.contains(Uts46Options::CHECK_BIDI) && info.is_bidi && !info.is_ok_bidi {
            info.errors |= IdnaErrors::BIDI;
        }
        Ok(out)
    }

    /// Processes one non-empty label and returns its output form.
    fn process_label(
        &self,
        label: &[u16],
        to_ascii: bool,
        info: &mut IdnaInfo,
    ) -> Result<Vec<u16>, ProcessingError> {
        let mut errs = IdnaErrors::empty();

        // ACE prefix detection and Punycode decoding.
        let (working, from_ace) = if label.len() >= 4 && label[..4] == ACE_PREFIX {
            let mut decoder = punycode::Decoder::default();
            match decoder.decode(&label[4..]) {
                Err(()) => {
                    // Mark the bad ACE label with a replacement character.
                    info.errors |= IdnaErrors::PUNYCODE;
                    let mut marked = label.to_vec();
                    marked.push(0xFFFD);
                    return Ok(marked);
                }
                Ok(iter) => {
                    let mut decoded: Vec<u16> = Vec::new();
                    for c in iter {
                        push_char(&mut decoded, c);
                    }
                    if decoded.is_empty() {
                        errs |= IdnaErrors::EMPTY_LABEL;
                    } else if self.map_normalize_quiet(&decoded) != decoded {
                        // Not in mapped-and-normalized form: the ACE label
                        // does not round-trip.
                        errs |= IdnaErrors::INVALID_ACE_LABEL;
                    }
                    (decoded, true)
                }
            }
        } else {
            (label.to_vec(), false)
        };

        let chars = utf16_to_chars(&working);

        // Validity criteria, in order; all failures accumulate.
        if let Some(&first) = chars.first() {
            if is_combining_mark(first) {
                errs |= IdnaErrors::LEADING_COMBINING_MARK;
            }
        }
        let std3 = self.options.contains(Uts46Options::USE_STD3_RULES);
        for &c in &chars {
            match map_char(c) {
                Mapping::Valid | Mapping::Deviation(_) => {}
                Mapping::DisallowedStd3Valid => {
                    if std3 {
                        errs |= IdnaErrors::DISALLOWED;
                    }
                }
                _ => errs |= IdnaErrors::DISALLOWED,
            }
        }
        if chars.contains(&'.') {
            errs |= IdnaErrors::LABEL_HAS_DOT;
        }
        if !from_ace && chars.len() >= 4 && chars[2] == '-' && chars[3] == '-' {
            errs |= IdnaErrors::HYPHEN_3_4;
        }
        if chars.first() == Some(&'-') {
            errs |= IdnaErrors::LEADING_HYPHEN;
        }
        if chars.last() == Some(&'-') {
            errs |= IdnaErrors::TRAILING_HYPHEN;
        }
        if self.options.contains(Uts46Options::CHECK_CONTEXTJ) && !self.label_ok_context_j(&chars)
        {
            errs |= IdnaErrors::CONTEXTJ;
        }
        if self.options.contains(Uts46Options::CHECK_CONTEXTO) {
            self.check_label_context_o(&chars, &mut errs);
        }
        if self.options.contains(Uts46Options::CHECK_BIDI) {
            check_label_bidi(&chars, info);
        }

        let severe = errs
            & (IdnaErrors::LEADING_COMBINING_MARK
                | IdnaErrors::DISALLOWED
                | IdnaErrors::PUNYCODE
                | IdnaErrors::LABEL_HAS_DOT
                | IdnaErrors::INVALID_ACE_LABEL);

        let out = if to_ascii {
            if severe.is_empty() {
                if from_ace {
                    if label.len() > 63 {
                        errs |= IdnaErrors::LABEL_TOO_LONG;
                    }
                    label.to_vec()
                } else if working.iter().all(|&u| u < 0x80) {
                    if working.len() > 63 {
                        errs |= IdnaErrors::LABEL_TOO_LONG;
                    }
                    working
                } else {
                    let mut ace = String::from("xn--");
                    match punycode::encode_into(chars.iter().copied(), &mut ace) {
                        Ok(()) => {}
                        Err(_) => return Err(ProcessingError::InternalProgramError),
                    }
                    if ace.len() > 63 {
                        errs |= IdnaErrors::LABEL_TOO_LONG;
                    }
                    ace.bytes().map(|b| b as u16).collect()
                }
            } else {
                // Severe errors suppress ACE re-encoding; keep the
                // best-effort text.
                working
            }
        } else {
            working
        };
        info.errors |= errs;
        Ok(out)
    }

    // --- CONTEXTJ / CONTEXTO ---------------------------------------------

    /// RFC 5892 Appendix A: ZWJ requires a preceding virama; ZWNJ requires
    /// a preceding virama or a {L,D} T* _ T* {R,D} joining context.
    fn label_ok_context_j(&self, chars: &[char]) -> bool {
        for (i, &c) in chars.iter().enumerate() {
            if c == '\u{200D}' {
                if i == 0 || self.norm.cc(chars[i - 1] as u32) != 9 {
                    return false;
                }
            } else if c == '\u{200C}' {
                if i > 0 && self.norm.cc(chars[i - 1] as u32) == 9 {
                    continue;
                }
                let mut joins_before = false;
                for j in (0..i).rev() {
                    match joining_type(chars[j]) {
                        JoiningType::T => continue,
                        JoiningType::D => joins_before = true,
                        _ => {}
                    }
                    break;
                }
                if !joins_before {
                    return false;
                }
                let mut joins_after = false;
                for &after in &chars[i + 1..] {
                    match joining_type(after) {
                        JoiningType::T => continue,
                        JoiningType::R | JoiningType::D => joins_after = true,
                        _ => {}
                    }
                    break;
                }
                if !joins_after {
                    return false;
                }
            }
        }
        true
    }

    fn check_label_context_o(&self, chars: &[char], errs: &mut IdnaErrors) {
        let mut arabic_indic = false;
        let mut extended_arabic_indic = false;
        for (i, &c) in chars.iter().enumerate() {
            match c {
                '\u{00B7}' => {
                    // only between two 'l'
                    if !(i > 0
                        && i + 1 < chars.len()
                        && chars[i - 1] == 'l'
                        && chars[i + 1] == 'l')
                    {
                        *errs |= IdnaErrors::CONTEXTO_PUNCTUATION;
                    }
                }
                '\u{0375}' => {
                    // only before a Greek letter
                    if !(i + 1 < chars.len() && script(chars[i + 1]) == Script::Greek) {
                        *errs |= IdnaErrors::CONTEXTO_PUNCTUATION;
                    }
                }
                '\u{05F3}' | '\u{05F4}' => {
                    // only after a Hebrew letter
                    if !(i > 0 && script(chars[i - 1]) == Script::Hebrew) {
                        *errs |= IdnaErrors::CONTEXTO_PUNCTUATION;
                    }
                }
                '\u{30FB}' => {
                    if !chars.iter().any(|&x| {
                        matches!(
                            script(x),
                            Script::Hiragana | Script::Katakana | Script::Han
                        )
                    }) {
                        *errs |= IdnaErrors::CONTEXTO_PUNCTUATION;
                    }
                }
                '\u{0660}'..='\u{0669}' => arabic_indic = true,
                '\u{06F0}'..='\u{06F9}' => extended_arabic_indic = true,
                _ => {}
            }
        }
        if arabic_indic && extended_arabic_indic {
            *errs |= IdnaErrors::CONTEXTO_DIGITS;
        }
    }
}

/// RFC 5893: evaluates the BiDi rule for one label. RTL content marks the
/// whole name as a BiDi domain name; rule violations are recorded and only
/// become an error if the name turns out to be one.
fn check_label_bidi(chars: &[char], info: &mut IdnaInfo) {
    if chars.is_empty() {
        return;
    }
    if chars
        .iter()
        .any(|&c| matches!(bidi_class(c), BidiClass::R | BidiClass::AL | BidiClass::AN))
    {
        info.is_bidi = true;
    }
    let ok = match bidi_class(chars[0]) {
        // LTR label: rules 5 and 6
        BidiClass::L => {
            chars[1..].iter().all(|&c| {
                matches!(
                    bidi_class(c),
                    BidiClass::L
                        | BidiClass::EN
                        | BidiClass::ES
                        | BidiClass::CS
                        | BidiClass::ET
                        | BidiClass::ON
                        | BidiClass::BN
                        | BidiClass::NSM
                )
            }) && {
                let last = chars
                    .iter()
                    .rev()
                    .map(|&c| bidi_class(c))
                    .find(|&cl| cl != BidiClass::NSM);
                matches!(last, None | Some(BidiClass::L) | Some(BidiClass::EN))
            }
        }
        // RTL label: rules 2, 3 and 4
        BidiClass::R | BidiClass::AL => {
            let mut found_en = false;
            let mut found_an = false;
            let all_ok = chars[1..].iter().all(|&c| {
                let class = bidi_class(c);
                if class == BidiClass::EN {
                    found_en = true;
                } else if class == BidiClass::AN {
                    found_an = true;
                }
                matches!(
                    class,
                    BidiClass::R
                        | BidiClass::AL
                        | BidiClass::AN
                        | BidiClass::EN
                        | BidiClass::ES
                        | BidiClass::CS
                        | BidiClass::ET
                        | BidiClass::ON
                        | BidiClass::BN
                        | BidiClass::NSM
                )
            });
            let last = chars
                .iter()
                .rev()
                .map(|&c| bidi_class(c))
                .find(|&cl| cl != BidiClass::NSM);
            all_ok
                && matches!(
                    last,
                    Some(BidiClass::R)
                        | Some(BidiClass::AL)
                        | Some(BidiClass::EN)
                        | Some(BidiClass::AN)
                )
                && !(found_en && found_an)
        }
        // Rule 1: the first character must be L or R/AL.
        _ => false,
    };
    if !ok {
        info.is_ok_bidi = false;
    }
}

/// The all-lowercase-ASCII passthrough: letters, digits and interior
/// hyphens only, no "xn--" prefixes, no empty labels apart from the root,
/// and within the DNS length limits. Such input is returned unchanged.
fn is_simple(units: impl Iterator<Item = u32>, is_label: bool) -> bool {
    let mut total = 0usize;
    let mut label_len = 0usize;
    let mut puny_prefix = 0usize; // chars of "xn--" matched at label start
    let mut prev = 0u32;
    for c in units {
        total += 1;
        if total > 254 {
            return false;
        }
        if c == u32::from(b'.') {
            if is_label || label_len == 0 || prev == u32::from(b'-') {
                return false;
            }
            label_len = 0;
            puny_prefix = 0;
            prev = c;
            continue;
        }
        let ok = matches!(c, 0x61..=0x7a | 0x30..=0x39) || c == u32::from(b'-');
        if !ok {
            return false;
        }
        if label_len == 0 && c == u32::from(b'-') {
            return false;
        }
        // hyphens in the third and fourth positions need the full checks
        if label_len == 3 && c == u32::from(b'-') && prev == u32::from(b'-') {
            return false;
        }
        if puny_prefix < 4 {
            if c == u32::from([b'x', b'n', b'-', b'-'][puny_prefix]) {
                puny_prefix += 1;
                if puny_prefix == 4 {
                    return false;
                }
            } else {
                puny_prefix = 4;
            }
        }
        label_len += 1;
        if label_len > 63 {
            return false;
        }
        prev = c;
    }
    if prev == u32::from(b'-') {
        return false;
    }
    let effective = if prev == u32::from(b'.') { total - 1 } else { total };
    effective >= 1 && effective <= 253
}

/// True when every character maps to itself in the UTS #46 table.
fn all_chars_valid(units: &[u16]) -> bool {
    let mut i = 0;
    while i < units.len() {
        let (cp, next) = next_code_point(units, i);
        i = next;
        match char::from_u32(cp) {
            Some(c) => {
                if map_char(c) != Mapping::Valid {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

fn push_char(out: &mut Vec<u16>, c: char) {
    let mut buf = [0u16; 2];
    out.extend_from_slice(c.encode_utf16(&mut buf));
}

fn push_str(out: &mut Vec<u16>, s: &str) {
    out.extend(s.encode_utf16());
}

fn utf16_to_chars(units: &[u16]) -> Vec<char> {
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or('\u{FFFD}'))
        .collect()
}

/// Decodes possibly ill-formed UTF-8 into UTF-16, substituting U+FFFD and
/// reporting whether any substitution happened.
fn utf8_to_utf16(src: &[u8]) -> (Vec<u16>, bool) {
    let mut out = Vec::with_capacity(src.len());
    let mut had_errors = false;
    let mut rest = src;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                out.extend(s.encode_utf16());
                break;
            }
            Err(e) => {
                let (good, bad) = rest.split_at(e.valid_up_to());
                // SAFETY-free path: valid_up_to guarantees well-formedness
                out.extend(std::str::from_utf8(good).unwrap().encode_utf16());
                out.push(0xFFFD);
                had_errors = true;
                match e.error_len() {
                    Some(len) => rest = &bad[len..],
                    None => break, // truncated sequence at the end
                }
            }
        }
    }
    (out, had_errors)
}
