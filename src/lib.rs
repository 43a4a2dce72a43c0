// Copyright 2016 The rust-url developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! IDNA processing per [*Unicode IDNA Compatibility Processing*
//! (Unicode Technical Standard #46)](http://www.unicode.org/reports/tr46/)
//! and [Punycode (RFC 3492)](https://tools.ietf.org/html/rfc3492).
//!
//! The crate converts between Unicode domain names and their
//! ASCII-Compatible Encoding ("xn--…") forms, validating labels against the
//! UTS #46 criteria, the RFC 5893 BiDi rule and the RFC 5892 CONTEXTJ and
//! CONTEXTO rules on the way. The underlying pieces are exposed as modules:
//! [`uts46`] for the processor with its error bitset and UTF-16/UTF-8 entry
//! points, and [`punycode`] for the Bootstring codec.
//!
//! Quoting from [UTS #46’s introduction](http://www.unicode.org/reports/tr46/#Introduction):
//!
//! > Initially, domain names were restricted to ASCII characters.
//! > A system was introduced in 2003 for internationalized domain names (IDN).
//! > This system is called Internationalizing Domain Names for Applications,
//! > or IDNA2003 for short.
//! > This mechanism supports IDNs by means of a client software transformation
//! > into a format known as Punycode.
//! > A revision of IDNA was approved in 2010 (IDNA2008).
//! > This revision has a number of incompatibilities with IDNA2003.
//! >
//! > The incompatibilities force implementers of client software,
//! > such as browsers and emailers,
//! > to face difficult choices during the transition period
//! > as registries shift from IDNA2003 to IDNA2008.
//! > This document specifies a mechanism
//! > that minimizes the impact of this transition for client software,
//! > allowing client software to access domains that are valid under either system.

use core::fmt;

mod buffer;
mod data;
mod normalizer;
mod properties;
pub mod punycode;
mod trie;
pub mod uts46;

pub use crate::uts46::{ByteSink, IdnaErrors, IdnaInfo, Uts46, Uts46Options};

/// Fatal infrastructure failures. These abort a call outright and leave no
/// usable output, unlike the validation failures accumulated in
/// [`IdnaInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingError {
    /// The serialized normalization data failed validation.
    InvalidFormat,
    /// Internal arithmetic left the representable range (Punycode deltas
    /// are restricted to 31 bits).
    InternalProgramError,
    /// The output sink reported an error.
    Sink,
}

impl ProcessingError {
    fn as_str(&self) -> &'static str {
        match self {
            ProcessingError::InvalidFormat => "malformed normalization data",
            ProcessingError::InternalProgramError => "internal arithmetic overflow",
            ProcessingError::Sink => "output sink failure",
        }
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ProcessingError {}

/// Errors recorded during UTS #46 processing.
///
/// This is opaque for now, mostly indicating the presence of at least one
/// error; the message lists the failed checks.
#[derive(Debug)]
pub struct Errors {
    errors: IdnaErrors,
    fatal: Option<ProcessingError>,
}

impl Errors {
    fn validation(errors: IdnaErrors) -> Errors {
        Errors {
            errors,
            fatal: None,
        }
    }

    fn fatal(e: ProcessingError) -> Errors {
        Errors {
            errors: IdnaErrors::empty(),
            fatal: Some(e),
        }
    }
}

impl From<Errors> for Result<(), Errors> {
    fn from(e: Errors) -> Result<(), Errors> {
        Err(e)
    }
}

impl std::error::Error for Errors {}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(fatal) = self.fatal {
            return fatal.fmt(f);
        }
        let mut first = true;
        for (name, _) in self.errors.iter_names() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// Default options: IDNA2008 lookup checks, nontransitional processing, no
/// ASCII STD3 restrictions.
fn default_options() -> Uts46Options {
    Uts46Options::CHECK_BIDI
        | Uts46Options::CHECK_CONTEXTJ
        | Uts46Options::NONTRANSITIONAL_TO_ASCII
        | Uts46Options::NONTRANSITIONAL_TO_UNICODE
}

fn run_to_ascii(domain: &str, options: Uts46Options) -> Result<String, Errors> {
    let uts46 = Uts46::new(options).map_err(Errors::fatal)?;
    let mut info = IdnaInfo::new();
    let mut out = String::with_capacity(domain.len());
    uts46
        .name_to_ascii_utf8(domain.as_bytes(), &mut out, &mut info)
        .map_err(Errors::fatal)?;
    if info.has_errors() {
        Err(Errors::validation(info.errors()))
    } else {
        Ok(out)
    }
}

/// The domain-to-ASCII algorithm.
///
/// Return the ASCII representation of a domain name, normalizing characters
/// (upper-case to lower-case and other kinds of equivalence) and using
/// Punycode as necessary.
///
/// This process may fail.
pub fn domain_to_ascii(domain: &str) -> Result<String, Errors> {
    run_to_ascii(domain, default_options())
}

/// The domain-to-ASCII algorithm with the STD3 ASCII rules and the CONTEXTO
/// checks enabled.
///
/// Note that this rejects various real-world names including some
/// pseudo-hosts used by TXT record-based protocols.
pub fn domain_to_ascii_strict(domain: &str) -> Result<String, Errors> {
    run_to_ascii(
        domain,
        default_options() | Uts46Options::USE_STD3_RULES | Uts46Options::CHECK_CONTEXTO,
    )
}

/// The domain-to-Unicode algorithm.
///
/// Return the Unicode representation of a domain name, normalizing
/// characters and decoding Punycode as necessary.
///
/// The first item of the tuple is the best-effort conversion, with
/// REPLACEMENT CHARACTERs marking undecodable pieces; when the second item
/// indicates an error, the first must not be used in a network protocol.
pub fn domain_to_unicode(domain: &str) -> (String, Result<(), Errors>) {
    let uts46 = match Uts46::new(default_options()) {
        Ok(uts46) => uts46,
        Err(e) => return (String::new(), Err(Errors::fatal(e))),
    };
    let mut info = IdnaInfo::new();
    let mut out = String::with_capacity(domain.len());
    if let Err(e) = uts46.name_to_unicode_utf8(domain.as_bytes(), &mut out, &mut info) {
        return (out, Err(Errors::fatal(e)));
    }
    let result = if info.has_errors() {
        Err(Errors::validation(info.errors()))
    } else {
        Ok(())
    };
    (out, result)
}
