use assert_matches::assert_matches;
use uts46::uts46::{IdnaErrors, IdnaInfo, Uts46, Uts46Options};
use uts46::{domain_to_ascii, domain_to_ascii_strict, domain_to_unicode};

fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_utf16(units: &[u16]) -> String {
    String::from_utf16(units).unwrap()
}

fn lookup() -> Uts46 {
    Uts46::new(Uts46Options::lookup()).unwrap()
}

fn transitional() -> Uts46 {
    Uts46::new(
        Uts46Options::CHECK_BIDI | Uts46Options::CHECK_CONTEXTJ | Uts46Options::CHECK_CONTEXTO,
    )
    .unwrap()
}

fn to_ascii(uts46: &Uts46, name: &str) -> (String, IdnaErrors) {
    let mut info = IdnaInfo::new();
    let out = uts46.name_to_ascii(&utf16(name), &mut info).unwrap();
    (from_utf16(&out), info.errors())
}

fn to_unicode(uts46: &Uts46, name: &str) -> (String, IdnaErrors) {
    let mut info = IdnaInfo::new();
    let out = uts46.name_to_unicode(&utf16(name), &mut info).unwrap();
    (from_utf16(&out), info.errors())
}

#[test]
fn ascii_passthrough_and_case_mapping() {
    let uts46 = lookup();
    assert_eq!(
        to_ascii(&uts46, "www.eXample.cOm"),
        ("www.example.com".to_owned(), IdnaErrors::empty())
    );
    assert_eq!(
        to_unicode(&uts46, "www.example.com"),
        ("www.example.com".to_owned(), IdnaErrors::empty())
    );
}

#[test]
fn basic_ace_encoding() {
    let uts46 = lookup();
    assert_eq!(
        to_ascii(&uts46, "Bücher.de"),
        ("xn--bcher-kva.de".to_owned(), IdnaErrors::empty())
    );
    assert_eq!(
        to_unicode(&uts46, "xn--bcher-kva.de"),
        ("bücher.de".to_owned(), IdnaErrors::empty())
    );
}

#[test]
fn transitional_vs_nontransitional_deviation() {
    // ToUnicode of an ACE label is mode-independent.
    assert_eq!(
        to_unicode(&transitional(), "xn--bss"),
        ("\u{5919}".to_owned(), IdnaErrors::empty())
    );

    // A ZWJ outside a virama context: dropped transitionally, kept (and
    // flagged by CONTEXTJ) nontransitionally.
    let (out, errors) = to_unicode(&transitional(), "b\u{200D}ss");
    assert_eq!(out, "bss");
    assert_eq!(errors, IdnaErrors::empty());

    let (out, errors) = to_unicode(&lookup(), "b\u{200D}ss");
    assert_eq!(out, "b\u{200D}ss");
    assert_eq!(errors, IdnaErrors::CONTEXTJ);

    let mut info = IdnaInfo::new();
    transitional()
        .name_to_ascii(&utf16("b\u{200D}ss"), &mut info)
        .unwrap();
    assert!(info.is_transitional_different());
}

#[test]
fn empty_labels() {
    let uts46 = lookup();
    assert_eq!(
        to_ascii(&uts46, "a..c"),
        ("a..c".to_owned(), IdnaErrors::EMPTY_LABEL)
    );
    // the root label is permitted
    assert_eq!(
        to_ascii(&uts46, "a.b."),
        ("a.b.".to_owned(), IdnaErrors::empty())
    );
}

#[test]
fn hyphen_errors() {
    let uts46 = lookup();
    assert_eq!(
        to_ascii(&uts46, "a.-b."),
        ("a.-b.".to_owned(), IdnaErrors::LEADING_HYPHEN)
    );
    let (out, errors) = to_ascii(&uts46, "b-.c");
    assert_eq!(out, "b-.c");
    assert_eq!(errors, IdnaErrors::TRAILING_HYPHEN);
    let (_, errors) = to_ascii(&uts46, "ab--cd");
    assert_eq!(errors, IdnaErrors::HYPHEN_3_4);
}

#[test]
fn sharp_s_modes() {
    assert_eq!(
        to_ascii(&transitional(), "aß.de"),
        ("ass.de".to_owned(), IdnaErrors::empty())
    );
    assert_eq!(
        to_ascii(&lookup(), "aß.de"),
        ("xn--a-qfa.de".to_owned(), IdnaErrors::empty())
    );
}

#[test]
fn label_too_long() {
    let uts46 = lookup();
    let label: String = std::iter::repeat('a').take(64).collect();
    let (out, errors) = to_ascii(&uts46, &label);
    assert_eq!(out, label);
    assert_eq!(errors, IdnaErrors::LABEL_TOO_LONG);

    let ok: String = std::iter::repeat('a').take(63).collect();
    let (_, errors) = to_ascii(&uts46, &ok);
    assert_eq!(errors, IdnaErrors::empty());
}

#[test]
fn domain_name_too_long() {
    let uts46 = lookup();
    let label: String = std::iter::repeat('a').take(63).collect();
    let long = format!("{0}.{0}.{0}.{0}.{0}", label); // 319 octets
    let (_, errors) = to_ascii(&uts46, &long);
    assert_eq!(errors, IdnaErrors::DOMAIN_NAME_TOO_LONG);

    let fits = format!("{0}.{0}.{0}.{1}", label, &label[..61]); // 253 octets
    let (_, errors) = to_ascii(&uts46, &fits);
    assert_eq!(errors, IdnaErrors::empty());
}

#[test]
fn bad_puny_label_is_marked() {
    let uts46 = lookup();
    assert_eq!(
        to_unicode(&uts46, "xn--0.pt"),
        ("xn--0\u{FFFD}.pt".to_owned(), IdnaErrors::PUNYCODE)
    );
}

#[test]
fn empty_input_is_not_an_error() {
    let uts46 = lookup();
    assert_eq!(to_ascii(&uts46, ""), (String::new(), IdnaErrors::empty()));
    assert_eq!(to_unicode(&uts46, ""), (String::new(), IdnaErrors::empty()));
}

/// https://github.com/servo/rust-url/issues/373
#[test]
fn test_punycode_prefixes() {
    assert!(domain_to_ascii_strict("xn--").is_err());
    assert!(domain_to_ascii_strict("xn---").is_err());
    assert!(domain_to_ascii_strict("xn-----").is_err());
    assert!(domain_to_ascii_strict("xn--.").is_err());
    assert!(domain_to_ascii_strict("xn--...").is_err());
    assert!(domain_to_ascii_strict(".xn--").is_err());
    assert!(domain_to_ascii_strict("...xn--").is_err());
    assert!(domain_to_ascii_strict("xn--.xn--").is_err());
    assert!(domain_to_ascii_strict("xn--.example.org").is_err());
}

#[test]
fn test_v5() {
    // IdnaTest:784 蔏｡𑰺
    assert!(unicode_normalization::char::is_combining_mark('\u{11C3A}'));
    assert!(domain_to_ascii_strict("\u{11C3A}").is_err());
    assert!(domain_to_ascii_strict("\u{850f}.\u{11C3A}").is_err());
    assert!(domain_to_ascii_strict("\u{850f}\u{ff61}\u{11C3A}").is_err());
}

#[test]
fn test_v8_bidi_rules() {
    assert_eq!(domain_to_ascii("abc").unwrap(), "abc");
    assert_eq!(domain_to_ascii("123").unwrap(), "123");
    assert_eq!(
        domain_to_ascii("\u{5D0}\u{5D1}\u{5BC}\u{5D2}").unwrap(),
        "xn--kdb3bdf"
    );
    assert_eq!(
        domain_to_ascii("\u{627}\u{628}\u{62C}").unwrap(),
        "xn--mgbcm"
    );
    assert_eq!(
        domain_to_ascii("abc.\u{627}\u{628}\u{62C}").unwrap(),
        "abc.xn--mgbcm"
    );
    assert_eq!(
        domain_to_ascii("\u{5D0}\u{5D1}\u{5BC}\u{5D2}.\u{627}\u{628}\u{62C}").unwrap(),
        "xn--kdb3bdf.xn--mgbcm"
    );

    // BiDi domain names cannot start with digits
    assert!(domain_to_ascii("0a.\u{5D0}").is_err());
    assert!(domain_to_ascii("0à.\u{5D0}").is_err());

    // BiDi chars may be punycode-encoded
    assert!(domain_to_ascii("xn--0ca24w").is_err());

    let mut info = IdnaInfo::new();
    let out = lookup().name_to_ascii(&utf16("a\u{5D0}"), &mut info).unwrap();
    assert!(info.errors().contains(IdnaErrors::BIDI));
    // best-effort output is still produced
    assert!(!out.is_empty());
}

#[test]
fn context_j() {
    let uts46 = lookup();
    // Virama (Tamil) followed by ZWJ is permitted.
    let (out, errors) = to_unicode(&uts46, "\u{0BB9}\u{0BCD}\u{200D}");
    assert_eq!(out, "\u{0BB9}\u{0BCD}\u{200D}");
    assert_eq!(errors, IdnaErrors::empty());

    // ZWNJ between dual-joining Arabic letters is permitted.
    let (_, errors) = to_unicode(&uts46, "\u{0628}\u{200C}\u{0628}");
    assert_eq!(errors, IdnaErrors::empty());

    // ZWNJ with no joining context is not.
    let (_, errors) = to_unicode(&uts46, "a\u{200C}b");
    assert_eq!(errors, IdnaErrors::CONTEXTJ);
}

#[test]
fn context_o() {
    let strict = Uts46::new(Uts46Options::lookup() | Uts46Options::USE_STD3_RULES).unwrap();
    // l·l is permitted, anything else around the middle dot is not
    let (_, errors) = to_ascii(&strict, "l\u{00B7}l");
    assert_eq!(errors, IdnaErrors::empty());
    let (_, errors) = to_ascii(&strict, "a\u{00B7}b");
    assert_eq!(errors, IdnaErrors::CONTEXTO_PUNCTUATION);

    // Greek numeral sign requires a following Greek letter
    let (_, errors) = to_ascii(&strict, "\u{0375}\u{03B1}");
    assert_eq!(errors, IdnaErrors::empty());
    let (_, errors) = to_ascii(&strict, "\u{0375}a");
    assert_eq!(errors, IdnaErrors::CONTEXTO_PUNCTUATION);

    // Hebrew punctuation requires a preceding Hebrew letter
    let (_, errors) = to_ascii(&strict, "\u{05D0}\u{05F3}");
    assert_eq!(errors, IdnaErrors::empty());
    let (_, errors) = to_ascii(&strict, "a\u{05F3}");
    assert!(errors.contains(IdnaErrors::CONTEXTO_PUNCTUATION));

    // Katakana middle dot requires Japanese script content in the label
    let (_, errors) = to_ascii(&strict, "\u{30A2}\u{30FB}\u{30A4}");
    assert_eq!(errors, IdnaErrors::empty());
    let (_, errors) = to_ascii(&strict, "ab\u{30FB}cd");
    assert_eq!(errors, IdnaErrors::CONTEXTO_PUNCTUATION);

    // Arabic-Indic and Extended Arabic-Indic digits cannot be mixed
    let (_, errors) = to_ascii(&strict, "\u{0661}\u{06F1}");
    assert!(errors.contains(IdnaErrors::CONTEXTO_DIGITS));
    let (_, errors) = to_ascii(&strict, "\u{0661}\u{0662}");
    assert!(!errors.contains(IdnaErrors::CONTEXTO_DIGITS));
}

#[test]
fn std3_rules() {
    // '_' is tolerated without STD3 and flagged with it
    assert!(domain_to_ascii("_tcp.example.com").is_ok());
    assert!(domain_to_ascii_strict("_tcp.example.com").is_err());

    let relaxed = Uts46::new(Uts46Options::lookup()).unwrap();
    let (out, errors) = to_ascii(&relaxed, "a_b");
    assert_eq!(out, "a_b");
    assert_eq!(errors, IdnaErrors::empty());
}

#[test]
fn invalid_ace_label() {
    let uts46 = lookup();
    // "xn--wca" decodes to upper-case "Ü", which does not round-trip
    // through mapping and normalization.
    let (out, errors) = to_unicode(&uts46, "xn--wca");
    assert_eq!(out, "Ü");
    assert!(errors.contains(IdnaErrors::INVALID_ACE_LABEL));

    // the well-formed encoding of the same letter round-trips fine
    assert_eq!(
        to_unicode(&uts46, "xn--tda"),
        ("ü".to_owned(), IdnaErrors::empty())
    );
}

#[test]
fn label_separators_map_to_dots() {
    let uts46 = lookup();
    assert_eq!(
        to_ascii(&uts46, "example\u{3002}com"),
        ("example.com".to_owned(), IdnaErrors::empty())
    );
    assert_eq!(
        to_ascii(&uts46, "example\u{FF0E}com"),
        ("example.com".to_owned(), IdnaErrors::empty())
    );
    assert_eq!(
        to_ascii(&uts46, "example\u{FF61}com"),
        ("example.com".to_owned(), IdnaErrors::empty())
    );
}

#[test]
fn label_entry_points() {
    let uts46 = lookup();
    let mut info = IdnaInfo::new();
    let out = uts46.label_to_ascii(&utf16("bücher"), &mut info).unwrap();
    assert_eq!(from_utf16(&out), "xn--bcher-kva");
    assert!(!info.has_errors());

    // dots are not separators in single-label processing
    let mut info = IdnaInfo::new();
    uts46.label_to_ascii(&utf16("a.b"), &mut info).unwrap();
    assert!(info.errors().contains(IdnaErrors::LABEL_HAS_DOT));

    let mut info = IdnaInfo::new();
    let out = uts46
        .label_to_unicode(&utf16("xn--bcher-kva"), &mut info)
        .unwrap();
    assert_eq!(from_utf16(&out), "bücher");
    assert!(!info.has_errors());
}

#[test]
fn utf8_entry_points() {
    let uts46 = lookup();
    let mut info = IdnaInfo::new();
    let mut out = String::new();
    uts46
        .name_to_ascii_utf8("Bücher.de".as_bytes(), &mut out, &mut info)
        .unwrap();
    assert_eq!(out, "xn--bcher-kva.de");
    assert!(!info.has_errors());

    let mut info = IdnaInfo::new();
    let mut out = Vec::new();
    uts46
        .name_to_unicode_utf8(b"xn--bcher-kva.de", &mut out, &mut info)
        .unwrap();
    assert_eq!(out, "bücher.de".as_bytes());
    assert!(!info.has_errors());

    // ill-formed UTF-8 is replaced and flagged
    let mut info = IdnaInfo::new();
    let mut out = String::new();
    uts46
        .name_to_ascii_utf8(b"a\xffb.de", &mut out, &mut info)
        .unwrap();
    assert!(info.errors().contains(IdnaErrors::DISALLOWED));
    assert!(out.contains('\u{FFFD}'));
}

#[test]
fn convenience_functions() {
    assert_eq!(domain_to_ascii("Bücher.de").unwrap(), "xn--bcher-kva.de");
    assert_matches!(domain_to_unicode("xn--bcher-kva.de"), (s, Ok(())) if s == "bücher.de");
    let (best_effort, result) = domain_to_unicode("xn--0.pt");
    assert!(result.is_err());
    assert_eq!(best_effort, "xn--0\u{FFFD}.pt");
}

#[test]
fn emoji_domains() {
    assert_eq!(domain_to_ascii("☕.com").unwrap(), "xn--53h.com");
}

#[test]
fn unicode_before_delimiter() {
    assert!(domain_to_ascii_strict("xn--f\u{34a}-PTP").is_err());
}

#[test]
fn upper_case_ascii_in_punycode() {
    let (unicode, result) = domain_to_unicode("xn--A-1ga");
    assert!(result.is_ok());
    assert_eq!(&unicode, "aö");
}
