//! Invariant tests: normalization idempotence, Punycode round-trips,
//! processing stability, transitional divergence, label/name equivalence
//! and ASCII-only output.

use unicode_normalization::UnicodeNormalization;
use uts46::punycode;
use uts46::uts46::{IdnaErrors, IdnaInfo, Uts46, Uts46Options};

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

/// Error-free names across the supported scripts, in assorted states of
/// composedness and casing.
const SAMPLES: &[&str] = &[
    "example.com",
    "EXAMPLE.COM",
    "bücher.de",
    "Bu\u{308}cher.de",
    "faß.de",
    "cộng.vn",
    "日本語.jp",
    "ドメイン.jp",
    "ελλάδα.gr",
    "россия.ru",
    "ё.ru",
    "\u{5D0}\u{5D1}\u{5BC}\u{5D2}",
    "\u{627}\u{628}\u{62C}",
    "abc.\u{627}\u{628}\u{62C}",
    "xn--bcher-kva.de",
    "a.b.c.d.e",
    "가각.kr",
    "\u{1100}\u{1161}.kr",
];

#[test]
fn normalization_is_idempotent() {
    let uts46 = lookup();
    for name in SAMPLES {
        let (once, errors) = to_unicode(&uts46, name);
        assert_eq!(errors, IdnaErrors::empty(), "unexpected errors for {name}");
        let (twice, errors) = to_unicode(&uts46, &once);
        assert_eq!(errors, IdnaErrors::empty());
        assert_eq!(once, twice, "ToUnicode not idempotent for {name}");
        // Cross-check against the ecosystem normalizer on this repertoire.
        let nfc: String = once.nfc().collect();
        assert_eq!(once, nfc, "output of {name} is not NFC");
    }
}

#[test]
fn punycode_round_trips() {
    let cases: &[&str] = &[
        "ü",
        "αβγ",
        "a1-b",
        "\u{5D0}x",
        "日本語",
        "e\u{301}",
        "ß",
        "bücher",
    ];
    for s in cases {
        let cps: Vec<char> = s.chars().collect();
        let encoded = punycode::encode(&cps).unwrap();
        assert!(encoded.is_ascii());
        assert_eq!(punycode::decode(&encoded).unwrap(), cps, "{s}");
    }

    // Exhaustive short combinations over a mixed alphabet.
    let alphabet = ['a', 'z', '0', '-', 'ü', 'α', '\u{5D0}', '日', '\u{1F600}'];
    for &a in &alphabet {
        for &b in &alphabet {
            for &c in &alphabet {
                let cps = vec![a, b, c];
                let encoded = punycode::encode(&cps).unwrap();
                let decoded = punycode::decode(&encoded).unwrap();
                assert_eq!(decoded, cps, "{cps:?} via {encoded}");
            }
        }
    }
}

#[test]
fn processing_is_stable() {
    let uts46 = lookup();
    for name in SAMPLES {
        let (unicode, errors) = to_unicode(&uts46, name);
        assert_eq!(errors, IdnaErrors::empty(), "{name}");
        let (ascii, errors) = to_ascii(&uts46, name);
        assert_eq!(errors, IdnaErrors::empty(), "{name}");

        let (unicode_of_ascii, _) = to_unicode(&uts46, &ascii);
        assert_eq!(unicode_of_ascii, unicode, "ToUnicode(ToASCII({name}))");
        let (ascii_of_unicode, _) = to_ascii(&uts46, &unicode);
        assert_eq!(ascii_of_unicode, ascii, "ToASCII(ToUnicode({name}))");
    }
}

#[test]
fn transitional_differs_exactly_on_deviations() {
    let deviating = ["faß.de", "ς.gr", "a\u{200C}b.de"];
    for name in deviating {
        let (t, _) = to_ascii(&transitional(), name);
        let (n, _) = to_ascii(&lookup(), name);
        assert_ne!(t, n, "expected divergence for {name}");
        let mut info = IdnaInfo::new();
        transitional()
            .name_to_ascii(&utf16(name), &mut info)
            .unwrap();
        assert!(info.is_transitional_different(), "{name}");
    }

    let plain = ["fass.de", "example.com", "bücher.de", "日本語.jp"];
    for name in plain {
        let (t, _) = to_ascii(&transitional(), name);
        let (n, _) = to_ascii(&lookup(), name);
        assert_eq!(t, n, "unexpected divergence for {name}");
        let mut info = IdnaInfo::new();
        transitional()
            .name_to_ascii(&utf16(name), &mut info)
            .unwrap();
        assert!(!info.is_transitional_different(), "{name}");
    }
}

#[test]
fn label_and_name_processing_agree_without_dots() {
    let uts46 = lookup();
    let labels = ["abc", "bücher", "faß", "\u{0BB9}\u{0BCD}\u{200D}", "x-y-z"];
    for label in labels {
        let mut label_info = IdnaInfo::new();
        let as_label = uts46
            .label_to_ascii(&utf16(label), &mut label_info)
            .unwrap();
        let mut name_info = IdnaInfo::new();
        let as_name = uts46.name_to_ascii(&utf16(label), &mut name_info).unwrap();
        assert_eq!(as_label, as_name, "{label}");
        assert_eq!(label_info.errors(), name_info.errors(), "{label}");
        assert!(!label_info.errors().contains(IdnaErrors::LABEL_HAS_DOT));

        let mut label_info = IdnaInfo::new();
        let as_label = uts46
            .label_to_unicode(&utf16(label), &mut label_info)
            .unwrap();
        let mut name_info = IdnaInfo::new();
        let as_name = uts46
            .name_to_unicode(&utf16(label), &mut name_info)
            .unwrap();
        assert_eq!(as_label, as_name, "{label}");
    }
}

#[test]
fn ascii_output_when_error_free() {
    let uts46 = lookup();
    for name in SAMPLES {
        let (ascii, errors) = to_ascii(&uts46, name);
        assert_eq!(errors, IdnaErrors::empty(), "{name}");
        assert!(ascii.is_ascii(), "non-ASCII ToASCII output for {name}");
    }
}
