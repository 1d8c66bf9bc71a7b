use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::re;

re!(re_date_dmy, r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b");
re!(re_date_ymd, r"\b\d{4}[/-]\d{1,2}[/-]\d{1,2}\b");
re!(re_amount, r"(?:\d{1,3},)*\d+(?:\.\d{1,2})?");

/// A canonicalized template structure and its identity hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTemplate {
    pub structure: String,
    pub hash: String,
}

/// Canonicalize a template string so that messages differing only in
/// punctuation style, whitespace, embedded dates, or embedded numeric
/// amounts collapse to the same hash.
pub fn normalize_structure(msg: &str) -> NormalizedTemplate {
    if msg.is_empty() {
        return NormalizedTemplate {
            structure: String::new(),
            hash: sha256_hex(""),
        };
    }

    let decomposed: String = msg.nfkd().collect();

    // Smart punctuation to ASCII equivalents.
    let ascii: String = decomposed
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect();

    // Collapse whitespace runs and trim.
    let collapsed = ascii.split_whitespace().collect::<Vec<_>>().join(" ");

    // Residual dates and numeric amounts become literal tokens so the
    // structure is stable across occurrences of the same message shape.
    let text = re_date_dmy().replace_all(&collapsed, "DATE");
    let text = re_date_ymd().replace_all(&text, "DATE");
    let text = re_amount().replace_all(&text, "AMOUNT").into_owned();

    let hash = sha256_hex(&text);
    NormalizedTemplate { structure: text, hash }
}

/// SHA-256 of a string, lowercase hex encoded (64 chars).
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
