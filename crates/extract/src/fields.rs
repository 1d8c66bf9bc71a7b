use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::re;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("empty input: message is empty or whitespace-only")]
    EmptyInput,
}

/// A message with recognized spans replaced by `{{field}}` markers, plus the
/// values those markers stood for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTemplate {
    pub template: String,
    pub placeholders: BTreeMap<String, String>,
}

const CURRENCY_CODES: &str = r"SAR|USD|EGP|AED|BHD|EUR|GBP|JPY|INR|CNY|CAD|AUD";
const CURRENCY_ALIASES: &str = r"ر\.?\s?س|ريال|جنيه\s?مصري|جنيه";
const AMOUNT: &str = r"(?:\d{1,3}(?:,\d{3})+|\d+)(?:[.,]\d{1,2})?";
const MONTHS: &str = r"Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec";

fn re_amount_currency() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        let cur = format!("{CURRENCY_CODES}|{CURRENCY_ALIASES}");
        Regex::new(&format!(
            r"(?i)\b(?:({cur})[\s:]*({AMOUNT})|({AMOUNT})[\s:]*({cur}))\b"
        ))
        .expect("invalid regex")
    })
}

fn re_date() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        let alternatives = [
            r"\d{1,2}[/\-.]\d{1,2}[/\-.]\d{1,4}".to_string(),
            r"\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2}".to_string(),
            format!(r"\d{{1,2}}-(?:{MONTHS})-\d{{2,4}}"),
            format!(r"\d{{1,2}}\s+(?:{MONTHS})[a-z]*\s+\d{{4}}"),
            format!(r"(?:{MONTHS})[a-z]*\s+\d{{1,2}},?\s+\d{{4}}"),
            r"\d{2}[01]\d{3}".to_string(),
            r"\d{8}".to_string(),
        ]
        .join("|");
        Regex::new(&format!(
            r"(?i)\b({alternatives})(\s+\d{{1,2}}:\d{{2}}(?::\d{{2}})?)?\b"
        ))
        .expect("invalid regex")
    })
}

fn re_vendor_cue() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:لدى|من عند|من|في|عند|تم الدفع لـ|تم الشراء من|at|from|paid\s+to|purchased\s+from)\b[:\s]*([^\n,؛;:\-]+)",
        )
        .expect("invalid regex")
    })
}

re!(re_account, r"\*{2,4}\d{3,4}");
re!(re_trailing_on_clause, r"(?i)\s+on\s+\d.*$");
re!(re_masked_prefix, r"^\*{2,}");

fn re_currency_token() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b(?:{CURRENCY_CODES})\b|{CURRENCY_ALIASES}"))
            .expect("invalid regex")
    })
}

/// Extract a vendor/merchant name from message text.
///
/// Looks for a language cue ("at", "from", "paid to", لدى, من, …) and takes
/// the clause that follows it, up to a delimiter. Candidates that are purely
/// numeric, masked-card-like, or contain a currency token are rejected. When
/// no cue yields a valid vendor but the message mentions a salary, the
/// literal vendor "Company" is used.
pub fn extract_vendor_name(message: &str) -> Option<String> {
    let cue_count = re_vendor_cue().find_iter(message).count();
    if cue_count > 1 {
        tracing::debug!(cue_count, "multiple vendor cues matched; taking the first");
    }

    if let Some(caps) = re_vendor_cue().captures(message) {
        let raw = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        let candidate = re_trailing_on_clause().replace(raw, "");
        let candidate = candidate.trim();
        if is_valid_vendor(candidate) {
            return Some(candidate.to_string());
        }
    }

    let lower = message.to_lowercase();
    if lower.contains("راتب") || lower.contains("salary") {
        return Some("Company".to_string());
    }
    None
}

fn is_valid_vendor(candidate: &str) -> bool {
    candidate.chars().count() > 2
        && candidate.replace(',', "").parse::<f64>().is_err()
        && !re_masked_prefix().is_match(candidate)
        && !re_currency_token().is_match(candidate)
}

/// Canonical ISO code for a matched currency token.
fn normalize_currency(token: &str) -> String {
    let upper = token.trim().to_uppercase();
    if upper.chars().all(|c| c.is_ascii_alphabetic()) {
        return upper;
    }
    let stripped: String = token
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect();
    match stripped.as_str() {
        "رس" | "ريال" => "SAR".to_string(),
        "جنيهمصري" | "جنيه" => "EGP".to_string(),
        _ => upper,
    }
}

/// Turn a raw message into a template string plus its placeholder values.
///
/// Rules run in a fixed order, first match wins per field: vendor (inserted
/// before anything else is scanned), amount+currency as one combined span,
/// date, masked account. Collected spans are substituted in descending
/// position order so earlier replacements never shift pending offsets.
pub fn extract_template(message: &str) -> Result<ExtractedTemplate, ExtractError> {
    if message.trim().is_empty() {
        return Err(ExtractError::EmptyInput);
    }

    let mut placeholders: BTreeMap<String, String> = BTreeMap::new();
    let mut working = message.to_string();

    if let Some(vendor) = extract_vendor_name(message) {
        if let Some(pos) = working.find(vendor.as_str()) {
            working.replace_range(pos..pos + vendor.len(), "{{vendor}}");
        }
        placeholders.insert("vendor".to_string(), vendor);
    }

    // (start, end, replacement) for the remaining patterns, all matched
    // against the same working text.
    let mut spans: Vec<(usize, usize, String)> = Vec::new();

    if let Some(caps) = re_amount_currency().captures(&working) {
        let full = caps.get(0).expect("match has a full capture");
        let pair = caps
            .get(1)
            .zip(caps.get(2))
            .map(|(c, a)| (c, a, true))
            .or_else(|| caps.get(3).zip(caps.get(4)).map(|(a, c)| (c, a, false)));
        // Both operands or neither: a half-captured pair records nothing.
        if let Some((cur, amt, currency_first)) = pair {
            placeholders.insert("currency".to_string(), normalize_currency(cur.as_str()));
            placeholders.insert("amount".to_string(), amt.as_str().to_string());
            let replacement = if currency_first {
                "{{currency}} {{amount}}"
            } else {
                "{{amount}} {{currency}}"
            };
            spans.push((full.start(), full.end(), replacement.to_string()));
        }
        if re_amount_currency().find_iter(&working).count() > 1 {
            tracing::debug!("multiple amount+currency matches; taking the first");
        }
    }

    for caps in re_date().captures_iter(&working) {
        let full = caps.get(0).expect("match has a full capture");
        if overlaps(&spans, full.start(), full.end()) {
            continue;
        }
        placeholders.insert("date".to_string(), caps[1].to_string());
        spans.push((full.start(), full.end(), "{{date}}".to_string()));
        break;
    }

    for m in re_account().find_iter(&working) {
        if overlaps(&spans, m.start(), m.end()) {
            continue;
        }
        placeholders.insert("account".to_string(), m.as_str().to_string());
        spans.push((m.start(), m.end(), "{{account}}".to_string()));
        break;
    }

    spans.sort_by(|a, b| b.0.cmp(&a.0));
    for (start, end, replacement) in spans {
        working.replace_range(start..end, &replacement);
    }

    Ok(ExtractedTemplate {
        template: working,
        placeholders,
    })
}

fn overlaps(spans: &[(usize, usize, String)], start: usize, end: usize) -> bool {
    spans.iter().any(|(s, e, _)| start < *e && *s < end)
}
