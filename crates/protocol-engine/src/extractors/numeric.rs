// Numeric token extraction for the numeric-change guard and rule exclusions
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    /// Optional comparator, an optionally signed number, then the word that
    /// follows it. That word is only kept as a unit when it is a known unit;
    /// otherwise scanning resumes right after the number.
    static ref NUMBER_PATTERN: Regex = Regex::new(
        r"(?i)(?P<cmp>[<>≤≥±]=?|\+/-)?\s*(?P<num>[-−]?\d+(?:[.,]\d+)*)(?:\s*(?P<unit>%|[x×]\s*ULN|[a-zµμ][a-zµμ²/^0-9]*))?"
    )
    .unwrap();
}

/// A number as written plus its normalized comparison key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericToken {
    pub raw: String,
    pub normalized: String,
    pub offset: usize,
}

/// Extract every numeric token (dose, percentage, count, threshold) in order
pub fn extract_numeric_tokens(text: &str) -> Vec<NumericToken> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(cap) = NUMBER_PATTERN.captures_at(text, pos) {
        let Some(num) = cap.name("num") else { break };
        let cmp = cap.name("cmp");

        // "4-8" and "COVID-19" carry a hyphen, not a sign
        let mut digits_start = num.start();
        let mut negative = false;
        if let Some(sign) = num.as_str().chars().next().filter(|c| *c == '-' || *c == '−') {
            digits_start += sign.len_utf8();
            negative = !text[..num.start()]
                .chars()
                .last()
                .is_some_and(char::is_alphanumeric);
        }
        let digits = &text[digits_start..num.end()];

        // Skip digits glued to a preceding letter ("COVID19" stays a name)
        if text[..digits_start]
            .chars()
            .last()
            .is_some_and(|c| c.is_alphabetic())
            && cmp.is_none()
        {
            pos = num.end();
            continue;
        }

        let unit = cap.name("unit").and_then(|m| canonical_unit(m.as_str()));
        let start = match cmp {
            Some(m) => m.start(),
            None if negative => num.start(),
            None => digits_start,
        };
        // A rejected unit word is scanned again; it may hold the next number
        let end = match (&unit, cap.name("unit")) {
            (Some(_), Some(m)) => m.end(),
            _ => num.end(),
        };

        let mut normalized = String::new();
        if let Some(m) = cmp {
            normalized.push_str(normalize_comparator(m.as_str()));
        }
        if negative {
            normalized.push('-');
        }
        normalized.push_str(&digits.replace(',', ""));
        if let Some(unit) = unit {
            normalized.push_str(&unit);
        }

        tokens.push(NumericToken {
            raw: text[start..end].trim().to_string(),
            normalized,
            offset: start,
        });
        pos = end;
    }

    tokens
}

/// Tokens of `before` whose normalized form occurs fewer times in `after`
pub fn missing_tokens(before: &str, after: &str) -> Vec<NumericToken> {
    let mut available: HashMap<String, usize> = HashMap::new();
    for token in extract_numeric_tokens(after) {
        *available.entry(token.normalized).or_insert(0) += 1;
    }

    let mut missing = Vec::new();
    for token in extract_numeric_tokens(before) {
        match available.get_mut(&token.normalized) {
            Some(count) if *count > 0 => *count -= 1,
            _ => missing.push(token),
        }
    }
    missing
}

fn normalize_comparator(cmp: &str) -> &'static str {
    match cmp {
        "≥" | ">=" => ">=",
        "≤" | "<=" => "<=",
        ">" => ">",
        "<" => "<",
        _ => "±",
    }
}

fn canonical_unit(raw: &str) -> Option<String> {
    let unit: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .replace('μ', "µ")
        .replace('×', "x")
        .trim_end_matches('/')
        .to_string();

    let canonical = match unit.as_str() {
        "%" => "%",
        "mg" | "mcg" | "µg" | "ug" | "g" | "kg" | "ng" => return Some(unit),
        "mg/kg" | "mg/m2" | "mg/m²" | "mg/dl" | "g/dl" | "ng/ml" | "mg/ml" | "ml/min" => {
            return Some(unit.replace('²', "2"))
        }
        "ml" | "l" | "iu" | "mmhg" | "bpm" | "ms" | "msec" => return Some(unit),
        "unit" | "units" | "u" => "u",
        "xuln" => "xuln",
        "h" | "hr" | "hrs" | "hour" | "hours" => "h",
        "min" | "mins" | "minute" | "minutes" => "min",
        "d" | "day" | "days" => "d",
        "wk" | "wks" | "week" | "weeks" => "w",
        "mo" | "month" | "months" => "mo",
        "y" | "yr" | "yrs" | "year" | "years" => "y",
        _ => return None,
    };
    Some(canonical.to_string())
}
