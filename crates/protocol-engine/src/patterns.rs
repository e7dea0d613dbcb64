//! Built-in phrase tables and text helpers shared by every component
//!
//! The tables below are the defaults behind [`crate::config::PatternConfig`].
//! Each entry is `(regex source, label)`; order is evaluation order.

/// Phrases that make a visit event-driven rather than calendar-driven
pub const CONDITIONAL_PHRASES: &[(&str, &str)] = &[
    (r"after\s+(?:a\s+|any\s+)?missed", "after missed"),
    (r"unless", "unless"),
    (r"(?:as|if|when)\s+clinically\s+indicated", "as clinically indicated"),
    (r"at\s+(?:the\s+)?(?:[a-z]+'?s?\s+)?discretion", "at discretion"),
    (r"may\s+opt", "may opt"),
    (r"only\s+if", "only if"),
    (r"in\s+(?:the\s+)?(?:event|case)\s+of", "in the event of"),
    (r"upon\s+(?:early\s+)?(?:discontinuation|withdrawal|termination)", "upon discontinuation"),
    (r"as\s+needed", "as needed"),
    (r"if\s+(?:deemed\s+)?(?:necessary|needed|required)", "if necessary"),
];

/// Vague conditional triggers: `(regex source, label, objective rewrite)`
///
/// The rewrite is substituted for the matched phrase by rule AMB-001 and is
/// what the validator expects a suggestion to look like.
pub const VAGUE_TRIGGERS: &[(&str, &str, &str)] = &[
    (
        r"unless\s+(?:an?\s+|any\s+)?safety\s+concerns?\s+(?:arises?|occurs?|exists?|is\s+identified)",
        "unless safety concern arises",
        "unless a Grade 3 or higher adverse event (CTCAE v5.0) occurs",
    ),
    (
        r"(?:as|if|when)\s+clinically\s+(?:indicated|appropriate|necessary)",
        "as clinically indicated",
        "if any laboratory value or vital sign is Grade 2 or higher per CTCAE v5.0",
    ),
    (
        r"at\s+(?:the\s+)?(?:investigator'?s?\s+)?discretion(?:\s+of\s+the\s+investigator)?",
        "at investigator discretion",
        "if a Grade 2 or higher adverse event (CTCAE v5.0) occurs",
    ),
    (
        r"in\s+the\s+(?:opinion|judg(?:e)?ment)\s+of\s+the\s+investigator",
        "in the investigator's judgment",
        "if a Grade 2 or higher adverse event (CTCAE v5.0) occurs",
    ),
    (
        r"if\s+(?:deemed\s+)?(?:necessary|needed)",
        "if necessary",
        "if a Grade 2 or higher adverse event (CTCAE v5.0) occurs",
    ),
    (
        r"as\s+needed",
        "as needed",
        "if symptoms persist for more than 48 hours",
    ),
    (
        r"significant\s+(?:toxicity|toxicities|adverse\s+events?)",
        "significant toxicity",
        "Grade 3 or higher toxicity (CTCAE v5.0)",
    ),
];

/// Endpoints that must survive any rewrite: `(label, equivalent terms)`
pub const ENDPOINT_GROUPS: &[(&str, &[&str])] = &[
    ("primary endpoint", &["primary endpoint", "primary end point", "primary outcome"]),
    ("secondary endpoint", &["secondary endpoint", "secondary end point", "secondary outcome"]),
    ("overall survival", &["overall survival", "OS"]),
    (
        "progression-free survival",
        &["progression-free survival", "progression free survival", "PFS"],
    ),
    ("disease-free survival", &["disease-free survival", "disease free survival", "DFS"]),
    (
        "objective response rate",
        &["objective response rate", "overall response rate", "ORR"],
    ),
    ("time to progression", &["time to progression", "TTP"]),
    ("pathological complete response", &["pathological complete response", "pCR"]),
    ("HbA1c", &["HbA1c", "hemoglobin A1c", "glycated hemoglobin"]),
    (
        "major adverse cardiovascular events",
        &["major adverse cardiovascular events", "MACE"],
    ),
];

/// Scientific-claim wording that a rewrite may neither drop nor introduce
pub const CLAIM_KEYWORDS: &[(&str, &str)] = &[
    (r"superior(?:ity)?", "superiority"),
    (r"non-?inferior(?:ity)?", "non-inferiority"),
    (r"statistically\s+significant", "statistically significant"),
    (r"clinically\s+meaningful", "clinically meaningful"),
    (r"demonstrate[sd]?\s+efficacy", "demonstrated efficacy"),
    (r"safe\s+and\s+effective", "safe and effective"),
    (r"proven", "proven"),
    (r"cures?", "cure"),
];

/// Assessment catalogue: `(regex source, canonical name)`
pub const ASSESSMENTS: &[(&str, &str)] = &[
    (r"physical\s+exam(?:ination)?s?", "physical examination"),
    (r"vital\s+signs?", "vital signs"),
    (r"(?:12-lead\s+)?ECGs?|electrocardiograms?", "ECG"),
    (r"ha?ematology", "hematology"),
    (r"(?:clinical\s+|serum\s+)?chemistry", "clinical chemistry"),
    (r"urinalysis", "urinalysis"),
    (r"pregnancy\s+tests?", "pregnancy test"),
    (r"(?:PK|pharmacokinetic)\s+(?:samples?|sampling)", "PK sampling"),
    (r"MRI", "MRI"),
    (r"CT\s+scans?", "CT scan"),
    (r"tumou?r\s+assessments?", "tumor assessment"),
    (r"adverse\s+events?\s+(?:review|assessment|monitoring)", "adverse event review"),
    (r"concomitant\s+medications?", "concomitant medications"),
    (r"informed\s+consent", "informed consent"),
    (r"questionnaires?", "questionnaire"),
    (r"blood\s+(?:draws?|samples?)", "blood sample"),
    (r"body\s+weight", "body weight"),
    (r"ECOG(?:\s+performance\s+status)?", "ECOG performance status"),
    (r"biops(?:y|ies)", "biopsy"),
];

/// Criteria a reviewer can check without judgment: grades, thresholds, deadlines
pub const OBJECTIVE_CRITERIA: &[&str] = &[
    r"(?i)\bgrade\s*(?:[≥>]=?\s*)?[1-5]\b",
    r"(?i)\bCTCAE\b",
    r"(?i)\bRECIST\b",
    r"[<>≤≥]=?\s*\d",
    r"(?i)\b\d+(?:\.\d+)?\s*(?:%|[x×]\s*ULN|mg/dL|g/dL|mmHg|bpm|ms)",
    r"(?i)\b(?:within|more\s+than|at\s+least|longer\s+than|for)\s+\d+\s*(?:hours?|days?|weeks?)\b",
    r"(?i)\b(?:section|appendix|table)\s+[0-9]+(?:\.[0-9]+)*",
];

/// Abbreviations ending in a period that do not close a sentence
const ABBREVIATIONS: &[&str] = &[
    "e.g.", "i.e.", "etc.", "vs.", "approx.", "Dr.", "No.", "Fig.", "Sec.", "v.", "ca.",
];

/// A sentence (or line) of the input with its byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentence<'a> {
    pub text: &'a str,
    pub offset: usize,
}

/// Split text into trimmed sentences, tracking byte offsets.
///
/// Newlines always split. `.`, `!` and `?` split when followed by whitespace
/// or end of input, except after a known abbreviation. Decimals such as
/// "6.2" never split because the period is not followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        let end = idx + ch.len_utf8();
        let boundary = match ch {
            '\n' | '\r' => true,
            '.' | '!' | '?' => {
                let next_is_space = text[end..]
                    .chars()
                    .next()
                    .map_or(true, char::is_whitespace);
                next_is_space && !(ch == '.' && ends_with_abbreviation(&text[start..end]))
            }
            _ => false,
        };

        if boundary {
            push_trimmed(&mut sentences, text, start, end);
            start = end;
        }
    }
    push_trimmed(&mut sentences, text, start, text.len());

    sentences
}

fn ends_with_abbreviation(prefix: &str) -> bool {
    ABBREVIATIONS.iter().any(|abbr| {
        prefix.len() >= abbr.len()
            && prefix.is_char_boundary(prefix.len() - abbr.len())
            && prefix[prefix.len() - abbr.len()..].eq_ignore_ascii_case(abbr)
            && prefix[..prefix.len() - abbr.len()]
                .chars()
                .last()
                .map_or(true, |c| !c.is_alphanumeric())
    })
}

fn push_trimmed<'a>(out: &mut Vec<Sentence<'a>>, text: &'a str, start: usize, end: usize) {
    let raw = &text[start..end];
    let trimmed_start = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        out.push(Sentence {
            text: trimmed,
            offset: start + trimmed_start,
        });
    }
}

/// Collapse runs of whitespace to single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extend a match to the end of its clause (next `,` `;` `:` `)` or end of text)
pub fn clause_from(text: &str, start: usize) -> &str {
    let rest = &text[start..];
    let end = rest
        .find(|c: char| matches!(c, ',' | ';' | ':' | ')' | '\n'))
        .unwrap_or(rest.len());
    rest[..end].trim().trim_end_matches('.')
}

/// Extract a snippet around a byte range, snapped to char boundaries
pub fn extract_snippet(text: &str, start: usize, end: usize, context: usize) -> String {
    let mut from = start.saturating_sub(context);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + context).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    collapse_whitespace(&text[from..to])
}

/// Dedup-preserving push keyed on a case-insensitive form
pub fn push_unique(set: &mut Vec<String>, value: String) {
    let key = value.to_lowercase();
    if !value.is_empty() && !set.iter().any(|v| v.to_lowercase() == key) {
        set.push(value);
    }
}
