//! Anchor grammar for schedule sentences
//!
//! An anchor is a span of a sentence that places one or more visits on the
//! study-day axis: a named checkpoint, an offset ("Week 4", "Weeks 4, 8 and
//! 12", "Day -28 to -1"), a relative offset ("30 days after first dose") or a
//! recurrence ("every 4 weeks through Week 24").

use crate::patterns::collapse_whitespace;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref CHECKPOINT: Regex = Regex::new(
        r"(?i)\b(?P<name>screening|baseline|end[\s-]+of[\s-]+study|EOS|final\s+(?:study\s+)?visit|study\s+completion|follow[\s-]?up)(?:\s+visits?)?\b"
    )
    .unwrap();

    static ref OFFSET: Regex = Regex::new(concat!(
        r"(?i)\b(?:",
        // plural unit: enumeration or range
        r"(?P<punit>day|week|month)s\s*(?P<pa>[-−]?\d{1,6})",
        r"(?:\s*(?:to|through|–|-)\s*(?P<pb>[-−]?\d{1,6})",
        r"|(?P<rest>(?:\s*(?:,\s*(?:and\s+|or\s+)?|and\s+|or\s+|&\s*)[-−]?\d{1,6})+))?",
        r"|",
        // singular unit: single value or range
        r"(?P<unit>day|week|month)\s*(?P<a>[-−]?\d{1,6})",
        r"(?:\s*(?:to|through|–|-)\s*(?:(?:day|week|month)s?\s*)?(?P<b>[-−]?\d{1,6}))?",
        r")\b"
    ))
    .unwrap();

    static ref RELATIVE: Regex = Regex::new(
        r"(?i)\b(?P<n>\d{1,6})\s*(?P<unit>day|week|month)s?\s+(?:after|following|post|from)\s+(?:the\s+)?(?P<reference>[a-z]+(?:[\s-]+[a-z]+)?)"
    )
    .unwrap();

    static ref RECURRING: Regex = Regex::new(
        r"(?i)\bevery\s+(?P<n>\d{1,4})\s*(?P<unit>day|week|month)s?(?:\s+(?:through|until|up\s+to|to)\s+(?:(?P<end_unit>day|week|month)s?\s*)?(?P<end>\d{1,6}))?"
    )
    .unwrap();

    static ref KNOWN_REFERENCE: Regex =
        Regex::new(r"(?i)^(?:baseline|randomi[sz]ation|first\s+dose)\b").unwrap();

    /// Text allowed between a checkpoint and the offset that places it
    static ref CONNECTOR: Regex = Regex::new(
        r"(?i)^[\s(\[:]*(?:(?:will\s+)?(?:occurs?|take\s+place)\s+)?(?:(?:at|on)\s+)?[\s(\[:]*$"
    )
    .unwrap();

    static ref STANDALONE_LEAD: Regex = Regex::new(r"(?i)\b(?:at|on|during|by)\s*$").unwrap();

    static ref TOLERANCE: Regex = Regex::new(concat!(
        r"(?i)(?:",
        r"(?:±|\+/-|\+/−|plus\s+or\s+minus)\s*(?P<pm>\d{1,4})",
        r"|\+\s*(?P<p1>\d{1,4})\s*(?:days?|d)?\s*/\s*[-−–]\s*(?P<m1>\d{1,4})",
        r"|[-−–]\s*(?P<m2>\d{1,4})\s*(?:days?|d)?\s*/\s*\+\s*(?P<p2>\d{1,4})",
        r"|\bwindow\s+of\s+(?P<w>\d{1,4})",
        r")\s*(?P<unit>days?|weeks?|d\b|w\b)?"
    ))
    .unwrap();

    static ref NUMBER: Regex = Regex::new(r"[-−]?\d{1,6}").unwrap();

    static ref VISIT_CUE: Regex = Regex::new(
        r"(?i)\b(?:visits?|follow[\s-]?up|contacts?|phone\s+calls?|evaluations?)\b"
    )
    .unwrap();

    static ref UNSCHEDULED: Regex = Regex::new(r"(?i)\bunscheduled\b").unwrap();

    static ref EARLY_TERMINATION: Regex =
        Regex::new(r"(?i)\bearly\s+(?:termination|discontinuation|withdrawal)\b").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit {
    Day,
    Week,
    Month,
}

impl Unit {
    fn parse(raw: &str) -> Option<Self> {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("day") || lower == "d" {
            Some(Unit::Day)
        } else if lower.starts_with("week") || lower == "w" {
            Some(Unit::Week)
        } else if lower.starts_with("month") {
            Some(Unit::Month)
        } else {
            None
        }
    }

    /// Weeks are 7 days and months 30, on purpose: downstream day counts depend on it
    pub(crate) fn days(self) -> i64 {
        match self {
            Unit::Day => 1,
            Unit::Week => 7,
            Unit::Month => 30,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Unit::Day => "Day",
            Unit::Week => "Week",
            Unit::Month => "Month",
        }
    }

    fn to_days(self, value: i64) -> Option<i64> {
        value.checked_mul(self.days())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Checkpoint {
    Screening,
    Baseline,
    EndOfStudy,
    FollowUp,
}

impl Checkpoint {
    fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("screen") {
            Checkpoint::Screening
        } else if lower.starts_with("baseline") {
            Checkpoint::Baseline
        } else if lower.starts_with("follow") {
            Checkpoint::FollowUp
        } else {
            Checkpoint::EndOfStudy
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Checkpoint::Screening => "Screening",
            Checkpoint::Baseline => "Baseline",
            Checkpoint::EndOfStudy => "End of Study",
            Checkpoint::FollowUp => "Follow-up",
        }
    }
}

/// A position on the study-day axis as written in the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Offset {
    pub label: String,
    pub unit: Unit,
    pub value: i64,
    pub days: i64,
    /// Start of a "Day -28 to -1" style range; `days` holds the range end
    pub range_start_days: Option<i64>,
}

impl Offset {
    fn new(label: String, unit: Unit, value: i64, range_end: Option<i64>) -> Option<Self> {
        match range_end {
            Some(end) if end > value => Some(Self {
                label,
                unit,
                value: end,
                days: unit.to_days(end)?,
                range_start_days: Some(unit.to_days(value)?),
            }),
            _ => Some(Self {
                label,
                unit,
                value,
                days: unit.to_days(value)?,
                range_start_days: None,
            }),
        }
    }

    /// Canonical visit name, e.g. "Week 4"
    pub(crate) fn name(&self) -> String {
        format!("{} {}", self.unit.label(), self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AnchorKind {
    Checkpoint {
        checkpoint: Checkpoint,
        timing: Option<Offset>,
    },
    Offset(Offset),
    Enumerated(Vec<Offset>),
    Relative(Offset),
    /// Offset from an event with no fixed study day ("last dose")
    UnplacedRelative {
        reference: String,
        text: String,
    },
    Recurring {
        unit: Unit,
        step_days: i64,
        through_days: Option<i64>,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Anchor {
    pub start: usize,
    pub end: usize,
    pub kind: AnchorKind,
}

/// Find the anchors of one sentence, ordered by position and non-overlapping.
pub(crate) fn scan_anchors(sentence: &str) -> Vec<Anchor> {
    let mut found = Vec::new();

    for caps in CHECKPOINT.captures_iter(sentence) {
        if let Some(m) = caps.get(0) {
            found.push(Anchor {
                start: m.start(),
                end: m.end(),
                kind: AnchorKind::Checkpoint {
                    checkpoint: Checkpoint::parse(&caps["name"]),
                    timing: None,
                },
            });
        }
    }
    collect(&OFFSET, sentence, offset_kind, &mut found);
    collect(&RELATIVE, sentence, relative_kind, &mut found);
    collect(&RECURRING, sentence, recurring_kind, &mut found);

    // Earliest start wins; at one start the longer span wins
    found.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end)));
    let mut anchors: Vec<Anchor> = Vec::new();
    for anchor in found {
        if anchors.last().map_or(true, |prev| anchor.start >= prev.end) {
            anchors.push(anchor);
        }
    }

    let anchors = attach_checkpoint_timing(sentence, anchors);
    let several = anchors.len() > 1;
    anchors
        .into_iter()
        .filter(|anchor| several || stands_alone(sentence, anchor))
        .filter(|anchor| {
            !matches!(
                anchor.kind,
                AnchorKind::Checkpoint {
                    checkpoint: Checkpoint::FollowUp,
                    timing: None
                }
            )
        })
        .collect()
}

fn collect(
    pattern: &Regex,
    sentence: &str,
    build: fn(&Captures) -> Option<AnchorKind>,
    found: &mut Vec<Anchor>,
) {
    for caps in pattern.captures_iter(sentence) {
        let (Some(m), Some(kind)) = (caps.get(0), build(&caps)) else {
            continue;
        };
        found.push(Anchor {
            start: m.start(),
            end: m.end(),
            kind,
        });
    }
}

fn parse_number(raw: &str) -> Option<i64> {
    raw.replace('−', "-").parse().ok()
}

fn offset_kind(caps: &Captures) -> Option<AnchorKind> {
    let label = collapse_whitespace(caps.get(0)?.as_str());

    if let Some(unit) = caps.name("punit") {
        let unit = Unit::parse(unit.as_str())?;
        let first = parse_number(&caps["pa"])?;
        if let Some(rest) = caps.name("rest") {
            let mut offsets = vec![Offset::new(format!("{} {}", unit.label(), first), unit, first, None)?];
            for m in NUMBER.find_iter(rest.as_str()) {
                let value = parse_number(m.as_str())?;
                offsets.push(Offset::new(format!("{} {}", unit.label(), value), unit, value, None)?);
            }
            return Some(AnchorKind::Enumerated(offsets));
        }
        let range_end = caps.name("pb").and_then(|m| parse_number(m.as_str()));
        return Offset::new(label, unit, first, range_end).map(AnchorKind::Offset);
    }

    let unit = Unit::parse(caps.name("unit")?.as_str())?;
    let value = parse_number(caps.name("a")?.as_str())?;
    let range_end = caps.name("b").and_then(|m| parse_number(m.as_str()));
    Offset::new(label, unit, value, range_end).map(AnchorKind::Offset)
}

fn relative_kind(caps: &Captures) -> Option<AnchorKind> {
    let text = collapse_whitespace(caps.get(0)?.as_str());
    let reference = collapse_whitespace(&caps["reference"]).to_lowercase();
    if !KNOWN_REFERENCE.is_match(&reference) {
        return Some(AnchorKind::UnplacedRelative { reference, text });
    }
    let unit = Unit::parse(&caps["unit"])?;
    let value = parse_number(&caps["n"])?;
    Offset::new(text, unit, value, None).map(AnchorKind::Relative)
}

fn recurring_kind(caps: &Captures) -> Option<AnchorKind> {
    let step_unit = Unit::parse(&caps["unit"])?;
    let step_days = step_unit.to_days(parse_number(&caps["n"])?)?;
    let unit = caps
        .name("end_unit")
        .and_then(|m| Unit::parse(m.as_str()))
        .unwrap_or(step_unit);
    let through_days = match caps.name("end") {
        Some(end) => Some(unit.to_days(parse_number(end.as_str())?)?),
        None => None,
    };
    Some(AnchorKind::Recurring {
        unit,
        step_days,
        through_days,
        text: collapse_whitespace(caps.get(0)?.as_str()),
    })
}

/// "Screening (Day -28 to -1)" and "End of Study visit at Week 52" are one anchor
fn attach_checkpoint_timing(sentence: &str, anchors: Vec<Anchor>) -> Vec<Anchor> {
    let mut merged: Vec<Anchor> = Vec::with_capacity(anchors.len());
    let mut iter = anchors.into_iter().peekable();

    while let Some(anchor) = iter.next() {
        let AnchorKind::Checkpoint {
            checkpoint,
            timing: None,
        } = anchor.kind
        else {
            merged.push(anchor);
            continue;
        };

        let joined = iter
            .peek()
            .filter(|next| CONNECTOR.is_match(&sentence[anchor.end..next.start]))
            .map(|next| next.kind.clone());

        match joined {
            Some(AnchorKind::Offset(offset)) | Some(AnchorKind::Relative(offset)) => {
                let end = iter.next().map_or(anchor.end, |next| next.end);
                merged.push(Anchor {
                    start: anchor.start,
                    end,
                    kind: AnchorKind::Checkpoint {
                        checkpoint,
                        timing: Some(offset),
                    },
                });
            }
            // The checkpoint is placed by the relative offset, which has no study day
            Some(AnchorKind::UnplacedRelative { .. }) => {}
            _ => merged.push(anchor),
        }
    }
    merged
}

/// A lone checkpoint counts only when the sentence presents it as a visit,
/// so "change from baseline" does not create one.
fn stands_alone(sentence: &str, anchor: &Anchor) -> bool {
    if !matches!(anchor.kind, AnchorKind::Checkpoint { timing: None, .. }) {
        return true;
    }
    let lead = &sentence[..anchor.start];
    sentence[anchor.start..anchor.end]
        .to_ascii_lowercase()
        .contains("visit")
        || lead.trim_matches(|c: char| !c.is_alphanumeric()).is_empty()
        || STANDALONE_LEAD.is_match(lead)
}

/// Window annotation `(minus, plus)` in days, first one in the segment
pub(crate) fn find_tolerance(segment: &str) -> Option<(u32, u32)> {
    let caps = TOLERANCE.captures(segment)?;
    let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());

    let (minus, plus) = if let Some(n) = number("pm").or_else(|| number("w")) {
        (n, n)
    } else if let (Some(plus), Some(minus)) = (number("p1"), number("m1")) {
        (minus, plus)
    } else {
        (number("m2")?, number("p2")?)
    };

    let scale = caps
        .name("unit")
        .and_then(|m| Unit::parse(m.as_str()))
        .map_or(1, Unit::days);
    let scale = u32::try_from(scale).ok()?;
    Some((minus.checked_mul(scale)?, plus.checked_mul(scale)?))
}

pub(crate) fn mentions_visit(sentence: &str) -> bool {
    VISIT_CUE.is_match(sentence)
}

/// Name for an event-driven visit described without any study day
pub(crate) fn event_visit_name(sentence: &str) -> Option<&'static str> {
    if UNSCHEDULED.is_match(sentence) {
        Some("Unscheduled Visit")
    } else if EARLY_TERMINATION.is_match(sentence) {
        Some("Early Termination")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(sentence: &str) -> Vec<AnchorKind> {
        scan_anchors(sentence).into_iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_offsets_in_order() {
        let anchors = scan_anchors("Baseline, Week 4 (±3 days), Week 12 (±7 days)");
        assert_eq!(anchors.len(), 3);
        assert!(matches!(
            anchors[0].kind,
            AnchorKind::Checkpoint {
                checkpoint: Checkpoint::Baseline,
                timing: None
            }
        ));
        match &anchors[2].kind {
            AnchorKind::Offset(offset) => {
                assert_eq!(offset.name(), "Week 12");
                assert_eq!(offset.days, 84);
            }
            other => panic!("unexpected anchor {:?}", other),
        }
    }

    #[test]
    fn test_checkpoint_with_day_range() {
        match &kinds("Screening (Day -28 to -1)")[0] {
            AnchorKind::Checkpoint {
                checkpoint: Checkpoint::Screening,
                timing: Some(offset),
            } => {
                assert_eq!(offset.days, -1);
                assert_eq!(offset.range_start_days, Some(-28));
            }
            other => panic!("unexpected anchor {:?}", other),
        }
    }

    #[test]
    fn test_enumerated_weeks() {
        match &kinds("Visits at Weeks 4, 8 and 12.")[0] {
            AnchorKind::Enumerated(offsets) => {
                let days: Vec<i64> = offsets.iter().map(|o| o.days).collect();
                assert_eq!(days, vec![28, 56, 84]);
            }
            other => panic!("unexpected anchor {:?}", other),
        }
    }

    #[test]
    fn test_recurrence_swallows_its_end_point() {
        let anchors = kinds("Labs every 4 weeks through Week 24");
        assert_eq!(anchors.len(), 1);
        assert!(matches!(
            anchors[0],
            AnchorKind::Recurring {
                step_days: 28,
                through_days: Some(168),
                ..
            }
        ));
    }

    #[test]
    fn test_relative_offsets() {
        assert!(matches!(
            &kinds("Call 30 days after first dose")[0],
            AnchorKind::Relative(offset) if offset.days == 30
        ));
        assert!(matches!(
            &kinds("Call 30 days after last dose")[0],
            AnchorKind::UnplacedRelative { reference, .. } if reference == "last dose"
        ));
    }

    #[test]
    fn test_incidental_baseline_is_not_a_visit() {
        assert!(scan_anchors("Report the change from baseline in HbA1c").is_empty());
        assert_eq!(scan_anchors("Baseline visit assessments").len(), 1);
        assert_eq!(scan_anchors("Vitals are taken at baseline").len(), 1);
    }

    #[test]
    fn test_tolerance_forms() {
        assert_eq!(find_tolerance(" (±3 days)"), Some((3, 3)));
        assert_eq!(find_tolerance(" (+/- 1 week)"), Some((7, 7)));
        assert_eq!(find_tolerance(" (+5/-2 days)"), Some((2, 5)));
        assert_eq!(find_tolerance(" (-2/+5 days)"), Some((2, 5)));
        assert_eq!(find_tolerance(" with a window of 4 days"), Some((4, 4)));
        assert_eq!(find_tolerance(", then"), None);
    }
}
