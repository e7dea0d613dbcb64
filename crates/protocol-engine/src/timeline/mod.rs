//! Schedule-of-assessments parsing
//!
//! [`TimelineParser`] reads free text sentence by sentence, places every visit
//! it recognizes on a study-day axis (baseline = day 0) and links the visits
//! into a graph. Anything it cannot resolve becomes a warning and lowers
//! `parse_confidence` instead of failing the parse.

mod grammar;

use crate::config::{PatternTables, DEFAULT_MIN_INPUT_CHARS};
use crate::fault;
use crate::patterns::{clause_from, collapse_whitespace, push_unique, split_sentences};
use grammar::{Anchor, AnchorKind, Checkpoint, Offset, Unit};
use shared_types::{Timeline, Visit, VisitWindow};
use std::collections::BTreeMap;

/// Upper bound on visits generated from one recurrence
pub const MAX_RECURRING_VISITS: usize = 104;

/// Confidence lost per recorded ambiguity
const WARNING_PENALTY: f64 = 0.05;

/// Screening without a stated day sits just before baseline
const DEFAULT_SCREENING_DAY: i64 = -1;

pub struct TimelineParser<'a> {
    tables: &'a PatternTables,
    min_input_chars: usize,
}

impl<'a> TimelineParser<'a> {
    pub fn new(tables: &'a PatternTables) -> Self {
        Self {
            tables,
            min_input_chars: DEFAULT_MIN_INPUT_CHARS,
        }
    }

    pub fn with_min_input_chars(mut self, min_input_chars: usize) -> Self {
        self.min_input_chars = min_input_chars;
        self
    }

    /// Parse a schedule. `None` when no visit can be recognized.
    pub fn parse(&self, text: &str) -> Option<Timeline> {
        if text.trim().chars().count() < self.min_input_chars {
            tracing::debug!(input_len = text.len(), "timeline parse skipped: input too short");
            return None;
        }
        fault::contain("timeline_parser", &[text], || None, || self.parse_schedule(text))
    }

    fn parse_schedule(&self, text: &str) -> Option<Timeline> {
        let mut builder = TimelineBuilder::default();
        let mut schedule_sentences = 0usize;
        let mut recognized = 0usize;

        for sentence in split_sentences(text) {
            let anchors = grammar::scan_anchors(sentence.text);
            if anchors.is_empty() && !grammar::mentions_visit(sentence.text) {
                continue;
            }
            schedule_sentences += 1;
            if self.read_sentence(sentence.text, &anchors, &mut builder) {
                recognized += 1;
            }
        }

        if builder.drafts.is_empty() {
            tracing::debug!(input_len = text.len(), "no visit schedule recognized");
            return None;
        }

        let coverage = recognized as f64 / schedule_sentences.max(1) as f64;
        let timeline = builder.finish(coverage);
        tracing::debug!(
            visits = timeline.visits.len(),
            conditional = timeline.conditional_visits.len(),
            warnings = timeline.warnings.len(),
            parse_confidence = timeline.parse_confidence,
            "timeline parsed"
        );
        Some(timeline)
    }

    /// Place the visits of one sentence; true when at least one was placed
    fn read_sentence(&self, sentence: &str, anchors: &[Anchor], builder: &mut TimelineBuilder) -> bool {
        let conditions = self.conditions(sentence);
        let mut touched = Vec::new();

        if anchors.is_empty() {
            // An event-driven visit with no study day of its own
            if let Some((_, clause)) = conditions.into_iter().next() {
                if grammar::mentions_visit(sentence) {
                    touched.push(builder.add_event_visit(sentence, &clause));
                }
            }
        } else {
            // A condition belongs to the nearest anchor before it, else the first one
            let mut anchor_conditions: Vec<Option<String>> = vec![None; anchors.len()];
            for (position, clause) in conditions {
                let target = anchors.iter().rposition(|a| a.start < position).unwrap_or(0);
                anchor_conditions[target].get_or_insert(clause);
            }

            for (idx, anchor) in anchors.iter().enumerate() {
                let segment_end = anchors.get(idx + 1).map_or(sentence.len(), |next| next.start);
                let tolerance = grammar::find_tolerance(&sentence[anchor.end..segment_end]);
                for mention in builder.mentions(&anchor.kind) {
                    touched.push(builder.place(mention, tolerance, anchor_conditions[idx].as_deref()));
                }
            }
        }

        if touched.is_empty() {
            return false;
        }
        let assessments = self.assessments(sentence);
        builder.attach_assessments(&touched, &assessments);
        true
    }

    /// Conditional clauses in the sentence; at one position the first table entry wins
    fn conditions(&self, sentence: &str) -> Vec<(usize, String)> {
        let mut found: Vec<(usize, String)> = Vec::new();
        for phrase in &self.tables.conditional_phrases {
            for m in phrase.regex.find_iter(sentence) {
                if found.iter().all(|(start, _)| *start != m.start()) {
                    found.push((m.start(), collapse_whitespace(clause_from(sentence, m.start()))));
                }
            }
        }
        found.sort_by_key(|(start, _)| *start);
        found
    }

    fn assessments(&self, sentence: &str) -> Vec<String> {
        let mut found: Vec<(usize, &str)> = self
            .tables
            .assessments
            .iter()
            .filter_map(|entry| entry.regex.find(sentence).map(|m| (m.start(), entry.label.as_str())))
            .collect();
        found.sort_by_key(|(start, _)| *start);

        let mut names = Vec::new();
        for (_, label) in found {
            push_unique(&mut names, label.to_string());
        }
        names
    }
}

/// One visit as written: name, where it sits, and how its window starts out
struct Mention {
    name: String,
    label: String,
    nominal_days: i64,
    range_span: Option<u32>,
    terminal: bool,
    /// Day to be resolved once the whole schedule is known
    default_day: bool,
}

impl Mention {
    fn at(name: impl Into<String>, label: impl Into<String>, nominal_days: i64) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            nominal_days,
            range_span: None,
            terminal: false,
            default_day: false,
        }
    }

    fn from_offset(offset: &Offset) -> Self {
        Self::named(offset.name(), offset)
    }

    fn named(name: impl Into<String>, offset: &Offset) -> Self {
        Self {
            range_span: offset
                .range_start_days
                .and_then(|start| u32::try_from(offset.days - start).ok()),
            ..Self::at(name, offset.label.clone(), offset.days)
        }
    }

    fn window(&self, tolerance: Option<(u32, u32)>) -> (u32, u32) {
        match (self.range_span, tolerance) {
            (Some(span), tolerance) => (span, tolerance.map_or(0, |(_, plus)| plus)),
            (None, Some(tolerance)) => tolerance,
            (None, None) => (0, 0),
        }
    }
}

struct Draft {
    visit: Visit,
    first_seen: usize,
    terminal: bool,
    default_day: bool,
}

#[derive(Default)]
struct TimelineBuilder {
    drafts: Vec<Draft>,
    index: BTreeMap<String, usize>,
    warnings: Vec<String>,
    last_regular: Option<String>,
    last_regular_day: Option<i64>,
    event_visits: usize,
}

impl TimelineBuilder {
    fn mentions(&mut self, kind: &AnchorKind) -> Vec<Mention> {
        match kind {
            AnchorKind::Checkpoint { checkpoint, timing } => {
                self.checkpoint_mention(*checkpoint, timing.as_ref()).into_iter().collect()
            }
            AnchorKind::Offset(offset) | AnchorKind::Relative(offset) => {
                vec![Mention::from_offset(offset)]
            }
            AnchorKind::Enumerated(offsets) => offsets.iter().map(Mention::from_offset).collect(),
            AnchorKind::UnplacedRelative { reference, text } => {
                self.warnings.push(format!(
                    "'{}' is relative to {}, which has no fixed study day",
                    text, reference
                ));
                Vec::new()
            }
            AnchorKind::Recurring {
                unit,
                step_days,
                through_days,
                text,
            } => self.expand_recurring(*unit, *step_days, *through_days, text),
        }
    }

    fn checkpoint_mention(&mut self, checkpoint: Checkpoint, timing: Option<&Offset>) -> Option<Mention> {
        let name = checkpoint.name();
        match (checkpoint, timing) {
            (Checkpoint::Baseline, timing) => {
                if let Some(offset) = timing.filter(|o| o.days != 0) {
                    self.warnings.push(format!(
                        "baseline given as '{}'; baseline is always day 0",
                        offset.label
                    ));
                }
                Some(Mention::at(name, timing.map_or(name, |o| o.label.as_str()), 0))
            }
            (Checkpoint::Screening, None) => Some(Mention::at(name, name, DEFAULT_SCREENING_DAY)),
            (Checkpoint::EndOfStudy, None) => Some(Mention {
                terminal: true,
                default_day: true,
                ..Mention::at(name, name, 0)
            }),
            (Checkpoint::EndOfStudy, Some(offset)) => Some(Mention {
                terminal: true,
                ..Mention::named(name, offset)
            }),
            (_, Some(offset)) => Some(Mention::named(name, offset)),
            (Checkpoint::FollowUp, None) => None,
        }
    }

    /// One visit per step after the most recent regular visit, up to the end point
    fn expand_recurring(&mut self, unit: Unit, step_days: i64, through_days: Option<i64>, text: &str) -> Vec<Mention> {
        let Some(through) = through_days else {
            self.warnings.push(format!("recurring schedule '{}' has no end point; not expanded", text));
            return Vec::new();
        };
        if step_days <= 0 {
            self.warnings.push(format!("recurring schedule '{}' has no interval; not expanded", text));
            return Vec::new();
        }

        let mut mentions = Vec::new();
        let mut day = self.last_regular_day.unwrap_or(0) + step_days;
        while day <= through {
            if mentions.len() == MAX_RECURRING_VISITS {
                self.warnings.push(format!(
                    "recurring schedule '{}' capped at {} visits",
                    text, MAX_RECURRING_VISITS
                ));
                break;
            }
            let name = if day % unit.days() == 0 {
                format!("{} {}", unit.label(), day / unit.days())
            } else {
                format!("Day {}", day)
            };
            mentions.push(Mention::at(name, text, day));
            day += step_days;
        }
        mentions
    }

    fn add_event_visit(&mut self, sentence: &str, condition: &str) -> usize {
        let name = match grammar::event_visit_name(sentence) {
            Some(name) => name.to_string(),
            None => {
                self.event_visits += 1;
                format!("Conditional Visit {}", self.event_visits)
            }
        };
        let day = self.last_regular_day.unwrap_or(0);
        self.place(Mention::at(name.clone(), name, day), None, Some(condition))
    }

    /// Insert a visit or merge it into an earlier mention with the same id
    fn place(&mut self, mention: Mention, tolerance: Option<(u32, u32)>, condition: Option<&str>) -> usize {
        let visit_id = visit_id(&mention.name);
        let (minus, plus) = mention.window(tolerance);

        if let Some(&idx) = self.index.get(&visit_id) {
            self.merge(idx, &mention, minus, plus, condition);
            if !self.drafts[idx].visit.is_conditional {
                self.note_regular(idx);
            }
            return idx;
        }

        let dependencies = match (condition, &self.last_regular) {
            (Some(_), Some(previous)) => vec![previous.clone()],
            _ => Vec::new(),
        };
        let idx = self.drafts.len();
        self.drafts.push(Draft {
            visit: Visit {
                visit_id: visit_id.clone(),
                visit_name: mention.name,
                window: VisitWindow {
                    label: mention.label,
                    nominal_days: mention.nominal_days,
                    tolerance_minus: minus,
                    tolerance_plus: plus,
                },
                assessments: Vec::new(),
                is_conditional: condition.is_some(),
                condition: condition.map(str::to_string),
                dependencies,
            },
            first_seen: idx,
            terminal: mention.terminal,
            default_day: mention.default_day,
        });
        self.index.insert(visit_id, idx);
        if condition.is_none() {
            self.note_regular(idx);
        }
        idx
    }

    /// A visit named both as scheduled and as conditional stays conditional
    fn merge(&mut self, idx: usize, mention: &Mention, minus: u32, plus: u32, condition: Option<&str>) {
        let upgrade_from = self.last_regular.clone();
        let draft = &mut self.drafts[idx];
        if draft.visit.is_conditional != condition.is_some() {
            self.warnings.push(format!(
                "{} is both scheduled and conditional; treated as conditional",
                draft.visit.visit_name
            ));
            if let Some(condition) = condition {
                draft.visit.is_conditional = true;
                draft.visit.condition = Some(condition.to_string());
                draft.visit.dependencies = upgrade_from
                    .filter(|previous| *previous != draft.visit.visit_id)
                    .into_iter()
                    .collect();
            }
        }

        if draft.default_day && !mention.default_day {
            draft.visit.window.nominal_days = mention.nominal_days;
            draft.default_day = false;
        }

        let window = &mut draft.visit.window;
        let kept = (window.tolerance_minus, window.tolerance_plus);
        if kept == (0, 0) {
            window.tolerance_minus = minus;
            window.tolerance_plus = plus;
        } else if (minus, plus) != (0, 0) && (minus, plus) != kept {
            let warning = format!(
                "conflicting windows for {}: kept -{}/+{} days, ignored -{}/+{} days",
                draft.visit.visit_name, kept.0, kept.1, minus, plus
            );
            self.warnings.push(warning);
        }
    }

    fn note_regular(&mut self, idx: usize) {
        let draft = &self.drafts[idx];
        self.last_regular = Some(draft.visit.visit_id.clone());
        if !draft.default_day {
            self.last_regular_day = Some(draft.visit.window.nominal_days);
        }
    }

    fn attach_assessments(&mut self, touched: &[usize], assessments: &[String]) {
        for &idx in touched {
            for name in assessments {
                push_unique(&mut self.drafts[idx].visit.assessments, name.clone());
            }
        }
    }

    fn finish(mut self, coverage: f64) -> Timeline {
        // End of Study without a stated day closes the regular schedule
        let last_day = self
            .drafts
            .iter()
            .filter(|d| !d.visit.is_conditional && !d.default_day)
            .map(|d| d.visit.window.nominal_days)
            .max()
            .unwrap_or(0);
        for draft in self.drafts.iter_mut().filter(|d| d.default_day) {
            draft.visit.window.nominal_days = last_day;
        }

        self.drafts.sort_by_key(|d| {
            (
                d.visit.window.nominal_days,
                d.visit.is_conditional,
                d.terminal,
                d.first_seen,
            )
        });

        let mut warnings = std::mem::take(&mut self.warnings);
        let mut previous: Option<usize> = None;
        for idx in 0..self.drafts.len() {
            if self.drafts[idx].visit.is_conditional {
                continue;
            }
            if let Some(prev) = previous {
                let (before, after) = (&self.drafts[prev], &self.drafts[idx]);
                let (a, b) = (&before.visit, &after.visit);
                if a.window.nominal_days == b.window.nominal_days && !after.default_day {
                    warnings.push(format!(
                        "visits {} and {} both fall on study day {}",
                        a.visit_name, b.visit_name, b.window.nominal_days
                    ));
                } else if a.window.nominal_days != b.window.nominal_days
                    && a.window.latest_day() >= b.window.earliest_day()
                {
                    warnings.push(format!("windows of {} and {} overlap", a.visit_name, b.visit_name));
                }
                let dependency = a.visit_id.clone();
                self.drafts[idx].visit.dependencies = vec![dependency];
            }
            previous = Some(idx);
        }

        let visits: Vec<Visit> = self.drafts.into_iter().map(|d| d.visit).collect();
        let baseline_visit = baseline_of(&visits);
        let end_of_study_visit = visits
            .iter()
            .find(|v| v.visit_id == visit_id(Checkpoint::EndOfStudy.name()))
            .map(|v| v.visit_id.clone());
        let conditional_visits = visits
            .iter()
            .filter(|v| v.is_conditional)
            .map(|v| v.visit_id.clone())
            .collect();

        let mut assessment_schedule: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for visit in &visits {
            for name in &visit.assessments {
                assessment_schedule
                    .entry(name.clone())
                    .or_default()
                    .push(visit.visit_id.clone());
            }
        }

        let parse_confidence = (coverage - WARNING_PENALTY * warnings.len() as f64).clamp(0.0, 1.0);

        Timeline {
            visits,
            baseline_visit,
            end_of_study_visit,
            conditional_visits,
            assessment_schedule,
            parse_confidence,
            warnings,
        }
    }
}

/// The named Baseline visit, else the only regular visit on day 0
fn baseline_of(visits: &[Visit]) -> Option<String> {
    let baseline_id = visit_id(Checkpoint::Baseline.name());
    if visits.iter().any(|v| v.visit_id == baseline_id) {
        return Some(baseline_id);
    }
    let mut day_zero = visits
        .iter()
        .filter(|v| !v.is_conditional && v.window.nominal_days == 0);
    match (day_zero.next(), day_zero.next()) {
        (Some(only), None) => Some(only.visit_id.clone()),
        _ => None,
    }
}

/// "Week 4" -> "week_4", "Day -28" -> "day_minus_28"
fn visit_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch.is_alphanumeric() {
            id.extend(ch.to_lowercase());
        } else if (ch == '-' || ch == '−') && chars.peek().is_some_and(char::is_ascii_digit) {
            if !id.is_empty() && !id.ends_with('_') {
                id.push('_');
            }
            id.push_str("minus_");
        } else if !id.is_empty() && !id.ends_with('_') {
            id.push('_');
        }
    }
    id.trim_end_matches('_').to_string()
}
