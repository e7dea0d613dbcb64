//! End-to-end behavior of the four public operations

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use protocol_engine::{
    extract_entities, parse_timeline, scan, validate, IssueCategory, ProtocolEngine,
    ValidationContext, ViolationSeverity,
};

const PROTOCOL: &str = "\
Screening (Day -28 to -1): informed consent, physical examination, hematology.
Baseline visit: vital signs, ECG and PK sampling.
Week 4 (±3 days) and Week 12 (±7 days): vital signs, ECG.
End of Study (Week 24): physical examination.
Unscheduled visits may occur as clinically indicated.
Subjects should be reported to the medical monitor if ALT > 3 x ULN.
Serious adverse events must be reported promptly.";

#[test]
fn timeline_normalizes_offsets_to_days() {
    let timeline = parse_timeline("Baseline, Week 4 (±3 days), Week 12 (±7 days)").unwrap();
    let days: Vec<i64> = timeline.visits.iter().map(|v| v.window.nominal_days).collect();
    let tolerances: Vec<(u32, u32)> = timeline
        .visits
        .iter()
        .map(|v| (v.window.tolerance_minus, v.window.tolerance_plus))
        .collect();
    assert_eq!(days, vec![0, 28, 84]);
    assert_eq!(tolerances, vec![(0, 0), (3, 3), (7, 7)]);
}

#[test]
fn text_without_schedule_has_no_timeline() {
    assert!(parse_timeline("This protocol has no visit schedule described.").is_none());
}

#[test]
fn event_driven_visit_is_kept_out_of_gap_analysis() {
    let timeline = parse_timeline(
        "Baseline visit. Week 8 visit. Visit will occur after missed vaccination.",
    )
    .unwrap();
    let conditional: Vec<_> = timeline.visits.iter().filter(|v| v.is_conditional).collect();
    assert_eq!(conditional.len(), 1);
    assert!(conditional[0]
        .condition
        .as_deref()
        .unwrap()
        .contains("missed vaccination"));
    assert!(timeline
        .visit_gaps()
        .iter()
        .all(|gap| gap.to_visit != conditional[0].visit_id && gap.from_visit != conditional[0].visit_id));
    assert_eq!(timeline.gaps_exceeding(30).len(), 1);
}

#[test]
fn full_protocol_timeline() {
    let timeline = parse_timeline(PROTOCOL).unwrap();
    let names: Vec<&str> = timeline.visit_names().collect();
    assert_eq!(
        names,
        vec!["Screening", "Baseline", "Week 4", "Week 12", "End of Study", "Unscheduled Visit"]
    );
    assert_eq!(timeline.baseline_visit.as_deref(), Some("baseline"));
    assert_eq!(timeline.end_of_study_visit.as_deref(), Some("end_of_study"));
    assert_eq!(timeline.conditional_visits, vec!["unscheduled_visit".to_string()]);
    assert_eq!(
        timeline.assessment_schedule["ECG"],
        vec!["baseline".to_string(), "week_4".to_string(), "week_12".to_string()]
    );
    assert!(timeline.parse_confidence > 0.5);
}

#[test]
fn entities_reconcile_with_timeline() {
    let timeline = parse_timeline(PROTOCOL).unwrap();
    let entities = extract_entities(PROTOCOL, Some(&timeline));
    assert!(entities.visit_names.contains(&"Screening".to_string()));
    assert!(entities.visit_names.contains(&"Week 12".to_string()));
    assert!(entities.assessment_types.contains(&"ECG".to_string()));
    assert!(entities.safety_thresholds.contains(&"ALT > 3 x ULN".to_string()));
    assert!(entities
        .conditional_triggers
        .contains(&"as clinically indicated".to_string()));
}

#[test]
fn terminology_rule_coverage() {
    let issues = scan("Subjects will be enrolled");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].category, IssueCategory::Terminology);
    assert!(issues[0].improved_text.contains("participants"));
}

#[test]
fn scan_full_protocol() {
    let issues = scan(PROTOCOL);
    let ids: Vec<&str> = issues.iter().map(|i| i.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["SAF-001", "AMB-001", "TRM-001", "CLR-001"]);
    assert!(issues.iter().all(|i| i.confidence == 1.0));

    // Rewrites keep every number of the sentence they replace
    let clr = issues.iter().find(|i| i.rule_id == "CLR-001").unwrap();
    assert!(clr.improved_text.contains("ALT > 3 x ULN"));
}

#[test]
fn numeric_guard() {
    let result = validate("Dose is 200mg BID", "Dose is 400mg BID", &ValidationContext::default());
    assert!(!result.accepted);
    assert!(result.reasons.iter().any(|r| r.contains("numeric")));
}

#[test]
fn completeness_guard() {
    let context = ValidationContext::default();
    assert!(!validate("unless safety concern arises", "unless a safety concern arises", &context).accepted);
    assert!(
        validate(
            "unless safety concern arises",
            "unless Grade 3+ AE occurs per MOP Section 6.2",
            &context
        )
        .accepted
    );
}

#[test]
fn rule_rewrites_pass_the_validator() {
    let engine = ProtocolEngine::new();
    for issue in engine.scan(PROTOCOL) {
        let result = engine.validate(&issue.evidence[0], &issue.improved_text, &ValidationContext::default());
        assert!(result.accepted, "{}: {:?}", issue.rule_id, result.reasons);
    }
}

#[test]
fn concurrent_calls_agree() {
    let engine = ProtocolEngine::new();
    let expected = engine.scan(PROTOCOL);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| engine.scan(PROTOCOL))).collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

proptest! {
    #[test]
    fn operations_never_panic(text in "\\PC*", other in "\\PC*") {
        let timeline = parse_timeline(&text);
        let _ = extract_entities(&text, timeline.as_ref());
        let _ = scan(&text);
        let result = validate(&text, &other, &ValidationContext::default());
        prop_assert_eq!(result.accepted, result.severity_of_violation.is_none());
    }

    #[test]
    fn scan_is_deterministic(text in "\\PC*") {
        prop_assert_eq!(scan(&text), scan(&text));
    }

    #[test]
    fn changed_numbers_never_accepted(a in 1u32..5000, b in 1u32..5000) {
        prop_assume!(a != b);
        let result = validate(
            &format!("Administer {} mg daily", a),
            &format!("Administer {} mg daily", b),
            &ValidationContext::default(),
        );
        prop_assert!(!result.accepted);
        prop_assert_eq!(result.severity_of_violation, Some(ViolationSeverity::Reject));
    }

    #[test]
    fn changed_number_next_to_another_never_accepted(n in 1u32..20, a in 1u32..5000, b in 1u32..5000) {
        prop_assume!(a != b);
        let result = validate(
            &format!("Administer {} {}mg tablets", n, a),
            &format!("Administer {} {}mg tablets", n, b),
            &ValidationContext::default(),
        );
        prop_assert!(!result.accepted);
        prop_assert_eq!(result.severity_of_violation, Some(ViolationSeverity::Reject));
    }

    #[test]
    fn changed_signed_numbers_never_accepted(a in -500i32..500, b in -500i32..500) {
        prop_assume!(a != b);
        let result = validate(
            &format!("Hold dosing below {} C on Day 7", a),
            &format!("Hold dosing below {} C on Day 7", b),
            &ValidationContext::default(),
        );
        prop_assert!(!result.accepted);
    }

    #[test]
    fn sign_flip_never_accepted(day in 1u32..400) {
        let result = validate(
            &format!("Screening starts on Day -{}", day),
            &format!("Screening starts on Day {}", day),
            &ValidationContext::default(),
        );
        prop_assert!(!result.accepted);
    }
}
