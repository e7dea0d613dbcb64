//! Visit graph produced by the timeline parser

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Allowed date range around a nominal study day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitWindow {
    /// Nominal time label as written (e.g., "Week 4")
    pub label: String,
    /// Days from baseline (baseline = day 0)
    pub nominal_days: i64,
    pub tolerance_minus: u32,
    pub tolerance_plus: u32,
}

impl VisitWindow {
    pub fn new(label: impl Into<String>, nominal_days: i64) -> Self {
        Self {
            label: label.into(),
            nominal_days,
            tolerance_minus: 0,
            tolerance_plus: 0,
        }
    }

    pub fn earliest_day(&self) -> i64 {
        self.nominal_days - i64::from(self.tolerance_minus)
    }

    pub fn latest_day(&self) -> i64 {
        self.nominal_days + i64::from(self.tolerance_plus)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub visit_id: String,
    pub visit_name: String,
    pub window: VisitWindow,
    pub assessments: Vec<String>,
    pub is_conditional: bool,
    /// Present iff `is_conditional`
    pub condition: Option<String>,
    pub dependencies: Vec<String>,
}

/// Interval between two consecutive regular visits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitGap {
    pub from_visit: String,
    pub to_visit: String,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub visits: Vec<Visit>,
    /// Visit id of the day-0 anchor
    pub baseline_visit: Option<String>,
    pub end_of_study_visit: Option<String>,
    /// Ids of visits with `is_conditional == true`
    pub conditional_visits: Vec<String>,
    /// Assessment name -> visit ids, in visit order
    pub assessment_schedule: BTreeMap<String, Vec<String>>,
    pub parse_confidence: f64,
    pub warnings: Vec<String>,
}

impl Timeline {
    pub fn visit(&self, visit_id: &str) -> Option<&Visit> {
        self.visits.iter().find(|v| v.visit_id == visit_id)
    }

    pub fn visit_names(&self) -> impl Iterator<Item = &str> {
        self.visits.iter().map(|v| v.visit_name.as_str())
    }

    /// Visits on the fixed schedule, i.e. everything not event-triggered
    pub fn regular_visits(&self) -> Vec<&Visit> {
        let mut regular: Vec<&Visit> = self.visits.iter().filter(|v| !v.is_conditional).collect();
        regular.sort_by_key(|v| v.window.nominal_days);
        regular
    }

    pub fn visit_gaps(&self) -> Vec<VisitGap> {
        self.regular_visits()
            .windows(2)
            .map(|pair| VisitGap {
                from_visit: pair[0].visit_id.clone(),
                to_visit: pair[1].visit_id.clone(),
                days: pair[1].window.nominal_days - pair[0].window.nominal_days,
            })
            .collect()
    }

    pub fn gaps_exceeding(&self, days: i64) -> Vec<VisitGap> {
        self.visit_gaps()
            .into_iter()
            .filter(|gap| gap.days > days)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn visit(id: &str, day: i64, conditional: bool) -> Visit {
        Visit {
            visit_id: id.to_string(),
            visit_name: id.to_string(),
            window: VisitWindow::new(id, day),
            assessments: Vec::new(),
            is_conditional: conditional,
            condition: conditional.then(|| "unless progression".to_string()),
            dependencies: Vec::new(),
        }
    }

    fn timeline(visits: Vec<Visit>) -> Timeline {
        Timeline {
            conditional_visits: visits
                .iter()
                .filter(|v| v.is_conditional)
                .map(|v| v.visit_id.clone())
                .collect(),
            visits,
            baseline_visit: None,
            end_of_study_visit: None,
            assessment_schedule: BTreeMap::new(),
            parse_confidence: 1.0,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_gaps_skip_conditional_visits() {
        let t = timeline(vec![
            visit("baseline", 0, false),
            visit("unscheduled_1", 10, true),
            visit("week_4", 28, false),
        ]);
        assert_eq!(
            t.visit_gaps(),
            vec![VisitGap {
                from_visit: "baseline".to_string(),
                to_visit: "week_4".to_string(),
                days: 28,
            }]
        );
    }

    #[test]
    fn test_gaps_exceeding_threshold() {
        let t = timeline(vec![
            visit("baseline", 0, false),
            visit("week_4", 28, false),
            visit("week_24", 168, false),
        ]);
        let long = t.gaps_exceeding(90);
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].from_visit, "week_4");
        assert_eq!(long[0].days, 140);
    }

    #[test]
    fn test_window_bounds() {
        let mut w = VisitWindow::new("Week 4", 28);
        w.tolerance_minus = 3;
        w.tolerance_plus = 5;
        assert_eq!(w.earliest_day(), 25);
        assert_eq!(w.latest_day(), 33);
    }
}
