//! Validation reports, composite scores and recommendations

use chrono::{DateTime, Utc};
use rsvp_provider_core::ValidationResult;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rules::{RuleCategory, RuleDescriptor, Severity};

/// Security score below which an explicit remediation note is added
pub const SECURITY_SCORE_THRESHOLD: u8 = 80;
/// Performance score below which an explicit remediation note is added
pub const PERFORMANCE_SCORE_THRESHOLD: u8 = 70;

/// Outcome of a single rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Passed,
    Warning,
    Failed,
}

impl RuleStatus {
    /// Map a rule's raw result to a status
    ///
    /// Errors fail the rule only when its severity is `error`; a lower
    /// severity rule reporting errors is a warning.
    pub fn from_result(severity: Severity, result: &ValidationResult) -> Self {
        if !result.errors.is_empty() {
            if severity == Severity::Error {
                RuleStatus::Failed
            } else {
                RuleStatus::Warning
            }
        } else if !result.warnings.is_empty() {
            RuleStatus::Warning
        } else {
            RuleStatus::Passed
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleStatus::Passed => "passed",
            RuleStatus::Warning => "warning",
            RuleStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Overall verdict of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallResult {
    Passed,
    Warning,
    Failed,
}

impl fmt::Display for OverallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverallResult::Passed => "passed",
            OverallResult::Warning => "warning",
            OverallResult::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One evaluated rule inside a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRuleResult {
    pub rule: RuleDescriptor,
    pub status: RuleStatus,
    pub result: ValidationResult,
    pub execution_time_ms: u64,
    /// Set when the rule could not evaluate the provider
    pub error: Option<String>,
}

impl ValidationRuleResult {
    pub fn evaluated(rule: RuleDescriptor, result: ValidationResult, execution_time_ms: u64) -> Self {
        Self {
            status: RuleStatus::from_result(rule.severity, &result),
            rule,
            result,
            execution_time_ms,
            error: None,
        }
    }

    /// A rule that raised instead of returning a result
    pub fn errored(rule: RuleDescriptor, message: impl Into<String>, execution_time_ms: u64) -> Self {
        let message = message.into();
        Self {
            rule,
            status: RuleStatus::Failed,
            result: ValidationResult::ok().with_error(message.clone()),
            execution_time_ms,
            error: Some(message),
        }
    }

    fn is_blocking(&self) -> bool {
        self.status == RuleStatus::Failed && self.rule.severity == Severity::Error
    }
}

/// Result of one validation run against one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub report_id: String,
    pub provider_name: String,
    pub provider_type: String,
    pub timestamp: DateTime<Utc>,
    pub overall_result: OverallResult,
    pub total_rules: usize,
    pub passed_rules: usize,
    pub failed_rules: usize,
    pub warning_rules: usize,
    pub results: Vec<ValidationRuleResult>,
    pub recommendations: Vec<String>,
    pub compliance_score: u8,
    pub security_score: u8,
    pub performance_score: u8,
}

impl ValidationReport {
    /// Assemble a report from evaluated rules
    pub fn build(
        report_id: impl Into<String>,
        provider_name: impl Into<String>,
        provider_type: impl Into<String>,
        results: Vec<ValidationRuleResult>,
    ) -> Self {
        let count = |status: RuleStatus| results.iter().filter(|r| r.status == status).count();
        let overall_result = overall_result(&results);
        let compliance_score = compliance_score(&results);
        let security_score = security_score(&results);
        let performance_score = performance_score(&results);

        let mut report = Self {
            report_id: report_id.into(),
            provider_name: provider_name.into(),
            provider_type: provider_type.into(),
            timestamp: Utc::now(),
            overall_result,
            total_rules: results.len(),
            passed_rules: count(RuleStatus::Passed),
            failed_rules: count(RuleStatus::Failed),
            warning_rules: count(RuleStatus::Warning),
            results: Vec::new(),
            recommendations: Vec::new(),
            compliance_score,
            security_score,
            performance_score,
        };
        report.results = results;
        report.recommendations = recommendations(&report);
        report
    }

    /// Whether any rule failed
    pub fn has_failures(&self) -> bool {
        self.failed_rules > 0
    }

    /// All error messages across rules, prefixed with the rule id
    pub fn errors(&self) -> Vec<String> {
        self.results
            .iter()
            .flat_map(|r| r.result.errors.iter().map(move |e| format!("{}: {}", r.rule.id, e)))
            .collect()
    }
}

/// Failed iff an error-severity rule failed; otherwise warning if any rule
/// ended with warning status
///
/// A failed rule below error severity (a warning rule that threw) counts in
/// `failed_rules` and its errors, but does not change the verdict.
pub fn overall_result(results: &[ValidationRuleResult]) -> OverallResult {
    if results.iter().any(ValidationRuleResult::is_blocking) {
        OverallResult::Failed
    } else if results.iter().any(|r| r.status == RuleStatus::Warning) {
        OverallResult::Warning
    } else {
        OverallResult::Passed
    }
}

fn in_category(
    results: &[ValidationRuleResult],
    category: RuleCategory,
) -> impl Iterator<Item = &ValidationRuleResult> {
    results.iter().filter(move |r| r.rule.category == category)
}

fn percentage(numerator: f64, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (100.0 * numerator / total as f64).round().clamp(0.0, 100.0) as u8
}

/// Share of compliance rules that passed; 100 with no compliance rules
pub fn compliance_score(results: &[ValidationRuleResult]) -> u8 {
    let total = in_category(results, RuleCategory::Compliance).count();
    let passed = in_category(results, RuleCategory::Compliance)
        .filter(|r| r.status == RuleStatus::Passed)
        .count();
    percentage(passed as f64, total)
}

/// Points per security rule, capped at 100; 100 with no security rules
///
/// A passed error-severity rule earns 40, any other passed rule 20. A
/// warning earns half of that. Failed rules earn nothing.
pub fn security_score(results: &[ValidationRuleResult]) -> u8 {
    let mut rules = in_category(results, RuleCategory::Security).peekable();
    if rules.peek().is_none() {
        return 100;
    }

    let points: u32 = rules
        .map(|r| match (r.status, r.rule.severity) {
            (RuleStatus::Passed, Severity::Error) => 40,
            (RuleStatus::Passed, _) => 20,
            (RuleStatus::Warning, Severity::Error) => 20,
            (RuleStatus::Warning, _) => 10,
            (RuleStatus::Failed, _) => 0,
        })
        .sum();
    points.min(100) as u8
}

/// Passed plus half the warnings over all performance rules
pub fn performance_score(results: &[ValidationRuleResult]) -> u8 {
    let total = in_category(results, RuleCategory::Performance).count();
    let weighted: f64 = in_category(results, RuleCategory::Performance)
        .map(|r| match r.status {
            RuleStatus::Passed => 1.0,
            RuleStatus::Warning => 0.5,
            RuleStatus::Failed => 0.0,
        })
        .sum();
    percentage(weighted, total)
}

/// Remediation hints derived from rule outcomes and scores
pub fn recommendations(report: &ValidationReport) -> Vec<String> {
    let mut out = Vec::new();
    let has_issues = |category: RuleCategory| {
        in_category(&report.results, category).any(|r| r.status != RuleStatus::Passed)
    };

    if has_issues(RuleCategory::Security) {
        out.push("Review the security configuration and resolve the reported issues".to_string());
        let mentions_ssl = report
            .results
            .iter()
            .flat_map(|r| r.result.warnings.iter())
            .any(|w| w.to_ascii_uppercase().contains("SSL"));
        if mentions_ssl {
            out.push("Enable SSL/TLS for all provider connections".to_string());
        }
    }

    if in_category(&report.results, RuleCategory::Performance).any(|r| r.status == RuleStatus::Warning) {
        out.push("Optimize the provider configuration to reduce response time and error rate".to_string());
    }

    if has_issues(RuleCategory::Configuration) {
        out.push("Complete all required configuration fields".to_string());
    }

    match report.overall_result {
        OverallResult::Failed => {
            out.push("Address all failed validation rules before using this provider in production".to_string());
        }
        OverallResult::Warning => {
            out.push("Consider addressing the validation warnings".to_string());
        }
        OverallResult::Passed => {}
    }

    if report.security_score < SECURITY_SCORE_THRESHOLD {
        out.push(format!(
            "Security score is {}/100; resolve security findings to reach at least {}",
            report.security_score, SECURITY_SCORE_THRESHOLD
        ));
    }

    if report.performance_score < PERFORMANCE_SCORE_THRESHOLD {
        out.push(format!(
            "Performance score is {}/100; investigate provider latency and error rate",
            report.performance_score
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rule(category: RuleCategory, severity: Severity) -> RuleDescriptor {
        RuleDescriptor::new(format!("{}-{}", category, severity), "rule", category, severity)
    }

    fn outcome(category: RuleCategory, severity: Severity, status: RuleStatus) -> ValidationRuleResult {
        let result = match status {
            RuleStatus::Passed => ValidationResult::ok(),
            RuleStatus::Warning => ValidationResult::ok().with_warning("check this"),
            RuleStatus::Failed => ValidationResult::ok().with_error("broken"),
        };
        let mut r = ValidationRuleResult::evaluated(rule(category, severity), result, 1);
        r.status = status;
        r
    }

    #[test]
    fn test_rule_status_mapping() {
        let errors = ValidationResult::ok().with_error("bad");
        assert_eq!(RuleStatus::from_result(Severity::Error, &errors), RuleStatus::Failed);
        assert_eq!(RuleStatus::from_result(Severity::Warning, &errors), RuleStatus::Warning);
        assert_eq!(RuleStatus::from_result(Severity::Info, &errors), RuleStatus::Warning);

        let warnings = ValidationResult::ok().with_warning("meh");
        assert_eq!(RuleStatus::from_result(Severity::Error, &warnings), RuleStatus::Warning);
        assert_eq!(
            RuleStatus::from_result(Severity::Error, &ValidationResult::ok()),
            RuleStatus::Passed
        );
    }

    #[test]
    fn test_empty_categories_score_full() {
        let results = vec![outcome(RuleCategory::Configuration, Severity::Error, RuleStatus::Failed)];
        assert_eq!(compliance_score(&results), 100);
        assert_eq!(security_score(&results), 100);
        assert_eq!(performance_score(&results), 100);
    }

    #[test]
    fn test_security_points() {
        let results = vec![
            outcome(RuleCategory::Security, Severity::Error, RuleStatus::Passed),
            outcome(RuleCategory::Security, Severity::Warning, RuleStatus::Warning),
        ];
        assert_eq!(security_score(&results), 50);

        let capped = vec![
            outcome(RuleCategory::Security, Severity::Error, RuleStatus::Passed),
            outcome(RuleCategory::Security, Severity::Error, RuleStatus::Passed),
            outcome(RuleCategory::Security, Severity::Error, RuleStatus::Passed),
        ];
        assert_eq!(security_score(&capped), 100);
    }

    #[test]
    fn test_performance_counts_half_warnings() {
        let results = vec![
            outcome(RuleCategory::Performance, Severity::Warning, RuleStatus::Passed),
            outcome(RuleCategory::Performance, Severity::Warning, RuleStatus::Warning),
            outcome(RuleCategory::Performance, Severity::Warning, RuleStatus::Failed),
        ];
        assert_eq!(performance_score(&results), 50);
    }

    #[test]
    fn test_compliance_rounds() {
        let results = vec![
            outcome(RuleCategory::Compliance, Severity::Warning, RuleStatus::Passed),
            outcome(RuleCategory::Compliance, Severity::Warning, RuleStatus::Passed),
            outcome(RuleCategory::Compliance, Severity::Warning, RuleStatus::Warning),
        ];
        assert_eq!(compliance_score(&results), 67);
    }

    #[test]
    fn test_errored_rule_is_failed() {
        let r = ValidationRuleResult::errored(rule(RuleCategory::Integration, Severity::Warning), "boom", 3);
        assert_eq!(r.status, RuleStatus::Failed);
        assert_eq!(r.result.errors, vec!["boom".to_string()]);
        assert_eq!(overall_result(&[r]), OverallResult::Passed);
    }

    #[test]
    fn test_recommendations_for_failed_report() {
        let mut ssl = outcome(RuleCategory::Security, Severity::Error, RuleStatus::Warning);
        ssl.result = ValidationResult::ok().with_warning("SSL is disabled");
        let results = vec![
            ssl,
            outcome(RuleCategory::Configuration, Severity::Error, RuleStatus::Failed),
            outcome(RuleCategory::Performance, Severity::Warning, RuleStatus::Warning),
        ];
        let report = ValidationReport::build("r1", "guests-db", "postgresql", results);

        assert_eq!(report.overall_result, OverallResult::Failed);
        assert_eq!(report.security_score, 20);
        assert_eq!(report.performance_score, 50);
        let text = report.recommendations.join("\n");
        assert!(text.contains("Enable SSL/TLS"));
        assert!(text.contains("Optimize"));
        assert!(text.contains("Complete all required configuration fields"));
        assert!(text.contains("before using this provider in production"));
        assert!(text.contains("Security score is 20/100"));
        assert!(text.contains("Performance score is 50/100"));
    }

    #[test]
    fn test_clean_report_has_no_recommendations() {
        let results = vec![
            outcome(RuleCategory::Security, Severity::Error, RuleStatus::Passed),
            outcome(RuleCategory::Security, Severity::Error, RuleStatus::Passed),
        ];
        let report = ValidationReport::build("r2", "mail", "smtp", results);
        assert_eq!(report.overall_result, OverallResult::Passed);
        assert_eq!(report.security_score, 80);
        assert!(report.recommendations.is_empty());
    }

    fn arb_outcome() -> impl Strategy<Value = ValidationRuleResult> {
        let category = prop_oneof![
            Just(RuleCategory::Security),
            Just(RuleCategory::Compliance),
            Just(RuleCategory::Performance),
            Just(RuleCategory::Configuration),
            Just(RuleCategory::Integration),
        ];
        let severity = prop_oneof![Just(Severity::Error), Just(Severity::Warning), Just(Severity::Info)];
        let status = prop_oneof![
            Just(RuleStatus::Passed),
            Just(RuleStatus::Warning),
            Just(RuleStatus::Failed)
        ];
        (category, severity, status).prop_map(|(c, s, st)| outcome(c, s, st))
    }

    proptest! {
        #[test]
        fn prop_scores_stay_in_bounds(results in proptest::collection::vec(arb_outcome(), 0..40)) {
            let report = ValidationReport::build("p", "p", "generic", results);
            prop_assert!(report.compliance_score <= 100);
            prop_assert!(report.security_score <= 100);
            prop_assert!(report.performance_score <= 100);
            prop_assert_eq!(
                report.passed_rules + report.warning_rules + report.failed_rules,
                report.total_rules
            );
        }

        #[test]
        fn prop_failed_iff_blocking_rule(results in proptest::collection::vec(arb_outcome(), 0..20)) {
            let blocking = results
                .iter()
                .any(|r| r.rule.severity == Severity::Error && r.status == RuleStatus::Failed);
            prop_assert_eq!(overall_result(&results) == OverallResult::Failed, blocking);
        }

        #[test]
        fn prop_warning_only_from_warning_status(results in proptest::collection::vec(arb_outcome(), 0..20)) {
            let blocking = results
                .iter()
                .any(|r| r.rule.severity == Severity::Error && r.status == RuleStatus::Failed);
            let warned = results.iter().any(|r| r.status == RuleStatus::Warning);
            let expected = match (blocking, warned) {
                (true, _) => OverallResult::Failed,
                (false, true) => OverallResult::Warning,
                (false, false) => OverallResult::Passed,
            };
            prop_assert_eq!(overall_result(&results), expected);
        }
    }
}
