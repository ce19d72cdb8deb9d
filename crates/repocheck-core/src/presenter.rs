//! Turn a check's captured log into a list of offenses for display.
//!
//! Analyzer output is requested as JSON, but the captured log also holds git
//! and lint preamble, so the report is recovered from the JSON trailing the
//! log. A log without a parseable trailing report presents as zero offenses;
//! the check's own `passed` flag stays authoritative.

use std::sync::OnceLock;

use regex::Regex;
use repocheck_state::{CheckRecord, Language};
use serde::{Deserialize, Serialize};

/// One offense, flattened to a uniform shape across analyzers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffenseEntry {
    pub path: String,
    pub message: String,
    pub rule: Option<String>,
    /// `line:column`
    pub location: String,
}

/// Display view of a check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub offenses_count: u64,
    pub entries: Vec<OffenseEntry>,
    pub passed: bool,
}

/// Build the display view for `check` run against a repository in `language`.
pub fn present(check: &CheckRecord, language: &Language) -> Presentation {
    let (offenses_count, entries) = match language {
        Language::Ruby => parse_rubocop(&check.stdout),
        Language::JavaScript => parse_eslint(&check.stdout),
        Language::Other(_) => (0, Vec::new()),
    };

    let error_blank = check
        .error
        .as_deref()
        .map(|e| e.trim().is_empty())
        .unwrap_or(true);

    Presentation {
        offenses_count,
        entries,
        passed: check.exit_status.unwrap_or(0) == 0 && error_blank,
    }
}

fn trailing_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}\s*\z").expect("trailing object regex compiles"))
}

fn trailing_array_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\[\s*\{.*\}\s*\]\s*\z").expect("trailing array regex compiles")
    })
}

/// The JSON object that ends `text`, if any.
pub fn extract_trailing_json_object(text: &str) -> Option<&str> {
    trailing_object_re().find(text).map(|m| m.as_str())
}

/// The JSON array of objects that ends `text`, if any.
pub fn extract_trailing_json_array(text: &str) -> Option<&str> {
    trailing_array_re().find(text).map(|m| m.as_str())
}

fn location(line: Option<u64>, column: Option<u64>) -> String {
    let part = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_default();
    format!("{}:{}", part(line), part(column))
}

// -- RuboCop -----------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(default)]
struct RubocopReport {
    summary: RubocopSummary,
    files: Vec<RubocopFile>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RubocopSummary {
    offense_count: u64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RubocopFile {
    path: String,
    offenses: Vec<RubocopOffense>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RubocopOffense {
    message: String,
    cop_name: Option<String>,
    location: RubocopLocation,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RubocopLocation {
    line: Option<u64>,
    column: Option<u64>,
}

fn parse_rubocop(log: &str) -> (u64, Vec<OffenseEntry>) {
    let Some(json) = extract_trailing_json_object(log) else {
        return (0, Vec::new());
    };
    let report: RubocopReport = match serde_json::from_str(json) {
        Ok(report) => report,
        Err(e) => {
            tracing::debug!(error = %e, "trailing rubocop output is not valid JSON");
            return (0, Vec::new());
        }
    };

    let entries = report
        .files
        .into_iter()
        .flat_map(|file| {
            let path = file.path;
            file.offenses.into_iter().map(move |o| OffenseEntry {
                path: path.clone(),
                message: o.message,
                rule: o.cop_name,
                location: location(o.location.line, o.location.column),
            })
        })
        .collect();

    (report.summary.offense_count, entries)
}

// -- ESLint ------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct EslintFile {
    file_path: String,
    error_count: u64,
    warning_count: u64,
    messages: Vec<EslintMessage>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct EslintMessage {
    message: String,
    rule_id: Option<String>,
    line: Option<u64>,
    column: Option<u64>,
}

fn parse_eslint(log: &str) -> (u64, Vec<OffenseEntry>) {
    let Some(json) = extract_trailing_json_array(log) else {
        return (0, Vec::new());
    };
    let files: Vec<EslintFile> = match serde_json::from_str(json) {
        Ok(files) => files,
        Err(e) => {
            tracing::debug!(error = %e, "trailing eslint output is not valid JSON");
            return (0, Vec::new());
        }
    };

    let count = files
        .iter()
        .map(|f| f.error_count + f.warning_count)
        .sum();

    let entries = files
        .into_iter()
        .flat_map(|file| {
            let path = file.file_path;
            file.messages.into_iter().map(move |m| OffenseEntry {
                path: path.clone(),
                message: m.message,
                rule: m.rule_id,
                location: location(m.line, m.column),
            })
        })
        .collect();

    (count, entries)
}
