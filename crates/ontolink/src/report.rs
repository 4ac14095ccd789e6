//! Validation issues, the report that collects them, and its renderings.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use log::info;
use serde::Serialize;

use ontolink_core::relationship::SourceLocation;

use crate::error::OntologyError;

/// File name of the markdown report.
pub const MARKDOWN_REPORT: &str = "validation-report.md";

/// File name of the JSON report.
pub const JSON_REPORT: &str = "validation-report.json";

/// What kind of problem an issue describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    MissingTarget,
    UnregisteredLink,
    InvalidType,
    CardinalityViolation,
    FormatViolation,
    MissingRequiredLink,
    DuplicateEntity,
    ParserWarning,
    RegistryGap,
    CountDivergence,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::MissingTarget => "missing-target",
            IssueCategory::UnregisteredLink => "unregistered-link",
            IssueCategory::InvalidType => "invalid-type",
            IssueCategory::CardinalityViolation => "cardinality-violation",
            IssueCategory::FormatViolation => "format-violation",
            IssueCategory::MissingRequiredLink => "missing-required-link",
            IssueCategory::DuplicateEntity => "duplicate-entity",
            IssueCategory::ParserWarning => "parser-warning",
            IssueCategory::RegistryGap => "registry-gap",
            IssueCategory::CountDivergence => "count-divergence",
        }
    }

    /// The severity every issue of this category carries.
    pub fn severity(&self) -> IssueSeverity {
        match self {
            IssueCategory::MissingTarget
            | IssueCategory::UnregisteredLink
            | IssueCategory::InvalidType
            | IssueCategory::CardinalityViolation
            | IssueCategory::DuplicateEntity => IssueSeverity::Error,
            IssueCategory::FormatViolation
            | IssueCategory::MissingRequiredLink
            | IssueCategory::ParserWarning => IssueSeverity::Warning,
            IssueCategory::RegistryGap | IssueCategory::CountDivergence => IssueSeverity::Info,
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueSeverity::Error => write!(f, "error"),
            IssueSeverity::Warning => write!(f, "warning"),
            IssueSeverity::Info => write!(f, "info"),
        }
    }
}

/// One finding of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    category: IssueCategory,
    severity: IssueSeverity,
    message: String,
    location: SourceLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create an issue; the severity follows from the category.
    pub fn new(category: IssueCategory, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            category,
            severity: category.severity(),
            message: message.into(),
            location,
            field_path: None,
            suggestion: None,
        }
    }

    pub fn with_field_path(mut self, field_path: Option<&str>) -> Self {
        self.field_path = field_path.map(str::to_string);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn category(&self) -> IssueCategory {
        self.category
    }

    pub fn severity(&self) -> IssueSeverity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn field_path(&self) -> Option<&str> {
        self.field_path.as_deref()
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.category, self.location, self.message
        )
    }
}

/// The result of a validation run.
///
/// Issues are split by severity and keep the run's ordering within each
/// list. `validation_passed` is `true` exactly when there are no errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    info: Vec<ValidationIssue>,
    layers_validated: usize,
    /// Names of the validated layers, in tree order.
    layers: Vec<String>,
    links_validated: usize,
    validation_passed: bool,
}

impl ValidationReport {
    pub fn new(issues: Vec<ValidationIssue>, layers: Vec<String>, links_validated: usize) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut info = Vec::new();

        for issue in issues {
            match issue.severity {
                IssueSeverity::Error => errors.push(issue),
                IssueSeverity::Warning => warnings.push(issue),
                IssueSeverity::Info => info.push(issue),
            }
        }

        let validation_passed = errors.is_empty();
        Self {
            errors,
            warnings,
            info,
            layers_validated: layers.len(),
            layers,
            links_validated,
            validation_passed,
        }
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn info(&self) -> &[ValidationIssue] {
        &self.info
    }

    pub fn layers_validated(&self) -> usize {
        self.layers_validated
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn links_validated(&self) -> usize {
        self.links_validated
    }

    pub fn validation_passed(&self) -> bool {
        self.validation_passed
    }

    /// All issues: errors, then warnings, then info.
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().chain(&self.warnings).chain(&self.info)
    }

    /// Issues of one category, in report order.
    pub fn issues_of(&self, category: IssueCategory) -> impl Iterator<Item = &ValidationIssue> {
        self.issues().filter(move |issue| issue.category == category)
    }

    pub fn category_counts(&self) -> BTreeMap<IssueCategory, usize> {
        self.issues().fold(BTreeMap::new(), |mut counts, issue| {
            *counts.entry(issue.category).or_default() += 1;
            counts
        })
    }

    /// Process exit code: `0` when passed (and, under `strict`, without
    /// warnings), `1` otherwise.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if self.validation_passed && !(strict && !self.warnings.is_empty()) {
            0
        } else {
            1
        }
    }

    /// Pretty-printed JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns [`OntologyError::Report`] if serialization fails.
    pub fn to_json(&self) -> Result<String, OntologyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Markdown rendering.
    pub fn to_markdown(&self) -> String {
        MarkdownReport(self).to_string()
    }
}

struct MarkdownReport<'a>(&'a ValidationReport);

impl MarkdownReport<'_> {
    fn section(f: &mut fmt::Formatter<'_>, title: &str, issues: &[ValidationIssue]) -> fmt::Result {
        writeln!(f, "## {title} ({})", issues.len())?;
        writeln!(f)?;
        if issues.is_empty() {
            writeln!(f, "None.")?;
            return writeln!(f);
        }

        for issue in issues {
            writeln!(
                f,
                "- **{}** `{}`: {}",
                issue.category, issue.location, issue.message
            )?;
            if let Some(field_path) = &issue.field_path {
                writeln!(f, "  - field: `{field_path}`")?;
            }
            if let Some(suggestion) = &issue.suggestion {
                writeln!(f, "  - suggestion: {suggestion}")?;
            }
        }
        writeln!(f)
    }
}

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let status = if report.validation_passed {
            "PASSED"
        } else {
            "FAILED"
        };

        writeln!(f, "# Link Validation Report")?;
        writeln!(f)?;
        writeln!(f, "**Status:** {status}")?;
        writeln!(f)?;
        writeln!(f, "| Metric | Value |")?;
        writeln!(f, "|---|---|")?;
        writeln!(f, "| Layers validated | {} ({}) |", report.layers_validated, report.layers.join(", "))?;
        writeln!(f, "| Links validated | {} |", report.links_validated)?;
        writeln!(f, "| Errors | {} |", report.errors.len())?;
        writeln!(f, "| Warnings | {} |", report.warnings.len())?;
        writeln!(f, "| Info | {} |", report.info.len())?;
        writeln!(f)?;

        let counts = report.category_counts();
        if !counts.is_empty() {
            writeln!(f, "## Issues by category")?;
            writeln!(f)?;
            writeln!(f, "| Category | Severity | Count |")?;
            writeln!(f, "|---|---|---|")?;
            for (category, count) in counts {
                writeln!(f, "| {category} | {} | {count} |", category.severity())?;
            }
            writeln!(f)?;
        }

        Self::section(f, "Errors", &report.errors)?;
        Self::section(f, "Warnings", &report.warnings)?;
        Self::section(f, "Info", &report.info)
    }
}

/// Where [`write_reports`] put its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// Write the markdown and JSON reports into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns [`OntologyError::Io`] if the directory or a file cannot be
/// written, or [`OntologyError::Report`] if serialization fails.
pub fn write_reports(report: &ValidationReport, dir: &Path) -> Result<ReportPaths, OntologyError> {
    fs::create_dir_all(dir)?;

    let paths = ReportPaths {
        markdown: dir.join(MARKDOWN_REPORT),
        json: dir.join(JSON_REPORT),
    };

    fs::write(&paths.markdown, report.to_markdown())?;
    let mut json = report.to_json()?;
    json.push('\n');
    fs::write(&paths.json, json)?;

    info!(markdown:? = paths.markdown, json:? = paths.json; "Reports written");
    Ok(paths)
}
