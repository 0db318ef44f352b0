//! Core data types for badge computation and reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One repository shown on the dashboard.
///
/// The `hoster`, `namespace` and `name` fields are derived from `url` by
/// [`Project::normalize`](crate::Project::normalize) and never read from the
/// layout file. After normalization the project is shared read-only by every
/// badge computed for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    /// Hosting domain, e.g. `github.com`
    #[serde(skip)]
    pub hoster: String,
    /// Everything between the host and the repository name
    #[serde(skip)]
    pub namespace: String,
    /// Repository name (last path segment)
    #[serde(skip)]
    pub name: String,
    /// Canonical repository URL
    pub url: String,
    #[serde(rename = "azure-organization", skip_serializing_if = "String::is_empty")]
    pub azure_organization: String,
    #[serde(rename = "azure-project", skip_serializing_if = "String::is_empty")]
    pub azure_project: String,
    /// Azure pipeline definition id; enables the azure badges
    #[serde(rename = "azure-definition-id", skip_serializing_if = "String::is_empty")]
    pub azure_definition_id: String,
    #[serde(rename = "goimportpath", skip_serializing_if = "String::is_empty")]
    pub go_import_path: String,
    /// GitHub Actions workflow name for the pipeline badge
    #[serde(skip_serializing_if = "String::is_empty")]
    pub workflow: String,
    /// Badge or column names switched off for this project
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disable: Vec<String>,
    /// Badge names switched on although their column disables them
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enable: Vec<String>,
    /// Access credential for API calls and cloning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Treat a self-hosted instance as GitLab
    #[serde(rename = "gitlab")]
    pub is_gitlab: bool,
}

impl Project {
    pub fn is_github(&self) -> bool {
        self.hoster == "github.com"
    }

    pub fn is_gitlab(&self) -> bool {
        self.hoster == "gitlab.com" || self.is_gitlab
    }

    pub fn is_azure(&self) -> bool {
        !self.azure_definition_id.is_empty()
    }

    /// `namespace/name` with stray slashes removed, as the hoster APIs expect it
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
            .trim_matches('/')
            .to_string()
    }
}

/// A named group of badges rendered in one table column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Column {
    pub name: String,
    /// Badges computed for every project unless the project disables them
    pub enabled: Vec<String>,
    /// Badges computed only for projects that explicitly enable them
    pub disabled: Vec<String>,
}

impl Column {
    /// Enabled followed by disabled badge names, in layout order
    pub fn badge_names(&self) -> impl Iterator<Item = &str> {
        self.enabled
            .iter()
            .chain(self.disabled.iter())
            .map(String::as_str)
    }
}

/// A named group of projects rendered as one block of table rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    pub name: String,
    pub projects: Vec<Project>,
}

/// Dashboard layout: which projects to show and which badges per column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// Table columns, in display order
    pub table: Vec<Column>,
    pub categories: Vec<Category>,
    /// Format string used when publishing relative artifact paths
    #[serde(rename = "staticpath", skip_serializing_if = "Option::is_none")]
    pub static_path: Option<String>,
}

/// Badge color palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    BrightGreen,
    Green,
    YellowGreen,
    Yellow,
    Orange,
    Red,
    Blue,
    LightGrey,
}

impl BadgeColor {
    /// Fill used for the value segment of a rendered badge
    pub fn hex(self) -> &'static str {
        match self {
            Self::BrightGreen => "#4c1",
            Self::Green => "#97ca00",
            Self::YellowGreen => "#a4a61d",
            Self::Yellow => "#dfb317",
            Self::Orange => "#fe7d37",
            Self::Red => "#e05d44",
            Self::Blue => "#007ec6",
            Self::LightGrey => "#9f9f9f",
        }
    }
}

impl std::fmt::Display for BadgeColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BrightGreen => write!(f, "brightgreen"),
            Self::Green => write!(f, "green"),
            Self::YellowGreen => write!(f, "yellowgreen"),
            Self::Yellow => write!(f, "yellow"),
            Self::Orange => write!(f, "orange"),
            Self::Red => write!(f, "red"),
            Self::Blue => write!(f, "blue"),
            Self::LightGrey => write!(f, "lightgrey"),
        }
    }
}

/// Label, value and color of a generated badge image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeFace {
    pub label: String,
    pub value: String,
    pub color: BadgeColor,
}

/// A computed badge. Never mutated once returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Badge {
    /// Image URL, either remote or a path to a generated artifact
    pub url: String,
    /// Link target of the table cell
    pub link: String,
    pub title: String,
    /// Failure text, rendered invisibly next to the badge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present for badges rendered by this crate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face: Option<BadgeFace>,
}

impl Badge {
    /// Badge pointing at an externally rendered image
    pub fn linked(url: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            link: link.into(),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Markdown for one table cell; the error goes into an HTML comment
    pub fn to_markdown(&self) -> String {
        match &self.error {
            Some(error) => format!("[![badge]({})]({})<!--{}-->", self.url, self.link, error),
            None => format!("[![badge]({})]({})", self.url, self.link),
        }
    }
}

/// Composite key of the result table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultKey {
    pub category: String,
    pub project_url: String,
    pub badge: String,
}

impl ResultKey {
    pub fn new(
        category: impl Into<String>,
        project_url: impl Into<String>,
        badge: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            project_url: project_url.into(),
            badge: badge.into(),
        }
    }
}

/// Outcome of one scheduling run
#[derive(Debug, Clone)]
pub struct DashboardReport {
    /// When scheduling started
    pub started_at: DateTime<Utc>,
    /// Settled results; `None` means the badge does not apply
    pub results: HashMap<ResultKey, Option<Badge>>,
    /// Number of (project, badge) units that were scheduled
    pub scheduled: usize,
    /// Whether the global deadline fired before every unit settled
    pub timed_out: bool,
    pub summary: ReportSummary,
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Units that settled before the deadline
    pub settled: usize,
    /// Settled units that produced a badge
    pub badges: usize,
    /// Badges carrying an error
    pub errors: usize,
    /// Settled units whose provider did not apply
    pub inapplicable: usize,
}

impl DashboardReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            results: HashMap::new(),
            scheduled: 0,
            timed_out: false,
            summary: ReportSummary::default(),
        }
    }

    /// Look up one cell
    pub fn badge(&self, category: &str, project_url: &str, badge: &str) -> Option<&Badge> {
        self.results
            .get(&ResultKey::new(category, project_url, badge))
            .and_then(Option::as_ref)
    }

    /// Compute summary statistics from the results
    pub fn compute_summary(&mut self) {
        let mut summary = ReportSummary {
            settled: self.results.len(),
            ..ReportSummary::default()
        };

        for result in self.results.values() {
            match result {
                Some(badge) => {
                    summary.badges += 1;
                    if badge.is_error() {
                        summary.errors += 1;
                    }
                }
                None => summary.inapplicable += 1,
            }
        }

        self.summary = summary;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_hides_error_in_comment() {
        let mut badge = Badge::linked("badges/github.com/x/stars.svg", "https://github.com/a/x");
        assert_eq!(
            badge.to_markdown(),
            "[![badge](badges/github.com/x/stars.svg)](https://github.com/a/x)"
        );

        badge.error = Some("HTTP 500".to_string());
        assert!(badge.to_markdown().ends_with("<!--HTTP 500-->"));
    }

    #[test]
    fn test_project_full_path() {
        let project = Project {
            namespace: "".to_string(),
            name: "widget".to_string(),
            ..Project::default()
        };
        assert_eq!(project.full_path(), "widget");
    }

    #[test]
    fn test_layout_from_yaml() {
        let yaml = r#"
table:
  - name: Info
    enabled: [readme, github-stars]
    disabled: [superlint]
categories:
  - name: Tools
    projects:
      - url: https://gitlab.example.org/team/app
        gitlab: true
        azure-definition-id: "7"
        disable: [readme]
"#;
        let layout: Layout = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(layout.table[0].badge_names().collect::<Vec<_>>(), ["readme", "github-stars", "superlint"]);
        let project = &layout.categories[0].projects[0];
        assert!(project.is_gitlab);
        assert_eq!(project.azure_definition_id, "7");
        assert_eq!(project.disable, ["readme"]);
        assert!(project.hoster.is_empty());
    }

    #[test]
    fn test_compute_summary() {
        let mut report = DashboardReport::new(Utc::now());
        report.results.insert(ResultKey::new("c", "u", "a"), None);
        report.results.insert(ResultKey::new("c", "u", "b"), Some(Badge::linked("x", "y")));
        report.results.insert(
            ResultKey::new("c", "u", "c"),
            Some(Badge {
                error: Some("boom".to_string()),
                ..Badge::default()
            }),
        );
        report.compute_summary();

        assert_eq!(report.summary.settled, 3);
        assert_eq!(report.summary.badges, 2);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.inapplicable, 1);
    }
}
