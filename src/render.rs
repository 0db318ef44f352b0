//! Markdown table output

use crate::error::Result;
use crate::types::{DashboardReport, Layout};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Render the dashboard table.
///
/// One header row with the column names, then per category a bold title row
/// followed by one row per project. A cell holds the badges of its column in
/// layout order; badges that were absent or did not settle render as nothing.
pub fn render_markdown(layout: &Layout, report: &DashboardReport) -> String {
    let mut md = String::new();
    if layout.categories.is_empty() {
        return md;
    }

    md.push_str("| Name ");
    for column in &layout.table {
        let _ = write!(md, "| {} ", column.name);
    }
    md.push_str("|\n");
    md.push_str(&"| --- ".repeat(layout.table.len() + 1));
    md.push_str("|\n");

    for category in &layout.categories {
        let _ = writeln!(md, "| **{}** {}", category.name, "|".repeat(layout.table.len() + 1));

        for project in &category.projects {
            let _ = write!(md, "| [{}]({}) |", project.name, project.url);
            for column in &layout.table {
                for name in column.badge_names() {
                    if let Some(badge) = report.badge(&category.name, &project.url, name) {
                        md.push_str(&badge.to_markdown());
                    }
                }
                md.push('|');
            }
            md.push('\n');
        }
    }

    md
}

/// Write `index.md` into `dir`
pub fn write_index(dir: &Path, markdown: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("index.md");
    std::fs::write(&path, markdown)?;
    info!("Dashboard written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Badge, Category, Column, Project, ResultKey};
    use chrono::Utc;

    fn layout() -> Layout {
        Layout {
            table: vec![
                Column {
                    name: "Info".to_string(),
                    enabled: vec!["icon".to_string(), "github-stars".to_string()],
                    disabled: vec![],
                },
                Column {
                    name: "Lint".to_string(),
                    enabled: vec![],
                    disabled: vec!["superlint".to_string()],
                },
            ],
            categories: vec![Category {
                name: "Tools".to_string(),
                projects: vec![Project {
                    name: "widget".to_string(),
                    url: "https://github.com/acme/widget".to_string(),
                    ..Project::default()
                }],
            }],
            static_path: None,
        }
    }

    #[test]
    fn test_render_markdown() {
        let mut report = DashboardReport::new(Utc::now());
        let url = "https://github.com/acme/widget";
        report.results.insert(ResultKey::new("Tools", url, "icon"), None);
        report.results.insert(
            ResultKey::new("Tools", url, "github-stars"),
            Some(Badge::linked("badges/github.com/widget/stars.svg", format!("{}/stargazers", url))),
        );

        let md = render_markdown(&layout(), &report);
        let lines: Vec<_> = md.lines().collect();

        assert_eq!(lines[0], "| Name | Info | Lint |");
        assert_eq!(lines[1], "| --- | --- | --- |");
        assert_eq!(lines[2], "| **Tools** |||");
        assert_eq!(
            lines[3],
            "| [widget](https://github.com/acme/widget) |[![badge](badges/github.com/widget/stars.svg)](https://github.com/acme/widget/stargazers)||"
        );
    }

    #[test]
    fn test_empty_layout_renders_nothing() {
        let report = DashboardReport::new(Utc::now());
        assert!(render_markdown(&Layout::default(), &report).is_empty());
    }

    #[test]
    fn test_write_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(&dir.path().join("out"), "| Name |\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "| Name |\n");
    }
}
