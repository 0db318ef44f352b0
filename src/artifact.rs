//! Badge image and tool log artifacts on disk

use crate::error::Result;
use crate::types::{Badge, BadgeColor, BadgeFace, Project};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Values longer than this are cut down to [`TRUNCATED_VALUE_LEN`]
const MAX_VALUE_LEN: usize = 40;
const TRUNCATED_VALUE_LEN: usize = 35;

/// Approximate advance of one character in 11px Verdana
const CHAR_WIDTH: usize = 7;
const SEGMENT_PADDING: usize = 10;

/// Writes generated artifacts below `<root>/badges/<hoster>/<project>/`
#[derive(Debug, Clone)]
pub struct ArtifactEmitter {
    root: PathBuf,
}

impl ArtifactEmitter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Render a badge image and describe it.
    ///
    /// `file` names the image (`<file>.svg`), `label` and `value` are the two
    /// halves of the face. Failing to write the image yields a badge carrying
    /// that error rather than an error return.
    pub async fn emit(
        &self,
        project: &Project,
        file: &str,
        label: &str,
        value: &str,
        color: BadgeColor,
        link: &str,
        error: Option<String>,
    ) -> Badge {
        let value = truncate_value(value);
        let relative = artifact_path(project, &format!("{}.svg", file));
        let face = BadgeFace {
            label: label.to_string(),
            value: value.clone(),
            color,
        };

        let error = match self.write(&relative, render_svg(label, &value, color).as_bytes()).await {
            Ok(()) => error,
            Err(e) => {
                warn!("Failed to write badge {}: {}", relative, e);
                Some(match error {
                    Some(original) => format!("{}; {}", original, e),
                    None => e.to_string(),
                })
            }
        };

        Badge {
            url: relative,
            link: link.to_string(),
            title: file.to_string(),
            error,
            face: Some(face),
        }
    }

    /// Error-flavored badge: grey "Error" face with the failure attached
    pub async fn error_badge(&self, project: &Project, file: &str, error: impl ToString) -> Badge {
        let error = error.to_string();
        self.emit(project, file, file, "Error", BadgeColor::LightGrey, &project.url, Some(error))
            .await
    }

    /// Persist a plain-text tool log next to the project's badges and return
    /// its path relative to the artifact root.
    pub async fn write_log(&self, project: &Project, tool: &str, content: &[u8]) -> Result<String> {
        let relative = artifact_path(project, &format!("{}.txt", tool));
        self.write(&relative, content).await?;
        Ok(relative)
    }

    async fn write(&self, relative: &str, content: &[u8]) -> Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// `badges/<hoster>/<project-name>/<file>` with forward slashes
fn artifact_path(project: &Project, file: &str) -> String {
    format!("badges/{}/{}/{}", project.hoster, project.name, file)
}

fn truncate_value(value: &str) -> String {
    if value.chars().count() > MAX_VALUE_LEN {
        value.chars().take(TRUNCATED_VALUE_LEN).collect()
    } else {
        value.to_string()
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Flat two-segment shield on a single line
fn render_svg(label: &str, value: &str, color: BadgeColor) -> String {
    let label_width = label.chars().count() * CHAR_WIDTH + SEGMENT_PADDING;
    let value_width = value.chars().count() * CHAR_WIDTH + SEGMENT_PADDING;
    let width = label_width + value_width;
    let label_x = label_width / 2;
    let value_x = label_width + value_width / 2;
    let label = escape_xml(label);
    let value = escape_xml(value);

    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="20">"#,
            r#"<linearGradient id="smooth" x2="0" y2="100%">"#,
            r##"<stop offset="0" stop-color="#bbb" stop-opacity=".1"/>"##,
            r#"<stop offset="1" stop-opacity=".1"/></linearGradient>"#,
            r##"<mask id="round"><rect width="{width}" height="20" rx="3" fill="#fff"/></mask>"##,
            r#"<g mask="url(#round)">"#,
            r##"<rect width="{label_width}" height="20" fill="#555"/>"##,
            r#"<rect x="{label_width}" width="{value_width}" height="20" fill="{fill}"/>"#,
            r#"<rect width="{width}" height="20" fill="url(#smooth)"/></g>"#,
            r##"<g fill="#fff" text-anchor="middle" font-family="DejaVu Sans,Verdana,Geneva,sans-serif" font-size="11">"##,
            r##"<text x="{label_x}" y="15" fill="#010101" fill-opacity=".3">{label}</text>"##,
            r#"<text x="{label_x}" y="14">{label}</text>"#,
            r##"<text x="{value_x}" y="15" fill="#010101" fill-opacity=".3">{value}</text>"##,
            r#"<text x="{value_x}" y="14">{value}</text></g></svg>"#,
        ),
        width = width,
        label_width = label_width,
        value_width = value_width,
        fill = color.hex(),
        label_x = label_x,
        value_x = value_x,
        label = label,
        value = value,
    )
}
