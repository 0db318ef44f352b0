//! Badges whose image and link are URLs built from project fields

use super::Provider;
use crate::artifact::ArtifactEmitter;
use crate::error::{DashboardError, Result};
use crate::types::{Badge, Project};
use async_trait::async_trait;

/// Applicability check for a template badge
pub type Condition = fn(&Project) -> bool;

/// Substitute `{{.Field}}` placeholders with project fields.
///
/// Known fields are `Hoster`, `Namespace`, `Name`, `URL`, `AzureOrganization`,
/// `AzureProject`, `AzureDefinitionID`, `GoImportPath` and `Workflow`.
pub fn render_template(template: &str, project: &Project) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| DashboardError::template(format!("unclosed placeholder in {:?}", template)))?;

        let placeholder = after[..end].trim();
        let field = placeholder
            .strip_prefix('.')
            .ok_or_else(|| DashboardError::template(format!("unsupported placeholder {{{{{}}}}}", placeholder)))?;
        out.push_str(field_value(project, field)?);

        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn field_value<'a>(project: &'a Project, field: &str) -> Result<&'a str> {
    let value: &str = match field {
        "Hoster" => &project.hoster,
        "Namespace" => &project.namespace,
        "Name" => &project.name,
        "URL" => &project.url,
        "AzureOrganization" => &project.azure_organization,
        "AzureProject" => &project.azure_project,
        "AzureDefinitionID" => &project.azure_definition_id,
        "GoImportPath" => &project.go_import_path,
        "Workflow" => &project.workflow,
        _ => return Err(DashboardError::template(format!("unknown project field {:?}", field))),
    };
    Ok(value)
}

/// Badge rendered by an external service
#[derive(Debug, Clone)]
pub struct TemplateProvider {
    name: String,
    image: String,
    link: String,
    condition: Option<Condition>,
    artifacts: ArtifactEmitter,
}

impl TemplateProvider {
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        link: impl Into<String>,
        condition: Option<Condition>,
        artifacts: ArtifactEmitter,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            link: link.into(),
            condition,
            artifacts,
        }
    }

    /// Render without checking the condition
    pub(crate) async fn render(&self, project: &Project) -> Badge {
        let rendered = render_template(&self.image, project)
            .and_then(|image| Ok((image, render_template(&self.link, project)?)));

        match rendered {
            Ok((image, link)) => Badge {
                title: self.name.clone(),
                ..Badge::linked(image, link)
            },
            Err(e) => self.artifacts.error_badge(project, &self.name, e).await,
        }
    }
}

#[async_trait]
impl Provider for TemplateProvider {
    async fn badge(&self, project: &Project) -> Option<Badge> {
        match self.condition {
            Some(applies) if !applies(project) => None,
            _ => Some(self.render(project).await),
        }
    }
}

/// Hoster logo
#[derive(Debug, Clone, Copy)]
pub struct Icon;

#[async_trait]
impl Provider for Icon {
    async fn badge(&self, project: &Project) -> Option<Badge> {
        let image = match project.hoster.as_str() {
            "github.com" => "style/github.png",
            "gitlab.com" => "style/gitlab.png",
            _ => return None,
        };
        Some(Badge {
            title: "icon".to_string(),
            ..Badge::linked(image, &project.url)
        })
    }
}
