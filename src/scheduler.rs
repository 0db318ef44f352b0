//! Fan-out of every (project, badge) pair of a layout

use crate::config::SchedulerConfig;
use crate::providers::Registry;
use crate::types::{Badge, Column, DashboardReport, Layout, Project, ResultKey};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Write-once store of settled badge computations
#[derive(Debug, Default)]
pub struct ResultTable {
    cells: DashMap<ResultKey, Option<Badge>>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result. Returns `false` and keeps the existing value when the
    /// key was already written.
    pub fn insert(&self, key: ResultKey, result: Option<Badge>) -> bool {
        match self.cells.entry(key) {
            Entry::Occupied(entry) => {
                warn!("Result for {:?} already recorded", entry.key());
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(result);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copy of everything settled so far
    pub fn snapshot(&self) -> HashMap<ResultKey, Option<Badge>> {
        self.cells
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

fn contains_ignore_case(list: &[String], name: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(name))
}

/// Badge names of `column` that apply to `project`, in layout order.
///
/// An enabled badge runs unless the project disables it or the whole column;
/// a disabled badge runs only if the project enables it.
pub fn effective_badges<'a>(column: &'a Column, project: &Project) -> Vec<&'a str> {
    let column_disabled = contains_ignore_case(&project.disable, &column.name);

    let enabled = column
        .enabled
        .iter()
        .filter(|name| !column_disabled && !contains_ignore_case(&project.disable, name));
    let opted_in = column
        .disabled
        .iter()
        .filter(|name| contains_ignore_case(&project.enable, name));

    enabled.chain(opted_in).map(String::as_str).collect()
}

/// Compute every applicable badge of `layout` concurrently.
///
/// Returns once all units have settled or the deadline has passed. Units still
/// running at the deadline are left to finish in the background and their
/// results are not part of the report.
pub async fn run_dashboard(layout: &Layout, registry: &Registry, config: &SchedulerConfig) -> DashboardReport {
    let mut report = DashboardReport::new(Utc::now());
    let table = Arc::new(ResultTable::new());
    let limiter = config.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
    let mut scheduled = HashSet::new();
    let mut tasks = JoinSet::new();

    for category in &layout.categories {
        for project in &category.projects {
            let shared = Arc::new(project.clone());

            for column in &layout.table {
                for name in effective_badges(column, project) {
                    let key = ResultKey::new(&category.name, &project.url, name);
                    if scheduled.contains(&key) {
                        continue;
                    }

                    let Some(provider) = registry.lookup(name) else {
                        warn!("{} badge missing", name);
                        continue;
                    };

                    scheduled.insert(key.clone());
                    let project = Arc::clone(&shared);
                    let table = Arc::clone(&table);
                    let limiter = limiter.clone();

                    tasks.spawn(async move {
                        let _permit = match limiter {
                            Some(limiter) => limiter.acquire_owned().await.ok(),
                            None => None,
                        };
                        debug!("Computing {} for {}", key.badge, key.project_url);
                        let badge = provider.badge(&project).await;
                        table.insert(key, badge);
                    });
                }
            }
        }
    }

    report.scheduled = scheduled.len();
    info!("Scheduled {} badge computations", report.scheduled);

    let settle = async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Badge computation failed: {}", e);
            }
        }
    };

    if tokio::time::timeout(config.deadline(), settle).await.is_err() {
        warn!(
            "Timed out after {}s with {}/{} badges computed",
            config.deadline_secs,
            table.len(),
            report.scheduled
        );
        report.timed_out = true;
        tasks.detach_all();
    }

    report.results = table.snapshot();
    report.compute_summary();

    info!(
        "Computed {} badges ({} errors, {} not applicable)",
        report.summary.badges, report.summary.errors, report.summary.inapplicable
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Provider;
    use crate::types::Category;
    use async_trait::async_trait;
    use std::time::Duration;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn project(url: &str) -> Project {
        Project {
            url: url.to_string(),
            ..Project::default()
        }
    }

    struct Always;

    #[async_trait]
    impl Provider for Always {
        async fn badge(&self, project: &Project) -> Option<Badge> {
            Some(Badge::linked("img.svg", &project.url))
        }
    }

    struct Never;

    #[async_trait]
    impl Provider for Never {
        async fn badge(&self, _project: &Project) -> Option<Badge> {
            None
        }
    }

    struct Failing;

    #[async_trait]
    impl Provider for Failing {
        async fn badge(&self, _project: &Project) -> Option<Badge> {
            Some(Badge {
                error: Some("HTTP 502".to_string()),
                ..Badge::linked("err.svg", "x")
            })
        }
    }

    struct Hanging;

    #[async_trait]
    impl Provider for Hanging {
        async fn badge(&self, _project: &Project) -> Option<Badge> {
            std::future::pending::<()>().await;
            None
        }
    }

    fn layout(enabled: &[&str], disabled: &[&str], project: Project) -> Layout {
        Layout {
            table: vec![Column {
                name: "Info".to_string(),
                enabled: names(enabled),
                disabled: names(disabled),
            }],
            categories: vec![Category {
                name: "Tools".to_string(),
                projects: vec![project],
            }],
            static_path: None,
        }
    }

    #[test]
    fn test_effective_badges_override_rule() {
        let column = Column {
            name: "Info".to_string(),
            enabled: names(&["A", "B"]),
            disabled: names(&["C"]),
        };
        let project = Project {
            disable: names(&["A"]),
            enable: names(&["C"]),
            ..Project::default()
        };

        assert_eq!(effective_badges(&column, &project), ["B", "C"]);
    }

    #[test]
    fn test_effective_badges_case_insensitive_and_column_disable() {
        let column = Column {
            name: "Info".to_string(),
            enabled: names(&["readme"]),
            disabled: names(&["superlint"]),
        };

        let mut project = Project {
            disable: names(&["README"]),
            enable: names(&["SuperLint"]),
            ..Project::default()
        };
        assert_eq!(effective_badges(&column, &project), ["superlint"]);

        project.disable = names(&["info"]);
        project.enable.clear();
        assert!(effective_badges(&column, &project).is_empty());
    }

    #[test]
    fn test_result_table_is_write_once() {
        let table = ResultTable::new();
        let key = ResultKey::new("c", "u", "b");

        assert!(table.insert(key.clone(), Some(Badge::linked("first", "x"))));
        assert!(!table.insert(key.clone(), None));
        assert_eq!(table.snapshot()[&key].as_ref().unwrap().url, "first");
    }

    #[tokio::test]
    async fn test_absent_and_error_cells_differ() {
        let mut registry = Registry::new();
        registry.register("never", Never);
        registry.register("failing", Failing);
        registry.register("always", Always);

        let layout = layout(&["never", "failing", "always", "unknown"], &[], project("https://h/x/y"));
        let report = run_dashboard(&layout, &registry, &SchedulerConfig::default()).await;

        assert_eq!(report.scheduled, 3);
        assert!(!report.timed_out);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[&ResultKey::new("Tools", "https://h/x/y", "never")], None);
        assert!(report.badge("Tools", "https://h/x/y", "failing").unwrap().is_error());
        assert!(!report.badge("Tools", "https://h/x/y", "always").unwrap().is_error());
        assert_eq!(report.summary.inapplicable, 1);
        assert_eq!(report.summary.errors, 1);
    }

    #[tokio::test]
    async fn test_deadline_returns_partial_results() {
        let mut registry = Registry::new();
        registry.register("hang", Hanging);
        registry.register("always", Always);

        let layout = layout(&["hang", "always"], &[], project("https://h/x/y"));
        let config = SchedulerConfig {
            deadline_secs: 1,
            max_concurrency: None,
        };

        let started = std::time::Instant::now();
        let report = run_dashboard(&layout, &registry, &config).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(report.timed_out);
        assert_eq!(report.scheduled, 2);
        assert!(report.badge("Tools", "https://h/x/y", "always").is_some());
        assert!(!report.results.contains_key(&ResultKey::new("Tools", "https://h/x/y", "hang")));
    }

    #[tokio::test]
    async fn test_concurrency_limit_still_completes() {
        let mut registry = Registry::new();
        registry.register("a", Always);
        registry.register("b", Always);
        registry.register("c", Always);

        let layout = layout(&["a", "b", "c", "a"], &[], project("https://h/x/y"));
        let config = SchedulerConfig {
            deadline_secs: 30,
            max_concurrency: Some(1),
        };
        let report = run_dashboard(&layout, &registry, &config).await;

        assert_eq!(report.scheduled, 3);
        assert_eq!(report.summary.badges, 3);
    }
}
