//! `nbconsole list` and `nbconsole link` - non-interactive listing

use std::sync::Arc;

use chrono::NaiveDate;

use notebook_core::filter::{DateRange, ProjectFilter, QueryFilter};
use notebook_core::link::build_notebook_detail_url;
use notebook_core::model::Instance;
use notebook_core::notify::TracingNotifier;

use crate::console::Setup;

#[derive(Debug, Default)]
pub struct ListArgs {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub project: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub ignore_case: bool,
    pub json: bool,
}

impl ListArgs {
    pub fn filter(&self) -> Result<QueryFilter, String> {
        let mut filter = QueryFilter::new().with_case_sensitive(!self.ignore_case);
        if let Some(search) = &self.search {
            filter = filter.with_search(search.clone());
        }
        if let Some(tag) = &self.tag {
            filter = filter.with_tag_query(tag.clone());
        }
        if let Some(project) = &self.project {
            filter = filter.with_project(ProjectFilter::parse(project));
        }
        match (self.from, self.to) {
            (None, None) => {}
            (Some(from), Some(to)) => filter = filter.with_date_range(DateRange::new(from, to)),
            _ => return Err("--from and --to must be given together".to_string()),
        }
        Ok(filter)
    }
}

/// Run the list command
pub async fn run_list(setup: &Setup, args: ListArgs) -> Result<(), String> {
    let filter = args.filter()?;
    let manager = setup.manager(Arc::new(TracingNotifier)).await?;
    let rows = manager.filtered(&filter).await;

    if args.json {
        let json = serde_json::to_string_pretty(&rows)
            .map_err(|e| format!("Failed to encode listing: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    let total = manager.instances().await.len();
    println!("Source: {}", setup.source_label());
    println!("Filter: {}  ({} of {})\n", filter.label(), rows.len(), total);
    print!("{}", format_table(&rows));
    Ok(())
}

/// Run the link command
pub async fn run_link(setup: &Setup, id: &str) -> Result<(), String> {
    let manager = setup.manager(Arc::new(TracingNotifier)).await?;
    let Some(inst) = manager.instance(id).await else {
        let known: Vec<String> = manager.instances().await.into_iter().map(|i| i.id).collect();
        return Err(format!(
            "Unknown instance '{}'. Available: {}",
            id,
            known.join(", ")
        ));
    };

    println!("{}", build_notebook_detail_url(&inst.id));
    if let Some(url) = &inst.url {
        println!("{}", url);
    }
    Ok(())
}

pub fn format_table(rows: &[Instance]) -> String {
    if rows.is_empty() {
        return "No instances match.\n".to_string();
    }

    let id_width = rows.iter().map(|i| i.id.len()).max().unwrap_or(2).max(2);
    let name_width = rows.iter().map(|i| i.name.len()).max().unwrap_or(4).max(4);

    let mut out = format!(
        "{:<id_width$}  {:<name_width$}  {:<9}  {:<8}  {}\n",
        "ID", "NAME", "STATUS", "RUNTIME", "CREATED"
    );
    for inst in rows {
        out.push_str(&format!(
            "{:<id_width$}  {:<name_width$}  {:<9}  {:<8}  {}\n",
            inst.id,
            inst.name,
            inst.status.label(),
            inst.runtime_label(),
            inst.created_at.format("%Y-%m-%d"),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use notebook_core::backend::EndpointConfig;

    use crate::fixtures::DemoSource;

    #[test]
    fn test_date_range_needs_both_ends() {
        let args = ListArgs {
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        assert!(args.filter().is_err());
    }

    #[test]
    fn test_args_build_filter() {
        let args = ListArgs {
            search: Some("bert".into()),
            project: Some("all".into()),
            ignore_case: true,
            ..Default::default()
        };
        let filter = args.filter().unwrap();
        assert_eq!(filter.search_term, "bert");
        assert_eq!(filter.project_filter, ProjectFilter::All);
        assert!(!filter.case_sensitive);
    }

    #[test]
    fn test_table_lists_every_row() {
        let fixtures = DemoSource::new(EndpointConfig::default()).fixtures();
        let table = format_table(&fixtures.instances);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 1 + fixtures.instances.len());
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("running"));
        assert!(lines[2].contains("stopped"));
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(format_table(&[]), "No instances match.\n");
    }
}
