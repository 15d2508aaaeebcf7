use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{Dataset, Instance, Project, Tag};

/// Anything the listing toolbar can filter.
pub trait Filterable {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn tags(&self) -> &[Tag];
    fn created_at(&self) -> DateTime<Utc>;
    /// Owning project; a project owns itself
    fn project(&self) -> Option<&str>;
}

impl Filterable for Instance {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn tags(&self) -> &[Tag] {
        &self.tags
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }
}

impl Filterable for Project {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn tags(&self) -> &[Tag] {
        &self.tags
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn project(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl Filterable for Dataset {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn tags(&self) -> &[Tag] {
        &self.tags
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn project(&self) -> Option<&str> {
        Some(&self.project)
    }
}

/// Inclusive range of creation dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range, swapping the ends if given backwards.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        self.start <= day && day <= self.end
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ProjectFilter {
    #[default]
    All,
    Only(String),
}

impl ProjectFilter {
    /// `"all"` and the empty string mean no project restriction.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() || s == "all" {
            Self::All
        } else {
            Self::Only(s.to_string())
        }
    }

    pub fn matches(&self, project: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(p) => project == Some(p.as_str()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Only(p) => p,
        }
    }
}

/// The listing toolbar: search, tag query, date range and project selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryFilter {
    pub search_term: String,
    pub tag_query: String,
    pub date_range: Option<DateRange>,
    pub project_filter: ProjectFilter,
    pub case_sensitive: bool,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            tag_query: String::new(),
            date_range: None,
            project_filter: ProjectFilter::All,
            case_sensitive: true,
        }
    }
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn with_tag_query(mut self, query: impl Into<String>) -> Self {
        self.tag_query = query.into();
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_project(mut self, project: ProjectFilter) -> Self {
        self.project_filter = project;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search_term.is_empty()
            && self.tag_query.is_empty()
            && self.date_range.is_none()
            && self.project_filter == ProjectFilter::All
    }

    /// Restore every toolbar field to its default. Case sensitivity is a
    /// console setting, not a toolbar field, and survives a reset.
    pub fn reset(&mut self) {
        self.search_term.clear();
        self.tag_query.clear();
        self.date_range = None;
        self.project_filter = ProjectFilter::All;
    }

    pub fn matches<R: Filterable + ?Sized>(&self, record: &R) -> bool {
        self.matches_search(record)
            && self.matches_tags(record.tags())
            && self
                .date_range
                .is_none_or(|range| range.contains(record.created_at()))
            && self.project_filter.matches(record.project())
    }

    pub fn apply<'a, R: Filterable>(&self, records: &'a [R]) -> Vec<&'a R> {
        records.iter().filter(|r| self.matches(*r)).collect()
    }

    fn matches_search<R: Filterable + ?Sized>(&self, record: &R) -> bool {
        self.search_term.is_empty()
            || self.contains(record.id(), &self.search_term)
            || self.contains(record.name(), &self.search_term)
    }

    fn matches_tags(&self, tags: &[Tag]) -> bool {
        self.tag_query.is_empty()
            || tags
                .iter()
                .any(|t| self.contains(&t.to_string(), &self.tag_query))
    }

    fn contains(&self, haystack: &str, needle: &str) -> bool {
        if self.case_sensitive {
            haystack.contains(needle)
        } else {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }
    }

    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if !self.search_term.is_empty() {
            parts.push(format!("/{}/", self.search_term));
        }
        if !self.tag_query.is_empty() {
            parts.push(format!("tag:{}", self.tag_query));
        }
        if let Some(r) = &self.date_range {
            parts.push(format!("{}..{}", r.start, r.end));
        }
        if let ProjectFilter::Only(p) = &self.project_filter {
            parts.push(format!("project:{}", p));
        }
        if parts.is_empty() {
            "ALL".to_string()
        } else {
            parts.join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::InstanceStatus;

    fn inst(id: &str, name: &str, day: u32, project: &str, tags: &[(&str, &str)]) -> Instance {
        Instance {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            status: InstanceStatus::Stopped,
            spec: "CPU".into(),
            image: "img".into(),
            runtime: None,
            ssh_enabled: false,
            auto_stop_hours: None,
            url: None,
            ssh_command: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, day, 9, 30, 0).unwrap(),
            creator: "me".into(),
            project: Some(project.into()),
            tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
            storage: Vec::new(),
        }
    }

    fn fixtures() -> Vec<Instance> {
        vec![
            inst("NB-20240301-a1", "resnet-train", 1, "vision", &[("team", "cv")]),
            inst("NB-20230915-b2", "bert NB-2024 retry", 5, "nlp", &[("team", "nlp")]),
            inst("NB-20230101-c3", "scratch", 10, "vision", &[("env", "dev")]),
            inst("nb-20240420-d4", "lowercase id", 20, "nlp", &[]),
        ]
    }

    #[test]
    fn test_search_matches_id_or_name_substring() {
        let all = fixtures();
        let f = QueryFilter::new().with_search("NB-2024");
        let ids: Vec<_> = f.apply(&all).into_iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["NB-20240301-a1", "NB-20230915-b2"]);
    }

    #[test]
    fn test_search_is_case_sensitive_by_default() {
        let all = fixtures();
        let f = QueryFilter::new().with_search("nb-2024");
        assert_eq!(f.apply(&all).len(), 1);

        let f = f.with_case_sensitive(false);
        assert_eq!(f.apply(&all).len(), 3);
    }

    #[test]
    fn test_tag_query() {
        let all = fixtures();
        let f = QueryFilter::new().with_tag_query("team=");
        assert_eq!(f.apply(&all).len(), 2);
        let f = QueryFilter::new().with_tag_query("dev");
        assert_eq!(f.apply(&all)[0].id, "NB-20230101-c3");
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let all = fixtures();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
        );
        let f = QueryFilter::new().with_date_range(range);
        let ids: Vec<_> = f.apply(&all).into_iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["NB-20230915-b2", "NB-20230101-c3"]);
    }

    #[test]
    fn test_project_filter() {
        let all = fixtures();
        assert_eq!(ProjectFilter::parse("all"), ProjectFilter::All);
        let f = QueryFilter::new().with_project(ProjectFilter::parse("nlp"));
        assert_eq!(f.apply(&all).len(), 2);
        assert_eq!(QueryFilter::new().apply(&all).len(), all.len());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut f = QueryFilter::new()
            .with_search("x")
            .with_tag_query("y")
            .with_project(ProjectFilter::Only("p".into()))
            .with_date_range(DateRange::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ));
        assert!(!f.is_empty());
        f.reset();
        assert!(f.is_empty());
        assert_eq!(f, QueryFilter::default());
        assert_eq!(f.label(), "ALL");
    }
}
