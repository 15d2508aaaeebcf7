//! Where the console's records come from
//!
//! The lifecycle manager does not own fixture data; it is seeded from an
//! [`InstanceSource`] handed to it at load time.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Dataset, Instance, Project};

/// A full listing as returned by a source
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fixtures {
    pub instances: Vec<Instance>,
    pub projects: Vec<Project>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },
    #[error("{kind} '{id}' references unknown project '{project}'")]
    UnknownProject {
        kind: &'static str,
        id: String,
        project: String,
    },
}

impl Fixtures {
    /// Ids must be unique per kind and project references must resolve.
    pub fn check(&self) -> Result<(), SourceError> {
        unique("instance", self.instances.iter().map(|i| i.id.as_str()))?;
        unique("project", self.projects.iter().map(|p| p.id.as_str()))?;
        unique("dataset", self.datasets.iter().map(|d| d.id.as_str()))?;

        let known: BTreeSet<&str> = self.projects.iter().map(|p| p.id.as_str()).collect();
        // Without a project listing there is nothing to resolve against.
        if known.is_empty() {
            return Ok(());
        }
        for inst in &self.instances {
            if let Some(project) = &inst.project {
                if !known.contains(project.as_str()) {
                    return Err(SourceError::UnknownProject {
                        kind: "instance",
                        id: inst.id.clone(),
                        project: project.clone(),
                    });
                }
            }
        }
        for ds in &self.datasets {
            if !known.contains(ds.project.as_str()) {
                return Err(SourceError::UnknownProject {
                    kind: "dataset",
                    id: ds.id.clone(),
                    project: ds.project.clone(),
                });
            }
        }
        Ok(())
    }
}

fn unique<'a>(kind: &'static str, ids: impl Iterator<Item = &'a str>) -> Result<(), SourceError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(SourceError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

#[async_trait]
pub trait InstanceSource: Send + Sync {
    async fn fetch(&self) -> Result<Fixtures, SourceError>;

    fn name(&self) -> &'static str;
}

/// Serves a fixed listing; used for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct StaticSource {
    fixtures: Fixtures,
}

impl StaticSource {
    pub fn new(fixtures: Fixtures) -> Self {
        Self { fixtures }
    }

    pub fn instances(instances: Vec<Instance>) -> Self {
        Self::new(Fixtures {
            instances,
            ..Default::default()
        })
    }
}

#[async_trait]
impl InstanceSource for StaticSource {
    async fn fetch(&self) -> Result<Fixtures, SourceError> {
        Ok(self.fixtures.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
