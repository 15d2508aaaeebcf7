//! Built-in demo listing, used when no config file is found

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use notebook_core::backend::EndpointConfig;
use notebook_core::link;
use notebook_core::model::{
    Dataset, Instance, InstanceStatus, Project, StorageKind, StorageMount, Tag,
};
use notebook_core::source::{Fixtures, InstanceSource, SourceError};

const GPU_V100: &str = "GPU: 1*V100(32GB) | CPU: 8 vCPUs 64GB";
const CPU_SMALL: &str = "CPU: 2 vCPUs 8GB";

fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
    pairs.iter().map(|(k, v)| Tag::new(*k, *v)).collect()
}

pub struct DemoSource {
    endpoints: EndpointConfig,
}

impl DemoSource {
    pub fn new(endpoints: EndpointConfig) -> Self {
        Self { endpoints }
    }

    pub fn fixtures(&self) -> Fixtures {
        let projects = vec![
            Project {
                id: "vision".into(),
                name: "Vision".into(),
                description: "Image classification and detection".into(),
                owner: "alice".into(),
                created_at: day(2023, 11, 2),
                tags: tags(&[("team", "cv")]),
            },
            Project {
                id: "nlp".into(),
                name: "Language".into(),
                description: "Text models".into(),
                owner: "bob".into(),
                created_at: day(2024, 1, 15),
                tags: tags(&[("team", "nlp")]),
            },
        ];

        let datasets = vec![
            Dataset {
                id: "ds-imagenet".into(),
                name: "imagenet-1k".into(),
                project: "vision".into(),
                size_bytes: 146_900_000_000,
                records: 1_281_167,
                created_at: day(2023, 11, 3),
                tags: tags(&[("license", "research")]),
            },
            Dataset {
                id: "ds-coco".into(),
                name: "coco-2017".into(),
                project: "vision".into(),
                size_bytes: 25_000_000_000,
                records: 118_287,
                created_at: day(2024, 2, 10),
                tags: Vec::new(),
            },
            Dataset {
                id: "ds-wiki".into(),
                name: "wikitext-103".into(),
                project: "nlp".into(),
                size_bytes: 540_000_000,
                records: 28_475,
                created_at: day(2024, 1, 20),
                tags: tags(&[("lang", "en")]),
            },
        ];

        let base = &self.endpoints.base_url;
        let running = |id: &str, secs: u64| {
            (
                Some(link::workspace_url(base, id)),
                Some(Duration::from_secs(secs)),
            )
        };

        let (url, runtime) = running("NB-20240312-resnet", 3 * 3600 + 20 * 60);
        let resnet = Instance {
            id: "NB-20240312-resnet".into(),
            name: "resnet-train".into(),
            description: "ResNet-50 baseline on imagenet".into(),
            status: InstanceStatus::Running,
            spec: GPU_V100.into(),
            image: "pytorch-2.1-cuda12".into(),
            runtime,
            ssh_enabled: true,
            auto_stop_hours: Some(8),
            url,
            ssh_command: Some(link::ssh_command(
                &self.endpoints.ssh_host,
                "NB-20240312-resnet",
                self.endpoints.ssh_port,
            )),
            created_at: day(2024, 3, 12),
            creator: "alice".into(),
            project: Some("vision".into()),
            tags: tags(&[("team", "cv"), ("env", "dev")]),
            storage: vec![
                StorageMount {
                    name: "workspace".into(),
                    kind: StorageKind::Evs,
                    mount_path: "/home/ma-user/work".into(),
                    capacity_gb: Some(100),
                },
                StorageMount {
                    name: "imagenet".into(),
                    kind: StorageKind::Obs,
                    mount_path: "/data/imagenet".into(),
                    capacity_gb: None,
                },
            ],
        };

        let bert = Instance {
            id: "NB-20240128-bert".into(),
            name: "bert-finetune".into(),
            description: String::new(),
            status: InstanceStatus::Stopped,
            spec: GPU_V100.into(),
            image: "pytorch-2.1-cuda12".into(),
            runtime: None,
            ssh_enabled: false,
            auto_stop_hours: Some(4),
            url: None,
            ssh_command: None,
            created_at: day(2024, 1, 28),
            creator: "bob".into(),
            project: Some("nlp".into()),
            tags: tags(&[("team", "nlp")]),
            storage: vec![StorageMount {
                name: "workspace".into(),
                kind: StorageKind::Evs,
                mount_path: "/home/ma-user/work".into(),
                capacity_gb: Some(50),
            }],
        };

        let sandbox = Instance {
            id: "NB-20231120-sandbox".into(),
            name: "sandbox".into(),
            description: "Scratch environment".into(),
            status: InstanceStatus::Failed,
            spec: CPU_SMALL.into(),
            image: "python-3.11".into(),
            runtime: None,
            ssh_enabled: true,
            auto_stop_hours: None,
            url: None,
            ssh_command: None,
            created_at: day(2023, 11, 20),
            creator: "alice".into(),
            project: None,
            tags: Vec::new(),
            storage: vec![StorageMount {
                name: "scratch".into(),
                kind: StorageKind::Local,
                mount_path: "/tmp/work".into(),
                capacity_gb: Some(20),
            }],
        };

        Fixtures {
            instances: vec![resnet, bert, sandbox],
            projects,
            datasets,
        }
    }
}

#[async_trait]
impl InstanceSource for DemoSource {
    async fn fetch(&self) -> Result<Fixtures, SourceError> {
        Ok(self.fixtures())
    }

    fn name(&self) -> &'static str {
        "demo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notebook_core::filter::QueryFilter;

    #[test]
    fn test_demo_fixtures_are_consistent() {
        let fixtures = DemoSource::new(EndpointConfig::default()).fixtures();
        fixtures.check().unwrap();
        assert_eq!(fixtures.instances.len(), 3);

        let running = &fixtures.instances[0];
        assert_eq!(running.status, InstanceStatus::Running);
        assert!(running.url.is_some());
        assert!(running.runtime.is_some());
    }

    #[test]
    fn test_demo_search_on_id_prefix() {
        let fixtures = DemoSource::new(EndpointConfig::default()).fixtures();
        let filter = QueryFilter::new().with_search("NB-2024");
        let ids: Vec<_> = filter
            .apply(&fixtures.instances)
            .into_iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["NB-20240312-resnet", "NB-20240128-bert"]);
    }
}
