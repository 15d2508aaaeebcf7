//! Deep links and connect targets

use urlencoding::encode;

use crate::model::{ConnectKind, Instance};

pub const DETAIL_PATH: &str = "/notebook/detail";

/// Path of the detail view for an instance.
pub fn build_notebook_detail_url(id: &str) -> String {
    format!("{}/{}", DETAIL_PATH, encode(id))
}

/// Web IDE address a running instance is reachable at.
pub fn workspace_url(base: &str, id: &str) -> String {
    format!("{}/notebook/{}/lab", base.trim_end_matches('/'), encode(id))
}

pub fn ssh_command(host: &str, id: &str, port: u16) -> String {
    format!("ssh -p {} {}@{}", port, id.to_lowercase(), host)
}

/// What the console hands to the external session launcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectTarget {
    Browser(String),
    Terminal(String),
}

impl ConnectTarget {
    /// Resolve the target for `kind`; `None` if the instance lacks the
    /// address that kind needs.
    pub fn resolve(instance: &Instance, kind: ConnectKind) -> Option<Self> {
        match kind {
            ConnectKind::Jupyter => instance.url.clone().map(Self::Browser),
            ConnectKind::VsCode => instance.url.as_ref().map(|u| {
                Self::Browser(format!(
                    "vscode://notebook.remote/open?url={}",
                    encode(u)
                ))
            }),
            ConnectKind::Ssh if instance.ssh_enabled => {
                instance.ssh_command.clone().map(Self::Terminal)
            }
            ConnectKind::Ssh => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Browser(s) | Self::Terminal(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_url() {
        assert_eq!(
            build_notebook_detail_url("NB-20240301-a1"),
            "/notebook/detail/NB-20240301-a1"
        );
        assert_eq!(build_notebook_detail_url("a b/c"), "/notebook/detail/a%20b%2Fc");
    }

    #[test]
    fn test_workspace_url_trims_base() {
        assert_eq!(
            workspace_url("https://console.local/", "NB-1"),
            "https://console.local/notebook/NB-1/lab"
        );
    }

    #[test]
    fn test_ssh_command() {
        assert_eq!(
            ssh_command("dev.console.local", "NB-1", 2222),
            "ssh -p 2222 nb-1@dev.console.local"
        );
    }

    #[test]
    fn test_connect_target_per_kind() {
        use chrono::Utc;

        use crate::model::InstanceStatus;

        let mut inst = Instance {
            id: "NB-1".into(),
            name: "one".into(),
            description: String::new(),
            status: InstanceStatus::Running,
            spec: "CPU".into(),
            image: "python".into(),
            runtime: None,
            ssh_enabled: false,
            auto_stop_hours: None,
            url: Some("https://console.local/notebook/NB-1/lab".into()),
            ssh_command: Some("ssh -p 22 nb-1@dev.console.local".into()),
            created_at: Utc::now(),
            creator: "alice".into(),
            project: None,
            tags: Vec::new(),
            storage: Vec::new(),
        };

        assert_eq!(
            ConnectTarget::resolve(&inst, ConnectKind::Jupyter),
            Some(ConnectTarget::Browser(
                "https://console.local/notebook/NB-1/lab".into()
            ))
        );
        let vscode = ConnectTarget::resolve(&inst, ConnectKind::VsCode).unwrap();
        assert!(vscode.as_str().starts_with("vscode://"));

        // SSH needs the instance to have it enabled
        assert_eq!(ConnectTarget::resolve(&inst, ConnectKind::Ssh), None);
        inst.ssh_enabled = true;
        assert_eq!(
            ConnectTarget::resolve(&inst, ConnectKind::Ssh),
            Some(ConnectTarget::Terminal("ssh -p 22 nb-1@dev.console.local".into()))
        );
    }
}
