use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::test_case::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Url,
    IpRange,
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    #[default]
    Pending,
    InScope,
    OutOfScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub value: String,
    #[serde(default)]
    pub status: TargetStatus,
}

impl Target {
    pub fn in_scope(&self) -> bool {
        self.status == TargetStatus::InScope
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// e.g. "basic", "bearer", "form"
    pub kind: String,
    /// Target value the credential applies to; `None` means any target.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub revoked: bool,
}

impl Credential {
    /// Not revoked, and bound to nothing or to one of the in-scope targets.
    pub fn usable(&self, targets: &[Target]) -> bool {
        if self.revoked {
            return false;
        }
        match self.target {
            Some(ref value) => targets.iter().any(|t| t.in_scope() && t.value == *value),
            None => true,
        }
    }
}

/// Project-level knobs consulted by the planner and the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Overrides every computed priority in this project.
    pub priority_override: Option<Priority>,
    /// Per test-case overrides, winning over `priority_override`.
    pub test_case_priorities: BTreeMap<String, Priority>,
    /// Concurrent running jobs allowed for this project.
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: ProjectSettings,
}

/// Everything the planner needs about a project, in the shape of a project file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub project: Project,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

impl ProjectFile {
    pub fn from_yaml(content: &str) -> Result<Self, crate::errors::ApexError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_file_parse() {
        let yaml = r#"
project:
  id: acme
  settings:
    priority_override: 2
    test_case_priorities:
      WSTG-INPV-05: 5
targets:
  - kind: url
    value: https://acme.test
    status: in_scope
  - kind: domain
    value: legacy.acme.test
credentials:
  - kind: form
    revoked: true
  - kind: bearer
    target: legacy.acme.test
  - kind: basic
    target: https://acme.test
"#;
        let file = ProjectFile::from_yaml(yaml).unwrap();
        assert_eq!(file.project.id, "acme");
        assert_eq!(file.project.settings.priority_override, Priority::new(2));
        assert!(file.targets[0].in_scope());
        assert_eq!(file.targets[1].status, TargetStatus::Pending);
        assert!(!file.credentials[0].usable(&file.targets));
        // Bound to a target that is not in scope.
        assert!(!file.credentials[1].usable(&file.targets));
        assert!(file.credentials[2].usable(&file.targets));
    }
}
