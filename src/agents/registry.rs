use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::ApexError;
use crate::models::{Finding, FindingDraft, JobId, TestCase, VoteDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TesterRole {
    #[serde(rename = "recon-agent")]
    Recon,
    #[serde(rename = "auth-agent")]
    Auth,
    #[serde(rename = "fuzz-agent")]
    Fuzz,
    #[serde(rename = "session-agent")]
    Session,
    #[serde(rename = "validator-agent")]
    Validator,
    #[serde(rename = "exploit-agent")]
    Exploit,
}

impl TesterRole {
    pub const ALL: [TesterRole; 6] = [
        TesterRole::Recon,
        TesterRole::Auth,
        TesterRole::Fuzz,
        TesterRole::Session,
        TesterRole::Validator,
        TesterRole::Exploit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recon => "recon-agent",
            Self::Auth => "auth-agent",
            Self::Fuzz => "fuzz-agent",
            Self::Session => "session-agent",
            Self::Validator => "validator-agent",
            Self::Exploit => "exploit-agent",
        }
    }

    pub fn definition(&self) -> &'static RoleDefinition {
        ROLE_REGISTRY
            .iter()
            .find(|d| d.role == *self)
            .unwrap_or(&ROLE_REGISTRY[0])
    }
}

impl std::fmt::Display for TesterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TesterRole {
    type Err = ApexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TesterRole::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s || r.as_str().trim_end_matches("-agent") == s)
            .ok_or_else(|| ApexError::Validation(format!("unknown tester role '{}'", s)))
    }
}

/// Built-in defaults for a role; `roles` config entries override them.
pub struct RoleDefinition {
    pub role: TesterRole,
    pub default_slots: usize,
    pub default_timeout: Duration,
    pub expected_duration: Duration,
}

pub static ROLE_REGISTRY: LazyLock<Vec<RoleDefinition>> = LazyLock::new(|| vec![
    RoleDefinition {
        role: TesterRole::Recon,
        default_slots: 4,
        default_timeout: Duration::from_secs(300),
        expected_duration: Duration::from_secs(60),
    },
    RoleDefinition {
        role: TesterRole::Auth,
        default_slots: 2,
        default_timeout: Duration::from_secs(300),
        expected_duration: Duration::from_secs(120),
    },
    RoleDefinition {
        role: TesterRole::Fuzz,
        default_slots: 2,
        default_timeout: Duration::from_secs(600),
        expected_duration: Duration::from_secs(300),
    },
    RoleDefinition {
        role: TesterRole::Session,
        default_slots: 2,
        default_timeout: Duration::from_secs(300),
        expected_duration: Duration::from_secs(120),
    },
    RoleDefinition {
        role: TesterRole::Validator,
        default_slots: 2,
        default_timeout: Duration::from_secs(300),
        expected_duration: Duration::from_secs(90),
    },
    RoleDefinition {
        role: TesterRole::Exploit,
        default_slots: 1,
        default_timeout: Duration::from_secs(900),
        expected_duration: Duration::from_secs(300),
    },
]);

/// Everything a tester needs to run one attempt of a job.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub job_id: JobId,
    pub generation: u64,
    pub project_id: String,
    pub test_case: TestCase,
    pub metadata: std::collections::BTreeMap<String, Value>,
    pub timeout: Duration,
    /// Fires when cancellation is requested or the attempt is superseded.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Default)]
pub struct TesterOutput {
    pub result: Value,
    pub findings: Vec<FindingDraft>,
}

/// A worker that executes test cases and reviews other testers' findings.
#[async_trait]
pub trait Tester: Send + Sync {
    fn id(&self) -> &str;

    fn role(&self) -> TesterRole;

    fn accepts(&self, test_case: &TestCase) -> bool {
        test_case.role == self.role()
    }

    async fn execute(&self, assignment: Assignment) -> Result<TesterOutput, ApexError>;

    /// Cast a vote on another tester's finding; `None` abstains.
    async fn review(&self, _finding: &Finding) -> Result<Option<VoteDraft>, ApexError> {
        Ok(None)
    }
}

/// Registered push-mode testers.
#[derive(Default, Clone)]
pub struct TesterRegistry {
    testers: Vec<Arc<dyn Tester>>,
}

impl TesterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tester: Arc<dyn Tester>) {
        self.testers.push(tester);
    }

    pub fn is_empty(&self) -> bool {
        self.testers.is_empty()
    }

    /// Roles that have at least one registered tester.
    pub fn roles(&self) -> Vec<TesterRole> {
        let mut roles: Vec<TesterRole> = self.testers.iter().map(|t| t.role()).collect();
        roles.sort();
        roles.dedup();
        roles
    }

    /// First registered tester willing to take this test case.
    pub fn find_for(&self, test_case: &TestCase) -> Option<Arc<dyn Tester>> {
        self.testers.iter().find(|t| t.accepts(test_case)).cloned()
    }

    /// Testers other than `exclude` that can review a finding.
    pub fn reviewers(&self, exclude: Option<&str>) -> Vec<Arc<dyn Tester>> {
        self.testers
            .iter()
            .filter(|t| Some(t.id()) != exclude)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Prerequisite, Priority};

    struct Stub(&'static str, TesterRole);

    #[async_trait]
    impl Tester for Stub {
        fn id(&self) -> &str {
            self.0
        }
        fn role(&self) -> TesterRole {
            self.1
        }
        async fn execute(&self, _a: Assignment) -> Result<TesterOutput, ApexError> {
            Ok(TesterOutput::default())
        }
    }

    fn case(role: TesterRole) -> TestCase {
        TestCase {
            id: "WSTG-INFO-02".into(),
            title: "Fingerprint Web Server".into(),
            category: "Information Gathering".into(),
            automatable: true,
            role,
            base_priority: Priority::MAX,
            prerequisite: Prerequisite::None,
        }
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("fuzz-agent".parse::<TesterRole>().unwrap(), TesterRole::Fuzz);
        assert_eq!("session".parse::<TesterRole>().unwrap(), TesterRole::Session);
        assert!("painter".parse::<TesterRole>().is_err());
        assert_eq!(TesterRole::Validator.to_string(), "validator-agent");
        assert_eq!(serde_json::to_string(&TesterRole::Auth).unwrap(), "\"auth-agent\"");
    }

    #[test]
    fn test_every_role_has_definition() {
        for role in TesterRole::ALL {
            assert_eq!(role.definition().role, role);
            assert!(role.definition().default_slots > 0);
        }
    }

    #[test]
    fn test_registry_routing() {
        let mut registry = TesterRegistry::new();
        registry.register(Arc::new(Stub("recon-1", TesterRole::Recon)));
        registry.register(Arc::new(Stub("fuzz-1", TesterRole::Fuzz)));

        assert_eq!(registry.roles(), vec![TesterRole::Recon, TesterRole::Fuzz]);
        assert_eq!(registry.find_for(&case(TesterRole::Fuzz)).unwrap().id(), "fuzz-1");
        assert!(registry.find_for(&case(TesterRole::Exploit)).is_none());
        let reviewers = registry.reviewers(Some("recon-1"));
        assert_eq!(reviewers.len(), 1);
        assert_eq!(reviewers[0].id(), "fuzz-1");
    }
}
