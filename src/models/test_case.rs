use serde::{Deserialize, Serialize};

use crate::agents::registry::TesterRole;

/// Scheduling priority on a 1..=5 scale, 5 being the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(1);
    pub const MAX: Priority = Priority(5);

    /// Strict constructor; out-of-range values are rejected.
    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value))
    }

    /// Saturating constructor used where arithmetic may leave the range.
    pub fn clamped(value: i32) -> Self {
        Self(value.clamp(1, 5) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("priority {} outside 1..=5", value))
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What must exist in the project before a test case can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prerequisite {
    #[default]
    None,
    /// At least one usable (non-revoked) credential.
    Credential,
    /// At least one in-scope target; the case interacts with targets directly.
    InScopeTarget,
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default = "default_automatable")]
    pub automatable: bool,
    pub role: TesterRole,
    pub base_priority: Priority,
    #[serde(default)]
    pub prerequisite: Prerequisite,
}

fn default_automatable() -> bool {
    true
}

impl TestCase {
    pub fn is_target_facing(&self) -> bool {
        self.prerequisite == Prerequisite::InScopeTarget
    }

    pub fn requires_credential(&self) -> bool {
        self.prerequisite == Prerequisite::Credential
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_bounds() {
        assert!(Priority::new(0).is_none());
        assert!(Priority::new(6).is_none());
        assert_eq!(Priority::new(5), Some(Priority::MAX));
        assert_eq!(Priority::clamped(9), Priority::MAX);
        assert_eq!(Priority::clamped(-2), Priority::MIN);
    }

    #[test]
    fn test_test_case_yaml_defaults() {
        let yaml = r#"
id: WSTG-ERRH-01
title: Testing for Improper Error Handling
category: Error Handling
role: recon-agent
base_priority: 4
"#;
        let tc: TestCase = serde_yaml::from_str(yaml).unwrap();
        assert!(tc.automatable);
        assert_eq!(tc.prerequisite, Prerequisite::None);
        assert_eq!(tc.base_priority.get(), 4);
        assert_eq!(tc.role, TesterRole::Recon);
    }

    #[test]
    fn test_priority_rejects_out_of_range_yaml() {
        assert!(serde_yaml::from_str::<Priority>("7").is_err());
        assert_eq!(serde_yaml::from_str::<Priority>("2").unwrap().get(), 2);
    }
}
