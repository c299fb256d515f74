use crate::agents::registry::TesterRole;
use crate::models::{Prerequisite, Priority, TestCase};

struct Entry {
    id: &'static str,
    title: &'static str,
    category: &'static str,
    role: TesterRole,
    priority: u8,
    prerequisite: Prerequisite,
}

const fn entry(
    id: &'static str,
    title: &'static str,
    category: &'static str,
    role: TesterRole,
    priority: u8,
    prerequisite: Prerequisite,
) -> Entry {
    Entry { id, title, category, role, priority, prerequisite }
}

use Prerequisite::{Credential as Cred, InScopeTarget as Tgt, None as Free};
use TesterRole::{Auth, Fuzz, Recon, Session};

const INFO: &str = "Information Gathering";
const CONF: &str = "Configuration";
const IDNT: &str = "Identity";
const ATHN: &str = "Authentication";
const SESS: &str = "Session";
const INPV: &str = "Input Validation";

static WSTG: &[Entry] = &[
    entry("WSTG-INFO-01", "Conduct Search Engine Discovery", INFO, Recon, 5, Free),
    entry("WSTG-INFO-02", "Fingerprint Web Server", INFO, Recon, 5, Free),
    entry("WSTG-INFO-03", "Review Webserver Metafiles", INFO, Recon, 4, Free),
    entry("WSTG-INFO-04", "Enumerate Applications on Webserver", INFO, Recon, 4, Free),
    entry("WSTG-INFO-05", "Review Webpage Content for Information Leakage", INFO, Recon, 3, Free),
    entry("WSTG-INFO-06", "Identify Application Entry Points", INFO, Recon, 5, Free),
    entry("WSTG-INFO-07", "Map Execution Paths Through Application", INFO, Recon, 4, Free),
    entry("WSTG-INFO-08", "Fingerprint Web Application Framework", INFO, Recon, 5, Free),
    entry("WSTG-INFO-09", "Fingerprint Web Application", INFO, Recon, 5, Free),
    entry("WSTG-INFO-10", "Map Application Architecture", INFO, Recon, 4, Free),
    entry("WSTG-CONF-01", "Test Network Infrastructure Configuration", CONF, Recon, 4, Free),
    entry("WSTG-CONF-02", "Test Application Platform Configuration", CONF, Recon, 4, Free),
    entry("WSTG-CONF-03", "Test File Extensions Handling", CONF, Fuzz, 3, Tgt),
    entry("WSTG-CONF-04", "Review Old Backup and Unreferenced Files", CONF, Recon, 3, Free),
    entry("WSTG-IDNT-01", "Test Role Definitions", IDNT, Auth, 4, Cred),
    entry("WSTG-IDNT-02", "Test User Registration Process", IDNT, Auth, 4, Free),
    entry("WSTG-IDNT-03", "Test Account Provisioning Process", IDNT, Auth, 3, Cred),
    entry("WSTG-IDNT-04", "Testing for Account Enumeration", IDNT, Auth, 4, Free),
    entry("WSTG-IDNT-05", "Testing for Weak Username Policy", IDNT, Auth, 3, Free),
    entry("WSTG-ATHN-01", "Testing for Credentials Transported over Encrypted Channel", ATHN, Auth, 5, Cred),
    entry("WSTG-ATHN-02", "Testing for Default Credentials", ATHN, Auth, 5, Tgt),
    entry("WSTG-ATHN-03", "Testing for Weak Lock Out Mechanism", ATHN, Auth, 5, Cred),
    entry("WSTG-ATHN-04", "Testing for Bypassing Authentication Schema", ATHN, Auth, 5, Cred),
    entry("WSTG-ATHN-05", "Testing for Vulnerable Remember Password", ATHN, Auth, 4, Cred),
    entry("WSTG-ATHN-06", "Testing for Browser Cache Weaknesses", ATHN, Session, 3, Cred),
    entry("WSTG-ATHN-07", "Testing for Weak Password Policy", ATHN, Auth, 5, Cred),
    entry("WSTG-ATHN-08", "Testing for Weak Security Question Answer", ATHN, Auth, 4, Cred),
    entry("WSTG-SESS-01", "Testing for Session Management Schema", SESS, Session, 5, Cred),
    entry("WSTG-SESS-02", "Testing for Cookies Attributes", SESS, Session, 5, Cred),
    entry("WSTG-SESS-03", "Testing for Session Fixation", SESS, Session, 5, Cred),
    entry("WSTG-SESS-04", "Testing for Exposed Session Variables", SESS, Session, 4, Cred),
    entry("WSTG-SESS-05", "Testing for CSRF", SESS, Session, 5, Cred),
    entry("WSTG-SESS-06", "Testing for Logout Functionality", SESS, Session, 4, Cred),
    entry("WSTG-SESS-07", "Testing Session Timeout", SESS, Session, 4, Cred),
    entry("WSTG-INPV-01", "Testing for Reflected Cross Site Scripting", INPV, Fuzz, 5, Tgt),
    entry("WSTG-INPV-02", "Testing for Stored Cross Site Scripting", INPV, Fuzz, 5, Tgt),
    entry("WSTG-INPV-03", "Testing for HTTP Verb Tampering", INPV, Fuzz, 4, Tgt),
    entry("WSTG-INPV-04", "Testing for HTTP Parameter Pollution", INPV, Fuzz, 4, Tgt),
    entry("WSTG-INPV-05", "Testing for SQL Injection", INPV, Fuzz, 5, Tgt),
    entry("WSTG-INPV-06", "Testing for LDAP Injection", INPV, Fuzz, 4, Tgt),
    entry("WSTG-INPV-07", "Testing for XML Injection", INPV, Fuzz, 4, Tgt),
    entry("WSTG-INPV-08", "Testing for SSI Injection", INPV, Fuzz, 3, Tgt),
    entry("WSTG-INPV-09", "Testing for XPath Injection", INPV, Fuzz, 3, Tgt),
    entry("WSTG-INPV-10", "Testing for IMAP SMTP Injection", INPV, Fuzz, 3, Tgt),
    entry("WSTG-INPV-11", "Testing for Code Injection", INPV, Fuzz, 5, Tgt),
    entry("WSTG-INPV-12", "Testing for Command Injection", INPV, Fuzz, 5, Tgt),
    entry("WSTG-INPV-13", "Testing for Format String Injection", INPV, Fuzz, 3, Tgt),
];

/// The OWASP WSTG test cases shipped with the binary, in catalog order.
pub fn wstg_test_cases() -> Vec<TestCase> {
    WSTG.iter()
        .map(|e| TestCase {
            id: e.id.to_string(),
            title: e.title.to_string(),
            category: e.category.to_string(),
            automatable: true,
            role: e.role,
            base_priority: Priority::clamped(e.priority as i32),
            prerequisite: e.prerequisite,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_unique() {
        let cases = wstg_test_cases();
        let ids: HashSet<_> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), cases.len());
        assert_eq!(cases.len(), 47);
    }

    #[test]
    fn test_session_cases_need_credentials() {
        for case in wstg_test_cases().iter().filter(|c| c.id.starts_with("WSTG-SESS")) {
            assert!(case.requires_credential(), "{} should require a credential", case.id);
            assert_eq!(case.role, TesterRole::Session);
        }
    }
}
