use crate::workflows::scoring::domain::ImplementationStatus;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of evidence artifact a suggestion asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Document,
    Screenshot,
    Configuration,
    Policy,
    Log,
    Code,
    Diagram,
    AuditReport,
    TrainingRecord,
    AccessLog,
}

impl EvidenceKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Document => "Document",
            Self::Screenshot => "Screenshot",
            Self::Configuration => "Configuration",
            Self::Policy => "Policy",
            Self::Log => "Log",
            Self::Code => "Code",
            Self::Diagram => "Diagram",
            Self::AuditReport => "Audit Report",
            Self::TrainingRecord => "Training Record",
            Self::AccessLog => "Access Log",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidencePriority {
    Required,
    Recommended,
    Optional,
}

impl EvidencePriority {
    pub(crate) const fn rank(self) -> u8 {
        match self {
            Self::Required => 1,
            Self::Recommended => 2,
            Self::Optional => 3,
        }
    }
}

/// One proposed piece of evidence that would strengthen a control's posture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSuggestion {
    pub kind: EvidenceKind,
    pub description: String,
    pub priority: EvidencePriority,
    pub example: String,
    pub rationale: String,
    pub control_family: String,
}

fn suggestion(
    kind: EvidenceKind,
    priority: EvidencePriority,
    description: &str,
    example: &str,
    rationale: &str,
    family: &str,
) -> EvidenceSuggestion {
    EvidenceSuggestion {
        kind,
        description: description.to_string(),
        priority,
        example: example.to_string(),
        rationale: rationale.to_string(),
        control_family: family.to_string(),
    }
}

/// Proposes missing-evidence items from family context and identified gaps.
#[derive(Debug, Default, Clone)]
pub struct EvidenceSuggestionEngine;

impl EvidenceSuggestionEngine {
    /// Ranked suggestions for one control, deduplicated against evidence the
    /// application already holds.
    pub fn suggestions_for(
        &self,
        control_name: &str,
        status: ImplementationStatus,
        gaps: &[String],
        current_evidence: &[String],
    ) -> Vec<EvidenceSuggestion> {
        let family: String = control_name
            .chars()
            .take(2)
            .collect::<String>()
            .to_ascii_uppercase();

        let mut suggestions = base_suggestions(&family);
        suggestions.extend(gap_suggestions(gaps, &family));

        let mut filtered: Vec<EvidenceSuggestion> = suggestions
            .into_iter()
            .filter(|candidate| !covers_existing(candidate, current_evidence))
            .collect();

        if status.requires_gap_analysis() {
            filtered.sort_by_key(|candidate| candidate.priority.rank());
        } else {
            // An already-compliant control only needs strengthening evidence,
            // not the basics.
            filtered.retain(|candidate| {
                matches!(
                    candidate.priority,
                    EvidencePriority::Recommended | EvidencePriority::Optional
                )
            });
        }

        debug!(
            control = control_name,
            count = filtered.len(),
            "generated evidence suggestions"
        );
        filtered
    }
}

/// A suggestion is considered covered when at least 30% of its description's
/// significant words already appear in one existing evidence description.
fn covers_existing(candidate: &EvidenceSuggestion, current_evidence: &[String]) -> bool {
    let description = candidate.description.to_lowercase();
    let key_words: Vec<&str> = description
        .split_whitespace()
        .filter(|word| word.len() > 4)
        .collect();
    if key_words.is_empty() {
        return false;
    }

    current_evidence.iter().any(|evidence| {
        let evidence_lower = evidence.to_lowercase();
        let matches = key_words
            .iter()
            .filter(|word| evidence_lower.contains(**word))
            .count();
        matches as f64 >= key_words.len() as f64 * 0.3
    })
}

fn gap_suggestions(gaps: &[String], family: &str) -> Vec<EvidenceSuggestion> {
    let mut suggestions = Vec::new();

    for gap in gaps {
        let lower = gap.to_lowercase();
        let excerpt: String = gap.chars().take(50).collect();

        if lower.contains("document") {
            suggestions.push(suggestion(
                EvidenceKind::Document,
                EvidencePriority::Required,
                &format!("Documentation addressing: {gap}"),
                &format!("Detailed documentation covering {excerpt}"),
                "Addresses identified documentation gap",
                family,
            ));
        }
        if lower.contains("policy") || lower.contains("procedure") {
            suggestions.push(suggestion(
                EvidenceKind::Policy,
                EvidencePriority::Required,
                &format!("Policy document for: {gap}"),
                &format!("Formal policy addressing {excerpt}"),
                "Addresses identified policy gap",
                family,
            ));
        }
        if lower.contains("configuration") || lower.contains("setting") || lower.contains("implement")
        {
            suggestions.push(suggestion(
                EvidenceKind::Configuration,
                EvidencePriority::Required,
                &format!("Configuration evidence for: {gap}"),
                &format!("Configuration export showing implementation of {excerpt}"),
                "Addresses identified configuration gap",
                family,
            ));
        }
        if lower.contains("log") || lower.contains("monitor") || lower.contains("audit trail") {
            suggestions.push(suggestion(
                EvidenceKind::Log,
                EvidencePriority::Required,
                &format!("Logging evidence for: {gap}"),
                &format!("Log samples demonstrating {excerpt}"),
                "Addresses identified logging gap",
                family,
            ));
        }
        if lower.contains("training") || lower.contains("awareness") {
            suggestions.push(suggestion(
                EvidenceKind::TrainingRecord,
                EvidencePriority::Required,
                &format!("Training records for: {gap}"),
                &format!("Training completion records addressing {excerpt}"),
                "Addresses identified training gap",
                family,
            ));
        }
    }

    suggestions
}

fn base_suggestions(family: &str) -> Vec<EvidenceSuggestion> {
    match family {
        "AC" => vec![
            suggestion(
                EvidenceKind::Policy,
                EvidencePriority::Required,
                "Access control policy document defining roles, permissions, and authorization rules",
                "Access Control Policy v2.1 defining RBAC model with role definitions",
                "Demonstrates formal access control requirements and authorization framework",
                family,
            ),
            suggestion(
                EvidenceKind::Configuration,
                EvidencePriority::Required,
                "IAM role definitions and permission configurations",
                "AWS IAM roles JSON export showing least-privilege permissions",
                "Proves technical implementation of access controls",
                family,
            ),
            suggestion(
                EvidenceKind::Screenshot,
                EvidencePriority::Recommended,
                "Screenshots of user authentication flows (login, MFA)",
                "Screenshot showing MFA challenge during login",
                "Visual evidence of authentication mechanisms",
                family,
            ),
            suggestion(
                EvidenceKind::AccessLog,
                EvidencePriority::Recommended,
                "Access logs showing authentication attempts and authorization checks",
                "CloudTrail logs showing IAM authentication events",
                "Demonstrates monitoring and logging of access events",
                family,
            ),
        ],
        "AU" => vec![
            suggestion(
                EvidenceKind::Configuration,
                EvidencePriority::Required,
                "Logging configuration showing what events are captured",
                "CloudWatch Logs configuration with event filters and retention policy",
                "Proves audit logging is configured and operational",
                family,
            ),
            suggestion(
                EvidenceKind::Log,
                EvidencePriority::Required,
                "Sample audit logs demonstrating event capture",
                "Sample audit log entries showing user actions with timestamps and user IDs",
                "Demonstrates audit log content and format",
                family,
            ),
            suggestion(
                EvidenceKind::Policy,
                EvidencePriority::Required,
                "Audit and logging policy defining retention and review frequency",
                "Audit Log Policy defining 1-year retention and quarterly reviews",
                "Establishes formal audit requirements and processes",
                family,
            ),
            suggestion(
                EvidenceKind::Screenshot,
                EvidencePriority::Recommended,
                "Screenshots of monitoring dashboards showing audit event tracking",
                "Dashboard showing audit event metrics over time",
                "Visual confirmation of audit monitoring capabilities",
                family,
            ),
        ],
        "IR" => vec![
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Required,
                "Incident response plan with roles, escalation procedures, and playbooks",
                "IR Plan v3.0 with security incident classification and response workflows",
                "Demonstrates formal incident response procedures",
                family,
            ),
            suggestion(
                EvidenceKind::Configuration,
                EvidencePriority::Required,
                "Alerting and monitoring configurations for security events",
                "PagerDuty integration with security monitoring for 24/7 alerting",
                "Demonstrates technical capability to detect and respond to incidents",
                family,
            ),
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Recommended,
                "Recent incident response reports or post-mortem analyses",
                "Quarterly security incident report with lessons learned",
                "Proves the incident response plan is actively used",
                family,
            ),
            suggestion(
                EvidenceKind::TrainingRecord,
                EvidencePriority::Recommended,
                "Incident response training records for the security team",
                "IR tabletop exercise completion records for the security team",
                "Shows the team is trained on incident response procedures",
                family,
            ),
        ],
        "IA" => vec![
            suggestion(
                EvidenceKind::Configuration,
                EvidencePriority::Required,
                "Authentication provider configuration (SSO, IdP)",
                "SSO configuration with SAML integration",
                "Proves centralized authentication implementation",
                family,
            ),
            suggestion(
                EvidenceKind::Policy,
                EvidencePriority::Required,
                "Password policy and MFA requirements",
                "Password Policy requiring 12+ characters and MFA for all users",
                "Establishes authentication security requirements",
                family,
            ),
            suggestion(
                EvidenceKind::Screenshot,
                EvidencePriority::Recommended,
                "MFA enrollment process and authentication flow",
                "Screenshots showing MFA setup with an authenticator app",
                "Visual evidence of MFA implementation",
                family,
            ),
            suggestion(
                EvidenceKind::Log,
                EvidencePriority::Recommended,
                "Authentication logs showing MFA usage and failed login attempts",
                "Auth logs showing MFA challenges and lockout after failed attempts",
                "Demonstrates authentication controls are enforced",
                family,
            ),
        ],
        "RA" => vec![
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Required,
                "Risk assessment report with identified risks and mitigation strategies",
                "Annual risk assessment report with risk register",
                "Demonstrates a formal risk assessment process",
                family,
            ),
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Required,
                "Risk register with risk scores and treatment plans",
                "Risk register tracking identified risks with CVSS scores",
                "Shows ongoing risk tracking and management",
                family,
            ),
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Recommended,
                "Vulnerability scan reports from security tools",
                "Quarterly vulnerability scan results",
                "Provides technical risk identification evidence",
                family,
            ),
            suggestion(
                EvidenceKind::AuditReport,
                EvidencePriority::Recommended,
                "Third-party security audit or penetration test reports",
                "Annual penetration test report with remediation status",
                "Independent validation of security posture",
                family,
            ),
        ],
        "SC" => vec![
            suggestion(
                EvidenceKind::Configuration,
                EvidencePriority::Required,
                "TLS/SSL configuration and certificate management",
                "Load balancer configuration enforcing TLS 1.2+ with certificate rotation",
                "Proves encryption-in-transit implementation",
                family,
            ),
            suggestion(
                EvidenceKind::Configuration,
                EvidencePriority::Required,
                "Firewall and network security group rules",
                "Security group rules restricting ingress to port 443 only",
                "Demonstrates network boundary protection",
                family,
            ),
            suggestion(
                EvidenceKind::Diagram,
                EvidencePriority::Recommended,
                "Network architecture diagram showing security zones",
                "Network diagram with DMZ, private subnets, and security appliances",
                "Visual representation of network security architecture",
                family,
            ),
            suggestion(
                EvidenceKind::Screenshot,
                EvidencePriority::Recommended,
                "DDoS protection and rate limiting configurations",
                "Rate limiting rules protecting API endpoints",
                "Shows protection against network-based attacks",
                family,
            ),
        ],
        "SI" => vec![
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Required,
                "Patch management policy and procedures",
                "Patch Management Policy requiring critical patches within 7 days",
                "Establishes system integrity maintenance requirements",
                family,
            ),
            suggestion(
                EvidenceKind::Log,
                EvidencePriority::Required,
                "Patch deployment logs or system update records",
                "Patch compliance reports from the fleet manager",
                "Proves patches are regularly applied",
                family,
            ),
            suggestion(
                EvidenceKind::Configuration,
                EvidencePriority::Required,
                "Malware detection and prevention tool configurations",
                "Endpoint protection configuration with real-time scanning enabled",
                "Demonstrates malware protection implementation",
                family,
            ),
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Recommended,
                "Vulnerability management process documentation",
                "Vulnerability management procedure with remediation SLAs",
                "Shows a systematic approach to vulnerability handling",
                family,
            ),
        ],
        "CM" => vec![
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Required,
                "Configuration management plan and baseline documentation",
                "CM plan defining baseline configurations for all system components",
                "Establishes a formal configuration management process",
                family,
            ),
            suggestion(
                EvidenceKind::Code,
                EvidencePriority::Required,
                "Infrastructure-as-code templates (Terraform, CloudFormation)",
                "Terraform modules defining standardized infrastructure configurations",
                "Demonstrates automated, version-controlled configuration management",
                family,
            ),
            suggestion(
                EvidenceKind::Screenshot,
                EvidencePriority::Recommended,
                "Configuration management tool dashboard",
                "Dashboard showing configuration compliance across the fleet",
                "Visual evidence of configuration automation",
                family,
            ),
            suggestion(
                EvidenceKind::Log,
                EvidencePriority::Recommended,
                "Change logs showing configuration changes and approvals",
                "Commit history with change approval comments",
                "Demonstrates a controlled configuration change process",
                family,
            ),
        ],
        "AT" => vec![
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Required,
                "Security awareness training program documentation",
                "Annual security training program with curriculum and schedule",
                "Establishes formal training requirements",
                family,
            ),
            suggestion(
                EvidenceKind::TrainingRecord,
                EvidencePriority::Required,
                "Training completion records for employees",
                "Security awareness training completion report showing 95% completion",
                "Proves training is delivered and tracked",
                family,
            ),
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Recommended,
                "Security awareness training materials (slides, videos)",
                "Phishing awareness training presentation deck",
                "Shows training content and quality",
                family,
            ),
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Recommended,
                "Role-specific security training for privileged users",
                "Admin security training module for privileged access users",
                "Demonstrates tailored training for high-risk roles",
                family,
            ),
        ],
        _ => vec![
            suggestion(
                EvidenceKind::Policy,
                EvidencePriority::Required,
                "Policy document relevant to this control",
                "Formal policy addressing control requirements",
                "Establishes formal requirements and procedures",
                family,
            ),
            suggestion(
                EvidenceKind::Configuration,
                EvidencePriority::Required,
                "Technical configuration showing control implementation",
                "Configuration export or screenshots",
                "Demonstrates technical implementation",
                family,
            ),
            suggestion(
                EvidenceKind::Document,
                EvidencePriority::Recommended,
                "Supporting documentation or procedures",
                "Procedure document or runbook",
                "Provides operational context",
                family,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_controls_get_required_items_first() {
        let suggestions = EvidenceSuggestionEngine.suggestions_for(
            "AC-2",
            ImplementationStatus::NotImplemented,
            &[],
            &[],
        );

        assert!(!suggestions.is_empty());
        let ranks: Vec<u8> = suggestions
            .iter()
            .map(|suggestion| suggestion.priority.rank())
            .collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        assert_eq!(ranks, sorted, "required items must lead the list");
    }

    #[test]
    fn implemented_controls_only_get_strengthening_items() {
        let suggestions = EvidenceSuggestionEngine.suggestions_for(
            "AC-2",
            ImplementationStatus::Implemented,
            &[],
            &[],
        );

        assert!(suggestions
            .iter()
            .all(|suggestion| suggestion.priority != EvidencePriority::Required));
    }

    #[test]
    fn gap_keywords_append_targeted_suggestions() {
        let gaps = vec!["No training records exist for the operations team".to_string()];
        let suggestions = EvidenceSuggestionEngine.suggestions_for(
            "ZZ-1",
            ImplementationStatus::PartiallyImplemented,
            &gaps,
            &[],
        );

        assert!(suggestions
            .iter()
            .any(|suggestion| suggestion.kind == EvidenceKind::TrainingRecord));
    }

    #[test]
    fn unknown_family_falls_back_to_generic_set() {
        let suggestions = EvidenceSuggestionEngine.suggestions_for(
            "XY-9",
            ImplementationStatus::NotImplemented,
            &[],
            &[],
        );
        assert_eq!(suggestions.len(), 3);
        assert!(suggestions
            .iter()
            .all(|suggestion| suggestion.control_family == "XY"));
    }

    #[test]
    fn duplicate_suppression_drops_covered_suggestions() {
        let existing = vec![
            "Access control policy document defining roles, permissions, and authorization rules for staff"
                .to_string(),
        ];
        let suggestions = EvidenceSuggestionEngine.suggestions_for(
            "AC-2",
            ImplementationStatus::NotImplemented,
            &[],
            &existing,
        );

        assert!(suggestions
            .iter()
            .all(|suggestion| !suggestion.description.starts_with("Access control policy")));
    }
}
