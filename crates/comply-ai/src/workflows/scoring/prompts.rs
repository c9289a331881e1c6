//! Family-specific analysis guidance injected into model prompts.
//!
//! Each control family gets a specialist system message and numbered analysis
//! instructions; controls whose two-letter prefix has no entry fall back to
//! the generic guidance.

/// Prompt guidance for one control family.
#[derive(Debug, Clone, Copy)]
pub struct FamilyGuidance {
    pub family: &'static str,
    pub system_message: &'static str,
    pub analysis_instructions: &'static str,
    pub evidence_keywords: &'static [&'static str],
}

const ACCESS_CONTROL: FamilyGuidance = FamilyGuidance {
    family: "AC",
    system_message: "You are an expert in access control, identity management, and authorization systems. \
Focus on authentication mechanisms, authorization policies, RBAC/ABAC, least privilege, separation of duties, and access logging.",
    analysis_instructions: "1. Identify authentication methods (SSO, MFA, password policies).\n\
2. Look for authorization logic: RBAC, ABAC, ACLs, permission systems.\n\
3. Check session management: timeouts, token handling, logout.\n\
4. Verify least-privilege and separation-of-duties practices.\n\
5. Look for access logging and periodic account reviews.",
    evidence_keywords: &[
        "authentication",
        "authorization",
        "RBAC",
        "SSO",
        "MFA",
        "access control",
        "permissions",
        "roles",
        "IAM",
        "session",
        "least privilege",
    ],
};

const AUDIT_ACCOUNTABILITY: FamilyGuidance = FamilyGuidance {
    family: "AU",
    system_message: "You are an expert in audit logging, accountability, and security event monitoring. \
Focus on event logging, log retention, audit trails, SIEM integration, log protection, and forensic capability.",
    analysis_instructions: "1. Identify which events are logged (auth, access, changes, errors).\n\
2. Check retention policies and durations.\n\
3. Verify audit-trail completeness and tamper protection.\n\
4. Look for SIEM or log-aggregation tooling and alerting.\n\
5. Check for periodic log review procedures.",
    evidence_keywords: &[
        "logging",
        "audit",
        "SIEM",
        "log retention",
        "audit trail",
        "event log",
        "syslog",
        "log monitoring",
        "forensics",
    ],
};

const AWARENESS_TRAINING: FamilyGuidance = FamilyGuidance {
    family: "AT",
    system_message: "You are an expert in security awareness and role-based training programs. \
Focus on training curricula, completion tracking, phishing simulations, and role-specific modules.",
    analysis_instructions: "1. Look for a formal security awareness program and schedule.\n\
2. Check completion tracking and coverage rates.\n\
3. Identify role-specific training for privileged users.\n\
4. Look for phishing simulation or exercise records.",
    evidence_keywords: &[
        "training",
        "awareness",
        "phishing",
        "curriculum",
        "completion",
        "onboarding",
    ],
};

const CONFIGURATION_MANAGEMENT: FamilyGuidance = FamilyGuidance {
    family: "CM",
    system_message: "You are an expert in configuration management and change control. \
Focus on baseline configurations, infrastructure as code, change approval workflows, and drift detection.",
    analysis_instructions: "1. Look for documented baseline configurations.\n\
2. Identify infrastructure-as-code usage (Terraform, CloudFormation, Ansible).\n\
3. Check change-control workflows and approvals.\n\
4. Verify configuration drift detection or compliance scanning.",
    evidence_keywords: &[
        "configuration",
        "baseline",
        "Terraform",
        "infrastructure as code",
        "change control",
        "version control",
        "drift",
    ],
};

const IDENTIFICATION_AUTHENTICATION: FamilyGuidance = FamilyGuidance {
    family: "IA",
    system_message: "You are an expert in identification and authentication systems. \
Focus on identity providers, credential management, MFA enforcement, and authenticator lifecycle.",
    analysis_instructions: "1. Identify the authentication provider (SSO, IdP, directory).\n\
2. Check password policy and MFA enforcement.\n\
3. Look for credential rotation and lockout handling.\n\
4. Verify device and service identity management.",
    evidence_keywords: &[
        "identity",
        "authentication",
        "MFA",
        "SSO",
        "password policy",
        "credential",
        "IdP",
        "SAML",
        "OAuth",
    ],
};

const INCIDENT_RESPONSE: FamilyGuidance = FamilyGuidance {
    family: "IR",
    system_message: "You are an expert in incident response and security operations. \
Focus on response plans, escalation procedures, playbooks, alerting integration, and post-incident review.",
    analysis_instructions: "1. Look for a formal incident response plan with roles and escalation.\n\
2. Check alerting and on-call integration for security events.\n\
3. Identify playbooks or runbooks for common incident classes.\n\
4. Look for post-mortem or lessons-learned records.",
    evidence_keywords: &[
        "incident",
        "response plan",
        "escalation",
        "playbook",
        "on-call",
        "post-mortem",
        "alerting",
    ],
};

const RISK_ASSESSMENT: FamilyGuidance = FamilyGuidance {
    family: "RA",
    system_message: "You are an expert in risk assessment and vulnerability management. \
Focus on risk registers, assessment cadence, vulnerability scanning, and remediation tracking.",
    analysis_instructions: "1. Look for formal risk assessment reports and a risk register.\n\
2. Check vulnerability scanning cadence and tooling.\n\
3. Identify penetration testing or third-party assessments.\n\
4. Verify remediation tracking with severity-based SLAs.",
    evidence_keywords: &[
        "risk assessment",
        "risk register",
        "vulnerability",
        "scan",
        "penetration test",
        "CVSS",
        "remediation",
    ],
};

const SYSTEM_COMMUNICATIONS_PROTECTION: FamilyGuidance = FamilyGuidance {
    family: "SC",
    system_message: "You are an expert in network security and communications protection. \
Focus on encryption in transit, network segmentation, boundary protection, and denial-of-service defenses.",
    analysis_instructions: "1. Check TLS configuration and certificate management.\n\
2. Look for firewall or security-group rules and segmentation.\n\
3. Identify boundary protection (WAF, proxies, DMZ).\n\
4. Verify encryption of data in transit end to end.",
    evidence_keywords: &[
        "TLS",
        "encryption",
        "firewall",
        "security group",
        "segmentation",
        "certificate",
        "WAF",
        "VPN",
    ],
};

const SYSTEM_INFORMATION_INTEGRITY: FamilyGuidance = FamilyGuidance {
    family: "SI",
    system_message: "You are an expert in system integrity and malware protection. \
Focus on malware defenses, intrusion detection, integrity verification, input validation, and patching.",
    analysis_instructions: "1. Look for antivirus/EDR or malware scanning.\n\
2. Check intrusion detection and security alerting.\n\
3. Identify file-integrity monitoring or checksum verification.\n\
4. Verify input validation and injection protections.\n\
5. Check patch management cadence for critical updates.",
    evidence_keywords: &[
        "antivirus",
        "malware",
        "EDR",
        "intrusion detection",
        "integrity",
        "input validation",
        "patch",
        "checksum",
    ],
};

const GENERIC: FamilyGuidance = FamilyGuidance {
    family: "DEFAULT",
    system_message: "You are an expert compliance analyst with deep knowledge of security controls and compliance frameworks.",
    analysis_instructions: "1. Carefully review the control requirements.\n\
2. Look for evidence of implementation in the source documents.\n\
3. Identify what is implemented and what is missing.\n\
4. Provide specific, actionable recommendations.\n\
5. Be factual and avoid assumptions.",
    evidence_keywords: &[
        "security",
        "control",
        "policy",
        "procedure",
        "documentation",
        "implementation",
        "compliance",
    ],
};

const FAMILIES: [&FamilyGuidance; 9] = [
    &ACCESS_CONTROL,
    &AUDIT_ACCOUNTABILITY,
    &AWARENESS_TRAINING,
    &CONFIGURATION_MANAGEMENT,
    &IDENTIFICATION_AUTHENTICATION,
    &INCIDENT_RESPONSE,
    &RISK_ASSESSMENT,
    &SYSTEM_COMMUNICATIONS_PROTECTION,
    &SYSTEM_INFORMATION_INTEGRITY,
];

/// Guidance for a two-letter family code, falling back to the generic entry.
pub fn guidance_for_family(code: &str) -> &'static FamilyGuidance {
    let code = code.to_ascii_uppercase();
    FAMILIES
        .iter()
        .find(|guidance| guidance.family == code)
        .copied()
        .unwrap_or(&GENERIC)
}

/// Guidance for a control name such as "AC-2": the family is the first two
/// letters of the name.
pub fn guidance_for_control(control_name: &str) -> &'static FamilyGuidance {
    let code: String = control_name.chars().take(2).collect();
    guidance_for_family(&code)
}

/// First lines of the analysis instructions, used inside batch prompts where
/// the full block would crowd out the source text.
pub fn analysis_focus(guidance: &FamilyGuidance, lines: usize) -> String {
    guidance
        .analysis_instructions
        .lines()
        .take(lines)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_families_resolve_to_their_guidance() {
        assert_eq!(guidance_for_control("AC-2").family, "AC");
        assert_eq!(guidance_for_control("si-7").family, "SI");
    }

    #[test]
    fn unknown_families_fall_back_to_generic() {
        assert_eq!(guidance_for_control("ZZ-1").family, "DEFAULT");
        assert_eq!(guidance_for_family("PE").family, "DEFAULT");
    }

    #[test]
    fn analysis_focus_takes_leading_lines() {
        let focus = analysis_focus(guidance_for_family("AC"), 2);
        assert!(focus.starts_with("1."));
        assert!(focus.contains("2."));
        assert!(!focus.contains("3."));
    }
}
