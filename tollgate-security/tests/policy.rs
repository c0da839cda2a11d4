use std::fs;

use tollgate_core::{ConfigError, TollgateConfig};
use tollgate_security::{
    ConfigPolicySource, DeniedBaseline, PolicyLoadError, PolicySource, SecurityPolicy,
    StaticPolicySource,
};

const POLICY: &str = r#"
tollgate:
  security:
    base_path: /api/
    permit_all:
      - /login/**
      - /health
    denied_permission: ROLE_DENIED
"#;

#[test]
fn test_policy_section() {
    let config = TollgateConfig::from_yaml_str(POLICY, "test").unwrap();
    let policy: SecurityPolicy = config.section().unwrap();
    assert_eq!(policy.base_path, "/api");
    assert_eq!(policy.permit_all, vec!["/login/**", "/health"]);
    assert_eq!(policy.denied_baseline(), DeniedBaseline::single("ROLE_DENIED"));

    let patterns: Vec<String> = policy
        .permit_patterns()
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    assert_eq!(patterns, vec!["/api/login/**", "/api/health"]);
}

#[test]
fn test_policy_defaults() {
    let config =
        TollgateConfig::from_yaml_str("tollgate: {security: {denied_permission: X}}", "test")
            .unwrap();
    let policy: SecurityPolicy = config.section().unwrap();
    assert_eq!(policy.base_path, "");
    assert!(policy.permit_all.is_empty());
}

#[test]
fn test_missing_denied_permission() {
    let config = TollgateConfig::from_yaml_str("tollgate: {security: {base_path: /x}}", "test")
        .unwrap();
    assert!(matches!(
        config.section::<SecurityPolicy>(),
        Err(ConfigError::NotFound(_))
    ));
    assert!(matches!(
        StaticPolicySource::from_config(&config),
        Err(PolicyLoadError::Config(ConfigError::NotFound(_)))
    ));
}

#[test]
fn test_config_source_reads_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("tollgate.yaml"), POLICY).unwrap();
    fs::write(
        dir.path().join("tollgate-prod.yaml"),
        "tollgate:\n  security:\n    denied_permission: ROLE_LOCKED\n",
    )
    .unwrap();

    let source = ConfigPolicySource::new(dir.path(), "prod");
    let policy = source.load().unwrap();
    assert_eq!(policy.denied_permission, "ROLE_LOCKED");
    assert_eq!(policy.permit_all.len(), 2);
}

#[test]
fn test_config_source_errors() {
    let missing = ConfigPolicySource::new("/definitely/not/here", "dev");
    assert!(matches!(missing.load(), Err(PolicyLoadError::Unreadable(_))));

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("tollgate.yaml"), "tollgate: [unclosed").unwrap();
    let broken = ConfigPolicySource::new(dir.path(), "dev");
    assert!(matches!(broken.load(), Err(PolicyLoadError::Unreadable(_))));

    let empty = tempfile::tempdir().unwrap();
    let no_policy = ConfigPolicySource::new(empty.path(), "dev");
    assert!(matches!(
        no_policy.load(),
        Err(PolicyLoadError::Config(ConfigError::NotFound(_)))
    ));
}

#[test]
fn test_static_source_rejects_blank_denied_permission() {
    let source = StaticPolicySource::new(SecurityPolicy {
        base_path: String::new(),
        permit_all: vec![],
        denied_permission: "  ".into(),
    });
    assert!(matches!(source.load(), Err(PolicyLoadError::Malformed(_))));
}
