use serial_test::serial;
use tollgate_core::config::{ConfigError, ConfigSection, ConfigValue, TollgateConfig};

#[test]
fn test_empty_config() {
    let config = TollgateConfig::empty();
    assert!(matches!(
        config.get::<String>("nonexistent"),
        Err(ConfigError::NotFound(_))
    ));
}

#[test]
fn test_set_and_get() {
    let mut config = TollgateConfig::empty();
    config.set("tollgate.security.base_path", ConfigValue::String("/api".into()));
    assert_eq!(
        config.get::<String>("tollgate.security.base_path").unwrap(),
        "/api"
    );
}

#[test]
fn test_get_or_default() {
    let config = TollgateConfig::empty();
    assert_eq!(config.get_or("missing", 42i64), 42);
}

#[test]
fn test_get_opt_distinguishes_missing_from_malformed() {
    let mut config = TollgateConfig::empty();
    config.set("a", ConfigValue::String("not-a-number".into()));
    config.set("b", ConfigValue::Null);

    assert!(config.get_opt::<u64>("missing").unwrap().is_none());
    assert!(config.get_opt::<u64>("b").unwrap().is_none());
    assert!(matches!(
        config.get_opt::<u64>("a"),
        Err(ConfigError::TypeMismatch { .. })
    ));
}

#[test]
fn test_type_conversions() {
    let mut config = TollgateConfig::empty();
    config.set("int_val", ConfigValue::Integer(42));
    config.set("float_val", ConfigValue::Float(2.5));
    config.set("bool_val", ConfigValue::String("yes".into()));
    config.set("neg_val", ConfigValue::Integer(-1));

    assert_eq!(config.get::<i64>("int_val").unwrap(), 42);
    assert_eq!(config.get::<f64>("float_val").unwrap(), 2.5);
    assert!(config.get::<bool>("bool_val").unwrap());
    assert_eq!(config.get::<String>("int_val").unwrap(), "42");
    assert!(config.get::<usize>("neg_val").is_err());
}

#[test]
fn test_flatten_yaml() {
    let yaml = r#"
tollgate:
  security:
    base_path: "/api"
    denied_permission: "DENIED"
  cache:
    url_matcher:
      max_size: 512
"#;
    let config = TollgateConfig::from_yaml_str(yaml, "test").unwrap();

    assert_eq!(config.get::<String>("tollgate.security.base_path").unwrap(), "/api");
    assert_eq!(
        config.get::<usize>("tollgate.cache.url_matcher.max_size").unwrap(),
        512
    );
    assert_eq!(config.profile(), "test");
}

#[test]
fn test_list_config() {
    let yaml = r#"
tollgate:
  security:
    permit_all:
      - "/login/**"
      - "/public/*"
"#;
    let config = TollgateConfig::from_yaml_str(yaml, "test").unwrap();
    let paths: Vec<String> = config.get("tollgate.security.permit_all").unwrap();
    assert_eq!(paths, vec!["/login/**", "/public/*"]);
}

#[test]
fn test_list_from_comma_separated_string() {
    let mut config = TollgateConfig::empty();
    config.set("paths", ConfigValue::String("/a/**, /b ,".into()));
    let paths: Vec<String> = config.get("paths").unwrap();
    assert_eq!(paths, vec!["/a/**", "/b"]);
}

#[test]
fn test_malformed_yaml_is_load_error() {
    let result = TollgateConfig::from_yaml_str("tollgate: [unclosed", "test");
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

struct DemoSection {
    size: usize,
}

impl ConfigSection for DemoSection {
    fn prefix() -> &'static str {
        "demo"
    }

    fn from_config(config: &TollgateConfig) -> Result<Self, ConfigError> {
        Ok(DemoSection {
            size: config.get(&Self::key("size"))?,
        })
    }
}

#[test]
fn test_typed_section() {
    let config = TollgateConfig::from_yaml_str("demo:\n  size: 7\n", "test").unwrap();
    let section: DemoSection = config.section().unwrap();
    assert_eq!(section.size, 7);
    assert_eq!(DemoSection::key("size"), "demo.size");
}

#[test]
#[serial]
fn test_load_from_dir_with_profile_and_env_overlay() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("tollgate.yaml"),
        "tollgate:\n  security:\n    base_path: \"/base\"\n    denied_permission: \"NONE\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("tollgate-prod.yaml"),
        "tollgate:\n  security:\n    denied_permission: \"DENY_ALL\"\n",
    )
    .unwrap();

    std::env::set_var("TOLLGATE_SECURITY_BASE_PATH", "/override");
    let config = TollgateConfig::load_from_dir(dir.path(), "prod");
    std::env::remove_var("TOLLGATE_SECURITY_BASE_PATH");
    let config = config.unwrap();

    assert_eq!(config.profile(), "prod");
    assert_eq!(
        config.get::<String>("tollgate.security.base_path").unwrap(),
        "/override"
    );
    assert_eq!(
        config.get::<String>("tollgate.security.denied_permission").unwrap(),
        "DENY_ALL"
    );
}

#[test]
#[serial]
fn test_load_from_dir_reports_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tollgate.yaml"), "tollgate: [").unwrap();
    let result = TollgateConfig::load_from_dir(dir.path(), "dev");
    assert!(matches!(result, Err(ConfigError::Load(_))));
}
