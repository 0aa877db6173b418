//! Coverage for config parsing, overrides and persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pdh::config::{ConfigError, PdhConfig};
use pdh::output::RenderTarget;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn parse_full_toml() {
    let toml_str = r#"
apikey = "y_NbAkKc66ryYTWUXYEu"
uid = "PXCT22H"
email = "oncall@example.com"
api_url = "https://api.eu.pagerduty.com"

[rules]
path = "/etc/pdh/rules"
timeout_secs = 30

[output]
format = "yaml"
odd_color = "white on black"
even_color = "grey70 on black"

[http]
max_attempts = 5
"#;
    let config = PdhConfig::from_toml(toml_str).expect("should parse");
    assert_eq!(config.uid, "PXCT22H");
    assert_eq!(config.api_url, "https://api.eu.pagerduty.com");
    assert_eq!(config.rules_dir(), PathBuf::from("/etc/pdh/rules"));
    assert_eq!(config.rule_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.output.format, RenderTarget::Yaml);
    assert_eq!(config.output.even_color, "grey70 on black");
    assert_eq!(config.http.max_attempts, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn partial_toml_keeps_defaults() {
    let config = PdhConfig::from_toml("uid = \"U1\"\n[rules]\ntimeout_secs = 0\n").expect("should parse");
    assert_eq!(config.uid, "U1");
    assert_eq!(config.api_url, "https://api.pagerduty.com");
    assert_eq!(config.rules.path, "~/.config/pdh_rules");
    assert!(config.rule_timeout().is_none());
    assert_eq!(config.output.format, RenderTarget::Table);
}

#[test]
fn invalid_toml_is_reported() {
    assert!(matches!(
        PdhConfig::from_toml("apikey = "),
        Err(ConfigError::Parse { .. })
    ));
    assert!(matches!(
        PdhConfig::from_toml("[output]\nformat = \"csv\"\n"),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn validate_names_the_first_missing_key() {
    let config = PdhConfig {
        apikey: "key".to_owned(),
        uid: "  ".to_owned(),
        ..PdhConfig::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Missing("uid"))));
}

#[test]
fn env_overrides_file_values() {
    let mut config = PdhConfig::from_toml("apikey = \"file\"\nuid = \"U1\"\n").expect("should parse");
    config.apply_overrides(env_from(&[
        ("PDH_API_KEY", "env-key"),
        ("PDH_EMAIL", "me@example.com"),
        ("PDH_RULES_PATH", "/srv/rules"),
        ("PDH_RULE_TIMEOUT_SECS", "12"),
    ]));
    assert_eq!(config.apikey, "env-key");
    assert_eq!(config.uid, "U1");
    assert_eq!(config.email, "me@example.com");
    assert_eq!(config.rules.path, "/srv/rules");
    assert_eq!(config.rules.timeout_secs, 12);
}

#[test]
fn invalid_numeric_override_is_ignored() {
    let mut config = PdhConfig::default();
    config.apply_overrides(env_from(&[("PDH_RULE_TIMEOUT_SECS", "soon")]));
    assert_eq!(config.rules.timeout_secs, 300);
}

#[test]
fn missing_file_loads_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = PdhConfig::load_with(&dir.path().join("absent.toml"), env_from(&[]))
        .expect("missing file is fine");
    assert_eq!(config, PdhConfig::default());
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("pdh.toml");
    let mut config = PdhConfig {
        apikey: "key".to_owned(),
        uid: "U1".to_owned(),
        email: "me@example.com".to_owned(),
        ..PdhConfig::default()
    };
    config.output.format = RenderTarget::Json;

    config.save(&path).expect("save should succeed");
    let loaded = PdhConfig::load_with(&path, env_from(&[])).expect("load should succeed");
    assert_eq!(loaded, config);
}

#[test]
fn unreadable_path_is_a_read_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    // A directory cannot be read as a file.
    let result = PdhConfig::load_with(dir.path(), env_from(&[]));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn config_path_resolution_order() {
    let explicit = Path::new("/tmp/explicit.toml");
    let env = env_from(&[("PDH_CONFIG", "/tmp/from-env.toml")]);

    let chosen = PdhConfig::resolve_path(Some(explicit), &env).expect("explicit path");
    assert_eq!(chosen, explicit);
    let chosen = PdhConfig::resolve_path(None, &env).expect("env path");
    assert_eq!(chosen, PathBuf::from("/tmp/from-env.toml"));

    if let Ok(default) = PdhConfig::resolve_path(None, env_from(&[])) {
        assert!(default.ends_with(".config/pdh.toml"));
    }
}
