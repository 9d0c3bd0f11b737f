// tests/config_errors.rs

use std::io::Write;

use tempfile::NamedTempFile;
use stagehand::config::load_and_validate;
use stagehand::errors::StagehandError;
use stagehand::exec::FailurePolicy;

fn load(contents: &str) -> Result<stagehand::config::PipelineFile, StagehandError> {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    load_and_validate(file.path())
}

#[test]
fn full_pipeline_file_resolves_defaults() {
    let cfg = load(
        r#"
[project]
name = "erp"
working_path = "/srv/erp"
parallelism = 4

[defaults]
user = "acme"

[[repository]]
path = "erp"
branch = "developer"
tests = ["./tools/run_tests.sh"]

[[repository]]
path = "oorq"
url = "https://example.com/oorq.git"

[service]
command = "./erp/server/bin/openerp-server.py"
port = 8069

[[stage]]
name = "Deploy"

[[stage.step]]
name = "Link addons"
dir = "erp"
commands = ["./tools/link_addons.sh"]
policy = "best-effort"
"#,
    )
    .unwrap();

    assert_eq!(cfg.project.parallelism, 4);
    let erp = cfg.repository("erp").unwrap();
    assert_eq!(erp.url, "git@github.com:acme/erp.git");
    assert_eq!(erp.branch, "developer");
    let oorq = cfg.repository("oorq").unwrap();
    assert_eq!(oorq.url, "https://example.com/oorq.git");
    assert_eq!(oorq.branch, "master");

    let service = cfg.service.as_ref().unwrap();
    assert_eq!(service.host, "localhost");
    assert_eq!(service.timeout_secs, 60);
    assert_eq!(cfg.stages[0].step[0].policy, FailurePolicy::BestEffort);
}

#[test]
fn escaping_repository_path_returns_config_error() {
    let result = load(
        r#"
[[repository]]
path = "../outside"
"#,
    );

    match result {
        Err(StagehandError::ConfigError(msg)) => assert!(msg.contains("../outside")),
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_policy_is_a_toml_error() {
    let result = load(
        r#"
[[stage]]
name = "Deploy"

[[stage.step]]
name = "x"
commands = ["true"]
policy = "sometimes"
"#,
    );

    assert!(matches!(result, Err(StagehandError::TomlError(_))));
}

#[test]
fn missing_file_is_reported() {
    let result = load_and_validate("/definitely/not/here/Stagehand.toml");
    assert!(result.is_err());
}
