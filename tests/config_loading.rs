mod common;
use crate::common::{init_tracing, run_with};

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chaindag::config::{
    Collaborators, ConfigFile, StageConfig, TaskKind, load_and_validate, load_from_path,
};
use chaindag::errors::ChaindagError;
use chaindag::external::CommandTemplates;
use chaindag::types::{EmptyGroupPolicy, RunStatus, VertexState};
use chaindag_test_utils::builders::{
    ConfigFileBuilder, TaskConfigBuilder, catalog_group, static_group,
};
use chaindag_test_utils::collaborators::{ScriptedBackend, StaticCatalog};
use tempfile::NamedTempFile;

const PIPELINE: &str = r#"
chain = [["load_orders", "load_customers"], "jobs_done", "audit", "publish", "report"]

[pipeline]
name = "customer_metrics"
tags = ["daily"]

[config]
max_concurrency = 2
task_timeout = "30m"
retries = 1
retry_delay = "250ms"
empty_group = "error"

[backend]
ingest = "trigger-sync {job_id}"
check = "run-check {check} {subpath} {data_source}"
catalog = "list-models"
transform = "run-model {model}"

[task.load_orders]
kind = "ingest"
job_id = "orders"

[task.load_customers]
kind = "ingest"
job_id = "customers"
timeout = "5m"
retries = 3

[task.jobs_done]
kind = "gate"

[task.not_null]
kind = "check"
check = "not_null"
subpath = "checks/orders"
data_source = "warehouse"

[task.unique_ids]
kind = "check"
check = "unique_ids"

[task.report]
kind = "command"
cmd = "echo done"

[group.audit]
members = ["not_null", "unique_ids"]

[group.publish]
catalog = true
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn scripted_collaborators(backend: &Arc<ScriptedBackend>, models: &[&str]) -> Collaborators {
    Collaborators {
        ingestion: backend.clone(),
        checks: backend.clone(),
        catalog: StaticCatalog::new(models.iter().copied()),
        transforms: backend.clone(),
    }
}

fn config_error(result: Result<ConfigFile, ChaindagError>) -> String {
    match result {
        Err(ChaindagError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn parses_a_full_pipeline_file() {
    init_tracing();
    let file = write_config(PIPELINE);
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.pipeline_name(), "customer_metrics");
    assert_eq!(cfg.pipeline.tags, ["daily"]);
    assert_eq!(cfg.chain.len(), 5);
    assert_eq!(
        cfg.chain[0],
        StageConfig::Many(vec!["load_orders".to_string(), "load_customers".to_string()])
    );
    assert_eq!(cfg.chain[1], StageConfig::One("jobs_done".to_string()));

    assert_eq!(cfg.config.max_concurrency, 2);
    assert_eq!(cfg.config.task_timeout, Some(Duration::from_secs(30 * 60)));
    assert_eq!(cfg.config.retry_delay, Some(Duration::from_millis(250)));
    assert_eq!(cfg.config.empty_group, EmptyGroupPolicy::Error);

    let customers = &cfg.task["load_customers"];
    assert_eq!(
        customers.kind,
        TaskKind::Ingest {
            job_id: "customers".to_string()
        }
    );
    assert_eq!(customers.timeout, Some(Duration::from_secs(300)));
    assert_eq!(customers.retries, Some(3));

    assert_eq!(
        cfg.task["unique_ids"].kind,
        TaskKind::Check {
            check: "unique_ids".to_string(),
            subpath: String::new(),
            data_source: String::new(),
        }
    );
    assert!(cfg.group["publish"].catalog);
    assert_eq!(cfg.group["audit"].members, ["not_null", "unique_ids"]);

    let options = cfg.run_options();
    assert_eq!(options.max_concurrency, 2);

    let defaults = cfg.task_defaults();
    assert_eq!(defaults.retries, 1);
    assert_eq!(defaults.timeout, Some(Duration::from_secs(1800)));
}

#[tokio::test]
async fn config_pipeline_runs_against_collaborators() {
    init_tracing();
    let file = write_config(&PIPELINE.replace("echo done", "true"));
    let cfg = load_and_validate(file.path()).unwrap();
    let backend = ScriptedBackend::new();

    let workflow = cfg
        .workflow_builder(&scripted_collaborators(&backend, &["orders_daily", "churn"]))
        .unwrap()
        .build()
        .await
        .unwrap();

    let publish_members = workflow.graph().members_of("publish").to_vec();
    assert_eq!(publish_members, ["publish.orders_daily", "publish.churn"]);
    assert_eq!(
        workflow.task("load_customers").and_then(|t| t.retries),
        Some(3)
    );
    assert_eq!(workflow.task("load_orders").and_then(|t| t.retries), Some(1));

    let report = run_with(workflow, cfg.run_options()).await;

    assert_eq!(report.status, RunStatus::Succeeded, "{report}");
    assert_eq!(report.workflow, "customer_metrics");
    let events = backend.recorder.events();
    let pos = |e: &str| events.iter().position(|x| x == e).unwrap();
    assert!(pos("check:not_null") > pos("ingest:orders"));
    assert!(pos("check:unique_ids") > pos("ingest:customers"));
    assert!(pos("transform:churn") > pos("check:not_null"));
    assert!(pos("transform:orders_daily") > pos("check:unique_ids"));
}

#[tokio::test]
async fn failing_check_from_config_blocks_publish() {
    init_tracing();
    let file = write_config(&PIPELINE.replace("echo done", "true"));
    let cfg = load_and_validate(file.path()).unwrap();
    let backend = ScriptedBackend::failing(["check:not_null"]);

    let workflow = cfg
        .workflow_builder(&scripted_collaborators(&backend, &["m1"]))
        .unwrap()
        .build()
        .await
        .unwrap();
    let report = run_with(workflow, cfg.run_options()).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.state_of("not_null"), Some(VertexState::Failed));
    assert_eq!(report.state_of("unique_ids"), Some(VertexState::Success));
    assert_eq!(report.state_of("audit"), Some(VertexState::Failed));
    assert_eq!(report.state_of("publish.m1"), Some(VertexState::UpstreamFailed));
    assert_eq!(report.state_of("report"), Some(VertexState::UpstreamFailed));
    assert!(
        report
            .error_of("not_null")
            .is_some_and(|e| e.to_string().contains("2 rows violate the rule"))
    );
    assert!(!backend.recorder.contains("transform:m1"));
}

#[tokio::test]
async fn empty_catalog_is_a_build_error_when_configured() {
    let file = write_config(PIPELINE);
    let cfg = load_and_validate(file.path()).unwrap();
    let backend = ScriptedBackend::new();

    let err = cfg
        .workflow_builder(&scripted_collaborators(&backend, &[]))
        .unwrap()
        .build()
        .await
        .unwrap_err();
    assert!(
        matches!(err, chaindag::errors::BuildError::EmptyGroup(ref g) if g == "publish"),
        "{err}"
    );
    assert!(backend.recorder.events().is_empty());
}

#[test]
fn malformed_files_are_toml_errors() {
    let file = write_config("[config]\ntask_timeout = \"10 parsecs\"\n");
    assert!(matches!(
        load_from_path(file.path()),
        Err(ChaindagError::TomlError(_))
    ));

    let file = write_config("[task.a]\nkind = \"teleport\"\n");
    assert!(matches!(
        load_from_path(file.path()),
        Err(ChaindagError::TomlError(_))
    ));

    let file = write_config("[task.a]\njob_id = \"x\"\n");
    assert!(matches!(
        load_from_path(file.path()),
        Err(ChaindagError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_from_path(dir.path().join("nope.toml"));
    assert!(matches!(result, Err(ChaindagError::IoError(_))));
}

#[test]
fn rejects_empty_config() {
    let msg = config_error(ConfigFile::try_from(ConfigFileBuilder::new().raw()));
    assert!(msg.contains("at least one"), "{msg}");
}

#[test]
fn rejects_zero_concurrency() {
    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::gate().build())
        .with_max_concurrency(0)
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("max_concurrency"), "{msg}");
}

#[test]
fn rejects_bad_task_dependencies() {
    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::gate().after("a").build())
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert_eq!(msg, "task 'a' cannot depend on itself in `after`");

    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::gate().after("ghost").build())
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert_eq!(msg, "task 'a' has unknown dependency 'ghost' in `after`");
}

#[test]
fn rejects_name_used_by_task_and_group() {
    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::gate().build())
        .with_task("b", TaskConfigBuilder::gate().build())
        .with_group("a", static_group(&["b"]))
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("both as a task and as a group"), "{msg}");
}

#[test]
fn rejects_malformed_groups() {
    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::gate().build())
        .with_group("g", static_group(&["a", "ghost"]))
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert_eq!(msg, "group 'g' has unknown member 'ghost'");

    let mut both = catalog_group();
    both.members.push("a".to_string());
    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::gate().build())
        .with_group("g", both)
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("cannot set both"), "{msg}");

    let raw = ConfigFileBuilder::new()
        .with_group("g", static_group(&[]))
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert!(msg.contains("must set `catalog = true` or list `members`"), "{msg}");
}

#[test]
fn rejects_bad_chain_stages() {
    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::gate().build())
        .with_stage(&["a"])
        .with_stage(&[])
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert_eq!(msg, "`chain` stage 1 is empty");

    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::gate().build())
        .with_stage(&["a"])
        .with_stage(&["b"])
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert_eq!(msg, "`chain` stage 1 references unknown vertex 'b'");
}

#[test]
fn requires_backend_templates_for_kinds_in_use() {
    let raw = ConfigFileBuilder::new()
        .with_task(
            "load",
            TaskConfigBuilder::new(TaskKind::Ingest {
                job_id: "j".to_string(),
            })
            .build(),
        )
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert_eq!(msg, "ingest task 'load' needs a `ingest` command in [backend]");

    let raw = ConfigFileBuilder::new()
        .with_group("publish", catalog_group())
        .with_backend(CommandTemplates {
            catalog: Some("list-models".to_string()),
            ..CommandTemplates::default()
        })
        .raw();
    let msg = config_error(ConfigFile::try_from(raw));
    assert_eq!(
        msg,
        "catalog group 'publish' needs a `transform` command in [backend]"
    );

    let cfg = ConfigFileBuilder::new()
        .with_task("cmd", TaskConfigBuilder::command("true").build())
        .with_task("gate", TaskConfigBuilder::gate().after("cmd").build())
        .build();
    assert_eq!(cfg.task.len(), 2);
}

#[tokio::test]
async fn chain_cycle_surfaces_when_the_workflow_is_built() {
    let cfg = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::gate().build())
        .with_task("b", TaskConfigBuilder::gate().after("a").build())
        .with_stage(&["b"])
        .with_stage(&["a"])
        .build();
    let backend = ScriptedBackend::new();

    let err = cfg
        .workflow_builder(&scripted_collaborators(&backend, &[]))
        .unwrap()
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, chaindag::errors::BuildError::Cycle { .. }));
}
