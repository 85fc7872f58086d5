//! Runner and configuration: selection, reports and the demo suite.

mod common;

use common::fixtures::os_module;
use dynmock::app::demo::demo_suite;
use dynmock::app::dto::CaseStatus;
use dynmock::app::runner::{Runner, Suite, TestCase};
use dynmock::config::RunnerConfig;
use dynmock::{MockError, Value, args};
use futures::FutureExt;
use std::io::Write;

fn suite() -> Suite {
    Suite::new("integration")
        .case(TestCase::sync("unmet_expectation", |session| {
            let os = os_module();
            session
                .mock_callable(&os, "remove")?
                .for_call(args!["/tmp/x"])
                .to_return_value(Value::None)?
                .and_assert_called_once()?;
            Ok(())
        }))
        .case(TestCase::sync("met_expectation", |session| {
            let os = os_module();
            session
                .mock_callable(&os, "remove")?
                .for_call(args!["/tmp/x"])
                .to_return_value(Value::None)?
                .and_assert_called_once()?;
            os.call_method("remove", &args!["/tmp/x"])?;
            Ok(())
        }))
        .case(TestCase::asynchronous("async_leak", |_, handle| {
            async move {
                let _task = handle.spawn("forgotten", async {
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    Ok(Value::None)
                });
                Ok(())
            }
            .boxed()
        }))
}

#[test]
fn test_failures_are_reported_per_case() {
    let report = Runner::new(RunnerConfig::default()).unwrap().run(&suite());
    assert_eq!(report.passed, 1);
    assert_eq!(report.failed, 2);
    assert!(!report.is_success());

    let unmet = &report.outcomes[0];
    assert_eq!(unmet.status, CaseStatus::Failed);
    assert_eq!(unmet.failures[0].kind, "AssertionFailed");

    let leak = &report.outcomes[2];
    assert_eq!(leak.failures[0].kind, "LeakedTask");
    assert!(leak.failures[0].message.contains("forgotten"));
}

#[test]
fn test_patches_do_not_leak_between_cases() {
    let os = os_module();
    let shared = os.clone();
    let suite = Suite::new("leaks").case(TestCase::sync("patches", move |session| {
        session.patch_attribute(&shared, "sep", "|")?;
        Err(MockError::AssertionFailed("body failed".into()))
    }));
    let report = Runner::new(RunnerConfig::default()).unwrap().run(&suite);
    assert_eq!(report.failed, 1);
    assert_eq!(os.get_attr("sep").unwrap(), Value::from("/"));
}

#[test]
fn test_config_file_drives_selection() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"filter": "expectation", "exclude": "^unmet"}}"#).unwrap();
    let config = RunnerConfig::load(file.path()).unwrap();
    let runner = Runner::new(config).unwrap();
    let suite = suite();
    let names: Vec<&str> = runner.selected(&suite).iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["met_expectation"]);
}

#[test]
fn test_demo_suite_is_green() {
    let report = Runner::new(RunnerConfig::default()).unwrap().run(&demo_suite());
    let failed: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| o.status == CaseStatus::Failed)
        .collect();
    assert!(failed.is_empty(), "{failed:?}");
}
