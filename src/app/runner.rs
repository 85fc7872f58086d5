//! Minimal test runner: one [`MockSession`] per case, always torn down.

use crate::app::async_loop::{AsyncTestLoop, LoopHandle};
use crate::app::dto::{CaseOutcome, CaseStatus, FailureDto, RunReport};
use crate::app::session::{MockSession, panic_message};
use crate::config::RunnerConfig;
use crate::domain::errors::{MockError, MockResult};
use anyhow::{Context as _, Result};
use futures::future::BoxFuture;
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

type SyncBody = Arc<dyn Fn(&MockSession) -> MockResult<()> + Send + Sync>;
type AsyncBody = Arc<dyn Fn(MockSession, LoopHandle) -> BoxFuture<'static, MockResult<()>> + Send + Sync>;

#[derive(Clone)]
pub enum TestBody {
    Sync(SyncBody),
    Async(AsyncBody),
}

#[derive(Clone)]
pub struct TestCase {
    name: String,
    body: TestBody,
}

impl TestCase {
    pub fn sync<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&MockSession) -> MockResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: TestBody::Sync(Arc::new(body)),
        }
    }

    /// An async case; the body runs on a fresh [`AsyncTestLoop`].
    pub fn asynchronous<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(MockSession, LoopHandle) -> BoxFuture<'static, MockResult<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: TestBody::Async(Arc::new(body)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_async(&self) -> bool {
        matches!(self.body, TestBody::Async(_))
    }
}

#[derive(Clone)]
pub struct Suite {
    name: String,
    cases: Vec<TestCase>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    pub fn case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn names(&self) -> Vec<&str> {
        self.cases.iter().map(TestCase::name).collect()
    }
}

pub struct Runner {
    config: RunnerConfig,
    filter: Option<Regex>,
    exclude: Option<Regex>,
}

fn compile(pattern: Option<&str>, what: &str) -> Result<Option<Regex>> {
    pattern
        .map(|p| Regex::new(p).with_context(|| format!("Invalid {what} regex: {p}")))
        .transpose()
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Result<Self> {
        let filter = compile(config.filter.as_deref(), "filter")?;
        let exclude = compile(config.exclude.as_deref(), "exclude")?;
        Ok(Self {
            config,
            filter,
            exclude,
        })
    }

    /// Cases passing the filter and exclude patterns, in suite order.
    pub fn selected<'a>(&self, suite: &'a Suite) -> Vec<&'a TestCase> {
        suite
            .cases()
            .iter()
            .filter(|c| self.filter.as_ref().is_none_or(|re| re.is_match(c.name())))
            .filter(|c| !self.exclude.as_ref().is_some_and(|re| re.is_match(c.name())))
            .collect()
    }

    pub fn run(&self, suite: &Suite) -> RunReport {
        let selected = self.selected(suite);
        info!(suite = suite.name(), selected = selected.len(), "running suite");
        let mut report = RunReport {
            suite: suite.name().to_string(),
            ..RunReport::default()
        };
        for (index, case) in selected.iter().enumerate() {
            let outcome = self.run_case(case);
            let failed = outcome.status == CaseStatus::Failed;
            if failed {
                report.failed += 1;
            } else {
                report.passed += 1;
            }
            report.outcomes.push(outcome);
            if failed && self.config.fail_fast {
                report.skipped = selected.len() - index - 1;
                info!(skipped = report.skipped, "stopping after first failure");
                break;
            }
        }
        info!(passed = report.passed, failed = report.failed, "suite finished");
        report
    }

    pub fn run_case(&self, case: &TestCase) -> CaseOutcome {
        debug!(case = case.name(), "running case");
        let started = Instant::now();
        let session = MockSession::new();
        let body = match &case.body {
            TestBody::Sync(body) => guarded(|| body(&session)),
            TestBody::Async(body) => match AsyncTestLoop::new(self.config.loop_config()) {
                Ok(test_loop) => {
                    let session = session.clone();
                    guarded(move || test_loop.run(|handle| body(session, handle)))
                }
                Err(e) => Err(e),
            },
        };
        let result = session.teardown(body);
        let failures = match &result {
            Ok(()) => Vec::new(),
            Err(e) => FailureDto::from_error(e, self.config.trim_path_prefix.as_deref()),
        };
        CaseOutcome {
            name: case.name().to_string(),
            status: if result.is_ok() {
                CaseStatus::Passed
            } else {
                CaseStatus::Failed
            },
            duration_ms: started.elapsed().as_millis() as u64,
            failures,
        }
    }
}

fn guarded(body: impl FnOnce() -> MockResult<()>) -> MockResult<()> {
    panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(MockError::Panicked(panic_message(payload.as_ref()))))
}
