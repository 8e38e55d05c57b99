//! Drives an ordered scenario against one resolved page.
//!
//! The first step whose outcome is an error short-circuits the run: the
//! error joins the output, the owning session is destroyed, and the report
//! comes back `Failed` with everything accumulated so far.

use tracing::{info, warn};

use crate::core::BrowserDriver;
use crate::errors::Result;
use crate::registry::SessionRegistry;
use crate::scenario::command::{Command, ScenarioStep};
use crate::scenario::interpreter;
use crate::scenario::outcome::{ScenarioReport, StepOutcome, StepRecord};

pub async fn run_scenario<B: BrowserDriver>(
    registry: &SessionRegistry<B>,
    key: &str,
    page_index: usize,
    steps: &[ScenarioStep],
) -> Result<ScenarioReport> {
    let session = registry.get(key).await?;
    let gate = session.lock_scenario().await;
    let page = session.page(page_index).await?;

    info!(key, page_index, steps = steps.len(), "scenario started");

    let mut results = Vec::new();
    for step in steps {
        for (name, params) in step.entries() {
            let outcome = match Command::parse(name, params) {
                Ok(command) => interpreter::execute(page.as_ref(), &command).await,
                Err(parse_error) => StepOutcome::Error(parse_error.to_string()),
            };

            match outcome {
                StepOutcome::Empty => {}
                StepOutcome::Value(value) => {
                    results.push(StepRecord::Value { value });
                }
                StepOutcome::Error(message) => {
                    warn!(key, command = %name, error = %message, "step failed, tearing down session");
                    results.push(StepRecord::Error {
                        error: message.clone(),
                    });

                    // release the gate before teardown; queued scenarios will
                    // fail their engine calls against the closing browser
                    drop(gate);
                    if let Err(close_error) = registry.destroy(key).await {
                        warn!(key, error = %close_error, "teardown after failed step reported an error");
                    }
                    return Ok(ScenarioReport::failed(results, message));
                }
            }
        }
    }

    info!(key, results = results.len(), "scenario completed");
    Ok(ScenarioReport::completed(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LaunchProfile;
    use crate::errors::ScenaristError;
    use crate::scenario::outcome::{ScenarioStatus, StepRecord};
    use crate::testing::MockBrowser;
    use serde_json::json;

    fn steps(raw: serde_json::Value) -> Vec<ScenarioStep> {
        serde_json::from_value(raw).unwrap()
    }

    async fn registry_with(browser: MockBrowser) -> SessionRegistry<MockBrowser> {
        let registry = SessionRegistry::new();
        registry
            .create("s1", browser, &LaunchProfile::default())
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn completed_scenario_accumulates_value_records() {
        let browser = MockBrowser::default();
        browser.behavior.push_eval_result(json!("first"));
        let registry = registry_with(browser).await;

        let report = run_scenario(
            &registry,
            "s1",
            0,
            &steps(json!([
                {"navigate": {"url": "https://example.com"}},
                {"evaluate_script": {"script": "document.title"}},
                {"wait": 1}
            ])),
        )
        .await
        .unwrap();

        assert_eq!(report.status, ScenarioStatus::Completed);
        assert_eq!(report.results, vec![StepRecord::Value { value: json!("first") }]);
        assert!(registry.contains("s1").await);
    }

    #[tokio::test]
    async fn failing_step_short_circuits_and_destroys_the_session() {
        let browser = MockBrowser::default();
        let behavior = browser.behavior.clone();
        behavior.push_eval_result(json!("before"));
        behavior.push_eval_result(json!("after"));
        let registry = registry_with(browser).await;

        let report = run_scenario(
            &registry,
            "s1",
            0,
            &steps(json!([
                {"evaluate_script": {"script": "a()"}},
                {"click": {"selector": "#missing", "delay": 0, "timeout": 10}},
                {"evaluate_script": {"script": "b()"}}
            ])),
        )
        .await
        .unwrap();

        assert_eq!(report.status, ScenarioStatus::Failed);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0], StepRecord::Value { value: json!("before") });
        assert!(matches!(
            &report.results[1],
            StepRecord::Error { error } if error.starts_with("click:")
        ));
        let message = report.error.unwrap();
        assert!(message.starts_with("click:"), "{message}");

        // step C never ran: its eval result is still queued
        assert_eq!(behavior.queued_eval_results(), 1);

        // the failing step took the whole session down
        assert!(!registry.contains("s1").await);
        assert!(behavior.closed());
    }

    #[tokio::test]
    async fn unknown_command_is_a_step_error() {
        let registry = registry_with(MockBrowser::default()).await;

        let report = run_scenario(
            &registry,
            "s1",
            0,
            &steps(json!([{"teleport": {"to": "mars"}}])),
        )
        .await
        .unwrap();

        assert_eq!(report.status, ScenarioStatus::Failed);
        assert!(matches!(
            &report.results[0],
            StepRecord::Error { error } if error == "unknown command: teleport"
        ));
        assert!(!registry.contains("s1").await);
    }

    #[tokio::test]
    async fn unknown_session_is_a_request_error() {
        let registry: SessionRegistry<MockBrowser> = SessionRegistry::new();
        let err = run_scenario(&registry, "ghost", 0, &[]).await.unwrap_err();
        assert!(matches!(err, ScenaristError::UnknownSession(k) if k == "ghost"));
    }

    #[tokio::test]
    async fn out_of_range_page_index_is_a_request_error() {
        let registry = registry_with(MockBrowser::default()).await;
        let err = run_scenario(&registry, "s1", 3, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ScenaristError::InvalidPageIndex { index: 3, pages: 0 }
        ));
        // a registry-level rejection does not tear the session down
        assert!(registry.contains("s1").await);
    }

    #[tokio::test]
    async fn empty_scenario_completes_with_no_records() {
        let registry = registry_with(MockBrowser::default()).await;
        let report = run_scenario(&registry, "s1", 0, &[]).await.unwrap();
        assert_eq!(report.status, ScenarioStatus::Completed);
        assert!(report.results.is_empty());
    }
}
