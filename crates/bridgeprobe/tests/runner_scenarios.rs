//! Suite runs over scripted collaborators.

use bridgeprobe::prelude::*;
use bridgeprobe::testing::{
    FailingConnector, FakeChannel, FakeCostMeter, FakeJudge, SimulatedList, StaticConnector,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn offline_config() -> RunnerConfig {
    RunnerConfig::new().with_app_interception(false)
}

#[tokio::test]
async fn flaky_test_passes_on_third_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let seen = attempts.clone();
    let flaky = TestCase::new("flaky tree load", move |ctx| {
        let n = seen.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                return ctx.fail(format!("tree not ready ({n})"));
            }
            Ok(())
        }
        .boxed()
    });

    let runner = Runner::new(
        offline_config().with_retries(2),
        Arc::new(StaticConnector::new(Arc::new(FakeChannel::new()))),
    );
    let suite = runner
        .run(&TestSuite::new("tree").with_test(flaky))
        .await
        .unwrap();

    let result = &suite.results[0];
    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(result.attempts, 3);
    assert!(result.error.is_none());
    assert_eq!(suite.exit_code(), 0);
}

#[tokio::test]
async fn refused_connection_aborts_the_run() {
    let runner = Runner::new(offline_config(), Arc::new(FailingConnector::new("refused")));
    let run = runner
        .run(&TestSuite::new("s").with_test(TestCase::new("a", |_ctx| {
            async { Ok(()) }.boxed()
        })))
        .await;
    assert!(matches!(run, Err(ProbeError::Channel(ChannelError::Connect { .. }))));
    assert_eq!(exit_code(&run), 2);
}

#[tokio::test]
async fn hybrid_run_reports_cost_and_json() {
    let judged = TestCase::new("tree looks right", |ctx| {
        async move {
            let verdict = ctx.judge("does the tree show 3 folders?").await?;
            if !verdict.passed {
                return ctx.fail(verdict.reasoning);
            }
            Ok(())
        }
        .boxed()
    })
    .with_category("visual");

    let runner = Runner::new(
        offline_config().with_mode(Mode::Hybrid),
        Arc::new(StaticConnector::new(Arc::new(FakeChannel::new()))),
    )
    .with_judge(Arc::new(FakeJudge::passing(0.02)))
    .with_cost_meter(Arc::new(FakeCostMeter::per_read(0.01)));

    let suite = runner
        .run(&TestSuite::new("visual").with_test(judged))
        .await
        .unwrap();

    let cost = suite.results[0].cost.unwrap();
    assert!((cost - 0.03).abs() < 1e-9);
    assert!((suite.total_cost() - 0.03).abs() < 1e-9);

    let report: serde_json::Value = serde_json::from_str(&suite.to_json().unwrap()).unwrap();
    assert_eq!(report["suite_name"], "visual");
    assert_eq!(report["results"][0]["status"], "passed");
    assert_eq!(report["results"][0]["category"], "visual");
}

#[tokio::test]
async fn tests_drive_the_list_through_the_context() {
    let list = Arc::new(SimulatedList::new(120, 30.0, 300.0));
    let test = TestCase::new("scrolls to item 90", |ctx| {
        async move {
            let probe = ctx.list()?;
            probe.scroll_to_index(90, ScrollOptions::default()).await?;
            probe.state().await?.assert_min_item_count(120)
        }
        .boxed()
    });

    let runner = Runner::new(offline_config(), Arc::new(StaticConnector::new(list.clone())))
        .with_list_selector("#file-tree");
    let suite = runner
        .run(&TestSuite::new("list").with_test(test))
        .await
        .unwrap();

    assert!(suite.all_passed(), "{:?}", suite.failures());
    assert!(list.scroll_top() > 0.0);
}
