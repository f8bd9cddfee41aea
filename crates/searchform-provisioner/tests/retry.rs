use std::time::Duration;

use searchform_client::ApiError;
use searchform_provisioner::Retried;
use searchform_provisioner::retry::{read_after_write_policy, retry_within};
use tokio::time::Instant;

fn not_found() -> ApiError {
    ApiError::NotFound {
        index: "products".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn settles_after_transient_not_found() {
    let mut calls = 0;
    let outcome = retry_within(
        Duration::from_secs(60),
        read_after_write_policy(),
        || {
            calls += 1;
            let n = calls;
            async move { if n < 3 { Err(not_found()) } else { Ok(n) } }
        },
        ApiError::is_propagation_race,
    )
    .await;

    assert!(matches!(outcome, Retried::Settled { value: 3, attempts: 3 }));
}

#[tokio::test(start_paused = true)]
async fn no_host_available_is_transient() {
    let mut calls = 0;
    let outcome = retry_within(
        Duration::from_secs(60),
        read_after_write_policy(),
        || {
            calls += 1;
            let n = calls;
            async move {
                if n == 1 {
                    Err(ApiError::NoHostAvailable("all hosts unreachable".into()))
                } else {
                    Ok(())
                }
            }
        },
        ApiError::is_propagation_race,
    )
    .await;

    assert_eq!(outcome.attempts(), 2);
    assert!(outcome.into_result().is_ok());
}

#[tokio::test(start_paused = true)]
async fn exhausts_budget_and_returns_last_not_found() {
    let budget = Duration::from_secs(2);
    let start = Instant::now();
    let outcome: Retried<(), ApiError> = retry_within(
        budget,
        read_after_write_policy(),
        || async { Err(not_found()) },
        ApiError::is_propagation_race,
    )
    .await;

    assert!(start.elapsed() <= budget);
    assert!(outcome.attempts() > 1);
    match outcome {
        Retried::Exhausted { error, .. } => assert!(error.is_not_found()),
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn fatal_error_is_not_retried() {
    let outcome: Retried<(), ApiError> = retry_within(
        Duration::from_secs(60),
        read_after_write_policy(),
        || async {
            Err(ApiError::Rejected {
                status: 403,
                message: "invalid API key".into(),
            })
        },
        ApiError::is_propagation_race,
    )
    .await;

    assert!(matches!(outcome, Retried::Rejected { attempts: 1, .. }));
}
