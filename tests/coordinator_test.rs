//! Integration tests for the async skip coordinator.

use std::sync::Arc;
use std::time::Duration;

use captcha_skip::coordinator::{CoordinatorConfig, SkipCoordinator};
use captcha_skip::model::*;
use captcha_skip::registry::SubmitResult;

fn download(host: &str, package: &Arc<FilePackage>) -> Challenge<String> {
    let link = DownloadLink::new(format!("https://{host}/f"), Arc::clone(package))
        .with_default_plugin(host);
    Challenge::new(
        TextCaptcha::default(),
        "image",
        "",
        CreatorRole::DownloadWorker,
        Some(HostPlugin::new(host).with_link(Arc::new(link)).into()),
    )
}

fn coordinator(sweep_ms: u64, default_timeout_ms: i64) -> SkipCoordinator {
    SkipCoordinator::new(CoordinatorConfig {
        sweep_interval: Duration::from_millis(sweep_ms),
        default_timeout_ms,
        ..CoordinatorConfig::default()
    })
}

#[tokio::test]
async fn concurrent_workers_then_skip() {
    let coordinator = coordinator(1_000, NO_TIMEOUT);
    let package = FilePackage::new("shared");

    let mut handles = Vec::new();
    for i in 0..8 {
        let coordinator = coordinator.clone();
        let package = Arc::clone(&package);
        handles.push(tokio::spawn(async move {
            let host = if i % 2 == 0 { "alpha.example" } else { "beta.example" };
            coordinator.submit(download(host, &package)).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            SubmitResult::Pending(id) => ids.push(id),
            other => panic!("expected Pending, got {other:?}"),
        }
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(
        coordinator.list_by_state(ChallengeState::Pending).await.len(),
        8
    );

    let active = coordinator.submit(download("alpha.example", &package)).await.unwrap();
    let outcome = coordinator
        .skip(active.id(), Some(SkipScope::BlockHoster), None)
        .await
        .unwrap();
    assert_eq!(outcome.also_skipped.len(), 4);

    let pending = coordinator.list_by_state(ChallengeState::Pending).await;
    assert_eq!(pending.len(), 4);
    assert!(
        pending
            .iter()
            .all(|s| s.host.as_deref() == Some("beta.example"))
    );

    // The recorded rule catches later submissions until cleared.
    let late = coordinator.submit(download("alpha.example", &package)).await.unwrap();
    assert!(matches!(late, SubmitResult::Skipped { .. }));
    assert_eq!(coordinator.clear_skip_rules().await, 1);
    let later = coordinator.submit(download("alpha.example", &package)).await.unwrap();
    assert!(matches!(later, SubmitResult::Pending(_)));
}

#[tokio::test]
async fn concurrent_skip_passes_do_not_double_skip() {
    let coordinator = coordinator(1_000, NO_TIMEOUT);
    let package = FilePackage::new("p");
    let a = coordinator.submit(download("alpha.example", &package)).await.unwrap().id();
    let b = coordinator.submit(download("alpha.example", &package)).await.unwrap().id();

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .skip(a, Some(SkipScope::BlockHoster), None)
                .await
        })
    };
    let second = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .skip(b, Some(SkipScope::BlockHoster), None)
                .await
        })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    // One pass wins and takes the other with it; the loser finds its
    // challenge already terminal.
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(coordinator.state(a).await.unwrap(), ChallengeState::Skipped);
    assert_eq!(coordinator.state(b).await.unwrap(), ChallengeState::Skipped);
}

#[tokio::test]
async fn answer_through_coordinator() {
    let coordinator = coordinator(1_000, NO_TIMEOUT);
    let id = coordinator
        .submit(download("alpha.example", &FilePackage::new("p")))
        .await
        .unwrap()
        .id();
    let state = coordinator
        .answer(id, &SolverId::new("svc"), "abcd")
        .await
        .unwrap();
    assert_eq!(state, ChallengeState::Solved);

    let events = coordinator.events_since(0).await;
    assert!(!events.is_empty());
}

#[tokio::test]
async fn sweeper_times_out_and_shuts_down() {
    let coordinator = coordinator(10, 20);
    let id = coordinator
        .submit(download("alpha.example", &FilePackage::new("p")))
        .await
        .unwrap()
        .id();

    let sweeper = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run_sweeper().await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(coordinator.state(id).await.unwrap(), ChallengeState::TimedOut);

    coordinator.shutdown();
    tokio::time::timeout(Duration::from_secs(5), sweeper)
        .await
        .expect("sweeper should stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn sweep_drops_settled_challenges_after_retention() {
    let coordinator = SkipCoordinator::new(CoordinatorConfig {
        retention: Duration::ZERO,
        ..CoordinatorConfig::default()
    });
    let package = FilePackage::new("p");
    let solved = coordinator
        .submit(download("alpha.example", &package))
        .await
        .unwrap()
        .id();
    let pending = coordinator
        .submit(download("beta.example", &package))
        .await
        .unwrap()
        .id();
    coordinator
        .answer(solved, &SolverId::new("svc"), "abcd")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    coordinator.sweep().await.unwrap();

    assert_eq!(coordinator.challenge_count().await, 1);
    assert!(coordinator.state(solved).await.is_err());
    assert_eq!(
        coordinator.state(pending).await.unwrap(),
        ChallengeState::Pending
    );
}

#[tokio::test]
async fn sweep_keeps_settled_challenges_within_retention() {
    let coordinator = coordinator(1_000, NO_TIMEOUT);
    let id = coordinator
        .submit(download("alpha.example", &FilePackage::new("p")))
        .await
        .unwrap()
        .id();
    coordinator.skip(id, None, None).await.unwrap();
    coordinator.sweep().await.unwrap();
    assert_eq!(coordinator.state(id).await.unwrap(), ChallengeState::Skipped);
}

#[tokio::test]
async fn shutdown_before_sweeper_starts() {
    let coordinator = coordinator(10_000, NO_TIMEOUT);
    // notify_one stores a permit, so the sweeper exits on its first poll.
    coordinator.shutdown();
    tokio::time::timeout(Duration::from_secs(5), coordinator.run_sweeper())
        .await
        .expect("sweeper should stop")
        .unwrap();
}
