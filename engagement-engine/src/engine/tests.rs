use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use engagement_shared::types::Caller;
use futures03::future::join_all;

use super::*;
use crate::testing::{asset, engine_with, seeded_engine, test_config, TestStore};

fn alice() -> Caller {
    Caller::user("alice")
}

// ============================================================================
// Vote transitions
// ============================================================================

#[tokio::test]
async fn test_first_vote_is_recorded() {
    let (_, engine) = seeded_engine(&["a-1"], test_config()).await;

    let outcome = engine.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();

    assert_eq!(outcome.vote_delta, 1);
    assert_eq!(outcome.resulting_user_vote, 1);
    assert_eq!(outcome.net_votes, 1);
    assert_eq!(outcome.upvote_count, 1);
    assert_eq!(outcome.downvote_count, 0);
    assert_eq!(outcome.contested_score, 999);
    assert_eq!(engine.get_user_vote(&alice(), "asset", "a-1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_same_vote_twice_restores_prior_state() {
    let (_, engine) = seeded_engine(&["a-1"], test_config()).await;
    engine.apply_vote(&Caller::user("bob"), "asset", "a-1", -1).await.unwrap();
    let before = engine.get_vote_counts("asset", "a-1").await.unwrap();

    let first = engine.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();
    let second = engine.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();

    assert_eq!(first.vote_delta + second.vote_delta, 0);
    assert_eq!(second.resulting_user_vote, 0);
    assert_eq!(engine.get_vote_counts("asset", "a-1").await.unwrap(), before);
    assert_eq!(engine.get_user_vote(&alice(), "asset", "a-1").await.unwrap(), 0);
    assert_eq!(engine.get_total_votes("asset", "a-1").await.unwrap(), -1);
}

#[tokio::test]
async fn test_opposite_vote_flips_by_two() {
    let (_, engine) = seeded_engine(&["a-1"], test_config()).await;

    engine.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();
    let down = engine.apply_vote(&alice(), "asset", "a-1", -1).await.unwrap();
    assert_eq!(down.vote_delta, -2);
    assert_eq!(down.net_votes, -1);
    assert_eq!(down.upvote_count, 0);
    assert_eq!(down.downvote_count, 1);

    let up = engine.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();
    assert_eq!(up.vote_delta, 2);
    assert_eq!(up.net_votes, 1);
}

#[tokio::test]
async fn test_aggregate_matches_live_votes() {
    let (store, engine) = seeded_engine(&["a-1"], test_config()).await;
    let votes = [("u1", 1), ("u2", 1), ("u3", -1), ("u1", -1), ("u4", 1), ("u2", 1)];
    for (user, value) in votes {
        engine
            .apply_vote(&Caller::user(user), "asset", "a-1", value)
            .await
            .unwrap();
    }

    let counts = engine.get_vote_counts("asset", "a-1").await.unwrap();
    assert_eq!(counts, VoteCounts::new(1, 2));

    let aggregate = store.inner.get_aggregate(&asset("a-1")).await.unwrap().unwrap();
    assert_eq!(aggregate.upvote_count, counts.upvotes);
    assert_eq!(aggregate.downvote_count, counts.downvotes);
    assert_eq!(aggregate.net_votes, counts.net);
    assert_eq!(aggregate.total_engagement, 3);
    assert_eq!(aggregate.contested_score, 2999);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_voters_lose_no_updates() {
    const VOTERS: usize = 32;
    let config = EngineConfig {
        max_retries: 200,
        retry_base_delay: Duration::from_millis(1),
        retry_max_delay: Duration::from_millis(5),
        ..EngineConfig::default()
    };
    let (store, engine) = seeded_engine(&["hot"], config).await;
    let engine = Arc::new(engine);

    let handles = (0..VOTERS).map(|i| {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .apply_vote(&Caller::user(format!("user-{i}")), "asset", "hot", 1)
                .await
        })
    });
    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let aggregate = store.inner.get_aggregate(&asset("hot")).await.unwrap().unwrap();
    assert_eq!(aggregate.net_votes, VOTERS as i64);
    assert_eq!(aggregate.upvote_count, VOTERS as i64);
    assert_eq!(
        engine.get_vote_counts("asset", "hot").await.unwrap(),
        VoteCounts::new(VOTERS as i64, 0)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clicks_by_one_user_serialize() {
    const CLICKS: usize = 5;
    let config = EngineConfig {
        max_retries: 200,
        retry_base_delay: Duration::from_millis(1),
        retry_max_delay: Duration::from_millis(5),
        ..EngineConfig::default()
    };
    let (store, engine) = seeded_engine(&["a-1"], config).await;
    let engine = Arc::new(engine);

    let handles = (0..CLICKS).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.apply_vote(&alice(), "asset", "a-1", 1).await })
    });
    let mut outcomes = Vec::with_capacity(CLICKS);
    for result in join_all(handles).await {
        outcomes.push(result.unwrap().unwrap());
    }

    // each click toggles the vote: on, off, on, ...
    for outcome in &outcomes {
        match outcome.resulting_user_vote {
            1 => assert_eq!((outcome.vote_delta, outcome.net_votes), (1, 1)),
            0 => assert_eq!((outcome.vote_delta, outcome.net_votes), (-1, 0)),
            other => panic!("unexpected resulting vote {other}"),
        }
    }
    let on = outcomes.iter().filter(|o| o.resulting_user_vote == 1).count();
    let off = outcomes.len() - on;
    assert_eq!((on, off), (CLICKS.div_ceil(2), CLICKS / 2));

    let records = store.inner.list_item_votes(&asset("a-1")).await.unwrap();
    let aggregate = store.inner.get_aggregate(&asset("a-1")).await.unwrap().unwrap();
    assert!(records.len() <= 1);
    assert_eq!(aggregate.upvote_count, records.len() as i64);
    assert_eq!(aggregate.downvote_count, 0);

    let final_vote = engine.get_user_vote(&alice(), "asset", "a-1").await.unwrap();
    assert_eq!(final_vote, (on - off) as i64);
    assert_eq!(outcomes.iter().map(|o| o.vote_delta).sum::<i64>(), aggregate.net_votes);
    assert_eq!(aggregate.net_votes, final_vote);
}

// ============================================================================
// Validation and rate limiting
// ============================================================================

#[tokio::test]
async fn test_anonymous_caller_cannot_vote() {
    let (store, engine) = seeded_engine(&["a-1"], test_config()).await;
    let calls = store.calls();

    let result = engine.apply_vote(&Caller::Anonymous, "asset", "a-1", 1).await;

    assert_eq!(result, Err(VoteError::AuthenticationRequired));
    assert_eq!(store.calls(), calls);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_without_io() {
    let (store, engine) = seeded_engine(&["a-1"], test_config()).await;
    let calls = store.calls();

    assert_eq!(
        engine.apply_vote(&alice(), "asset", "a-1", 0).await,
        Err(VoteError::InvalidVoteValue(0))
    );
    assert_eq!(
        engine.apply_vote(&alice(), "asset", "a-1", 2).await,
        Err(VoteError::InvalidVoteValue(2))
    );
    assert_eq!(
        engine.apply_vote(&alice(), "video", "a-1", 1).await,
        Err(VoteError::InvalidItemType("video".to_string()))
    );
    assert_eq!(store.calls(), calls);
}

#[tokio::test]
async fn test_missing_item_is_not_found() {
    let (_, engine) = seeded_engine(&[], test_config()).await;

    let result = engine.apply_vote(&alice(), "note", "nope", 1).await;

    assert_eq!(
        result,
        Err(VoteError::ItemNotFound {
            item_type: "note".to_string(),
            item_id: "nope".to_string(),
        })
    );
}

#[tokio::test]
async fn test_rate_limit_rejects_without_io() {
    let config = EngineConfig {
        rate_limit_max: 2,
        ..test_config()
    };
    let (store, engine) = seeded_engine(&["a-1"], config).await;

    // invalid calls do not spend the budget
    engine.apply_vote(&alice(), "asset", "a-1", 5).await.unwrap_err();

    engine.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();
    engine.apply_vote(&Caller::user("bob"), "asset", "a-1", 1).await.unwrap();
    let calls = store.calls();

    let result = engine.apply_vote(&Caller::user("carol"), "asset", "a-1", 1).await;

    assert_eq!(result, Err(VoteError::RateLimitExceeded));
    assert_eq!(store.calls(), calls);
    assert_eq!(engine.get_total_votes("asset", "a-1").await.unwrap(), 2);
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_conflicts_are_retried() {
    let (store, engine) = seeded_engine(&["a-1"], test_config()).await;
    store.conflicts_to_inject.store(2, Ordering::SeqCst);

    let outcome = engine.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();

    assert_eq!(outcome.net_votes, 1);
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    assert_eq!(store.snapshot_reads.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_conflict_gives_up() {
    let config = EngineConfig {
        max_retries: 3,
        ..test_config()
    };
    let (store, engine) = seeded_engine(&["a-1"], config).await;
    store.conflicts_to_inject.store(usize::MAX, Ordering::SeqCst);

    let result = engine.apply_vote(&alice(), "asset", "a-1", 1).await;

    assert_eq!(result, Err(VoteError::TransactionConflict { attempts: 4 }));
    assert_eq!(store.commits.load(Ordering::SeqCst), 4);
    assert!(store.inner.get_vote(&asset("a-1"), &UserId::new("alice")).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_snapshot_reads_time_out() {
    let config = EngineConfig {
        max_retries: 2,
        attempt_timeout: Duration::from_secs(1),
        ..test_config()
    };
    let (store, engine) = seeded_engine(&["a-1"], config).await;
    store.slow_reads.store(true, Ordering::SeqCst);

    let result = engine.apply_vote(&alice(), "asset", "a-1", 1).await;

    assert!(matches!(result, Err(VoteError::StoreUnavailable(_))));
    assert_eq!(store.snapshot_reads.load(Ordering::SeqCst), 3);
    assert_eq!(store.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_store_failure_is_not_retried() {
    let (store, engine) = seeded_engine(&["a-1"], test_config()).await;
    store.broken.store(true, Ordering::SeqCst);

    let result = engine.apply_vote(&alice(), "asset", "a-1", 1).await;

    assert!(matches!(result, Err(VoteError::StoreUnavailable(_))));
    assert_eq!(store.calls(), 1);
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_anonymous_reads_default_to_zero() {
    let (store, engine) = seeded_engine(&["a-1"], test_config()).await;
    engine.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();
    let calls = store.calls();

    assert_eq!(engine.get_user_vote(&Caller::Anonymous, "asset", "a-1").await, Ok(0));
    let batch = engine
        .get_user_votes(&Caller::Anonymous, "asset", &["a-1".to_string(), "a-2".to_string()])
        .await
        .unwrap();
    assert_eq!(batch.get("a-1"), Some(&0));
    assert_eq!(batch.get("a-2"), Some(&0));
    assert_eq!(store.calls(), calls);
}

#[tokio::test]
async fn test_user_votes_batch() {
    let (_, engine) = seeded_engine(&["a-1", "a-2", "a-3"], test_config()).await;
    engine.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();
    engine.apply_vote(&alice(), "asset", "a-3", -1).await.unwrap();

    let ids: Vec<String> = ["a-1", "a-2", "a-3"].iter().map(|s| s.to_string()).collect();
    let votes = engine.get_user_votes(&alice(), "asset", &ids).await.unwrap();

    assert_eq!(votes.len(), 3);
    assert_eq!(votes["a-1"], 1);
    assert_eq!(votes["a-2"], 0);
    assert_eq!(votes["a-3"], -1);
}

#[tokio::test]
async fn test_total_votes_of_missing_item() {
    let (_, engine) = seeded_engine(&[], test_config()).await;

    assert!(matches!(
        engine.get_total_votes("asset", "ghost").await,
        Err(VoteError::ItemNotFound { .. })
    ));
    assert_eq!(
        engine.get_vote_counts("asset", "ghost").await.unwrap(),
        VoteCounts::new(0, 0)
    );
}

#[tokio::test]
async fn test_get_aggregates_keeps_request_order() {
    let (_, engine) = seeded_engine(&["a-1", "a-2"], test_config()).await;
    engine.apply_vote(&alice(), "asset", "a-2", 1).await.unwrap();

    let ids = vec!["a-2".to_string(), "missing".to_string(), "a-1".to_string()];
    let aggregates = engine.get_aggregates("asset", &ids).await.unwrap();

    assert_eq!(aggregates.len(), 2);
    assert_eq!(aggregates[0].item.id, "a-2");
    assert_eq!(aggregates[0].net_votes, 1);
    assert_eq!(aggregates[1].item.id, "a-1");
}

#[tokio::test]
async fn test_committed_aggregates_reach_the_feed() {
    let (_, engine) = seeded_engine(&["a-1"], test_config()).await;
    let mut feed = engine.aggregate_feed();

    engine.apply_vote(&alice(), "asset", "a-1", -1).await.unwrap();

    let aggregate = feed.recv().await.unwrap();
    assert_eq!(aggregate.item, asset("a-1"));
    assert_eq!(aggregate.net_votes, -1);
}

#[tokio::test]
async fn test_engines_are_isolated() {
    let config = EngineConfig {
        rate_limit_max: 1,
        ..test_config()
    };
    let store = Arc::new(TestStore::default());
    store.inner.create_item(&asset("a-1"), chrono::DateTime::UNIX_EPOCH).await.unwrap();
    let first = engine_with(store.clone(), config.clone());
    let second = engine_with(store, config);

    first.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();
    assert_eq!(
        first.apply_vote(&alice(), "asset", "a-1", 1).await,
        Err(VoteError::RateLimitExceeded)
    );
    second.apply_vote(&alice(), "asset", "a-1", 1).await.unwrap();
}

#[tokio::test]
async fn test_register_item_is_idempotent() {
    let (_, engine) = seeded_engine(&[], test_config()).await;

    engine.register_item("note", "n-1").await.unwrap();
    engine.apply_vote(&alice(), "note", "n-1", 1).await.unwrap();
    engine.register_item("note", "n-1").await.unwrap();

    assert_eq!(engine.get_total_votes("note", "n-1").await.unwrap(), 1);
    assert_eq!(
        engine.register_item("video", "v-1").await,
        Err(VoteError::InvalidItemType("video".to_string()))
    );
}
