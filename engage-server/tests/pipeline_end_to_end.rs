// End-to-end: sync → refresh → select → enqueue → decide, against fakes

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use engage_server::db::repositories::{PoolRepository, ReviewRepository, TargetRepository};
use engage_server::pacing::Pacer;
use engage_server::pipeline::{Pipeline, RunOptions};
use engage_server::review::{ReviewMachine, ReviewOutcome};
use engage_types::{Disposition, ReviewStatus, UnparsedTimestampPolicy};

use common::{memory_db, EchoGenerator, RecordingNotifier, RecordingPublisher, ScriptedSource};

fn options() -> RunOptions {
    RunOptions {
        search_url: "https://www.linkedin.com/sales/search/people?savedSearchId=1".to_string(),
        max_people: 50,
        lookback_days: 30,
        posts_limit: 20,
        budget: 10,
        unparsed: UnparsedTimestampPolicy::Drop,
    }
}

fn source() -> ScriptedSource {
    let now = Utc::now();
    let recent = |days: i64| (now - Duration::days(days)).to_rfc3339();
    ScriptedSource {
        people: vec![
            json!({
                "name": "Ada Lovelace",
                "profile_url": "https://www.linkedin.com/sales/lead/ACwADA000001,NAME_SEARCH,aa"
            }),
            json!({
                "full_name": "Grace Hopper",
                "profileUrl": "https://www.linkedin.com/sales/lead/ACwGRACE00001,NAME_SEARCH,bb"
            }),
        ],
        resolutions: [
            ("ACwADA000001".to_string(), "ACoADA".to_string()),
            ("ACwGRACE00001".to_string(), "ACoGRACE".to_string()),
        ]
        .into_iter()
        .collect(),
        feeds: [
            (
                "ACoADA".to_string(),
                vec![
                    json!({ "social_id": "urn:li:activity:ada-new", "text": "Notes on engines", "parsed_datetime": recent(2) }),
                    json!({ "social_id": "urn:li:activity:ada-old", "text": "Old news", "parsed_datetime": recent(90) }),
                ],
            ),
            (
                "ACoGRACE".to_string(),
                vec![
                    json!({ "id": "urn:li:activity:grace-new", "text": "Compilers!", "date": "3d" }),
                    json!({ "id": "urn:li:activity:grace-old", "text": "Bugs", "date": "6mo" }),
                ],
            ),
        ]
        .into_iter()
        .collect(),
    }
}

#[tokio::test]
async fn test_two_targets_flow_to_one_comment_and_one_skip() {
    let db = memory_db();
    let notifier = Arc::new(RecordingNotifier::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let pipeline = Pipeline::new(
        &db,
        Arc::new(source()),
        Arc::new(EchoGenerator),
        notifier.clone(),
        Pacer::disabled(),
    );
    let options = options();

    let sync = pipeline.sync(&options).await.unwrap();
    assert_eq!(sync.upserted, 2);
    assert_eq!(sync.resolved, 2);

    let now = Utc::now();
    let refresh = pipeline.refresh(&options, now).await.unwrap();
    assert_eq!(refresh.upserted, 2);
    assert_eq!(refresh.out_of_window, 2);

    let mut rng = StdRng::seed_from_u64(42);
    let selected = pipeline.select(&options, now, &mut rng).unwrap();
    let mut ids: Vec<String> = selected.iter().map(|c| c.entry.social_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, ["urn:li:activity:ada-new", "urn:li:activity:grace-new"]);

    let enqueued = pipeline.enqueue(selected).await.unwrap();
    assert_eq!(enqueued.enqueued, 2);

    let reviews = ReviewRepository::new(db.pool.clone());
    let pending = reviews.list_pending().unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|r| r.status == ReviewStatus::Pending));
    assert!(pending.iter().all(|r| r.message_ref.is_some()));
    let ada = reviews.get_pending("urn:li:activity:ada-new").unwrap().unwrap();
    assert_eq!(ada.profile_name, "Ada Lovelace");
    assert_eq!(ada.generated_text, "Ada Lovelace: loved \"Notes on engines\"");

    // Nothing queued is eligible again
    assert!(pipeline.select(&options, now, &mut rng).unwrap().is_empty());

    let machine = ReviewMachine::new(
        reviews.clone(),
        publisher.clone(),
        notifier.clone(),
        Pacer::disabled(),
        false,
    );
    assert_eq!(
        machine.skip("urn:li:activity:grace-new", None).await.unwrap(),
        ReviewOutcome::Skipped
    );
    assert_eq!(
        machine.approve("urn:li:activity:ada-new", None).await.unwrap(),
        ReviewOutcome::Posted { edited: false }
    );

    assert_eq!(reviews.count_comments().unwrap(), 1);
    assert_eq!(reviews.count_handled(Disposition::Skipped).unwrap(), 1);
    assert_eq!(reviews.count_pending().unwrap(), 0);
    assert_eq!(
        publisher.calls(),
        vec![(
            "urn:li:activity:ada-new".to_string(),
            "Ada Lovelace: loved \"Notes on engines\"".to_string()
        )]
    );
    assert_eq!(notifier.closed.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_rerunning_sync_and_refresh_is_stable() {
    let db = memory_db();
    let pipeline = Pipeline::new(
        &db,
        Arc::new(source()),
        Arc::new(EchoGenerator),
        Arc::new(RecordingNotifier::default()),
        Pacer::disabled(),
    );
    let options = options();

    for _ in 0..2 {
        pipeline.sync(&options).await.unwrap();
        pipeline.refresh(&options, Utc::now()).await.unwrap();
    }

    let targets = TargetRepository::new(db.pool.clone());
    assert_eq!(targets.count().unwrap(), 2);
    assert_eq!(targets.list_resolved().unwrap().len(), 2);
    assert_eq!(PoolRepository::new(db.pool.clone()).count().unwrap(), 2);
}

#[tokio::test]
async fn test_dry_run_records_without_publishing() {
    let db = memory_db();
    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = Pipeline::new(
        &db,
        Arc::new(source()),
        Arc::new(EchoGenerator),
        notifier.clone(),
        Pacer::disabled(),
    );
    let report = pipeline.run(&options()).await.unwrap();
    assert_eq!(report.enqueue.enqueued, 2);

    let publisher = Arc::new(RecordingPublisher::default());
    let reviews = ReviewRepository::new(db.pool.clone());
    let machine = ReviewMachine::new(reviews.clone(), publisher.clone(), notifier, Pacer::disabled(), true);

    let outcome = machine.approve("urn:li:activity:ada-new", None).await.unwrap();
    assert_eq!(outcome, ReviewOutcome::Posted { edited: false });
    assert!(publisher.calls().is_empty());
    assert!(reviews.get_comment("urn:li:activity:ada-new").unwrap().is_some());
    assert!(reviews.get_pending("urn:li:activity:ada-new").unwrap().is_none());
}
