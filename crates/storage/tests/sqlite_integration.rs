use std::time::Duration;

use exam_core::fixtures::{question, uniform_result};
use exam_core::model::{Difficulty, ExamKind, ExamSession, QuestionDraft, SessionId, Topic, UserId};
use exam_core::time::fixed_now;
use storage::repository::{
    QuestionFilter, QuestionStore, ResultRepository, SessionSnapshotRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrips_questions_and_filters() {
    let repo = connect("memdb_questions").await;

    for id in 1..=4 {
        repo.upsert_question(&question(id, Topic::IncrementalDataProcessing))
            .await
            .unwrap();
    }
    let hard = QuestionDraft {
        difficulty: "hard".into(),
        code_sample: Some("spark.readStream.format(\"cloudFiles\")".into()),
        tags: vec!["auto_loader".into()],
        ..question(5, Topic::IncrementalDataProcessing).to_draft()
    }
    .validate(exam_core::model::QuestionId::new(5))
    .unwrap();
    repo.upsert_question(&hard).await.unwrap();
    repo.upsert_question(&question(6, Topic::DataGovernance))
        .await
        .unwrap();

    let fetched = repo.get_question(hard.id()).await.unwrap();
    assert_eq!(fetched, hard);

    let limited = repo
        .find_by_topic(Topic::IncrementalDataProcessing, 3)
        .await
        .unwrap();
    assert_eq!(limited.len(), 3);
    assert_eq!(limited[0].id().value(), 1);

    let filter = QuestionFilter::for_topic(Topic::IncrementalDataProcessing)
        .with_difficulty(Difficulty::Hard);
    assert_eq!(repo.count(&filter).await.unwrap(), 1);
    let tagged = QuestionFilter::all().with_tag("auto_loader");
    assert_eq!(repo.find_all(&tagged).await.unwrap(), vec![hard]);
    assert_eq!(repo.count(&QuestionFilter::all()).await.unwrap(), 6);

    assert!(matches!(
        repo.get_question(exam_core::model::QuestionId::new(99)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_upsert_replaces_question_content() {
    let repo = connect("memdb_upsert").await;
    let original = question(1, Topic::LakehousePlatform);
    repo.upsert_question(&original).await.unwrap();

    let mut draft = original.to_draft();
    draft.prompt = "Which layer stores raw ingested data?".into();
    let updated = original.updated(draft).unwrap();
    repo.upsert_question(&updated).await.unwrap();

    let fetched = repo.get_question(original.id()).await.unwrap();
    assert_eq!(fetched.prompt(), "Which layer stores raw ingested data?");
    assert_eq!(repo.count(&QuestionFilter::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn sqlite_results_are_append_only_and_ordered() {
    let repo = connect("memdb_results").await;
    let user = UserId::new(3);
    let t0 = fixed_now();

    let later = uniform_result(user, t0 + chrono::Duration::days(2), 80);
    let earlier = uniform_result(user, t0, 60);
    repo.store_result(&later).await.unwrap();
    repo.store_result(&earlier).await.unwrap();
    assert!(matches!(
        repo.store_result(&later).await,
        Err(StorageError::Conflict)
    ));

    let results = repo.query_by_user(user).await.unwrap();
    assert_eq!(results, vec![earlier, later]);
    assert!(repo.query_by_user(UserId::new(4)).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_snapshots_replace_and_delete() {
    let repo = connect("memdb_snapshots").await;
    let mut session = ExamSession::new(
        SessionId::generate(),
        UserId::new(1),
        ExamKind::Assessment,
        vec![
            question(1, Topic::ProductionPipelines),
            question(2, Topic::ProductionPipelines),
        ],
        fixed_now(),
        Duration::from_secs(600),
    )
    .unwrap();
    repo.save_snapshot(&session).await.unwrap();

    session
        .submit_answer(exam_core::model::QuestionId::new(1), 0, 42, fixed_now())
        .unwrap();
    session.consume(Duration::from_secs(42));
    repo.save_snapshot(&session).await.unwrap();

    let loaded = repo.load_snapshot(session.id()).await.unwrap().unwrap();
    assert_eq!(loaded, session);
    assert_eq!(loaded.position(), 1);
    assert_eq!(repo.list_snapshots(UserId::new(1)).await.unwrap().len(), 1);

    repo.delete_snapshot(session.id()).await.unwrap();
    assert!(repo.load_snapshot(session.id()).await.unwrap().is_none());
}
