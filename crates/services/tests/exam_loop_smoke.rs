use std::time::Duration;

use chrono::Duration as ChronoDuration;

use exam_core::allocation::TopicCounts;
use exam_core::fixtures::{question, result_with_scores};
use exam_core::model::{ExamKind, SessionStatus, Topic, UserId};
use exam_core::priority::DEFAULT_WEAK_THRESHOLD;
use exam_core::time::{fixed_clock, fixed_now};
use services::{AppServices, EngineConfig, ExamLoopError, ExamLoopService, ProgressError};
use storage::repository::{QuestionStore, ResultRepository, SessionSnapshotRepository, Storage};

async fn seed(questions: &dyn QuestionStore, per_topic: u64) {
    let mut id = 1;
    for topic in Topic::ALL {
        for _ in 0..per_topic {
            questions.upsert_question(&question(id, topic)).await.unwrap();
            id += 1;
        }
    }
}

async fn answer_everything(exam_loop: &ExamLoopService, id: exam_core::model::SessionId) {
    let engine = exam_loop.engine();
    while let Some(q) = engine.current_question(id) {
        engine.submit_answer(id, q.id(), q.correct_answer()).unwrap();
    }
}

#[tokio::test]
async fn stalled_topic_is_prioritised_and_drives_allocation() {
    let app = AppServices::in_memory(EngineConfig::default(), fixed_clock());
    seed(app.questions().as_ref(), 40).await;
    let learner = UserId::new(42);

    let history = [
        (3, [65, 58, 70, 72, 68]),
        (2, [80, 60, 84, 85, 82]),
        (1, [92, 59, 93, 95, 91]),
    ];
    for (days_ago, [lakehouse, incremental, elt, pipelines, governance]) in history {
        let result = result_with_scores(
            learner,
            fixed_now() - ChronoDuration::days(days_ago),
            &[
                (Topic::LakehousePlatform, lakehouse),
                (Topic::EltWithSparkSql, elt),
                (Topic::IncrementalDataProcessing, incremental),
                (Topic::ProductionPipelines, pipelines),
                (Topic::DataGovernance, governance),
            ],
            60,
        );
        app.progress().record_result(&result).await.unwrap();
    }

    let priorities = app
        .progress()
        .prioritize(learner, DEFAULT_WEAK_THRESHOLD)
        .await
        .unwrap();
    let top = &priorities[0];
    assert_eq!(top.topic, Topic::IncrementalDataProcessing);
    assert!(top.priority >= 4);
    assert!(top.recommended_action.contains("fundamentals"));
    assert!(!top.recommended_action.contains("Maintain"));
    assert!(priorities[1..].iter().all(|p| p.priority < top.priority));

    let exam_loop = app.exam_loop();
    let session = exam_loop
        .start_exam(learner, ExamKind::Practice)
        .await
        .unwrap();
    assert_eq!(session.questions().len(), 60);
    let incremental = session
        .questions()
        .iter()
        .filter(|q| q.topic() == Topic::IncrementalDataProcessing)
        .count();
    assert_eq!(incremental, 36);

    answer_everything(&exam_loop, session.id()).await;
    let outcome = exam_loop.finish_exam(session.id()).await.unwrap();
    assert_eq!(outcome.result.correct_answers, 60);
    assert!(outcome.report.passed);
    assert_eq!(outcome.report.feedback.len(), 60);
    assert_eq!(outcome.immediate.percentage, 100.0);
    assert!(!app.engine().contains(session.id()));

    let history = app.progress().history(learner).await.unwrap();
    assert_eq!(history.aggregates().exam_count, 4);
}

#[tokio::test]
async fn unfinished_session_cannot_be_closed_out() {
    let app = AppServices::in_memory(EngineConfig::default(), fixed_clock());
    seed(app.questions().as_ref(), 15).await;
    let exam_loop = app.exam_loop();
    let learner = UserId::new(7);

    let session = exam_loop
        .start_exam(learner, ExamKind::Practice)
        .await
        .unwrap();
    assert_eq!(session.questions().len(), 60);

    let err = exam_loop.finish_exam(session.id()).await.unwrap_err();
    assert!(matches!(err, ExamLoopError::SessionNotFinished(id) if id == session.id()));

    assert!(app.engine().complete_early(session.id()));
    let outcome = exam_loop.finish_exam(session.id()).await.unwrap();
    assert_eq!(outcome.result.correct_answers, 0);
    assert_eq!(outcome.result.responses.len(), 60);
    assert!(!outcome.immediate.passed);
}

#[tokio::test]
async fn empty_bank_is_reported() {
    let app = AppServices::in_memory(EngineConfig::default(), fixed_clock());
    let err = app
        .exam_loop()
        .start_exam(UserId::new(1), ExamKind::Practice)
        .await
        .unwrap_err();
    assert!(matches!(err, ExamLoopError::NoQuestions));
}

#[tokio::test]
async fn assessment_follows_its_distribution() {
    let app = AppServices::in_memory(EngineConfig::default(), fixed_clock());
    seed(app.questions().as_ref(), 20).await;
    let exam_loop = app.exam_loop();
    let learner = UserId::new(9);

    let session = exam_loop.start_assessment(learner, 40, None).await.unwrap();
    assert_eq!(session.kind(), ExamKind::Assessment);
    assert_eq!(session.questions().len(), 40);
    let elt = session
        .questions()
        .iter()
        .filter(|q| q.topic() == Topic::EltWithSparkSql)
        .count();
    assert_eq!(elt, 10);

    let custom: TopicCounts = Topic::ALL.iter().map(|&t| (t, 3)).collect();
    let err = exam_loop
        .start_assessment(learner, 20, Some(&custom))
        .await
        .unwrap_err();
    assert!(matches!(err, ExamLoopError::Progress(ProgressError::Assessment(_))));

    let session = exam_loop
        .start_assessment(learner, 15, Some(&custom))
        .await
        .unwrap();
    assert_eq!(session.questions().len(), 15);
}

#[tokio::test(start_paused = true)]
async fn autosaved_sessions_survive_a_restart() {
    let storage = Storage::in_memory();
    seed(storage.questions.as_ref(), 12).await;
    let learner = UserId::new(5);

    let before = AppServices::from_storage(
        storage.clone(),
        EngineConfig::default(),
        fixed_clock(),
        None,
    );
    let session = before
        .exam_loop()
        .start_exam(learner, ExamKind::Practice)
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    drop(before);

    let after = AppServices::from_storage(storage, EngineConfig::default(), fixed_clock(), None);
    let recovered = after.exam_loop().recover_sessions(learner).await.unwrap();
    assert_eq!(recovered, vec![session.id()]);

    let view = after.engine().view(session.id()).unwrap();
    assert_eq!(view.status, SessionStatus::Paused);
    assert_eq!(view.remaining_secs, 5400 - 30);
    assert!(after.engine().resume(session.id()));
}

#[tokio::test(start_paused = true)]
async fn recorded_session_snapshot_is_dropped_on_recovery() {
    let storage = Storage::in_memory();
    seed(storage.questions.as_ref(), 12).await;
    let learner = UserId::new(11);

    let before = AppServices::from_storage(
        storage.clone(),
        EngineConfig::default(),
        fixed_clock(),
        None,
    );
    let session = before
        .exam_loop()
        .start_exam(learner, ExamKind::Practice)
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert!(before.engine().complete_early(session.id()));
    let result = before.engine().result(session.id()).unwrap();
    // Crash after the result is stored but before the snapshot is removed.
    before.progress().record_result(&result).await.unwrap();
    drop(before);
    assert!(
        storage
            .snapshots
            .load_snapshot(session.id())
            .await
            .unwrap()
            .is_some()
    );

    for _ in 0..2 {
        let after = AppServices::from_storage(
            storage.clone(),
            EngineConfig::default(),
            fixed_clock(),
            None,
        );
        let recovered = after.exam_loop().recover_sessions(learner).await.unwrap();
        assert!(recovered.is_empty());
        assert!(!after.engine().contains(session.id()));
    }
    assert!(
        storage
            .snapshots
            .load_snapshot(session.id())
            .await
            .unwrap()
            .is_none()
    );
    let history = storage.results.query_by_user(learner).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn finishing_an_already_recorded_session_succeeds() {
    let app = AppServices::in_memory(EngineConfig::default(), fixed_clock());
    seed(app.questions().as_ref(), 12).await;
    let learner = UserId::new(12);
    let exam_loop = app.exam_loop();

    let session = exam_loop
        .start_exam(learner, ExamKind::Practice)
        .await
        .unwrap();
    answer_everything(&exam_loop, session.id()).await;
    let result = app.engine().result(session.id()).unwrap();
    app.progress().record_result(&result).await.unwrap();

    let outcome = exam_loop.finish_exam(session.id()).await.unwrap();
    assert_eq!(outcome.result, result);
    assert!(!app.engine().contains(session.id()));
    let history = app.progress().history(learner).await.unwrap();
    assert_eq!(history.aggregates().exam_count, 1);
}
