mod common;

use std::time::Duration;

use common::*;
use crewline_core::{
    Actor, GuardRejected, TransitionAux, TransitionRequest, WorkState,
};
use crewline_storage::Storage;
use crewline_work::{AssignRequest, EngineConfig, TransitionEngine, TransitionError, Workflow};

#[tokio::test]
async fn test_unlisted_transition_is_rejected_and_state_kept() {
    let h = Harness::new().await;
    let unit = h.open_unit(5).await;

    // crew cannot jump straight to accepted
    let err = h
        .workflow
        .advance(unit.id, None, WorkState::Accepted, Actor::crew("a"), TransitionAux::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::Guard(GuardRejected::NotPermitted {
            from: WorkState::Open,
            to: WorkState::Accepted,
            ..
        })
    ));
    assert_eq!(h.unit(unit.id).await.state, WorkState::Open);
    // rejected before reaching the store
    assert_eq!(h.storage.unit_updates.calls(), 1);
}

#[tokio::test]
async fn test_rejection_skips_the_store() {
    let h = Harness::new().await;
    let unit = h.open_unit(5).await;
    let before = h.storage.unit_updates.calls();

    let request = TransitionRequest::new(unit.id, WorkState::Completed, WorkState::Confirmed, Actor::manager("m1"));
    let err = h.workflow.transition(request).await.unwrap_err();
    assert!(matches!(err, TransitionError::Guard(GuardRejected::MissingManagerReport)));
    assert_eq!(h.storage.unit_updates.calls(), before);
}

#[tokio::test]
async fn test_advance_detects_stale_view() {
    let h = Harness::new().await;
    let unit = h.open_unit(5).await;

    let err = h
        .workflow
        .advance(unit.id, Some(WorkState::Draft), WorkState::Open, owner(), TransitionAux::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::Guard(GuardRejected::StaleState {
            expected: WorkState::Draft,
            actual: WorkState::Open,
        })
    ));
}

#[tokio::test]
async fn test_missing_unit_is_not_found() {
    let h = Harness::new().await;
    let id = crewline_core::WorkUnitId::new();
    let request = TransitionRequest::new(id, WorkState::Draft, WorkState::Open, owner());
    let err = h.workflow.transition(request).await.unwrap_err();
    assert!(matches!(err, TransitionError::NotFound(missing) if missing == id));
}

#[tokio::test]
async fn test_crew_reject_returns_unit_to_open_without_rejecter() {
    let h = Harness::new().await;
    let unit = h.open_unit(5).await;
    h.workflow
        .assign(AssignRequest::append(unit.id, vec!["a".into(), "b".into()]), &manager())
        .await
        .unwrap();

    let unit = h
        .workflow
        .advance(unit.id, Some(WorkState::Assigned), WorkState::Open, Actor::crew("a"), TransitionAux::default())
        .await
        .unwrap();
    assert_eq!(unit.state, WorkState::Open);
    assert_eq!(unit.assigned_crew_ids, vec!["b".into()]);
}

#[tokio::test]
async fn test_accept_records_acting_crew_and_notifies_managers() {
    let h = Harness::new().await;
    let unit = h.open_unit(5).await;
    h.workflow
        .assign(AssignRequest::append(unit.id, vec!["a".into(), "b".into()]), &manager())
        .await
        .unwrap();
    h.channel.clear();

    let unit = h
        .workflow
        .advance(unit.id, None, WorkState::Accepted, Actor::crew("b"), TransitionAux::default())
        .await
        .unwrap();
    assert_eq!(unit.accepted_crew_ids, vec!["b".into()]);
    assert_eq!(h.channel.recipients(), vec!["ext-m1", "ext-m2"]);
}

#[tokio::test]
async fn test_confirm_with_blank_report_keeps_completed() {
    let h = Harness::new().await;
    let unit = h.open_unit(5).await;
    h.workflow
        .assign(AssignRequest::append(unit.id, vec!["a".into()]), &manager())
        .await
        .unwrap();
    for (to, actor) in [
        (WorkState::Accepted, Actor::crew("a")),
        (WorkState::InProgress, Actor::crew("a")),
        (WorkState::Completed, Actor::crew("a")),
    ] {
        h.workflow
            .advance(unit.id, None, to, actor, TransitionAux::default())
            .await
            .unwrap();
    }
    assert!(h.unit(unit.id).await.completed_at.is_some());

    let err = h
        .workflow
        .advance(unit.id, None, WorkState::Confirmed, manager(), TransitionAux::report("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Guard(GuardRejected::MissingManagerReport)));
    assert_eq!(h.unit(unit.id).await.state, WorkState::Completed);

    h.channel.clear();
    let confirmed = h
        .workflow
        .advance(unit.id, None, WorkState::Confirmed, manager(), TransitionAux::report("spotless"))
        .await
        .unwrap();
    assert_eq!(confirmed.state, WorkState::Confirmed);
    assert!(confirmed.confirmed_at.is_some());
    assert_eq!(confirmed.manager_report.as_deref(), Some("spotless"));
    assert_eq!(h.channel.recipients(), vec!["ext-owner"]);
    assert!(h.channel.messages()[0].contains("spotless"));
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_transition() {
    let h = Harness::with_channel(RecordingChannel {
        fail_for: vec!["ext-a".to_string()],
        ..Default::default()
    })
    .await;
    let unit = h.open_unit(5).await;

    let outcome = h
        .workflow
        .assign(AssignRequest::append(unit.id, vec!["a".into(), "b".into()]), &manager())
        .await
        .unwrap();
    assert_eq!(outcome.unit.state, WorkState::Assigned);
    assert_eq!(h.channel.recipients(), vec!["ext-b"]);
}

#[tokio::test]
async fn test_persistence_failure_surfaces() {
    let h = Harness::new().await;
    let unit = h.open_unit(5).await;
    h.storage.unit_updates.arm(0);

    let err = h
        .workflow
        .assign(AssignRequest::append(unit.id, vec!["a".into()]), &manager())
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Persistence(_)));
    assert_eq!(h.unit(unit.id).await.state, WorkState::Open);
    // rows written before the failed update were unwound
    assert!(h.workflow.assignments(unit.id).await.unwrap().is_empty());
    assert!(h.channel.recipients().is_empty());
}

#[tokio::test]
async fn test_detached_dispatch_delivers_eventually() {
    let storage = std::sync::Arc::new(FlakyStorage::default());
    let property = crewline_core::Property::new(
        crewline_core::PropertyId::new(PROPERTY),
        "Seaside Loft",
        "owner".into(),
    )
    .with_managers(vec!["m1".into()]);
    storage.save_property(&property).await.unwrap();

    let channel = std::sync::Arc::new(RecordingChannel::default());
    let resolver = crewline_notify::DirectoryResolver::new().link("a", "ext-a");
    let dispatcher = crewline_notify::Dispatcher::new(
        storage.clone(),
        std::sync::Arc::new(resolver),
        channel.clone(),
    );
    let engine = TransitionEngine::new(storage.clone())
        .with_dispatcher(std::sync::Arc::new(dispatcher))
        .with_config(EngineConfig {
            detached_dispatch: true,
        });
    let workflow = Workflow::with_engine(storage.clone(), engine);

    let entry = workflow.create_booking(&owner(), stay(&[5])).await.unwrap();
    let unit = workflow.work_units_for_booking(entry.id).await.unwrap().remove(0);
    workflow
        .advance(unit.id, None, WorkState::Open, owner(), TransitionAux::default())
        .await
        .unwrap();
    workflow
        .assign(AssignRequest::append(unit.id, vec!["a".into()]), &manager())
        .await
        .unwrap();

    for _ in 0..100 {
        if !channel.recipients().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(channel.recipients(), vec!["ext-a"]);
}

#[tokio::test]
async fn test_crew_cannot_move_a_unit_they_are_not_on() {
    let h = Harness::new().await;
    let unit = h.open_unit(5).await;
    h.workflow
        .assign(AssignRequest::append(unit.id, vec!["a".into()]), &manager())
        .await
        .unwrap();
    let updates = h.storage.unit_updates.calls();

    for to in [WorkState::Accepted, WorkState::Open] {
        let err = h
            .workflow
            .advance(unit.id, Some(WorkState::Assigned), to, Actor::crew("zed"), TransitionAux::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Guard(GuardRejected::NotAssigned { ref user }) if user.as_str() == "zed"
        ));
    }

    let unit = h.unit(unit.id).await;
    assert_eq!(unit.state, WorkState::Assigned);
    assert!(unit.accepted_crew_ids.is_empty());
    assert_eq!(h.storage.unit_updates.calls(), updates);
}
