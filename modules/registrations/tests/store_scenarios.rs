//! Behaviour of the registration store against a probing in-memory document store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use registrations::contract::error::RegistrationsError;
use registrations::contract::model::{
    AttendanceSummary, Principal, RefreshOutcome, RegisterOutcome, Resync, Role,
};
use registrations::domain::error::DomainError;
use registrations::domain::events::RegistrationEvent;
use registrations::domain::policy::SyncPolicy;
use registrations::domain::service::ServiceConfig;
use registrations::SessionIdentityProvider;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

#[tokio::test]
async fn scenario_a_student_registers() {
    let h = harness_with(student("u1"), ServiceConfig::default());

    let outcome = h.service.register_for_event("e1").await.unwrap();
    assert_eq!(
        outcome,
        RegisterOutcome::Registered {
            registration_id: "u1-e1".into()
        }
    );

    let snap = h.service.snapshot();
    let mine = snap.user_registrations();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, "u1-e1");
    assert_eq!(mine[0].user_id, "u1");
    assert_eq!(mine[0].event_id, "e1");
    assert!(!mine[0].checked_in);
    assert!(mine[0].checked_in_at.is_none());
    assert!(h.service.is_user_registered("e1"));
    assert!(!h.service.is_user_registered("e2"));
}

#[tokio::test]
async fn scenario_b_second_registration_is_a_no_op() {
    let h = harness_with(student("u1"), ServiceConfig::default());
    h.service.register_for_event("e1").await.unwrap();
    let writes = h.store.writes();

    let again = h.service.register_for_event("e1").await.unwrap();
    assert_eq!(
        again,
        RegisterOutcome::AlreadyRegistered {
            registration_id: "u1-e1".into()
        }
    );
    assert_eq!(h.store.writes(), writes, "no write for a known registration");

    let snap = h.service.snapshot();
    assert_eq!(
        snap.registrations
            .iter()
            .filter(|r| r.id == "u1-e1")
            .count(),
        1
    );
    assert_eq!(h.store.raw_all().await.len(), 1);
}

#[tokio::test]
async fn scenario_c_organizer_check_in_refreshes_everything() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    store.seed("u2-e1", registration_doc("u2", "e1")).await;
    let h = harness_on(store, organizer("org1"), ServiceConfig::default());
    h.service.refresh().await.unwrap();
    let reads = h.store.reads();

    let outcome = h.service.mark_attendance("u1-e1").await.unwrap();
    assert_eq!(outcome.resync, Resync::FullRefresh);
    assert_eq!(h.store.reads(), reads + 1, "a full refetch was issued");

    let all = h.service.snapshot().all_registrations();
    assert_eq!(all.len(), 2);
    let checked = all.iter().find(|r| r.id == "u1-e1").unwrap();
    assert!(checked.checked_in);
    assert_eq!(checked.checked_in_at, Some(outcome.checked_in_at));
    assert!(!all.iter().find(|r| r.id == "u2-e1").unwrap().checked_in);
}

#[tokio::test]
async fn scenario_d_student_check_in_patches_locally() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    let h = harness_on(store, student("u1"), ServiceConfig::default());
    h.service.refresh().await.unwrap();
    let reads = h.store.reads();

    let outcome = h.service.mark_attendance("u1-e1").await.unwrap();
    assert_eq!(outcome.resync, Resync::LocalPatch);
    assert_eq!(h.store.reads(), reads, "no refetch on the local patch path");

    let mine = h.service.snapshot().user_registrations();
    assert!(mine[0].checked_in);
    assert_eq!(mine[0].checked_in_at, Some(outcome.checked_in_at));
}

#[tokio::test]
async fn scenario_e_anonymous_registration_is_rejected() {
    let h = harness_with(SessionIdentityProvider::anonymous(), ServiceConfig::default());

    let err = h.service.register_for_event("e1").await.unwrap_err();
    assert!(matches!(err, DomainError::Unauthenticated { .. }));
    assert_eq!(
        RegistrationsError::from(err),
        RegistrationsError::unauthenticated("register_for_event")
    );
    assert_eq!(h.store.writes(), 0);
    assert!(h.service.snapshot().registrations.is_empty());
}

#[tokio::test]
async fn scenario_f_failed_refresh_keeps_previous_set() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    let h = harness_on(store, student("u1"), ServiceConfig::default());
    assert_eq!(
        h.service.refresh().await.unwrap(),
        RefreshOutcome::Loaded { count: 1 }
    );

    h.store.set_fail_reads(true);
    let err = h.service.refresh().await.unwrap_err();
    assert!(matches!(err, DomainError::Fetch { .. }));

    let snap = h.service.snapshot();
    assert!(!snap.loading());
    assert_eq!(snap.pending_fetches, 0);
    assert_eq!(snap.registrations.len(), 1);
}

#[tokio::test]
async fn student_sees_only_own_records() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    store.seed("u1-e2", registration_doc("u1", "e2")).await;
    store.seed("u2-e1", registration_doc("u2", "e1")).await;
    let h = harness_on(store, student("u1"), ServiceConfig::default());

    h.service.refresh().await.unwrap();
    let snap = h.service.snapshot();
    assert_eq!(snap.registrations.len(), 2);
    assert!(snap.registrations.iter().all(|r| r.user_id == "u1"));
    assert_eq!(snap.user_registrations(), snap.registrations);
    assert!(snap.all_registrations().is_empty());
}

#[tokio::test]
async fn organizer_sees_everything() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    store.seed("u2-e1", registration_doc("u2", "e1")).await;
    let h = harness_on(store, organizer("org1"), ServiceConfig::default());

    h.service.refresh().await.unwrap();
    let snap = h.service.snapshot();
    assert_eq!(snap.all_registrations(), snap.registrations);
    assert_eq!(snap.registrations.len(), 2);
    assert_eq!(
        snap.attendance_summary("e1"),
        AttendanceSummary {
            registered: 2,
            checked_in: 0
        }
    );
}

#[tokio::test]
async fn other_roles_and_anonymous_see_nothing() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    let staff = SessionIdentityProvider::signed_in(Principal::new(
        "s1",
        Some(Role::Other("staff".into())),
    ));
    let h = harness_on(store, staff, ServiceConfig::default());

    assert_eq!(h.service.refresh().await.unwrap(), RefreshOutcome::Cleared);
    assert_eq!(h.store.reads(), 0, "no fetch without a visible scope");
    assert!(h.service.snapshot().all_registrations().is_empty());

    h.identity.sign_out();
    assert_eq!(h.service.refresh().await.unwrap(), RefreshOutcome::Cleared);
}

#[tokio::test]
async fn pending_identity_skips_refresh_and_reports_loading() {
    let h = harness_with(SessionIdentityProvider::pending(), ServiceConfig::default());

    assert!(h.service.snapshot().loading());
    assert_eq!(h.service.refresh().await.unwrap(), RefreshOutcome::Pending);
    assert_eq!(h.store.reads(), 0);

    h.identity.resolve(Some(Principal::student("u1")));
    assert!(!h.service.snapshot().loading());
}

#[tokio::test]
async fn check_in_keeps_flag_and_timestamp_consistent() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    store.seed("u2-e1", registration_doc("u2", "e1")).await;
    let h = harness_on(store, organizer("org1"), ServiceConfig::default());
    h.service.mark_attendance("u2-e1").await.unwrap();

    let snap = h.service.snapshot();
    assert!(snap.registrations.iter().all(|r| r.is_consistent()));
}

#[tokio::test]
async fn failed_write_leaves_state_untouched() {
    let h = harness_with(student("u1"), ServiceConfig::default());
    h.store.set_fail_writes(true);

    let err = h.service.register_for_event("e1").await.unwrap_err();
    assert!(matches!(err, DomainError::Write { .. }));
    assert!(h.service.snapshot().registrations.is_empty());
    assert_eq!(h.store.reads(), 0, "no refresh after a failed write");
}

#[tokio::test]
async fn failed_check_in_leaves_record_unchecked() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    let h = harness_on(store, student("u1"), ServiceConfig::default());
    h.service.refresh().await.unwrap();
    h.store.set_fail_writes(true);

    let err = h.service.mark_attendance("u1-e1").await.unwrap_err();
    assert!(matches!(
        RegistrationsError::from(err),
        RegistrationsError::WriteFailure { .. }
    ));
    assert!(!h.service.snapshot().registrations[0].checked_in);
}

#[tokio::test]
async fn check_in_of_unknown_registration_is_not_found() {
    let h = harness_with(organizer("org1"), ServiceConfig::default());
    let err = h.service.mark_attendance("ghost-e1").await.unwrap_err();
    assert_eq!(
        RegistrationsError::from(err),
        RegistrationsError::not_found("ghost-e1")
    );
}

#[tokio::test]
async fn anonymous_check_in_is_rejected() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    let h = harness_on(
        store,
        SessionIdentityProvider::anonymous(),
        ServiceConfig::default(),
    );

    let err = h.service.mark_attendance("u1-e1").await.unwrap_err();
    assert!(matches!(err, DomainError::Unauthenticated { .. }));
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn empty_ids_are_rejected() {
    let h = harness_with(student("u1"), ServiceConfig::default());
    assert!(matches!(
        h.service.register_for_event("").await.unwrap_err(),
        DomainError::Validation { .. }
    ));
    assert!(matches!(
        h.service.mark_attendance("  ").await.unwrap_err(),
        DomainError::Validation { .. }
    ));
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn local_patch_policy_inserts_without_refetch() {
    let config = ServiceConfig {
        sync_policy: SyncPolicy {
            after_register: Resync::LocalPatch,
            ..SyncPolicy::default()
        },
        ..ServiceConfig::default()
    };
    let h = harness_with(student("u1"), config);

    h.service.register_for_event("e2").await.unwrap();
    h.service.register_for_event("e1").await.unwrap();
    assert_eq!(h.store.reads(), 0);

    let ids: Vec<_> = h
        .service
        .snapshot()
        .registrations
        .iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(ids, vec!["u1-e1", "u1-e2"]);
}

#[tokio::test]
async fn skip_policy_leaves_working_set_alone() {
    let config = ServiceConfig {
        sync_policy: SyncPolicy {
            after_register: Resync::Skip,
            ..SyncPolicy::default()
        },
        ..ServiceConfig::default()
    };
    let h = harness_with(student("u1"), config);
    h.service.register_for_event("e1").await.unwrap();
    assert!(h.service.snapshot().registrations.is_empty());
    assert_eq!(h.store.raw_all().await.len(), 1);
}

#[tokio::test]
async fn registration_survives_failed_follow_up_refresh() {
    let h = harness_with(student("u1"), ServiceConfig::default());
    h.store.set_fail_reads(true);

    let outcome = h.service.register_for_event("e1").await.unwrap();
    assert_eq!(outcome.registration_id(), "u1-e1");
    assert_eq!(h.store.raw_all().await.len(), 1);
    assert!(!h.service.snapshot().loading());
}

#[tokio::test]
async fn slow_fetch_times_out() {
    let config = ServiceConfig {
        request_timeout: Duration::from_millis(50),
        ..ServiceConfig::default()
    };
    let h = harness_with(student("u1"), config);
    h.store.set_read_delay(Duration::from_secs(5));

    let err = h.service.refresh().await.unwrap_err();
    match err {
        DomainError::Fetch { message } => assert!(message.contains("timed out")),
        other => panic!("expected fetch failure, got {other:?}"),
    }
    assert!(!h.service.snapshot().loading());
}

#[tokio::test]
async fn cancellation_aborts_in_flight_fetch() {
    let store = ProbeStore::new();
    store.set_read_delay(Duration::from_secs(5));
    let token = CancellationToken::new();
    let identity = Arc::new(student("u1"));
    let repo = registrations::infra::storage::DocumentRegistrationsRepository::new(
        store.clone(),
        COLLECTION,
    );
    let events = Arc::new(registrations::infra::events::BroadcastEventPublisher::<
        RegistrationEvent,
    >::new(4));
    let service = Arc::new(
        registrations::domain::service::Service::new(
            Arc::new(repo),
            identity,
            events,
            ServiceConfig::default(),
        )
        .with_cancellation(token.clone()),
    );

    let task = tokio::spawn({
        let service = service.clone();
        async move { service.refresh().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(service.snapshot().loading());
    token.cancel();

    let err = task.await.unwrap().unwrap_err();
    match err {
        DomainError::Fetch { message } => assert!(message.contains("cancelled")),
        other => panic!("expected fetch failure, got {other:?}"),
    }
    assert!(!service.snapshot().loading());
}

#[tokio::test]
async fn identity_change_mid_fetch_discards_result() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    store.set_read_delay(Duration::from_millis(100));
    let h = harness_on(store, student("u1"), ServiceConfig::default());

    let task = tokio::spawn({
        let service = h.service.clone();
        async move { service.refresh().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.identity.sign_in(Principal::student("u2"));

    assert_eq!(task.await.unwrap().unwrap(), RefreshOutcome::Discarded);
    assert!(h.service.snapshot().registrations.is_empty());
}

#[tokio::test]
async fn principal_change_clears_working_set_before_refetch() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    let h = harness_on(store, student("u1"), ServiceConfig::default());
    h.service.refresh().await.unwrap();
    assert_eq!(h.service.snapshot().registrations.len(), 1);

    h.store.set_fail_reads(true);
    h.identity.sign_in(Principal::student("u2"));
    assert!(h.service.refresh().await.is_err());
    assert!(
        h.service.snapshot().registrations.is_empty(),
        "u1's records must not survive into u2's session"
    );
}

#[tokio::test]
async fn concurrent_registrations_for_same_pair_write_once() {
    let h = harness_with(student("u1"), ServiceConfig::default());

    let a = tokio::spawn({
        let s = h.service.clone();
        async move { s.register_for_event("e1").await }
    });
    let b = tokio::spawn({
        let s = h.service.clone();
        async move { s.register_for_event("e1").await }
    });
    let mut outcomes = vec![a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
    outcomes.sort_by_key(|o| matches!(o, RegisterOutcome::AlreadyRegistered { .. }));

    assert!(matches!(outcomes[0], RegisterOutcome::Registered { .. }));
    assert!(matches!(
        outcomes[1],
        RegisterOutcome::AlreadyRegistered { .. }
    ));
    assert_eq!(h.store.writes(), 1);
}

#[tokio::test]
async fn mutations_publish_domain_events() {
    let h = harness_with(organizer("org1"), ServiceConfig::default());
    let mut rx = h.events.subscribe();

    h.service.register_for_event("e1").await.unwrap();
    h.service.mark_attendance("org1-e1").await.unwrap();

    match rx.recv().await.unwrap() {
        RegistrationEvent::Registered {
            registration_id,
            user_id,
            event_id,
            ..
        } => {
            assert_eq!(registration_id, "org1-e1");
            assert_eq!(user_id, "org1");
            assert_eq!(event_id, "e1");
        }
        other => panic!("unexpected event {other:?}"),
    }
    match rx.recv().await.unwrap() {
        RegistrationEvent::CheckedIn {
            registration_id, by, ..
        } => {
            assert_eq!(registration_id, "org1-e1");
            assert_eq!(by, "org1");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn subscribers_see_each_change() {
    let h = harness_with(student("u1"), ServiceConfig::default());
    let mut rx = h.service.subscribe();
    rx.borrow_and_update();

    h.service.register_for_event("e1").await.unwrap();
    assert!(rx.has_changed().unwrap());
    let snap = rx.borrow_and_update().clone();
    assert_eq!(snap.registrations.len(), 1);
    assert_eq!(snap.viewer.user_id(), Some("u1"));
}

#[tokio::test]
async fn role_downgrade_drops_foreign_records_even_if_refetch_fails() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    store.seed("u2-e1", registration_doc("u2", "e1")).await;
    let h = harness_on(
        store,
        SessionIdentityProvider::signed_in(Principal::new("u1", Some(Role::Organizer))),
        ServiceConfig::default(),
    );
    h.service.refresh().await.unwrap();
    assert_eq!(h.service.snapshot().registrations.len(), 2);
    let rx = h.service.subscribe();

    h.store.set_fail_reads(true);
    h.identity.sign_in(Principal::student("u1"));
    assert!(h.service.refresh().await.is_err());

    let snap = h.service.snapshot();
    let ids: Vec<_> = snap.registrations.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["u1-e1"]);
    let published: Vec<_> = rx
        .borrow()
        .registrations
        .iter()
        .map(|r| r.user_id.clone())
        .collect();
    assert_eq!(published, ["u1"]);
}

#[tokio::test]
async fn snapshot_after_role_switch_hides_foreign_records_before_refresh() {
    let store = ProbeStore::new();
    store.seed("u1-e1", registration_doc("u1", "e1")).await;
    store.seed("u2-e1", registration_doc("u2", "e1")).await;
    let h = harness_on(
        store,
        SessionIdentityProvider::signed_in(Principal::new("u1", Some(Role::Organizer))),
        ServiceConfig::default(),
    );
    h.service.refresh().await.unwrap();

    h.identity.sign_in(Principal::student("u1"));
    let snap = h.service.snapshot();
    assert!(snap.registrations.iter().all(|r| r.user_id == "u1"));
    assert_eq!(snap.registrations.len(), 1);
}

#[traced_test]
#[tokio::test]
async fn fetch_failure_keeps_underlying_cause() {
    let h = harness_with(student("u1"), ServiceConfig::default());
    h.store.set_fail_reads(true);

    match h.service.refresh().await.unwrap_err() {
        DomainError::Fetch { message } => {
            assert!(message.contains("list_by_user failed"), "{message}");
            assert!(message.contains("simulated read failure"), "{message}");
        }
        other => panic!("Expected Fetch error, got {other:?}"),
    }
    assert!(logs_contain("simulated read failure"));
}

#[traced_test]
#[tokio::test]
async fn write_failure_keeps_underlying_cause() {
    let h = harness_with(student("u1"), ServiceConfig::default());
    h.store.set_fail_writes(true);

    match h.service.register_for_event("e1").await.unwrap_err() {
        DomainError::Write { message } => {
            assert!(message.contains("simulated write failure"), "{message}")
        }
        other => panic!("Expected Write error, got {other:?}"),
    }
    assert!(logs_contain("simulated write failure"));
}

#[tokio::test]
async fn colliding_id_of_another_user_is_not_treated_as_registered() {
    // "a-b" + "c" and "a" + "b-c" share the id "a-b-c"
    let store = ProbeStore::new();
    store.seed("a-b-c", registration_doc("a-b", "c")).await;
    let h = harness_on(store, organizer("a"), ServiceConfig::default());
    h.service.refresh().await.unwrap();
    assert_eq!(h.service.snapshot().registrations.len(), 1);

    let outcome = h.service.register_for_event("b-c").await.unwrap();
    assert_eq!(
        outcome,
        RegisterOutcome::Registered {
            registration_id: "a-b-c".into()
        }
    );
    assert_eq!(h.store.writes(), 1);

    let stored = h.store.raw_all().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].body["userId"], "a");
    assert!(h.service.is_user_registered("b-c"));
}
