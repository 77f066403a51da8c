//! Unit tests for the listing lifecycle against in-memory ports

use super::*;
use crate::domain::{PaymentOutcome, PostingStatus, MILLIS_PER_DAY};
use crate::error::AppError;
use crate::port::expiration_scheduler::mocks::MockExpirationScheduler;
use crate::port::id_provider::mocks::SequentialIdProvider;
use crate::port::listing_store::mocks::InMemoryListingStore;
use crate::port::payment_gateway::mocks::MockPaymentGateway;
use crate::port::time_provider::mocks::MockTimeProvider;
use crate::port::{ListingStore, TimeProvider};

const START: i64 = 1_700_000_000_000;

struct Harness {
    orchestrator: Arc<LifecycleOrchestrator>,
    store: Arc<InMemoryListingStore>,
    gateway: Arc<MockPaymentGateway>,
    scheduler: Arc<MockExpirationScheduler>,
    clock: Arc<MockTimeProvider>,
}

fn harness() -> Harness {
    let clock = Arc::new(MockTimeProvider::new(START));
    let store = Arc::new(InMemoryListingStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let scheduler = Arc::new(MockExpirationScheduler::new(clock.clone()));

    let orchestrator = Arc::new(LifecycleOrchestrator::new(
        store.clone(),
        gateway.clone(),
        scheduler.clone(),
        PricingTable::default(),
        Arc::new(SequentialIdProvider::new("posting")),
        clock.clone(),
    ));

    Harness {
        orchestrator,
        store,
        gateway,
        scheduler,
        clock,
    }
}

fn request(owner: &str, days: u32) -> CreateListingRequest {
    CreateListingRequest {
        owner_id: owner.to_string(),
        content: PostingContent::new_test("Backend Engineer"),
        duration_days: days,
        idempotency_key: None,
    }
}

async fn status_of(h: &Harness, id: &PostingId) -> PostingStatus {
    h.orchestrator.get_listing(id).await.unwrap().status
}

#[tokio::test]
async fn test_create_every_tier_pending_and_armed_once() {
    let h = harness();

    for tier in PricingTable::default().tiers() {
        let created = h
            .orchestrator
            .create_listing(request("acme", tier.days))
            .await
            .unwrap();

        assert_eq!(created.status, PostingStatus::PendingPayment);
        assert_eq!(status_of(&h, &created.posting_id).await, PostingStatus::PendingPayment);

        let arms: Vec<_> = h
            .scheduler
            .arm_calls()
            .into_iter()
            .filter(|(id, _)| id == &created.posting_id)
            .collect();
        assert_eq!(arms.len(), 1, "exactly one expiration armed");
        assert_eq!(arms[0].1, i64::from(tier.days) * MILLIS_PER_DAY);
    }

    assert_eq!(h.scheduler.timer_count(), PricingTable::default().tiers().len());
}

#[tokio::test]
async fn test_create_starts_checkout_for_tier_price() {
    let h = harness();

    let created = h.orchestrator.create_listing(request("acme", 30)).await.unwrap();

    let requests = h.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].posting_id, created.posting_id);
    assert_eq!(requests[0].amount_minor_units, 9_900);
    assert_eq!(requests[0].product_name, "Job Posting - 30 Days");
    assert_eq!(requests[0].idempotency_key, format!("checkout-{}", created.posting_id));

    let stored = h.orchestrator.get_listing(&created.posting_id).await.unwrap();
    assert_eq!(stored.checkout_url.as_deref(), Some(created.redirect_url.as_str()));
    assert!(stored.checkout_session_id.is_some());
}

#[tokio::test]
async fn test_create_invalid_duration_persists_nothing() {
    let h = harness();

    for days in [0, 1, 14, 31, 365] {
        let err = h
            .orchestrator
            .create_listing(request("acme", days))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::InvalidDuration(d)) if *d == days
        ));
    }

    assert!(h.store.is_empty());
    assert!(h.scheduler.arm_calls().is_empty());
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_create_invalid_content_persists_nothing() {
    let h = harness();
    let mut req = request("acme", 30);
    req.content.salary_from = 500_000;

    let err = h.orchestrator.create_listing(req).await.unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_create_is_idempotent_per_key() {
    let h = harness();
    let mut req = request("acme", 30);
    req.idempotency_key = Some("form-submit-1".to_string());

    let first = h.orchestrator.create_listing(req.clone()).await.unwrap();
    let second = h.orchestrator.create_listing(req).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.len(), 1);
    assert_eq!(h.gateway.call_count(), 1, "checkout reused");
    assert_eq!(h.scheduler.timer_count(), 1);
}

#[tokio::test]
async fn test_same_key_different_owner_creates_separate_posting() {
    let h = harness();
    let mut a = request("acme", 30);
    a.idempotency_key = Some("k".to_string());
    let mut b = request("globex", 30);
    b.idempotency_key = Some("k".to_string());

    let first = h.orchestrator.create_listing(a).await.unwrap();
    let second = h.orchestrator.create_listing(b).await.unwrap();

    assert_ne!(first.posting_id, second.posting_id);
    assert_eq!(h.store.len(), 2);
}

#[tokio::test]
async fn test_retry_after_gateway_outage_completes_creation() {
    let h = harness();
    let mut req = request("acme", 30);
    req.idempotency_key = Some("retry-me".to_string());

    h.gateway.set_fail(true);
    let err = h.orchestrator.create_listing(req.clone()).await.unwrap_err();
    assert!(err.is_infrastructure());

    // Record and timer exist even though checkout failed
    assert_eq!(h.store.len(), 1);
    assert_eq!(h.scheduler.timer_count(), 1);

    h.gateway.set_fail(false);
    let created = h.orchestrator.create_listing(req).await.unwrap();

    assert_eq!(h.store.len(), 1);
    assert_eq!(h.scheduler.timer_count(), 1);
    assert_eq!(h.gateway.call_count(), 1);
    assert_eq!(created.status, PostingStatus::PendingPayment);
}

#[tokio::test]
async fn test_create_rolls_back_when_expiration_cannot_be_armed() {
    let h = harness();

    h.scheduler.set_fail(true);
    let err = h.orchestrator.create_listing(request("acme", 7)).await.unwrap_err();
    assert!(err.is_infrastructure());

    // No posting without a deadline is left behind, and no checkout started
    assert_eq!(h.store.len(), 0);
    assert!(h.orchestrator.list_owner_listings("acme").await.unwrap().is_empty());
    assert_eq!(h.gateway.call_count(), 0);

    h.scheduler.set_fail(false);
    let created = h.orchestrator.create_listing(request("acme", 7)).await.unwrap();
    assert_eq!(h.store.len(), 1);
    assert!(h.scheduler.timer(&created.posting_id).is_some());
}

/// A posting left without a timer (crash between insert and arm)
async fn unarmed_posting(h: &Harness, id: &str, days: u32) -> PostingId {
    let posting = JobPosting::new(
        id,
        "acme",
        PostingContent::new_test("Orphan"),
        days,
        h.clock.now_millis(),
    );
    assert!(h.store.insert(&posting).await.unwrap());
    posting.id
}

#[tokio::test]
async fn test_retry_payment_arms_missing_expiration() {
    let h = harness();
    let id = unarmed_posting(&h, "orphan-1", 7).await;

    h.orchestrator.retry_payment(&id, "acme").await.unwrap();
    assert_eq!(
        h.scheduler.timer(&id).map(|t| t.due_at),
        Some(START + 7 * MILLIS_PER_DAY)
    );

    h.orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap();
    assert_eq!(status_of(&h, &id).await, PostingStatus::Active);
    assert_eq!(h.scheduler.timer_count(), 1);
}

#[tokio::test]
async fn test_retry_payment_without_timer_starts_no_checkout_while_scheduler_down() {
    let h = harness();
    let id = unarmed_posting(&h, "orphan-2", 7).await;

    h.scheduler.set_fail(true);
    let err = h.orchestrator.retry_payment(&id, "acme").await.unwrap_err();
    assert!(err.is_infrastructure());
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_payment_success_never_activates_posting_without_deadline() {
    let h = harness();
    let id = unarmed_posting(&h, "orphan-3", 30).await;

    // Scheduler down: activation refused, gateway redelivers later
    h.scheduler.set_fail(true);
    let err = h
        .orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap_err();
    assert!(err.is_infrastructure());
    assert_eq!(status_of(&h, &id).await, PostingStatus::PendingPayment);

    h.scheduler.set_fail(false);
    let outcome = h
        .orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap();
    assert!(outcome.is_applied());
    assert_eq!(
        h.scheduler.timer(&id).map(|t| t.due_at),
        Some(START + 30 * MILLIS_PER_DAY)
    );

    // The armed deadline still ends the paid listing
    h.clock.advance(30 * MILLIS_PER_DAY);
    h.orchestrator.apply_expiration(&id).await.unwrap();
    assert_eq!(status_of(&h, &id).await, PostingStatus::Expired);
}

#[tokio::test]
async fn test_idempotency_key_reuse_with_other_duration_rejected() {
    let h = harness();
    let mut req = request("acme", 30);
    req.idempotency_key = Some("k".to_string());
    h.orchestrator.create_listing(req.clone()).await.unwrap();

    req.duration_days = 60;
    let err = h.orchestrator.create_listing(req).await.unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
}

#[tokio::test]
async fn test_payment_success_activates_and_is_idempotent() {
    let h = harness();
    let created = h.orchestrator.create_listing(request("acme", 30)).await.unwrap();
    let id = created.posting_id;

    let first = h
        .orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap();
    assert_eq!(
        first,
        TransitionOutcome::Applied {
            from: PostingStatus::PendingPayment,
            to: PostingStatus::Active
        }
    );
    let after_once = h.orchestrator.get_listing(&id).await.unwrap();

    let second = h
        .orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap();
    assert_eq!(
        second,
        TransitionOutcome::Unchanged {
            current: PostingStatus::Active
        }
    );

    let after_twice = h.orchestrator.get_listing(&id).await.unwrap();
    assert_eq!(after_once, after_twice);
    assert_eq!(after_twice.activated_at, Some(START));
}

#[tokio::test]
async fn test_payment_failure_keeps_pending() {
    let h = harness();
    let created = h.orchestrator.create_listing(request("acme", 30)).await.unwrap();

    let outcome = h
        .orchestrator
        .apply_payment_completion(&created.posting_id, PaymentOutcome::Failure)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TransitionOutcome::Unchanged {
            current: PostingStatus::PendingPayment
        }
    );
    assert_eq!(status_of(&h, &created.posting_id).await, PostingStatus::PendingPayment);
    // The timer is still the only deadline
    assert!(h.scheduler.timer(&created.posting_id).unwrap().fired_at.is_none());
}

#[tokio::test]
async fn test_payment_for_unknown_posting_is_not_found() {
    let h = harness();

    let err = h
        .orchestrator
        .apply_payment_completion(&"missing".to_string(), PaymentOutcome::Success)
        .await
        .unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::NotFound(_))));
}

#[tokio::test]
async fn test_expiration_wins_in_either_order() {
    let h = harness();

    // success then expire
    let a = h.orchestrator.create_listing(request("acme", 30)).await.unwrap().posting_id;
    h.orchestrator
        .apply_payment_completion(&a, PaymentOutcome::Success)
        .await
        .unwrap();
    let outcome = h.orchestrator.apply_expiration(&a).await.unwrap();
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            from: PostingStatus::Active,
            to: PostingStatus::Expired
        }
    );
    assert_eq!(status_of(&h, &a).await, PostingStatus::Expired);

    // expire then success
    let b = h.orchestrator.create_listing(request("acme", 30)).await.unwrap().posting_id;
    h.orchestrator.apply_expiration(&b).await.unwrap();
    let late = h
        .orchestrator
        .apply_payment_completion(&b, PaymentOutcome::Success)
        .await
        .unwrap();
    assert_eq!(
        late,
        TransitionOutcome::Unchanged {
            current: PostingStatus::Expired
        }
    );
    assert_eq!(status_of(&h, &b).await, PostingStatus::Expired);
}

#[tokio::test]
async fn test_expiration_is_idempotent() {
    let h = harness();
    let id = h.orchestrator.create_listing(request("acme", 7)).await.unwrap().posting_id;

    assert!(h.orchestrator.apply_expiration(&id).await.unwrap().is_applied());
    h.clock.advance(1_000);
    let again = h.orchestrator.apply_expiration(&id).await.unwrap();

    assert_eq!(
        again,
        TransitionOutcome::Unchanged {
            current: PostingStatus::Expired
        }
    );
    // First application's timestamp is kept
    assert_eq!(
        h.orchestrator.get_listing(&id).await.unwrap().expired_at,
        Some(START)
    );
}

#[tokio::test]
async fn test_expiration_of_unknown_posting_is_noop() {
    let h = harness();
    let outcome = h
        .orchestrator
        .apply_expiration(&"gone".to_string())
        .await
        .unwrap();
    assert_eq!(outcome, TransitionOutcome::Missing);
}

#[tokio::test]
async fn test_signal_handlers_propagate_store_outage() {
    let h = harness();
    let id = h.orchestrator.create_listing(request("acme", 30)).await.unwrap().posting_id;

    h.store.set_fail_writes(true);
    let err = h.orchestrator.apply_expiration(&id).await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    let err = h
        .orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap_err();
    assert!(err.is_infrastructure());

    h.store.set_fail_writes(false);
    assert_eq!(status_of(&h, &id).await, PostingStatus::PendingPayment);
}

#[tokio::test]
async fn test_update_content_rules() {
    let h = harness();
    let id = h.orchestrator.create_listing(request("acme", 30)).await.unwrap().posting_id;
    let before = h.orchestrator.get_listing(&id).await.unwrap();

    // Forbidden for other owners
    let err = h
        .orchestrator
        .update_content(&id, "globex", PostingContent::new_test("Hijack"))
        .await
        .unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::Forbidden { .. })));

    // Allowed while pending and active; status/duration untouched
    h.clock.advance(5_000);
    let updated = h
        .orchestrator
        .update_content(&id, "acme", PostingContent::new_test("Staff Engineer"))
        .await
        .unwrap();
    assert_eq!(updated.content.title, "Staff Engineer");
    assert_eq!(updated.status, PostingStatus::PendingPayment);
    assert_eq!(updated.listing_duration_days, before.listing_duration_days);
    assert_eq!(updated.created_at, before.created_at);
    assert_eq!(updated.updated_at, Some(START + 5_000));

    h.orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap();
    let updated = h
        .orchestrator
        .update_content(&id, "acme", PostingContent::new_test("Principal Engineer"))
        .await
        .unwrap();
    assert_eq!(updated.status, PostingStatus::Active);

    // Edits never re-arm expiration
    assert_eq!(h.scheduler.arm_calls().len(), 1);
}

#[tokio::test]
async fn test_update_content_on_expired_is_terminal_and_changes_nothing() {
    let h = harness();
    let id = h.orchestrator.create_listing(request("acme", 30)).await.unwrap().posting_id;
    h.orchestrator.apply_expiration(&id).await.unwrap();
    let before = h.orchestrator.get_listing(&id).await.unwrap();

    let err = h
        .orchestrator
        .update_content(&id, "acme", PostingContent::new_test("Too late"))
        .await
        .unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::Terminal(_))));

    let after = h.orchestrator.get_listing(&id).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_delete_then_expiration_is_dropped() {
    let h = harness();
    let id = h.orchestrator.create_listing(request("acme", 30)).await.unwrap().posting_id;

    let err = h.orchestrator.delete_listing(&id, "globex").await.unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::Forbidden { .. })));

    h.orchestrator.delete_listing(&id, "acme").await.unwrap();
    assert!(h.store.is_empty());
    // Timer stays armed; firing it is harmless
    assert!(h.scheduler.timer(&id).is_some());
    assert_eq!(
        h.orchestrator.apply_expiration(&id).await.unwrap(),
        TransitionOutcome::Missing
    );
}

#[tokio::test]
async fn test_retry_payment_rules() {
    let h = harness();
    let id = h.orchestrator.create_listing(request("acme", 30)).await.unwrap().posting_id;

    let retried = h.orchestrator.retry_payment(&id, "acme").await.unwrap();
    assert_eq!(retried.status, PostingStatus::PendingPayment);
    assert_eq!(h.gateway.call_count(), 2);
    assert_ne!(
        h.gateway.requests()[1].idempotency_key,
        h.gateway.requests()[0].idempotency_key
    );

    let err = h.orchestrator.retry_payment(&id, "globex").await.unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::Forbidden { .. })));

    h.orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap();
    let err = h.orchestrator.retry_payment(&id, "acme").await.unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::AlreadyActive(_))));

    h.orchestrator.apply_expiration(&id).await.unwrap();
    let err = h.orchestrator.retry_payment(&id, "acme").await.unwrap_err();
    assert!(matches!(err.as_domain(), Some(DomainError::Terminal(_))));
}

#[tokio::test]
async fn test_list_and_counts() {
    let h = harness();
    let a = h.orchestrator.create_listing(request("acme", 30)).await.unwrap().posting_id;
    h.clock.advance(1);
    let b = h.orchestrator.create_listing(request("acme", 60)).await.unwrap().posting_id;
    h.orchestrator.create_listing(request("globex", 7)).await.unwrap();

    let mine = h.orchestrator.list_owner_listings("acme").await.unwrap();
    let ids: Vec<_> = mine.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec![b.clone(), a.clone()], "newest first");

    h.orchestrator
        .apply_payment_completion(&a, PaymentOutcome::Success)
        .await
        .unwrap();
    h.orchestrator.apply_expiration(&b).await.unwrap();

    let counts = h.orchestrator.status_counts().await.unwrap();
    assert_eq!(
        counts,
        StatusCounts {
            pending_payment: 1,
            active: 1,
            expired: 1
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_payment_and_expiration_always_end_expired() {
    let h = harness();

    for _ in 0..50 {
        let id = h.orchestrator.create_listing(request("acme", 30)).await.unwrap().posting_id;

        let pay = {
            let o = h.orchestrator.clone();
            let id = id.clone();
            tokio::spawn(async move { o.apply_payment_completion(&id, PaymentOutcome::Success).await })
        };
        let expire = {
            let o = h.orchestrator.clone();
            let id = id.clone();
            tokio::spawn(async move { o.apply_expiration(&id).await })
        };

        let (pay, expire) = futures::join!(pay, expire);
        pay.unwrap().unwrap();
        assert!(expire.unwrap().unwrap().is_applied());
        assert_eq!(status_of(&h, &id).await, PostingStatus::Expired);
    }
}

#[tokio::test]
async fn test_scenario_thirty_day_paid_listing() {
    let h = harness();

    let created = h.orchestrator.create_listing(request("acme", 30)).await.unwrap();
    let id = created.posting_id;
    assert_eq!(h.gateway.requests()[0].amount_minor_units, 99 * 100);
    assert_eq!(status_of(&h, &id).await, PostingStatus::PendingPayment);

    h.orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap();
    assert_eq!(status_of(&h, &id).await, PostingStatus::Active);

    h.clock.advance(30 * MILLIS_PER_DAY);
    h.orchestrator.apply_expiration(&id).await.unwrap();
    assert_eq!(status_of(&h, &id).await, PostingStatus::Expired);

    h.orchestrator
        .apply_payment_completion(&id, PaymentOutcome::Success)
        .await
        .unwrap();
    assert_eq!(status_of(&h, &id).await, PostingStatus::Expired);
}

#[tokio::test]
async fn test_scenario_unpaid_seven_day_listing() {
    let h = harness();

    let id = h.orchestrator.create_listing(request("acme", 7)).await.unwrap().posting_id;
    h.clock.advance(7 * MILLIS_PER_DAY);

    let outcome = h.orchestrator.apply_expiration(&id).await.unwrap();
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            from: PostingStatus::PendingPayment,
            to: PostingStatus::Expired
        }
    );
}
