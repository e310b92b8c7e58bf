use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bookwatch_shared::{
    ApiError, DetailId, ErrorKind, Field, InterestControl, InterestState, Listing, ListingApi,
    ListingGroup, MutationOutcome, Tracker, TrackerError, ValidationError, ViewFilters, ViewUpdate,
};
use tokio::sync::Semaphore;

/// In-memory backend with failure switches and an optional gate that holds
/// mutations until the test releases them.
#[derive(Default)]
struct FailableApi {
    results: Mutex<Vec<ListingGroup>>,
    fail_mutations: AtomicBool,
    fail_fetch: AtomicBool,
    wrong_echo: AtomicBool,
    gate: Option<Arc<Semaphore>>,
    mutation_calls: AtomicUsize,
}

impl FailableApi {
    fn with_results(groups: Vec<ListingGroup>) -> Self {
        Self {
            results: Mutex::new(groups),
            ..Default::default()
        }
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    async fn before_mutation(&self) -> Result<(), ApiError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ApiError::from_http_status(
                500,
                Some(br#"{"error": "Internal server error"}"#),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ListingApi for FailableApi {
    async fn set_interest(
        &self,
        detail_id: DetailId,
        interest: InterestState,
    ) -> Result<InterestState, ApiError> {
        self.before_mutation().await?;
        if self.wrong_echo.load(Ordering::SeqCst) {
            return Ok(InterestState::Pending);
        }
        for group in self.results.lock().unwrap().iter_mut() {
            for listing in &mut group.results {
                if listing.detail_id == detail_id {
                    listing.interest = interest;
                }
            }
        }
        Ok(interest)
    }

    async fn set_contact(&self, detail_id: DetailId, contact: bool) -> Result<bool, ApiError> {
        self.before_mutation().await?;
        for group in self.results.lock().unwrap().iter_mut() {
            for listing in &mut group.results {
                if listing.detail_id == detail_id {
                    listing.contact = contact;
                }
            }
        }
        Ok(contact)
    }

    async fn fetch_results(&self, _query: &str) -> Result<Vec<ListingGroup>, ApiError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".into()));
        }
        Ok(self.results.lock().unwrap().clone())
    }
}

fn id(n: i64) -> DetailId {
    DetailId::new(n).unwrap()
}

fn sample_groups() -> Vec<ListingGroup> {
    vec![
        ListingGroup::new(
            "Seller",
            "oxfam",
            vec![
                Listing::new(id(1)).with_display("name", "Dune"),
                Listing::new(id(2))
                    .with_interest(InterestState::Interested)
                    .with_display("name", "Emma"),
                Listing::new(id(3)).with_display("name", "Ulysses"),
            ],
        ),
        ListingGroup::new(
            "Seller",
            "bookbarn",
            vec![
                Listing::new(id(3)).with_display("name", "Ulysses"),
                Listing::new(id(4)).with_interest(InterestState::NotInterested),
            ],
        ),
    ]
}

async fn loaded(api: FailableApi) -> (Arc<Tracker<FailableApi>>, Arc<FailableApi>) {
    let api = Arc::new(api);
    let tracker = Arc::new(Tracker::new(api.clone()));
    tracker.load_results("").await.unwrap();
    (tracker, api)
}

#[tokio::test]
async fn star_commits_and_bumps_badge() {
    let gate = Arc::new(Semaphore::new(0));
    let (tracker, api) =
        loaded(FailableApi::with_results(sample_groups()).gated(gate.clone())).await;
    assert_eq!(tracker.interested_count().await, 1);

    let pending = {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            tracker
                .handle_interest("1", InterestState::Pending, InterestControl::MarkInterested)
                .await
        })
    };

    while !tracker.is_in_flight(Field::Interest, id(1)).await {
        tokio::task::yield_now().await;
    }
    // shown optimistically while disabled, cache untouched until commit
    assert_eq!(tracker.observed_interest(id(1)).await, InterestState::Interested);
    assert_eq!(tracker.interested_count().await, 1);

    gate.add_permits(1);
    let outcome = pending.await.unwrap();

    match outcome {
        MutationOutcome::Committed { value, patched, view, .. } => {
            assert_eq!(value, InterestState::Interested);
            assert_eq!(patched, 1);
            assert_eq!(view, ViewUpdate::Badge(2));
        }
        other => panic!("expected commit, got {other:?}"),
    }
    assert!(!tracker.is_in_flight(Field::Interest, id(1)).await);
    assert_eq!(tracker.interested_count().await, 2);
    assert_eq!(api.calls(), 1);
    assert_eq!(tracker.metrics().mutations_committed, 1);
}

#[tokio::test]
async fn toggle_off_failure_rolls_back() {
    let (tracker, api) = loaded(FailableApi::with_results(sample_groups())).await;
    api.fail_mutations.store(true, Ordering::SeqCst);

    let outcome = tracker
        .handle_interest("2", InterestState::Interested, InterestControl::MarkInterested)
        .await;

    match outcome {
        MutationOutcome::RolledBack { restored, error, .. } => {
            assert_eq!(restored, InterestState::Interested);
            assert_eq!(error.kind(), ErrorKind::Server);
            assert_eq!(
                error,
                ApiError::Status {
                    status: 500,
                    message: "Internal server error".into()
                }
            );
        }
        other => panic!("expected rollback, got {other:?}"),
    }

    assert_eq!(tracker.observed_interest(id(2)).await, InterestState::Interested);
    assert!(!tracker.is_in_flight(Field::Interest, id(2)).await);
    assert_eq!(tracker.interested_count().await, 1);
    assert_eq!(tracker.metrics().mutations_rolled_back, 1);
}

#[tokio::test]
async fn repeated_failures_restore_same_state() {
    let (tracker, api) = loaded(FailableApi::with_results(sample_groups())).await;
    api.fail_mutations.store(true, Ordering::SeqCst);
    let before = tracker.cache().await;

    for _ in 0..3 {
        let outcome = tracker
            .handle_interest("4", InterestState::NotInterested, InterestControl::MarkInterested)
            .await;
        assert_eq!(outcome.shown_value(), Some(InterestState::NotInterested));
    }

    assert_eq!(tracker.cache().await, before);
    assert_eq!(tracker.observed_interest(id(4)).await, InterestState::NotInterested);
    assert_eq!(api.calls(), 3);
}

#[tokio::test]
async fn contact_patches_every_occurrence() {
    let (tracker, _api) = loaded(FailableApi::with_results(sample_groups())).await;

    let outcome = tracker.handle_contact("3", false).await;

    match outcome {
        MutationOutcome::Committed { value, patched, .. } => {
            assert!(value);
            assert_eq!(patched, 2);
        }
        other => panic!("expected commit, got {other:?}"),
    }

    let cache = tracker.cache().await;
    let occurrences: Vec<&Listing> = cache.listings().filter(|l| l.detail_id == id(3)).collect();
    assert_eq!(occurrences.len(), 2);
    assert!(occurrences.iter().all(|l| l.contact));
    assert!(tracker.observed_contact(id(3)).await);
}

#[tokio::test]
async fn second_activation_while_in_flight_is_ignored() {
    let gate = Arc::new(Semaphore::new(0));
    let (tracker, api) =
        loaded(FailableApi::with_results(sample_groups()).gated(gate.clone())).await;

    let first = {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            tracker
                .handle_interest("1", InterestState::Pending, InterestControl::MarkInterested)
                .await
        })
    };

    while !tracker.is_in_flight(Field::Interest, id(1)).await {
        tokio::task::yield_now().await;
    }

    // the dismiss control shares the interest field, so it is disabled too
    let second = tracker
        .handle_interest("1", InterestState::Interested, InterestControl::MarkNotInterested)
        .await;
    assert_eq!(second, MutationOutcome::InFlight);

    // other fields and other listings stay usable
    assert!(!tracker.is_in_flight(Field::Contact, id(1)).await);
    assert!(!tracker.is_in_flight(Field::Interest, id(3)).await);

    gate.add_permits(1);
    assert!(first.await.unwrap().is_committed());
    assert_eq!(api.calls(), 1);
    assert_eq!(tracker.metrics().activations_ignored, 1);
    assert_eq!(tracker.observed_interest(id(1)).await, InterestState::Interested);
}

#[tokio::test]
async fn mismatched_echo_rolls_back() {
    let (tracker, api) = loaded(FailableApi::with_results(sample_groups())).await;
    api.wrong_echo.store(true, Ordering::SeqCst);

    let outcome = tracker
        .handle_interest("1", InterestState::Pending, InterestControl::MarkNotInterested)
        .await;

    match outcome {
        MutationOutcome::RolledBack { restored, error, .. } => {
            assert_eq!(restored, InterestState::Pending);
            assert_eq!(error.kind(), ErrorKind::MalformedResponse);
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(tracker.observed_interest(id(1)).await, InterestState::Pending);
}

#[tokio::test]
async fn invalid_ids_are_refused_without_calls() {
    let (tracker, api) = loaded(FailableApi::with_results(sample_groups())).await;
    let before = tracker.cache().await;

    for raw in ["", "abc", "0", "-7", "1.5"] {
        let outcome = tracker
            .handle_interest(raw, InterestState::Pending, InterestControl::MarkInterested)
            .await;
        assert!(
            matches!(outcome, MutationOutcome::Refused(ValidationError::InvalidDetailId(_))),
            "{raw:?} should be refused, got {outcome:?}"
        );
        assert!(matches!(
            tracker.handle_contact(raw, false).await,
            MutationOutcome::Refused(_)
        ));
    }

    assert_eq!(api.calls(), 0);
    assert_eq!(tracker.cache().await, before);
    assert_eq!(tracker.metrics().activations_refused, 10);
}

#[tokio::test]
async fn filtered_view_follows_commits() {
    let (tracker, _api) = loaded(FailableApi::with_results(sample_groups())).await;
    let mut views = tracker.subscribe();

    let view = tracker
        .set_filters(ViewFilters::new().with_show_interested(true))
        .await;
    assert_eq!(view.listing_count, 1);
    assert_eq!(view.groups.len(), 1);
    assert_eq!(view.results_label(), "1 listing");

    let outcome = tracker
        .handle_interest("3", InterestState::Pending, InterestControl::MarkInterested)
        .await;
    let MutationOutcome::Committed { view: ViewUpdate::Filtered(view), .. } = outcome else {
        panic!("expected a rebuilt view, got {outcome:?}");
    };
    // detail 3 sits in both groups
    assert_eq!(view.listing_count, 3);
    assert_eq!(view.groups.len(), 2);
    assert_eq!(view.interested_count, 3);

    assert!(views.has_changed().unwrap());
    assert_eq!(views.borrow_and_update().listing_count, 3);

    // enabling hide-not-interested switches show-interested off
    let view = tracker
        .set_filters(tracker.filters().await.with_hide_not_interested(true))
        .await;
    assert!(!tracker.filters().await.show_interested());
    assert_eq!(view.listing_count, 4);
}

#[tokio::test]
async fn failed_fetch_keeps_previous_cache() {
    let (tracker, api) = loaded(FailableApi::with_results(sample_groups())).await;
    tracker.handle_contact("1", false).await;
    let before = tracker.cache().await;

    api.fail_fetch.store(true, Ordering::SeqCst);
    let err = tracker.load_results("group_by=Seller").await.unwrap_err();

    assert!(matches!(err, TrackerError::Api(ApiError::Transport(_))));
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(tracker.cache().await, before);
    assert!(tracker.observed_contact(id(1)).await);
    assert_eq!(tracker.metrics().fetch_failures, 1);
}

#[tokio::test]
async fn refetch_replaces_cache_wholesale() {
    let (tracker, api) = loaded(FailableApi::with_results(sample_groups())).await;
    assert_eq!(tracker.cache().await.listing_count(), 5);

    *api.results.lock().unwrap() = vec![ListingGroup::ungrouped(vec![
        Listing::new(id(9)).with_interest(InterestState::Interested),
    ])];
    let view = tracker.load_results("").await.unwrap();

    assert_eq!(view.listing_count, 1);
    assert_eq!(view.interested_count, 1);
    assert!(tracker.cache().await.find(id(1)).is_none());
    assert_eq!(tracker.metrics().cache_replacements, 2);
}

#[tokio::test]
async fn aborted_activation_releases_control() {
    let gate = Arc::new(Semaphore::new(0));
    let (tracker, api) =
        loaded(FailableApi::with_results(sample_groups()).gated(gate.clone())).await;

    let task = {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            tracker
                .handle_interest("1", InterestState::Pending, InterestControl::MarkInterested)
                .await
        })
    };

    while !tracker.is_in_flight(Field::Interest, id(1)).await {
        tokio::task::yield_now().await;
    }
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(!tracker.is_in_flight(Field::Interest, id(1)).await);
    assert_eq!(tracker.observed_interest(id(1)).await, InterestState::Pending);
    assert_eq!(tracker.interested_count().await, 1);
    assert_eq!(tracker.metrics().mutations_abandoned, 1);

    gate.add_permits(1);
    let retry = tracker
        .handle_interest("1", InterestState::Pending, InterestControl::MarkInterested)
        .await;
    assert!(retry.is_committed());
    assert_eq!(api.calls(), 2);
    assert_eq!(tracker.observed_interest(id(1)).await, InterestState::Interested);
}

#[tokio::test]
async fn subscribers_see_patched_cards_after_badge_commit() {
    let (tracker, _api) = loaded(FailableApi::with_results(sample_groups())).await;
    let mut views = tracker.subscribe();

    let outcome = tracker
        .handle_interest("1", InterestState::Pending, InterestControl::MarkInterested)
        .await;
    assert!(matches!(
        outcome,
        MutationOutcome::Committed { view: ViewUpdate::Badge(2), .. }
    ));

    assert!(views.has_changed().unwrap());
    let view = views.borrow_and_update();
    let marked = view
        .groups
        .iter()
        .flat_map(|g| &g.results)
        .filter(|l| l.interest == InterestState::Interested)
        .count();
    assert_eq!(view.interested_count, 2);
    assert_eq!(marked, view.interested_count);
    let listing = view
        .groups
        .iter()
        .flat_map(|g| &g.results)
        .find(|l| l.detail_id == id(1))
        .unwrap();
    assert_eq!(listing.interest, InterestState::Interested);
}
