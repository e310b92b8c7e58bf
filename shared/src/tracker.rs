//! UI-facing entry point.
//!
//! The tracker owns the session and hands it to the executor; nothing else
//! holds it. Control activations arrive with the raw id and the value the
//! control showed when it was activated, which becomes the rollback target.

use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::api::ListingApi;
use crate::cache::{ListingCache, ResultsView, ViewFilters};
use crate::error::{TrackerResult, ValidationError};
use crate::executor::{ContactField, InterestField, MutationOutcome, OptimisticExecutor};
use crate::metrics::{MetricsSnapshot, TrackerMetrics};
use crate::model::{toggle_contact, DetailId, Field, InterestControl, InterestState};
use crate::session::Session;

pub struct Tracker<A: ListingApi> {
    api: Arc<A>,
    session: Arc<RwLock<Session>>,
    executor: OptimisticExecutor,
    metrics: Arc<TrackerMetrics>,
}

impl<A: ListingApi> Tracker<A> {
    #[must_use]
    pub fn new(api: Arc<A>) -> Self {
        let session = Arc::new(RwLock::new(Session::default()));
        let metrics = Arc::new(TrackerMetrics::new());
        let (views, _) = watch::channel(ResultsView::default());
        let executor = OptimisticExecutor::new(session.clone(), metrics.clone(), views);

        Self {
            api,
            session,
            executor,
            metrics,
        }
    }

    /// Receives the recomputed view after every cache change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ResultsView> {
        self.executor.subscribe()
    }

    #[instrument(skip(self))]
    pub async fn handle_interest(
        &self,
        raw_id: &str,
        current: InterestState,
        control: InterestControl,
    ) -> MutationOutcome<InterestState> {
        match self.parse_id(raw_id) {
            Ok(detail_id) => self.mark_interest(detail_id, current, control).await,
            Err(e) => MutationOutcome::Refused(e),
        }
    }

    #[instrument(skip(self))]
    pub async fn handle_contact(&self, raw_id: &str, current: bool) -> MutationOutcome<bool> {
        match self.parse_id(raw_id) {
            Ok(detail_id) => self.toggle_contact(detail_id, current).await,
            Err(e) => MutationOutcome::Refused(e),
        }
    }

    pub async fn mark_interest(
        &self,
        detail_id: DetailId,
        current: InterestState,
        control: InterestControl,
    ) -> MutationOutcome<InterestState> {
        let proposed = current.after(control);
        debug!(%detail_id, %current, %proposed, "interest transition");

        let api = self.api.clone();
        self.executor
            .execute::<InterestField, _, _>(detail_id, current, proposed, |id, value| async move {
                api.set_interest(id, value).await
            })
            .await
    }

    pub async fn toggle_contact(&self, detail_id: DetailId, current: bool) -> MutationOutcome<bool> {
        let proposed = toggle_contact(current);

        let api = self.api.clone();
        self.executor
            .execute::<ContactField, _, _>(detail_id, current, proposed, |id, value| async move {
                api.set_contact(id, value).await
            })
            .await
    }

    /// Fetches results for `query` and replaces the cache. On failure the
    /// previous cache stays in place.
    #[instrument(skip(self))]
    pub async fn load_results(&self, query: &str) -> TrackerResult<ResultsView> {
        let groups = match self.api.fetch_results(query).await {
            Ok(groups) => groups,
            Err(e) => {
                TrackerMetrics::bump(&self.metrics.fetch_failures);
                warn!(code = e.code(), error = %e, "results fetch failed, keeping cache");
                return Err(e.into());
            }
        };

        let mut session = self.session.write().await;
        session.replace_results(groups);
        let view = session.view();
        TrackerMetrics::bump(&self.metrics.cache_replacements);
        info!(
            groups = session.cache().groups().len(),
            listings = session.cache().listing_count(),
            shown = view.listing_count,
            "cache replaced"
        );
        self.executor.publish(view.clone());
        Ok(view)
    }

    pub async fn set_filters(&self, filters: ViewFilters) -> ResultsView {
        let mut session = self.session.write().await;
        session.set_filters(filters);
        let view = session.view();
        debug!(?filters, shown = view.listing_count, "filters changed");
        self.executor.publish(view.clone());
        view
    }

    pub async fn filters(&self) -> ViewFilters {
        self.session.read().await.filters()
    }

    pub async fn view(&self) -> ResultsView {
        self.session.read().await.view()
    }

    pub async fn interested_count(&self) -> usize {
        self.session.read().await.cache().interested_count()
    }

    /// Snapshot of the cache as last fetched and patched.
    pub async fn cache(&self) -> ListingCache {
        self.session.read().await.cache().clone()
    }

    pub async fn observed_interest(&self, detail_id: DetailId) -> InterestState {
        self.session.read().await.observed_interest(detail_id)
    }

    pub async fn observed_contact(&self, detail_id: DetailId) -> bool {
        self.session.read().await.observed_contact(detail_id)
    }

    /// Whether the control for `field` on `detail_id` is disabled.
    pub async fn is_in_flight(&self, field: Field, detail_id: DetailId) -> bool {
        self.session.read().await.boards().is_in_flight(field, detail_id)
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn parse_id(&self, raw_id: &str) -> Result<DetailId, ValidationError> {
        raw_id.parse().map_err(|e: ValidationError| {
            TrackerMetrics::bump(&self.metrics.activations_refused);
            debug!(raw_id, error = %e, "activation refused");
            e
        })
    }
}
