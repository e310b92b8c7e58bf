//! Optimistic mutation executor.
//!
//! A mutation shows its proposed value and disables the control before the
//! remote call is made. The session lock is released while the call is
//! outstanding, so other listings stay interactive. When the call resolves the
//! executor either patches the cache and recomputes derived views, or puts the
//! previous value back. Failures never leave this module as errors.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{ListingCache, ResultsView};
use crate::error::{ApiError, ValidationError};
use crate::metrics::TrackerMetrics;
use crate::model::{DetailId, Field, InterestState};
use crate::session::{ControlBoard, ControlBoards, Session};

/// A listing field the executor knows how to display, patch and recompute.
pub trait TrackedField: 'static {
    type Value: Copy + PartialEq + fmt::Debug + Send + Sync + 'static;

    const FIELD: Field;

    fn board(boards: &mut ControlBoards) -> &mut ControlBoard<Self::Value>;

    fn patch(cache: &mut ListingCache, detail_id: DetailId, value: Self::Value) -> usize;
}

pub struct InterestField;

impl TrackedField for InterestField {
    type Value = InterestState;

    const FIELD: Field = Field::Interest;

    fn board(boards: &mut ControlBoards) -> &mut ControlBoard<InterestState> {
        &mut boards.interest
    }

    fn patch(cache: &mut ListingCache, detail_id: DetailId, value: InterestState) -> usize {
        cache.patch_interest(detail_id, value)
    }
}

pub struct ContactField;

impl TrackedField for ContactField {
    type Value = bool;

    const FIELD: Field = Field::Contact;

    fn board(boards: &mut ControlBoards) -> &mut ControlBoard<bool> {
        &mut boards.contact
    }

    fn patch(cache: &mut ListingCache, detail_id: DetailId, value: bool) -> usize {
        cache.patch_contact(detail_id, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticMutation<V> {
    pub mutation_id: Uuid,
    pub detail_id: DetailId,
    pub field: Field,
    pub previous: V,
    pub proposed: V,
}

impl<V> OptimisticMutation<V> {
    #[must_use]
    pub fn new(detail_id: DetailId, field: Field, previous: V, proposed: V) -> Self {
        Self {
            mutation_id: Uuid::new_v4(),
            detail_id,
            field,
            previous,
            proposed,
        }
    }
}

/// Restores the previous value if the mutation future is dropped before the
/// persist call resolves, so the control is never left disabled.
struct PendingSlot<F: TrackedField> {
    session: Arc<RwLock<Session>>,
    metrics: Arc<TrackerMetrics>,
    mutation_id: Uuid,
    detail_id: DetailId,
    previous: F::Value,
    armed: bool,
    field: PhantomData<fn() -> F>,
}

impl<F: TrackedField> PendingSlot<F> {
    fn resolve(&mut self) {
        self.armed = false;
    }
}

impl<F: TrackedField> Drop for PendingSlot<F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let (detail_id, previous) = (self.detail_id, self.previous);
        TrackerMetrics::bump(&self.metrics.mutations_abandoned);
        warn!(
            mutation_id = %self.mutation_id,
            field = %F::FIELD,
            detail_id = %detail_id,
            restored = ?previous,
            "mutation abandoned before resolution, rolling back"
        );

        if let Ok(mut session) = self.session.try_write() {
            F::board(&mut session.boards).settle(detail_id, previous);
            return;
        }

        // lock is busy; finish the rollback once it frees up
        let session = self.session.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut session = session.write().await;
                    F::board(&mut session.boards).settle(detail_id, previous);
                });
            }
            Err(_) => warn!(
                field = %F::FIELD,
                detail_id = %detail_id,
                "no runtime to finish rollback, control stays disabled until next fetch"
            ),
        }
    }
}

/// Derived view refreshed after a commit.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// An active filter depends on the field, so the whole view was rebuilt.
    Filtered(ResultsView),
    /// Only the interested badge was recounted.
    Badge(usize),
}

impl ViewUpdate {
    #[must_use]
    pub fn interested_count(&self) -> usize {
        match self {
            Self::Filtered(view) => view.interested_count,
            Self::Badge(count) => *count,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<V> {
    Committed {
        mutation_id: Uuid,
        value: V,
        patched: usize,
        view: ViewUpdate,
    },
    RolledBack {
        mutation_id: Uuid,
        restored: V,
        error: ApiError,
    },
    /// The control was disabled; nothing happened.
    InFlight,
    /// The activation named no usable listing; nothing happened.
    Refused(ValidationError),
}

impl<V: Copy> MutationOutcome<V> {
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    #[must_use]
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Self::RolledBack { .. })
    }

    /// Value the control shows after the outcome, when it changed anything.
    #[must_use]
    pub fn shown_value(&self) -> Option<V> {
        match self {
            Self::Committed { value, .. } => Some(*value),
            Self::RolledBack { restored, .. } => Some(*restored),
            Self::InFlight | Self::Refused(_) => None,
        }
    }
}

pub struct OptimisticExecutor {
    session: Arc<RwLock<Session>>,
    metrics: Arc<TrackerMetrics>,
    views: watch::Sender<ResultsView>,
}

impl OptimisticExecutor {
    #[must_use]
    pub fn new(
        session: Arc<RwLock<Session>>,
        metrics: Arc<TrackerMetrics>,
        views: watch::Sender<ResultsView>,
    ) -> Self {
        Self {
            session,
            metrics,
            views,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ResultsView> {
        self.views.subscribe()
    }

    /// Runs one optimistic mutation of field `F` from `previous` to `proposed`.
    /// `persist` must resolve to the value the server confirmed.
    pub async fn execute<F, P, Fut>(
        &self,
        detail_id: DetailId,
        previous: F::Value,
        proposed: F::Value,
        persist: P,
    ) -> MutationOutcome<F::Value>
    where
        F: TrackedField,
        P: FnOnce(DetailId, F::Value) -> Fut,
        Fut: Future<Output = Result<F::Value, ApiError>>,
    {
        let mutation = OptimisticMutation::new(detail_id, F::FIELD, previous, proposed);

        {
            let mut session = self.session.write().await;
            if !F::board(&mut session.boards).begin(detail_id, proposed) {
                TrackerMetrics::bump(&self.metrics.activations_ignored);
                debug!(
                    field = %F::FIELD,
                    detail_id = %detail_id,
                    "control disabled, activation ignored"
                );
                return MutationOutcome::InFlight;
            }
        }

        let mut pending = PendingSlot::<F> {
            session: self.session.clone(),
            metrics: self.metrics.clone(),
            mutation_id: mutation.mutation_id,
            detail_id,
            previous,
            armed: true,
            field: PhantomData,
        };

        debug!(
            mutation_id = %mutation.mutation_id,
            field = %F::FIELD,
            detail_id = %detail_id,
            previous = ?previous,
            proposed = ?proposed,
            "optimistic value applied"
        );

        let result = persist(detail_id, proposed).await.and_then(|confirmed| {
            if confirmed == proposed {
                Ok(confirmed)
            } else {
                Err(ApiError::MalformedResponse(format!(
                    "server confirmed {confirmed:?}, expected {proposed:?}"
                )))
            }
        });

        let mut session = self.session.write().await;
        pending.resolve();
        match result {
            Ok(value) => {
                let patched = F::patch(&mut session.cache, detail_id, value);
                F::board(&mut session.boards).settle(detail_id, value);
                let view = self.recompute(&session, F::FIELD);
                TrackerMetrics::bump(&self.metrics.mutations_committed);
                info!(
                    mutation_id = %mutation.mutation_id,
                    field = %F::FIELD,
                    detail_id = %detail_id,
                    value = ?value,
                    patched,
                    "mutation committed"
                );
                MutationOutcome::Committed {
                    mutation_id: mutation.mutation_id,
                    value,
                    patched,
                    view,
                }
            }
            Err(error) => {
                F::board(&mut session.boards).settle(detail_id, mutation.previous);
                TrackerMetrics::bump(&self.metrics.mutations_rolled_back);
                warn!(
                    mutation_id = %mutation.mutation_id,
                    field = %F::FIELD,
                    detail_id = %detail_id,
                    restored = ?mutation.previous,
                    code = error.code(),
                    error = %error,
                    "mutation rolled back"
                );
                MutationOutcome::RolledBack {
                    mutation_id: mutation.mutation_id,
                    restored: mutation.previous,
                    error,
                }
            }
        }
    }

    /// Subscribers always get the full view; the returned update tells the
    /// caller whether the visible set could have changed.
    fn recompute(&self, session: &Session, field: Field) -> ViewUpdate {
        let view = session.view();
        let update = if session.filters.depends_on(field) {
            ViewUpdate::Filtered(view.clone())
        } else {
            ViewUpdate::Badge(view.interested_count)
        };
        self.views.send_replace(view);
        update
    }

    /// Pushes a freshly built view to subscribers.
    pub fn publish(&self, view: ResultsView) {
        self.views.send_replace(view);
    }
}
