//! Debounced event search.
//!
//! Typing schedules a search once input has been quiet for the debounce
//! period. Newer input cancels the scheduled search, and every response is
//! checked against the request sequence so a slow answer for an old term
//! never replaces the results of a newer one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::api::EventApi;
use crate::models::Event;
use crate::sequence::{Generation, RequestSequence};

const SEARCH_FAILED: &str = "Failed to search events";

/// Progress of the latest search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchStatus {
    #[default]
    Idle,
    Loading,
    Ready(Vec<Event>),
    Failed(String),
}

/// What the search view renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchSnapshot {
    pub term: String,
    pub status: SearchStatus,
}

impl SearchSnapshot {
    /// Results of a completed search, if any.
    #[must_use]
    pub fn results(&self) -> Option<&[Event]> {
        match &self.status {
            SearchStatus::Ready(events) => Some(events),
            _ => None,
        }
    }
}

/// Search box controller. Dropping it cancels all pending work.
#[derive(Debug)]
pub struct SearchController<A> {
    api: A,
    debounce: Duration,
    sequence: RequestSequence,
    state: Arc<watch::Sender<SearchSnapshot>>,
    pending: Vec<JoinHandle<()>>,
}

impl<A> SearchController<A>
where
    A: EventApi + Clone + 'static,
{
    #[must_use]
    pub fn new(api: A, debounce: Duration) -> Self {
        let (state, _) = watch::channel(SearchSnapshot::default());
        Self {
            api,
            debounce,
            sequence: RequestSequence::new(),
            state: Arc::new(state),
            pending: Vec::new(),
        }
    }

    /// Receive every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SearchSnapshot {
        self.state.borrow().clone()
    }

    /// Handle a keystroke: search for `term` once input goes quiet.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self))]
    pub fn input(&mut self, term: &str) {
        let generation = self.supersede();
        let term = term.trim().to_string();
        if term.is_empty() {
            self.publish_idle();
            return;
        }

        let api = self.api.clone();
        let sequence = self.sequence.clone();
        let state = Arc::clone(&self.state);
        let debounce = self.debounce;

        self.pending.push(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if !sequence.is_current(generation) {
                return;
            }
            run_search(&api, &sequence, &state, generation, term).await;
        }));
    }

    /// Search for `term` now, superseding any scheduled search.
    #[instrument(skip(self))]
    pub async fn submit(&mut self, term: &str) -> SearchSnapshot {
        let generation = self.supersede();
        let term = term.trim().to_string();
        if term.is_empty() {
            self.publish_idle();
        } else {
            run_search(&self.api, &self.sequence, &self.state, generation, term).await;
        }
        self.snapshot()
    }

    /// Cancel pending work and reset to idle.
    pub fn clear(&mut self) {
        self.supersede();
        self.publish_idle();
    }

    /// Start a new generation and cancel everything scheduled before it.
    fn supersede(&mut self) -> Generation {
        let generation = self.sequence.begin();
        for handle in self.pending.drain(..) {
            handle.abort();
        }
        generation
    }

    fn publish_idle(&self) {
        self.state.send_replace(SearchSnapshot::default());
    }
}

impl<A> Drop for SearchController<A> {
    fn drop(&mut self) {
        self.sequence.invalidate();
        for handle in self.pending.drain(..) {
            handle.abort();
        }
    }
}

/// Query the API and publish the outcome if `generation` is still current.
async fn run_search<A: EventApi>(
    api: &A,
    sequence: &RequestSequence,
    state: &watch::Sender<SearchSnapshot>,
    generation: Generation,
    term: String,
) {
    state.send_replace(SearchSnapshot {
        term: term.clone(),
        status: SearchStatus::Loading,
    });

    let status = match api.search_events(&term).await {
        Ok(events) => {
            debug!(term = %term, results = events.len(), "Search completed");
            SearchStatus::Ready(events)
        }
        Err(e) => {
            warn!(term = %term, error = %e, "Search failed");
            SearchStatus::Failed(e.message_or(SEARCH_FAILED))
        }
    };

    if !sequence.is_current(generation) {
        debug!(term = %term, "Discarding stale search response");
        return;
    }
    state.send_replace(SearchSnapshot { term, status });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use eventdesk_core::Price;

    use super::*;
    use crate::api::mock::MockApi;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn api() -> MockApi {
        let api = MockApi::new();
        let now = Utc::now();
        api.add_event(MockApi::sample_event(1, "Jazz Night", None, Price::ZERO, now));
        api.add_event(MockApi::sample_event(2, "Rock Festival", None, Price::ZERO, now));
        api.add_event(MockApi::sample_event(3, "Abba Tribute", None, Price::ZERO, now));
        api
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_sends_only_latest_term() {
        let api = api();
        let mut search = SearchController::new(api.clone(), DEBOUNCE);

        search.input("a");
        wait(100).await;
        search.input("ab");
        wait(1_000).await;

        assert_eq!(api.search_terms(), vec!["ab".to_string()]);
        let snapshot = search.snapshot();
        assert_eq!(snapshot.term, "ab");
        assert_eq!(snapshot.results().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_never_replaces_newer_results() {
        let api = api();
        api.delay_search("a", Duration::from_secs(2));
        let mut search = SearchController::new(api.clone(), DEBOUNCE);

        search.input("a");
        wait(400).await;
        assert_eq!(search.snapshot().status, SearchStatus::Loading);

        search.input("ab");
        wait(5_000).await;

        assert_eq!(api.search_terms(), vec!["a".to_string(), "ab".to_string()]);
        assert_eq!(search.snapshot().term, "ab");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_supersedes_scheduled_search() {
        let api = api();
        let mut search = SearchController::new(api.clone(), DEBOUNCE);

        search.input("jazz");
        let snapshot = search.submit("rock").await;
        wait(1_000).await;

        assert_eq!(snapshot.term, "rock");
        assert_eq!(api.search_terms(), vec!["rock".to_string()]);
        assert_eq!(search.snapshot().term, "rock");
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_terms_do_not_hit_network() {
        let api = api();
        let mut search = SearchController::new(api.clone(), DEBOUNCE);

        search.input("   ");
        wait(1_000).await;
        assert_eq!(search.submit("").await.status, SearchStatus::Idle);
        assert!(api.search_terms().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_failure() {
        let api = api();
        api.fail("search_events");
        let mut search = SearchController::new(api.clone(), DEBOUNCE);

        let snapshot = search.submit("jazz").await;
        assert_eq!(snapshot.status, SearchStatus::Failed("Simulated failure".to_string()));

        search.input("rock");
        search.clear();
        wait(1_000).await;
        assert_eq!(search.snapshot(), SearchSnapshot::default());
        assert_eq!(api.call_count("search_events"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_search() {
        let api = api();
        let search = {
            let mut search = SearchController::new(api.clone(), DEBOUNCE);
            search.input("jazz");
            search.subscribe()
        };
        wait(1_000).await;

        assert!(api.search_terms().is_empty());
        assert_eq!(search.borrow().status, SearchStatus::Idle);
    }
}
