//! Paged list controller: pagination, search filters and loading state for one list view.
//!
//! The owning view builds a [`PagedTable`], subscribes to its state, then calls
//! [`PagedTable::initialize`]. Every handler mutates state and reloads; the view re-renders
//! from the published [`TableState`] snapshots.

use std::{
    collections::BTreeMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::ListPayload;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::{
    config::DEFAULT_PAGE_SIZE,
    notify::{LogNotifier, Notifier},
    params::{FilterValue, QueryParams},
};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load data";

pub type Filters = BTreeMap<String, FilterValue>;

/// Data source behind a list view.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch(&self, params: QueryParams) -> Result<ListPayload<T>>;
}

#[async_trait]
impl<T, F, Fut> PageSource<T> for F
where
    T: Send + 'static,
    F: Fn(QueryParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ListPayload<T>>> + Send + 'static,
{
    async fn fetch(&self, params: QueryParams) -> Result<ListPayload<T>> {
        (self)(params).await
    }
}

/// How responses from overlapping loads are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RacePolicy {
    /// Only the most recently issued load may touch rows, total or the loading flag.
    #[default]
    LatestRequestWins,
    /// Every completion is applied in completion order, whichever load was issued last.
    LastResponseWins,
}

#[derive(Debug, Clone)]
pub struct PagedTableOptions {
    pub auto_load: bool,
    pub page_size: u32,
    pub race_policy: RacePolicy,
}

impl Default for PagedTableOptions {
    fn default() -> Self {
        Self {
            auto_load: true,
            page_size: DEFAULT_PAGE_SIZE,
            race_policy: RacePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableState<T> {
    pub rows: Vec<T>,
    pub total: u64,
    pub loading: bool,
    pub page: u32,
    pub size: u32,
    pub filters: Filters,
}

impl<T> TableState<T> {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.size.max(1)))
    }
}

pub struct PagedTable<T> {
    source: Box<dyn PageSource<T>>,
    notifier: Arc<dyn Notifier>,
    initial_filters: Filters,
    options: PagedTableOptions,
    generation: AtomicU64,
    initialized: AtomicBool,
    state: watch::Sender<TableState<T>>,
}

/// Clears the loading flag when a load exits, including when its future is dropped.
struct LoadingGuard<'a, T: Clone + Send + Sync + 'static> {
    table: &'a PagedTable<T>,
    generation: u64,
}

impl<T: Clone + Send + Sync + 'static> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        if self.table.is_current(self.generation) {
            self.table.state.send_modify(|state| state.loading = false);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> PagedTable<T> {
    pub fn new<K, V>(
        source: impl PageSource<T> + 'static,
        initial_filters: impl IntoIterator<Item = (K, V)>,
        options: PagedTableOptions,
    ) -> Arc<Self>
    where
        K: Into<String>,
        V: Into<FilterValue>,
    {
        Self::new_with_notifier(source, initial_filters, options, Arc::new(LogNotifier))
    }

    pub fn new_with_notifier<K, V>(
        source: impl PageSource<T> + 'static,
        initial_filters: impl IntoIterator<Item = (K, V)>,
        options: PagedTableOptions,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self>
    where
        K: Into<String>,
        V: Into<FilterValue>,
    {
        let initial_filters: Filters = initial_filters
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let (state, _) = watch::channel(TableState {
            rows: Vec::new(),
            total: 0,
            loading: false,
            page: 1,
            size: options.page_size.max(1),
            filters: initial_filters.clone(),
        });

        Arc::new(Self {
            source: Box::new(source),
            notifier,
            initial_filters,
            options,
            generation: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
            state,
        })
    }

    /// Runs the auto-load, once. Call after the view has subscribed.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.options.auto_load {
            self.load().await;
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TableState<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TableState<T> {
        self.state.borrow().clone()
    }

    pub fn page(&self) -> u32 {
        self.state.borrow().page
    }

    pub fn size(&self) -> u32 {
        self.state.borrow().size
    }

    pub fn total(&self) -> u64 {
        self.state.borrow().total
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn filters(&self) -> Filters {
        self.state.borrow().filters.clone()
    }

    pub fn initial_filters(&self) -> &Filters {
        &self.initial_filters
    }

    /// Updates a live filter value without reloading.
    pub fn set_filter(&self, key: impl Into<String>, value: impl Into<FilterValue>) {
        let key = key.into();
        let value = value.into();
        self.state.send_modify(|state| {
            state.filters.insert(key, value);
        });
    }

    /// The request parameters the next load would send.
    pub fn request_params(&self) -> QueryParams {
        let state = self.state.borrow();
        QueryParams::paged(state.page, state.size, &state.filters).strip_empty()
    }

    /// Fetches the current page. Failures are logged and reported through the notifier;
    /// rows and total keep their previous values.
    pub async fn load(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let params = self.request_params();

        self.state.send_modify(|state| state.loading = true);
        let _guard = LoadingGuard {
            table: self,
            generation,
        };

        debug!(generation, page = ?params.page(), size = ?params.size(), "loading list page");
        match self.source.fetch(params).await {
            Ok(payload) => {
                if !self.is_current(generation) {
                    debug!(generation, "discarding stale list response");
                    return;
                }
                let (rows, total) = payload.into_parts();
                debug!(generation, rows = rows.len(), total, "list page loaded");
                self.state.send_modify(|state| {
                    state.rows = rows;
                    state.total = total;
                });
            }
            Err(err) => {
                error!(generation, error = %format!("{err:#}"), "failed to load list page");
                if self.is_current(generation) {
                    self.notifier.error(LOAD_FAILED_MESSAGE);
                }
            }
        }
    }

    pub async fn handle_size_change(&self, size: u32) {
        self.state.send_modify(|state| {
            state.size = size.max(1);
            state.page = 1;
        });
        self.load().await;
    }

    pub async fn handle_current_change(&self, page: u32) {
        self.state.send_modify(|state| state.page = page.max(1));
        self.load().await;
    }

    pub async fn handle_search(&self) {
        self.state.send_modify(|state| state.page = 1);
        self.load().await;
    }

    /// Restores every live filter to its initial value, or to empty text when the key had
    /// none, then searches.
    pub async fn handle_reset(&self) {
        let initial = &self.initial_filters;
        self.state.send_modify(|state| {
            for (key, value) in state.filters.iter_mut() {
                *value = initial
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| FilterValue::text(""));
            }
        });
        self.handle_search().await;
    }

    fn is_current(&self, generation: u64) -> bool {
        match self.options.race_policy {
            RacePolicy::LastResponseWins => true,
            RacePolicy::LatestRequestWins => self.generation.load(Ordering::SeqCst) == generation,
        }
    }
}

#[cfg(test)]
#[path = "tests/paged_table_tests.rs"]
mod tests;
