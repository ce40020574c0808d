use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cache::PageCache;
use crate::config::CacheSettings;
use crate::error::FetchError;
use crate::fetch::{FetchRequest, FetchTicket};
use crate::model::{NamespaceScope, ResourceKind, ResourcePage, SortDirection, SortField, SortSpec, is_fetch_all};
use crate::query::{filter_items, sort_items};

/// Unfiltered working set captured before the first filter or sort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub items: Vec<Value>,
    pub total_count: Option<u64>,
    pub loaded_pages: BTreeSet<u32>,
    pub total_pages: u32,
    pub current_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub message: String,
    pub retry: FetchRequest,
}

#[derive(Debug, Clone)]
pub struct ResourceState {
    pub kind: ResourceKind,
    pub items: Vec<Value>,
    pub original: Option<Snapshot>,
    pub total_count: Option<u64>,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub loaded_pages: BTreeSet<u32>,
    pub sort: Option<SortSpec>,
    pub status_filter: Option<String>,
    pub search: Option<String>,
    pub namespace: NamespaceScope,
    pub generation: u64,
    pub fetched_at: Option<Instant>,
    pub error: Option<FetchFailure>,
    pub loading: bool,
    pub loading_estimate: Option<u64>,
    pub pending_page: Option<u32>,
}

impl ResourceState {
    fn new(kind: ResourceKind, namespace: NamespaceScope, page_size: u32) -> Self {
        Self {
            kind,
            items: Vec::new(),
            original: None,
            total_count: None,
            current_page: 1,
            page_size,
            total_pages: 1,
            loaded_pages: BTreeSet::new(),
            sort: None,
            status_filter: None,
            search: None,
            namespace,
            generation: 0,
            fetched_at: None,
            error: None,
            loading: false,
            loading_estimate: None,
            pending_page: None,
        }
    }

    pub fn total(&self) -> u64 {
        self.total_count.unwrap_or(self.items.len() as u64)
    }

    pub fn has_filter(&self) -> bool {
        self.status_filter.is_some() || self.search.is_some()
    }

    pub fn source_items(&self) -> &[Value] {
        self.original
            .as_ref()
            .map(|snapshot| snapshot.items.as_slice())
            .unwrap_or(&self.items)
    }

    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.fetched_at
            .map(|fetched_at| now.saturating_duration_since(fetched_at))
    }

    fn source_has_page(&self, page: u32) -> bool {
        match &self.original {
            Some(snapshot) => snapshot.loaded_pages.contains(&page),
            None => self.loaded_pages.contains(&page),
        }
    }

    fn capture(&self) -> Snapshot {
        Snapshot {
            items: self.items.clone(),
            total_count: self.total_count,
            loaded_pages: self.loaded_pages.clone(),
            total_pages: self.total_pages,
            current_page: self.current_page,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.items = snapshot.items;
        self.total_count = snapshot.total_count;
        self.loaded_pages = snapshot.loaded_pages;
        self.total_pages = snapshot.total_pages;
        self.current_page = snapshot.current_page;
    }

    fn replace_page(&mut self, page: ResourcePage, page_size: u32) {
        self.original = None;
        self.items = page.items;
        self.loaded_pages = BTreeSet::from([1]);
        self.current_page = 1;
        self.page_size = page_size;
        self.total_count = Some(page.total_count.unwrap_or(self.items.len() as u64));
        self.total_pages = if is_fetch_all(page_size) {
            1
        } else {
            total_pages(self.total(), page_size)
        };
    }

    fn append_page(&mut self, page: ResourcePage, page_number: u32, page_size: u32) {
        let target = match self.original.as_mut() {
            Some(snapshot) => snapshot,
            None => {
                self.items.extend(page.items);
                self.loaded_pages.insert(page_number);
                self.current_page = page_number;
                self.page_size = page_size;
                self.total_count = Some(page.total_count.unwrap_or(self.items.len() as u64));
                self.total_pages = total_pages(self.total(), page_size);
                return;
            }
        };

        target.items.extend(page.items);
        target.loaded_pages.insert(page_number);
        target.current_page = page_number;
        target.total_count = Some(page.total_count.unwrap_or(target.items.len() as u64));
        target.total_pages = total_pages(target.total_count.unwrap_or(0), page_size);
        self.loaded_pages.insert(page_number);
        self.page_size = page_size;
    }

    fn derive_from_snapshot(&mut self) {
        let Some(snapshot) = self.original.as_ref() else {
            return;
        };
        let mut working = filter_items(
            self.kind,
            &snapshot.items,
            self.status_filter.as_deref(),
            self.search.as_deref(),
        );
        if let Some(sort) = &self.sort {
            sort_items(self.kind, &mut working, sort);
        }
        self.items = working;
        self.reset_pagination();
    }

    fn reset_pagination(&mut self) {
        self.current_page = 1;
        self.loaded_pages = BTreeSet::from([1]);
        self.total_count = Some(self.items.len() as u64);
        self.total_pages = 1;
    }
}

pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    let pages = total.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub kind: ResourceKind,
    pub page: u32,
    pub refresh_metrics: bool,
    pub rebind_columns: bool,
    pub resorted: bool,
    pub refiltered: bool,
    pub hide_loading: bool,
    pub duplicate: bool,
}

#[derive(Debug)]
pub enum FetchPlan {
    Served { payload: Value, outcome: PageOutcome },
    Remote(FetchTicket),
}

#[derive(Debug)]
pub enum FetchCompletion {
    Processed { payload: Value, outcome: PageOutcome },
    Discarded { latest: u64 },
    Failed(FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Applied { matched: usize },
    Restored,
    NeedsRefetch,
    NoChange,
}

#[derive(Debug)]
pub struct ResourceStore {
    states: HashMap<ResourceKind, ResourceState>,
    cache: PageCache,
    settings: CacheSettings,
    next_generation: u64,
}

impl ResourceStore {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            states: HashMap::new(),
            cache: PageCache::new(settings.ttl),
            settings,
            next_generation: 0,
        }
    }

    pub fn set_settings(&mut self, settings: CacheSettings) {
        self.settings = settings;
        self.cache.set_ttl(settings.ttl);
    }

    pub fn state(&self, kind: ResourceKind) -> Option<&ResourceState> {
        self.states.get(&kind)
    }

    #[cfg(test)]
    pub fn has_cached(&self, request: &FetchRequest) -> bool {
        self.cache.contains(&request.clone().normalized().cache_key())
    }

    pub fn begin_fetch(&mut self, request: FetchRequest, now: Instant) -> FetchPlan {
        let request = request.normalized();
        self.next_generation += 1;
        let generation = self.next_generation;

        let state = self
            .states
            .entry(request.kind)
            .or_insert_with(|| ResourceState::new(request.kind, request.namespace.clone(), request.page_size));

        let count_first = request.reset_data
            && !request.fetch_all
            && request.page == 1
            && (state.total_count.is_none() || state.items.is_empty());

        if request.fetch_all {
            state.items.clear();
            state.loaded_pages.clear();
            state.original = None;
        }
        state.generation = generation;
        state.namespace = request.namespace.clone();
        state.error = None;
        if request.page == 1 {
            state.loading = true;
            state.loading_estimate = None;
            state.pending_page = None;
        } else {
            state.pending_page = Some(request.page);
        }

        let key = request.cache_key();
        if let Some(entry) = self.cache.get_fresh(&key, now) {
            let payload = entry.payload.clone();
            let fetched_at = entry.fetched_at;
            match self.process_page(request.kind, &payload, request.page, request.page_size, fetched_at) {
                Ok(outcome) => {
                    debug!(%key, "served page from cache");
                    return FetchPlan::Served { payload, outcome };
                }
                Err(error) => {
                    warn!(%key, error = %error, "dropping unusable cache entry");
                    self.cache.remove(&key);
                }
            }
        }

        FetchPlan::Remote(FetchTicket {
            request,
            generation,
            count_first,
        })
    }

    pub fn set_loading_estimate(&mut self, kind: ResourceKind, generation: u64, count: u64) {
        if let Some(state) = self.states.get_mut(&kind)
            && state.generation == generation
            && state.loading
        {
            state.loading_estimate = Some(count);
        }
    }

    /// Applies a network result. Results from superseded generations are
    /// dropped without touching the state.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Value, FetchError>,
        now: Instant,
    ) -> FetchCompletion {
        let kind = ticket.request.kind;
        let Some(state) = self.states.get_mut(&kind) else {
            debug!(%kind, generation = ticket.generation, "state was reset; dropping response");
            return FetchCompletion::Discarded { latest: 0 };
        };
        let latest = state.generation;
        if ticket.generation != latest {
            debug!(%kind, generation = ticket.generation, latest, "discarding superseded response");
            if ticket.request.page > 1 && state.pending_page == Some(ticket.request.page) {
                state.pending_page = None;
            }
            return FetchCompletion::Discarded { latest };
        }

        let request = &ticket.request;
        let payload = match result {
            Ok(payload) => payload,
            Err(error) => {
                self.record_failure(request, &error);
                return FetchCompletion::Failed(error);
            }
        };

        match self.process_page(kind, &payload, request.page, request.page_size, now) {
            Ok(outcome) => {
                if !request.fetch_all {
                    self.cache.insert(request.cache_key(), payload.clone(), now);
                }
                FetchCompletion::Processed { payload, outcome }
            }
            Err(error) => {
                self.record_failure(request, &error);
                FetchCompletion::Failed(error)
            }
        }
    }

    fn record_failure(&mut self, request: &FetchRequest, error: &FetchError) {
        warn!(kind = %request.kind, page = request.page, error = %error, "resource fetch failed");
        if let Some(state) = self.states.get_mut(&request.kind) {
            state.error = Some(FetchFailure {
                message: error.to_string(),
                retry: request.clone(),
            });
            state.loading = false;
            state.loading_estimate = None;
            state.pending_page = None;
        }
    }

    /// A malformed payload leaves the state untouched.
    pub fn process_page(
        &mut self,
        kind: ResourceKind,
        payload: &Value,
        page: u32,
        page_size: u32,
        fetched_at: Instant,
    ) -> Result<PageOutcome, FetchError> {
        let parsed = ResourcePage::from_payload(payload)?;
        let state = self
            .states
            .entry(kind)
            .or_insert_with(|| ResourceState::new(kind, NamespaceScope::All, page_size));

        let replace = page <= 1 || is_fetch_all(page_size);
        let mut outcome = PageOutcome {
            kind,
            page,
            refresh_metrics: replace && kind == ResourceKind::Pods,
            rebind_columns: replace,
            resorted: false,
            refiltered: false,
            hide_loading: replace,
            duplicate: false,
        };

        if replace {
            state.replace_page(parsed, page_size);
            state.loading = false;
            state.loading_estimate = None;
            state.pending_page = None;
        } else if state.source_has_page(page) {
            warn!(%kind, page, "page already loaded; ignoring");
            state.pending_page = None;
            outcome.duplicate = true;
            return Ok(outcome);
        } else {
            state.append_page(parsed, page, page_size);
            state.pending_page = None;
        }
        state.fetched_at = Some(fetched_at);
        state.error = None;

        if state.has_filter() {
            if state.original.is_none() {
                state.original = Some(state.capture());
            }
            state.derive_from_snapshot();
            outcome.refiltered = true;
            outcome.resorted = state.sort.is_some();
        } else if state.original.is_some() {
            state.derive_from_snapshot();
            outcome.resorted = state.sort.is_some();
        } else if let Some(sort) = state.sort.clone() {
            sort_items(kind, &mut state.items, &sort);
            outcome.resorted = true;
        }

        debug!(
            %kind,
            page,
            items = state.items.len(),
            total = state.total(),
            pages = state.total_pages,
            "processed page"
        );
        Ok(outcome)
    }

    pub fn apply_filter(
        &mut self,
        kind: ResourceKind,
        status: Option<&str>,
        search: Option<&str>,
    ) -> FilterResult {
        let Some(state) = self.states.get_mut(&kind) else {
            return FilterResult::NoChange;
        };

        let status = normalize_input(status);
        let search = normalize_input(search);
        if state.status_filter == status && state.search == search {
            return FilterResult::NoChange;
        }

        let had_filter = state.has_filter();
        state.status_filter = status;
        state.search = search;

        if !state.has_filter() {
            let Some(snapshot) = state.original.take() else {
                return if had_filter {
                    FilterResult::NeedsRefetch
                } else {
                    FilterResult::NoChange
                };
            };
            if state.sort.is_some() {
                state.original = Some(snapshot);
                state.derive_from_snapshot();
            } else {
                state.restore(snapshot);
            }
            return FilterResult::Restored;
        }

        if state.original.is_none() {
            state.original = Some(state.capture());
        }
        state.derive_from_snapshot();
        FilterResult::Applied {
            matched: state.items.len(),
        }
    }

    pub fn apply_sort(&mut self, kind: ResourceKind, sort: SortSpec) -> bool {
        let Some(state) = self.states.get_mut(&kind) else {
            return false;
        };
        if state.original.is_none() {
            state.original = Some(state.capture());
        }
        state.sort = Some(sort);
        state.derive_from_snapshot();
        true
    }

    pub fn toggle_sort(&mut self, kind: ResourceKind, field: SortField) -> Option<SortSpec> {
        let current = self.states.get(&kind)?.sort.clone();
        let sort = match current {
            Some(current) if current.field == field => SortSpec {
                field,
                direction: current.direction.toggled(),
            },
            _ => SortSpec {
                field,
                direction: SortDirection::Asc,
            },
        };
        self.apply_sort(kind, sort.clone()).then_some(sort)
    }

    pub fn reset_all(&mut self) {
        self.states.clear();
        self.cache.clear();
        info!("resource store reset");
    }

    pub fn invalidate(&mut self, kind: ResourceKind) {
        self.cache.invalidate_kind(kind);
        if let Some(state) = self.states.get_mut(&kind) {
            state.fetched_at = None;
        }
    }

    pub fn invalidate_all(&mut self) {
        for kind in ResourceKind::ALL {
            self.invalidate(kind);
        }
    }

    pub fn purge_expired(&mut self, now: Instant) -> usize {
        self.cache.purge_expired(now)
    }

    // Never while a first page is already loading.
    pub fn needs_fetch(
        &self,
        kind: ResourceKind,
        namespace: &NamespaceScope,
        want_all: bool,
        now: Instant,
    ) -> bool {
        let Some(state) = self.states.get(&kind) else {
            return true;
        };
        if state.loading {
            return false;
        }
        if &state.namespace != namespace {
            return true;
        }
        if want_all && !is_fetch_all(state.page_size) {
            return true;
        }
        match state.age(now) {
            None => true,
            Some(age) => age >= self.settings.ttl,
        }
    }

    pub fn is_stale(&self, kind: ResourceKind, now: Instant) -> bool {
        self.states
            .get(&kind)
            .and_then(|state| state.age(now))
            .is_some_and(|age| age >= self.settings.stale_after)
    }

    /// `ceil(items / page_size) + 1` while the server reports more items.
    pub fn next_page_to_load(&self, kind: ResourceKind) -> Option<u32> {
        let state = self.states.get(&kind)?;
        if state.loading || state.pending_page.is_some() {
            return None;
        }
        let held = state.items.len() as u64;
        if held >= state.total() || is_fetch_all(state.page_size) {
            return None;
        }
        Some(total_pages(held, state.page_size).saturating_add(1).max(2))
    }
}

fn normalize_input(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
