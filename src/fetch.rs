use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

use crate::api::{PageQuery, ResourceBackend};
use crate::cache::CacheKey;
use crate::error::FetchError;
use crate::model::{FETCH_ALL_PAGE_SIZE, NamespaceScope, ResourceKind, is_fetch_all};
use crate::store::{FetchCompletion, FetchPlan, ResourceStore};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FetchRequest {
    pub kind: ResourceKind,
    pub namespace: NamespaceScope,
    pub page: u32,
    pub page_size: u32,
    pub fetch_all: bool,
    pub reset_data: bool,
}

impl FetchRequest {
    pub fn first_page(kind: ResourceKind, namespace: NamespaceScope, page_size: u32) -> Self {
        Self {
            kind,
            namespace,
            page: 1,
            page_size,
            fetch_all: false,
            reset_data: true,
        }
    }

    pub fn page(kind: ResourceKind, namespace: NamespaceScope, page: u32, page_size: u32) -> Self {
        Self {
            kind,
            namespace,
            page,
            page_size,
            fetch_all: false,
            reset_data: page <= 1,
        }
    }

    pub fn all(kind: ResourceKind, namespace: NamespaceScope) -> Self {
        Self {
            kind,
            namespace,
            page: 1,
            page_size: FETCH_ALL_PAGE_SIZE,
            fetch_all: true,
            reset_data: true,
        }
    }

    /// Fetch-all forces the big page size, page 1 and a reset; an oversized
    /// page size alone also means fetch-all.
    pub fn normalized(mut self) -> Self {
        if self.fetch_all || is_fetch_all(self.page_size) {
            self.fetch_all = true;
            self.page = 1;
            self.page_size = self.page_size.max(FETCH_ALL_PAGE_SIZE);
            self.reset_data = true;
        }
        self.page = self.page.max(1);
        self.page_size = self.page_size.max(1);
        self
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.kind, &self.namespace, self.page, self.page_size)
    }

    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            kind: self.kind,
            namespace: self.namespace.clone(),
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Issued by [`ResourceStore::begin_fetch`]; the generation decides whether
/// the response is still wanted when it arrives.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FetchTicket {
    pub request: FetchRequest,
    pub generation: u64,
    pub count_first: bool,
}

pub async fn fetch_count_estimate<B: ResourceBackend>(
    backend: &B,
    ticket: &FetchTicket,
) -> Option<u64> {
    if !ticket.count_first {
        return None;
    }

    match backend
        .fetch_count(ticket.request.kind, &ticket.request.namespace)
        .await
    {
        Ok(count) => {
            debug!(kind = %ticket.request.kind, count, "count estimate");
            Some(count)
        }
        Err(error) => {
            warn!(kind = %ticket.request.kind, error = %error, "count request failed");
            None
        }
    }
}

pub async fn fetch_page_payload<B: ResourceBackend>(
    backend: &B,
    ticket: &FetchTicket,
) -> Result<Value, FetchError> {
    backend.fetch_page(&ticket.request.page_query()).await
}

/// Runs a whole fetch in place: cache lookup, optional count, page
/// request, processing. Resolves with the raw page payload.
pub async fn fetch_resource_data<B: ResourceBackend>(
    store: &mut ResourceStore,
    backend: &B,
    request: FetchRequest,
) -> Result<Value, FetchError> {
    let ticket = match store.begin_fetch(request, Instant::now()) {
        FetchPlan::Served { payload, .. } => return Ok(payload),
        FetchPlan::Remote(ticket) => ticket,
    };

    if let Some(count) = fetch_count_estimate(backend, &ticket).await {
        store.set_loading_estimate(ticket.request.kind, ticket.generation, count);
    }

    let result = fetch_page_payload(backend, &ticket).await;
    match store.complete_fetch(&ticket, result, Instant::now()) {
        FetchCompletion::Processed { payload, .. } => Ok(payload),
        FetchCompletion::Discarded { latest } => Err(FetchError::Superseded {
            kind: ticket.request.kind.api_name(),
            generation: ticket.generation,
            latest,
        }),
        FetchCompletion::Failed(error) => Err(error),
    }
}
