use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::api::{MaintenanceOp, NamespaceOp, ResourceBackend};
use crate::config::DashboardConfig;
use crate::console::{CONSOLE_HELP, ConsoleCommand, parse_console_line};
use crate::error::FetchError;
use crate::fetch::{FetchRequest, FetchTicket, fetch_resource_data};
use crate::input::Action;
use crate::metrics::{DashboardMetrics, compute_dashboard_metrics};
use crate::model::{
    ActionKind, ActionRequest, ChartEntry, ClusterCapacity, FETCH_ALL_THRESHOLD, NamespaceScope,
    NamespaceSummary, ResourceKind, SortDirection, SortField, SortSpec, Tab,
};
use crate::namespace::validate_namespace_name;
use crate::nav::{Location, NavEffect, Navigator, Transition, ViewMemory};
use crate::query::{resource_name, resource_namespace};
use crate::render::{RenderContext, RenderMode, TableView, render_current_page, summary_cards};
use crate::store::{FetchCompletion, FetchPlan, FilterResult, PageOutcome, ResourceStore};
use crate::yaml::ManifestPreview;

pub const SETTINGS_ACTIONS: [MaintenanceOp; 4] = [
    MaintenanceOp::HealthCheck,
    MaintenanceOp::RefreshApplication,
    MaintenanceOp::RefreshDatabase,
    MaintenanceOp::Restart,
];

const CONSOLE_HISTORY_LIMIT: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    Command,
    Console,
    CreateNamespace,
    ManifestPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodView {
    Details,
    Describe,
    Logs,
}

impl PodView {
    pub fn label(self) -> &'static str {
        match self {
            Self::Details => "Details",
            Self::Describe => "Describe",
            Self::Logs => "Logs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Fetch(FetchRequest),
    LoadCapacity,
    LoadNamespaces,
    LoadNamespaceDetails,
    NamespaceOp {
        op: NamespaceOp,
        name: String,
    },
    UpdateNamespace {
        name: String,
        path: PathBuf,
    },
    LoadPod {
        namespace: String,
        name: String,
        view: PodView,
    },
    RunAction(ActionRequest),
    LoadCharts,
    DeleteChart {
        name: String,
        version: String,
    },
    Maintenance(MaintenanceOp),
    LoadManifest(PathBuf),
    UploadManifest,
    Batch(Vec<AppCommand>),
}

impl AppCommand {
    fn batch(commands: Vec<AppCommand>) -> Self {
        let mut commands = commands
            .into_iter()
            .filter(|command| *command != AppCommand::None)
            .collect::<Vec<_>>();
        match commands.len() {
            0 => AppCommand::None,
            1 => commands.remove(0),
            _ => AppCommand::Batch(commands),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    prompt: String,
    command: AppCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailOverlay {
    pub title: String,
    pub body: String,
    pub scroll: u16,
    /// Set for pod detail views; closing one invalidates dashboard data.
    pub pod_view: bool,
}

#[derive(Debug)]
pub struct App {
    running: bool,
    mode: InputMode,
    input: String,
    search_before_input: Option<String>,
    status: String,
    show_help: bool,
    pending_g: bool,
    pending_confirmation: Option<PendingConfirmation>,
    namespace_picker: Option<usize>,
    server: String,
    namespace: NamespaceScope,
    page_size: u32,
    store: ResourceStore,
    nav: Navigator,
    selections: HashMap<Location, usize>,
    capacity: ClusterCapacity,
    metrics: DashboardMetrics,
    namespaces: Vec<String>,
    namespace_details: Vec<NamespaceSummary>,
    charts: Vec<ChartEntry>,
    manifest: Option<ManifestPreview>,
    console: Vec<String>,
    detail: Option<DetailOverlay>,
    health: Option<String>,
    table_page_size: usize,
    detail_page_size: u16,
}

impl App {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            running: true,
            mode: InputMode::Normal,
            input: String::new(),
            search_before_input: None,
            status: "Ready".to_string(),
            show_help: false,
            pending_g: false,
            pending_confirmation: None,
            namespace_picker: None,
            server: config.server.clone(),
            namespace: config.namespace.clone(),
            page_size: config.page_size,
            store: ResourceStore::new(config.cache),
            nav: Navigator::new(Location::Home(ResourceKind::Pods)),
            selections: HashMap::new(),
            capacity: ClusterCapacity::default(),
            metrics: DashboardMetrics::default(),
            namespaces: Vec::new(),
            namespace_details: Vec::new(),
            charts: Vec::new(),
            manifest: None,
            console: Vec::new(),
            detail: None,
            health: None,
            table_page_size: 10,
            detail_page_size: 10,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn pending_confirmation_prompt(&self) -> Option<&str> {
        self.pending_confirmation
            .as_ref()
            .map(|pending| pending.prompt.as_str())
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn namespace_scope(&self) -> &NamespaceScope {
        &self.namespace
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn location(&self) -> Location {
        self.nav.current()
    }

    pub fn active_tab(&self) -> Tab {
        self.nav.current().tab()
    }

    pub fn can_go_back(&self) -> bool {
        self.nav.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.nav.can_go_forward()
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn capacity(&self) -> ClusterCapacity {
        self.capacity
    }

    pub fn metrics(&self) -> &DashboardMetrics {
        &self.metrics
    }

    pub fn namespace_choices(&self) -> Vec<String> {
        std::iter::once("all".to_string())
            .chain(self.namespaces.iter().cloned())
            .collect()
    }

    pub fn namespace_picker(&self) -> Option<usize> {
        self.namespace_picker
    }

    pub fn namespace_details(&self) -> &[NamespaceSummary] {
        &self.namespace_details
    }

    pub fn charts(&self) -> &[ChartEntry] {
        &self.charts
    }

    pub fn manifest(&self) -> Option<&ManifestPreview> {
        self.manifest.as_ref()
    }

    pub fn console_lines(&self) -> &[String] {
        &self.console
    }

    pub fn detail(&self) -> Option<&DetailOverlay> {
        self.detail.as_ref()
    }

    pub fn health(&self) -> Option<&str> {
        self.health.as_deref()
    }

    pub fn selected_index(&self) -> usize {
        self.selections
            .get(&self.nav.current())
            .copied()
            .unwrap_or(0)
    }

    pub fn set_table_page_size(&mut self, rows: usize) {
        self.table_page_size = rows.max(1);
    }

    pub fn set_detail_page_size(&mut self, rows: u16) {
        self.detail_page_size = rows.max(1);
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
    }

    pub fn table_view(&self) -> Option<TableView> {
        let location = self.nav.current();
        let kind = location.resource_kind()?;
        let mode = match location {
            Location::Home(_) => RenderMode::LoadMore,
            _ => RenderMode::FullList,
        };
        Some(render_current_page(
            &self.store,
            kind,
            RenderContext {
                mode,
                selected: self.selected_index(),
                now: Instant::now(),
                clock: Utc::now(),
            },
        ))
    }

    pub fn startup_command(&mut self) -> AppCommand {
        let mut commands = vec![AppCommand::LoadCapacity, AppCommand::LoadNamespaces];
        for effect in self.nav.initial_effects() {
            commands.push(self.effect_command(effect));
        }
        AppCommand::batch(commands)
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if let Some(pending) = self.pending_confirmation.take() {
            match action {
                Action::ConfirmYes | Action::EnterResource => {
                    self.status = format!("Confirmed: {}", pending.prompt);
                    return pending.command;
                }
                Action::ConfirmNo | Action::CancelInput | Action::ClearDetailOverlay => {
                    self.status = "Action cancelled".to_string();
                    return AppCommand::None;
                }
                _ => {
                    self.pending_confirmation = Some(pending);
                    self.status =
                        "Pending confirmation: press y to confirm or n to cancel".to_string();
                    return AppCommand::None;
                }
            }
        }

        if self.mode != InputMode::Normal {
            return self.apply_input_action(action);
        }

        if let Some(index) = self.namespace_picker {
            return self.apply_picker_action(action, index);
        }

        if !matches!(action, Action::GPrefix) {
            self.pending_g = false;
        }

        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
        }

        match action {
            Action::Quit => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            Action::NextTab => self.switch_tab_by_offset(1),
            Action::PrevTab => self.switch_tab_by_offset(-1),
            Action::SwitchTab(number) => {
                match Tab::ALL.get(usize::from(number).saturating_sub(1)) {
                    Some(tab) => self.activate_tab(*tab),
                    None => AppCommand::None,
                }
            }
            Action::PickNamespace => self.open_namespace_picker(),
            Action::NextKind => self.switch_kind_by_offset(1),
            Action::PrevKind => self.switch_kind_by_offset(-1),
            Action::HistoryBack => {
                let memory = self.view_memory();
                match self.nav.back(memory) {
                    Some(transition) => self.apply_transition(transition),
                    None => {
                        self.status = "No earlier view".to_string();
                        AppCommand::None
                    }
                }
            }
            Action::HistoryForward => {
                let memory = self.view_memory();
                match self.nav.forward(memory) {
                    Some(transition) => self.apply_transition(transition),
                    None => {
                        self.status = "No later view".to_string();
                        AppCommand::None
                    }
                }
            }
            Action::Down => {
                self.scroll_or_select(1);
                AppCommand::None
            }
            Action::Up => {
                self.scroll_or_select(-1);
                AppCommand::None
            }
            Action::PageDown => {
                if self.detail.is_some() {
                    self.scroll_detail(self.detail_page_size as isize);
                } else {
                    self.move_selection(self.table_page_size as isize);
                }
                AppCommand::None
            }
            Action::PageUp => {
                if self.detail.is_some() {
                    self.scroll_detail(-(self.detail_page_size as isize));
                } else {
                    self.move_selection(-(self.table_page_size as isize));
                }
                AppCommand::None
            }
            Action::Top => {
                self.select_first();
                AppCommand::None
            }
            Action::Bottom => {
                if let Some(detail) = self.detail.as_mut() {
                    detail.scroll = detail_line_count(&detail.body).saturating_sub(1);
                } else {
                    let last = self.row_count().saturating_sub(1);
                    self.selections.insert(self.nav.current(), last);
                }
                AppCommand::None
            }
            Action::GPrefix => {
                if self.pending_g {
                    self.pending_g = false;
                    self.select_first();
                } else {
                    self.pending_g = true;
                    self.status = "g".to_string();
                }
                AppCommand::None
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::EnterResource => self.enter_selected(),
            Action::ShowDetails => self.describe_selected(),
            Action::ShowLogs => self.logs_for_selected(),
            Action::ShowEvents => self.events_for_selected(),
            Action::DeleteSelected => self.delete_selected(),
            Action::StartCommand => {
                self.mode = InputMode::Command;
                self.input.clear();
                self.status = "Command mode".to_string();
                AppCommand::None
            }
            Action::StartSearch => {
                let Some(kind) = self.current_kind() else {
                    self.status = "Search is available on resource tabs".to_string();
                    return AppCommand::None;
                };
                let current = self
                    .store
                    .state(kind)
                    .and_then(|state| state.search.clone())
                    .unwrap_or_default();
                self.search_before_input = Some(current.clone());
                self.input = current;
                self.mode = InputMode::Search;
                self.status = format!("Search {}", kind.title());
                AppCommand::None
            }
            Action::StartInsert => self.start_insert(),
            Action::UploadManifest => self.request_upload(),
            Action::CycleStatusFilter => self.cycle_status_filter(),
            Action::ClearFilters => match self.current_kind() {
                Some(kind) => self.set_filters(kind, None, None),
                None => AppCommand::None,
            },
            Action::CycleSort => self.cycle_sort(),
            Action::FlipSort => self.flip_sort(),
            Action::LoadMore => self.load_more(),
            Action::FetchAll => match self.current_kind() {
                Some(kind) => {
                    self.status = format!("Fetching all {}", kind.title());
                    AppCommand::Fetch(FetchRequest::all(kind, self.namespace.clone()))
                }
                None => AppCommand::None,
            },
            Action::Refresh => self.refresh_current(),
            Action::ClearDetailOverlay => self.close_detail_or_search(),
            Action::ConfirmYes | Action::ConfirmNo => {
                self.status = "Nothing to confirm".to_string();
                AppCommand::None
            }
            Action::SubmitInput
            | Action::CancelInput
            | Action::Backspace
            | Action::DeleteWord
            | Action::InputChar(_) => AppCommand::None,
        }
    }

    pub fn begin_fetch(&mut self, request: FetchRequest) -> Option<FetchTicket> {
        let kind = request.kind;
        match self.store.begin_fetch(request, Instant::now()) {
            FetchPlan::Served { outcome, .. } => {
                self.apply_page_outcome(outcome);
                None
            }
            FetchPlan::Remote(ticket) => {
                self.status = if ticket.request.page > 1 {
                    format!("Loading {} page {}…", kind.title(), ticket.request.page)
                } else {
                    format!("Loading {}…", kind.title())
                };
                Some(ticket)
            }
        }
    }

    pub fn record_count_estimate(&mut self, ticket: &FetchTicket, count: u64) {
        self.store
            .set_loading_estimate(ticket.request.kind, ticket.generation, count);
        if self
            .store
            .state(ticket.request.kind)
            .is_some_and(|state| state.generation == ticket.generation && state.loading)
        {
            self.status = format!("Loading {count} items…");
        }
    }

    pub fn complete_fetch(&mut self, ticket: &FetchTicket, result: Result<Value, FetchError>) {
        let kind = ticket.request.kind;
        match self.store.complete_fetch(ticket, result, Instant::now()) {
            FetchCompletion::Processed { outcome, .. } => self.apply_page_outcome(outcome),
            FetchCompletion::Discarded { latest } => {
                debug!(%kind, generation = ticket.generation, latest, "ignored superseded page");
            }
            FetchCompletion::Failed(error) => self.report_fetch_failure(kind, &error),
        }
    }

    /// Loads the opening view in place, before the event loop starts.
    pub async fn prime<B: ResourceBackend>(&mut self, backend: &B) {
        let Some(kind) = self.current_kind() else {
            return;
        };
        let request = self.fetch_request_for(kind);
        match fetch_resource_data(&mut self.store, backend, request).await {
            Ok(payload) => {
                let received = payload
                    .pointer("/data/items")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                if kind == ResourceKind::Pods {
                    self.refresh_metrics();
                }
                let total = self.store.state(kind).map_or(0, |state| state.total());
                self.status = format!("{}: {received} of {total} loaded", kind.title());
            }
            Err(error @ FetchError::Superseded { .. }) => {
                debug!(%kind, error = %error, "initial load superseded");
            }
            Err(error) => self.report_fetch_failure(kind, &error),
        }
    }

    fn report_fetch_failure(&mut self, kind: ResourceKind, error: &FetchError) {
        let summary = summarize_error_line(&error.to_string());
        let cause = if error.is_transport() {
            "backend unavailable"
        } else {
            "bad response"
        };
        self.set_status(format!(
            "{} load failed, {cause}: {summary} (r to retry)",
            kind.title()
        ));
    }

    fn apply_page_outcome(&mut self, outcome: PageOutcome) {
        let kind = outcome.kind;
        if outcome.refresh_metrics {
            self.refresh_metrics();
        }
        if outcome.rebind_columns {
            self.selections.insert(Location::Home(kind), 0);
            self.selections.insert(Location::Resources(kind), 0);
        }

        if outcome.duplicate {
            self.status = format!("{} page {} already loaded", kind.title(), outcome.page);
            return;
        }

        if let Some(state) = self.store.state(kind) {
            let mut status = format!(
                "{}: {} of {} loaded",
                kind.title(),
                state.source_items().len(),
                state.original
                    .as_ref()
                    .and_then(|snapshot| snapshot.total_count)
                    .unwrap_or_else(|| state.total())
            );
            if outcome.refiltered {
                status.push_str(&format!(", {} shown", state.items.len()));
            }
            if outcome.resorted && let Some(sort) = &state.sort {
                status.push_str(&format!(", sorted by {}", sort.field.label()));
            }
            self.status = status;
        }
    }

    fn refresh_metrics(&mut self) {
        if let Some(state) = self.store.state(ResourceKind::Pods) {
            self.metrics = compute_dashboard_metrics(state.source_items(), self.capacity);
        }
    }

    pub fn set_capacity(&mut self, capacity: ClusterCapacity) {
        self.capacity = capacity;
        self.refresh_metrics();
    }

    pub fn set_namespaces(&mut self, mut namespaces: Vec<String>) {
        namespaces.sort();
        namespaces.dedup();
        self.namespaces = namespaces;
    }

    pub fn set_namespace_details(&mut self, mut details: Vec<NamespaceSummary>) {
        details.sort_by(|left, right| left.name.cmp(&right.name));
        self.namespace_details = details;
        self.clamp_selection(Location::Namespaces);
        self.status = format!("{} namespaces", self.namespace_details.len());
    }

    pub fn set_charts(&mut self, charts: Vec<ChartEntry>) {
        self.charts = charts;
        self.clamp_selection(Location::Charts);
        self.status = format!("{} charts", self.charts.len());
    }

    pub fn set_manifest(&mut self, preview: ManifestPreview) {
        self.status = format!(
            "Loaded {} ({} documents); press u to upload",
            preview.file_name,
            preview.documents.len()
        );
        self.manifest = Some(preview);
    }

    pub fn set_detail_overlay(&mut self, title: impl Into<String>, body: String) {
        self.detail = Some(DetailOverlay {
            title: title.into(),
            body,
            scroll: 0,
            pod_view: false,
        });
    }

    pub fn show_pod_view(&mut self, namespace: &str, name: &str, view: PodView, body: String) {
        self.nav.enter_detail();
        self.detail = Some(DetailOverlay {
            title: format!("Pod {} {namespace}/{name}", view.label()),
            body,
            scroll: 0,
            pod_view: true,
        });
        self.status = format!("Loaded {} for {namespace}/{name}", view.label().to_lowercase());
    }

    pub fn push_console_output(&mut self, text: &str) {
        self.console.extend(text.lines().map(str::to_string));
        if self.console.len() > CONSOLE_HISTORY_LIMIT {
            let overflow = self.console.len() - CONSOLE_HISTORY_LIMIT;
            self.console.drain(..overflow);
        }
    }

    pub fn action_completed(&mut self, request: &ActionRequest, output: &str) -> AppCommand {
        let target = format!("{}/{}", request.namespace, request.name);
        if self.active_tab() == Tab::Cli {
            self.push_console_output(output);
        } else {
            self.set_detail_overlay(
                format!("{} {} {target}", request.action.as_str(), request.kind.title()),
                output.to_string(),
            );
        }
        self.status = format!("{} {} {target} done", request.action.as_str(), request.kind.title());

        if request.action != ActionKind::Delete {
            return AppCommand::None;
        }
        self.store.invalidate(request.kind);
        if self.current_kind() == Some(request.kind) {
            AppCommand::Fetch(self.fetch_request_for(request.kind))
        } else {
            AppCommand::None
        }
    }

    pub fn namespace_op_completed(&mut self, op: NamespaceOp, name: &str, output: String) -> AppCommand {
        match op {
            NamespaceOp::Events => {
                self.set_detail_overlay(format!("Events {name}"), output);
                AppCommand::None
            }
            NamespaceOp::Describe => {
                self.set_detail_overlay(format!("Namespace {name}"), output);
                AppCommand::None
            }
            NamespaceOp::Edit => {
                self.set_detail_overlay(format!("Namespace manifest {name}"), output);
                AppCommand::None
            }
            NamespaceOp::Create => {
                self.set_status(format!("Created namespace {name}"));
                AppCommand::Batch(vec![
                    AppCommand::LoadNamespaces,
                    AppCommand::LoadNamespaceDetails,
                ])
            }
            NamespaceOp::Delete => {
                self.set_status(format!("Deleted namespace {name}"));
                let mut commands = vec![
                    AppCommand::LoadNamespaces,
                    AppCommand::LoadNamespaceDetails,
                ];
                if self.namespace == NamespaceScope::Named(name.to_string()) {
                    commands.push(self.set_namespace(NamespaceScope::All));
                }
                AppCommand::batch(commands)
            }
        }
    }

    pub fn maintenance_completed(&mut self, op: MaintenanceOp, output: String) -> AppCommand {
        let summary = summarize_error_line(&output);
        match op {
            MaintenanceOp::HealthCheck => {
                self.set_status(format!("Health: {summary}"));
                self.health = Some(output);
                AppCommand::None
            }
            MaintenanceOp::RefreshApplication | MaintenanceOp::RefreshDatabase => {
                self.set_status(format!("{} finished: {summary}", op.label()));
                self.store.invalidate_all();
                match self.current_kind() {
                    Some(kind) => AppCommand::Fetch(self.fetch_request_for(kind)),
                    None => AppCommand::None,
                }
            }
            MaintenanceOp::Restart => {
                self.set_status(format!("Restart requested: {summary}"));
                AppCommand::None
            }
        }
    }

    pub fn manifest_uploaded(&mut self, output: &str) -> AppCommand {
        let file_name = self
            .manifest
            .as_ref()
            .map(|preview| preview.file_name.clone())
            .unwrap_or_default();
        self.set_status(format!("Uploaded {file_name}: {}", summarize_error_line(output)));
        self.push_console_output(&format!("uploaded {file_name}\n{output}"));
        self.store.invalidate_all();
        AppCommand::LoadNamespaces
    }

    pub fn apply_config(&mut self, config: &DashboardConfig) -> AppCommand {
        self.server = config.server.clone();
        self.store.set_settings(config.cache);
        let page_size_changed = self.page_size != config.page_size;
        self.page_size = config.page_size;
        self.set_status(format!(
            "Config reloaded from {}",
            config.source.as_deref().unwrap_or("defaults")
        ));
        if page_size_changed {
            self.store.reset_all();
            return match self.current_kind() {
                Some(kind) => AppCommand::Fetch(self.fetch_request_for(kind)),
                None => AppCommand::None,
            };
        }
        AppCommand::None
    }

    /// Surfaces the outdated-data banner text and drops expired pages.
    /// Never refetches on its own.
    pub fn check_staleness(&mut self, now: Instant) {
        let purged = self.store.purge_expired(now);
        if purged > 0 {
            debug!(purged, "expired cached pages");
        }
        if let Some(kind) = self.current_kind()
            && self.store.is_stale(kind, now)
        {
            self.status = format!("{} data may be outdated; press r to refresh", kind.title());
        }
    }

    fn apply_input_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::CancelInput => {
                let mode = self.mode;
                self.mode = InputMode::Normal;
                self.input.clear();
                self.status = "Input cancelled".to_string();
                if mode == InputMode::Search
                    && let (Some(kind), Some(previous)) =
                        (self.current_kind(), self.search_before_input.take())
                {
                    let status = self.current_status_filter(kind);
                    return self.set_filters(kind, status, Some(previous));
                }
                AppCommand::None
            }
            Action::SubmitInput => self.submit_input(),
            Action::Backspace => {
                self.input.pop();
                self.live_search()
            }
            Action::DeleteWord => {
                let trimmed = self.input.trim_end().len();
                self.input.truncate(trimmed);
                let cut = self
                    .input
                    .rfind(char::is_whitespace)
                    .map(|index| index + 1)
                    .unwrap_or(0);
                self.input.truncate(cut);
                self.live_search()
            }
            Action::InputChar(c) => {
                self.input.push(c);
                self.live_search()
            }
            _ => AppCommand::None,
        }
    }

    fn live_search(&mut self) -> AppCommand {
        if self.mode != InputMode::Search {
            return AppCommand::None;
        }
        let Some(kind) = self.current_kind() else {
            return AppCommand::None;
        };
        let status = self.current_status_filter(kind);
        let search = self.input.clone();
        self.set_filters(kind, status, Some(search))
    }

    fn submit_input(&mut self) -> AppCommand {
        let mode = self.mode;
        let input = self.input.trim().to_string();
        match mode {
            InputMode::Normal => AppCommand::None,
            InputMode::Search => {
                self.mode = InputMode::Normal;
                self.search_before_input = None;
                self.input.clear();
                if input.is_empty() {
                    self.status = "Search cleared".to_string();
                } else {
                    self.status = format!("Search: {input}");
                }
                AppCommand::None
            }
            InputMode::Command => {
                self.mode = InputMode::Normal;
                self.input.clear();
                self.execute_command_line(&input)
            }
            InputMode::Console => {
                self.input.clear();
                self.submit_console_line(&input)
            }
            InputMode::CreateNamespace => match validate_namespace_name(&input) {
                Ok(name) => {
                    let name = name.to_string();
                    self.mode = InputMode::Normal;
                    self.input.clear();
                    self.status = format!("Creating namespace {name}…");
                    AppCommand::NamespaceOp {
                        op: NamespaceOp::Create,
                        name,
                    }
                }
                Err(error) => {
                    self.status = format!("Invalid namespace name: {error}");
                    AppCommand::None
                }
            },
            InputMode::ManifestPath => {
                self.mode = InputMode::Normal;
                self.input.clear();
                if input.is_empty() {
                    self.status = "Manifest path is required".to_string();
                    return AppCommand::None;
                }
                AppCommand::LoadManifest(expand_home(&input))
            }
        }
    }

    fn submit_console_line(&mut self, line: &str) -> AppCommand {
        if line.is_empty() {
            self.mode = InputMode::Normal;
            self.status = "Console closed".to_string();
            return AppCommand::None;
        }

        self.push_console_output(&format!("$ {line}"));
        let default_namespace = match &self.namespace {
            NamespaceScope::Named(namespace) => Some(namespace.as_str()),
            NamespaceScope::All => None,
        };
        match parse_console_line(line, default_namespace) {
            Ok(ConsoleCommand::Run(request)) => {
                self.status = format!("Running {} on {}/{}", request.action.as_str(), request.namespace, request.name);
                AppCommand::RunAction(request)
            }
            Ok(ConsoleCommand::Clear) => {
                self.console.clear();
                AppCommand::None
            }
            Ok(ConsoleCommand::Help) => {
                self.push_console_output(CONSOLE_HELP);
                AppCommand::None
            }
            Err(error) => {
                self.push_console_output(&format!("error: {error}"));
                self.status = error.to_string();
                AppCommand::None
            }
        }
    }

    fn execute_command_line(&mut self, line: &str) -> AppCommand {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            self.status = "Empty command".to_string();
            return AppCommand::None;
        };
        let args = parts.collect::<Vec<_>>();

        match command {
            "q" | "quit" | "exit" => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            "help" | "h" => {
                self.show_help = true;
                AppCommand::None
            }
            "refresh" | "r" => self.refresh_current(),
            "ns" | "namespace" => match args.first() {
                Some(namespace) => self.set_namespace(NamespaceScope::from_label(namespace)),
                None => self.activate_tab(Tab::Namespaces),
            },
            "tab" => match args.first().and_then(|token| Tab::from_token(token)) {
                Some(tab) => self.activate_tab(tab),
                None => {
                    self.status = format!("Unknown tab: {}", args.join(" "));
                    AppCommand::None
                }
            },
            "sort" => {
                let Some(kind) = self.current_kind() else {
                    self.status = "Sort is available on resource tabs".to_string();
                    return AppCommand::None;
                };
                let Some(field) = args.first() else {
                    self.status = "Usage: sort <field> [asc|desc]".to_string();
                    return AppCommand::None;
                };
                let direction = match args.get(1).map(|value| value.to_ascii_lowercase()) {
                    Some(value) if value == "desc" => SortDirection::Desc,
                    _ => SortDirection::Asc,
                };
                self.apply_sort(
                    kind,
                    SortSpec {
                        field: SortField::from_token(field),
                        direction,
                    },
                )
            }
            "status" | "filter" => {
                let Some(kind) = self.current_kind() else {
                    return AppCommand::None;
                };
                let status = args
                    .first()
                    .filter(|value| !value.eq_ignore_ascii_case("all"))
                    .map(|value| value.to_string());
                let search = self.current_search(kind);
                self.set_filters(kind, status, search)
            }
            "search" => {
                let Some(kind) = self.current_kind() else {
                    return AppCommand::None;
                };
                let status = self.current_status_filter(kind);
                self.set_filters(kind, status, Some(args.join(" ")))
            }
            "page-size" | "pagesize" => match args.first().and_then(|value| value.parse::<u32>().ok()) {
                Some(size) if size > 0 => {
                    self.page_size = size.min(FETCH_ALL_THRESHOLD);
                    self.store.reset_all();
                    self.status = format!("Page size set to {}", self.page_size);
                    match self.current_kind() {
                        Some(kind) => AppCommand::Fetch(self.fetch_request_for(kind)),
                        None => AppCommand::None,
                    }
                }
                _ => {
                    self.status = "Usage: page-size <n>".to_string();
                    AppCommand::None
                }
            },
            "all" | "fetch-all" => self.apply_action(Action::FetchAll),
            "more" => self.load_more(),
            "back" => self.apply_action(Action::HistoryBack),
            "forward" => self.apply_action(Action::HistoryForward),
            "capacity" => AppCommand::LoadCapacity,
            "create-ns" => match args.first().map(|name| validate_namespace_name(name)) {
                Some(Ok(name)) => AppCommand::NamespaceOp {
                    op: NamespaceOp::Create,
                    name: name.to_string(),
                },
                Some(Err(error)) => {
                    self.status = format!("Invalid namespace name: {error}");
                    AppCommand::None
                }
                None => {
                    self.mode = InputMode::CreateNamespace;
                    self.status = "New namespace name".to_string();
                    AppCommand::None
                }
            },
            "delete-ns" => match args.first() {
                Some(name) => self.confirm_namespace_delete(name),
                None => {
                    self.status = "Usage: delete-ns <name>".to_string();
                    AppCommand::None
                }
            },
            "describe-ns" | "events-ns" | "edit-ns" => {
                let op = match command {
                    "describe-ns" => NamespaceOp::Describe,
                    "events-ns" => NamespaceOp::Events,
                    _ => NamespaceOp::Edit,
                };
                match args.first() {
                    Some(name) => AppCommand::NamespaceOp {
                        op,
                        name: name.to_string(),
                    },
                    None => {
                        self.status = format!("Usage: {command} <name>");
                        AppCommand::None
                    }
                }
            }
            "update-ns" => match (args.first(), args.get(1)) {
                (Some(name), Some(path)) => AppCommand::UpdateNamespace {
                    name: name.to_string(),
                    path: expand_home(path),
                },
                _ => {
                    self.status = "Usage: update-ns <name> <manifest path>".to_string();
                    AppCommand::None
                }
            },
            "load" | "open" => match args.first() {
                Some(path) => AppCommand::LoadManifest(expand_home(path)),
                None => {
                    self.status = "Usage: load <manifest path>".to_string();
                    AppCommand::None
                }
            },
            "upload" => self.request_upload(),
            "health" => AppCommand::Maintenance(MaintenanceOp::HealthCheck),
            "refresh-app" => AppCommand::Maintenance(MaintenanceOp::RefreshApplication),
            "refresh-db" => AppCommand::Maintenance(MaintenanceOp::RefreshDatabase),
            "restart" => self.confirm(
                "Restart the backend application?",
                AppCommand::Maintenance(MaintenanceOp::Restart),
            ),
            other => {
                if let Some(kind) = ResourceKind::from_token(other) {
                    let target = match self.nav.current() {
                        location @ (Location::Home(_) | Location::Resources(_)) => {
                            location.with_kind(kind)
                        }
                        _ => Location::Home(kind),
                    };
                    return self.activate(target);
                }
                if let Some(tab) = Tab::from_token(other) {
                    return self.activate_tab(tab);
                }
                self.status = format!("Unknown command: {other}");
                AppCommand::None
            }
        }
    }

    fn open_namespace_picker(&mut self) -> AppCommand {
        if self.namespaces.is_empty() {
            self.status = "Namespace list not loaded yet; fetching".to_string();
            return AppCommand::LoadNamespaces;
        }
        let current = self.namespace.label();
        let index = self
            .namespace_choices()
            .iter()
            .position(|choice| *choice == current)
            .unwrap_or(0);
        self.namespace_picker = Some(index);
        self.status = "Select a namespace: j/k to move, Enter to switch, Esc to close".to_string();
        AppCommand::None
    }

    fn apply_picker_action(&mut self, action: Action, index: usize) -> AppCommand {
        let last = self.namespaces.len();
        match action {
            Action::Down => self.namespace_picker = Some((index + 1).min(last)),
            Action::Up => self.namespace_picker = Some(index.saturating_sub(1)),
            Action::Top => self.namespace_picker = Some(0),
            Action::Bottom => self.namespace_picker = Some(last),
            Action::EnterResource => {
                self.namespace_picker = None;
                let choice = self
                    .namespace_choices()
                    .get(index)
                    .cloned()
                    .unwrap_or_default();
                return self.set_namespace(NamespaceScope::from_label(&choice));
            }
            Action::ClearDetailOverlay | Action::PickNamespace | Action::Quit => {
                self.namespace_picker = None;
                self.status = format!("Namespace: {}", self.namespace);
            }
            _ => {}
        }
        AppCommand::None
    }

    fn set_namespace(&mut self, scope: NamespaceScope) -> AppCommand {
        if scope == self.namespace {
            self.status = format!("Namespace is already {scope}");
            return AppCommand::None;
        }
        info!(namespace = %scope, "namespace scope changed");
        self.namespace = scope;
        self.store.reset_all();
        self.selections
            .retain(|location, _| location.resource_kind().is_none());
        self.status = format!("Namespace: {}", self.namespace);

        let mut commands = Vec::new();
        if let Some(kind) = self.current_kind() {
            commands.push(AppCommand::Fetch(self.fetch_request_for(kind)));
        }
        if self.current_kind() != Some(ResourceKind::Pods) {
            commands.push(AppCommand::Fetch(FetchRequest::first_page(
                ResourceKind::Pods,
                self.namespace.clone(),
                self.page_size,
            )));
        }
        AppCommand::batch(commands)
    }

    fn current_kind(&self) -> Option<ResourceKind> {
        self.nav.current().resource_kind()
    }

    fn current_status_filter(&self, kind: ResourceKind) -> Option<String> {
        self.store
            .state(kind)
            .and_then(|state| state.status_filter.clone())
    }

    fn current_search(&self, kind: ResourceKind) -> Option<String> {
        self.store.state(kind).and_then(|state| state.search.clone())
    }

    fn fetch_request_for(&self, kind: ResourceKind) -> FetchRequest {
        match self.nav.current() {
            Location::Resources(_) => FetchRequest::all(kind, self.namespace.clone()),
            _ => FetchRequest::first_page(kind, self.namespace.clone(), self.page_size),
        }
    }

    fn ensure_fresh(&self, kind: ResourceKind) -> AppCommand {
        let want_all = matches!(self.nav.current(), Location::Resources(_));
        if self
            .store
            .needs_fetch(kind, &self.namespace, want_all, Instant::now())
        {
            AppCommand::Fetch(self.fetch_request_for(kind))
        } else {
            AppCommand::None
        }
    }

    fn effect_command(&mut self, effect: NavEffect) -> AppCommand {
        match effect {
            NavEffect::EnsureFresh(kind) => self.ensure_fresh(kind),
            NavEffect::InitializeTab(Tab::Namespaces) => AppCommand::LoadNamespaceDetails,
            NavEffect::InitializeTab(Tab::Charts) => AppCommand::LoadCharts,
            NavEffect::InitializeTab(Tab::Settings) => {
                AppCommand::Maintenance(MaintenanceOp::HealthCheck)
            }
            NavEffect::InitializeTab(_) => AppCommand::None,
            NavEffect::InvalidateDashboard => {
                self.store.invalidate_all();
                AppCommand::None
            }
        }
    }

    fn view_memory(&self) -> ViewMemory {
        let (search, status_filter) = self
            .current_kind()
            .and_then(|kind| self.store.state(kind))
            .map(|state| (state.search.clone().unwrap_or_default(), state.status_filter.clone()))
            .unwrap_or_default();
        ViewMemory {
            search,
            status_filter,
            selected: self.selected_index(),
        }
    }

    fn activate(&mut self, target: Location) -> AppCommand {
        let memory = self.view_memory();
        match self.nav.activate(target, memory) {
            Some(transition) => self.apply_transition(transition),
            None => AppCommand::None,
        }
    }

    fn activate_tab(&mut self, tab: Tab) -> AppCommand {
        let kind = self.current_kind().unwrap_or(ResourceKind::Pods);
        self.activate(Location::for_tab(tab, kind))
    }

    fn switch_tab_by_offset(&mut self, delta: isize) -> AppCommand {
        let tab = self.active_tab().offset(delta);
        self.activate_tab(tab)
    }

    fn switch_kind_by_offset(&mut self, delta: isize) -> AppCommand {
        let location = self.nav.current();
        match location.resource_kind() {
            Some(kind) => self.activate(location.with_kind(kind.offset(delta))),
            None => AppCommand::None,
        }
    }

    fn apply_transition(&mut self, transition: Transition) -> AppCommand {
        self.detail = None;
        let mut commands = Vec::new();
        if let Some(memory) = transition.restore {
            self.selections.insert(transition.location, memory.selected);
            if let Some(kind) = transition.location.resource_kind() {
                let search = (!memory.search.is_empty()).then_some(memory.search.as_str());
                if self.store.apply_filter(kind, memory.status_filter.as_deref(), search)
                    == FilterResult::NeedsRefetch
                {
                    commands.push(AppCommand::Fetch(self.fetch_request_for(kind)));
                }
            }
        }
        for effect in transition.effects {
            let command = self.effect_command(effect);
            if !commands.contains(&command) {
                commands.push(command);
            }
        }

        self.status = match transition.location.resource_kind() {
            Some(kind) => format!("{} › {}", transition.location.tab().title(), kind.title()),
            None => transition.location.tab().title().to_string(),
        };
        AppCommand::batch(commands)
    }

    fn set_filters(
        &mut self,
        kind: ResourceKind,
        status: Option<String>,
        search: Option<String>,
    ) -> AppCommand {
        match self
            .store
            .apply_filter(kind, status.as_deref(), search.as_deref())
        {
            FilterResult::Applied { matched } => {
                self.reset_selection(kind);
                self.status = format!("{matched} {} match", kind.title());
                AppCommand::None
            }
            FilterResult::Restored => {
                self.reset_selection(kind);
                self.status = "Filters cleared".to_string();
                AppCommand::None
            }
            FilterResult::NeedsRefetch => {
                self.reset_selection(kind);
                self.status = format!("Filters cleared; reloading {}", kind.title());
                AppCommand::Fetch(self.fetch_request_for(kind))
            }
            FilterResult::NoChange => AppCommand::None,
        }
    }

    fn cycle_status_filter(&mut self) -> AppCommand {
        let Some(kind) = self.current_kind() else {
            return AppCommand::None;
        };
        let Some(state) = self.store.state(kind) else {
            self.status = format!("No {} loaded yet", kind.title());
            return AppCommand::None;
        };
        let statuses = summary_cards(state)
            .into_iter()
            .skip(1)
            .map(|card| card.label)
            .collect::<Vec<_>>();
        if statuses.is_empty() {
            return AppCommand::None;
        }

        let next = match &state.status_filter {
            None => statuses.first().cloned(),
            Some(current) => statuses
                .iter()
                .position(|status| status == current)
                .and_then(|index| statuses.get(index + 1))
                .cloned(),
        };
        let search = state.search.clone();
        self.set_filters(kind, next, search)
    }

    fn apply_sort(&mut self, kind: ResourceKind, sort: SortSpec) -> AppCommand {
        let label = format!("{} {}", sort.field.label(), sort.direction.arrow());
        if self.store.apply_sort(kind, sort) {
            self.reset_selection(kind);
            self.status = format!("Sorted {} by {label}", kind.title());
        } else {
            self.status = format!("No {} loaded yet", kind.title());
        }
        AppCommand::None
    }

    fn cycle_sort(&mut self) -> AppCommand {
        let Some(kind) = self.current_kind() else {
            return AppCommand::None;
        };
        let fields = SortField::sortable_for(kind);
        let current = self
            .store
            .state(kind)
            .and_then(|state| state.sort.as_ref())
            .map(|sort| sort.field.clone());
        let next = match current {
            Some(field) => fields
                .iter()
                .position(|candidate| *candidate == field)
                .map(|index| fields[(index + 1) % fields.len()].clone())
                .unwrap_or(SortField::Name),
            None => SortField::Name,
        };
        self.apply_sort(
            kind,
            SortSpec {
                field: next,
                direction: SortDirection::Asc,
            },
        )
    }

    fn flip_sort(&mut self) -> AppCommand {
        let Some(kind) = self.current_kind() else {
            return AppCommand::None;
        };
        let field = self
            .store
            .state(kind)
            .and_then(|state| state.sort.as_ref())
            .map(|sort| sort.field.clone())
            .unwrap_or(SortField::Name);
        match self.store.toggle_sort(kind, field) {
            Some(sort) => {
                self.reset_selection(kind);
                self.status = format!(
                    "Sorted {} by {} {}",
                    kind.title(),
                    sort.field.label(),
                    sort.direction.arrow()
                );
            }
            None => self.status = format!("No {} loaded yet", kind.title()),
        }
        AppCommand::None
    }

    fn load_more(&mut self) -> AppCommand {
        let Some(kind) = self.current_kind() else {
            return AppCommand::None;
        };
        if let Some(state) = self.store.state(kind)
            && state.has_filter()
        {
            self.status = "Clear filters to load more".to_string();
            return AppCommand::None;
        }
        match self.store.next_page_to_load(kind) {
            Some(page) => AppCommand::Fetch(FetchRequest::page(
                kind,
                self.namespace.clone(),
                page,
                self.page_size,
            )),
            None => {
                self.status = format!("All {} loaded", kind.title());
                AppCommand::None
            }
        }
    }

    fn refresh_current(&mut self) -> AppCommand {
        match self.nav.current() {
            Location::Home(kind) | Location::Resources(kind) => {
                if let Some(failure) = self.store.state(kind).and_then(|state| state.error.clone()) {
                    self.status = format!("Retrying {}", kind.title());
                    return AppCommand::Fetch(failure.retry);
                }
                self.store.invalidate(kind);
                let mut commands = vec![AppCommand::Fetch(self.fetch_request_for(kind))];
                if matches!(self.nav.current(), Location::Home(_)) {
                    commands.push(AppCommand::LoadCapacity);
                }
                AppCommand::batch(commands)
            }
            Location::Namespaces => AppCommand::Batch(vec![
                AppCommand::LoadNamespaces,
                AppCommand::LoadNamespaceDetails,
            ]),
            Location::Charts => AppCommand::LoadCharts,
            Location::Settings => AppCommand::Maintenance(MaintenanceOp::HealthCheck),
            Location::Cli | Location::Yaml => AppCommand::None,
        }
    }

    fn start_insert(&mut self) -> AppCommand {
        let (mode, status) = match self.nav.current() {
            Location::Cli => (InputMode::Console, "Console: type `help` for commands"),
            Location::Yaml => (InputMode::ManifestPath, "Manifest path"),
            Location::Namespaces => (InputMode::CreateNamespace, "New namespace name"),
            _ => {
                self.status = "Nothing to edit here".to_string();
                return AppCommand::None;
            }
        };
        self.mode = mode;
        self.input.clear();
        self.status = status.to_string();
        AppCommand::None
    }

    fn request_upload(&mut self) -> AppCommand {
        let Some(preview) = &self.manifest else {
            self.status = "Load a manifest first (YAML tab, i)".to_string();
            return AppCommand::None;
        };
        let prompt = format!(
            "Upload {} ({} documents)?",
            preview.file_name,
            preview.documents.len()
        );
        self.confirm(prompt, AppCommand::UploadManifest)
    }

    fn confirm(&mut self, prompt: impl Into<String>, command: AppCommand) -> AppCommand {
        let prompt = prompt.into();
        self.status = format!("{prompt} (y/n)");
        self.pending_confirmation = Some(PendingConfirmation { prompt, command });
        AppCommand::None
    }

    fn confirm_namespace_delete(&mut self, name: &str) -> AppCommand {
        self.confirm(
            format!("Delete namespace {name} and everything in it?"),
            AppCommand::NamespaceOp {
                op: NamespaceOp::Delete,
                name: name.to_string(),
            },
        )
    }

    fn selected_resource(&self) -> Option<(ResourceKind, String, String)> {
        let kind = self.current_kind()?;
        let state = self.store.state(kind)?;
        let index = self.selected_index().min(state.items.len().checked_sub(1)?);
        let item = state.items.get(index)?;
        Some((
            kind,
            resource_namespace(item).to_string(),
            resource_name(item).to_string(),
        ))
    }

    fn selected_namespace(&self) -> Option<String> {
        let index = self
            .selected_index()
            .min(self.namespace_details.len().checked_sub(1)?);
        self.namespace_details
            .get(index)
            .map(|summary| summary.name.clone())
    }

    fn selected_chart(&self) -> Option<&ChartEntry> {
        let index = self.selected_index().min(self.charts.len().checked_sub(1)?);
        self.charts.get(index)
    }

    fn resource_action(&mut self, action: ActionKind) -> AppCommand {
        let Some((kind, namespace, name)) = self.selected_resource() else {
            self.status = "No resource selected".to_string();
            return AppCommand::None;
        };
        let request = ActionRequest {
            action,
            kind,
            namespace,
            name,
            command: None,
        };
        if action == ActionKind::Delete {
            let prompt = format!(
                "Delete {} {}/{}?",
                kind.title(),
                request.namespace,
                request.name
            );
            return self.confirm(prompt, AppCommand::RunAction(request));
        }
        AppCommand::RunAction(request)
    }

    fn enter_selected(&mut self) -> AppCommand {
        match self.nav.current() {
            Location::Home(ResourceKind::Pods) | Location::Resources(ResourceKind::Pods) => {
                match self.selected_resource() {
                    Some((_, namespace, name)) => AppCommand::LoadPod {
                        namespace,
                        name,
                        view: PodView::Details,
                    },
                    None => AppCommand::None,
                }
            }
            Location::Home(_) | Location::Resources(_) => self.resource_action(ActionKind::Describe),
            Location::Cli | Location::Yaml => self.start_insert(),
            Location::Namespaces => match self.selected_namespace() {
                Some(name) => self.set_namespace(NamespaceScope::Named(name)),
                None => AppCommand::None,
            },
            Location::Charts => {
                if let Some(chart) = self.selected_chart() {
                    let body = format!(
                        "name: {}\nversion: {}\napp version: {}\ncreated: {}\n\n{}",
                        chart.name, chart.version, chart.app_version, chart.created, chart.description
                    );
                    let title = format!("Chart {}", chart.name);
                    self.set_detail_overlay(title, body);
                }
                AppCommand::None
            }
            Location::Settings => {
                let index = self.selected_index().min(SETTINGS_ACTIONS.len() - 1);
                let op = SETTINGS_ACTIONS[index];
                if op == MaintenanceOp::Restart {
                    return self.confirm(
                        "Restart the backend application?",
                        AppCommand::Maintenance(op),
                    );
                }
                self.status = format!("Running {}…", op.label());
                AppCommand::Maintenance(op)
            }
        }
    }

    fn describe_selected(&mut self) -> AppCommand {
        match self.nav.current() {
            Location::Home(ResourceKind::Pods) | Location::Resources(ResourceKind::Pods) => {
                match self.selected_resource() {
                    Some((_, namespace, name)) => AppCommand::LoadPod {
                        namespace,
                        name,
                        view: PodView::Describe,
                    },
                    None => AppCommand::None,
                }
            }
            Location::Home(_) | Location::Resources(_) => self.resource_action(ActionKind::Describe),
            Location::Namespaces => match self.selected_namespace() {
                Some(name) => AppCommand::NamespaceOp {
                    op: NamespaceOp::Describe,
                    name,
                },
                None => AppCommand::None,
            },
            _ => AppCommand::None,
        }
    }

    fn logs_for_selected(&mut self) -> AppCommand {
        match self.nav.current() {
            Location::Home(ResourceKind::Pods) | Location::Resources(ResourceKind::Pods) => {
                match self.selected_resource() {
                    Some((_, namespace, name)) => AppCommand::LoadPod {
                        namespace,
                        name,
                        view: PodView::Logs,
                    },
                    None => AppCommand::None,
                }
            }
            Location::Home(ResourceKind::Deployments)
            | Location::Resources(ResourceKind::Deployments) => {
                self.resource_action(ActionKind::Logs)
            }
            _ => {
                self.status = "Logs are available for pods and deployments".to_string();
                AppCommand::None
            }
        }
    }

    fn events_for_selected(&mut self) -> AppCommand {
        let name = match self.nav.current() {
            Location::Namespaces => self.selected_namespace(),
            Location::Home(_) | Location::Resources(_) => {
                self.selected_resource().map(|(_, namespace, _)| namespace)
            }
            _ => None,
        };
        match name {
            Some(name) if !name.is_empty() => AppCommand::NamespaceOp {
                op: NamespaceOp::Events,
                name,
            },
            _ => AppCommand::None,
        }
    }

    fn delete_selected(&mut self) -> AppCommand {
        match self.nav.current() {
            Location::Home(_) | Location::Resources(_) => self.resource_action(ActionKind::Delete),
            Location::Namespaces => match self.selected_namespace() {
                Some(name) => self.confirm_namespace_delete(&name),
                None => AppCommand::None,
            },
            Location::Charts => match self.selected_chart().cloned() {
                Some(chart) => self.confirm(
                    format!("Delete chart {} {}?", chart.name, chart.version),
                    AppCommand::DeleteChart {
                        name: chart.name,
                        version: chart.version,
                    },
                ),
                None => AppCommand::None,
            },
            _ => AppCommand::None,
        }
    }

    fn close_detail_or_search(&mut self) -> AppCommand {
        if let Some(detail) = self.detail.take() {
            self.status = "Detail closed".to_string();
            if detail.pod_view {
                let effects = self.nav.leave_detail();
                let commands = effects
                    .into_iter()
                    .map(|effect| self.effect_command(effect))
                    .collect();
                return AppCommand::batch(commands);
            }
            return AppCommand::None;
        }

        match self.current_kind() {
            Some(kind) if self.current_search(kind).is_some() => {
                let status = self.current_status_filter(kind);
                self.set_filters(kind, status, None)
            }
            _ => AppCommand::None,
        }
    }

    fn row_count(&self) -> usize {
        match self.nav.current() {
            Location::Home(kind) | Location::Resources(kind) => self
                .store
                .state(kind)
                .map(|state| state.items.len())
                .unwrap_or(0),
            Location::Namespaces => self.namespace_details.len(),
            Location::Charts => self.charts.len(),
            Location::Settings => SETTINGS_ACTIONS.len(),
            Location::Cli | Location::Yaml => 0,
        }
    }

    fn scroll_or_select(&mut self, delta: isize) {
        if self.detail.is_some() {
            self.scroll_detail(delta);
        } else {
            self.move_selection(delta);
        }
    }

    fn scroll_detail(&mut self, delta: isize) {
        if let Some(detail) = self.detail.as_mut() {
            let max = detail_line_count(&detail.body).saturating_sub(1);
            let next = (detail.scroll as isize + delta).clamp(0, max as isize);
            detail.scroll = next as u16;
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let location = self.nav.current();
        let len = self.row_count();
        if len == 0 {
            self.selections.insert(location, 0);
            return;
        }
        let current = self.selected_index().min(len - 1) as isize;
        let next = (current + delta).clamp(0, len as isize - 1) as usize;
        self.selections.insert(location, next);
    }

    fn select_first(&mut self) {
        if let Some(detail) = self.detail.as_mut() {
            detail.scroll = 0;
        } else {
            self.selections.insert(self.nav.current(), 0);
        }
    }

    fn reset_selection(&mut self, kind: ResourceKind) {
        self.selections.insert(Location::Home(kind), 0);
        self.selections.insert(Location::Resources(kind), 0);
    }

    fn clamp_selection(&mut self, location: Location) {
        let len = match location {
            Location::Namespaces => self.namespace_details.len(),
            Location::Charts => self.charts.len(),
            _ => return,
        };
        if let Some(selected) = self.selections.get_mut(&location) {
            *selected = (*selected).min(len.saturating_sub(1));
        }
    }
}

fn detail_line_count(body: &str) -> u16 {
    u16::try_from(body.lines().count()).unwrap_or(u16::MAX)
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(path)
}

pub fn summarize_error_line(error: &str) -> String {
    error
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

fn normalize_status_text(status: String) -> String {
    const MAX_STATUS_LEN: usize = 180;
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, InputMode, PodView};
    use crate::api::{MaintenanceOp, NamespaceOp, PageQuery, ResourceBackend};
    use crate::config::DashboardConfig;
    use crate::error::FetchError;
    use crate::fetch::FetchRequest;
    use crate::input::Action;
    use crate::model::{FETCH_ALL_PAGE_SIZE, NamespaceScope, ResourceKind, Tab};
    use crate::nav::Location;
    use serde_json::{Value, json};

    fn app() -> App {
        let config = DashboardConfig {
            namespace: NamespaceScope::Named("default".to_string()),
            page_size: 2,
            ..DashboardConfig::default()
        };
        App::new(&config)
    }

    fn pods_payload(names: &[(&str, &str)], total: u64) -> Value {
        let items = names
            .iter()
            .map(|(name, phase)| {
                json!({
                    "metadata": {"name": name, "namespace": "default"},
                    "spec": {"containers": [{"resources": {"requests": {"cpu": "1"}}}]},
                    "status": {"phase": phase}
                })
            })
            .collect::<Vec<_>>();
        json!({"data": {"items": items, "totalCount": total}})
    }

    fn type_line(app: &mut App, text: &str) {
        for c in text.chars() {
            app.apply_action(Action::InputChar(c));
        }
    }

    fn load_pods(app: &mut App, payload: Value) {
        let ticket = app
            .begin_fetch(FetchRequest::first_page(
                ResourceKind::Pods,
                NamespaceScope::Named("default".to_string()),
                2,
            ))
            .expect("network fetch");
        app.complete_fetch(&ticket, Ok(payload));
    }

    #[test]
    fn startup_loads_capacity_namespaces_and_pods() {
        let mut app = app();
        let command = app.startup_command();
        assert_eq!(
            command,
            AppCommand::Batch(vec![
                AppCommand::LoadCapacity,
                AppCommand::LoadNamespaces,
                AppCommand::Fetch(FetchRequest::first_page(
                    ResourceKind::Pods,
                    NamespaceScope::Named("default".to_string()),
                    2
                )),
            ])
        );
    }

    #[test]
    fn ns_command_resets_store_and_refetches() {
        let mut app = app();
        load_pods(&mut app, pods_payload(&[("a", "Running")], 1));

        app.apply_action(Action::StartCommand);
        type_line(&mut app, "ns kube-system");
        let cmd = app.apply_action(Action::SubmitInput);

        let scope = NamespaceScope::Named("kube-system".to_string());
        assert_eq!(
            cmd,
            AppCommand::Fetch(FetchRequest::first_page(ResourceKind::Pods, scope.clone(), 2))
        );
        assert_eq!(app.namespace_scope(), &scope);
        assert!(app.store().state(ResourceKind::Pods).is_none());
    }

    #[test]
    fn page_one_refreshes_metrics() {
        let mut app = app();
        load_pods(
            &mut app,
            pods_payload(&[("a", "Running"), ("b", "Pending")], 4),
        );

        assert_eq!(app.metrics().total_pods, 2);
        assert_eq!(app.metrics().phase("Pending"), 1);
        assert_eq!(app.metrics().requested.cpu_cores, 2.0);
        assert!(app.status().contains("2 of 4"));
    }

    #[test]
    fn load_more_requests_next_page() {
        let mut app = app();
        load_pods(
            &mut app,
            pods_payload(&[("a", "Running"), ("b", "Running")], 5),
        );

        let cmd = app.apply_action(Action::LoadMore);
        assert_eq!(
            cmd,
            AppCommand::Fetch(FetchRequest::page(
                ResourceKind::Pods,
                NamespaceScope::Named("default".to_string()),
                2,
                2
            ))
        );
    }

    #[test]
    fn fetch_all_uses_sentinel_page_size() {
        let mut app = app();
        let AppCommand::Fetch(request) = app.apply_action(Action::FetchAll) else {
            panic!("expected fetch");
        };
        let request = request.normalized();
        assert!(request.fetch_all);
        assert_eq!(request.page, 1);
        assert!(request.page_size >= FETCH_ALL_PAGE_SIZE);
    }

    #[test]
    fn search_filters_live_and_cancel_restores() {
        let mut app = app();
        load_pods(
            &mut app,
            pods_payload(&[("api", "Running"), ("db", "Running")], 2),
        );

        app.apply_action(Action::StartSearch);
        assert_eq!(app.mode(), InputMode::Search);
        type_line(&mut app, "ap");
        assert_eq!(app.store().state(ResourceKind::Pods).unwrap().items.len(), 1);

        app.apply_action(Action::CancelInput);
        assert_eq!(app.mode(), InputMode::Normal);
        assert_eq!(app.store().state(ResourceKind::Pods).unwrap().items.len(), 2);
    }

    #[test]
    fn status_filter_cycles_through_present_statuses() {
        let mut app = app();
        load_pods(
            &mut app,
            pods_payload(&[("a", "Running"), ("b", "Pending"), ("c", "Running")], 3),
        );

        app.apply_action(Action::CycleStatusFilter);
        let state = app.store().state(ResourceKind::Pods).unwrap();
        assert_eq!(state.status_filter.as_deref(), Some("Pending"));
        assert_eq!(state.items.len(), 1);

        app.apply_action(Action::CycleStatusFilter);
        let state = app.store().state(ResourceKind::Pods).unwrap();
        assert_eq!(state.status_filter.as_deref(), Some("Running"));

        app.apply_action(Action::CycleStatusFilter);
        let state = app.store().state(ResourceKind::Pods).unwrap();
        assert_eq!(state.status_filter, None);
        assert_eq!(state.items.len(), 3);
    }

    #[test]
    fn failed_fetch_is_retried_with_same_request() {
        let mut app = app();
        let request = FetchRequest::first_page(
            ResourceKind::Pods,
            NamespaceScope::Named("default".to_string()),
            2,
        );
        let ticket = app.begin_fetch(request.clone()).unwrap();
        app.complete_fetch(
            &ticket,
            Err(FetchError::Rejected("backend down".to_string())),
        );
        assert!(app.status().contains("load failed"));

        let cmd = app.apply_action(Action::Refresh);
        assert_eq!(cmd, AppCommand::Fetch(request));
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = app();
        load_pods(&mut app, pods_payload(&[("api", "Running")], 1));

        let cmd = app.apply_action(Action::DeleteSelected);
        assert_eq!(cmd, AppCommand::None);
        assert!(app.pending_confirmation_prompt().is_some());

        let cmd = app.apply_action(Action::ConfirmYes);
        let AppCommand::RunAction(request) = cmd else {
            panic!("expected run action");
        };
        assert_eq!(request.name, "api");
        assert_eq!(request.namespace, "default");
    }

    #[test]
    fn cancelled_confirmation_returns_none() {
        let mut app = app();
        app.apply_action(Action::StartCommand);
        type_line(&mut app, "restart");
        app.apply_action(Action::SubmitInput);

        let cmd = app.apply_action(Action::ConfirmNo);
        assert_eq!(cmd, AppCommand::None);
        assert_eq!(app.status(), "Action cancelled");
    }

    #[test]
    fn create_namespace_validates_before_submit() {
        let mut app = app();
        app.apply_action(Action::SwitchTab(5));
        app.apply_action(Action::StartInsert);
        assert_eq!(app.mode(), InputMode::CreateNamespace);

        type_line(&mut app, "Bad_Name");
        let cmd = app.apply_action(Action::SubmitInput);
        assert_eq!(cmd, AppCommand::None);
        assert_eq!(app.mode(), InputMode::CreateNamespace);

        app.apply_action(Action::CancelInput);
        app.apply_action(Action::StartInsert);
        type_line(&mut app, "team-a");
        let cmd = app.apply_action(Action::SubmitInput);
        assert_eq!(
            cmd,
            AppCommand::NamespaceOp {
                op: NamespaceOp::Create,
                name: "team-a".to_string()
            }
        );
    }

    #[test]
    fn console_submits_run_action() {
        let mut app = app();
        app.apply_action(Action::SwitchTab(3));
        app.apply_action(Action::EnterResource);
        assert_eq!(app.mode(), InputMode::Console);

        type_line(&mut app, "logs po api");
        let AppCommand::RunAction(request) = app.apply_action(Action::SubmitInput) else {
            panic!("expected run action");
        };
        assert_eq!(request.namespace, "default");
        assert_eq!(app.console_lines(), ["$ logs po api"]);
    }

    #[test]
    fn entering_tabs_runs_initializers() {
        let mut app = app();
        assert_eq!(
            app.apply_action(Action::SwitchTab(6)),
            AppCommand::LoadCharts
        );
        assert_eq!(
            app.apply_action(Action::SwitchTab(7)),
            AppCommand::Maintenance(MaintenanceOp::HealthCheck)
        );
        assert_eq!(app.active_tab(), Tab::Settings);
    }

    #[test]
    fn history_back_restores_search() {
        let mut app = app();
        load_pods(
            &mut app,
            pods_payload(&[("api", "Running"), ("db", "Running")], 2),
        );
        app.apply_action(Action::StartCommand);
        type_line(&mut app, "search api");
        app.apply_action(Action::SubmitInput);

        app.apply_action(Action::SwitchTab(4));
        assert_eq!(app.active_tab(), Tab::Yaml);
        let state = app.store().state(ResourceKind::Pods).unwrap();
        assert_eq!(state.search.as_deref(), Some("api"));

        app.apply_action(Action::HistoryBack);
        assert_eq!(app.location(), Location::Home(ResourceKind::Pods));
        let state = app.store().state(ResourceKind::Pods).unwrap();
        assert_eq!(state.search.as_deref(), Some("api"));
        assert_eq!(state.items.len(), 1);
    }

    #[test]
    fn closing_pod_view_invalidates_dashboard() {
        let mut app = app();
        load_pods(&mut app, pods_payload(&[("api", "Running")], 1));

        let cmd = app.apply_action(Action::EnterResource);
        assert_eq!(
            cmd,
            AppCommand::LoadPod {
                namespace: "default".to_string(),
                name: "api".to_string(),
                view: PodView::Details
            }
        );
        app.show_pod_view("default", "api", PodView::Details, "{}".to_string());

        let cmd = app.apply_action(Action::ClearDetailOverlay);
        assert_eq!(
            cmd,
            AppCommand::Fetch(FetchRequest::first_page(
                ResourceKind::Pods,
                NamespaceScope::Named("default".to_string()),
                2
            ))
        );
    }

    #[test]
    fn kind_tokens_switch_sub_tab() {
        let mut app = app();
        app.apply_action(Action::StartCommand);
        type_line(&mut app, "svc");
        let cmd = app.apply_action(Action::SubmitInput);
        assert_eq!(app.location(), Location::Home(ResourceKind::Services));
        assert!(matches!(cmd, AppCommand::Fetch(request) if request.kind == ResourceKind::Services));
    }

    #[test]
    fn navigation_clamps_selection() {
        let mut app = app();
        load_pods(
            &mut app,
            pods_payload(&[("a", "Running"), ("b", "Running")], 2),
        );
        app.apply_action(Action::Down);
        app.apply_action(Action::Down);
        app.apply_action(Action::Down);
        assert_eq!(app.selected_index(), 1);
        app.apply_action(Action::GPrefix);
        app.apply_action(Action::GPrefix);
        assert_eq!(app.selected_index(), 0);
    }

    #[test]
    fn quit_stops_app() {
        let mut app = app();
        app.apply_action(Action::Quit);
        assert!(!app.running());
    }

    #[derive(Clone)]
    struct StaticBackend {
        payload: Value,
    }

    impl ResourceBackend for StaticBackend {
        async fn fetch_count(
            &self,
            _kind: ResourceKind,
            _namespace: &NamespaceScope,
        ) -> Result<u64, FetchError> {
            Ok(2)
        }

        async fn fetch_page(&self, _query: &PageQuery) -> Result<Value, FetchError> {
            Ok(self.payload.clone())
        }
    }

    #[test]
    fn explorer_refetches_full_list_after_paged_home() {
        let mut app = app();
        load_pods(&mut app, pods_payload(&[("a", "Running"), ("b", "Running")], 6));

        let command = app.apply_action(Action::SwitchTab(2));
        assert_eq!(app.location(), Location::Resources(ResourceKind::Pods));
        assert_eq!(
            command,
            AppCommand::Fetch(FetchRequest::all(
                ResourceKind::Pods,
                NamespaceScope::Named("default".to_string())
            ))
        );
    }

    #[test]
    fn namespace_picker_switches_scope() {
        let mut app = app();
        assert_eq!(
            app.apply_action(Action::PickNamespace),
            AppCommand::LoadNamespaces
        );

        app.set_namespaces(vec!["prod".to_string(), "default".to_string()]);
        assert_eq!(app.namespace_choices(), vec!["all", "default", "prod"]);
        app.apply_action(Action::PickNamespace);
        assert_eq!(app.namespace_picker(), Some(1));

        app.apply_action(Action::Down);
        app.apply_action(Action::Down);
        assert_eq!(app.namespace_picker(), Some(2));
        let command = app.apply_action(Action::EnterResource);

        assert_eq!(app.namespace_picker(), None);
        assert_eq!(
            app.namespace_scope(),
            &NamespaceScope::Named("prod".to_string())
        );
        assert_eq!(
            command,
            AppCommand::Fetch(FetchRequest::first_page(
                ResourceKind::Pods,
                NamespaceScope::Named("prod".to_string()),
                2
            ))
        );
    }

    #[test]
    fn namespace_picker_closes_on_escape() {
        let mut app = app();
        app.set_namespaces(vec!["prod".to_string()]);
        app.apply_action(Action::PickNamespace);
        app.apply_action(Action::Up);
        assert_eq!(app.namespace_picker(), Some(0));

        assert_eq!(app.apply_action(Action::ClearDetailOverlay), AppCommand::None);
        assert_eq!(app.namespace_picker(), None);
        assert_eq!(
            app.namespace_scope(),
            &NamespaceScope::Named("default".to_string())
        );
    }

    #[tokio::test]
    async fn prime_loads_opening_view_before_startup() {
        let mut app = app();
        let backend = StaticBackend {
            payload: pods_payload(&[("a", "Running"), ("b", "Pending")], 2),
        };

        app.prime(&backend).await;
        assert_eq!(app.metrics().total_pods, 2);
        assert!(app.status().contains("2 of 2"));
        assert_eq!(
            app.startup_command(),
            AppCommand::Batch(vec![AppCommand::LoadCapacity, AppCommand::LoadNamespaces])
        );
    }
}
