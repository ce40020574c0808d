mod api;
mod app;
mod cache;
mod cli;
mod config;
mod console;
mod error;
mod fetch;
mod input;
mod metrics;
mod model;
mod namespace;
mod nav;
mod query;
mod render;
mod store;
mod ui;
mod yaml;

use anyhow::{Context, Result};
use api::ApiClient;
use app::{App, AppCommand, PodView, summarize_error_line};
use clap::Parser;
use cli::CliArgs;
use config::{ConfigWatcher, DashboardConfig};
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use error::FetchError;
use fetch::{FetchTicket, fetch_count_estimate, fetch_page_payload};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::path::Path;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Results of spawned page fetches, matched back by ticket generation.
enum AppEvent {
    CountEstimate {
        ticket: FetchTicket,
        count: u64,
    },
    PageLoaded {
        ticket: FetchTicket,
        result: Result<Value, FetchError>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let log_filter = args.log_filter.clone();
    if args.all_namespaces && args.namespace.is_some() {
        eprintln!("both --all-namespaces and --namespace were provided, using all namespaces");
    }

    let mut watcher = ConfigWatcher::discover(args);
    let config = watcher.load_current()?;
    let _log_guard = init_tracing(&log_filter, config.log_dir.as_deref())?;
    info!(
        server = %config.server,
        namespace = %config.namespace,
        page_size = config.page_size,
        source = config.source.as_deref().unwrap_or("defaults"),
        "starting kubedeck"
    );

    let mut client = ApiClient::new(&config).context("failed to build API client")?;
    let mut app = App::new(&config);

    run(&mut app, &mut client, &mut watcher, &config).await
}

fn init_tracing(level_filter: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let Some(dir) = log_dir else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .with_writer(std::io::sink)
            .try_init();
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(dir, "kubedeck.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_writer(writer)
        .try_init();

    Ok(Some(guard))
}

async fn run(
    app: &mut App,
    client: &mut ApiClient,
    watcher: &mut ConfigWatcher,
    config: &DashboardConfig,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, client, watcher, config).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_ALTERNATE_KEYS
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    client: &mut ApiClient,
    watcher: &mut ConfigWatcher,
    config: &DashboardConfig,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();
    app.set_status(format!("Connecting to {}…", client.base_url()));
    terminal
        .draw(|frame| ui::render(frame, app))
        .context("failed to render terminal frame")?;
    app.prime(&*client).await;
    let startup = app.startup_command();
    execute_app_command(app, client, startup, &event_tx).await;

    let mut reader = EventStream::new();
    let mut ticker = interval(config.cache.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut server = config.server.clone();
    let mut base_path = config.base_path.clone();

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!("action={action:?}");
                            let command = app.apply_action(action);
                            terminal
                                .draw(|frame| ui::render(frame, app))
                                .context("failed to render terminal frame")?;
                            execute_app_command(app, client, command, &event_tx).await;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                match watcher.reload_if_changed() {
                    Ok(Some(updated)) => {
                        if updated.server != server || updated.base_path != base_path {
                            match ApiClient::new(&updated) {
                                Ok(rebuilt) => {
                                    info!(server = %updated.server, "backend endpoint changed");
                                    *client = rebuilt;
                                    server = updated.server.clone();
                                    base_path = updated.base_path.clone();
                                }
                                Err(error) => {
                                    warn!(error = %error, "keeping previous API client");
                                }
                            }
                        }
                        let command = app.apply_config(&updated);
                        execute_app_command(app, client, command, &event_tx).await;
                    }
                    Ok(None) => {}
                    Err(error) => {
                        app.set_status(format!("Config reload failed: {}", compact_error(&error)));
                    }
                }
                app.check_staleness(Instant::now());
            }
            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(AppEvent::CountEstimate { ticket, count }) => {
                        app.record_count_estimate(&ticket, count);
                    }
                    Some(AppEvent::PageLoaded { ticket, result }) => {
                        app.complete_fetch(&ticket, result);
                    }
                    None => {}
                }
            }
        }
    }

    Ok(())
}

fn spawn_fetch(client: ApiClient, ticket: FetchTicket, tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        if let Some(count) = fetch_count_estimate(&client, &ticket).await {
            let _ = tx.send(AppEvent::CountEstimate {
                ticket: ticket.clone(),
                count,
            });
        }
        let result = fetch_page_payload(&client, &ticket).await;
        let _ = tx.send(AppEvent::PageLoaded { ticket, result });
    });
}

async fn execute_app_command(
    app: &mut App,
    client: &ApiClient,
    command: AppCommand,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
) {
    let mut queue = VecDeque::from([command]);
    while let Some(command) = queue.pop_front() {
        let follow_up = match run_command(app, client, command, event_tx).await {
            Ok(follow_up) => follow_up,
            Err(error) => {
                warn!(error = %error, "command failed");
                app.set_status(compact_error(&error));
                AppCommand::None
            }
        };
        match follow_up {
            AppCommand::None => {}
            AppCommand::Batch(commands) => queue.extend(commands),
            other => queue.push_back(other),
        }
    }
}

async fn run_command(
    app: &mut App,
    client: &ApiClient,
    command: AppCommand,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
) -> Result<AppCommand> {
    let follow_up = match command {
        AppCommand::None => AppCommand::None,
        AppCommand::Batch(commands) => AppCommand::Batch(commands),
        AppCommand::Fetch(request) => {
            if let Some(ticket) = app.begin_fetch(request) {
                spawn_fetch(client.clone(), ticket, event_tx.clone());
            }
            AppCommand::None
        }
        AppCommand::LoadCapacity => {
            let capacity = client
                .cluster_capacity()
                .await
                .context("cluster capacity unavailable")?;
            app.set_capacity(capacity);
            AppCommand::None
        }
        AppCommand::LoadNamespaces => {
            let namespaces = client
                .namespaces()
                .await
                .context("namespace list unavailable")?;
            app.set_namespaces(namespaces);
            AppCommand::None
        }
        AppCommand::LoadNamespaceDetails => {
            let details = client
                .namespace_details()
                .await
                .context("namespace details unavailable")?;
            app.set_namespace_details(details);
            AppCommand::None
        }
        AppCommand::NamespaceOp { op, name } => {
            let output = client
                .namespace_op(op, &name)
                .await
                .with_context(|| format!("{} {name} failed", op.label()))?;
            app.namespace_op_completed(op, &name, output)
        }
        AppCommand::UpdateNamespace { name, path } => {
            let manifest = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let output = client
                .update_namespace(&name, &manifest)
                .await
                .with_context(|| format!("update namespace {name} failed"))?;
            app.set_status(format!(
                "Updated namespace {name}: {}",
                summarize_error_line(&output)
            ));
            AppCommand::LoadNamespaceDetails
        }
        AppCommand::LoadPod {
            namespace,
            name,
            view,
        } => {
            let body = match view {
                PodView::Details => {
                    let details = client.pod_details(&namespace, &name).await?;
                    serde_json::to_string_pretty(&details)
                        .context("failed to format pod details")?
                }
                PodView::Describe => client.pod_describe(&namespace, &name).await?,
                PodView::Logs => client.pod_logs(&namespace, &name).await?,
            };
            app.show_pod_view(&namespace, &name, view, body);
            AppCommand::None
        }
        AppCommand::RunAction(request) => {
            let output = client.run_action(&request).await.with_context(|| {
                format!(
                    "{} {}/{} failed",
                    request.action.as_str(),
                    request.namespace,
                    request.name
                )
            })?;
            app.action_completed(&request, &output)
        }
        AppCommand::LoadCharts => {
            let charts = client.charts().await.context("chart list unavailable")?;
            app.set_charts(charts);
            AppCommand::None
        }
        AppCommand::DeleteChart { name, version } => {
            let output = client
                .delete_chart(&name, &version)
                .await
                .with_context(|| format!("delete chart {name} {version} failed"))?;
            app.set_status(format!(
                "Deleted chart {name} {version}: {}",
                summarize_error_line(&output)
            ));
            AppCommand::LoadCharts
        }
        AppCommand::Maintenance(op) => {
            let output = client
                .maintenance(op)
                .await
                .with_context(|| format!("{} failed", op.label()))?;
            app.maintenance_completed(op, output)
        }
        AppCommand::LoadManifest(path) => {
            let preview = yaml::load_manifest(&path)?;
            app.set_manifest(preview);
            AppCommand::None
        }
        AppCommand::UploadManifest => {
            let Some(preview) = app.manifest().cloned() else {
                app.set_status("No manifest loaded; press i on the YAML tab");
                return Ok(AppCommand::None);
            };
            let output = client
                .upload_manifest(&preview.file_name, preview.bytes())
                .await
                .with_context(|| format!("upload of {} failed", preview.file_name))?;
            app.manifest_uploaded(&output)
        }
    };

    Ok(follow_up)
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(summarize_error_line(&cause.to_string()));
        } else {
            break;
        }
    }

    out.join(": ")
}
