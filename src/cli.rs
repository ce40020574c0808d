use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "kubedeck",
    version,
    about = "Terminal dashboard for a Kubernetes cluster management backend."
)]
pub struct CliArgs {
    /// Backend server URL, for example http://127.0.0.1:5000
    #[arg(long)]
    pub server: Option<String>,

    /// Path prefix the backend is mounted under
    #[arg(long)]
    pub base_path: Option<String>,

    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Start with all namespaces selected
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Items requested per page on dashboard tabs
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Seconds between staleness checks
    #[arg(long)]
    pub refresh_secs: Option<u64>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to a daily rolling file in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}
