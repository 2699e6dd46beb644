use std::env;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use maillog_core::{
    CorrelateConfig, DEFAULT_SEARCH, DEFAULT_SERVER, Daemon, RecordPolicy,
    TargetStatus,
};
use maillog_helpers::de::{deserialize_optional_duration, parse_optional_duration};
use serde::Deserialize;

use crate::args::ScanArgs;

const CONFIG_PATH_ENV: &str = "MAILLOG_CONFIG_PATH";
const CONFIG_FILE_NAMES: [&str; 2] = ["maillog.yaml", "maillog.yml"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mta {
    #[default]
    Postfix,
    Exim
}

impl Mta {
    pub fn default_log_path(self) -> &'static Path {
        match self {
            Self::Postfix => Path::new("/var/log/mail.log"),
            Self::Exim => Path::new("/var/log/exim4/mainlog")
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub mta: Mta,
    #[serde(default)]
    pub daemon: Daemon,
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_search")]
    pub search: String,
    #[serde(default)]
    pub target_status: TargetStatus,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub record_policy: RecordPolicy,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub ids_only: bool
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            mta: Mta::default(),
            daemon: Daemon::default(),
            server: default_server(),
            search: default_search(),
            target_status: TargetStatus::default(),
            offset: 0,
            limit: 0,
            record_policy: RecordPolicy::default(),
            workers: default_workers(),
            timeout: None,
            format: OutputFormat::default(),
            distinct: false,
            ids_only: false
        }
    }
}

impl ScanConfig {
    /// File (when one resolves), then flags, then normalization.
    pub fn load(args: ScanArgs) -> Result<Self> {
        let config_path = args.config.clone().or_else(resolve_config_path);
        let mut config = match config_path {
            Some(path) => load_config_yaml(&path)?,
            None => Self::default()
        };
        config.apply_args(args)?;
        config.normalize()?;
        Ok(config)
    }

    pub fn log_path(&self) -> &Path {
        self.log_path
            .as_deref()
            .unwrap_or_else(|| self.mta.default_log_path())
    }

    pub fn correlate_config(&self) -> CorrelateConfig {
        CorrelateConfig {
            daemon: self.daemon,
            server: self.server.clone(),
            search: self.search.clone(),
            target_status: self.target_status.clone(),
            offset: self.offset,
            limit: self.limit,
            record_policy: self.record_policy
        }
    }

    fn apply_args(
        &mut self,
        args: ScanArgs
    ) -> Result<()> {
        if let Some(log) = args.log {
            self.log_path = Some(log);
        }
        if let Some(mta) = args.mta {
            self.mta = mta;
        }
        if let Some(daemon) = args.daemon {
            self.daemon = daemon.parse()?;
        }
        if let Some(server) = args.server {
            self.server = server;
        }
        if let Some(search) = args.search {
            self.search = search;
        }
        if let Some(status) = args.status {
            self.target_status = status.parse()?;
        }
        if let Some(offset) = args.offset {
            self.offset = offset;
        }
        if let Some(limit) = args.limit {
            self.limit = limit;
        }
        if let Some(policy) = args.record_policy {
            self.record_policy = policy.parse()?;
        }
        if let Some(workers) = args.workers {
            self.workers = workers;
        }
        if let Some(timeout) = args.timeout {
            self.timeout = parse_optional_duration(&timeout)
                .with_context(|| format!("invalid --timeout value: {timeout}"))?;
        }
        if let Some(format) = args.format {
            self.format = format;
        }
        self.distinct |= args.distinct;
        self.ids_only |= args.ids_only;
        Ok(())
    }

    fn normalize(&mut self) -> Result<()> {
        self.server = self.server.trim().to_string();
        self.search = self.search.trim().to_string();

        if self.server.is_empty() {
            self.server = default_server();
        }
        if self.search.is_empty() {
            bail!("maillog config `search` must not be empty");
        }
        if self.log_path.as_ref().is_some_and(|path| path.as_os_str().is_empty()) {
            self.log_path = None;
        }

        self.workers = self.workers.max(1);
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            self.timeout = None;
        }

        Ok(())
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let home = non_empty_env("HOME").map(PathBuf::from);
    let cwd = env::current_dir().ok();

    home.into_iter()
        .chain(cwd)
        .flat_map(|dir| CONFIG_FILE_NAMES.map(|name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

fn load_config_yaml(path: &Path) -> Result<ScanConfig> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_slice(&raw)
        .with_context(|| format!("failed to parse yaml {}", path.display()))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    })
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_search() -> String {
    DEFAULT_SEARCH.to_string()
}

fn default_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
