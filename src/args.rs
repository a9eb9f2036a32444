use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::app::AppConfig;
use crate::domain::Settings;

pub fn args_checks() -> Args {
    Args::parse()
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
    /// Path to the docker daemon socket
    #[arg(
        long,
        env = "DOCKER_SOCKET",
        value_name = "PATH",
        default_value = crate::docker::DEFAULT_SOCKET_PATH,
        global = true
    )]
    pub docker_socket: PathBuf,
    /// Seconds an update check stays cached
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 300, global = true)]
    pub cache_ttl_secs: i64,
    /// Timeout for each registry request, in seconds
    #[arg(long, env = "REGISTRY_TIMEOUT_SECS", default_value_t = 15, global = true)]
    pub registry_timeout_secs: u64,
    /// cgroup file used to find the container this process runs in
    #[arg(
        long,
        value_name = "PATH",
        default_value = crate::app::self_guard::DEFAULT_CGROUP_PATH,
        global = true
    )]
    pub cgroup_path: PathBuf,
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
    /// Print extra stuff (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show daemon information
    Info,
    /// List containers
    List {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
    },
    /// Check containers for newer images
    Check {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
    },
    /// List registry tags for an image
    Tags { image: String },
    /// Recreate a container on a newer image
    Update {
        container: String,
        /// Move the container to this tag instead of re-pulling its current one
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Recreate every running container that has an update
    UpdateAll {
        /// Containers recreated at once
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
    Start { container: String },
    Stop { container: String },
    Restart { container: String },
    /// Print a container's combined stdout/stderr
    Logs {
        container: String,
        /// Number of lines from the end
        #[arg(long)]
        tail: Option<u64>,
        /// Unix seconds, RFC 3339, or relative (e.g. 15m)
        #[arg(long)]
        since: Option<String>,
    },
    /// Check periodically and optionally update automatically
    Watch {
        #[arg(long, env = "CHECK_INTERVAL_MINUTES", default_value_t = 60)]
        interval_minutes: u64,
        #[arg(long, env = "AUTO_UPDATE")]
        auto_update: bool,
        /// Containers recreated at once during auto-update
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
}

impl Args {
    /// Validate values clap cannot check on its own
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_ttl_secs <= 0 {
            return Err("cache-ttl-secs must be greater than zero.".to_string());
        }
        if self.registry_timeout_secs == 0 {
            return Err("registry-timeout-secs must be greater than zero.".to_string());
        }
        match &self.command {
            Command::UpdateAll { concurrency } if *concurrency == 0 => {
                Err("concurrency must be at least 1.".to_string())
            }
            Command::Watch {
                interval_minutes,
                concurrency,
                ..
            } => {
                if *interval_minutes == 0 {
                    return Err("interval-minutes must be greater than zero.".to_string());
                }
                if *concurrency == 0 {
                    return Err("concurrency must be at least 1.".to_string());
                }
                Ok(())
            }
            Command::Update { tag: Some(tag), .. } if tag.contains(['/', ':', '@']) => {
                Err(format!("'{tag}' is not a tag."))
            }
            _ => Ok(()),
        }
    }

    /// Runtime configuration derived from the command line.
    #[must_use]
    pub fn app_config(&self) -> AppConfig {
        let mut config = AppConfig {
            docker_socket: self.docker_socket.clone(),
            cgroup_path: self.cgroup_path.clone(),
            cache_ttl: chrono::Duration::seconds(self.cache_ttl_secs),
            registry_timeout: std::time::Duration::from_secs(self.registry_timeout_secs),
            ..AppConfig::default()
        };
        match &self.command {
            Command::UpdateAll { concurrency } => config.concurrency = *concurrency,
            Command::Watch {
                interval_minutes,
                auto_update,
                concurrency,
            } => {
                config.concurrency = *concurrency;
                config.settings = Settings {
                    check_interval_minutes: *interval_minutes,
                    auto_update: *auto_update,
                    last_check: None,
                };
            }
            _ => {}
        }
        config
    }
}
