// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use clap::Parser;
use std::sync::LazyLock;

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

/// Every flag can also be provided through the environment, which is how an
/// embedding application is expected to configure the cache.
#[derive(Debug, Parser)]
#[clap(
    name = "mailvault",
    about = "Local mailbox cache with incremental sync and conversation-thread consolidation.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// mailvault log level (default: "info")
    #[clap(
        long,
        default_value = "info",
        env,
        help = "Set the log level for mailvault"
    )]
    pub mailvault_log_level: String,

    #[clap(
        long,
        default_value = "true",
        env,
        help = "Enable ANSI colors in log output"
    )]
    pub mailvault_ansi_logs: bool,

    #[clap(
        long,
        default_value = "false",
        env,
        help = "Write logs to rolling files instead of stdout"
    )]
    pub mailvault_log_to_file: bool,

    #[clap(
        long,
        default_value = "7",
        env,
        help = "Maximum number of rolling log files to keep"
    )]
    pub mailvault_max_log_files: usize,

    /// Root directory holding the content database and log files.
    #[clap(
        long,
        default_value = "./mailvault-data",
        env,
        help = "Set the root data directory for mailvault"
    )]
    pub mailvault_root_dir: String,

    /// Cache size in bytes for the content database. Defaults to 128MB with a 64MB floor.
    #[clap(long, env, help = "Set the content database cache size in bytes")]
    pub mailvault_content_cache_size: Option<u64>,

    #[clap(
        long,
        default_value = "false",
        env,
        help = "Keep the content database entirely in memory (no files on disk)"
    )]
    pub mailvault_content_memory_mode_enabled: bool,

    /// When disabled, every message becomes its own single-message thread.
    #[clap(
        long,
        default_value = "true",
        env,
        help = "Group messages into conversation threads"
    )]
    pub mailvault_conversation_mode: bool,
}

impl Settings {
    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Settings {
            mailvault_log_level: "debug".into(),
            mailvault_ansi_logs: false,
            mailvault_log_to_file: false,
            mailvault_max_log_files: 2,
            mailvault_root_dir: std::env::temp_dir()
                .join("mailvault-test")
                .to_string_lossy()
                .into_owned(),
            mailvault_content_cache_size: None,
            mailvault_content_memory_mode_enabled: true,
            mailvault_conversation_mode: true,
        }
    }
}
