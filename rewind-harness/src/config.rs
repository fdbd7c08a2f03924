//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub controllers: Vec<Controller>,
    pub topology_generator: String,
    pub boot_controllers: bool,
    pub trace_dir: String,
    pub default_connected: bool,
    pub replay: Replay,
    pub fuzz: Fuzz,
    pub logging: Logging,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Controller {
    pub id: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Replay {
    pub trace_file: String,
    /// Per-event wait for a matching observation, in seconds.
    pub default_timeout: f64,
    /// Extra pause between logical rounds, in seconds.
    pub delay: f64,
    pub pass_through_sends: bool,
    pub ignore_whitelisted_packets: bool,
    pub fail_to_interactive: bool,
    pub fail_to_interactive_on_persistent_violations: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Fuzz {
    pub steps: u32,
    pub seed: u64,
    pub invariant_check: String,
    pub check_interval: u32,
    pub switch_failure_rate: f64,
    pub link_failure_rate: f64,
    pub output_file: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub file: LoggingFile,
    pub stdout: LoggingStdout,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFile {
    pub enabled: bool,
    pub dir: String,
    pub name: String,
    pub rotation: LoggingFileRotation,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStdout {
    pub enabled: bool,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFmt {
    pub style: LoggingFmtStyle,
    pub colors: bool,
    pub show_thread_id: bool,
    pub show_source: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFileRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFmtStyle {
    Compact,
    Full,
    Json,
    Pretty,
}

// ===== impl Config =====

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/rewind.toml";

    pub(crate) fn load(config_file: Option<&str>) -> Config {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => toml::from_str(&config_str)
                .expect("Failed to parse configuration file"),
            Err(err) => {
                eprintln!("Failed to load configuration file: {err}");
                eprintln!("Falling back to default configuration...");
                Config::default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            controllers: vec![],
            topology_generator: "linear,2".to_owned(),
            boot_controllers: true,
            trace_dir: ".".to_owned(),
            default_connected: true,
            replay: Default::default(),
            fuzz: Default::default(),
            logging: Default::default(),
        }
    }
}

// ===== impl Replay =====

impl Default for Replay {
    fn default() -> Replay {
        Replay {
            trace_file: "events.trace".to_owned(),
            default_timeout: 5.0,
            delay: 0.0,
            pass_through_sends: false,
            ignore_whitelisted_packets: true,
            fail_to_interactive: false,
            fail_to_interactive_on_persistent_violations: false,
        }
    }
}

// ===== impl Fuzz =====

impl Default for Fuzz {
    fn default() -> Fuzz {
        Fuzz {
            steps: 100,
            seed: 0,
            invariant_check: "check_connectivity".to_owned(),
            check_interval: 10,
            switch_failure_rate: 0.1,
            link_failure_rate: 0.2,
            output_file: "events.trace".to_owned(),
        }
    }
}

// ===== impl LoggingFile =====

impl Default for LoggingFile {
    fn default() -> LoggingFile {
        LoggingFile {
            enabled: false,
            dir: "/var/log".to_owned(),
            name: "rewind.log".to_owned(),
            rotation: Default::default(),
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingStdout =====

impl Default for LoggingStdout {
    fn default() -> LoggingStdout {
        LoggingStdout {
            enabled: true,
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingFmt =====

impl Default for LoggingFmt {
    fn default() -> LoggingFmt {
        LoggingFmt {
            style: LoggingFmtStyle::Full,
            colors: false,
            show_thread_id: false,
            show_source: false,
        }
    }
}
