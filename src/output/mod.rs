//! Output formatting and management

use crate::scanner::{sort_by_address, ScanSession};
use crate::ping::PingStats;
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Write};

/// Output format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" | "txt" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub colored: bool,
    /// List unreachable hosts as well
    pub show_offline: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            file: None,
            colored: true,
            show_offline: false,
        }
    }
}

/// Main output manager
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Write the results of a completed session to the configured sink
    pub fn write_results(&self, session: &ScanSession) -> io::Result<()> {
        let output = self.render(session)?;

        match &self.config.file {
            Some(filename) => {
                let mut file = File::create(filename)?;
                file.write_all(output.as_bytes())?;
            }
            None => {
                print!("{}", output);
            }
        }

        Ok(())
    }

    pub fn render(&self, session: &ScanSession) -> io::Result<String> {
        match self.config.format {
            OutputFormat::Table => Ok(self.format_table(session)),
            OutputFormat::Json => self.format_json(session),
        }
    }

    fn selected_hosts(&self, session: &ScanSession) -> Vec<(String, PingStats)> {
        sort_by_address(session.results())
            .into_iter()
            .filter(|(_, stats)| self.config.show_offline || stats.is_online())
            .collect()
    }

    /// Format results as a text table
    fn format_table(&self, session: &ScanSession) -> String {
        let subnet = session.subnet();
        let summary = session.summary();
        let mut output = String::new();

        output.push_str(&format!("Network\t\t: {}\n", subnet));
        output.push_str(&format!(
            "IP Ranges\t: {} - {}\n",
            subnet.first_host(),
            subnet.last_host()
        ));
        output.push_str(&format!("Total hosts\t: {}\n", subnet.host_count()));

        let rule = "-".repeat(58);
        output.push_str(&rule);
        output.push('\n');
        output.push_str(&self.colorize(
            &format!("| {:<39} | {:<12} |\n", "IP Address", "Avg Latency"),
            Color::Cyan,
        ));
        output.push_str(&rule);
        output.push('\n');

        for (addr, stats) in self.selected_hosts(session) {
            let line = format!("| {:<39} | {:<12} |\n", addr, format!("{:?}", stats.avg_rtt));
            let color = if stats.is_online() { Color::Green } else { Color::BrightBlack };
            output.push_str(&self.colorize(&line, color));
        }

        output.push_str(&rule);
        output.push('\n');
        output.push_str(&format!(
            "Online: {}  Offline: {}  Total: {}\n",
            summary.online, summary.offline, summary.total
        ));
        output.push_str(&format!("Execution time: {:?}\n", session.elapsed()));

        output
    }

    /// Format results as JSON
    fn format_json(&self, session: &ScanSession) -> io::Result<String> {
        let summary = session.summary();
        let json_result = JsonSweepResult {
            subnet: session.subnet().to_string(),
            scan_time: Utc::now(),
            duration_seconds: session.elapsed().as_secs_f64(),
            pinger: session.pinger_name().to_string(),
            total_hosts: summary.total,
            online_hosts: summary.online,
            offline_hosts: summary.offline,
            hosts: self
                .selected_hosts(session)
                .into_iter()
                .map(|(address, stats)| JsonHostResult::new(address, &stats))
                .collect(),
        };

        serde_json::to_string_pretty(&json_result)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if !self.config.colored {
            return text.to_string();
        }
        text.color(color).to_string()
    }
}

/// JSON-serializable sweep result
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSweepResult {
    pub subnet: String,
    pub scan_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub pinger: String,
    pub total_hosts: usize,
    pub online_hosts: usize,
    pub offline_hosts: usize,
    pub hosts: Vec<JsonHostResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonHostResult {
    pub address: String,
    pub online: bool,
    pub avg_rtt_ms: f64,
    pub packet_loss: f64,
    pub packets_sent: usize,
    pub packets_recv: usize,
    pub packets_recv_duplicates: usize,
}

impl JsonHostResult {
    fn new(address: String, stats: &PingStats) -> Self {
        Self {
            address,
            online: stats.is_online(),
            avg_rtt_ms: stats.avg_rtt.as_secs_f64() * 1000.0,
            packet_loss: stats.packet_loss,
            packets_sent: stats.packets_sent,
            packets_recv: stats.packets_recv,
            packets_recv_duplicates: stats.packets_recv_duplicates,
        }
    }
}
