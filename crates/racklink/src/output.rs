use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Power state as reported to the user.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutletState {
    On,
    Off,
    /// The device could not be asked.
    Unknown,
}

impl OutletState {
    pub fn as_str(self) -> &'static str {
        match self {
            OutletState::On => "on",
            OutletState::Off => "off",
            OutletState::Unknown => "unknown",
        }
    }
}

impl From<bool> for OutletState {
    fn from(on: bool) -> Self {
        if on {
            OutletState::On
        } else {
            OutletState::Off
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct OutletRow {
    pub outlet: u8,
    pub state: OutletState,
}

#[derive(Serialize)]
struct OutletReport<'a> {
    host: &'a str,
    timestamp: String,
    outlets: &'a [OutletRow],
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_outlets(host: &str, rows: &[OutletRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&OutletReport {
            host,
            timestamp: now_unix_seconds(),
            outlets: rows,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OUTLET", "STATE"]);
            for row in rows {
                table.add_row(vec![row.outlet.to_string(), row.state.as_str().to_uppercase()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let states = rows
                .iter()
                .map(|row| format!("{}={}", row.outlet, row.state.as_str()))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{host}: {states}");
        }
    }
}

/// Print a flat record as JSON, a two-column table, or `key=value` pairs.
pub fn print_record<T: Serialize>(record: &T, fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in fields {
                table.add_row(vec![name.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = fields
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
    }
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
