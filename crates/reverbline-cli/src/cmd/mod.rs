pub mod clean;
pub mod fetch;
pub mod run;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use reverbline_corpus::DatasetConfig;

/// Arguments shared by every dataset command
#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// Dataset config (JSON, or TOML by extension)
    #[arg(default_value = "config.json")]
    pub config: PathBuf,

    /// Project root that config paths are relative to (default: the config's directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,
}

impl DatasetArgs {
    /// Load and validate the dataset config. Any problem is fatal here,
    /// before work starts.
    pub fn load(&self) -> Result<DatasetConfig> {
        DatasetConfig::load(&self.config, self.root.as_deref())
            .with_context(|| format!("invalid dataset config {}", self.config.display()))
    }
}

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    table
}

/// Print a key-value summary table on stderr
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = styled_table(&[title, "Value"]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}
