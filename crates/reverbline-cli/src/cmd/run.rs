//! `reverbline run` - acquire both corpora and convolve every pair

use anyhow::Result;
use reverbline_core::SharedProgress;
use reverbline_pipeline::{RunOptions, RunSummary, Stage};

use super::{DatasetArgs, print_summary};
use crate::settings::Settings;

pub fn run(args: DatasetArgs, settings: &Settings, progress: &SharedProgress) -> Result<()> {
    execute(args, settings, progress, Stage::Full)
}

/// Shared by `run` and `fetch`; only the stage differs.
pub(super) fn execute(
    args: DatasetArgs,
    settings: &Settings,
    progress: &SharedProgress,
    stage: Stage,
) -> Result<()> {
    let config = args.load()?;
    let options = RunOptions {
        workers: settings.workers.resolve(args.workers),
        stage,
    };

    let summary = reverbline_pipeline::run(&config, &options, progress)?;
    print_run_summary(&summary, stage);

    for failure in &summary.failures {
        log::error!("{failure}");
    }
    if summary.cancelled {
        anyhow::bail!("interrupted; rerun to resume");
    }
    if !summary.is_success() {
        anyhow::bail!("{} task(s) failed; rerun to retry", summary.failures.len());
    }
    Ok(())
}

fn print_run_summary(s: &RunSummary, stage: Stage) {
    let mut rows = vec![
        ("Archives", s.archives_total.to_string()),
        (
            "Downloaded",
            format!("{} ({} bytes)", s.archives_downloaded, s.bytes_downloaded),
        ),
        ("Already present", s.archives_present.to_string()),
        ("Extracted", s.archives_extracted.to_string()),
        ("Archive failures", s.archives_failed.to_string()),
    ];
    if stage == Stage::Full {
        rows.extend([
            ("Units planned", s.units_planned.to_string()),
            ("Already existed", s.skipped_existing.to_string()),
            ("Completed", s.units_completed.to_string()),
            ("Failed", s.units_failed.to_string()),
            ("Cancelled", s.units_cancelled.to_string()),
            ("Name collisions", s.collisions.to_string()),
        ]);
    }
    rows.push(("Time", format!("{:.1}s", s.elapsed.as_secs_f64())));
    print_summary("Reverbline", &rows);
}
