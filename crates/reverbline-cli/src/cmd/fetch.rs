//! `reverbline fetch` - download and extract archives only

use anyhow::Result;
use reverbline_core::SharedProgress;
use reverbline_pipeline::Stage;

use super::DatasetArgs;
use crate::settings::Settings;

pub fn run(args: DatasetArgs, settings: &Settings, progress: &SharedProgress) -> Result<()> {
    super::run::execute(args, settings, progress, Stage::Acquire)
}
