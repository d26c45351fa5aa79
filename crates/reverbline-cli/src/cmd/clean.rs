//! `reverbline clean` - remove leftovers of interrupted runs

use anyhow::Result;

use super::DatasetArgs;

pub fn run(args: DatasetArgs) -> Result<()> {
    let config = args.load()?;
    let removed = reverbline_pipeline::clean_stale(&config)?;
    if removed == 0 {
        println!("Nothing to clean");
    } else {
        println!("Removed {removed} stale artifact(s)");
    }
    Ok(())
}
