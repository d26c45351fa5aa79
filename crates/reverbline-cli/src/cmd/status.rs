//! `reverbline status` - archive state and pending work, without running anything

use anyhow::Result;
use comfy_table::{Cell, Color};

use super::{DatasetArgs, styled_table};

fn flag(on: bool) -> Cell {
    if on {
        Cell::new("yes").fg(Color::Green)
    } else {
        Cell::new("no").fg(Color::DarkGrey)
    }
}

pub fn run(args: DatasetArgs) -> Result<()> {
    let config = args.load()?;
    let report = reverbline_pipeline::status(&config)?;

    let mut table = styled_table(&["Corpus", "Archive", "Downloaded", "Extracted", "Partial"]);
    for a in &report.archives {
        table.add_row(vec![
            Cell::new(a.corpus),
            Cell::new(&a.file_name),
            flag(a.downloaded),
            flag(a.extracted),
            flag(a.partial),
        ]);
    }
    eprintln!("\n{table}");

    println!("{report}");
    if report.collisions > 0 {
        println!(
            "{} output name collision(s) ({:?} policy)",
            report.collisions, config.on_collision
        );
    }
    Ok(())
}
