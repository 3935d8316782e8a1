use std::fs;

use anyhow::Result;

use crate::cli::{BordersArgs, Cli};
use crate::io::write_borders_csv;

pub fn run(_cli: &Cli, args: &BordersArgs) -> Result<()> {
    let provinces = super::parse_provinces(args.provinces.as_deref());
    let snapshot = super::load_snapshot(
        args.year,
        &args.input,
        args.level,
        provinces.as_ref(),
        args.source_epsg,
    )?;

    let borders = snapshot.geoms.shared_borders(args.min_border_m);

    fs::create_dir_all(&args.out)?;
    let path = args.out.join(format!("borders_{}.csv", args.year));
    write_borders_csv(&snapshot, &borders, &path)?;

    println!("Wrote {} border pairs to {}", borders.len(), path.display());
    Ok(())
}
