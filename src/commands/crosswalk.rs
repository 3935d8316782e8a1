use anyhow::{ensure, Result};

use crate::cli::{Cli, CrosswalkArgs, Level};
use crate::io::write_crosswalk_csv;
use crate::names::name_crosswalk;

pub fn run(_cli: &Cli, args: &CrosswalkArgs) -> Result<()> {
    ensure!(args.year_from < args.year_to, "year-from must precede year-to");

    let provinces = super::parse_provinces(args.provinces.as_deref());
    let from = super::load_snapshot(
        args.year_from,
        &args.from,
        Level::Csd,
        provinces.as_ref(),
        None,
    )?;
    let to = super::load_snapshot(args.year_to, &args.to, Level::Csd, provinces.as_ref(), None)?;

    let rows = name_crosswalk(&from, &to, args.max_distance);
    write_crosswalk_csv(&rows, args.year_from, args.year_to, &args.out)?;

    println!("Wrote {} crosswalk candidates to {}", rows.len(), args.out.display());
    Ok(())
}
