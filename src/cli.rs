use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

/// Census linkage CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "censuslink", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Link one year-pair by spatial overlap
    Link(LinkArgs),

    /// Compute the border adjacency table for one year
    Borders(BordersArgs),

    /// Build lineages and canonical-name decisions from saved link tables
    Canonical(CanonicalArgs),

    /// Report OCR-error candidates from saved ambiguous link tables
    OcrCandidates(OcrArgs),

    /// Name-only crosswalk between two years (QA fallback)
    Crosswalk(CrosswalkArgs),

    /// Full pipeline: link every year-pair, then chains and consensus
    Run(RunArgs),
}

/// Aggregation level to link at.
#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum Level {
    /// Census subdivisions, as loaded
    Csd,
    /// Census divisions, dissolved from subdivisions
    Cd,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Source-year shapefile
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub from: PathBuf,

    /// Source census year
    #[arg(long)]
    pub year_from: u16,

    /// Target-year shapefile
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub to: PathBuf,

    /// Target census year
    #[arg(long)]
    pub year_to: u16,

    /// Output directory
    #[arg(short, long, default_value = "out_links", value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Aggregation level
    #[arg(long, value_enum, default_value = "csd")]
    pub level: Level,

    /// Comma-separated province codes to include (e.g. ON,QC); all if omitted
    #[arg(long)]
    pub provinces: Option<String>,

    /// EPSG code of the input coordinates, if known
    #[arg(long)]
    pub source_epsg: Option<u32>,

    /// JSON threshold configuration file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// IoU threshold for SAME_AS classification
    #[arg(long)]
    pub iou_same: Option<f64>,

    /// Coverage threshold for SAME_AS classification
    #[arg(long)]
    pub frac_same: Option<f64>,

    /// IoU threshold for OVERLAPS classification
    #[arg(long)]
    pub iou_overlap: Option<f64>,

    /// Name similarity threshold for high-confidence SAME_AS
    #[arg(long)]
    pub name_sim_thresh: Option<f64>,
}

#[derive(Args, Debug)]
pub struct BordersArgs {
    /// Year shapefile
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Census year
    #[arg(long)]
    pub year: u16,

    /// Output directory
    #[arg(short, long, default_value = "out_borders", value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Aggregation level
    #[arg(long, value_enum, default_value = "csd")]
    pub level: Level,

    /// Comma-separated province codes to include
    #[arg(long)]
    pub provinces: Option<String>,

    /// EPSG code of the input coordinates, if known
    #[arg(long)]
    pub source_epsg: Option<u32>,

    /// Minimum shared border length in meters
    #[arg(long, default_value_t = 1.0)]
    pub min_border_m: f64,
}

#[derive(Args, Debug)]
pub struct CanonicalArgs {
    /// Directory containing per-pair link tables
    #[arg(long, default_value = "out_links", value_hint = ValueHint::DirPath)]
    pub links_dir: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "out_canonical", value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Comma-separated census years; defaults to the eight snapshots
    #[arg(long)]
    pub years: Option<String>,

    /// Minimum average similarity to apply a canonical name
    #[arg(long, default_value_t = 70.0)]
    pub min_similarity: f64,

    /// IoU floor for chain edges
    #[arg(long, default_value_t = 0.999)]
    pub min_iou: f64,

    /// Only chain links from the high-confidence tables
    #[arg(long)]
    pub high_only: bool,

    /// Also chain WITHIN/CONTAINS edges
    #[arg(long)]
    pub include_containment: bool,
}

#[derive(Args, Debug)]
pub struct OcrArgs {
    /// Directory containing per-pair link tables
    #[arg(long, default_value = "out_links", value_hint = ValueHint::DirPath)]
    pub links_dir: PathBuf,

    /// Output CSV file
    #[arg(short, long, default_value = "ocr_candidates.csv", value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Comma-separated census years; defaults to the eight snapshots
    #[arg(long)]
    pub years: Option<String>,
}

#[derive(Args, Debug)]
pub struct CrosswalkArgs {
    /// Source-year shapefile
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub from: PathBuf,

    /// Source census year
    #[arg(long)]
    pub year_from: u16,

    /// Target-year shapefile
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub to: PathBuf,

    /// Target census year
    #[arg(long)]
    pub year_to: u16,

    /// Output CSV file
    #[arg(short, long, default_value = "crosswalk_candidates.csv", value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Comma-separated province codes to include
    #[arg(long)]
    pub provinces: Option<String>,

    /// Maximum edit distance for a near match
    #[arg(long, default_value_t = 2)]
    pub max_distance: usize,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory containing one shapefile per census year
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub data_dir: PathBuf,

    /// Shapefile name pattern; `{year}` is substituted
    #[arg(long, default_value = "CANADA_{year}_CSD.shp")]
    pub pattern: String,

    /// Comma-separated census years; defaults to the eight snapshots
    #[arg(long)]
    pub years: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "out_run", value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Aggregation level
    #[arg(long, value_enum, default_value = "csd")]
    pub level: Level,

    /// Comma-separated province codes to include
    #[arg(long)]
    pub provinces: Option<String>,

    /// EPSG code of the input coordinates, if known
    #[arg(long)]
    pub source_epsg: Option<u32>,

    /// JSON threshold configuration file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}
