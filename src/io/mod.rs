//! Table IO: every emitted and re-read artifact is a Polars DataFrame
//! serialized as CSV, plus human-readable per-pair summaries.

mod csv;
mod summary;

pub use csv::{
    read_links_csv, write_borders_csv, write_branches_csv, write_crosswalk_csv,
    write_decisions_csv, write_lineages_csv, write_links_csv, write_mapping_csv,
    write_ocr_candidates_csv, write_review_csv, write_unmatched_csv,
};
pub use summary::write_pair_summary;
