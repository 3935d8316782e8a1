#![doc = "Censuslink public API"]
mod chain;
mod consensus;
mod geometry;
mod link;
mod names;
mod snapshot;
mod types;

pub mod cli;
pub mod commands;
pub mod io;

#[doc(inline)]
pub use chain::{
    build_chains, BranchPoint, ChainOptions, ChainSet, Lineage, LineageEntry, START_SENTINEL,
};

#[doc(inline)]
pub use consensus::{decide, decide_all, ConsensusThresholds, NameDecision, ReasonCode};

#[doc(inline)]
pub use geometry::{
    overlap_metrics, Geometries, OverlapMetrics, PairOutcome, SharedBorder, SkipReason,
    LAMBERT_EPSG,
};

#[doc(inline)]
pub use link::{classify, link_year_pair, LinkThresholds, YearPairLinks};

#[doc(inline)]
pub use names::{
    combined_similarity, name_crosswalk, normalize_name, similarity, CrosswalkRow, MatchType,
};

#[doc(inline)]
pub use snapshot::{FieldSpec, Snapshot, UnitAttrs};

#[doc(inline)]
pub use types::{
    Confidence, OverlapLink, Relationship, ReviewFlag, SkippedPair, UnmatchedUnit,
};

#[doc(inline)]
pub use commands::CENSUS_YEARS;
