//! Application constants for the call-center simulator
//!
//! Datastore layout, default batch parameters, table names and the
//! column-map marker table used throughout the crate.

// =============================================================================
// Datastore Layout
// =============================================================================

/// Root directory holding raw data, the simulated database and exports
pub const DATASTORE_DIR: &str = "datastore";

/// Raw input extracts live here
pub const RAW_DIR_NAME: &str = "raw_data";

/// Simulated database and ingestion checkpoint live here
pub const SIM_DIR_NAME: &str = "sim_db";

/// Training exports are written here
pub const TRAIN_DIR_NAME: &str = "batch_train";

/// Column maps and manual header templates live here
pub const TEMPLATES_DIR_NAME: &str = "templates";

/// SQLite database file inside the sim directory
pub const DATABASE_FILE_NAME: &str = "datasets.db";

/// Ingestion checkpoint file inside the sim directory
pub const CHECKPOINT_FILE_NAME: &str = "prep_cache.json";

/// Default column map file name when a directory is given
pub const COLUMN_MAP_FILE_NAME: &str = "col_map.csv";

/// Census block training export file name
pub const TRAINING_FILE_NAME: &str = "cenblocks.csv";

// =============================================================================
// Batch Parameters
// =============================================================================

/// Rows per ingestion chunk
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Rows per generator window
pub const DEFAULT_BATCH_SIZE: u64 = 100_000;

/// Fraction of simulated calls marked positive
pub const DEFAULT_POS_RESP_RATE: f64 = 0.1;

// =============================================================================
// Tables and Columns
// =============================================================================

pub mod tables {
    pub const CENBLOCKS: &str = "cenblocks";
    pub const VOTERS: &str = "voters";
    pub const CALLS: &str = "calls";
}

pub mod columns {
    /// Surrogate row id used for windowed reads
    pub const ID: &str = "id";

    /// Ingestion chunk a raw row was written by; standardized headers
    /// never start with `_`
    pub const CHUNK_INDEX: &str = "_chunk";

    /// Voter file identifier carried onto every call
    pub const VOTER_KEY: &str = "ohvfid";

    /// Simulated call outcome (1 positive, 0 negative)
    pub const CALL_RESULT: &str = "call_result";

    pub const BLOCK_GEOID: &str = "blockgeoid";
    pub const TOTAL_POP: &str = "totalpop";
    pub const TOTAL_DONORS: &str = "total_donors";
    pub const DONATION_TOTAL: &str = "donation_total";

    /// Derived donor ratio added to training exports
    pub const DONOR_FRACTION: &str = "donor_fraction";

    // Raw extract columns touched by the donation transform
    pub const DEM_DONATION_AMOUNTS: &str = "demdonationamounts";
    pub const PARTY_AFFILIATION: &str = "party_affiliation";
    pub const DONATION_SUM: &str = "total";
    pub const DONATION_AVG: &str = "avg";
    pub const DAYS_SINCE: &str = "days_since";
    pub const IS_DONOR: &str = "is_donor";
}

/// Placeholder party for voters with no affiliation on file
pub const UNKNOWN_PARTY: &str = "X";

// =============================================================================
// Column Map Markers
// =============================================================================

pub mod metatypes {
    pub const NUMERIC: &str = "numeric";
    pub const CATEGORICAL: &str = "categorical";
    pub const LABEL: &str = "label";
    pub const IGNORED: &str = "ignored";
    pub const ALL: &str = "all";

    /// Default marker for the `ignored` group
    pub const IGNORED_MARKER: &str = "X";

    /// Default marker → group table
    pub const DEFAULT_MARKERS: &[(&str, &str)] = &[
        ("N", NUMERIC),
        ("C", CATEGORICAL),
        ("Y", LABEL),
        (IGNORED_MARKER, IGNORED),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_markers_cover_builtin_groups() {
        let groups: Vec<&str> = metatypes::DEFAULT_MARKERS.iter().map(|(_, g)| *g).collect();
        assert_eq!(
            groups,
            vec![
                metatypes::NUMERIC,
                metatypes::CATEGORICAL,
                metatypes::LABEL,
                metatypes::IGNORED
            ]
        );
    }

    #[test]
    fn test_batch_defaults_are_positive() {
        assert!(DEFAULT_CHUNK_SIZE > 0);
        assert!(DEFAULT_BATCH_SIZE > 0);
        assert!((0.0..=1.0).contains(&DEFAULT_POS_RESP_RATE));
    }
}
