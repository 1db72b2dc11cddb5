//! Table definitions for the simulated call-center database.
//!
//! Each table carries an integer `id` primary key so the record
//! generator can read it in contiguous id windows.

use crate::constants::{columns, tables};
use crate::sql::build_create;

/// Static column layout of one table
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    /// `(column, SQL type)` pairs, `id` first
    pub columns: &'static [(&'static str, &'static str)],
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(name, _)| *name).collect()
    }

    /// Every column except the generated `id`
    pub fn insertable_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| *name != columns::ID)
            .collect()
    }

    pub fn create_statement(&self) -> String {
        build_create(self.name, self.columns)
    }

    pub fn drop_statement(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", self.name)
    }
}

const ID_COLUMN: (&str, &str) = (columns::ID, "INTEGER PRIMARY KEY");

/// Census block aggregates built from the raw extract
pub const CENBLOCKS: TableSchema = TableSchema {
    name: tables::CENBLOCKS,
    columns: &[
        ID_COLUMN,
        ("blockgeoid", "INTEGER"),
        ("totalpop", "INTEGER"),
        ("total_donors", "FLOAT"),
        ("donation_total", "FLOAT"),
        ("percentunder18", "FLOAT"),
        ("percent18to19", "FLOAT"),
        ("percent20", "FLOAT"),
        ("percent21", "FLOAT"),
        ("percent22to24", "FLOAT"),
        ("percent25to29", "FLOAT"),
        ("percent30to34", "FLOAT"),
        ("percent35to39", "FLOAT"),
        ("percent40to44", "FLOAT"),
        ("percent45to49", "FLOAT"),
        ("percent50to54", "FLOAT"),
        ("percent55to59", "FLOAT"),
        ("percent60to61", "FLOAT"),
        ("percent62to64", "FLOAT"),
        ("percent65to66", "FLOAT"),
        ("percent67to69", "FLOAT"),
        ("percent70to74", "FLOAT"),
        ("percent75to79", "FLOAT"),
        ("percent80to84", "FLOAT"),
        ("percent85andup", "FLOAT"),
        ("percent25to44", "FLOAT"),
        ("percent40to59", "FLOAT"),
        ("percentcollegeeducated", "FLOAT"),
        ("percentunder10k", "FLOAT"),
        ("lowpercentunder10k", "FLOAT"),
        ("highpercentunder10k", "FLOAT"),
        ("percent10kto14k", "FLOAT"),
        ("lowpercent10to14k", "FLOAT"),
        ("highpercent10to14k", "FLOAT"),
        ("percent15kto19k", "FLOAT"),
        ("lowpercent15to19k", "FLOAT"),
        ("highpercent15to19k", "FLOAT"),
        ("percent20kto24k", "FLOAT"),
        ("lowpercent20to24k", "FLOAT"),
        ("highpercent20to24k", "FLOAT"),
        ("percent25kto29k", "FLOAT"),
        ("lowpercent25to29k", "FLOAT"),
        ("highpercent25to29k", "FLOAT"),
        ("percent30kto34k", "FLOAT"),
        ("lowpercent30to34k", "FLOAT"),
        ("highpercent30to34k", "FLOAT"),
        ("percent35kto39k", "FLOAT"),
        ("lowpercent35to39k", "FLOAT"),
        ("highpercent35to39k", "FLOAT"),
        ("percent40kto44k", "FLOAT"),
        ("lowpercent40to44k", "FLOAT"),
        ("highpercent40to44k", "FLOAT"),
        ("percent45kto49k", "FLOAT"),
        ("lowpercent45to49k", "FLOAT"),
        ("highpercent45to49k", "FLOAT"),
        ("percent50kto59k", "FLOAT"),
        ("lowpercent50to59k", "FLOAT"),
        ("highpercent50to59k", "FLOAT"),
        ("percent60kto74k", "FLOAT"),
        ("lowpercent60to74k", "FLOAT"),
        ("highpercent60to74k", "FLOAT"),
        ("percent75kto99k", "FLOAT"),
        ("lowpercent75to99k", "FLOAT"),
        ("highpercent75to99k", "FLOAT"),
        ("percent100kto124k", "FLOAT"),
        ("lowpercent100to124k", "FLOAT"),
        ("highpercent100to124k", "FLOAT"),
        ("percent125kto149k", "FLOAT"),
        ("lowpercent125to149k", "FLOAT"),
        ("highpercent125to149k", "FLOAT"),
        ("percent150kto199k", "FLOAT"),
        ("lowpercent150to199k", "FLOAT"),
        ("highpercent150to199k", "FLOAT"),
        ("percent200kandup", "FLOAT"),
        ("lowpercent200kandup", "FLOAT"),
        ("highpercent200kandup", "FLOAT"),
        ("percentabove100k", "FLOAT"),
        ("lowpercentabove100k", "FLOAT"),
        ("highpercentabove100k", "FLOAT"),
        ("percent50kto99k", "FLOAT"),
        ("lowpercent50kto99k", "FLOAT"),
        ("highpercent50kto99k", "FLOAT"),
        ("percentemployerbasedonly", "FLOAT"),
        ("percentdirectpurchaseonly", "FLOAT"),
        ("percentmedicareonly", "FLOAT"),
        ("percentemployeranddirectpurchase", "FLOAT"),
        ("percentemployerbasedandmedicare", "FLOAT"),
        ("percentmedicareandmedicaid", "FLOAT"),
        ("percentnohealthinsurance", "FLOAT"),
    ],
};

/// Distinct voters from the raw extract
pub const VOTERS: TableSchema = TableSchema {
    name: tables::VOTERS,
    columns: &[
        ID_COLUMN,
        ("first_name", "VARCHAR"),
        ("middle_name", "VARCHAR"),
        ("last_name", "VARCHAR"),
        ("suffix", "VARCHAR"),
        ("party_affiliation", "VARCHAR"),
        ("street1", "VARCHAR"),
        ("street2", "VARCHAR"),
        ("city", "VARCHAR"),
        ("state", "VARCHAR"),
        ("zip", "INTEGER"),
        ("plus4", "FLOAT"),
        ("ohvfid", "VARCHAR"),
        ("blockgeoid", "INTEGER"),
        ("demdonationamounts", "VARCHAR"),
        ("demcommitteecodes", "VARCHAR"),
        ("repdonationamounts", "VARCHAR"),
        ("repcommitteecodes", "VARCHAR"),
        ("otherpartydonationamounts", "VARCHAR"),
        ("otherpartycommitteecodes", "VARCHAR"),
        ("total", "FLOAT"),
        ("avg", "FLOAT"),
        ("days_since", "INTEGER"),
        ("is_donor", "INTEGER"),
    ],
};

/// Simulated call outcomes
pub const CALLS: TableSchema = TableSchema {
    name: tables::CALLS,
    columns: &[
        ID_COLUMN,
        (columns::VOTER_KEY, "VARCHAR"),
        (columns::CALL_RESULT, "INTEGER"),
    ],
};

/// Tables rebuilt by a database build-out, in creation order
pub const ALL_TABLES: &[TableSchema] = &[CENBLOCKS, VOTERS, CALLS];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_starts_with_id() {
        for table in ALL_TABLES {
            assert_eq!(table.columns[0].0, "id", "table {}", table.name);
        }
    }

    #[test]
    fn test_insertable_columns_skip_id() {
        let columns = CALLS.insertable_columns();
        assert_eq!(columns, vec!["ohvfid", "call_result"]);
    }

    #[test]
    fn test_create_statement() {
        assert_eq!(
            CALLS.create_statement(),
            "CREATE TABLE calls (id INTEGER PRIMARY KEY, ohvfid VARCHAR, call_result INTEGER);"
        );
    }

    #[test]
    fn test_cenblocks_aggregate_columns_present() {
        let names = CENBLOCKS.column_names();
        for required in ["blockgeoid", "totalpop", "total_donors", "donation_total"] {
            assert!(names.contains(&required), "missing {}", required);
        }
        assert_eq!(names[1], "blockgeoid");
    }
}
