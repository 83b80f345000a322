//! Partitioning by a categorical column.
//!
//! Every group frame is the full set of spec rows followed by that group's
//! data rows, so each group can be analyzed on its own against the same
//! limits.

use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};
use crate::spec_limits::SpecExtraction;

/// Key used for data rows whose group value is empty, unless a real value
/// already has this text.
pub const MISSING_GROUP_KEY: &str = "missing";

/// One group and its frame (spec rows first, then data rows).
#[derive(Debug, Clone)]
pub struct GroupFrame {
    /// Display key, unique within the partition.
    pub key: String,
    /// Group value as read from the data; `None` for empty cells.
    pub value: Option<String>,
    pub frame: DataFrame,
    /// Number of data rows, spec rows excluded.
    pub data_rows: usize,
}

/// Group frames in first-occurrence order of their keys.
#[derive(Debug, Clone)]
pub struct GroupedFrames {
    group_by: String,
    groups: Vec<GroupFrame>,
}

impl GroupedFrames {
    pub fn group_by(&self) -> &str {
        &self.group_by
    }

    pub fn keys(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.key.as_str()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&GroupFrame> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GroupFrame> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl IntoIterator for GroupedFrames {
    type Item = GroupFrame;
    type IntoIter = std::vec::IntoIter<GroupFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Splits data rows by the distinct values of a group column.
#[derive(Debug, Clone)]
pub struct GroupPartitioner {
    group_by: String,
}

impl GroupPartitioner {
    pub fn new(group_by: impl Into<String>) -> Self {
        Self {
            group_by: group_by.into(),
        }
    }

    pub fn group_by(&self) -> &str {
        &self.group_by
    }

    /// Fail unless `df` has the group column.
    pub fn ensure_group_column(&self, df: &DataFrame) -> Result<()> {
        if df.column(&self.group_by).is_err() {
            return Err(AnalysisError::Configuration(format!(
                "group column '{}' not found in dataset",
                self.group_by
            )));
        }
        Ok(())
    }

    /// Partition the data rows of `extraction` into group frames.
    ///
    /// Keys come from data rows only, in order of first occurrence; a value
    /// that appears only in spec rows produces no group. Every data row lands
    /// in exactly one group.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] if `df` has no group column.
    pub fn partition(&self, df: &DataFrame, extraction: &SpecExtraction) -> Result<GroupedFrames> {
        self.ensure_group_column(df)?;

        let data_rows = extraction.data_rows();
        let keys = data_rows
            .column(&self.group_by)?
            .as_materialized_series()
            .cast(&DataType::String)?;

        // Null and the literal text of the missing key are different groups.
        let mut order: Vec<Option<String>> = Vec::new();
        let mut members: HashMap<Option<&str>, Vec<IdxSize>> = HashMap::new();
        let key_values = keys.str()?;

        for (row, value) in key_values.into_iter().enumerate() {
            match members.get_mut(&value) {
                Some(rows) => rows.push(row as IdxSize),
                None => {
                    order.push(value.map(str::to_string));
                    members.insert(value, vec![row as IdxSize]);
                }
            }
        }
        let missing_key = Self::missing_key(&order);

        let mut groups = Vec::with_capacity(order.len());
        for value in &order {
            let rows = members.remove(&value.as_deref()).unwrap_or_default();
            let data_count = rows.len();
            let indices = IdxCa::from_vec("rows".into(), rows);
            let group_rows = data_rows.take(&indices)?;
            let frame = extraction.spec_rows().vstack(&group_rows)?;
            let key = value.clone().unwrap_or_else(|| missing_key.clone());

            debug!("Group {}={}: {} data rows", self.group_by, key, data_count);
            groups.push(GroupFrame {
                key,
                value: value.clone(),
                frame,
                data_rows: data_count,
            });
        }

        info!(
            "Found {} groups in column '{}': {:?}",
            groups.len(),
            self.group_by,
            groups.iter().map(|g| g.key.as_str()).collect::<Vec<_>>()
        );

        Ok(GroupedFrames {
            group_by: self.group_by.clone(),
            groups,
        })
    }

    /// Key for rows with no group value, distinct from every real value.
    fn missing_key(values: &[Option<String>]) -> String {
        let taken = |key: &str| values.iter().flatten().any(|v| v == key);
        let mut key = MISSING_GROUP_KEY.to_string();
        let mut n = 2;
        while taken(&key) {
            key = format!("{MISSING_GROUP_KEY}_{n}");
            n += 1;
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec_limits::SpecExtractor;
    use pretty_assertions::assert_eq;

    fn ids(df: &DataFrame) -> Vec<String> {
        df.column("SN")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap().to_string())
            .collect()
    }

    fn partition(df: &DataFrame) -> GroupedFrames {
        let extraction = SpecExtractor::new("SN").extract(df).unwrap();
        GroupPartitioner::new("Batch")
            .partition(df, &extraction)
            .unwrap()
    }

    #[test]
    fn test_two_groups_share_spec_rows() {
        let df = df![
            "SN" => ["LSL", "USL", "P1", "P2", "P3"],
            "Width" => [1.0, 5.0, 3.0, 3.5, 2.0],
            "Batch" => [None, None, Some("A"), Some("A"), Some("B")],
        ]
        .unwrap();
        let groups = partition(&df);

        assert_eq!(groups.keys(), vec!["A", "B"]);
        let a = groups.get("A").unwrap();
        let b = groups.get("B").unwrap();
        assert_eq!(a.data_rows, 2);
        assert_eq!(b.data_rows, 1);
        assert_eq!(ids(&a.frame), vec!["LSL", "USL", "P1", "P2"]);
        assert_eq!(ids(&b.frame), vec!["LSL", "USL", "P3"]);
    }

    #[test]
    fn test_keys_follow_first_occurrence() {
        let df = df![
            "SN" => ["P1", "P2", "P3", "P4", "P5"],
            "Batch" => ["B", "A", "B", "C", "A"],
        ]
        .unwrap();

        assert_eq!(partition(&df).keys(), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_values_only_in_spec_rows_form_no_group() {
        let df = df![
            "SN" => ["LSL", "P1"],
            "Batch" => ["X", "A"],
        ]
        .unwrap();

        assert_eq!(partition(&df).keys(), vec!["A"]);
    }

    #[test]
    fn test_partition_covers_every_data_row_once() {
        let df = df![
            "SN" => ["LSL", "P1", "P2", "USL", "P3", "P4", "P5"],
            "Batch" => [Some("A"), Some("A"), None, Some("B"), Some("B"), Some("A"), Some("C")],
        ]
        .unwrap();
        let groups = partition(&df);

        let mut seen: Vec<String> = groups
            .iter()
            .flat_map(|g| ids(&g.frame))
            .filter(|id| id != "LSL" && id != "USL")
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["P1", "P2", "P3", "P4", "P5"]);
        assert_eq!(groups.keys(), vec!["A", MISSING_GROUP_KEY, "B", "C"]);
        assert!(groups.iter().all(|g| g.frame.height() == g.data_rows + 2));
    }

    #[test]
    fn test_empty_values_never_merge_with_missing_text() {
        let df = df![
            "SN" => ["P1", "P2", "P3"],
            "Batch" => [Some(MISSING_GROUP_KEY), None, Some(MISSING_GROUP_KEY)],
        ]
        .unwrap();
        let groups = partition(&df);

        assert_eq!(groups.keys(), vec!["missing", "missing_2"]);
        let literal = groups.get("missing").unwrap();
        let empty = groups.get("missing_2").unwrap();
        assert_eq!(literal.value.as_deref(), Some("missing"));
        assert_eq!(literal.data_rows, 2);
        assert_eq!(empty.value, None);
        assert_eq!(ids(&empty.frame), vec!["P2"]);
    }

    #[test]
    fn test_numeric_group_values_become_string_keys() {
        let df = df![
            "SN" => ["P1", "P2"],
            "Batch" => [7i64, 8],
        ]
        .unwrap();

        assert_eq!(partition(&df).keys(), vec!["7", "8"]);
    }

    #[test]
    fn test_missing_group_column_is_configuration_error() {
        let df = df!["SN" => ["P1"], "Width" => [1.0]].unwrap();
        let extraction = SpecExtractor::new("SN").extract(&df).unwrap();
        let err = GroupPartitioner::new("Batch")
            .partition(&df, &extraction)
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Configuration(_)));
    }
}
