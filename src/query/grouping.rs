//! Single-pass grouping of time series by a subset of their attributes.
//!
//! Input must arrive sorted by exactly the grouping keys, compared byte-wise
//! in key order. Groups are emitted on every key change and once more at the end.

use std::cmp::Ordering;
use thiserror::Error;

use crate::storage::data::{Group, TsMetadata};
use crate::storage::schema::TsAttribute;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupingError {
    #[error("input not sorted by ({keys}): {current:?} followed by {next:?}")]
    UnsortedInput {
        keys: String,
        current: Vec<String>,
        next: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// Distinct combinations only
    ComboOnly,
    /// Combinations plus every series sharing them
    IncludeInstances,
}

/// Copy of `ts` with only `keys` set; everything else stays at its default
pub fn combo(ts: &TsMetadata, keys: &[TsAttribute]) -> TsMetadata {
    let mut combo = TsMetadata::default();
    for key in keys {
        key.set(&mut combo, key.get(ts).to_string());
    }
    combo
}

fn compare_keys(a: &TsMetadata, b: &TsMetadata, keys: &[TsAttribute]) -> Ordering {
    keys.iter()
        .map(|key| key.get(a).cmp(key.get(b)))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

struct OpenGroup {
    representative: TsMetadata,
    instances: Vec<TsMetadata>,
}

pub struct GroupAggregator {
    mode: GroupMode,
    keys: Vec<TsAttribute>,
    open: Option<OpenGroup>,
    groups: Vec<Group>,
    rows: usize,
}

impl GroupAggregator {
    pub fn new(mode: GroupMode, keys: Vec<TsAttribute>) -> Self {
        Self {
            mode,
            keys,
            open: None,
            groups: Vec::new(),
            rows: 0,
        }
    }

    /// Feeds the next row. A row whose keys sort before the open group's is rejected.
    pub fn push(&mut self, ts: TsMetadata) -> Result<(), GroupingError> {
        self.rows += 1;

        let Some(open) = self.open.as_mut() else {
            self.open_group(ts);
            return Ok(());
        };

        match compare_keys(&open.representative, &ts, &self.keys) {
            Ordering::Equal => {
                if self.mode == GroupMode::IncludeInstances {
                    open.instances.push(ts);
                }
                Ok(())
            }
            Ordering::Less => {
                self.emit();
                self.open_group(ts);
                Ok(())
            }
            Ordering::Greater => Err(GroupingError::UnsortedInput {
                keys: self
                    .keys
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", "),
                current: key_values(&open.representative, &self.keys),
                next: key_values(&ts, &self.keys),
            }),
        }
    }

    /// Flushes the open group and returns every group in input order
    pub fn finish(mut self) -> Vec<Group> {
        self.emit();
        self.groups
    }

    /// Number of rows consumed so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn open_group(&mut self, ts: TsMetadata) {
        let instances = match self.mode {
            GroupMode::IncludeInstances => vec![ts.clone()],
            GroupMode::ComboOnly => Vec::new(),
        };
        self.open = Some(OpenGroup {
            representative: ts,
            instances,
        });
    }

    fn emit(&mut self) {
        if let Some(open) = self.open.take() {
            let instances = match self.mode {
                GroupMode::IncludeInstances => Some(open.instances),
                GroupMode::ComboOnly => None,
            };
            self.groups.push(Group {
                combo: combo(&open.representative, &self.keys),
                instances,
            });
        }
    }
}

fn key_values(ts: &TsMetadata, keys: &[TsAttribute]) -> Vec<String> {
    keys.iter().map(|k| k.get(ts).to_string()).collect()
}

/// Groups an already sorted sequence in one pass
pub fn aggregate<I>(mode: GroupMode, keys: Vec<TsAttribute>, rows: I) -> Result<Vec<Group>, GroupingError>
where
    I: IntoIterator<Item = TsMetadata>,
{
    let mut aggregator = GroupAggregator::new(mode, keys);
    for ts in rows {
        aggregator.push(ts)?;
    }
    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(platform: &str, instrument: &str, title: &str) -> TsMetadata {
        TsMetadata {
            platform: platform.to_string(),
            instrument: instrument.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_combo_only() {
        let rows = ["A", "A", "B", "B", "B", "C"]
            .iter()
            .map(|p| series(p, "rh", "t"));
        let groups = aggregate(GroupMode::ComboOnly, vec![TsAttribute::Platform], rows).unwrap();

        let platforms: Vec<_> = groups.iter().map(|g| g.combo.platform.as_str()).collect();
        assert_eq!(platforms, vec!["A", "B", "C"]);
        for group in &groups {
            assert!(group.instances.is_none());
            // non-key attributes stay at their default
            assert_eq!(group.combo.instrument, "");
            assert_eq!(group.combo.title, "");
        }
    }

    #[test]
    fn test_include_instances_partitions_input() {
        let rows = vec![
            series("06260", "rh", "one"),
            series("06260", "rh", "two"),
            series("06260", "tx", "three"),
            series("06348", "rh", "four"),
            series("06348", "rh", "five"),
        ];
        let total = rows.len();
        let groups = aggregate(
            GroupMode::IncludeInstances,
            vec![TsAttribute::Platform, TsAttribute::Instrument],
            rows,
        )
        .unwrap();

        assert_eq!(groups.len(), 3);
        let counted: usize = groups
            .iter()
            .map(|g| g.instances.as_ref().unwrap().len())
            .sum();
        assert_eq!(counted, total);

        assert_eq!(groups[0].combo, TsMetadata {
            platform: "06260".to_string(),
            instrument: "rh".to_string(),
            ..Default::default()
        });
        let titles: Vec<_> = groups[0]
            .instances
            .as_ref()
            .unwrap()
            .iter()
            .map(|ts| ts.title.as_str())
            .collect();
        assert_eq!(titles, vec!["one", "two"]);

        // the final group is flushed at end of input
        assert_eq!(groups[2].combo.platform, "06348");
        assert_eq!(groups[2].instances.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_instances_partition_every_run_shape() {
        let cases: &[(&str, &[&str], usize)] = &[
            ("single row", &["A"], 1),
            ("all equal", &["A", "A", "A", "A"], 1),
            ("all distinct", &["A", "B", "C", "D", "E"], 5),
            ("long tail group", &["A", "B", "C", "C", "C", "C", "C", "C"], 3),
            ("long head group", &["A", "A", "A", "A", "A", "B"], 2),
            ("alternating runs", &["A", "A", "B", "C", "C", "D", "D", "D"], 4),
        ];

        for (name, platforms, expected_groups) in cases {
            let rows: Vec<_> = platforms
                .iter()
                .enumerate()
                .map(|(i, p)| series(p, "rh", &i.to_string()))
                .collect();
            let groups = aggregate(GroupMode::IncludeInstances, vec![TsAttribute::Platform], rows).unwrap();

            assert_eq!(groups.len(), *expected_groups, "{}", name);
            let instances: Vec<_> = groups
                .iter()
                .flat_map(|g| g.instances.as_ref().unwrap())
                .map(|ts| ts.title.clone())
                .collect();
            let expected: Vec<_> = (0..platforms.len()).map(|i| i.to_string()).collect();
            assert_eq!(instances, expected, "{}", name);
        }
    }

    #[test]
    fn test_only_keys_decide_equality() {
        let rows = vec![series("X", "a", "first"), series("X", "b", "second")];
        let groups = aggregate(GroupMode::IncludeInstances, vec![TsAttribute::Platform], rows).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].instances.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let groups = aggregate(GroupMode::ComboOnly, vec![TsAttribute::Platform], Vec::new()).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_unsorted_input_fails() {
        let mut aggregator = GroupAggregator::new(GroupMode::ComboOnly, vec![TsAttribute::Platform]);
        aggregator.push(series("A", "", "")).unwrap();
        aggregator.push(series("B", "", "")).unwrap();

        match aggregator.push(series("A", "", "")) {
            Err(GroupingError::UnsortedInput { keys, current, next }) => {
                assert_eq!(keys, "platform");
                assert_eq!(current, vec!["B"]);
                assert_eq!(next, vec!["A"]);
            }
            other => panic!("Expected UnsortedInput, got {:?}", other),
        }
        assert_eq!(aggregator.rows(), 3);
    }
}
