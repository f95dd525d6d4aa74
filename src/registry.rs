use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::series::grid::grid;
use crate::series::{NamedSeries, SeriesPoint, SeriesTag};

/// Where a grouping's "Total" series comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TotalPolicy {
    /// Sum of the generation series, recomputed on every change
    #[default]
    Derived,
    /// Supplied as-is by the caller, never recomputed
    Reported,
}

/// Notifications for the rendering surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    SeriesAdded { grouping: String, label: SeriesTag },
    SeriesUpdated { grouping: String, label: SeriesTag },
    SeriesRemoved { grouping: String, label: SeriesTag },
    GroupingTornDown { grouping: String },
}

/// Series sharing one time axis, at most one per tag
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartGrouping {
    policy: TotalPolicy,
    series: Vec<NamedSeries>,
}

impl ChartGrouping {
    pub fn policy(&self) -> TotalPolicy {
        self.policy
    }

    pub fn series(&self) -> &[NamedSeries] {
        &self.series
    }

    #[cfg(test)]
    pub fn get(&self, tag: SeriesTag) -> Option<&NamedSeries> {
        self.series.iter().find(|s| s.tag == tag)
    }

    fn position(&self, tag: SeriesTag) -> Option<usize> {
        self.series.iter().position(|s| s.tag == tag)
    }

    /// Replace in place or append; true if the series is new
    fn put(&mut self, tag: SeriesTag, points: Vec<SeriesPoint>) -> bool {
        match self.position(tag) {
            Some(idx) => {
                self.series[idx].points = points;
                false
            }
            None => {
                self.series.push(NamedSeries::new(tag, points));
                true
            }
        }
    }

    fn take(&mut self, tag: SeriesTag) -> Option<NamedSeries> {
        self.position(tag).map(|idx| self.series.remove(idx))
    }

    /// Per-slot sum of the generation series, absent counted as zero.
    ///
    /// `None` when the grouping holds no generation series.
    fn generation_sum(&self) -> Option<Vec<SeriesPoint>> {
        let contributors: Vec<&NamedSeries> =
            self.series.iter().filter(|s| s.tag.is_generation()).collect();

        if contributors.is_empty() {
            return None;
        }

        let points = grid()
            .iter()
            .enumerate()
            .map(|(idx, &slot)| {
                let sum = contributors
                    .iter()
                    .map(|s| s.points.get(idx).and_then(|p| p.value).unwrap_or(0.0))
                    .sum::<f64>();
                SeriesPoint {
                    slot,
                    value: Some(sum),
                }
            })
            .collect();

        Some(points)
    }
}

/// All chart groupings of a dashboard, keyed by grouping (subsystem) name
#[derive(Debug, Default)]
pub struct SeriesRegistry {
    groupings: BTreeMap<String, ChartGrouping>,
}

impl SeriesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grouping(&self, key: &str) -> Option<&ChartGrouping> {
        self.groupings.get(key)
    }

    pub fn grouping_keys(&self) -> impl Iterator<Item = &str> {
        self.groupings.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.groupings.is_empty()
    }

    /// Add or replace a series; a generation series in a derived grouping
    /// also refreshes "Total".
    pub fn upsert(
        &mut self,
        grouping: &str,
        tag: SeriesTag,
        points: Vec<SeriesPoint>,
    ) -> Vec<RegistryEvent> {
        let entry = self.groupings.entry(grouping.to_string()).or_default();
        let added = entry.put(tag, points);
        let contributes = tag.is_generation() && entry.policy == TotalPolicy::Derived;

        debug!("{} {} in grouping {}", if added { "added" } else { "updated" }, tag, grouping);

        let mut events = vec![series_event(grouping, tag, added)];
        if contributes {
            events.extend(self.recompute_total(grouping));
        }
        events
    }

    /// Drop a series; tears the grouping down once nothing is left in it
    pub fn remove(&mut self, grouping: &str, tag: SeriesTag) -> Vec<RegistryEvent> {
        let Some(entry) = self.groupings.get_mut(grouping) else {
            return Vec::new();
        };

        if entry.take(tag).is_none() {
            return Vec::new();
        }

        let contributes = tag.is_generation() && entry.policy == TotalPolicy::Derived;
        let mut events = vec![RegistryEvent::SeriesRemoved {
            grouping: grouping.to_string(),
            label: tag,
        }];

        if contributes {
            events.extend(self.recompute_total(grouping));
        }

        events.extend(self.teardown_if_empty(grouping));
        events
    }

    /// Rebuild "Total" from the generation series currently in the grouping.
    ///
    /// Removes "Total" when there is nothing to sum. Running it twice without
    /// a change in between yields the same series.
    pub fn recompute_total(&mut self, grouping: &str) -> Vec<RegistryEvent> {
        let Some(entry) = self.groupings.get_mut(grouping) else {
            return Vec::new();
        };

        match entry.generation_sum() {
            Some(points) => {
                let added = entry.put(SeriesTag::Total, points);
                vec![series_event(grouping, SeriesTag::Total, added)]
            }
            None => match entry.take(SeriesTag::Total) {
                Some(_) => vec![RegistryEvent::SeriesRemoved {
                    grouping: grouping.to_string(),
                    label: SeriesTag::Total,
                }],
                None => Vec::new(),
            },
        }
    }

    /// Switch a grouping between derived and reported totals.
    ///
    /// Going back to derived recomputes at once; the grouping is created if
    /// it does not exist yet.
    pub fn set_policy(&mut self, grouping: &str, policy: TotalPolicy) -> Vec<RegistryEvent> {
        let entry = self.groupings.entry(grouping.to_string()).or_default();
        if entry.policy == policy {
            return Vec::new();
        }
        entry.policy = policy;

        let mut events = Vec::new();
        if policy == TotalPolicy::Derived {
            events.extend(self.recompute_total(grouping));
        }
        events.extend(self.teardown_if_empty(grouping));
        events
    }

    pub fn clear(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.groupings)
            .into_keys()
            .map(|grouping| RegistryEvent::GroupingTornDown { grouping })
            .collect()
    }

    fn teardown_if_empty(&mut self, grouping: &str) -> Option<RegistryEvent> {
        let empty = self
            .groupings
            .get(grouping)
            .is_some_and(|g| g.series.is_empty() && g.policy == TotalPolicy::Derived);

        if !empty {
            return None;
        }

        self.groupings.remove(grouping);
        debug!("grouping {} torn down", grouping);
        Some(RegistryEvent::GroupingTornDown {
            grouping: grouping.to_string(),
        })
    }
}

fn series_event(grouping: &str, tag: SeriesTag, added: bool) -> RegistryEvent {
    let grouping = grouping.to_string();
    if added {
        RegistryEvent::SeriesAdded { grouping, label: tag }
    } else {
        RegistryEvent::SeriesUpdated { grouping, label: tag }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::absent_points;

    fn points(values: &[Option<f64>]) -> Vec<SeriesPoint> {
        let mut points = absent_points();
        for (point, value) in points.iter_mut().zip(values) {
            point.value = *value;
        }
        points
    }

    fn values(grouping: &ChartGrouping, tag: SeriesTag) -> Vec<Option<f64>> {
        grouping
            .get(tag)
            .unwrap()
            .points
            .iter()
            .map(|p| p.value)
            .collect()
    }

    #[test]
    fn test_total_correctness() {
        let mut registry = SeriesRegistry::new();
        registry.upsert("SIN", SeriesTag::Hydro, points(&[Some(100.0), None, Some(50.0)]));
        registry.upsert("SIN", SeriesTag::Wind, points(&[Some(20.0), Some(30.0), None]));

        let sin = registry.grouping("SIN").unwrap();
        let total = values(sin, SeriesTag::Total);
        assert_eq!(total.len(), 48);
        assert_eq!(total[0], Some(120.0));
        assert_eq!(total[1], Some(30.0));
        assert_eq!(total[2], Some(50.0));
        assert_eq!(total[3], Some(0.0));

        // Absent stays absent in the component series
        assert_eq!(values(sin, SeriesTag::Hydro)[1], None);
    }

    #[test]
    fn test_total_idempotent() {
        let mut registry = SeriesRegistry::new();
        registry.upsert("SIN", SeriesTag::Hydro, points(&[Some(0.1), Some(0.2)]));
        registry.upsert("SIN", SeriesTag::Solar, points(&[Some(0.2), None, Some(7.7)]));

        registry.recompute_total("SIN");
        let first = registry.grouping("SIN").unwrap().get(SeriesTag::Total).cloned();
        let events = registry.recompute_total("SIN");
        let second = registry.grouping("SIN").unwrap().get(SeriesTag::Total).cloned();

        assert_eq!(first, second);
        assert_eq!(
            events,
            vec![RegistryEvent::SeriesUpdated {
                grouping: "SIN".to_string(),
                label: SeriesTag::Total
            }]
        );
    }

    #[test]
    fn test_load_does_not_contribute() {
        let mut registry = SeriesRegistry::new();
        let events = registry.upsert("SIN", SeriesTag::Load, points(&[Some(900.0)]));

        assert_eq!(events.len(), 1);
        let sin = registry.grouping("SIN").unwrap();
        assert!(sin.get(SeriesTag::Total).is_none());

        registry.upsert("SIN", SeriesTag::Thermal, points(&[Some(10.0)]));
        let sin = registry.grouping("SIN").unwrap();
        assert_eq!(values(sin, SeriesTag::Total)[0], Some(10.0));
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut registry = SeriesRegistry::new();
        registry.upsert("SIN", SeriesTag::Load, points(&[Some(1.0)]));
        registry.upsert("SIN", SeriesTag::Hydro, points(&[Some(2.0)]));

        let events = registry.upsert("SIN", SeriesTag::Load, points(&[Some(3.0)]));
        assert_eq!(
            events,
            vec![RegistryEvent::SeriesUpdated {
                grouping: "SIN".to_string(),
                label: SeriesTag::Load
            }]
        );

        let sin = registry.grouping("SIN").unwrap();
        let order: Vec<SeriesTag> = sin.series().iter().map(|s| s.tag).collect();
        assert_eq!(order, vec![SeriesTag::Load, SeriesTag::Hydro, SeriesTag::Total]);
        assert_eq!(values(sin, SeriesTag::Load)[0], Some(3.0));
    }

    #[test]
    fn test_removing_last_generation_drops_total_and_grouping() {
        let mut registry = SeriesRegistry::new();
        registry.upsert("SIN", SeriesTag::Hydro, points(&[Some(1.0)]));
        registry.upsert("SIN", SeriesTag::Wind, points(&[Some(2.0)]));

        registry.remove("SIN", SeriesTag::Wind);
        let sin = registry.grouping("SIN").unwrap();
        assert_eq!(values(sin, SeriesTag::Total)[0], Some(1.0));

        let events = registry.remove("SIN", SeriesTag::Hydro);
        assert_eq!(
            events,
            vec![
                RegistryEvent::SeriesRemoved {
                    grouping: "SIN".to_string(),
                    label: SeriesTag::Hydro
                },
                RegistryEvent::SeriesRemoved {
                    grouping: "SIN".to_string(),
                    label: SeriesTag::Total
                },
                RegistryEvent::GroupingTornDown {
                    grouping: "SIN".to_string()
                },
            ]
        );
        assert!(registry.grouping("SIN").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_keeps_grouping_with_other_series() {
        let mut registry = SeriesRegistry::new();
        registry.upsert("SIN", SeriesTag::Load, points(&[Some(1.0)]));
        registry.upsert("SIN", SeriesTag::Hydro, points(&[Some(2.0)]));

        registry.remove("SIN", SeriesTag::Hydro);
        let sin = registry.grouping("SIN").unwrap();
        assert!(sin.get(SeriesTag::Total).is_none());
        assert!(sin.get(SeriesTag::Load).is_some());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = SeriesRegistry::new();
        assert!(registry.remove("SIN", SeriesTag::Hydro).is_empty());
        registry.upsert("SIN", SeriesTag::Load, points(&[]));
        assert!(registry.remove("SIN", SeriesTag::Hydro).is_empty());
        assert!(registry.recompute_total("Sul").is_empty());
    }

    #[test]
    fn test_recompute_on_empty_generation_set() {
        let mut registry = SeriesRegistry::new();
        registry.upsert("SIN", SeriesTag::Load, points(&[Some(1.0)]));
        assert!(registry.recompute_total("SIN").is_empty());
        assert!(registry.grouping("SIN").unwrap().get(SeriesTag::Total).is_none());
    }

    #[test]
    fn test_reported_policy() {
        let mut registry = SeriesRegistry::new();
        registry.set_policy("SIN", TotalPolicy::Reported);
        registry.upsert("SIN", SeriesTag::Total, points(&[Some(500.0)]));
        registry.upsert("SIN", SeriesTag::Hydro, points(&[Some(1.0)]));

        let sin = registry.grouping("SIN").unwrap();
        assert_eq!(values(sin, SeriesTag::Total)[0], Some(500.0));

        registry.remove("SIN", SeriesTag::Total);
        let events = registry.set_policy("SIN", TotalPolicy::Derived);
        assert_eq!(
            events,
            vec![RegistryEvent::SeriesAdded {
                grouping: "SIN".to_string(),
                label: SeriesTag::Total
            }]
        );
        let sin = registry.grouping("SIN").unwrap();
        assert_eq!(values(sin, SeriesTag::Total)[0], Some(1.0));
    }

    #[test]
    fn test_reported_grouping_survives_until_policy_reset() {
        let mut registry = SeriesRegistry::new();
        registry.set_policy("SIN", TotalPolicy::Reported);
        registry.upsert("SIN", SeriesTag::Total, points(&[Some(500.0)]));
        registry.remove("SIN", SeriesTag::Total);
        assert!(registry.grouping("SIN").is_some());

        let events = registry.set_policy("SIN", TotalPolicy::Derived);
        assert_eq!(
            events,
            vec![RegistryEvent::GroupingTornDown {
                grouping: "SIN".to_string()
            }]
        );
    }

    #[test]
    fn test_clear() {
        let mut registry = SeriesRegistry::new();
        registry.upsert("SIN", SeriesTag::Load, points(&[]));
        registry.upsert("Regioes", SeriesTag::Interchange, points(&[]));
        let events = registry.clear();
        assert_eq!(events.len(), 2);
        assert!(registry.is_empty());
    }
}
