//! Search space, coordinates, and parameter bindings.

use crate::errors::TuneResult;
use crate::value::ParamValue;
use crate::{config_error, internal_error};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

/// Axis name to selected value, derived from a coordinate.
pub type ParameterBinding = BTreeMap<String, ParamValue>;

/// One tunable dimension with its ordered candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

impl Axis {
    pub fn new(name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn cardinality(&self) -> usize {
        self.values.len()
    }
}

/// A point in the search space: one index per axis.
///
/// Components are signed so that strategies can form out-of-range
/// coordinates (for example `c + offset`) and have them priced as infinite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coordinate(Vec<i64>);

impl Coordinate {
    pub fn new(components: Vec<i64>) -> Self {
        Self(components)
    }

    pub fn dims(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, i64> {
        self.0.iter()
    }

    /// Canonical encoding used to key the cost cache and the run driver.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<i64>> for Coordinate {
    fn from(components: Vec<i64>) -> Self {
        Self(components)
    }
}

impl std::ops::Index<usize> for Coordinate {
    type Output = i64;

    fn index(&self, index: usize) -> &i64 {
        &self.0[index]
    }
}

/// The full search space: an ordered list of axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    axes: Vec<Axis>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self { axes: Vec::new() }
    }

    pub fn add_axis(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.axes.push(Axis::new(name, values));
        self
    }

    /// Build a space from the `axis_names` / `axis_val_ranges` pair of a
    /// tuning specification.
    ///
    /// Rejecting an axis with no candidate values is deliberately stricter
    /// than the engine needs. A space built with [`SearchSpace::add_axis`]
    /// may still contain one; its size is 0 and a search over it ends in
    /// `SearchExhausted`. Coming from a tuning file, it is almost always a
    /// typo, so it is reported as a configuration error before any search.
    pub fn from_ranges(
        names: Option<&[String]>,
        ranges: Option<&[Vec<ParamValue>]>,
    ) -> TuneResult<Self> {
        let names = names.ok_or_else(|| {
            config_error!("the search space was not defined correctly, missing axis_names parameter")
        })?;
        let ranges = ranges.ok_or_else(|| {
            config_error!(
                "the search space was not defined correctly, missing axis_val_ranges parameter"
            )
        })?;
        if names.len() != ranges.len() {
            return Err(config_error!(
                "the search space was not defined correctly, {} axis names but {} value ranges",
                names.len(),
                ranges.len()
            ));
        }

        let mut seen = HashSet::new();
        let mut space = Self::new();
        for (name, values) in names.iter().zip(ranges) {
            if !seen.insert(name.as_str()) {
                return Err(config_error!("duplicate axis name: {name}"));
            }
            if values.is_empty() {
                return Err(config_error!("axis {name} has no candidate values"));
            }
            space = space.add_axis(name.clone(), values.clone());
        }
        Ok(space)
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn dims(&self) -> usize {
        self.axes.len()
    }

    pub fn cardinality(&self, axis: usize) -> usize {
        self.axes.get(axis).map_or(0, Axis::cardinality)
    }

    /// Total number of coordinates; a space with no axes has size zero.
    pub fn size(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes
            .iter()
            .fold(1usize, |acc, axis| acc.saturating_mul(axis.cardinality()))
    }

    pub fn bounds_of(&self, axis: usize) -> Range<i64> {
        0..self.cardinality(axis) as i64
    }

    pub fn is_in_range(&self, coord: &Coordinate) -> bool {
        coord.dims() == self.dims()
            && coord
                .iter()
                .enumerate()
                .all(|(i, c)| self.bounds_of(i).contains(c))
    }

    /// Convert a coordinate to its parameter binding.
    ///
    /// Per-axis range is the caller's responsibility; an index that does not
    /// name a value is reported as an internal error rather than clamped.
    pub fn to_binding(&self, coord: &Coordinate) -> TuneResult<ParameterBinding> {
        if coord.dims() != self.dims() {
            return Err(internal_error!(
                "coordinate {coord} has {} components, search space has {} axes",
                coord.dims(),
                self.dims()
            ));
        }

        let mut binding = ParameterBinding::new();
        for (axis, &index) in self.axes.iter().zip(coord.iter()) {
            let value = usize::try_from(index)
                .ok()
                .and_then(|i| axis.values.get(i))
                .ok_or_else(|| {
                    internal_error!("coordinate {coord} is out of range on axis {}", axis.name)
                })?;
            binding.insert(axis.name.clone(), value.clone());
        }
        Ok(binding)
    }
}
