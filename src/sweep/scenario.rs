//! Scenario definitions and cross-product enumeration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::axis::Axis;

/// Separator between the tokens of a scenario name.
pub const NAME_SEPARATOR: &str = "_";

/// Errors in a sweep definition.
#[derive(Debug, Error, PartialEq)]
pub enum SweepDefinitionError {
    #[error("Name order {0:?} is not a permutation of the axis indices")]
    InvalidNameOrder(Vec<usize>),

    #[error("Axis '{0}' is declared twice")]
    DuplicateAxis(String),
}

/// One named combination of axis values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    /// Name derived from the parameter values.
    pub name: String,
    /// Number of repeated runs.
    pub repeat_count: u32,
    /// Parameters passed verbatim to the simulator, in axis order.
    pub params: Vec<String>,
}

impl ScenarioDefinition {
    /// Total number of jobs this scenario contributes.
    pub fn job_count(&self) -> u64 {
        u64::from(self.repeat_count)
    }
}

/// Scenarios keyed by name, in first-insertion order.
///
/// Inserting an existing name replaces its definition in place.
#[derive(Debug, Clone, Default)]
pub struct ScenarioSet {
    scenarios: Vec<ScenarioDefinition>,
    index: HashMap<String, usize>,
}

impl ScenarioSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a scenario; last write wins for duplicate names.
    pub fn insert(&mut self, scenario: ScenarioDefinition) {
        match self.index.get(&scenario.name) {
            Some(&pos) => self.scenarios[pos] = scenario,
            None => {
                self.index
                    .insert(scenario.name.clone(), self.scenarios.len());
                self.scenarios.push(scenario);
            }
        }
    }

    /// Looks a scenario up by name.
    pub fn get(&self, name: &str) -> Option<&ScenarioDefinition> {
        self.index.get(name).map(|&pos| &self.scenarios[pos])
    }

    /// Iterates in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &ScenarioDefinition> {
        self.scenarios.iter()
    }

    /// Number of distinct scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Total number of jobs across all scenarios.
    pub fn total_jobs(&self) -> u64 {
        self.scenarios.iter().map(ScenarioDefinition::job_count).sum()
    }
}

impl<'a> IntoIterator for &'a ScenarioSet {
    type Item = &'a ScenarioDefinition;
    type IntoIter = std::slice::Iter<'a, ScenarioDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenarios.iter()
    }
}

/// A set of axes whose cross product defines the scenarios.
#[derive(Debug, Clone, Default)]
pub struct Sweep {
    axes: Vec<Axis>,
    name_order: Option<Vec<usize>>,
}

impl Sweep {
    /// Creates a sweep with no axes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an axis. The first axis added is the outermost loop.
    pub fn with_axis(mut self, axis: Axis) -> Result<Self, SweepDefinitionError> {
        if self.axes.iter().any(|a| a.name == axis.name) {
            return Err(SweepDefinitionError::DuplicateAxis(axis.name));
        }
        self.axes.push(axis);
        Ok(self)
    }

    /// Sets the order in which axis tokens appear in scenario names.
    ///
    /// `order[k]` is the index of the axis contributing the k-th token.
    pub fn with_name_order(mut self, order: Vec<usize>) -> Result<Self, SweepDefinitionError> {
        let mut sorted = order.clone();
        sorted.sort_unstable();
        if sorted != (0..self.axes.len()).collect::<Vec<_>>() {
            return Err(SweepDefinitionError::InvalidNameOrder(order));
        }
        self.name_order = Some(order);
        Ok(self)
    }

    /// Returns the axes in declared order.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Derives the scenario name for one combination of values.
    ///
    /// `values[i]` is the selected value of axis `i`. Never fails.
    pub fn scenario_name(&self, values: &[&str]) -> String {
        let order: Vec<usize> = match &self.name_order {
            Some(order) => order.clone(),
            None => (0..self.axes.len()).collect(),
        };

        order
            .iter()
            .filter_map(|&i| {
                self.axes
                    .get(i)
                    .map(|axis| axis.label(values.get(i).copied().unwrap_or("")))
            })
            .collect::<Vec<_>>()
            .join(NAME_SEPARATOR)
    }

    /// Expands the cross product of all axes into named scenarios.
    ///
    /// Iteration nests axes in declared order, the last axis varying
    /// fastest. An empty sweep, or one with an empty axis, has no scenarios.
    pub fn enumerate(&self, repeat_count: u32) -> ScenarioSet {
        let mut set = ScenarioSet::new();
        if self.axes.is_empty() || self.axes.iter().any(|a| a.values.is_empty()) {
            return set;
        }

        let mut cursor = vec![0usize; self.axes.len()];
        loop {
            let values: Vec<&str> = cursor
                .iter()
                .zip(&self.axes)
                .map(|(&i, axis)| axis.values[i].as_str())
                .collect();

            set.insert(ScenarioDefinition {
                name: self.scenario_name(&values),
                repeat_count,
                params: values.iter().map(|v| v.to_string()).collect(),
            });

            if !advance(&mut cursor, &self.axes) {
                break;
            }
        }

        set
    }
}

/// Odometer step over the axis value indices. Returns false after the last
/// combination.
fn advance(cursor: &mut [usize], axes: &[Axis]) -> bool {
    for pos in (0..cursor.len()).rev() {
        cursor[pos] += 1;
        if cursor[pos] < axes[pos].values.len() {
            return true;
        }
        cursor[pos] = 0;
    }
    false
}
