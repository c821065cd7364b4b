// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{CacheEntryId, ValidationError};

/// Pixel half-support of one kernel plane. Serialized as an `[x, y]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 2]", into = "[u32; 2]")]
pub struct Support {
    x: u32,
    y: u32,
}

impl Support {
    pub fn new(x: u32, y: u32) -> Result<Self, ValidationError> {
        if x == 0 || y == 0 {
            return Err(ValidationError(format!(
                "support must be positive on both axes, got ({x},{y})"
            )));
        }
        Ok(Self { x, y })
    }

    pub fn symmetric(extent: u32) -> Result<Self, ValidationError> {
        Self::new(extent, extent)
    }

    #[must_use]
    pub const fn x(self) -> u32 {
        self.x
    }

    #[must_use]
    pub const fn y(self) -> u32 {
        self.y
    }

    #[must_use]
    pub const fn is_symmetric(self) -> bool {
        self.x == self.y
    }
}

impl TryFrom<[u32; 2]> for Support {
    type Error = ValidationError;

    fn try_from(value: [u32; 2]) -> Result<Self, Self::Error> {
        Self::new(value[0], value[1])
    }
}

impl From<Support> for [u32; 2] {
    fn from(value: Support) -> Self {
        [value.x, value.y]
    }
}

impl Display for Support {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Rectangular `[plane_count x entry_count]` table of supports, stored one
/// column per cache entry.
///
/// An empty table has no plane count yet; the first column pushed fixes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SupportTable {
    plane_count: usize,
    columns: Vec<Vec<Support>>,
}

impl SupportTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Vec<Support>>) -> Result<Self, ValidationError> {
        let mut table = Self::new();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.plane_count
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column(&self, id: CacheEntryId) -> Option<&[Support]> {
        self.columns.get(id.index()).map(Vec::as_slice)
    }

    #[must_use]
    pub fn get(&self, plane: usize, id: CacheEntryId) -> Option<Support> {
        self.column(id).and_then(|c| c.get(plane).copied())
    }

    /// Supports of one plane across every entry, in id order.
    #[must_use]
    pub fn row(&self, plane: usize) -> Vec<Support> {
        self.columns
            .iter()
            .filter_map(|c| c.get(plane).copied())
            .collect()
    }

    pub fn push_column(&mut self, column: Vec<Support>) -> Result<(), ValidationError> {
        self.check_column(&column)?;
        if self.columns.is_empty() {
            self.plane_count = column.len();
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn replace_column(
        &mut self,
        id: CacheEntryId,
        column: Vec<Support>,
    ) -> Result<(), ValidationError> {
        self.check_column(&column)?;
        let slot = self
            .columns
            .get_mut(id.index())
            .ok_or_else(|| ValidationError(format!("no support column for entry {id}")))?;
        *slot = column;
        Ok(())
    }

    pub fn truncate(&mut self, entry_count: usize) {
        self.columns.truncate(entry_count);
        if self.columns.is_empty() {
            self.plane_count = 0;
        }
    }

    fn check_column(&self, column: &[Support]) -> Result<(), ValidationError> {
        if column.is_empty() {
            return Err(ValidationError(
                "support column must cover at least one plane".to_string(),
            ));
        }
        if !self.columns.is_empty() && column.len() != self.plane_count {
            return Err(ValidationError(format!(
                "support column has {} planes, table expects {}",
                column.len(),
                self.plane_count
            )));
        }
        Ok(())
    }
}
