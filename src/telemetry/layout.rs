//! # Column Layout
//!
//! The table has 4 leading fleet-wide columns followed by one block of
//! [`UNIT_BLOCK_WIDTH`] columns per unit. Within a block every field sits at
//! a fixed offset, so the column of `field` for unit `i` is
//! `field.base_offset() + i * UNIT_BLOCK_WIDTH`.
//!
//! | Field | Base column |
//! |-------|-------------|
//! | Module | 9 |
//! | Vout | 10 |
//! | Vin1 | 11 |
//! | Iout | 12 |
//! | Vin2 | 13 |
//! | Text | 14 |
//! | Iin2 | 15 |
//! | Iin1 | 16 |
//! | Ref | 17 |
//! | Goff | 18 |
//! | Grss | 19 |
//! | Eoff | 20 |
//! | Erss | 21 |
//! | Ov | 22 |
//! | Oc | 23 |

use serde::Serialize;

use crate::error::{Result, ScanError};

/// Columns before the first unit block (time and fleet-wide fields)
pub const LEADING_COLUMNS: usize = 4;

/// Columns per unit block
pub const UNIT_BLOCK_WIDTH: usize = 20;

/// Per-unit telemetry fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    Module,
    Vout,
    Vin1,
    Iout,
    Vin2,
    Text,
    Iin2,
    Iin1,
    Ref,
    Goff,
    Grss,
    Eoff,
    Erss,
    Ov,
    Oc,
}

impl Field {
    /// All fields in column order
    pub const ALL: [Field; 15] = [
        Field::Module,
        Field::Vout,
        Field::Vin1,
        Field::Iout,
        Field::Vin2,
        Field::Text,
        Field::Iin2,
        Field::Iin1,
        Field::Ref,
        Field::Goff,
        Field::Grss,
        Field::Eoff,
        Field::Erss,
        Field::Ov,
        Field::Oc,
    ];

    /// Column of this field for the first unit
    pub const fn base_offset(self) -> usize {
        match self {
            Field::Module => 9,
            Field::Vout => 10,
            Field::Vin1 => 11,
            Field::Iout => 12,
            Field::Vin2 => 13,
            Field::Text => 14,
            Field::Iin2 => 15,
            Field::Iin1 => 16,
            Field::Ref => 17,
            Field::Goff => 18,
            Field::Grss => 19,
            Field::Eoff => 20,
            Field::Erss => 21,
            Field::Ov => 22,
            Field::Oc => 23,
        }
    }

    /// Name as used in report lines
    pub const fn label(self) -> &'static str {
        match self {
            Field::Module => "Module",
            Field::Vout => "Vout",
            Field::Vin1 => "Vin1",
            Field::Iout => "Iout",
            Field::Vin2 => "Vin2",
            Field::Text => "Text",
            Field::Iin2 => "Iin2",
            Field::Iin1 => "Iin1",
            Field::Ref => "Ref",
            Field::Goff => "Goff",
            Field::Grss => "Grss",
            Field::Eoff => "Eoff",
            Field::Erss => "Erss",
            Field::Ov => "Ov",
            Field::Oc => "Oc",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Column positions of every field for one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitColumns {
    index: usize,
    offsets: [usize; 15],
}

impl UnitColumns {
    /// 0-based unit position
    pub fn index(&self) -> usize {
        self.index
    }

    /// Table column holding `field` for this unit
    pub fn column(&self, field: Field) -> usize {
        self.offsets[field as usize]
    }
}

/// Schema of a telemetry table, built once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    units: Vec<UnitColumns>,
}

impl ColumnLayout {
    /// Derive the layout from the table width
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::MalformedTable`] if `total_columns - 4` is
    /// negative or not a multiple of 20.
    ///
    /// # Examples
    ///
    /// ```
    /// use fleet_fault_scan::telemetry::{ColumnLayout, Field};
    ///
    /// let layout = ColumnLayout::from_width(44)?;
    /// assert_eq!(layout.total_units(), 2);
    /// assert_eq!(layout.unit(1).column(Field::Vout), 30);
    /// # Ok::<(), fleet_fault_scan::error::ScanError>(())
    /// ```
    pub fn from_width(total_columns: usize) -> Result<Self> {
        let unit_columns = total_columns
            .checked_sub(LEADING_COLUMNS)
            .filter(|n| n % UNIT_BLOCK_WIDTH == 0)
            .ok_or(ScanError::MalformedTable {
                columns: total_columns,
            })?;

        let units = (0..unit_columns / UNIT_BLOCK_WIDTH)
            .map(Self::resolve)
            .collect();
        Ok(Self { units })
    }

    /// Closed-form column positions for unit `index`
    pub fn resolve(index: usize) -> UnitColumns {
        let mut offsets = [0; 15];
        for field in Field::ALL {
            offsets[field as usize] = field.base_offset() + index * UNIT_BLOCK_WIDTH;
        }
        UnitColumns { index, offsets }
    }

    /// Number of unit blocks
    pub fn total_units(&self) -> usize {
        self.units.len()
    }

    /// Columns for unit `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= total_units()`.
    pub fn unit(&self, index: usize) -> &UnitColumns {
        &self.units[index]
    }

    /// Iterate units in table order
    pub fn units(&self) -> impl Iterator<Item = &UnitColumns> {
        self.units.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_matches_discriminants() {
        for (i, field) in Field::ALL.iter().enumerate() {
            assert_eq!(*field as usize, i);
            assert_eq!(field.base_offset(), 9 + i);
        }
    }

    #[test]
    fn test_first_unit_offsets() {
        let unit = ColumnLayout::resolve(0);
        assert_eq!(unit.column(Field::Module), 9);
        assert_eq!(unit.column(Field::Vout), 10);
        assert_eq!(unit.column(Field::Iin1), 16);
        assert_eq!(unit.column(Field::Ref), 17);
        assert_eq!(unit.column(Field::Oc), 23);
    }

    #[test]
    fn test_offsets_shift_by_block_width() {
        let unit = ColumnLayout::resolve(3);
        assert_eq!(unit.index(), 3);
        assert_eq!(unit.column(Field::Module), 69);
        assert_eq!(unit.column(Field::Iout), 72);
        assert_eq!(unit.column(Field::Text), 74);
    }

    #[test]
    fn test_from_width_single_unit() {
        let layout = ColumnLayout::from_width(24).unwrap();
        assert_eq!(layout.total_units(), 1);
        assert_eq!(layout.unit(0).column(Field::Oc), 23);
    }

    #[test]
    fn test_from_width_no_units() {
        let layout = ColumnLayout::from_width(4).unwrap();
        assert_eq!(layout.total_units(), 0);
        assert_eq!(layout.units().count(), 0);
    }

    #[test]
    fn test_from_width_malformed() {
        for width in [0, 3, 5, 23, 25, 3024 + 1] {
            match ColumnLayout::from_width(width) {
                Err(ScanError::MalformedTable { columns }) => assert_eq!(columns, width),
                other => panic!("Width {} should be malformed, got: {:?}", width, other),
            }
        }
    }

    #[test]
    fn test_from_width_real_fleet() {
        let layout = ColumnLayout::from_width(3024).unwrap();
        assert_eq!(layout.total_units(), 151);
        assert_eq!(layout.unit(150).column(Field::Oc), 23 + 150 * 20);
    }
}
