//! The two logical tables backing the relational store.

use std::fmt;

use serde::Serialize;

/// Logical table holding one kind of snapshot.
///
/// Table names are only ever taken from this closed set, so they can be
/// spliced into SQL while ids and blobs are bound as parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Player inventories.
    Inventory,
    /// Backpack contents.
    Backpack,
}

impl Table {
    /// Every table, in bootstrap order.
    pub const ALL: [Self; 2] = [Self::Inventory, Self::Backpack];

    /// SQL table name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Backpack => "backpack",
        }
    }

    /// Table comment set at creation.
    #[must_use]
    pub const fn comment(self) -> &'static str {
        match self {
            Self::Inventory => "Inventory table",
            Self::Backpack => "Backpack table",
        }
    }

    /// Directory holding this table's snapshot files.
    #[must_use]
    pub const fn dir(self) -> &'static str {
        match self {
            Self::Inventory => "inventories",
            Self::Backpack => "backpacks",
        }
    }

    /// Snapshot file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Inventory => "inv",
            Self::Backpack => "bp",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_fixed() {
        assert_eq!(Table::Inventory.to_string(), "inventory");
        assert_eq!(Table::Backpack.name(), "backpack");
        assert_eq!(Table::ALL.len(), 2);
    }
}
