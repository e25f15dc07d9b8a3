//! Board Code Table
//!
//! Maps the board identifiers reported by the terminal onto canonical
//! exchange-board codes used on the message bus.

use std::collections::HashMap;

/// Canonical code of the equities board.
pub const EQUITIES_BOARD_CODE: &str = "EQBR";

/// Canonical code of the derivatives (bonds and ETF) board.
pub const DERIVATIVES_BOARD_CODE: &str = "FBCB";

/// Canonical code of the futures board.
pub const FUTURES_BOARD_CODE: &str = "FORTS";

/// Read-only mapping from vendor board identifiers to canonical codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardCodeTable {
    codes: HashMap<String, String>,
}

impl BoardCodeTable {
    /// Build the table with the terminal's standard boards.
    #[must_use]
    pub fn standard() -> Self {
        Self::from_pairs([
            ("EQ", EQUITIES_BOARD_CODE),
            ("FOB", DERIVATIVES_BOARD_CODE),
            ("RTS_FUT", FUTURES_BOARD_CODE),
        ])
    }

    /// Build a table from explicit `(vendor, canonical)` pairs.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            codes: pairs
                .into_iter()
                .map(|(vendor, canonical)| (vendor.to_string(), canonical.to_string()))
                .collect(),
        }
    }

    /// Look up the canonical code for a vendor board identifier.
    #[must_use]
    pub fn lookup(&self, vendor: &str) -> Option<&str> {
        self.codes.get(vendor).map(String::as_str)
    }

    /// Canonical code for `vendor`, or the vendor identifier itself when the
    /// table has no entry for it.
    #[must_use]
    pub fn resolve(&self, vendor: &str) -> String {
        self.lookup(vendor).unwrap_or(vendor).to_string()
    }

    /// Number of known boards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for BoardCodeTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    #[test_case("EQ", EQUITIES_BOARD_CODE ; "equities")]
    #[test_case("FOB", DERIVATIVES_BOARD_CODE ; "derivatives")]
    #[test_case("RTS_FUT", FUTURES_BOARD_CODE ; "futures")]
    fn standard_boards(vendor: &str, expected: &str) {
        let table = BoardCodeTable::standard();
        assert_eq!(table.lookup(vendor), Some(expected));
    }

    #[test]
    fn unknown_board_passes_through() {
        let table = BoardCodeTable::standard();
        assert_eq!(table.lookup("SPB"), None);
        assert_eq!(table.resolve("SPB"), "SPB");
    }

    #[test]
    fn standard_table_size() {
        let table = BoardCodeTable::default();
        assert_eq!(table.len(), 3);
        assert!(!table.is_empty());
    }

    proptest! {
        #[test]
        fn repeated_lookups_are_stable(repeats in 1usize..64, idx in 0usize..3) {
            let table = BoardCodeTable::standard();
            let vendor = ["EQ", "FOB", "RTS_FUT"][idx];
            let first = table.lookup(vendor).map(str::to_string);
            for _ in 0..repeats {
                prop_assert_eq!(table.lookup(vendor).map(str::to_string), first.clone());
            }
            prop_assert_eq!(table, BoardCodeTable::standard());
        }
    }
}
