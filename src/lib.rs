//! # Rusty Binder
//!
//! Binds tables found inside spreadsheet grids to typed records, in both
//! directions.
//!
//! ## Features
//!
//! - **Table location**: find a table by cell address, by explicit coordinates
//!   or by a label (exact text or regular expression) with an offset
//! - **Column mapping**: bind record fields to header labels, to columns under
//!   merged headers, or collect a run of columns into a key/value map
//! - **Record extraction**: lazily read records until a configurable terminal
//!   (blank row, border, label, header count or fixed row count)
//! - **Write-back**: write records over template rows, inserting, copying,
//!   clearing or deleting rows as needed while merged regions, named ranges,
//!   validations and formulas below the table follow the moved rows
//! - **Nested tables**: one-to-many and one-to-one inner tables confined to
//!   the rows of each outer record
//! - **YAML layouts**: table layouts can be kept in configuration files
//!
//! ## Usage
//!
//! ```ignore
//! let layout = TableLayout::from_yaml_str(&std::fs::read_to_string("people.yaml")?)?;
//! if let Some(load) = load_table::<Person>(&sheet, &layout)? {
//!     let mut people = load.values();
//!     people.retain(|person| person.active);
//!     save_table(&mut sheet, &layout, &people)?;
//! }
//! ```
pub mod convert;
pub mod error;
pub mod grid;
pub mod record;
pub mod table;

pub use crate::convert::FromCell;
pub use crate::convert::IntoCell;
pub use crate::error::BinderError;
pub use crate::grid::CellValue;
pub use crate::grid::Coordinate;
pub use crate::grid::Grid;
pub use crate::grid::Region;
pub use crate::record::TableRecord;
pub use crate::table::load_sheets;
pub use crate::table::load_table;
pub use crate::table::resolve_table;
pub use crate::table::save_table;
pub use crate::table::TableHandle;
pub use crate::table::TableLayout;
pub use crate::table::TableOptions;
