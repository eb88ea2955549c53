//! Uploaded industry tables and the income-rate lookup

mod cell;
pub mod loader;
mod resolver;

pub use cell::{CellValue, CoercionError};
pub use loader::{
    is_xlsx, load_table, load_table_from_bytes, load_table_from_reader, load_table_from_xlsx, LookupTable,
    TableError,
};
pub use resolver::{
    resolve, resolve_upload, IndustryLookupResult, LookupStatus, CODE_COLUMN, FACTOR_COLUMN,
    KEY_COLUMN, REQUIRED_COLUMNS, SEARCH_COLUMN,
};
