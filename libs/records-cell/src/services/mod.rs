pub mod records;

pub use records::{RecordService, RecordTables};
