//! On-disk forms of records, plans, undo journals and reports

pub mod plan_file;
pub mod records;
pub mod report;

pub use plan_file::{write_plan_document, write_plan_stream, PlanFormat, PlanReader, PlanStreamWriter};
pub use records::{write_records, RecordReader};
pub use report::{load_report, save_report};
