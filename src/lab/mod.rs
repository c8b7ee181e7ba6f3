//! LAB result files: record types and the line parser.

mod parser;
mod record;

pub use parser::{
    BLOCK_START_TAG, Diagnostic, DiagnosticKind, FIELD_SEPARATOR, LabParse, is_block_start,
    parse_lab, parse_lab_blocks,
};
pub use record::{AdministrativeRecord, PatientBlock, ResultRecord, ResultType};
