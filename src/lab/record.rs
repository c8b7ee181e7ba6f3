//! Structured records produced from a LAB file.

use serde::{Serialize, Serializer};

/// Administrative header of one patient block, assembled from the A1..A5
/// lines.
///
/// Dates are kept as the raw `DDMMYYYY` digit strings found in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdministrativeRecord {
    /// Correlation key of the block; always non-empty.
    pub ident_protocol: String,
    pub lab_id: Option<String>,

    // A2
    pub surname: Option<String>,
    pub first_name: Option<String>,
    pub sex: Option<String>,
    pub birth_date: Option<String>,
    pub external_id: Option<String>,

    // A3
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,

    // A4
    pub doctor: Option<String>,
    pub request_date: Option<String>,
    pub reserved: Option<String>,
    pub protocol_type: Option<String>,

    // A5
    pub cover: Option<String>,
    pub holder: Option<String>,
    pub holder_code_1: Option<String>,
    pub holder_code_2: Option<String>,
}

/// Shape of a result line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    /// `L1`: every column present
    Full,
    /// `L5`: only protocol, code and value
    Reduced,
}

impl ResultType {
    pub fn as_u8(self) -> u8 {
        match self {
            ResultType::Full => 1,
            ResultType::Reduced => 5,
        }
    }
}

impl Serialize for ResultType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

/// One analytical result. Columns a line does not carry are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub ident_protocol: String,
    pub analytical_code: String,
    pub analytical_name: String,
    pub reference_value: String,
    pub unit: String,
    pub code: String,
    pub result: String,
}

/// A patient's administrative header with its results in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientBlock {
    pub admin: AdministrativeRecord,
    pub results: Vec<ResultRecord>,
}

impl PatientBlock {
    pub fn protocol(&self) -> &str {
        &self.admin.ident_protocol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_type_serializes_as_line_number() {
        let record = ResultRecord {
            result_type: ResultType::Reduced,
            ident_protocol: "P001".into(),
            analytical_code: "HGB".into(),
            analytical_name: String::new(),
            reference_value: String::new(),
            unit: String::new(),
            code: String::new(),
            result: "14.2".into(),
        };
        let json = serde_json::to_value(&record).expect("serializable");
        assert_eq!(json["type"], 5);
        assert_eq!(json["result"], "14.2");
    }
}
