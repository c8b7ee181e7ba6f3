//! LAB file parser.
//!
//! A LAB file is a sequence of backslash-separated lines. The first field
//! of each line is a tag: `A1` opens a patient block, `A2`..`A5` fill in
//! its administrative header and `L1`/`L5` append results to it.
//!
//! There is no escaping: a value containing `\` shifts every later column.
//! That is a property of the format and is left alone here.
//!
//! Bad lines never abort a parse. Each one produces a [`Diagnostic`] (and
//! a `warn!` event) and the rest of the file is still used.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use super::record::{AdministrativeRecord, PatientBlock, ResultRecord, ResultType};

/// Column separator.
pub const FIELD_SEPARATOR: char = '\\';

/// Marker that opens a patient block.
pub const BLOCK_START_TAG: &str = "A1";

/// Whether a tag opens a new block.
///
/// Deliberately a prefix match: some vendors emit variants such as `A1X`
/// that must still start a block.
pub fn is_block_start(tag: &str) -> bool {
    tag.starts_with(BLOCK_START_TAG)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    BlockStart,
    Identity,
    Address,
    Request,
    Insurance,
    FullResult,
    ReducedResult,
    Unknown,
}

impl LineKind {
    fn classify(tag: &str) -> Self {
        if is_block_start(tag) {
            return LineKind::BlockStart;
        }
        match tag {
            "A2" => LineKind::Identity,
            "A3" => LineKind::Address,
            "A4" => LineKind::Request,
            "A5" => LineKind::Insurance,
            "L1" => LineKind::FullResult,
            "L5" => LineKind::ReducedResult,
            _ => LineKind::Unknown,
        }
    }

    /// Number of fields, tag included, a complete line of this kind has.
    /// Trailing optional columns (A2 external id) are not counted.
    fn expected_fields(self) -> usize {
        match self {
            LineKind::BlockStart => 3,
            LineKind::Identity => 5,
            LineKind::Address => 4,
            LineKind::Request | LineKind::Insurance => 5,
            LineKind::FullResult | LineKind::ReducedResult => 8,
            LineKind::Unknown => 0,
        }
    }
}

/// Why a line was skipped or flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Tag not part of the format. Line skipped.
    UnknownTag,
    /// Line before any block was opened. Line skipped.
    NoActiveBlock,
    /// Block-opening line without a protocol id. Line skipped and the
    /// parser is left without an active block.
    MissingProtocolId,
    /// Fewer columns than the tag defines. Line kept, missing columns empty.
    ShortLine { expected: usize, found: usize },
    /// Result line whose own protocol id differs from the active block.
    /// Line kept and attributed to the active block.
    ProtocolMismatch { active: String, found: String },
}

impl DiagnosticKind {
    /// Whether the line was dropped rather than merely flagged.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::UnknownTag
                | DiagnosticKind::NoActiveBlock
                | DiagnosticKind::MissingProtocolId
        )
    }
}

/// A skipped or suspicious line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 1-based line number
    pub line: usize,
    pub tag: String,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} ({}): ", self.line, self.tag)?;
        match &self.kind {
            DiagnosticKind::UnknownTag => f.write_str("unknown tag, skipped"),
            DiagnosticKind::NoActiveBlock => f.write_str("no block started yet, skipped"),
            DiagnosticKind::MissingProtocolId => f.write_str("missing protocol id, skipped"),
            DiagnosticKind::ShortLine { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
            DiagnosticKind::ProtocolMismatch { active, found } => {
                write!(f, "result for protocol {found} inside block {active}")
            }
        }
    }
}

/// Outcome of parsing one LAB file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabParse {
    /// Blocks in file order
    pub blocks: Vec<PatientBlock>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LabParse {
    /// Diagnostics for lines that were dropped.
    pub fn skipped(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind.is_skip())
    }
}

/// Columns of one line. Out-of-range indices read as empty.
struct Fields<'a>(Vec<&'a str>);

impl<'a> Fields<'a> {
    fn split(line: &'a str) -> Self {
        Fields(line.split(FIELD_SEPARATOR).collect())
    }

    fn tag(&self) -> &'a str {
        self.0[0]
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn text(&self, i: usize) -> String {
        self.0.get(i).copied().unwrap_or_default().to_string()
    }

    fn opt(&self, i: usize) -> Option<String> {
        self.0
            .get(i)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }
}

/// The block currently being accumulated.
struct BlockBuilder {
    admin: AdministrativeRecord,
    results: Vec<ResultRecord>,
}

impl BlockBuilder {
    fn start(fields: &Fields<'_>) -> Option<Self> {
        let admin = AdministrativeRecord {
            ident_protocol: fields.opt(1)?,
            lab_id: fields.opt(2),
            ..Default::default()
        };
        Some(Self {
            admin,
            results: Vec::new(),
        })
    }

    fn finish(self) -> PatientBlock {
        PatientBlock {
            admin: self.admin,
            results: self.results,
        }
    }

    fn apply(&mut self, kind: LineKind, f: &Fields<'_>) {
        let admin = &mut self.admin;
        match kind {
            LineKind::Identity => {
                admin.surname = f.opt(1);
                admin.first_name = f.opt(2);
                admin.sex = f.opt(3);
                admin.birth_date = f.opt(4);
                admin.external_id = f.opt(5);
            }
            LineKind::Address => {
                admin.address = f.opt(1);
                admin.postal_code = f.opt(2);
                admin.city = f.opt(3);
            }
            LineKind::Request => {
                admin.doctor = f.opt(1);
                admin.request_date = f.opt(2);
                admin.reserved = f.opt(3);
                admin.protocol_type = f.opt(4);
            }
            LineKind::Insurance => {
                admin.cover = f.opt(1);
                admin.holder = f.opt(2);
                admin.holder_code_1 = f.opt(3);
                admin.holder_code_2 = f.opt(4);
            }
            LineKind::FullResult => self.results.push(ResultRecord {
                result_type: ResultType::Full,
                ident_protocol: f.text(1),
                analytical_code: f.text(2),
                analytical_name: f.text(3),
                reference_value: f.text(4),
                unit: f.text(5),
                code: f.text(6),
                result: f.text(7),
            }),
            // Columns 3..=6 exist but are blank in reduced lines
            LineKind::ReducedResult => self.results.push(ResultRecord {
                result_type: ResultType::Reduced,
                ident_protocol: f.text(1),
                analytical_code: f.text(2),
                analytical_name: String::new(),
                reference_value: String::new(),
                unit: String::new(),
                code: String::new(),
                result: f.text(7),
            }),
            LineKind::BlockStart | LineKind::Unknown => {}
        }
    }
}

/// Non-blank lines with their 1-based numbers. Accepts `\n`, `\r\n` and
/// bare `\r` terminators.
fn numbered_lines(input: &str) -> impl Iterator<Item = (usize, &str)> {
    input
        .lines()
        .flat_map(|line| line.split('\r'))
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

/// Parse the text of one LAB file.
///
/// Pure: the same input always yields the same blocks and diagnostics.
pub fn parse_lab(input: &str) -> LabParse {
    let mut blocks = Vec::new();
    let mut diagnostics = Vec::new();
    let mut current: Option<BlockBuilder> = None;

    let mut flag = |line: usize, tag: &str, kind: DiagnosticKind| {
        let diagnostic = Diagnostic {
            line,
            tag: tag.to_string(),
            kind,
        };
        warn!("{diagnostic}");
        diagnostics.push(diagnostic);
    };

    for (line_no, line) in numbered_lines(input) {
        let fields = Fields::split(line);
        let tag = fields.tag();
        let kind = LineKind::classify(tag);

        if kind == LineKind::Unknown {
            flag(line_no, tag, DiagnosticKind::UnknownTag);
            continue;
        }

        if kind == LineKind::BlockStart {
            let next = BlockBuilder::start(&fields);
            if next.is_none() {
                flag(line_no, tag, DiagnosticKind::MissingProtocolId);
            } else if fields.len() < kind.expected_fields() {
                flag(
                    line_no,
                    tag,
                    DiagnosticKind::ShortLine {
                        expected: kind.expected_fields(),
                        found: fields.len(),
                    },
                );
            }
            // Swap in the fresh builder; the old block is finished whole
            if let Some(done) = std::mem::replace(&mut current, next) {
                blocks.push(done.finish());
            }
            continue;
        }

        let Some(block) = current.as_mut() else {
            flag(line_no, tag, DiagnosticKind::NoActiveBlock);
            continue;
        };

        if fields.len() < kind.expected_fields() {
            flag(
                line_no,
                tag,
                DiagnosticKind::ShortLine {
                    expected: kind.expected_fields(),
                    found: fields.len(),
                },
            );
        }

        if matches!(kind, LineKind::FullResult | LineKind::ReducedResult) {
            let found = fields.text(1);
            if !found.is_empty() && found != block.admin.ident_protocol {
                flag(
                    line_no,
                    tag,
                    DiagnosticKind::ProtocolMismatch {
                        active: block.admin.ident_protocol.clone(),
                        found,
                    },
                );
            }
        }

        block.apply(kind, &fields);
    }

    if let Some(done) = current {
        blocks.push(done.finish());
    }

    LabParse {
        blocks,
        diagnostics,
    }
}

/// [`parse_lab`] without the diagnostics.
pub fn parse_lab_blocks(input: &str) -> Vec<PatientBlock> {
    parse_lab(input).blocks
}
