//! Structural Parser: pair `begin`/`end` rows of the survey sheet into a
//! block tree.
//!
//! The walk is stack-based. An `end` with an empty stack, an `end` whose
//! kind differs from the innermost open block, and a block still open at
//! the end of the sheet are recorded as [`StructureFault`]s. No pairing is
//! ever guessed: a mismatched `end` leaves the stack as it was.

use crate::columns::{scan_extent, ColumnMap, Extent};
use crate::config::EngineConfig;
use crate::error::OpError;
use crate::records::{read_survey, BlockKind, Located, RecordType, SurveyRecord};
use crate::sheet::{Document, Sheet, SheetKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ── Faults ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum StructureFault {
    /// An `end` row with no open block.
    UnmatchedEnd { kind: BlockKind, row: usize },
    /// An `end` row whose kind differs from the innermost open block.
    MismatchedEnd {
        expected: BlockKind,
        open_row: usize,
        found: BlockKind,
        row: usize,
    },
    /// A block still open when the sheet ends.
    Unclosed {
        kind: BlockKind,
        name: String,
        row: usize,
    },
}

impl StructureFault {
    /// Rows the fault refers to, ascending.
    pub fn rows(&self) -> Vec<usize> {
        match self {
            StructureFault::UnmatchedEnd { row, .. } => vec![*row],
            StructureFault::MismatchedEnd { open_row, row, .. } => vec![*open_row, *row],
            StructureFault::Unclosed { row, .. } => vec![*row],
        }
    }

    fn first_row(&self) -> usize {
        self.rows().first().copied().unwrap_or(0)
    }
}

impl fmt::Display for StructureFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureFault::UnmatchedEnd { kind, row } => {
                write!(f, "row {}: 'end {}' has no matching 'begin {}'", row, kind.as_str(), kind.as_str())
            }
            StructureFault::MismatchedEnd {
                expected,
                open_row,
                found,
                row,
            } => write!(
                f,
                "row {}: 'end {}' does not close 'begin {}' opened at row {}",
                row,
                found.as_str(),
                expected.as_str(),
                open_row
            ),
            StructureFault::Unclosed { kind, name, row } => {
                if name.is_empty() {
                    write!(f, "row {}: 'begin {}' is never closed", row, kind.as_str())
                } else {
                    write!(f, "row {}: 'begin {}' '{}' is never closed", row, kind.as_str(), name)
                }
            }
        }
    }
}

// ── Block tree ──────────────────────────────────────────────────────

/// Location of one `begin`/`end` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSpan {
    pub kind: BlockKind,
    pub name: String,
    pub label: Option<String>,
    pub begin_row: usize,
    /// `None` when the block is never closed.
    pub end_row: Option<usize>,
    /// Number of blocks open when this one began (0 at top level).
    pub depth: usize,
    /// Name written on the end row, if any.
    pub end_name: Option<String>,
}

impl BlockSpan {
    pub fn is_closed(&self) -> bool {
        self.end_row.is_some()
    }

    /// Row strictly inside the pair.
    pub fn encloses(&self, row: usize) -> bool {
        row > self.begin_row && self.end_row.map_or(true, |end| row < end)
    }

    /// Row within `begin_row..=end_row`.
    pub fn covers(&self, row: usize) -> bool {
        row >= self.begin_row && self.end_row.map_or(true, |end| row <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Record { row: usize },
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    #[serde(flatten)]
    pub span: BlockSpan,
    pub children: Vec<Node>,
}

impl Block {
    fn open(kind: BlockKind, record: &SurveyRecord, row: usize, depth: usize) -> Self {
        Block {
            span: BlockSpan {
                kind,
                name: record.name.trim().to_string(),
                label: record.label.clone(),
                begin_row: row,
                end_row: None,
                depth,
                end_name: None,
            },
            children: Vec::new(),
        }
    }

    fn collect_spans(&self, out: &mut Vec<BlockSpan>) {
        out.push(self.span.clone());
        for child in &self.children {
            if let Node::Block(b) = child {
                b.collect_spans(out);
            }
        }
    }
}

/// Counts reported by `xlsform structure`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructureSummary {
    pub groups: usize,
    pub repeats: usize,
    pub questions: usize,
    pub metadata: usize,
    pub max_depth: usize,
}

/// A parsed survey sheet.
#[derive(Debug, Clone)]
pub struct FormStructure {
    pub columns: ColumnMap,
    pub extent: Extent,
    /// Non-blank rows within the readable extent, ascending by row.
    pub records: Vec<Located<SurveyRecord>>,
    pub roots: Vec<Node>,
    /// Every block, ordered by begin row.
    pub blocks: Vec<BlockSpan>,
    /// Faults ordered by first row.
    pub faults: Vec<StructureFault>,
}

impl FormStructure {
    pub fn record(&self, row: usize) -> Option<&SurveyRecord> {
        self.records
            .binary_search_by_key(&row, |r| r.row)
            .ok()
            .map(|i| &self.records[i].record)
    }

    pub fn record_type(&self, row: usize) -> Option<RecordType> {
        self.record(row).and_then(SurveyRecord::record_type)
    }

    /// Rows declaring `name`. End rows are not declarations.
    pub fn rows_named(&self, name: &str) -> Vec<usize> {
        self.records
            .iter()
            .filter(|r| r.record.name.trim() == name)
            .filter(|r| !r.record.record_type().is_some_and(|t| t.is_end()))
            .map(|r| r.row)
            .collect()
    }

    /// End rows carrying `name`.
    pub fn end_rows_named(&self, name: &str) -> Vec<usize> {
        self.records
            .iter()
            .filter(|r| r.record.name.trim() == name)
            .filter(|r| r.record.record_type().is_some_and(|t| t.is_end()))
            .map(|r| r.row)
            .collect()
    }

    /// Declared names and the rows declaring them.
    pub fn names(&self) -> BTreeMap<&str, Vec<usize>> {
        let mut names: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for r in &self.records {
            let name = r.record.name.trim();
            if name.is_empty() || r.record.record_type().is_some_and(|t| t.is_end()) {
                continue;
            }
            names.entry(name).or_default().push(r.row);
        }
        names
    }

    /// The block opened at `begin_row`.
    pub fn block_at(&self, begin_row: usize) -> Option<&BlockSpan> {
        self.blocks
            .binary_search_by_key(&begin_row, |b| b.begin_row)
            .ok()
            .map(|i| &self.blocks[i])
    }

    /// The block closed at `end_row`.
    pub fn block_ending_at(&self, end_row: usize) -> Option<&BlockSpan> {
        self.blocks.iter().find(|b| b.end_row == Some(end_row))
    }

    /// Number of blocks strictly enclosing `row`.
    pub fn depth_of(&self, row: usize) -> usize {
        self.blocks.iter().filter(|b| b.encloses(row)).count()
    }

    /// Non-blank rows strictly inside a block.
    pub fn inner_rows(&self, span: &BlockSpan) -> Vec<usize> {
        self.records
            .iter()
            .map(|r| r.row)
            .filter(|row| span.encloses(*row))
            .collect()
    }

    pub fn is_balanced(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn require_balanced(&self) -> Result<(), OpError> {
        if self.faults.is_empty() {
            Ok(())
        } else {
            Err(OpError::UnbalancedStructure {
                faults: self.faults.clone(),
            })
        }
    }

    /// Last non-blank row read, or the header row for an empty sheet.
    pub fn last_data_row(&self) -> usize {
        self.records.last().map(|r| r.row).unwrap_or(1)
    }

    pub fn summary(&self) -> StructureSummary {
        let mut summary = StructureSummary::default();
        for span in &self.blocks {
            match span.kind {
                BlockKind::Group => summary.groups += 1,
                BlockKind::Repeat => summary.repeats += 1,
            }
            summary.max_depth = summary.max_depth.max(span.depth + 1);
        }
        for r in &self.records {
            match r.record.record_type() {
                Some(t) if t.is_metadata() => summary.metadata += 1,
                Some(RecordType::Field { .. }) => summary.questions += 1,
                _ => {}
            }
        }
        summary
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

fn container<'a>(stack: &'a mut [Block], roots: &'a mut Vec<Node>) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(block) => &mut block.children,
        None => roots,
    }
}

/// Pair begin/end rows of `records` into a block tree.
///
/// Returns the top-level nodes and the faults ordered by first row.
pub fn pair_blocks(records: &[Located<SurveyRecord>]) -> (Vec<Node>, Vec<StructureFault>) {
    let mut roots: Vec<Node> = Vec::new();
    let mut stack: Vec<Block> = Vec::new();
    let mut faults: Vec<StructureFault> = Vec::new();

    for located in records {
        let row = located.row;
        match located.record.record_type() {
            Some(RecordType::Begin(kind)) => {
                let depth = stack.len();
                stack.push(Block::open(kind, &located.record, row, depth));
            }
            Some(RecordType::End(kind)) => match stack.last() {
                None => {
                    faults.push(StructureFault::UnmatchedEnd { kind, row });
                    roots.push(Node::Record { row });
                }
                Some(open) if open.span.kind != kind => {
                    faults.push(StructureFault::MismatchedEnd {
                        expected: open.span.kind,
                        open_row: open.span.begin_row,
                        found: kind,
                        row,
                    });
                    container(&mut stack, &mut roots).push(Node::Record { row });
                }
                Some(_) => {
                    if let Some(mut block) = stack.pop() {
                        block.span.end_row = Some(row);
                        let end_name = located.record.name.trim();
                        if !end_name.is_empty() {
                            block.span.end_name = Some(end_name.to_string());
                        }
                        container(&mut stack, &mut roots).push(Node::Block(block));
                    }
                }
            },
            _ => container(&mut stack, &mut roots).push(Node::Record { row }),
        }
    }

    while let Some(block) = stack.pop() {
        faults.push(StructureFault::Unclosed {
            kind: block.span.kind,
            name: block.span.name.clone(),
            row: block.span.begin_row,
        });
        container(&mut stack, &mut roots).push(Node::Block(block));
    }
    faults.sort_by_key(StructureFault::first_row);
    (roots, faults)
}

/// Walk the survey rows within `extent` and build the block tree.
pub fn parse_survey(sheet: &Sheet, columns: ColumnMap, extent: Extent) -> FormStructure {
    let records = read_survey(sheet, &columns, &extent);
    let (roots, faults) = pair_blocks(&records);

    let mut blocks = Vec::new();
    for node in &roots {
        if let Node::Block(b) = node {
            b.collect_spans(&mut blocks);
        }
    }
    blocks.sort_by_key(|b| b.begin_row);

    log::debug!(
        "survey: {} row(s), {} block(s), {} fault(s)",
        records.len(),
        blocks.len(),
        faults.len()
    );

    FormStructure {
        columns,
        extent,
        records,
        roots,
        blocks,
        faults,
    }
}

/// Map and parse the survey sheet of `doc`.
///
/// Fails on a duplicate header or when the sheet has no `type` column.
/// Structural faults are not failures here; see [`FormStructure::require_balanced`].
pub fn parse_structure(doc: &Document, config: &EngineConfig) -> Result<FormStructure, OpError> {
    let extent = scan_extent(&doc.survey, config.blank_threshold);
    let columns = ColumnMap::from_header(doc.survey.header(), SheetKind::Survey, extent.width)?;
    if !columns.contains("type") {
        return Err(OpError::MissingColumn {
            sheet: SheetKind::Survey,
            column: "type".to_string(),
        });
    }
    Ok(parse_survey(&doc.survey, columns, extent))
}
