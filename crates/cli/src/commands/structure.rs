use serde::Serialize;
use xlsform_core::structure::Node;
use xlsform_core::{parse_structure, FormStructure, StructureFault, StructureSummary};

use super::Session;
use crate::OutputFormat;

#[derive(Serialize)]
struct StructureReport<'a> {
    balanced: bool,
    summary: StructureSummary,
    tree: &'a [Node],
    faults: &'a [StructureFault],
}

fn print_nodes(structure: &FormStructure, nodes: &[Node], indent: usize) {
    let pad = "  ".repeat(indent);
    for node in nodes {
        match node {
            Node::Record { row } => {
                let Some(record) = structure.record(*row) else { continue };
                // End rows are implied by the enclosing block.
                if record.record_type().is_some_and(|t| t.is_end()) {
                    continue;
                }
                println!("{}{:>4}  {}  {}", pad, row, record.type_name.trim(), record.name.trim());
            }
            Node::Block(block) => {
                let span = &block.span;
                let rows = match span.end_row {
                    Some(end) => format!("rows {}-{}", span.begin_row, end),
                    None => format!("row {}, never closed", span.begin_row),
                };
                println!("{}{:>4}  begin {}  {} ({})", pad, span.begin_row, span.kind.as_str(), span.name, rows);
                print_nodes(structure, &block.children, indent + 1);
            }
        }
    }
}

pub(crate) fn cmd_structure(session: &Session) {
    let doc = session.load();
    let structure = match parse_structure(&doc, &session.engine) {
        Ok(s) => s,
        Err(e) => session.fail(&e),
    };
    let summary = structure.summary();

    match session.output {
        OutputFormat::Json => session.print_json(&StructureReport {
            balanced: structure.is_balanced(),
            summary,
            tree: &structure.roots,
            faults: &structure.faults,
        }),
        OutputFormat::Text => {
            if session.quiet {
                return;
            }
            print_nodes(&structure, &structure.roots, 0);
            println!();
            println!(
                "{} question(s), {} metadata field(s), {} group(s), {} repeat(s), max depth {}",
                summary.questions, summary.metadata, summary.groups, summary.repeats, summary.max_depth
            );
            for fault in &structure.faults {
                println!("unbalanced: {}", fault);
            }
        }
    }
}
