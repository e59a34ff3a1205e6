use std::collections::BTreeMap;

use serde::Serialize;
use xlsform_core::deps::{DependencyEdge, FilterColumnUse};
use xlsform_core::DependencyIndex;

use super::Session;
use crate::OutputFormat;

#[derive(Serialize)]
struct DepsReport<'a> {
    dependents: BTreeMap<&'a str, &'a [DependencyEdge]>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    filter_columns: BTreeMap<&'a str, &'a [FilterColumnUse]>,
}

pub(crate) fn cmd_deps(session: &Session, name: Option<&str>) {
    let doc = session.load();
    let index = DependencyIndex::build_with(&doc, &session.engine);

    let dependents: BTreeMap<&str, &[DependencyEdge]> = index
        .dependents
        .iter()
        .filter(|(to, _)| name.map_or(true, |n| n == to.as_str()))
        .map(|(to, edges)| (to.as_str(), edges.as_slice()))
        .collect();
    let filter_columns: BTreeMap<&str, &[FilterColumnUse]> = if name.is_none() {
        index
            .filter_columns
            .iter()
            .map(|(col, uses)| (col.as_str(), uses.as_slice()))
            .collect()
    } else {
        BTreeMap::new()
    };

    match session.output {
        OutputFormat::Json => session.print_json(&DepsReport {
            dependents,
            filter_columns,
        }),
        OutputFormat::Text => {
            if session.quiet {
                return;
            }
            if dependents.is_empty() {
                match name {
                    Some(n) => println!("nothing references '{}'", n),
                    None => println!("no references found"),
                }
            }
            for (to, edges) in &dependents {
                println!("{}", to);
                for edge in edges.iter() {
                    let from = if edge.from.is_empty() { "(unnamed)" } else { edge.from.as_str() };
                    println!("  <- row {} {} [{}]", edge.row, from, edge.column);
                }
            }
            for (col, uses) in &filter_columns {
                let rows: Vec<String> = uses.iter().map(|u| u.row.to_string()).collect();
                println!("choices column '{}' filtered by row(s) {}", col, rows.join(", "));
            }
        }
    }
}
