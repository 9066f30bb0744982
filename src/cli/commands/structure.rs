use anyhow::Result;
use clausecheck_engine::{Section, StructureHints, structure_with_hints};
use clausecheck_utils::canonicalization::emit_jcs;
use clausecheck_utils::error::ReviewError;
use clausecheck_utils::exit_codes::ExitCode;
use std::path::Path;

use super::common::read_document;

/// Print the sections `file` splits into. Makes no LLM calls.
pub fn execute_structure_command(
    file: &Path,
    heading_lines: Vec<usize>,
    json: bool,
) -> Result<ExitCode> {
    let raw = read_document(file)?;
    let hints = StructureHints { heading_lines };
    let sections = structure_with_hints(&raw, &hints).map_err(ReviewError::from)?;

    if json {
        println!("{}", emit_jcs(&sections)?);
    } else {
        print!("{}", format_sections(&sections));
    }
    Ok(ExitCode::SUCCESS)
}

fn format_sections(sections: &[Section]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str(&format!(
            "§{} {} ({} 字符)\n",
            section.index,
            section.title,
            section.body.chars().count()
        ));
    }
    out.push_str(&format!("\n共 {} 个章节\n", sections.len()));
    out
}
