//! Removal of psql-only syntax before a script is tokenized.

const BOM: char = '\u{FEFF}';

pub fn strip_bom(script: &str) -> &str {
    script.strip_prefix(BOM).unwrap_or(script)
}

/// Removes psql meta-commands (`\connect`, `\gexec`, ...) and the conditional
/// `SELECT 'CREATE DATABASE ...' \gexec` idiom.
///
/// Database creation is the guard's job, so the whole idiom goes, from its
/// `SELECT` line through the line carrying `\gexec`. Every other line is kept
/// verbatim, blank lines and comments included.
pub fn strip_meta_commands(script: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut in_create_db_block = false;

    for line in script.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let trimmed = line.trim();

        if in_create_db_block {
            if trimmed.contains("\\gexec") {
                in_create_db_block = false;
            }
            continue;
        }
        if trimmed.starts_with('\\') {
            continue;
        }
        if starts_create_database_select(trimmed) {
            // A single-line idiom ends on the same line.
            in_create_db_block = !trimmed.contains("\\gexec");
            continue;
        }
        kept.push(line);
    }

    kept.join("\n")
}

fn starts_create_database_select(line: &str) -> bool {
    let Some(head) = line.get(..6) else {
        return false;
    };
    if !head.eq_ignore_ascii_case("select") {
        return false;
    }
    let rest = &line[6..];
    let after_ws = rest.trim_start();
    if after_ws.len() == rest.len() {
        return false;
    }
    after_ws
        .get(..16)
        .is_some_and(|lit| lit.eq_ignore_ascii_case("'create database"))
}
