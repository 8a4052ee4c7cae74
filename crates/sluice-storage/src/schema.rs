// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema scripts: comment stripping, statement splitting, and loading.

use std::path::Path;

use rusqlite::Connection;
use sluice_core::SluiceError;
use tracing::debug;

use crate::exec;

/// Split a SQL script into statements.
///
/// `--` and `/* */` comments are dropped, `;` ends a statement, and quoted
/// text is left alone. Trigger bodies, which contain their own semicolons,
/// are put back together so each `CREATE TRIGGER` comes out whole.
pub fn split_script(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut pending: Option<String> = None;
    for piece in split_raw(&strip_comments(script)) {
        let piece = match pending.take() {
            Some(head) => format!("{head};\n{piece}"),
            None if starts_trigger(&piece) => piece,
            None => {
                statements.push(piece);
                continue;
            }
        };
        let (opens, ends) = block_balance(&piece);
        if ends >= opens && opens > 0 {
            statements.push(piece);
        } else {
            pending = Some(piece);
        }
    }
    // An unterminated trigger is passed through so SQLite reports it.
    statements.extend(pending);
    statements
}

/// Run every statement of `script` in one transaction. Returns how many ran.
pub fn load_script(conn: &mut Connection, script: &str) -> Result<usize, SluiceError> {
    let statements = split_script(script);
    exec::run(conn, &statements)?;
    debug!(count = statements.len(), "schema script loaded");
    Ok(statements.len())
}

/// Read a script from disk and load it.
pub fn load_file(conn: &mut Connection, path: &Path) -> Result<usize, SluiceError> {
    let script = std::fs::read_to_string(path)?;
    load_script(conn, &script)
}

#[derive(Clone, Copy, PartialEq)]
enum Quote {
    None,
    Single,
    Double,
    Backtick,
    Bracket,
}

impl Quote {
    fn open(c: char) -> Quote {
        match c {
            '\'' => Quote::Single,
            '"' => Quote::Double,
            '`' => Quote::Backtick,
            '[' => Quote::Bracket,
            _ => Quote::None,
        }
    }

    fn closes(self, c: char) -> bool {
        matches!(
            (self, c),
            (Quote::Single, '\'') | (Quote::Double, '"') | (Quote::Backtick, '`') | (Quote::Bracket, ']')
        )
    }
}

fn strip_comments(script: &str) -> String {
    let mut out = String::with_capacity(script.len());
    let mut chars = script.chars().peekable();
    let mut quote = Quote::None;
    while let Some(c) = chars.next() {
        if quote != Quote::None {
            out.push(c);
            if quote.closes(c) {
                quote = Quote::None;
            }
            continue;
        }
        let next = chars.peek().copied();
        match (c, next) {
            ('-', Some('-')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => {
                quote = Quote::open(c);
                out.push(c);
            }
        }
    }
    out
}

fn split_raw(script: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quote = Quote::None;
    for c in script.chars() {
        if quote != Quote::None {
            if quote.closes(c) {
                quote = Quote::None;
            }
            current.push(c);
            continue;
        }
        if c == ';' {
            push_trimmed(&mut pieces, &current);
            current.clear();
        } else {
            quote = Quote::open(c);
            current.push(c);
        }
    }
    push_trimmed(&mut pieces, &current);
    pieces
}

fn push_trimmed(pieces: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        pieces.push(piece.to_string());
    }
}

/// Upper-cased words outside quotes.
fn words(sql: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote = Quote::None;
    for c in sql.chars() {
        if quote != Quote::None {
            if quote.closes(c) {
                quote = Quote::None;
            }
            continue;
        }
        if c.is_alphanumeric() || c == '_' {
            current.push(c.to_ascii_uppercase());
            continue;
        }
        if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        quote = Quote::open(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn starts_trigger(sql: &str) -> bool {
    let words = words(sql);
    let mut iter = words.iter().map(String::as_str);
    if iter.next() != Some("CREATE") {
        return false;
    }
    match iter.next() {
        Some("TEMP" | "TEMPORARY") => iter.next() == Some("TRIGGER"),
        Some(word) => word == "TRIGGER",
        None => false,
    }
}

/// `(BEGIN + CASE, END)` keyword counts.
fn block_balance(sql: &str) -> (usize, usize) {
    words(sql).iter().fold((0, 0), |(opens, ends), w| match w.as_str() {
        "BEGIN" | "CASE" => (opens + 1, ends),
        "END" => (opens, ends + 1),
        _ => (opens, ends),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_strips_comments() {
        let script = "-- leading comment\n\
                      CREATE TABLE a (x INTEGER); /* block\n comment */\n\
                      INSERT INTO a VALUES (1); -- trailing\n\
                      ;;\n";
        let statements = split_script(script);
        assert_eq!(statements, ["CREATE TABLE a (x INTEGER)", "INSERT INTO a VALUES (1)"]);
    }

    #[test]
    fn quoted_text_is_untouched() {
        let script = "INSERT INTO a VALUES ('x; -- not a comment', \"col;name\");";
        assert_eq!(
            split_script(script),
            ["INSERT INTO a VALUES ('x; -- not a comment', \"col;name\")"]
        );
    }

    #[test]
    fn trigger_body_is_rejoined() {
        let script = "CREATE TABLE a (x);\n\
                      CREATE TABLE log (msg TEXT);\n\
                      CREATE TEMP TRIGGER a_ins AFTER INSERT ON a BEGIN\n\
                        INSERT INTO log VALUES (CASE WHEN new.x > 0 THEN 'pos' ELSE 'neg' END);\n\
                        INSERT INTO log VALUES ('end; of trigger');\n\
                      END;\n\
                      INSERT INTO a VALUES (1);";
        let statements = split_script(script);
        assert_eq!(statements.len(), 4);
        assert!(statements[2].starts_with("CREATE TEMP TRIGGER"));
        assert!(statements[2].ends_with("END"));
        assert_eq!(statements[3], "INSERT INTO a VALUES (1)");
    }

    #[test]
    fn load_script_runs_triggers() {
        let mut conn = Connection::open_in_memory().unwrap();
        let script = "CREATE TABLE a (x INTEGER);\n\
                      CREATE TABLE log (msg TEXT);\n\
                      CREATE TRIGGER a_ins AFTER INSERT ON a BEGIN\n\
                        INSERT INTO log VALUES ('one');\n\
                        INSERT INTO log VALUES ('two');\n\
                      END;\n\
                      INSERT INTO a VALUES (1);";
        let count = load_script(&mut conn, script).unwrap();
        assert_eq!(count, 4);
        let logged: i64 = conn.query_row("SELECT COUNT(*) FROM log", [], |r| r.get(0)).unwrap();
        assert_eq!(logged, 2);
    }

    #[test]
    fn failing_script_leaves_nothing_behind() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = load_script(&mut conn, "CREATE TABLE a (x); CREATE TABLE a (x);").unwrap_err();
        assert!(matches!(err, SluiceError::Transaction { .. }));
        let tables: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn load_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.sql");
        std::fs::write(&path, "CREATE TABLE f (x);").unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(load_file(&mut conn, &path).unwrap(), 1);
    }
}
