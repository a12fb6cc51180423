use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::domain::errors::ScriptError;
use crate::domain::ports::TableStore;
use crate::domain::value_objects::DatabaseName;
use crate::infrastructure::db::sql::quote_ident;

// ─── Script Runner ───

/// Runs an ad-hoc SQL script, one statement at a time, against one instance.
///
/// The store must be backed by a single connection: statements like `USE` set
/// session state that has to be visible to every statement that follows.
pub struct ScriptRunner {
    store: Arc<dyn TableStore>,
}

/// What a completed script run did.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    pub statements: usize,
    /// Rows affected per statement, in execution order.
    pub rows_affected: Vec<u64>,
}

impl ScriptRunner {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Split `script` into statements and execute them in order. The first
    /// failure stops the run; everything before it has executed, everything
    /// after it is skipped.
    pub async fn run(
        &self,
        script: &str,
        database: Option<&DatabaseName>,
    ) -> Result<ScriptReport, ScriptError> {
        if let Some(db) = database {
            self.store
                .execute(&format!("USE {}", quote_ident(&db.0)))
                .await?;
        }

        let statements = split_statements(script);
        let mut rows_affected = Vec::with_capacity(statements.len());
        for (index, statement) in statements.iter().enumerate() {
            debug!(statement = %statement, "running script statement");
            let affected =
                self.store
                    .execute(statement)
                    .await
                    .map_err(|e| ScriptError::Statement {
                        index: index + 1,
                        message: e.to_string(),
                    })?;
            rows_affected.push(affected);
        }

        Ok(ScriptReport {
            statements: statements.len(),
            rows_affected,
        })
    }
}

// ─── Statement splitting ───

/// Split a script on `;`, honouring the boundaries a naive split breaks:
/// quoted literals (`'…'`, `"…"`), backtick identifiers, `-- ` and `#` line
/// comments and `/* … */` block comments. A trailing statement without a
/// terminator is kept; segments that hold only whitespace and comments are
/// dropped.
pub fn split_statements(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_content = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                has_content = true;
                current.push(c);
                i = copy_quoted(&chars, i + 1, c, &mut current);
            }
            // MySQL only opens a line comment on "--" followed by whitespace
            // (or end of input); "a--b" is arithmetic.
            '-' if chars.get(i + 1) == Some(&'-')
                && chars.get(i + 2).map_or(true, |next| next.is_whitespace()) =>
            {
                while i < chars.len() && chars[i] != '\n' {
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                current.push_str("/*");
                i += 2;
                while i < chars.len() {
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        current.push_str("*/");
                        i += 2;
                        break;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
            }
            ';' => {
                flush_statement(&mut statements, &mut current, &mut has_content);
                i += 1;
            }
            _ => {
                if !c.is_whitespace() {
                    has_content = true;
                }
                current.push(c);
                i += 1;
            }
        }
    }
    flush_statement(&mut statements, &mut current, &mut has_content);
    statements
}

fn flush_statement(statements: &mut Vec<String>, current: &mut String, has_content: &mut bool) {
    let text = current.trim();
    if *has_content && !text.is_empty() {
        statements.push(text.to_string());
    }
    current.clear();
    *has_content = false;
}

/// Copy a quoted region into `out`, starting just after the opening quote.
/// String literals honour backslash escapes and doubled quotes; backtick
/// identifiers only the doubling. Returns the index after the closing quote
/// (or the end of input for an unterminated literal).
fn copy_quoted(chars: &[char], mut i: usize, quote: char, out: &mut String) -> usize {
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;

        if c == '\\' && quote != '`' {
            if i < chars.len() {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }
        if c == quote {
            if chars.get(i) == Some(&quote) {
                out.push(quote);
                i += 1;
                continue;
            }
            break;
        }
    }
    i
}
