use crate::domain::value_objects::{ColumnName, DatabaseName, TableName};

// ─────────────────────────────────────────────────────────────────────────────
// Catalog queries
// ─────────────────────────────────────────────────────────────────────────────

/// Column names and types in ordinal (table definition) order.
pub const INTROSPECT_COLUMNS_SQL: &str = "SELECT column_name, data_type \
     FROM information_schema.columns \
     WHERE table_schema = ? AND table_name = ? \
     ORDER BY ordinal_position";

/// Exact-match existence probe. Parameterized on purpose: `SHOW TABLES LIKE`
/// would treat `_` and `%` in the table name as wildcards.
pub const TABLE_EXISTS_SQL: &str = "SELECT 1 FROM information_schema.tables \
     WHERE table_schema = ? AND table_name = ? \
     LIMIT 1";

pub const LIST_TABLES_SQL: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_schema = ? \
     ORDER BY table_name";

// ─────────────────────────────────────────────────────────────────────────────
// Query builders
// ─────────────────────────────────────────────────────────────────────────────

/// Quote an identifier MySQL/MariaDB style: `` `col` ``, backticks doubled.
pub fn quote_ident(s: &str) -> String {
    format!("`{}`", s.replace('`', "``"))
}

/// Fully-qualified table reference: `` `db`.`table` ``.
pub fn qualified(database: &DatabaseName, table: &TableName) -> String {
    format!("{}.{}", quote_ident(&database.0), quote_ident(&table.0))
}

/// Prepared statements carry their parameter count as a u16 on the wire, so
/// one statement can never bind more than this many `?` placeholders.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Rows per INSERT statement for a table of `column_count` columns: as many
/// as fit inside [`MAX_BIND_PARAMS`], capped at `ceiling`. Always at least 1.
pub fn rows_per_chunk(column_count: usize, ceiling: usize) -> usize {
    (MAX_BIND_PARAMS / column_count.max(1)).clamp(1, ceiling)
}

/// `true` if `data_type` (an `information_schema.data_type` value) is decodable
/// by `sqlx::AnyRow` without an explicit cast.
pub fn is_native_type(data_type: &str) -> bool {
    matches!(
        data_type.to_lowercase().as_str(),
        "int" | "mediumint" | "bigint" | "float" | "double"
    )
}

/// `true` for the byte-typed column families (BINARY/VARBINARY and the BLOB
/// sizes). Their contents are arbitrary bytes, so they ferry as hex — a
/// text cast would substitute anything that is not valid UTF-8.
pub fn is_binary_type(data_type: &str) -> bool {
    matches!(
        data_type.to_lowercase().as_str(),
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob"
    )
}

/// Cast expression coercing a non-native column to something `sqlx::AnyRow`
/// can read. The result still arrives as BLOB; the decoder reads raw bytes
/// and reinterprets them with the type hint.
pub fn cast_to_text(col_quoted: &str) -> String {
    format!("CONVERT({} USING utf8mb4) AS {}", col_quoted, col_quoted)
}

/// Byte-safe read of a binary column. The hex string survives the text
/// protocol unscathed; the insert side pairs it with an `UNHEX(?)`
/// placeholder.
pub fn hex_expr(col_quoted: &str) -> String {
    format!("HEX({}) AS {}", col_quoted, col_quoted)
}

/// SELECT over every column of the table, each read natively, hexed, or
/// wrapped in the cast expression, in ordinal order.
///
/// `col_types` is the `(column_name, data_type)` list from
/// `information_schema.columns`. No ORDER BY: row order is irrelevant to a
/// copy and the fingerprint is order-independent.
pub fn build_typed_select(
    database: &DatabaseName,
    table: &TableName,
    col_types: &[(String, String)],
) -> String {
    let col_exprs: Vec<String> = col_types
        .iter()
        .map(|(col_name, data_type)| {
            let q = quote_ident(col_name);
            if is_native_type(data_type) {
                q
            } else if is_binary_type(data_type) {
                hex_expr(&q)
            } else {
                cast_to_text(&q)
            }
        })
        .collect();

    format!(
        "SELECT {} FROM {}",
        col_exprs.join(", "),
        qualified(database, table)
    )
}

/// Multi-row parameterized INSERT for `row_count` rows over `columns`,
/// destination columns in the source's order. `binary` aligns with `columns`;
/// flagged columns get an `UNHEX(?)` placeholder to undo the hex read.
pub fn build_insert(
    database: &DatabaseName,
    table: &TableName,
    columns: &[ColumnName],
    binary: &[bool],
    row_count: usize,
) -> String {
    let cols_quoted: Vec<String> = columns.iter().map(|c| quote_ident(&c.0)).collect();
    let cell_placeholders: Vec<&str> = (0..columns.len())
        .map(|i| {
            if binary.get(i).copied().unwrap_or(false) {
                "UNHEX(?)"
            } else {
                "?"
            }
        })
        .collect();
    let placeholder_row = format!("({})", cell_placeholders.join(", "));
    let placeholders = vec![placeholder_row; row_count].join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified(database, table),
        cols_quoted.join(", "),
        placeholders
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
