//! Abstract attribute type -> ActiveRecord column type.
//!
//! Type tokens are open-ended strings: anything not in the table is handed
//! to the ORM verbatim.

/// Map an abstract type token to the column type used in migrations.
///
/// `string`, `integer`, `boolean`, `text`, `decimal`, `float`, `date`,
/// `binary` and `json` map to themselves, `time` becomes `datetime`.
pub fn map_type(token: &str) -> &str {
    match token {
        "time" => "datetime",
        other => other,
    }
}
