//! Migration text rendering.
//!
//! Produces the body of an ActiveRecord `change` method from a declared
//! schema, and wraps it into a full migration class:
//!
//! ```text
//! create_table :users do |t|
//!   t.string :email, null: false
//!
//!   t.timestamps
//! end
//!
//! add_index :users, :email
//! ```
use heck::ToPascalCase;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};
use crate::schema::{
    self, AttributeSchema, ColumnOptions, ColumnSchema, IndexDefinition, IndexSchema,
};
use crate::template::{self, Context, TemplateValue};
use crate::types::map_type;

const MIGRATION_TEMPLATE: &str = include_str!("templates/migration.rb.tmpl");

/// Schema version of the migration framework, e.g. `7.1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationVersion(String);

impl MigrationVersion {
    pub fn new(version: impl Into<String>) -> Self {
        MigrationVersion(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MigrationVersion {
    fn default() -> Self {
        MigrationVersion::new("7.1")
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render a JSON value as a Ruby literal.
pub fn ruby_literal(value: &Value) -> String {
    match value {
        Value::Null => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s)
            .unwrap_or_else(|_| format!("{:?}", s))
            .replace("#{", "\\#{"),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(ruby_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let pairs: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{} => {}",
                        ruby_literal(&Value::String(k.clone())),
                        ruby_literal(v)
                    )
                })
                .collect();
            format!("{{{}}}", pairs.join(", "))
        }
    }
}

fn options_suffix(options: Vec<String>) -> String {
    if options.is_empty() {
        String::new()
    } else {
        format!(", {}", options.join(", "))
    }
}

/// Render native column options as a `, key: value` suffix.
pub fn render_column_options(options: &ColumnOptions) -> String {
    let mut out = Vec::new();
    if options.null == Some(false) {
        out.push("null: false".to_string());
    }
    if let Some(default) = &options.default {
        out.push(format!("default: {}", ruby_literal(default)));
    }
    if let Some(limit) = options.limit {
        out.push(format!("limit: {}", limit));
    }
    if let Some(precision) = options.precision {
        out.push(format!("precision: {}", precision));
    }
    if let Some(scale) = options.scale {
        out.push(format!("scale: {}", scale));
    }
    options_suffix(out)
}

/// Column options suffix for one attribute, e.g. `, null: false, limit: 100`.
pub fn build_column_options(schema: &ColumnSchema) -> String {
    render_column_options(&schema.column_options())
}

/// Index options suffix, e.g. `, unique: true, name: 'idx_users_email'`.
pub fn build_index_options(index: &IndexDefinition) -> String {
    let mut out = Vec::new();
    if index.unique {
        out.push("unique: true".to_string());
    }
    if let Some(name) = &index.name {
        out.push(format!("name: '{}'", name));
    }
    options_suffix(out)
}

fn render_columns(columns: &[String]) -> String {
    match columns {
        [single] => format!(":{}", single),
        many => {
            let symbols: Vec<String> = many.iter().map(|c| format!(":{}", c)).collect();
            format!("[{}]", symbols.join(", "))
        }
    }
}

/// Renderer for one `create_table` migration body.
pub struct CreateTableMigration<'a> {
    table_name: &'a str,
    attributes: &'a AttributeSchema,
    indices: &'a IndexSchema,
    timestamps: bool,
}

impl<'a> CreateTableMigration<'a> {
    pub fn new(
        table_name: &'a str,
        attributes: &'a AttributeSchema,
        indices: &'a IndexSchema,
    ) -> Self {
        CreateTableMigration {
            table_name,
            attributes,
            indices,
            timestamps: true,
        }
    }

    /// Never append `t.timestamps`, even if the timestamp columns are missing.
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    pub fn render(&self) -> Result<String> {
        schema::validate(self.table_name, self.attributes, self.indices)?;
        let table = self.table_name;
        let mut lines = vec![format!("create_table :{} do |t|", table)];

        for (name, column) in self.attributes.iter() {
            if name == schema::PRIMARY_KEY {
                continue;
            }
            lines.push(format!(
                "  t.{} :{}{}",
                map_type(&column.type_name),
                name,
                build_column_options(column)
            ));
        }

        if self.timestamps && schema::needs_timestamps(self.attributes) {
            lines.push(String::new());
            lines.push("  t.timestamps".to_string());
        }
        lines.push("end".to_string());

        for (_, index) in self.indices.iter() {
            lines.push(String::new());
            lines.push(format!(
                "add_index :{}, {}{}",
                table,
                render_columns(&index.columns),
                build_index_options(index)
            ));
        }

        for (name, column) in schema::implicit_indices(self.attributes, self.indices) {
            let suffix = if column.unique { ", unique: true" } else { "" };
            lines.push(String::new());
            lines.push(format!("add_index :{}, :{}{}", table, name, suffix));
        }

        Ok(lines.join("\n"))
    }
}

/// Render the `create_table` block and `add_index` statements for a table.
pub fn generate_create_table_migration(
    table_name: &str,
    attributes: &AttributeSchema,
    indices: &IndexSchema,
) -> Result<String> {
    CreateTableMigration::new(table_name, attributes, indices).render()
}

/// `create_users` -> `CreateUsers`.
pub fn migration_class_name(migration_name: &str) -> String {
    migration_name.to_pascal_case()
}

/// Indent every non-empty line by `depth` levels of `unit`.
pub(crate) fn indent(text: &str, unit: &str, depth: usize) -> String {
    let prefix = unit.repeat(depth);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap an already rendered body into a migration class.
pub fn render_migration_class(
    body: &str,
    migration_name: &str,
    version: &MigrationVersion,
) -> Result<String> {
    let class_name = migration_class_name(migration_name);
    if class_name.is_empty() {
        return Err(Error::schema(migration_name, "migration name is empty"));
    }
    let mut context = Context::new();
    context.insert("class_name".to_string(), TemplateValue::from(class_name));
    context.insert("migration_version".to_string(), TemplateValue::from(version.to_string()));
    context.insert("body".to_string(), TemplateValue::from(indent(body, "  ", 2)));
    Ok(template::render_str(MIGRATION_TEMPLATE, &context))
}

/// Render a complete migration class creating `table_name`.
pub fn generate_migration_class(
    table_name: &str,
    attributes: &AttributeSchema,
    indices: &IndexSchema,
    migration_name: &str,
    version: &MigrationVersion,
) -> Result<String> {
    let body = generate_create_table_migration(table_name, attributes, indices)?;
    render_migration_class(&body, migration_name, version)
}
