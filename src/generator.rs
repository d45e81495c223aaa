//! Model and migration scaffolding from `name[:type][:index]` arguments.
//!
//! `generate User email:string:index age:integer` produces
//! `app/models/user.rb` and `db/migrate/<timestamp>_create_users.rb`.
use chrono::{DateTime, Utc};
use heck::{ToPascalCase, ToSnakeCase};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::adapter::ActiveRecordAdapter;
use crate::error::{Error, Result};
use crate::migration::{self, CreateTableMigration, indent, ruby_literal};
use crate::schema::{
    AttributeSchema, CREATED_AT, ColumnSchema, IndexSchema, PRIMARY_KEY, UPDATED_AT, is_identifier,
};
use crate::settings::GeneratorSettings;
use crate::template::{self, Context, TemplateValue};

const MODEL_TEMPLATE: &str = include_str!("templates/model.rb.tmpl");

/// `<version>_<migration name>.rb`
static MIGRATION_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+_([A-Za-z0-9_]+)\.rb$").expect("valid migration file regex"));

/// One parsed command-line attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDefinition {
    pub name: String,
    pub type_name: String,
    pub indexed: bool,
    pub unique: bool,
    pub default: Option<Value>,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, type_name: &str, indexed: bool, unique: bool) -> Self {
        let type_name = normalize_type(type_name);
        let default = if type_name == "boolean" {
            Some(Value::Bool(false))
        } else {
            None
        };
        AttributeDefinition {
            name: name.into(),
            type_name,
            indexed,
            unique,
            default,
        }
    }

    /// Replace the implicit default (booleans default to `false`).
    pub fn with_default(mut self, default: Option<Value>) -> Self {
        self.default = default;
        self
    }

    /// `, index: true, unique: true, default: false` suffix for the model file.
    pub fn options_string(&self) -> String {
        let mut options = Vec::new();
        if self.indexed {
            options.push("index: true".to_string());
        }
        if self.unique {
            options.push("unique: true".to_string());
        }
        if let Some(default) = &self.default {
            options.push(format!("default: {}", ruby_literal(default)));
        }
        if options.is_empty() {
            String::new()
        } else {
            format!(", {}", options.join(", "))
        }
    }

    pub fn column_schema(&self) -> ColumnSchema {
        ColumnSchema {
            index: self.indexed,
            unique: self.unique,
            default: self.default.clone(),
            ..ColumnSchema::new(self.type_name.clone())
        }
    }
}

/// Collapse type aliases to the canonical generator types.
pub fn normalize_type(type_name: &str) -> String {
    let normalized = match type_name.to_ascii_lowercase().as_str() {
        "string" | "text" => "string",
        "integer" | "int" => "integer",
        "boolean" | "bool" => "boolean",
        "datetime" | "time" | "timestamp" => "datetime",
        "date" => "date",
        "decimal" | "numeric" => "decimal",
        "float" | "double" => "float",
        "binary" | "blob" => "binary",
        "json" | "jsonb" => "json",
        _ => return type_name.to_string(),
    };
    normalized.to_string()
}

/// Parse one `name[:type][:index]` token.
pub fn parse_attribute(token: &str) -> Result<AttributeDefinition> {
    let mut segments: Vec<&str> = token.trim().split(':').collect();
    let mut indexed = false;
    let mut unique = false;

    while segments.len() > 1 {
        match segments[segments.len() - 1] {
            "index" => indexed = true,
            "uniq" | "unique" => {
                indexed = true;
                unique = true;
            }
            _ => break,
        }
        segments.pop();
    }
    if segments.len() > 2 {
        return Err(Error::attribute(token, format!("unexpected segment `{}`", segments[2])));
    }

    let mut name = segments[0].to_string();
    if name.is_empty() {
        return Err(Error::attribute(token, "attribute name is missing"));
    }
    if let Some(stripped) = name.strip_suffix("_index") {
        if !stripped.is_empty() {
            name = stripped.to_string();
            indexed = true;
        }
    }
    if !is_identifier(&name) {
        return Err(Error::attribute(token, "attribute name must be an identifier"));
    }

    let mut type_name = segments
        .get(1)
        .filter(|t| !t.is_empty())
        .copied()
        .unwrap_or("string")
        .to_string();
    if matches!(type_name.as_str(), "references" | "belongs_to") {
        type_name = "integer".to_string();
        if !name.ends_with("_id") {
            name.push_str("_id");
        }
    }

    Ok(AttributeDefinition::new(name, &type_name, indexed, unique))
}

/// Parse every token, rejecting duplicates.
pub fn parse_attributes<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<AttributeDefinition>> {
    let mut parsed: Vec<AttributeDefinition> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let attr = parse_attribute(token.as_ref())?;
        if parsed.iter().any(|a| a.name == attr.name) {
            return Err(Error::attribute(
                token.as_ref(),
                format!("`{}` is declared twice", attr.name),
            ));
        }
        parsed.push(attr);
    }
    Ok(parsed)
}

/// Pluralise a snake_case word with simple English heuristics.
pub fn pluralize(word: &str) -> String {
    let s = word.to_snake_case();
    if s.ends_with('s') || s.ends_with('x') || s.ends_with("ch") || s.ends_with("sh") {
        format!("{}es", s)
    } else if s.ends_with('y')
        && !s.ends_with("ey")
        && !s.ends_with("ay")
        && !s.ends_with("oy")
        && !s.ends_with("uy")
    {
        format!("{}ies", &s[..s.len() - 1])
    } else {
        format!("{}s", s)
    }
}

/// A possibly namespaced model name such as `Admin::User`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelName {
    pub modules: Vec<String>,
    pub class_name: String,
    file_segments: Vec<String>,
}

impl ModelName {
    /// Accepts `Admin::User`, `admin/user` and `admin_user` style names.
    pub fn parse(input: &str) -> Result<Self> {
        let segments: Vec<&str> = input.trim().split("::").flat_map(|s| s.split('/')).collect();
        if segments.iter().any(|s| !is_identifier(s)) {
            return Err(Error::InvalidModelName(input.to_string()));
        }
        let mut pascal: Vec<String> = segments.iter().map(|s| s.to_pascal_case()).collect();
        let class_name = pascal.pop().unwrap_or_default();
        Ok(ModelName {
            modules: pascal,
            class_name,
            file_segments: segments.iter().map(|s| s.to_snake_case()).collect(),
        })
    }

    /// `Admin::User` -> `admin/user.rb`
    pub fn file_path(&self) -> PathBuf {
        let mut path: PathBuf = self.file_segments.iter().collect();
        path.set_extension("rb");
        path
    }

    /// `Admin::User` -> `admin_users`
    pub fn table_name(&self) -> String {
        pluralize(&self.file_segments.join("_"))
    }

    pub fn migration_name(&self) -> String {
        format!("create_{}", self.table_name())
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub skip_migration: bool,
    pub parent: Option<String>,
    pub timestamps: bool,
    pub force: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            skip_migration: false,
            parent: None,
            timestamps: true,
            force: false,
        }
    }
}

/// A rendered file, relative to the destination root.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

pub struct ModelGenerator {
    adapter: ActiveRecordAdapter,
    settings: GeneratorSettings,
}

impl ModelGenerator {
    pub fn new(adapter: ActiveRecordAdapter, settings: GeneratorSettings) -> Self {
        ModelGenerator { adapter, settings }
    }

    fn render_model(
        &self,
        name: &ModelName,
        attributes: &[AttributeDefinition],
        options: &GenerateOptions,
    ) -> String {
        let mut declared: Vec<TemplateValue> = attributes
            .iter()
            .filter(|a| a.name != PRIMARY_KEY)
            .map(|a| {
                TemplateValue::object([
                    ("name", TemplateValue::from(a.name.as_str())),
                    ("type", TemplateValue::from(a.type_name.as_str())),
                    ("options", TemplateValue::from(a.options_string())),
                ])
            })
            .collect();
        if options.timestamps {
            for column in [CREATED_AT, UPDATED_AT] {
                if !attributes.iter().any(|a| a.name == column) {
                    declared.push(TemplateValue::object([
                        ("name", TemplateValue::from(column)),
                        ("type", TemplateValue::from("datetime")),
                        ("options", TemplateValue::from("")),
                    ]));
                }
            }
        }

        let parent = options
            .parent
            .clone()
            .unwrap_or_else(|| self.settings.parent_class.clone());
        let mut context = Context::new();
        context.insert("class_name".to_string(), TemplateValue::from(name.class_name.as_str()));
        context.insert("parent_class".to_string(), TemplateValue::from(parent));
        context.insert("adapter".to_string(), TemplateValue::from(self.settings.adapter.as_str()));
        context.insert("attributes".to_string(), TemplateValue::List(declared));

        let mut source = template::render_str(MODEL_TEMPLATE, &context);
        for module in name.modules.iter().rev() {
            source = format!("module {}\n{}\nend\n", module, indent(&source, "  ", 1));
        }
        source
    }

    fn render_migration(
        &self,
        name: &ModelName,
        attributes: &[AttributeDefinition],
        options: &GenerateOptions,
    ) -> Result<String> {
        let table_name = name.table_name();
        let columns: AttributeSchema = attributes
            .iter()
            .filter(|a| a.name != PRIMARY_KEY)
            .map(|a| (a.name.clone(), a.column_schema()))
            .collect();
        let indices = IndexSchema::new();
        let mut body = CreateTableMigration::new(&table_name, &columns, &indices);
        if !options.timestamps {
            body = body.without_timestamps();
        }
        migration::render_migration_class(
            &body.render()?,
            &name.migration_name(),
            self.adapter.migration_version(),
        )
    }

    /// Render the model file and, unless skipped, the migration stamped with `now`.
    pub fn render<S: AsRef<str>>(
        &self,
        model_name: &str,
        attributes: &[S],
        options: &GenerateOptions,
        now: DateTime<Utc>,
    ) -> Result<Vec<GeneratedFile>> {
        let name = ModelName::parse(model_name)?;
        let attributes = parse_attributes(attributes)?;

        let mut files = vec![GeneratedFile {
            path: Path::new(&self.settings.models_path).join(name.file_path()),
            content: self.render_model(&name, &attributes, options),
        }];
        if !options.skip_migration {
            let file_name = format!("{}_{}.rb", now.format("%Y%m%d%H%M%S"), name.migration_name());
            files.push(GeneratedFile {
                path: Path::new(&self.settings.migrate_path).join(file_name),
                content: self.render_migration(&name, &attributes, options)?,
            });
        }
        Ok(files)
    }

    /// Existing migrations in `destination` that already create this model's table.
    fn existing_migrations(&self, destination: &Path, name: &ModelName) -> Result<Vec<PathBuf>> {
        let dir = destination.join(&self.settings.migrate_path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let migration_name = name.migration_name();
        let mut found = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))? {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let file_name = entry.file_name();
            let matches = MIGRATION_FILE_RE
                .captures(&file_name.to_string_lossy())
                .is_some_and(|caps| caps[1] == migration_name);
            if matches {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    /// Render everything, then write it under `destination`.
    ///
    /// Nothing is written if any target already exists and `force` is off.
    pub fn generate<S: AsRef<str>>(
        &self,
        destination: &Path,
        model_name: &str,
        attributes: &[S],
        options: &GenerateOptions,
    ) -> Result<Vec<PathBuf>> {
        let files = self.render(model_name, attributes, options, Utc::now())?;
        let name = ModelName::parse(model_name)?;

        let model_path = destination.join(&files[0].path);
        let stale = if options.skip_migration {
            Vec::new()
        } else {
            self.existing_migrations(destination, &name)?
        };
        if !options.force {
            if model_path.exists() {
                return Err(Error::FileExists(model_path));
            }
            if let Some(existing) = stale.first() {
                return Err(Error::FileExists(existing.clone()));
            }
        }
        for path in &stale {
            info!("remove {}", path.display());
            fs::remove_file(path).map_err(|e| Error::io(path, e))?;
        }

        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let dest = destination.join(&file.path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::write(&dest, &file.content).map_err(|e| Error::io(&dest, e))?;
            info!("create {}", file.path.display());
            written.push(dest);
        }
        Ok(written)
    }
}
