use chrono::{TimeZone, Utc};
use codefirst::generator::*;
use codefirst::migration::MigrationVersion;
use codefirst::settings::GeneratorSettings;
use codefirst::{ActiveRecordAdapter, Error};
use serde_json::json;
use std::fs;
use std::path::Path;

fn generator() -> ModelGenerator {
    ModelGenerator::new(
        ActiveRecordAdapter::new(MigrationVersion::new("7.1")),
        GeneratorSettings::default(),
    )
}

fn render(model: &str, attributes: &[&str], options: &GenerateOptions) -> Vec<GeneratedFile> {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap();
    generator().render(model, attributes, options, now).unwrap()
}

fn migration_files(root: &Path, table: &str) -> Vec<String> {
    let dir = root.join("db/migrate");
    if !dir.exists() {
        return Vec::new();
    }
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(&format!("_create_{}.rb", table)))
        .collect()
}

// ========== attribute parsing ==========

#[test]
fn test_parse_indexed_attribute() {
    let attr = parse_attribute("email:string:index").unwrap();
    assert_eq!(attr.name, "email");
    assert_eq!(attr.type_name, "string");
    assert!(attr.indexed);
    assert!(!attr.unique);
}

#[test]
fn test_parse_references() {
    let attr = parse_attribute("author:references").unwrap();
    assert_eq!(attr.name, "author_id");
    assert_eq!(attr.type_name, "integer");
    assert!(!attr.indexed);

    let attr = parse_attribute("post_id:belongs_to:index").unwrap();
    assert_eq!(attr.name, "post_id");
    assert_eq!(attr.type_name, "integer");
    assert!(attr.indexed);
}

#[test]
fn test_parse_defaults_to_string() {
    let attr = parse_attribute("name").unwrap();
    assert_eq!(attr.name, "name");
    assert_eq!(attr.type_name, "string");
    assert!(attr.default.is_none());

    assert_eq!(parse_attribute("title:").unwrap().type_name, "string");
}

#[test]
fn test_parse_index_name_suffix() {
    let attr = parse_attribute("email_index").unwrap();
    assert_eq!(attr.name, "email");
    assert!(attr.indexed);
}

#[test]
fn test_parse_unique_segment() {
    let attr = parse_attribute("slug:string:uniq").unwrap();
    assert!(attr.indexed);
    assert!(attr.unique);
}

#[test]
fn test_type_normalization() {
    let cases = [
        ("text", "string"),
        ("int", "integer"),
        ("bool", "boolean"),
        ("timestamp", "datetime"),
        ("time", "datetime"),
        ("numeric", "decimal"),
        ("double", "float"),
        ("blob", "binary"),
        ("jsonb", "json"),
        ("DATE", "date"),
        ("uuid", "uuid"),
    ];
    for (raw, expected) in cases {
        assert_eq!(normalize_type(raw), expected, "normalizing {}", raw);
    }
}

#[test]
fn test_boolean_implicit_default() {
    let attr = parse_attribute("active:bool").unwrap();
    assert_eq!(attr.type_name, "boolean");
    assert_eq!(attr.default, Some(json!(false)));

    let attr = attr.with_default(Some(json!(true)));
    assert_eq!(attr.options_string(), ", default: true");
}

#[test]
fn test_parse_rejects_missing_name() {
    for token in ["", ":string", ":string:index", "1abc:string", "a:b:c"] {
        let err = parse_attribute(token).unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { .. }), "token {:?}", token);
    }
}

#[test]
fn test_parse_attributes_rejects_duplicates() {
    assert!(parse_attributes(&["email", "email:text"]).is_err());
    assert_eq!(parse_attributes(&["a", "b:integer"]).unwrap().len(), 2);
}

// ========== naming ==========

#[test]
fn test_model_name_plain_and_namespaced() {
    let user = ModelName::parse("User").unwrap();
    assert_eq!(user.class_name, "User");
    assert!(user.modules.is_empty());
    assert_eq!(user.table_name(), "users");
    assert_eq!(user.file_path(), Path::new("user.rb"));

    let admin = ModelName::parse("Admin::User").unwrap();
    assert_eq!(admin.modules, vec!["Admin"]);
    assert_eq!(admin.class_name, "User");
    assert_eq!(admin.table_name(), "admin_users");
    assert_eq!(admin.file_path(), Path::new("admin/user.rb"));
    assert_eq!(ModelName::parse("admin/user").unwrap(), admin);

    let post = ModelName::parse("BlogPost").unwrap();
    assert_eq!(post.migration_name(), "create_blog_posts");

    assert!(ModelName::parse("").is_err());
    assert!(ModelName::parse("Admin::").is_err());
}

#[test]
fn test_pluralize() {
    assert_eq!(pluralize("user"), "users");
    assert_eq!(pluralize("category"), "categories");
    assert_eq!(pluralize("day"), "days");
    assert_eq!(pluralize("box"), "boxes");
    assert_eq!(pluralize("address"), "addresses");
}

// ========== rendering ==========

#[test]
fn test_model_file_content() {
    let files = render(
        "User",
        &["email:string:index", "age:integer", "active:boolean"],
        &GenerateOptions::default(),
    );
    let model = &files[0];

    assert_eq!(model.path, Path::new("app/models/user.rb"));
    assert_eq!(
        model.content,
        "class User < ApplicationRecord\n  include ActiveCodeFirst::Model\n  adapter :active_record\n\n  attribute :email, :string, index: true\n  attribute :age, :integer\n  attribute :active, :boolean, default: false\n  attribute :created_at, :datetime\n  attribute :updated_at, :datetime\n\n  # Add validations here\n  # validates :attribute_name, presence: true\n\n  # Add associations here\n  # belongs_to :parent\n  # has_many :children\nend\n"
    );
}

#[test]
fn test_model_text_type_is_normalized() {
    let files = render("User", &["bio:text", "name"], &GenerateOptions::default());
    assert!(files[0].content.contains("attribute :bio, :string"));
    assert!(files[0].content.contains("attribute :name, :string"));
}

#[test]
fn test_model_without_timestamps_or_attributes() {
    let options = GenerateOptions {
        timestamps: false,
        parent: Some("Base".to_string()),
        ..Default::default()
    };
    let files = render("Tag", &[], &options);
    let model = &files[0].content;
    assert!(model.starts_with("class Tag < Base\n"));
    assert!(model.contains("adapter :active_record\n\n  # Add validations here"));
    assert!(!model.contains("created_at"));

    let migration = &files[1].content;
    assert!(!migration.contains("t.timestamps"));
}

#[test]
fn test_namespaced_model_is_wrapped_in_module() {
    let files = render("Admin::User", &["email:string"], &GenerateOptions::default());
    let model = &files[0];
    assert_eq!(model.path, Path::new("app/models/admin/user.rb"));
    assert!(model.content.starts_with("module Admin\n  class User < ApplicationRecord\n"));
    assert!(model.content.contains("\n    attribute :email, :string\n"));
    assert!(model.content.ends_with("  end\nend\n"));
}

#[test]
fn test_migration_file_content() {
    let files = render(
        "User",
        &["email:string:index", "age:integer", "slug:string:uniq"],
        &GenerateOptions::default(),
    );
    let migration = &files[1];

    assert_eq!(migration.path, Path::new("db/migrate/20240501123045_create_users.rb"));
    assert_eq!(
        migration.content,
        "class CreateUsers < ActiveRecord::Migration[7.1]\n  def change\n    create_table :users do |t|\n      t.string :email\n      t.integer :age\n      t.string :slug\n\n      t.timestamps\n    end\n\n    add_index :users, :email\n\n    add_index :users, :slug, unique: true\n  end\nend\n"
    );
}

#[test]
fn test_migration_boolean_default_and_references() {
    let files = render(
        "Post",
        &["published:boolean", "author:references:index"],
        &GenerateOptions::default(),
    );
    let migration = &files[1].content;
    assert!(migration.contains("t.boolean :published, default: false"));
    assert!(migration.contains("t.integer :author_id"));
    assert!(migration.contains("add_index :posts, :author_id"));
}

#[test]
fn test_skip_migration_renders_only_model() {
    let options = GenerateOptions {
        skip_migration: true,
        ..Default::default()
    };
    assert_eq!(render("User", &["email"], &options).len(), 1);
}

#[test]
fn test_invalid_attribute_renders_nothing() {
    let now = Utc::now();
    let result = generator().render(
        "User",
        &["email", ":string"],
        &GenerateOptions::default(),
        now,
    );
    assert!(matches!(result, Err(Error::InvalidAttribute { .. })));
}

// ========== writing ==========

#[test]
fn test_generate_writes_model_and_migration() {
    let tmp = tempfile::tempdir().unwrap();
    let written = generator()
        .generate(tmp.path(), "User", &["email:string", "name:string"], &GenerateOptions::default())
        .unwrap();

    assert_eq!(written.len(), 2);
    assert!(tmp.path().join("app/models/user.rb").exists());
    let migrations = migration_files(tmp.path(), "users");
    assert_eq!(migrations.len(), 1);

    let content = fs::read_to_string(tmp.path().join("db/migrate").join(&migrations[0])).unwrap();
    assert!(content.contains("create_table :users"));
    assert!(content.contains("t.string :email"));
    assert!(content.contains("t.timestamps"));
}

#[test]
fn test_generate_skip_migration() {
    let tmp = tempfile::tempdir().unwrap();
    let options = GenerateOptions {
        skip_migration: true,
        ..Default::default()
    };
    generator().generate(tmp.path(), "User", &["email"], &options).unwrap();
    assert!(tmp.path().join("app/models/user.rb").exists());
    assert!(migration_files(tmp.path(), "users").is_empty());
}

#[test]
fn test_generate_refuses_to_overwrite_without_force() {
    let tmp = tempfile::tempdir().unwrap();
    let r#gen = generator();
    r#gen.generate(tmp.path(), "User", &["email"], &GenerateOptions::default()).unwrap();

    let err = r#gen
        .generate(tmp.path(), "User", &["name"], &GenerateOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::FileExists(_)));
    let model = fs::read_to_string(tmp.path().join("app/models/user.rb")).unwrap();
    assert!(model.contains("attribute :email"));
}

#[test]
fn test_generate_refuses_duplicate_migration_name() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("db/migrate")).unwrap();
    fs::write(tmp.path().join("db/migrate/20200101000000_create_users.rb"), "old").unwrap();

    let err = generator()
        .generate(tmp.path(), "User", &["email"], &GenerateOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::FileExists(_)));
    assert!(!tmp.path().join("app/models/user.rb").exists());
}

#[test]
fn test_generate_force_replaces_existing_files() {
    let tmp = tempfile::tempdir().unwrap();
    let r#gen = generator();
    r#gen.generate(tmp.path(), "User", &["email"], &GenerateOptions::default()).unwrap();
    fs::rename(
        tmp.path().join("db/migrate").join(&migration_files(tmp.path(), "users")[0]),
        tmp.path().join("db/migrate/20000101000000_create_users.rb"),
    )
    .unwrap();

    let options = GenerateOptions {
        force: true,
        ..Default::default()
    };
    r#gen.generate(tmp.path(), "User", &["name"], &options).unwrap();

    let model = fs::read_to_string(tmp.path().join("app/models/user.rb")).unwrap();
    assert!(model.contains("attribute :name"));
    let migrations = migration_files(tmp.path(), "users");
    assert_eq!(migrations.len(), 1);
    assert!(!migrations[0].starts_with("20000101000000"));
}

#[test]
fn test_generate_force_keeps_unrelated_migrations() {
    let tmp = tempfile::tempdir().unwrap();
    let migrate = tmp.path().join("db/migrate");
    fs::create_dir_all(&migrate).unwrap();
    fs::write(migrate.join("2024_backfill_create_users.rb"), "backfill").unwrap();
    fs::write(migrate.join("20240101000000_create_admin_users.rb"), "admin").unwrap();
    fs::write(migrate.join("20200101000000_create_users.rb"), "old").unwrap();

    let options = GenerateOptions {
        force: true,
        ..Default::default()
    };
    generator()
        .generate(tmp.path(), "User", &["email"], &options)
        .unwrap();

    assert_eq!(
        fs::read_to_string(migrate.join("2024_backfill_create_users.rb")).unwrap(),
        "backfill"
    );
    assert!(migrate.join("20240101000000_create_admin_users.rb").exists());
    assert!(!migrate.join("20200101000000_create_users.rb").exists());
}

#[test]
fn test_unrelated_migration_is_not_a_conflict() {
    let tmp = tempfile::tempdir().unwrap();
    let migrate = tmp.path().join("db/migrate");
    fs::create_dir_all(&migrate).unwrap();
    fs::write(migrate.join("2024_backfill_create_users.rb"), "backfill").unwrap();

    generator()
        .generate(tmp.path(), "User", &["email"], &GenerateOptions::default())
        .unwrap();
    assert!(tmp.path().join("app/models/user.rb").exists());
}

#[test]
fn test_generate_namespaced_paths() {
    let tmp = tempfile::tempdir().unwrap();
    generator()
        .generate(tmp.path(), "Admin::User", &["email:string"], &GenerateOptions::default())
        .unwrap();

    let model = fs::read_to_string(tmp.path().join("app/models/admin/user.rb")).unwrap();
    assert!(model.contains("module Admin"));
    assert!(model.contains("class User"));
    assert_eq!(migration_files(tmp.path(), "admin_users").len(), 1);
}
