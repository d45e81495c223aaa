//! ActiveRecord adapter: type mapping, migration rendering and live DDL
//! composed around an injected migration version.
use crate::error::Result;
use crate::executor::SchemaExecutor;
use crate::migration::{self, MigrationVersion};
use crate::orm::Connection;
use crate::schema::ModelSchema;
use crate::types;

#[derive(Debug, Clone, Default)]
pub struct ActiveRecordAdapter {
    version: MigrationVersion,
}

impl ActiveRecordAdapter {
    /// Name models use to select this adapter (`adapter :active_record`).
    pub const NAME: &'static str = "active_record";

    pub fn new(version: MigrationVersion) -> Self {
        ActiveRecordAdapter { version }
    }

    pub fn migration_version(&self) -> &MigrationVersion {
        &self.version
    }

    pub fn map_type<'a>(&self, token: &'a str) -> &'a str {
        types::map_type(token)
    }

    pub fn generate_create_table_migration(&self, model: &ModelSchema) -> Result<String> {
        migration::generate_create_table_migration(
            &model.table_name,
            &model.attributes,
            &model.indices,
        )
    }

    pub fn generate_migration_class(
        &self,
        model: &ModelSchema,
        migration_name: &str,
    ) -> Result<String> {
        migration::generate_migration_class(
            &model.table_name,
            &model.attributes,
            &model.indices,
            migration_name,
            &self.version,
        )
    }

    /// Default migration name for a model, `create_<table>`.
    pub fn create_migration_name(&self, model: &ModelSchema) -> String {
        format!("create_{}", model.table_name)
    }

    pub fn executor<C: Connection>(&self, conn: C) -> SchemaExecutor<C> {
        SchemaExecutor::new(conn)
    }
}
