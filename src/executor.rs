//! Live schema execution: the DDL counterpart of [`crate::migration`].
use log::info;

use crate::error::Result;
use crate::orm::{Connection, TableDefinition};
use crate::schema::{
    self, AttributeSchema, IndexDefinition, IndexOptions, IndexSchema, ModelSchema, PRIMARY_KEY,
};
use crate::types::map_type;

/// Runs create/drop/index statements against a [`Connection`].
pub struct SchemaExecutor<C> {
    conn: C,
}

impl<C: Connection> SchemaExecutor<C> {
    pub fn new(conn: C) -> Self {
        SchemaExecutor { conn }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Table definition equivalent to the rendered `create_table` block.
    pub fn table_definition(table_name: &str, attributes: &AttributeSchema) -> TableDefinition {
        let mut table = TableDefinition::new(table_name);
        for (name, column) in attributes.iter() {
            if name == PRIMARY_KEY {
                continue;
            }
            table.column(name, map_type(&column.type_name), column.column_options());
        }
        if schema::needs_timestamps(attributes) {
            table.timestamps();
        }
        table
    }

    pub async fn create_table(&self, table_name: &str, attributes: &AttributeSchema) -> Result<()> {
        schema::validate(table_name, attributes, &Default::default())?;
        let table = Self::table_definition(table_name, attributes);
        self.conn.create_table(&table).await?;
        info!(
            "Created table `{}` with {} columns.",
            table_name,
            table.columns.len()
        );
        Ok(())
    }

    pub async fn add_index<I, S>(
        &self,
        table_name: &str,
        columns: I,
        options: IndexOptions,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = IndexDefinition {
            columns: columns.into_iter().map(Into::into).collect(),
            unique: options.unique,
            name: options.name.clone(),
        };
        let columns = &index.columns;
        schema::validate(
            table_name,
            &AttributeSchema::new(),
            &IndexSchema::new().with("add_index", index.clone()),
        )?;
        self.conn.add_index(table_name, columns, &options).await?;
        info!("Added index on `{}` ({}).", table_name, columns.join(", "));
        Ok(())
    }

    pub async fn drop_table(&self, table_name: &str) -> Result<()> {
        self.conn.drop_table(table_name).await?;
        info!("Dropped table `{}`.", table_name);
        Ok(())
    }

    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        Ok(self.conn.table_exists(table_name).await?)
    }

    /// Create the model's table and every index its migration would declare.
    pub async fn create_model_table(&self, model: &ModelSchema) -> Result<()> {
        schema::validate(&model.table_name, &model.attributes, &model.indices)?;
        self.create_table(&model.table_name, &model.attributes).await?;
        for (_, index) in model.indices.iter() {
            self.add_index(&model.table_name, index.columns.iter().cloned(), index.options())
                .await?;
        }
        for (name, column) in schema::implicit_indices(&model.attributes, &model.indices) {
            let options = IndexOptions {
                unique: column.unique,
                name: None,
            };
            self.add_index(&model.table_name, [name], options).await?;
        }
        Ok(())
    }
}
