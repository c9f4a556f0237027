//! Query Builder INSERT and UPDATE rendering
//!
//! `INSERT INTO t (cols) VALUES (vals)[, (vals)...]` and
//! `UPDATE t SET col = val[, ...] [WHERE ...]`, where the UPDATE reuses the
//! builder's WHERE conditions.

use super::builder::QueryBuilder;
use super::prepared::PreparedStatement;
use super::sql_generation::{RenderMode, SqlWriter};
use crate::error::{OrmError, OrmResult};
use crate::value::Value;

impl QueryBuilder {
    fn write_insert(
        &self,
        w: &mut SqlWriter,
        columns: &[&str],
        rows: &[Vec<Value>],
    ) -> OrmResult<()> {
        if columns.is_empty() {
            return Err(OrmError::InvalidQuery(format!(
                "INSERT into '{}' needs at least one column",
                self.table
            )));
        }
        if rows.is_empty() {
            return Err(OrmError::InvalidQuery(format!(
                "INSERT into '{}' needs at least one row",
                self.table
            )));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(OrmError::InvalidQuery(format!(
                "INSERT row has {} values for {} columns",
                row.len(),
                columns.len()
            )));
        }

        w.push(&format!("INSERT INTO {} ({}) VALUES ", self.table, columns.join(", ")));
        for (r, row) in rows.iter().enumerate() {
            if r > 0 {
                w.push(", ");
            }
            w.push("(");
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.push_value(value);
            }
            w.push(")");
        }
        Ok(())
    }

    fn write_update<S: AsRef<str>>(&self, w: &mut SqlWriter, values: &[(S, Value)]) -> OrmResult<()> {
        if values.is_empty() {
            return Err(OrmError::InvalidQuery(format!(
                "UPDATE of '{}' needs at least one column",
                self.table
            )));
        }

        w.push(&format!("UPDATE {} SET ", self.table));
        for (i, (column, value)) in values.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push(column.as_ref());
            w.push(" = ");
            w.push_value(value);
        }
        w.push_conditions(" WHERE ", &self.conditions);
        Ok(())
    }

    fn split_pairs<S: AsRef<str>>(values: &[(S, Value)]) -> (Vec<&str>, Vec<Value>) {
        values
            .iter()
            .map(|(column, value)| (column.as_ref(), value.clone()))
            .unzip()
    }

    /// Render a single-row INSERT with every value inlined
    pub fn build_insert<S: AsRef<str>>(&self, values: &[(S, Value)]) -> OrmResult<String> {
        let (columns, row) = Self::split_pairs(values);
        let mut w = SqlWriter::new(RenderMode::Inline);
        self.write_insert(&mut w, &columns, &[row])?;
        Ok(w.finish())
    }

    /// Render a multi-row INSERT; every row must match `columns`
    pub fn build_insert_many(&self, columns: &[&str], rows: &[Vec<Value>]) -> OrmResult<String> {
        let mut w = SqlWriter::new(RenderMode::Inline);
        self.write_insert(&mut w, columns, rows)?;
        Ok(w.finish())
    }

    /// Render an UPDATE restricted by the builder's WHERE conditions
    pub fn build_update<S: AsRef<str>>(&self, values: &[(S, Value)]) -> OrmResult<String> {
        let mut w = SqlWriter::new(RenderMode::Inline);
        self.write_update(&mut w, values)?;
        Ok(w.finish())
    }

    pub fn build_prepared_insert<S: AsRef<str>>(
        &self,
        values: &[(S, Value)],
    ) -> OrmResult<PreparedStatement> {
        let (columns, row) = Self::split_pairs(values);
        let mut w = SqlWriter::new(RenderMode::Prepared);
        self.write_insert(&mut w, &columns, &[row])?;
        Ok(w.into_statement())
    }

    pub fn build_prepared_insert_many(
        &self,
        columns: &[&str],
        rows: &[Vec<Value>],
    ) -> OrmResult<PreparedStatement> {
        let mut w = SqlWriter::new(RenderMode::Prepared);
        self.write_insert(&mut w, columns, rows)?;
        Ok(w.into_statement())
    }

    /// Prepared UPDATE; SET values come before WHERE values in `params`
    pub fn build_prepared_update<S: AsRef<str>>(
        &self,
        values: &[(S, Value)],
    ) -> OrmResult<PreparedStatement> {
        let mut w = SqlWriter::new(RenderMode::Prepared);
        self.write_update(&mut w, values)?;
        Ok(w.into_statement())
    }
}
