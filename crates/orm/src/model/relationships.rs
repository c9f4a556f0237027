//! Relationships - keyed queries between models
//!
//! A relationship is a [`ModelQuery`] on the related model filtered by a
//! foreign key, plus a slot for the records once loaded:
//!
//! - [`HasMany`]: `related.foreign_key = parent.primary_key`, many rows
//! - [`HasOne`]: the same filter, first row only
//! - [`BelongsTo`]: `parent.primary_key = child.foreign_key`, one row
//!
//! An unset key (see [`Value::is_unset_key`]) yields a query that matches
//! nothing rather than one that matches everything.

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::database::Database;
use crate::error::OrmResult;
use crate::value::Value;

use super::core_trait::Model;
use super::query_methods::ModelQuery;

/// Relationship metadata
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipMeta {
    /// Column on the child side holding the parent's key
    pub foreign_key: String,
    /// Column on the parent side the foreign key points at
    pub local_key: String,
    pub related_table: String,
}

/// Common surface of every relationship kind
pub trait Relationship<Related: Model> {
    fn meta(&self) -> &RelationshipMeta;

    fn is_loaded(&self) -> bool;

    /// The query that loads the related records
    fn query(&self) -> ModelQuery<Related>;

    /// Run [`Relationship::query`] and keep the result
    fn load(&mut self, db: &mut Database) -> OrmResult<()>;
}

fn column_value<M: Model>(record: &M, column: &str) -> Value {
    record
        .to_values()
        .into_iter()
        .find(|(name, _)| *name == column)
        .map(|(_, value)| value)
        .unwrap_or(Value::Null)
}

fn keyed_query<M: Model>(column: &str, key: &Value) -> ModelQuery<M> {
    if key.is_unset_key() {
        ModelQuery::new().where_in(column, Vec::<Value>::new())
    } else {
        ModelQuery::new().where_eq(column, key.clone())
    }
}

/// Parent has many related records
#[derive(Debug, Clone)]
pub struct HasMany<Parent: Model, Related: Model> {
    key: Value,
    meta: RelationshipMeta,
    related: Vec<Related>,
    loaded: bool,
    _parent: PhantomData<fn() -> Parent>,
}

impl<Parent: Model, Related: Model> HasMany<Parent, Related> {
    pub fn new(parent: &Parent, foreign_key: &str) -> Self {
        Self::with_key(parent.primary_key_value(), foreign_key)
    }

    fn with_key(key: Value, foreign_key: &str) -> Self {
        Self {
            key,
            meta: RelationshipMeta {
                foreign_key: foreign_key.to_string(),
                local_key: Parent::PRIMARY_KEY.to_string(),
                related_table: Related::table_name(),
            },
            related: Vec::new(),
            loaded: false,
            _parent: PhantomData,
        }
    }

    /// Load the relation for every parent with one `IN` query
    ///
    /// The result is in the order of `parents`. Parents with an unset key
    /// get an empty, loaded relation, as do repeats of an earlier parent's
    /// key.
    pub fn eager(db: &mut Database, parents: &[Parent], foreign_key: &str) -> OrmResult<Vec<Self>> {
        let mut relations: Vec<Self> = parents
            .iter()
            .map(|p| Self::with_key(p.primary_key_value(), foreign_key))
            .collect();

        let keys: Vec<Value> = relations
            .iter()
            .map(|r| r.key.clone())
            .filter(|k| !k.is_unset_key())
            .collect();
        let related = if keys.is_empty() {
            Vec::new()
        } else {
            ModelQuery::<Related>::new().where_in(foreign_key, keys).get(db)?
        };

        let mut grouped: HashMap<String, Vec<Related>> = HashMap::new();
        for record in related {
            if let Some(key) = column_value(&record, foreign_key).to_text() {
                grouped.entry(key).or_default().push(record);
            }
        }
        for relation in &mut relations {
            let key = relation.key.to_text().filter(|_| !relation.key.is_unset_key());
            if let Some(records) = key.and_then(|k| grouped.remove(&k)) {
                relation.related = records;
            }
            relation.loaded = true;
        }
        Ok(relations)
    }

    pub fn get(&self) -> &[Related] {
        &self.related
    }

    pub fn take(&mut self) -> Vec<Related> {
        std::mem::take(&mut self.related)
    }

    pub fn len(&self) -> usize {
        self.related.len()
    }

    pub fn is_empty(&self) -> bool {
        self.related.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Related> {
        self.related.iter()
    }
}

impl<Parent: Model, Related: Model> Relationship<Related> for HasMany<Parent, Related> {
    fn meta(&self) -> &RelationshipMeta {
        &self.meta
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn query(&self) -> ModelQuery<Related> {
        keyed_query(&self.meta.foreign_key, &self.key)
    }

    fn load(&mut self, db: &mut Database) -> OrmResult<()> {
        self.related = self.query().get(db)?;
        self.loaded = true;
        Ok(())
    }
}

impl<Parent: Model, Related: Model> IntoIterator for HasMany<Parent, Related> {
    type Item = Related;
    type IntoIter = std::vec::IntoIter<Related>;

    fn into_iter(self) -> Self::IntoIter {
        self.related.into_iter()
    }
}

impl<'a, Parent: Model, Related: Model> IntoIterator for &'a HasMany<Parent, Related> {
    type Item = &'a Related;
    type IntoIter = std::slice::Iter<'a, Related>;

    fn into_iter(self) -> Self::IntoIter {
        self.related.iter()
    }
}

/// Parent has at most one related record
#[derive(Debug, Clone)]
pub struct HasOne<Parent: Model, Related: Model> {
    key: Value,
    meta: RelationshipMeta,
    related: Option<Related>,
    loaded: bool,
    _parent: PhantomData<fn() -> Parent>,
}

impl<Parent: Model, Related: Model> HasOne<Parent, Related> {
    pub fn new(parent: &Parent, foreign_key: &str) -> Self {
        Self {
            key: parent.primary_key_value(),
            meta: RelationshipMeta {
                foreign_key: foreign_key.to_string(),
                local_key: Parent::PRIMARY_KEY.to_string(),
                related_table: Related::table_name(),
            },
            related: None,
            loaded: false,
            _parent: PhantomData,
        }
    }

    pub fn get(&self) -> Option<&Related> {
        self.related.as_ref()
    }

    pub fn take(&mut self) -> Option<Related> {
        self.related.take()
    }
}

impl<Parent: Model, Related: Model> Relationship<Related> for HasOne<Parent, Related> {
    fn meta(&self) -> &RelationshipMeta {
        &self.meta
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn query(&self) -> ModelQuery<Related> {
        keyed_query(&self.meta.foreign_key, &self.key)
    }

    fn load(&mut self, db: &mut Database) -> OrmResult<()> {
        self.related = self.query().first(db)?;
        self.loaded = true;
        Ok(())
    }
}

/// Child belongs to one parent through its foreign key
#[derive(Debug, Clone)]
pub struct BelongsTo<Child: Model, Parent: Model> {
    key: Value,
    meta: RelationshipMeta,
    parent: Option<Parent>,
    loaded: bool,
    _child: PhantomData<fn() -> Child>,
}

impl<Child: Model, Parent: Model> BelongsTo<Child, Parent> {
    pub fn new(child: &Child, foreign_key: &str) -> Self {
        Self {
            key: column_value(child, foreign_key),
            meta: RelationshipMeta {
                foreign_key: foreign_key.to_string(),
                local_key: Parent::PRIMARY_KEY.to_string(),
                related_table: Parent::table_name(),
            },
            parent: None,
            loaded: false,
            _child: PhantomData,
        }
    }

    /// The child's foreign key value
    pub fn foreign_key_value(&self) -> &Value {
        &self.key
    }

    pub fn has_foreign_key(&self) -> bool {
        !self.key.is_unset_key()
    }

    pub fn get(&self) -> Option<&Parent> {
        self.parent.as_ref()
    }

    pub fn take(&mut self) -> Option<Parent> {
        self.parent.take()
    }
}

impl<Child: Model, Parent: Model> Relationship<Parent> for BelongsTo<Child, Parent> {
    fn meta(&self) -> &RelationshipMeta {
        &self.meta
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn query(&self) -> ModelQuery<Parent> {
        keyed_query(&self.meta.local_key, &self.key)
    }

    fn load(&mut self, db: &mut Database) -> OrmResult<()> {
        self.parent = if self.has_foreign_key() {
            self.query().first(db)?
        } else {
            None
        };
        self.loaded = true;
        Ok(())
    }
}

/// Relationship constructors available on every model
pub trait HasRelations: Model {
    /// Records of `R` whose `foreign_key` holds this record's primary key
    fn has_many<R: Model>(&self, foreign_key: &str) -> HasMany<Self, R> {
        HasMany::new(self, foreign_key)
    }

    fn has_one<R: Model>(&self, foreign_key: &str) -> HasOne<Self, R> {
        HasOne::new(self, foreign_key)
    }

    /// The `P` whose primary key equals this record's `foreign_key`
    fn belongs_to<P: Model>(&self, foreign_key: &str) -> BelongsTo<Self, P> {
        BelongsTo::new(self, foreign_key)
    }
}

impl<M: Model> HasRelations for M {}
