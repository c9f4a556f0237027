//! Model Extensions - pagination results, model definitions and table
//! naming

use serde::Serialize;

use super::core_trait::Model;

/// Table name for a type name: snake_case, then pluralized
///
/// `User` -> `users`, `OrderItem` -> `order_items`, `Category` ->
/// `categories`, `Address` -> `addresses`.
pub fn derive_table_name(type_name: &str) -> String {
    pluralize(&to_snake_case(type_name))
}

pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn pluralize(word: &str) -> String {
    let ends_with_consonant_y = word.ends_with('y')
        && !word.ends_with("ay")
        && !word.ends_with("ey")
        && !word.ends_with("oy")
        && !word.ends_with("uy");
    if ends_with_consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// Resolved table metadata for a model type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDefinition {
    pub model_name: &'static str,
    pub table: String,
    pub primary_key: &'static str,
    pub fields: &'static [&'static str],
    pub soft_deletes: bool,
}

impl ModelDefinition {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(&name)
    }
}

/// Bind `M` to its table name and primary key
pub fn define<M: Model>() -> ModelDefinition {
    ModelDefinition {
        model_name: M::model_name(),
        table: M::table_name(),
        primary_key: M::PRIMARY_KEY,
        fields: M::FIELDS,
        soft_deletes: M::SOFT_DELETES,
    }
}

/// One page of records plus the totals needed to render pagination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<M> {
    pub items: Vec<M>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<M> Page<M> {
    pub fn last_page(&self) -> u64 {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(self.per_page.max(1))
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.page < self.last_page()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<M> IntoIterator for Page<M> {
    type Item = M;
    type IntoIter = std::vec::IntoIter<M>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
