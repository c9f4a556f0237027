//! Conditional builder composition

use super::AdvancedQueryBuilder;

impl AdvancedQueryBuilder {
    /// Apply `callback` only when `condition` holds
    ///
    /// ```
    /// use strata_orm::query::AdvancedQueryBuilder;
    ///
    /// let search: Option<&str> = None;
    /// let sql = AdvancedQueryBuilder::table("users")
    ///     .when(search.is_some(), |q| q.where_like("name", search.unwrap_or_default()))
    ///     .build_select();
    /// assert_eq!(sql, "SELECT * FROM users");
    /// ```
    pub fn when<F>(self, condition: bool, callback: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            callback(self)
        } else {
            self
        }
    }

    /// Apply `callback` only when `condition` does not hold
    pub fn unless<F>(self, condition: bool, callback: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.when(!condition, callback)
    }

    /// Apply `callback` when `condition` holds, `otherwise` when it does not
    pub fn when_else<F, G>(self, condition: bool, callback: F, otherwise: G) -> Self
    where
        F: FnOnce(Self) -> Self,
        G: FnOnce(Self) -> Self,
    {
        if condition {
            callback(self)
        } else {
            otherwise(self)
        }
    }

    /// Apply `callback` with the contents of `value` when it is `Some`
    pub fn when_some<T, F>(self, value: Option<T>, callback: F) -> Self
    where
        F: FnOnce(Self, T) -> Self,
    {
        match value {
            Some(v) => callback(self, v),
            None => self,
        }
    }
}
