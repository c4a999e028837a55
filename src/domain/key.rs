//! Natural-key and recency column resolution.

use std::cmp::Ordering;

use super::record::Record;
use super::value::Value;
use crate::error::ConfigError;

/// The values of a row's natural-key columns, in key order.
pub type NaturalKey = Vec<Value>;

/// Natural key and recency columns resolved against a record's column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    columns: Vec<String>,
    indices: Vec<usize>,
    recency: Option<(String, usize)>,
}

impl KeySpec {
    /// Resolve column names for record type `R`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] when the key is empty, names an
    /// unknown column, repeats a column, or the recency column is unknown.
    pub fn resolve<R: Record>(
        natural_key: &[String],
        recency_column: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if natural_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "natural_key",
                reason: "must name at least one column".to_string(),
            });
        }

        let mut indices = Vec::with_capacity(natural_key.len());
        for name in natural_key {
            let index = column_index::<R>(name).ok_or_else(|| ConfigError::InvalidValue {
                field: "natural_key",
                reason: format!("unknown column '{name}'"),
            })?;
            if indices.contains(&index) {
                return Err(ConfigError::InvalidValue {
                    field: "natural_key",
                    reason: format!("column '{name}' listed twice"),
                });
            }
            indices.push(index);
        }

        let recency = match recency_column {
            Some(name) => {
                let index =
                    column_index::<R>(name).ok_or_else(|| ConfigError::InvalidValue {
                        field: "recency_column",
                        reason: format!("unknown column '{name}'"),
                    })?;
                Some((name.to_string(), index))
            }
            None => None,
        };

        Ok(Self {
            columns: natural_key.to_vec(),
            indices,
            recency,
        })
    }

    /// Convenience for `&'static str` key lists.
    ///
    /// # Errors
    /// Same as [`KeySpec::resolve`].
    pub fn from_static<R: Record>(
        natural_key: &[&str],
        recency_column: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let owned: Vec<String> = natural_key.iter().map(ToString::to_string).collect();
        Self::resolve::<R>(&owned, recency_column)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn recency_column(&self) -> Option<&str> {
        self.recency.as_ref().map(|(name, _)| name.as_str())
    }

    /// Whether the key includes the named column.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    #[must_use]
    pub fn key_of(&self, values: &[Value]) -> NaturalKey {
        self.indices.iter().map(|&i| values[i].clone()).collect()
    }

    /// Recency value of a row, `Null` when no recency column is configured.
    #[must_use]
    pub fn recency_of<'a>(&self, values: &'a [Value]) -> &'a Value {
        static NULL: Value = Value::Null;
        match self.recency {
            Some((_, index)) => &values[index],
            None => &NULL,
        }
    }

    /// Compare two natural keys column by column.
    #[must_use]
    pub fn compare_keys(a: &NaturalKey, b: &NaturalKey) -> Ordering {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len()))
    }
}

fn column_index<R: Record>(name: &str) -> Option<usize> {
    R::COLUMNS.iter().position(|c| *c == name)
}
