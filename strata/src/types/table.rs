use std::fmt;

use crate::error::{ErrorKind, StrataResult};
use crate::strata_error;

/// Qualified name of a table, `<schema>.<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    /// Creates a table name from its parts.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parses a qualified `schema.name` string.
    pub fn parse(qualified: &str) -> StrataResult<Self> {
        match qualified.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
                Ok(Self::new(schema, name))
            }
            _ => Err(strata_error!(
                ErrorKind::ConfigError,
                "Table names must be qualified as `schema.name`",
                qualified
            )),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qualified_names() {
        let table = TableName::parse("bronze.stock_item").unwrap();
        assert_eq!(table.schema, "bronze");
        assert_eq!(table.name, "stock_item");
        assert_eq!(table.to_string(), "bronze.stock_item");
    }

    #[test]
    fn rejects_unqualified_names() {
        assert!(TableName::parse("stock_item").is_err());
        assert!(TableName::parse(".stock_item").is_err());
        assert!(TableName::parse("bronze.").is_err());
    }
}
