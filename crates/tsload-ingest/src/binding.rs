//! Destination binding derived from source file names
//!
//! Source files follow `<database>.<table>.<extension>`. The database segment
//! can be replaced run-wide by an explicit name; the table always comes from
//! the second segment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The `(database, table)` pair every unit of one file is written to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationBinding {
    pub database: String,
    pub table: String,
}

impl DestinationBinding {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Derive the binding from a file name, or `None` if it does not follow
    /// the naming convention.
    ///
    /// ```
    /// use tsload_ingest::binding::DestinationBinding;
    /// use std::path::Path;
    ///
    /// let b = DestinationBinding::from_path(Path::new("data/db1.users.json"), None).unwrap();
    /// assert_eq!((b.database.as_str(), b.table.as_str()), ("db1", "users"));
    ///
    /// let b = DestinationBinding::from_path(Path::new("db1.users.json"), Some("prod")).unwrap();
    /// assert_eq!(b.database, "prod");
    /// ```
    pub fn from_path(path: &Path, database_override: Option<&str>) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let mut segments = file_name.split('.');
        let database = segments.next()?;
        let table = segments.next()?;
        // The extension segment is mandatory.
        segments.next()?;

        if database.is_empty() || table.is_empty() {
            return None;
        }

        let database = database_override
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(database);

        Some(Self::new(database, table))
    }
}

impl fmt::Display for DestinationBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_from_convention() {
        let b = DestinationBinding::from_path(Path::new("/tmp/data/new_company.rand_data.json"), None)
            .unwrap();
        assert_eq!(b, DestinationBinding::new("new_company", "rand_data"));
        assert_eq!(b.to_string(), "new_company.rand_data");
    }

    #[test]
    fn test_binding_ignores_dots_in_directories() {
        let b = DestinationBinding::from_path(Path::new("/srv/v1.2/db1.orders.json"), None).unwrap();
        assert_eq!(b, DestinationBinding::new("db1", "orders"));
    }

    #[test]
    fn test_binding_with_override() {
        let b = DestinationBinding::from_path(Path::new("db1.orders.0.json"), Some("analytics"))
            .unwrap();
        assert_eq!(b, DestinationBinding::new("analytics", "orders"));
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let b = DestinationBinding::from_path(Path::new("db1.orders.json"), Some("  ")).unwrap();
        assert_eq!(b.database, "db1");
    }

    #[test]
    fn test_names_outside_convention() {
        assert!(DestinationBinding::from_path(Path::new("orders.json"), None).is_none());
        assert!(DestinationBinding::from_path(Path::new("README"), None).is_none());
        assert!(DestinationBinding::from_path(Path::new(".orders.json"), None).is_none());
        assert!(DestinationBinding::from_path(Path::new("db1..json"), None).is_none());
    }
}
