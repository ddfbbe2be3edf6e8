use std::fmt;
use std::str::FromStr;

use crate::bail;
use crate::error::{CdcError, ErrorKind};

/// Identifier of a single table/collection captured by the connector.
///
/// Identifiers round-trip through their dotted string form, which is how they are
/// persisted inside connector offsets: parsing the rendered form always yields an
/// equal identifier. Supported forms are `name`, `schema.name` and
/// `catalog.schema.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId {
    catalog: Option<String>,
    schema: Option<String>,
    name: String,
}

impl CollectionId {
    /// Creates an identifier with only a name component.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            name: name.into(),
        }
    }

    /// Creates an identifier with schema and name components.
    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Creates a fully qualified identifier.
    pub fn with_catalog(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            catalog: Some(catalog.into()),
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Returns the catalog component, if present.
    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    /// Returns the schema component, if present.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Returns the name component.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog) = &self.catalog {
            write!(f, "{catalog}.")?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        write!(f, "{}", self.name)
    }
}

impl FromStr for CollectionId {
    type Err = CdcError;

    /// Parses a dotted identifier with one to three non-empty components.
    ///
    /// Commas, which would collide with the persisted queue separator, are rejected
    /// along with empty components.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.contains(',') {
            bail!(
                ErrorKind::InvalidCollectionId,
                "Collection identifier contains a comma",
                format!("identifier '{value}' cannot be persisted unambiguously")
            );
        }

        let parts: Vec<&str> = value.split('.').collect();
        if parts.iter().any(|part| part.is_empty()) {
            bail!(
                ErrorKind::InvalidCollectionId,
                "Collection identifier has an empty component",
                format!("identifier '{value}'")
            );
        }

        match parts.as_slice() {
            [name] => Ok(Self::new(*name)),
            [schema, name] => Ok(Self::with_schema(*schema, *name)),
            [catalog, schema, name] => Ok(Self::with_catalog(*catalog, *schema, *name)),
            _ => {
                bail!(
                    ErrorKind::InvalidCollectionId,
                    "Collection identifier has too many components",
                    format!("identifier '{value}' has {} dotted parts", parts.len())
                )
            }
        }
    }
}
