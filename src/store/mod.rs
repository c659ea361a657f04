pub mod sqlite;

use crate::app::Result;

pub use sqlite::SqliteStore;

/// Largest result set a single select may return.
pub const MAX_SELECT_LIMIT: usize = 2500;

/// A named attribute value read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// An attribute to write. With `replace = false` the write only lands when
/// the attribute is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceableAttribute {
    pub name: String,
    pub value: String,
    pub replace: bool,
}

impl ReplaceableAttribute {
    pub fn replacing(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            replace: true,
        }
    }

    pub fn if_absent(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            replace: false,
        }
    }
}

/// Precondition on a single attribute's existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCondition {
    pub name: String,
    pub exists: bool,
}

impl UpdateCondition {
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: false,
        }
    }

    pub fn present(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    IsNull(String),
    IsNotNull(String),
}

/// A select against one domain. Predicates are conjunctive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub domain: String,
    pub item_name: Option<String>,
    pub predicates: Vec<Predicate>,
    /// Attribute to sort ascending by.
    pub order_by: Option<String>,
    pub limit: usize,
}

impl Select {
    pub fn from_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            item_name: None,
            predicates: Vec::new(),
            order_by: None,
            limit: MAX_SELECT_LIMIT,
        }
    }

    pub fn item(mut self, name: impl Into<String>) -> Self {
        self.item_name = Some(name.into());
        self
    }

    pub fn is_null(mut self, attribute: impl Into<String>) -> Self {
        self.predicates.push(Predicate::IsNull(attribute.into()));
        self
    }

    pub fn is_not_null(mut self, attribute: impl Into<String>) -> Self {
        self.predicates.push(Predicate::IsNotNull(attribute.into()));
        self
    }

    pub fn order_by(mut self, attribute: impl Into<String>) -> Self {
        self.order_by = Some(attribute.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// An item (key) with the attributes present on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl Item {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainMetadata {
    pub item_count: u64,
    pub attribute_name_count: u64,
    pub attribute_value_count: u64,
}

/// Key-value store of named string attributes grouped into domains.
///
/// Every put and delete is applied atomically per call. A put with a
/// condition fails with `TrackerError::ConditionalCheckFailed` and writes
/// nothing when the condition does not hold.
pub trait AttributeStore: Send + Sync {
    fn ensure_domain(&self, domain: &str) -> Result<()>;
    fn domain_metadata(&self, domain: &str) -> Result<DomainMetadata>;

    fn put_attributes(
        &self,
        domain: &str,
        item: &str,
        attributes: &[ReplaceableAttribute],
        condition: Option<&UpdateCondition>,
    ) -> Result<()>;
    fn delete_attributes(&self, domain: &str, item: &str, names: &[&str]) -> Result<()>;

    fn select(&self, select: &Select) -> Result<Vec<Item>>;
    fn count(&self, select: &Select) -> Result<u64>;
}

impl<T: AttributeStore + ?Sized> AttributeStore for std::sync::Arc<T> {
    fn ensure_domain(&self, domain: &str) -> Result<()> {
        (**self).ensure_domain(domain)
    }

    fn domain_metadata(&self, domain: &str) -> Result<DomainMetadata> {
        (**self).domain_metadata(domain)
    }

    fn put_attributes(
        &self,
        domain: &str,
        item: &str,
        attributes: &[ReplaceableAttribute],
        condition: Option<&UpdateCondition>,
    ) -> Result<()> {
        (**self).put_attributes(domain, item, attributes, condition)
    }

    fn delete_attributes(&self, domain: &str, item: &str, names: &[&str]) -> Result<()> {
        (**self).delete_attributes(domain, item, names)
    }

    fn select(&self, select: &Select) -> Result<Vec<Item>> {
        (**self).select(select)
    }

    fn count(&self, select: &Select) -> Result<u64> {
        (**self).count(select)
    }
}
