//! Record set sources: what a query reads from

use crate::condition::Condition;
use dal_core::Key;
use std::fmt;
use std::sync::Arc;

/// A collection, optionally nested under a parent record
#[derive(Debug, Clone)]
pub struct CollectionRef {
    name: String,
    alias: Option<String>,
    parent: Option<Arc<Key>>,
}

impl CollectionRef {
    /// Top-level collection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            parent: None,
        }
    }

    /// Sub-collection of the record at `parent`
    pub fn with_parent(name: impl Into<String>, parent: Arc<Key>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            parent: Some(parent),
        }
    }

    /// Attach an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias, if any
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Parent record key, if nested
    pub fn parent(&self) -> Option<&Arc<Key>> {
        self.parent.as_ref()
    }

    /// `parent-path/name`, or just `name` at top level
    pub fn path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}/{}", parent.path(), self.name),
            None => self.name.clone(),
        }
    }

    /// Compare name and parent identity, and the alias when `with_alias` is set
    ///
    /// Parents are compared by pointer: two refs under distinct but equal
    /// parent keys are different sources.
    pub fn equal_to(&self, other: &CollectionRef, with_alias: bool) -> bool {
        let same_parent = match (&self.parent, &other.parent) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.name == other.name && same_parent && (!with_alias || self.alias == other.alias)
    }
}

impl PartialEq for CollectionRef {
    fn eq(&self, other: &Self) -> bool {
        self.equal_to(other, true)
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.path())?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// Every collection with a given name, at any nesting level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionGroupRef {
    name: String,
    alias: Option<String>,
}

impl CollectionGroupRef {
    /// Collection group by name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Attach an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias, if any
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

impl fmt::Display for CollectionGroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[*/{}]", self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// Closed set of record set sources
#[derive(Debug, Clone, PartialEq)]
pub enum RecordsetSource {
    /// Single collection
    Collection(CollectionRef),
    /// Collection group
    CollectionGroup(CollectionGroupRef),
}

impl RecordsetSource {
    /// Collection name
    pub fn name(&self) -> &str {
        match self {
            RecordsetSource::Collection(c) => c.name(),
            RecordsetSource::CollectionGroup(g) => g.name(),
        }
    }

    /// Alias, if any
    pub fn alias(&self) -> Option<&str> {
        match self {
            RecordsetSource::Collection(c) => c.alias(),
            RecordsetSource::CollectionGroup(g) => g.alias(),
        }
    }
}

impl fmt::Display for RecordsetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordsetSource::Collection(c) => write!(f, "{}", c),
            RecordsetSource::CollectionGroup(g) => write!(f, "{}", g),
        }
    }
}

impl From<CollectionRef> for RecordsetSource {
    fn from(c: CollectionRef) -> Self {
        RecordsetSource::Collection(c)
    }
}

impl From<CollectionGroupRef> for RecordsetSource {
    fn from(g: CollectionGroupRef) -> Self {
        RecordsetSource::CollectionGroup(g)
    }
}

impl From<&str> for RecordsetSource {
    fn from(name: &str) -> Self {
        RecordsetSource::Collection(CollectionRef::new(name))
    }
}

/// A source joined to the primary one on a set of conditions
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedSource {
    source: RecordsetSource,
    on: Vec<Condition>,
}

impl JoinedSource {
    /// Join `source` on all of `on`
    pub fn new(source: impl Into<RecordsetSource>, on: Vec<Condition>) -> Self {
        Self {
            source: source.into(),
            on,
        }
    }

    /// Joined source
    pub fn source(&self) -> &RecordsetSource {
        &self.source
    }

    /// Join conditions
    pub fn on(&self) -> &[Condition] {
        &self.on
    }
}

impl fmt::Display for JoinedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JOIN {}", self.source)?;
        for (i, c) in self.on.iter().enumerate() {
            f.write_str(if i == 0 { " ON " } else { " AND " })?;
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// FROM clause: a primary source plus joins
#[derive(Debug, Clone, PartialEq)]
pub struct FromSource {
    source: RecordsetSource,
    joins: Vec<JoinedSource>,
}

impl FromSource {
    /// Primary source without joins
    pub fn new(source: impl Into<RecordsetSource>) -> Self {
        Self {
            source: source.into(),
            joins: Vec::new(),
        }
    }

    /// Append a join
    pub fn join(mut self, joined: JoinedSource) -> Self {
        self.joins.push(joined);
        self
    }

    /// Primary source
    pub fn source(&self) -> &RecordsetSource {
        &self.source
    }

    /// Joins in the order they were added
    pub fn joins(&self) -> &[JoinedSource] {
        &self.joins
    }
}

/// Start a FROM clause
pub fn from(source: impl Into<RecordsetSource>) -> FromSource {
    FromSource::new(source)
}
