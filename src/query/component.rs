//! Component descriptors: a name, an optional ident rule, and the query of the props the
//! component reads.
//!
//! ```rust
//! use normgraph::{
//!     ident::IdentRule,
//!     query::{Component, QueryElement},
//!     value::Keyword,
//! };
//!
//! # fn main() -> Result<(), normgraph::NormgraphError> {
//! let person = Component::new("Person")
//!     .with_ident(IdentRule::property(Keyword::new("person/id")?))
//!     .with_query(vec![
//!         QueryElement::prop(Keyword::new("person/id")?),
//!         QueryElement::prop(Keyword::new("person/name")?),
//!     ]);
//! let root = Component::new("Root").with_query(vec![person.join(Keyword::new("people")?)]);
//!
//! let query = root.query();
//! let people = query.subquery(&Keyword::new("people")?).unwrap();
//! assert_eq!(people.component(), Some("Person"));
//! # Ok(())
//! # }
//! ```

use crate::{
    ident::{Ident, IdentRule},
    query::{Query, QueryElement},
    value::{Keyword, Props},
    NormgraphError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    name: String,
    ident: Option<IdentRule>,
    elements: Vec<QueryElement>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Component {
            name: name.into(),
            ident: None,
            elements: Vec::new(),
        }
    }

    pub fn with_ident(mut self, rule: IdentRule) -> Self {
        self.ident = Some(rule);
        self
    }

    pub fn with_query(mut self, elements: Vec<QueryElement>) -> Self {
        self.elements = elements;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ident_rule(&self) -> Option<&IdentRule> {
        self.ident.as_ref()
    }

    /// The component's query, annotated with its name and ident rule.
    pub fn query(&self) -> Query {
        Query::new(self.elements.clone()).annotate(self.name.clone(), self.ident.clone())
    }

    /// A join on `key` into this component, ready to embed in a parent's query.
    pub fn join(&self, key: Keyword) -> QueryElement {
        QueryElement::join(key, self.query())
    }

    pub fn ident_for(&self, props: &Props) -> Result<Ident, NormgraphError> {
        match &self.ident {
            Some(rule) => rule.resolve(props),
            None => Err(NormgraphError::MissingAnnotation(self.name.clone())),
        }
    }
}
