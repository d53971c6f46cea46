//! Annotated queries.
//!
//! A [`Query`] lists the fields to read and the joins (sub-selections) to follow. Each query
//! may carry a [`QueryMeta`] annotation naming the component it belongs to and the
//! [`IdentRule`] used to identify entities reached through a join into it. The annotation is
//! part of the query value itself: embedding a child query into a parent join moves the
//! annotation along with it, to any nesting depth, and serialization keeps it.
//!
//! A query with `meta: None` is *unannotated*. Normalization never guesses an ident for
//! data under an unannotated join; it leaves that subtree embedded and reports it.
//!
//! # Module Organization
//!
//! - [`component`]: [`Component`] descriptors, the usual way to build annotated queries

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use crate::{
    ident::{Ident, IdentRule},
    value::{Keyword, Props},
    NormgraphError,
};

pub mod component;

pub use component::Component;

/// Out-of-band normalization metadata attached to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMeta {
    pub component: String,
    /// `None` for components whose data stays inline in the parent (no table of its own).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ident: Option<IdentRule>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    pub elements: Vec<QueryElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<QueryMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryElement {
    Prop(Keyword),
    Join(Join),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub key: Keyword,
    pub target: JoinTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinTarget {
    Query(Query),
    Union(UnionQuery),
    /// Re-enter the query that contains this join.
    Recursive(RecursionLimit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecursionLimit {
    /// Follow until an ident repeats on the current path (or the safety cutoff).
    Unbounded,
    /// Follow the recursive join at most this many times.
    Depth(usize),
}

/// A polymorphic join: the branch is picked per entity from the data itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnionQuery {
    pub branches: BTreeMap<Keyword, Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<QueryMeta>,
}

impl Query {
    /// An unannotated query.
    pub fn new(elements: Vec<QueryElement>) -> Self {
        Query {
            elements,
            meta: None,
        }
    }

    pub fn annotate(mut self, component: impl Into<String>, ident: Option<IdentRule>) -> Self {
        self.meta = Some(QueryMeta {
            component: component.into(),
            ident,
        });
        self
    }

    pub fn with_element(mut self, element: QueryElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn is_annotated(&self) -> bool {
        self.meta.is_some()
    }

    pub fn component(&self) -> Option<&str> {
        self.meta.as_ref().map(|m| m.component.as_str())
    }

    pub fn ident_rule(&self) -> Option<&IdentRule> {
        self.meta.as_ref().and_then(|m| m.ident.as_ref())
    }

    /// Every key the query reads, props and joins alike, in query order.
    pub fn keys(&self) -> impl Iterator<Item = &Keyword> {
        self.elements.iter().map(QueryElement::key)
    }

    pub fn props(&self) -> impl Iterator<Item = &Keyword> {
        self.elements.iter().filter_map(|el| match el {
            QueryElement::Prop(k) => Some(k),
            QueryElement::Join(_) => None,
        })
    }

    pub fn joins(&self) -> impl Iterator<Item = &Join> {
        self.elements.iter().filter_map(|el| match el {
            QueryElement::Join(join) => Some(join),
            QueryElement::Prop(_) => None,
        })
    }

    pub fn join_keys(&self) -> impl Iterator<Item = &Keyword> {
        self.joins().map(|j| &j.key)
    }

    pub fn join(&self, key: &Keyword) -> Option<&Join> {
        self.joins().find(|j| &j.key == key)
    }

    /// The child query of a plain join. Unions and recursive joins return `None`.
    pub fn subquery(&self, key: &Keyword) -> Option<&Query> {
        match self.join(key).map(|j| &j.target) {
            Some(JoinTarget::Query(q)) => Some(q),
            _ => None,
        }
    }

    /// Drop `keys` everywhere in the query tree. Annotations on every remaining level are
    /// kept.
    pub fn without(&self, keys: &[Keyword]) -> Query {
        Query {
            elements: self
                .elements
                .iter()
                .filter(|el| !keys.contains(el.key()))
                .map(|el| match el {
                    QueryElement::Prop(k) => QueryElement::Prop(k.clone()),
                    QueryElement::Join(join) => QueryElement::Join(Join {
                        key: join.key.clone(),
                        target: match &join.target {
                            JoinTarget::Query(q) => JoinTarget::Query(q.without(keys)),
                            JoinTarget::Union(u) => JoinTarget::Union(UnionQuery {
                                branches: u
                                    .branches
                                    .iter()
                                    .map(|(tag, q)| (tag.clone(), q.without(keys)))
                                    .collect(),
                                meta: u.meta.clone(),
                            }),
                            JoinTarget::Recursive(limit) => JoinTarget::Recursive(*limit),
                        },
                    }),
                })
                .collect(),
            meta: self.meta.clone(),
        }
    }
}

impl QueryElement {
    pub fn prop(key: Keyword) -> Self {
        QueryElement::Prop(key)
    }

    /// Embed `child` under `key`. The child's annotation travels with it.
    pub fn join(key: Keyword, child: Query) -> Self {
        QueryElement::Join(Join {
            key,
            target: JoinTarget::Query(child),
        })
    }

    pub fn union(key: Keyword, union: UnionQuery) -> Self {
        QueryElement::Join(Join {
            key,
            target: JoinTarget::Union(union),
        })
    }

    pub fn recursive(key: Keyword, limit: RecursionLimit) -> Self {
        QueryElement::Join(Join {
            key,
            target: JoinTarget::Recursive(limit),
        })
    }

    pub fn key(&self) -> &Keyword {
        match self {
            QueryElement::Prop(k) => k,
            QueryElement::Join(join) => &join.key,
        }
    }
}

impl UnionQuery {
    pub fn new(branches: BTreeMap<Keyword, Query>) -> Self {
        UnionQuery {
            branches,
            meta: None,
        }
    }

    pub fn annotate(mut self, component: impl Into<String>, ident: Option<IdentRule>) -> Self {
        self.meta = Some(QueryMeta {
            component: component.into(),
            ident,
        });
        self
    }

    /// Pick the branch describing `data`.
    ///
    /// With an ident rule on the union itself, the resolved ident's table names the branch.
    /// Otherwise the first branch whose key holds a non-null value in `data` wins.
    pub fn select_branch(&self, data: &Props) -> Result<Option<&Query>, NormgraphError> {
        if let Some(rule) = self.meta.as_ref().and_then(|m| m.ident.as_ref()) {
            let ident = rule.resolve(data)?;
            return Ok(self.branches.get(&ident.table));
        }
        Ok(self
            .branches
            .iter()
            .find(|(tag, _)| data.get(*tag).is_some_and(|v| !v.is_null()))
            .map(|(_, q)| q))
    }

    pub fn branch_for_ident(&self, ident: &Ident) -> Option<&Query> {
        self.branches.get(&ident.table)
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (idx, el) in self.elements.iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            match el {
                QueryElement::Prop(k) => write!(f, "{k}")?,
                QueryElement::Join(join) => match &join.target {
                    JoinTarget::Query(q) => write!(f, "{{{} {q}}}", join.key)?,
                    JoinTarget::Union(u) => {
                        write!(f, "{{{} {{", join.key)?;
                        for (bidx, (tag, q)) in u.branches.iter().enumerate() {
                            if bidx > 0 {
                                write!(f, " ")?;
                            }
                            write!(f, "{tag} {q}")?;
                        }
                        write!(f, "}}}}")?;
                    }
                    JoinTarget::Recursive(RecursionLimit::Unbounded) => {
                        write!(f, "{{{} ...}}", join.key)?
                    }
                    JoinTarget::Recursive(RecursionLimit::Depth(n)) => {
                        write!(f, "{{{} {n}}}", join.key)?
                    }
                },
            }
        }
        write!(f, "]")
    }
}
