use crate::{
    config::NormalizeConfig,
    ident::Ident,
    query::{Join, JoinTarget, Query, QueryElement, RecursionLimit, UnionQuery},
    value::{Props, Value},
};

use super::NormalizedDb;

#[derive(Clone, Copy)]
enum Shape<'q> {
    Query(&'q Query),
    Union(&'q UnionQuery),
}

impl NormalizedDb {
    /// Build the tree `query` describes, starting at the root and following references.
    ///
    /// Only queried fields are returned. A reference to an entity missing from its table is
    /// left out. When a recursive join reaches an ident already on the current path, or the
    /// depth cutoff, the reference itself is returned in place of the entity.
    ///
    /// The cutoff is the default [NormalizeConfig::max_depth]; use
    /// [NormalizedDb::denormalize_with] for a database filled under a different one.
    pub fn denormalize(&self, query: &Query) -> Props {
        self.denormalize_with(query, &NormalizeConfig::default())
    }

    #[tracing::instrument(skip_all)]
    pub fn denormalize_with(&self, query: &Query, config: &NormalizeConfig) -> Props {
        Walk::new(self, config.max_depth).props(query, &self.root, 0, 0)
    }

    /// Build the tree for one entity.
    pub fn denormalize_entity(&self, query: &Query, ident: &Ident) -> Option<Props> {
        self.denormalize_entity_with(query, ident, &NormalizeConfig::default())
    }

    pub fn denormalize_entity_with(
        &self,
        query: &Query,
        ident: &Ident,
        config: &NormalizeConfig,
    ) -> Option<Props> {
        let props = self.entity(ident)?;
        let mut walk = Walk::new(self, config.max_depth);
        walk.path.push(ident.clone());
        Some(walk.props(query, props, 1, 0))
    }
}

struct Walk<'db> {
    db: &'db NormalizedDb,
    max_depth: usize,
    path: Vec<Ident>,
}

impl<'db> Walk<'db> {
    fn new(db: &'db NormalizedDb, max_depth: usize) -> Self {
        Walk {
            db,
            max_depth,
            path: Vec::new(),
        }
    }

    fn props(&mut self, query: &Query, data: &Props, depth: usize, recursion: usize) -> Props {
        let mut out = Props::new();
        for element in query.elements.iter() {
            let key = element.key();
            let Some(value) = data.get(key) else {
                continue;
            };
            let value = match element {
                QueryElement::Prop(_) => Some(value.clone()),
                QueryElement::Join(join) => self.join(join, query, value, depth, recursion),
            };
            if let Some(value) = value {
                out.insert(key.clone(), value);
            }
        }
        out
    }

    fn join(
        &mut self,
        join: &Join,
        parent: &Query,
        value: &Value,
        depth: usize,
        recursion: usize,
    ) -> Option<Value> {
        let (shape, recursion) = match &join.target {
            JoinTarget::Query(q) => (Shape::Query(q), 0),
            JoinTarget::Union(u) => (Shape::Union(u), 0),
            JoinTarget::Recursive(RecursionLimit::Depth(limit)) if recursion >= *limit => {
                return None
            }
            JoinTarget::Recursive(_) => (Shape::Query(parent), recursion + 1),
        };
        match value {
            Value::Ref(ident) => self.follow(shape, ident, depth, recursion),
            Value::Map(data) => Some(self.inline(shape, data, depth, recursion)),
            Value::List(items) => Some(Value::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Ref(ident) => self.follow(shape, ident, depth, recursion),
                        Value::Map(data) => Some(self.inline(shape, data, depth, recursion)),
                        other => Some(other.clone()),
                    })
                    .collect(),
            )),
            other => Some(other.clone()),
        }
    }

    fn follow(
        &mut self,
        shape: Shape<'_>,
        ident: &Ident,
        depth: usize,
        recursion: usize,
    ) -> Option<Value> {
        let db = self.db;
        let props = db.entity(ident)?;
        let query = match shape {
            Shape::Query(q) => q,
            // Branch tags may name a field rather than the ident's table.
            Shape::Union(u) => u
                .branch_for_ident(ident)
                .or_else(|| u.select_branch(props).ok().flatten())?,
        };
        if self.path.contains(ident) || depth >= self.max_depth {
            return Some(Value::Ref(ident.clone()));
        }
        self.path.push(ident.clone());
        let out = self.props(query, props, depth + 1, recursion);
        self.path.pop();
        Some(Value::Map(out))
    }

    /// Plain maps embedded in a field (inline components, passthrough data).
    fn inline(&mut self, shape: Shape<'_>, data: &Props, depth: usize, recursion: usize) -> Value {
        let query = match shape {
            Shape::Query(q) => Some(q),
            Shape::Union(u) => u.select_branch(data).ok().flatten(),
        };
        match query {
            Some(query) if depth < self.max_depth => {
                Value::Map(self.props(query, data, depth + 1, recursion))
            }
            _ => Value::Map(data.clone()),
        }
    }
}
