//! Process-wide registry of computed ident rules.
//!
//! Queries carry their ident rules by value. Property and constant rules serialize as data,
//! but a computed rule is a function, so it is persisted by name and looked up here when a
//! query is deserialized. Registering a name twice replaces the earlier function.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    ident::ComputedIdent,
    value::{Props, Value},
};

pub type ComputedFn = Arc<dyn Fn(&Props) -> Value + Send + Sync>;

/// Global singleton rule map
pub static IDENT_RULES: Lazy<IdentRuleRegistry> = Lazy::new(IdentRuleRegistry::default);

#[derive(Clone, Default)]
pub struct IdentRuleRegistry(Arc<RwLock<BTreeMap<String, ComputedFn>>>);

impl IdentRuleRegistry {
    pub fn register(&self, name: impl Into<String>, func: ComputedFn) -> ComputedIdent {
        let name = name.into();
        let mut writer = self.0.write();
        if writer.insert(name.clone(), func.clone()).is_some() {
            tracing::debug!("[IdentRuleRegistry::register] replacing computed rule '{name}'");
        }
        ComputedIdent::new(name, func)
    }

    pub fn get(&self, name: &str) -> Option<ComputedIdent> {
        let reader = self.0.read();
        reader
            .get(name)
            .map(|func| ComputedIdent::new(name, func.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }
}
