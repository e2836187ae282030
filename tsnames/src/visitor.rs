//! Visitors of name definitions and subscriptions to new definitions.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Receives `(section, value, name)` triples.
///
/// Used both to enumerate the content of a section and to be notified of new
/// definitions when a source is merged.
pub trait NamesVisitor: Send + Sync {
    /// Handle one value. Return `false` to stop the enumeration.
    ///
    /// The return value is ignored for merge notifications.
    fn handle_name_value(&self, section: &str, value: u64, name: &str) -> bool;
}

impl<F> NamesVisitor for F
where
    F: Fn(&str, u64, &str) -> bool + Send + Sync,
{
    fn handle_name_value(&self, section: &str, value: u64, name: &str) -> bool {
        self(section, value, name)
    }
}

/// Identity of a visitor, the address of its shared allocation.
fn visitor_id(visitor: &Arc<dyn NamesVisitor>) -> usize {
    Arc::as_ptr(visitor) as *const () as usize
}

/// Weak references to subscribed visitors.
#[derive(Default)]
struct WeakSet {
    visitors: Vec<(usize, Weak<dyn NamesVisitor>)>,
}

impl WeakSet {
    fn insert(&mut self, visitor: &Arc<dyn NamesVisitor>) {
        let id = visitor_id(visitor);
        self.prune();
        if !self.visitors.iter().any(|(i, _)| *i == id) {
            self.visitors.push((id, Arc::downgrade(visitor)));
        }
    }

    fn remove(&mut self, visitor: &Arc<dyn NamesVisitor>) {
        let id = visitor_id(visitor);
        self.visitors.retain(|(i, w)| *i != id && w.strong_count() > 0);
    }

    fn prune(&mut self) {
        self.visitors.retain(|(_, w)| w.strong_count() > 0);
    }

    fn live(&mut self) -> Vec<Arc<dyn NamesVisitor>> {
        self.prune();
        self.visitors.iter().filter_map(|(_, w)| w.upgrade()).collect()
    }

    fn is_empty(&self) -> bool {
        self.visitors.is_empty()
    }
}

/// Subscribers of one registry: per normalized section and global ones.
#[derive(Default)]
pub(crate) struct Subscriptions {
    global: WeakSet,
    by_section: HashMap<String, WeakSet>,
}

impl Subscriptions {
    /// Subscribe to a normalized section, or to all sections when `key` is empty.
    pub fn subscribe(&mut self, visitor: &Arc<dyn NamesVisitor>, key: &str) {
        if key.is_empty() {
            self.global.insert(visitor);
        } else {
            self.by_section.entry(key.to_string()).or_default().insert(visitor);
        }
    }

    /// Remove a subscription. With an empty `key`, the visitor is removed from
    /// the global set and from every section.
    pub fn unsubscribe(&mut self, visitor: &Arc<dyn NamesVisitor>, key: &str) {
        if key.is_empty() {
            self.global.remove(visitor);
            for set in self.by_section.values_mut() {
                set.remove(visitor);
            }
        } else if let Some(set) = self.by_section.get_mut(key) {
            set.remove(visitor);
        }
        self.by_section.retain(|_, set| !set.is_empty());
    }

    /// Live visitors to notify for a normalized section, section subscribers
    /// first. Dead references are dropped on the way.
    pub fn targets(&mut self, key: &str) -> Vec<Arc<dyn NamesVisitor>> {
        let mut targets = match self.by_section.get_mut(key) {
            Some(set) => set.live(),
            None => Vec::new(),
        };
        for visitor in self.global.live() {
            if !targets.iter().any(|t| visitor_id(t) == visitor_id(&visitor)) {
                targets.push(visitor);
            }
        }
        targets
    }

    pub fn is_empty(&mut self) -> bool {
        self.global.prune();
        for set in self.by_section.values_mut() {
            set.prune();
        }
        self.by_section.retain(|_, set| !set.is_empty());
        self.global.is_empty() && self.by_section.is_empty()
    }
}
