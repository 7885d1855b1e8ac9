//! Route storage: the ordered controller table and the keyed direct-handler map.
//!
//! Both collections are filled during startup and only read afterwards.
//! Registering a template that is already present replaces its handler in
//! place, so an entry keeps the priority of its first registration and no
//! entry is ever shadowed by an identical twin.

use std::collections::HashMap;
use std::sync::Arc;

use super::pattern::CompiledPattern;
use crate::context::Context;
use crate::controller::ControllerDescriptor;
use crate::http::Values;

/// A plain request handler registered against a template.
pub type DirectHandler = Arc<dyn Fn(&mut Context) + Send + Sync + 'static>;

/// Whether an insert created a new entry or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added(usize),
    Replaced(usize),
}

/// One compiled template and the value it routes to.
pub struct Entry<T> {
    template: String,
    pattern: CompiledPattern,
    target: T,
}

impl<T> Entry<T> {
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn target(&self) -> &T {
        &self.target
    }
}

// Entries in registration order, indexed by template. Static templates double
// as their own literal path, so the same index serves exact-path lookups.
struct Table<T> {
    entries: Vec<Entry<T>>,
    by_template: HashMap<String, usize>,
    // Positions of regex entries, ascending.
    compiled: Vec<usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_template: HashMap::new(),
            compiled: Vec::new(),
        }
    }
}

impl<T> Table<T> {
    fn insert(&mut self, template: &str, pattern: CompiledPattern, target: T) -> Registration {
        if let Some(&index) = self.by_template.get(template) {
            let entry = &mut self.entries[index];
            entry.pattern = pattern;
            entry.target = target;
            return Registration::Replaced(index);
        }
        let index = self.entries.len();
        if !pattern.is_static() {
            self.compiled.push(index);
        }
        self.entries.push(Entry {
            template: template.to_owned(),
            pattern,
            target,
        });
        self.by_template.insert(template.to_owned(), index);
        Registration::Added(index)
    }

    fn static_hit(&self, path: &str) -> Option<usize> {
        self.by_template
            .get(path)
            .copied()
            .filter(|&i| self.entries[i].pattern.is_static())
    }

    // First regex entry below `limit` that accepts `path`.
    fn first_compiled(&self, path: &str, limit: usize) -> Option<(&Entry<T>, Values)> {
        self.compiled
            .iter()
            .take_while(|&&i| i < limit)
            .find_map(|&i| {
                let entry = &self.entries[i];
                entry.pattern.matches(path).map(|params| (entry, params))
            })
    }
}

/// Controller routes in registration order.
///
/// Matching is first-registered-wins across static and regex entries alike.
/// Static entries are found through a hash lookup; only regex entries
/// registered before that hit are then tried, which gives the same answer as
/// a full linear scan.
#[derive(Default)]
pub struct RouteTable {
    table: Table<ControllerDescriptor>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        template: &str,
        pattern: CompiledPattern,
        controller: ControllerDescriptor,
    ) -> Registration {
        self.table.insert(template, pattern, controller)
    }

    /// Finds the earliest-registered route accepting `path`.
    pub fn find(&self, path: &str) -> Option<(&Entry<ControllerDescriptor>, Values)> {
        match self.table.static_hit(path) {
            Some(hit) => self
                .table
                .first_compiled(path, hit)
                .or_else(|| Some((&self.table.entries[hit], Values::new()))),
            None => self.table.first_compiled(path, usize::MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<ControllerDescriptor>> {
        self.table.entries.iter()
    }
}

/// Direct handlers keyed by template.
///
/// Checked before controller routes. An exact literal hit wins outright;
/// otherwise regex entries are tried in registration order.
#[derive(Default)]
pub struct DirectHandlers {
    table: Table<DirectHandler>,
}

impl DirectHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        template: &str,
        pattern: CompiledPattern,
        handler: DirectHandler,
    ) -> Registration {
        self.table.insert(template, pattern, handler)
    }

    pub fn find(&self, path: &str) -> Option<(&Entry<DirectHandler>, Values)> {
        match self.table.static_hit(path) {
            Some(hit) => Some((&self.table.entries[hit], Values::new())),
            None => self.table.first_compiled(path, usize::MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::router::pattern::compile;

    #[derive(Default)]
    struct Noop;
    impl Controller for Noop {}

    fn named(name: &str) -> ControllerDescriptor {
        ControllerDescriptor::new(name, || Box::new(Noop))
    }

    fn table(routes: &[(&str, &str)]) -> RouteTable {
        let mut t = RouteTable::new();
        for (template, name) in routes {
            t.insert(template, compile(template).unwrap(), named(name));
        }
        t
    }

    fn winner(t: &RouteTable, path: &str) -> Option<String> {
        t.find(path).map(|(e, _)| e.target().name().to_owned())
    }

    #[test]
    fn earlier_placeholder_beats_later_literal() {
        let t = table(&[("/a/{<id>}", "param"), ("/a/static", "literal")]);
        assert_eq!(winner(&t, "/a/static").as_deref(), Some("param"));
        let (_, params) = t.find("/a/static").unwrap();
        assert_eq!(params.get("id"), Some("static"));
    }

    #[test]
    fn earlier_literal_beats_later_placeholder() {
        let t = table(&[("/a/static", "literal"), ("/a/{<id>}", "param")]);
        assert_eq!(winner(&t, "/a/static").as_deref(), Some("literal"));
        assert_eq!(winner(&t, "/a/other").as_deref(), Some("param"));
    }

    #[test]
    fn literal_hit_only_scans_earlier_regex_entries() {
        let t = table(&[
            ("/x/{<n(int)>}", "ints"),
            ("/x/abc", "literal"),
            ("/x/{<s>}", "strings"),
        ]);
        assert_eq!(winner(&t, "/x/abc").as_deref(), Some("literal"));
        assert_eq!(winner(&t, "/x/12").as_deref(), Some("ints"));
        assert_eq!(winner(&t, "/x/zz").as_deref(), Some("strings"));
    }

    #[test]
    fn no_match_is_none() {
        let t = table(&[("/a", "a")]);
        assert!(t.find("/b").is_none());
        assert!(t.find("/a/").is_none());
    }

    #[test]
    fn duplicate_template_replaces_in_place() {
        let mut t = table(&[("/a/{<id>}", "first"), ("/b", "b")]);
        let reg = t.insert("/a/{<id>}", compile("/a/{<id>}").unwrap(), named("second"));
        assert_eq!(reg, Registration::Replaced(0));
        assert_eq!(t.len(), 2);
        assert_eq!(winner(&t, "/a/1").as_deref(), Some("second"));
        assert_eq!(t.iter().next().unwrap().template(), "/a/{<id>}");
    }

    #[test]
    fn direct_literal_wins_over_earlier_regex() {
        let mut d = DirectHandlers::new();
        let noop: DirectHandler = Arc::new(|_: &mut Context| {});
        d.insert("/h/{<x>}", compile("/h/{<x>}").unwrap(), Arc::clone(&noop));
        d.insert("/h/exact", compile("/h/exact").unwrap(), Arc::clone(&noop));
        let (entry, _) = d.find("/h/exact").unwrap();
        assert_eq!(entry.template(), "/h/exact");
        let (entry, params) = d.find("/h/y").unwrap();
        assert_eq!(entry.template(), "/h/{<x>}");
        assert_eq!(params.get("x"), Some("y"));
    }

    #[test]
    fn direct_reregistration_replaces() {
        let mut d = DirectHandlers::new();
        let noop: DirectHandler = Arc::new(|_: &mut Context| {});
        assert_eq!(d.insert("/h", compile("/h").unwrap(), Arc::clone(&noop)), Registration::Added(0));
        assert_eq!(d.insert("/h", compile("/h").unwrap(), noop), Registration::Replaced(0));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn regex_template_text_is_not_a_literal_path() {
        let t = table(&[("/a/{<id(int)>}", "ints")]);
        assert!(t.find("/a/{<id(int)>}").is_none());
    }
}
