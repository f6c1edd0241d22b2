//! Property lists: entity name -> alternating property-name/value pairs.
//!
//! The pair lists live on the node heap so the collector traces them as
//! roots. Values are stored as nodes: words and numbers as atoms (numbers
//! formatted to words by the caller), lists as sublist-tagged conses.

use tortuga_heap::{Heap, Node};

pub struct PropStore {
    /// (entity name atom, head of alternating prop/value list).
    entries: Vec<(Node, Node)>,
}

impl PropStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// `pprop`: set a property, replacing any existing value in place.
    /// Fails with `None` only on heap exhaustion.
    pub fn put(&mut self, heap: &mut Heap, name: Node, prop: Node, value: Node) -> Option<()> {
        if let Some(slot) = self.find_value_cell(heap, name, prop) {
            heap.set_car(slot, value);
            return Some(());
        }
        let head = self.plist(name);
        let value_cell = heap.try_cons(value, head)?;
        let prop_cell = heap.try_cons(prop, value_cell)?;
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, h)) => *h = prop_cell,
            None => self.entries.push((name, prop_cell)),
        }
        Some(())
    }

    /// `gprop`: the stored value node, or `None` when absent.
    pub fn get(&self, heap: &Heap, name: Node, prop: Node) -> Option<Node> {
        self.find_value_cell(heap, name, prop).map(|c| heap.car(c))
    }

    /// `remprop`: drop one property; an emptied entity disappears.
    pub fn remove(&mut self, heap: &mut Heap, name: Node, prop: Node) {
        let Some(idx) = self.entries.iter().position(|(n, _)| *n == name) else {
            return;
        };
        let head = self.entries[idx].1;
        if heap.car(head) == prop {
            let rest = heap.cdr(heap.cdr(head));
            if rest.is_nil() {
                self.entries.remove(idx);
            } else {
                self.entries[idx].1 = rest;
            }
            return;
        }
        let mut prev_value_cell = heap.cdr(head);
        let mut cursor = heap.cdr(prev_value_cell);
        while !cursor.is_nil() {
            let value_cell = heap.cdr(cursor);
            if heap.car(cursor) == prop {
                let rest = heap.cdr(value_cell);
                heap.set_cdr(prev_value_cell, rest);
                return;
            }
            prev_value_cell = value_cell;
            cursor = heap.cdr(value_cell);
        }
    }

    /// `plist`: the alternating list head (NIL when the entity has none).
    pub fn plist(&self, name: Node) -> Node {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, h)| *h)
            .unwrap_or(Node::NIL)
    }

    pub fn entities(&self) -> impl Iterator<Item = Node> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Plist heads, traced as GC roots.
    pub fn roots(&self) -> impl Iterator<Item = Node> + '_ {
        self.entries.iter().map(|(_, h)| *h)
    }

    fn find_value_cell(&self, heap: &Heap, name: Node, prop: Node) -> Option<Node> {
        let mut cursor = self.plist(name);
        while !cursor.is_nil() {
            let value_cell = heap.cdr(cursor);
            if heap.car(cursor) == prop {
                return Some(value_cell);
            }
            cursor = heap.cdr(value_cell);
        }
        None
    }
}

impl Default for PropStore {
    fn default() -> Self {
        Self::new()
    }
}
