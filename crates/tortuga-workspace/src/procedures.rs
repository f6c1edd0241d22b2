//! The user procedure table.

use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::Node;
use tracing::debug;

/// A user-defined procedure. The body is a list of lines; each line is a
/// sublist-tagged token list with newline markers preserved, so `po` and
/// `save` can re-emit the definition as typed.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: Node,
    /// Parameter name atoms, without colons. At most 16.
    pub params: Vec<Node>,
    pub body: Node,
    pub buried: bool,
    pub stepped: bool,
    pub traced: bool,
}

/// Fixed-capacity procedure table. Lookup is by interned atom; interning is
/// case-insensitive, so atom equality is name equality.
pub struct ProcTable {
    procs: Vec<Procedure>,
    capacity: usize,
}

impl ProcTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            procs: Vec::new(),
            capacity,
        }
    }

    /// Define or redefine. Redefinition is in-place: flags survive.
    pub fn define(
        &mut self,
        name: Node,
        params: Vec<Node>,
        body: Node,
    ) -> Result<(), ErrorInfo> {
        if let Some(idx) = self.find(name) {
            let p = &mut self.procs[idx];
            p.params = params;
            p.body = body;
            debug!(index = idx, "procedure redefined");
            return Ok(());
        }
        if self.procs.len() == self.capacity {
            return Err(ErrorInfo::new(ErrorCode::TooManyProcedures));
        }
        self.procs.push(Procedure {
            name,
            params,
            body,
            buried: false,
            stepped: false,
            traced: false,
        });
        debug!(count = self.procs.len(), "procedure defined");
        Ok(())
    }

    pub fn find(&self, name: Node) -> Option<usize> {
        self.procs.iter().position(|p| p.name == name)
    }

    pub fn exists(&self, name: Node) -> bool {
        self.find(name).is_some()
    }

    pub fn get(&self, idx: usize) -> &Procedure {
        &self.procs[idx]
    }

    pub fn by_name(&self, name: Node) -> Option<&Procedure> {
        self.find(name).map(|i| &self.procs[i])
    }

    pub fn by_name_mut(&mut self, name: Node) -> Option<&mut Procedure> {
        self.find(name).map(|i| &mut self.procs[i])
    }

    /// Erase one procedure. Returns false when no such name is defined.
    pub fn erase(&mut self, name: Node) -> bool {
        match self.find(name) {
            Some(idx) => {
                self.procs.remove(idx);
                debug!(count = self.procs.len(), "procedure erased");
                true
            }
            None => false,
        }
    }

    /// Erase every unburied procedure.
    pub fn erase_all(&mut self) {
        self.procs.retain(|p| p.buried);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Procedure> {
        self.procs.iter()
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }
}
