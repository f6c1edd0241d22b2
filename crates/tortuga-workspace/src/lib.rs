pub mod plists;
pub mod procedures;
pub mod variables;

pub use plists::PropStore;
pub use procedures::{ProcTable, Procedure};
pub use variables::{Global, Globals};

use tortuga_heap::Node;

/// The workspace: everything a `save` persists and an `erall` clears.
pub struct Workspace {
    pub procs: ProcTable,
    pub globals: Globals,
    pub props: PropStore,
}

impl Workspace {
    pub fn new(max_procedures: usize) -> Self {
        Self {
            procs: ProcTable::new(max_procedures),
            globals: Globals::new(),
            props: PropStore::new(),
        }
    }

    /// GC roots contributed by the workspace: procedure bodies, global
    /// values, property lists.
    pub fn roots(&self) -> impl Iterator<Item = Node> + '_ {
        self.procs
            .iter()
            .map(|p| p.body)
            .chain(self.globals.iter().filter_map(|g| g.value.as_list()))
            .chain(self.props.roots())
    }
}
