pub mod arena;
pub mod compiler;
pub mod eval;
pub mod frame;
pub mod interp;
pub mod io;
pub mod persist;
pub mod primitives;
pub mod vm;

pub use eval::RunKind;
pub use interp::{Interp, InterpConfig};
