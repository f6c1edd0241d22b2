use tortuga_heap::Value;

use crate::instruction::Instruction;

/// A compiled body line: linear instructions plus a constant pool.
///
/// Constants are Values (numbers, word atoms, captured sublists); the pool
/// holds nodes into the heap, so cached chunks are dropped whenever the
/// procedure table changes and their lines could go unreachable.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<Instruction>,
    pub consts: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant and return its index, reusing an existing slot for
    /// an identical value.
    pub fn add_const(&mut self, value: Value) -> u16 {
        for (i, existing) in self.consts.iter().enumerate() {
            if *existing == value {
                return i as u16;
            }
        }
        let idx = self.consts.len();
        debug_assert!(idx <= u16::MAX as usize, "constant pool overflow");
        self.consts.push(value);
        idx as u16
    }

    pub fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    pub fn get_const(&self, idx: u16) -> Option<&Value> {
        self.consts.get(idx as usize)
    }
}
