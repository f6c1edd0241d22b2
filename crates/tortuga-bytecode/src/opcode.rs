/// Instruction set for the straight-line fast path.
///
/// Stack-based: operands come from and results go to a small value stack.
/// Only lines with no user-procedure calls and no labels compile, so the set
/// stays tiny: loads, stores, primitive dispatch and a few arithmetic fast
/// paths. Opcode space uses u8 with gaps between categories.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OpCode {
    // =====================================================================
    // LOAD / STORE
    // =====================================================================
    /// Push constant: push(consts[a])
    LoadConst = 0x10,
    /// Push a variable's value: push(lookup(consts[a] as name))
    LoadVar = 0x11,
    /// Store top into a variable: bind(consts[a] as name, pop())
    StoreVar = 0x12,

    // =====================================================================
    // PRIMITIVE DISPATCH
    // =====================================================================
    /// Call primitive by registry index: prim[a](pop b args, reversed)
    CallPrim = 0x20,

    // =====================================================================
    // ARITHMETIC FAST PATHS
    // =====================================================================
    /// push(pop_lhs + pop_rhs)
    Add = 0x30,
    /// push(pop_lhs - pop_rhs)
    Sub = 0x31,
    /// push(pop_lhs * pop_rhs)
    Mul = 0x32,
    /// push(pop_lhs / pop_rhs)
    Div = 0x33,
    /// push(-pop())
    Neg = 0x34,

    // =====================================================================
    // COMPARISON FAST PATHS
    // =====================================================================
    /// push(word true/false for pop_lhs = pop_rhs)
    CmpEq = 0x40,
    /// push(word true/false for pop_lhs < pop_rhs)
    CmpLt = 0x41,
    /// push(word true/false for pop_lhs > pop_rhs)
    CmpGt = 0x42,

    // =====================================================================
    // STRUCTURE
    // =====================================================================
    /// Instruction boundary: the stack must be empty here.
    EndInstr = 0x50,
}

impl OpCode {
    /// Decode a u8 into an OpCode, returning None for invalid values.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x10 => Some(Self::LoadConst),
            0x11 => Some(Self::LoadVar),
            0x12 => Some(Self::StoreVar),

            0x20 => Some(Self::CallPrim),

            0x30 => Some(Self::Add),
            0x31 => Some(Self::Sub),
            0x32 => Some(Self::Mul),
            0x33 => Some(Self::Div),
            0x34 => Some(Self::Neg),

            0x40 => Some(Self::CmpEq),
            0x41 => Some(Self::CmpLt),
            0x42 => Some(Self::CmpGt),

            0x50 => Some(Self::EndInstr),

            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_roundtrip() {
        for op in [
            OpCode::LoadConst,
            OpCode::LoadVar,
            OpCode::StoreVar,
            OpCode::CallPrim,
            OpCode::Add,
            OpCode::Sub,
            OpCode::Mul,
            OpCode::Div,
            OpCode::Neg,
            OpCode::CmpEq,
            OpCode::CmpLt,
            OpCode::CmpGt,
            OpCode::EndInstr,
        ] {
            assert_eq!(OpCode::from_byte(op.to_byte()), Some(op));
        }
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        assert_eq!(OpCode::from_byte(0x00), None);
        assert_eq!(OpCode::from_byte(0xFF), None);
        assert_eq!(OpCode::from_byte(0x21), None);
    }
}
