//! Untyped Logo values.

use tortuga_common::numbers::parse_number;

use crate::heap::Heap;
use crate::node::Node;

/// A Logo value: nothing, a single-precision number, a word (interned atom),
/// or a list (head cons, or NIL for the empty list).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    None,
    Number(f32),
    Word(Node),
    List(Node),
}

impl Value {
    /// The empty list.
    pub const EMPTY_LIST: Value = Value::List(Node::NIL);

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn is_word(&self) -> bool {
        matches!(self, Value::Word(_) | Value::Number(_))
    }

    /// Numeric coercion. Numbers pass through; a word converts when its
    /// entire text parses as a number.
    pub fn as_number(&self, heap: &Heap) -> Option<f32> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Word(atom) => parse_number(heap.atom_text(*atom)),
            _ => None,
        }
    }

    /// Boolean coercion: the words `true` and `false`, case-insensitively.
    pub fn as_bool(&self, heap: &Heap) -> Option<bool> {
        match self {
            Value::Word(atom) => {
                let text = heap.atom_text(*atom);
                if text.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<Node> {
        match self {
            Value::List(node) => Some(*node),
            _ => None,
        }
    }

    /// The value as a heap node for storage inside a cons cell: words keep
    /// their atom, numbers are formatted and interned, lists carry the
    /// sublist tag. `None` has no node form.
    pub fn to_element(&self, heap: &mut Heap) -> Option<Node> {
        match self {
            Value::None => None,
            Value::Number(n) => Some(heap.atom(&tortuga_common::numbers::format_number(*n))),
            Value::Word(atom) => Some(*atom),
            Value::List(node) => Some(node.as_sublist()),
        }
    }

    /// The inverse of [`Value::to_element`]: classify a list element.
    pub fn from_element(node: Node, heap: &Heap) -> Value {
        if node.is_nil() || node.is_sublist() {
            Value::List(node.as_plain_cons())
        } else if node.is_atom() {
            match parse_number(heap.atom_text(node)) {
                Some(n) => Value::Number(n),
                None => Value::Word(node),
            }
        } else {
            // A plain cons element: treat as a list head.
            Value::List(node)
        }
    }

    /// Structural equality with Logo's rules: numeric comparison when both
    /// sides coerce to numbers, case-insensitive word identity, recursive
    /// list comparison.
    pub fn logo_eq(&self, other: &Value, heap: &Heap) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(heap), other.as_number(heap)) {
            return a == b;
        }
        match (self, other) {
            (Value::Word(a), Value::Word(b)) => a == b,
            (Value::List(a), Value::List(b)) => list_eq(*a, *b, heap),
            (Value::None, Value::None) => true,
            _ => false,
        }
    }
}

fn list_eq(mut a: Node, mut b: Node, heap: &Heap) -> bool {
    loop {
        match (a.is_nil(), b.is_nil()) {
            (true, true) => return true,
            (true, false) | (false, true) => return false,
            _ => {}
        }
        let ea = Value::from_element(heap.car(a), heap);
        let eb = Value::from_element(heap.car(b), heap);
        if !ea.logo_eq(&eb, heap) {
            return false;
        }
        a = heap.cdr(a);
        b = heap.cdr(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_number_coercion() {
        let mut heap = Heap::new();
        let w = Value::Word(heap.atom("3.5"));
        assert_eq!(w.as_number(&heap), Some(3.5));
        let w = Value::Word(heap.atom("abc"));
        assert_eq!(w.as_number(&heap), None);
        assert_eq!(Value::Number(2.0).as_number(&heap), Some(2.0));
    }

    #[test]
    fn test_bool_coercion() {
        let mut heap = Heap::new();
        let t = Value::Word(heap.atom("TRUE"));
        let f = Value::Word(heap.atom("false"));
        let x = Value::Word(heap.atom("maybe"));
        assert_eq!(t.as_bool(&heap), Some(true));
        assert_eq!(f.as_bool(&heap), Some(false));
        assert_eq!(x.as_bool(&heap), None);
        assert_eq!(Value::Number(1.0).as_bool(&heap), None);
    }

    #[test]
    fn test_element_roundtrip() {
        let mut heap = Heap::new();
        let n = Value::Number(7.0);
        let elem = n.to_element(&mut heap).unwrap();
        assert_eq!(heap.atom_text(elem), "7");
        // Numeric atoms classify back as numbers.
        assert_eq!(Value::from_element(elem, &heap), Value::Number(7.0));

        let a = heap.atom("hello");
        assert_eq!(Value::from_element(a, &heap), Value::Word(a));
    }

    #[test]
    fn test_logo_eq_numeric_vs_word() {
        let mut heap = Heap::new();
        let three_word = Value::Word(heap.atom("3"));
        assert!(three_word.logo_eq(&Value::Number(3.0), &heap));
        let foo = Value::Word(heap.atom("Foo"));
        let foo2 = Value::Word(heap.atom("foo"));
        assert!(foo.logo_eq(&foo2, &heap));
    }

    #[test]
    fn test_logo_eq_lists() {
        let mut heap = Heap::new();
        let a = heap.atom("a");
        let l1 = {
            let tail = heap.try_cons(a, Node::NIL).unwrap();
            heap.try_cons(a, tail).unwrap()
        };
        let l2 = {
            let tail = heap.try_cons(a, Node::NIL).unwrap();
            heap.try_cons(a, tail).unwrap()
        };
        assert!(Value::List(l1).logo_eq(&Value::List(l2), &heap));
        let shorter = heap.try_cons(a, Node::NIL).unwrap();
        assert!(!Value::List(l1).logo_eq(&Value::List(shorter), &heap));
    }
}
