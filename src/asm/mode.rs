// The mode resolver: a prefix tree keyed by the ordered sequence of
// argument kinds an instruction's arguments produced. Missing sequences are
// "no such mode" rather than a default — the trie makes that naturally
// total instead of something every call site has to remember to check.

use crate::isa::{ArgKind, Mode, ALL_MODES};
use std::collections::HashMap;

#[derive(Default)]
struct Node {
    children: HashMap<ArgKind, Node>,
    mode: Option<Mode>,
}

pub struct ModeTrie {
    root: Node,
}

impl ModeTrie {
    pub fn new() -> Self {
        let mut root = Node::default();
        for mode in ALL_MODES {
            let mut node = &mut root;
            for kind in mode.arg_kinds() {
                node = node.children.entry(*kind).or_insert_with(Node::default);
            }
            node.mode = Some(*mode);
        }
        ModeTrie { root }
    }

    /// Resolves an ordered argument-kind sequence to a mode, or `None` if no
    /// recognised mode has that exact shape.
    pub fn resolve(&self, kinds: &[ArgKind]) -> Option<Mode> {
        let mut node = &self.root;
        for kind in kinds {
            node = node.children.get(kind)?;
        }
        node.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_recognised_sequence() {
        let trie = ModeTrie::new();
        for mode in ALL_MODES {
            assert_eq!(trie.resolve(mode.arg_kinds()), Some(*mode));
        }
    }

    #[test]
    fn rejects_unrecognised_sequences() {
        let trie = ModeTrie::new();
        assert_eq!(trie.resolve(&[ArgKind::Ind]), None);
        assert_eq!(trie.resolve(&[ArgKind::Reg, ArgKind::Reg, ArgKind::Reg, ArgKind::Reg]), None);
        assert_eq!(trie.resolve(&[ArgKind::Ind, ArgKind::Ind]), None);
    }
}
