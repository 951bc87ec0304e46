//! Terminal-independent core: key sequences, the key map trie, the binding decoder,
//! capabilities and the output gate.

pub mod binding_reader;
pub mod capabilities;
pub mod input;
pub mod keymap;
pub mod keys;
pub mod output;
pub mod terminal;
pub mod text;
