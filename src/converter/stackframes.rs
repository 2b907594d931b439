//! Interning of call-stack paths into a shared frame tree.
//!
//! Samples sharing a call-stack prefix reuse the same ancestor chain of
//! frame ids, so the exported `stackFrames` table grows with the number
//! of distinct stacks, not the number of samples.

use std::collections::{BTreeMap, HashMap};

use crate::output::schema::StackFrameEntry;

/// One interned frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: String,
    pub category: String,
    pub parent: Option<usize>,
}

/// A frame-interning trie keyed by `(parent, category, name)`.
///
/// Frame ids are assigned in insertion order and never change once
/// handed out.
#[derive(Debug, Default)]
pub struct StackFrames {
    frames: Vec<Frame>,
    index: HashMap<(Option<usize>, String, String), usize>,
}

impl StackFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a call-stack path, outermost caller first, and return the
    /// id of the innermost frame. Returns None for an empty path.
    pub fn get_frame_id<I, S>(&mut self, path: I, category: &str) -> Option<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parent = None;

        for frame in path {
            let name = frame.as_ref();
            let key = (parent, category.to_string(), name.to_string());

            let id = match self.index.get(&key) {
                Some(&id) => id,
                None => {
                    let id = self.frames.len();
                    self.frames.push(Frame {
                        name: name.to_string(),
                        category: category.to_string(),
                        parent,
                    });
                    self.index.insert(key, id);
                    id
                }
            };

            parent = Some(id);
        }

        parent
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Export the frame table keyed by stringified frame id.
    pub fn to_table(&self) -> BTreeMap<String, StackFrameEntry> {
        self.frames
            .iter()
            .enumerate()
            .map(|(id, frame)| {
                (
                    id.to_string(),
                    StackFrameEntry {
                        category: frame.category.clone(),
                        name: frame.name.clone(),
                        parent: frame.parent,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_paths_share_the_frame() {
        let mut frames = StackFrames::new();

        let a = frames.get_frame_id(["main", "solve", "kernel"], "callstack");
        let b = frames.get_frame_id(["main", "solve", "kernel"], "callstack");

        assert_eq!(a, b);
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn test_shared_prefix_diverges_at_suffix() {
        let mut frames = StackFrames::new();

        let a = frames.get_frame_id(["main", "solve", "kernel"], "callstack");
        let b = frames.get_frame_id(["main", "solve", "io"], "callstack");

        assert_ne!(a, b);
        // "main" and "solve" are shared, only the leaves differ
        assert_eq!(frames.len(), 4);

        let table = frames.to_table();
        let a_frame = &table[&a.unwrap().to_string()];
        let b_frame = &table[&b.unwrap().to_string()];
        assert_eq!(a_frame.parent, b_frame.parent);
    }

    #[test]
    fn test_empty_path_has_no_frame() {
        let mut frames = StackFrames::new();
        assert_eq!(frames.get_frame_id(Vec::<&str>::new(), "callstack"), None);
        assert!(frames.is_empty());
    }
}
