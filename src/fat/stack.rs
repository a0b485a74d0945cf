//! Directory stack: the path of directories entered, with the cluster and
//! display name to return through for each "..".

use heapless::Vec;

use crate::{MAX_NUM_SUBDIRS, MAX_PATH_CHARS};

/// Fixed-capacity stack of (cluster, name) frames. Names live packed in one
/// shared arena. A push that would overflow either limit is silently
/// dropped; navigation keeps working, only the affected ".." resolves to
/// the root instead.
pub(crate) struct DirStack {
    clusters: [u32; MAX_NUM_SUBDIRS],
    name_pos: [u16; MAX_NUM_SUBDIRS],
    names: Vec<u8, MAX_PATH_CHARS>,
    depth: usize,
}

impl DirStack {
    pub(crate) fn new() -> Self {
        Self {
            clusters: [0; MAX_NUM_SUBDIRS],
            name_pos: [0; MAX_NUM_SUBDIRS],
            names: Vec::new(),
            depth: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.names.clear();
        self.depth = 0;
    }

    /// Records a directory change. Entering the directory on top of the
    /// stack pops it (that is how ".." unwinds); anything else pushes the
    /// directory being left.
    pub(crate) fn enter(&mut self, entering: u32, leaving: u32, leaving_name: &str) {
        if self.depth > 0 && self.clusters[self.depth - 1] == entering {
            self.depth -= 1;
            self.names.truncate(usize::from(self.name_pos[self.depth]));
            return;
        }
        let name = leaving_name.as_bytes();
        if self.depth < MAX_NUM_SUBDIRS && self.names.len() + name.len() < MAX_PATH_CHARS {
            self.clusters[self.depth] = leaving;
            self.name_pos[self.depth] = self.names.len() as u16;
            let _ = self.names.extend_from_slice(name);
            self.depth += 1;
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Cluster to return to for "..": 0 (the root sentinel) when empty.
    pub(crate) fn top_cluster(&self) -> u32 {
        if self.depth == 0 {
            0
        } else {
            self.clusters[self.depth - 1]
        }
    }

    /// Display name of the directory on top, "" when empty.
    pub(crate) fn top_name(&self) -> &str {
        if self.depth == 0 {
            return "";
        }
        let start = usize::from(self.name_pos[self.depth - 1]);
        core::str::from_utf8(&self.names[start..]).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_round_trip() {
        let mut s = DirStack::new();
        s.enter(5, 0, "ROOT");
        s.enter(9, 5, "MUSIC");
        assert_eq!(s.depth(), 2);
        assert_eq!(s.top_cluster(), 5);
        assert_eq!(s.top_name(), "MUSIC");

        // Entering the top cluster unwinds instead of pushing.
        s.enter(5, 9, "ALBUM");
        assert_eq!(s.depth(), 1);
        assert_eq!(s.top_cluster(), 0);
        assert_eq!(s.top_name(), "ROOT");
    }

    #[test]
    fn empty_stack_resolves_to_root() {
        let s = DirStack::new();
        assert_eq!(s.top_cluster(), 0);
        assert_eq!(s.top_name(), "");
    }

    #[test]
    fn depth_overflow_is_silently_dropped() {
        let mut s = DirStack::new();
        for i in 0..MAX_NUM_SUBDIRS as u32 {
            s.enter(i + 1000, i, "d");
        }
        assert_eq!(s.depth(), MAX_NUM_SUBDIRS);
        let top = s.top_cluster();

        s.enter(9999, 42, "extra");
        assert_eq!(s.depth(), MAX_NUM_SUBDIRS);
        assert_eq!(s.top_cluster(), top);
    }

    #[test]
    fn name_arena_overflow_is_silently_dropped() {
        let mut s = DirStack::new();
        let long = "x".repeat(MAX_PATH_CHARS - 10);
        s.enter(2, 0, &long);
        assert_eq!(s.depth(), 1);

        // Second frame's name no longer fits below the arena limit.
        s.enter(3, 2, "0123456789");
        assert_eq!(s.depth(), 1);
        assert_eq!(s.top_cluster(), 0);
    }
}
