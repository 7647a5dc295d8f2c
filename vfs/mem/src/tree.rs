use std::collections::{BTreeMap, HashMap};

use sdmc_core::ResultCode;

pub(crate) type NodeId = u64;

pub(crate) enum NodeKind {
    File(Vec<u8>),
    Dir,
}

pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) mtime_ms: u64,
}

impl Node {
    pub(crate) fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Dir)
    }

    pub(crate) fn len(&self) -> u64 {
        match &self.kind {
            NodeKind::File(data) => data.len() as u64,
            NodeKind::Dir => 0,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Listing {
    pub(crate) name: String,
    pub(crate) is_dir: bool,
    pub(crate) size: u64,
}

/// Path-keyed namespace over id-keyed nodes, so open handles keep working
/// across renames.
pub(crate) struct Tree {
    paths: BTreeMap<String, NodeId>,
    nodes: HashMap<NodeId, Node>,
    next_id: NodeId,
    used_bytes: u64,
}

impl Tree {
    pub(crate) fn new(now_ms: u64) -> Self {
        let mut tree = Self {
            paths: BTreeMap::new(),
            nodes: HashMap::new(),
            next_id: 1,
            used_bytes: 0,
        };
        tree.insert(String::from("/"), NodeKind::Dir, now_ms);
        tree
    }

    pub(crate) fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub(crate) fn lookup(&self, path: &str) -> Option<NodeId> {
        self.paths.get(path).copied()
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn create(
        &mut self,
        path: &str,
        kind: NodeKind,
        now_ms: u64,
    ) -> Result<NodeId, ResultCode> {
        if self.paths.contains_key(path) {
            return Err(ResultCode::ALREADY_EXISTS);
        }
        self.require_parent_dir(path)?;
        Ok(self.insert(path.to_owned(), kind, now_ms))
    }

    pub(crate) fn remove(&mut self, path: &str, want_dir: bool) -> Result<(), ResultCode> {
        if path == "/" {
            return Err(ResultCode::INVALID_ARGUMENT);
        }
        let id = self.lookup(path).ok_or(missing(want_dir))?;
        let is_dir = self.nodes.get(&id).is_some_and(Node::is_dir);
        if is_dir != want_dir {
            return Err(missing(want_dir));
        }
        if is_dir && !self.children(path).is_empty() {
            return Err(ResultCode::NOT_EMPTY);
        }
        self.paths.remove(path);
        if let Some(node) = self.nodes.remove(&id) {
            self.used_bytes -= node.len();
        }
        Ok(())
    }

    pub(crate) fn rename(
        &mut self,
        from: &str,
        to: &str,
        want_dir: bool,
    ) -> Result<(), ResultCode> {
        let id = self.lookup(from).ok_or(missing(want_dir))?;
        if self.nodes.get(&id).is_some_and(Node::is_dir) != want_dir || from == "/" {
            return Err(missing(want_dir));
        }
        if self.paths.contains_key(to) {
            return Err(ResultCode::ALREADY_EXISTS);
        }
        self.require_parent_dir(to)?;

        let subtree = subtree_prefix(from);
        if to.starts_with(&subtree) {
            return Err(ResultCode::INVALID_ARGUMENT);
        }
        let moved: Vec<String> = self
            .paths
            .keys()
            .filter(|key| *key == from || key.starts_with(&subtree))
            .cloned()
            .collect();
        for key in moved {
            if let Some(id) = self.paths.remove(&key) {
                let renamed = format!("{to}{}", &key[from.len()..]);
                self.paths.insert(renamed, id);
            }
        }
        Ok(())
    }

    /// Immediate children of `dir`, in name order.
    pub(crate) fn children(&self, dir: &str) -> Vec<Listing> {
        let prefix = subtree_prefix(dir);
        self.paths
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, id)| {
                let name = &key[prefix.len()..];
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                let node = self.nodes.get(id)?;
                Some(Listing {
                    name: name.to_owned(),
                    is_dir: node.is_dir(),
                    size: node.len(),
                })
            })
            .collect()
    }

    pub(crate) fn read(
        &self,
        id: NodeId,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, ResultCode> {
        let data = self.file_data(id)?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let len = buf.len().min(data.len() - start);
        buf[..len].copy_from_slice(&data[start..start + len]);
        Ok(len)
    }

    pub(crate) fn write(
        &mut self,
        id: NodeId,
        offset: u64,
        buf: &[u8],
        capacity: u64,
        now_ms: u64,
    ) -> Result<usize, ResultCode> {
        if buf.is_empty() {
            return Ok(0);
        }
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or(ResultCode::INVALID_ARGUMENT)?;
        let current = self.file_data(id)?.len() as u64;
        if end > current {
            self.resize(id, end, capacity, now_ms)?;
        }
        let node = self.nodes.get_mut(&id).ok_or(ResultCode::INVALID_HANDLE)?;
        if let NodeKind::File(data) = &mut node.kind {
            let start = offset as usize;
            data[start..start + buf.len()].copy_from_slice(buf);
        }
        node.mtime_ms = now_ms;
        Ok(buf.len())
    }

    pub(crate) fn resize(
        &mut self,
        id: NodeId,
        size: u64,
        capacity: u64,
        now_ms: u64,
    ) -> Result<(), ResultCode> {
        let current = self.file_data(id)?.len() as u64;
        if size > current && self.used_bytes + (size - current) > capacity {
            return Err(ResultCode::DISK_FULL);
        }
        let new_len = usize::try_from(size).map_err(|_| ResultCode::DISK_FULL)?;
        let node = self.nodes.get_mut(&id).ok_or(ResultCode::INVALID_HANDLE)?;
        if let NodeKind::File(data) = &mut node.kind {
            data.resize(new_len, 0);
        }
        node.mtime_ms = now_ms;
        self.used_bytes = self.used_bytes + size - current;
        Ok(())
    }

    fn file_data(&self, id: NodeId) -> Result<&Vec<u8>, ResultCode> {
        match self.nodes.get(&id).map(|node| &node.kind) {
            Some(NodeKind::File(data)) => Ok(data),
            _ => Err(ResultCode::INVALID_HANDLE),
        }
    }

    fn insert(&mut self, path: String, kind: NodeKind, now_ms: u64) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        let node = Node { kind, mtime_ms: now_ms };
        self.used_bytes += node.len();
        self.nodes.insert(id, node);
        self.paths.insert(path, id);
        id
    }

    fn require_parent_dir(&self, path: &str) -> Result<(), ResultCode> {
        let parent = parent_of(path);
        match self.lookup(parent).and_then(|id| self.nodes.get(&id)) {
            Some(node) if node.is_dir() => Ok(()),
            _ => Err(ResultCode::PATH_NOT_FOUND),
        }
    }
}

/// Canonical key for a service path: absolute, no trailing slash except for
/// the root.
pub(crate) fn canonical(path: &str) -> Result<String, ResultCode> {
    if !path.starts_with('/') {
        return Err(ResultCode::INVALID_ARGUMENT);
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        Ok(String::from("/"))
    } else {
        Ok(trimmed.to_owned())
    }
}

pub(crate) fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

fn subtree_prefix(dir: &str) -> String {
    if dir == "/" {
        String::from("/")
    } else {
        format!("{dir}/")
    }
}

fn missing(want_dir: bool) -> ResultCode {
    if want_dir {
        ResultCode::PATH_NOT_FOUND
    } else {
        ResultCode::NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(tree: &Tree, dir: &str) -> Vec<String> {
        tree.children(dir).into_iter().map(|l| l.name).collect()
    }

    #[test]
    fn children_are_immediate_only() {
        let mut tree = Tree::new(0);
        tree.create("/a", NodeKind::Dir, 0).unwrap();
        tree.create("/a/b", NodeKind::Dir, 0).unwrap();
        tree.create("/a/b/c", NodeKind::File(vec![1]), 0).unwrap();
        tree.create("/a/z", NodeKind::File(Vec::new()), 0).unwrap();
        tree.create("/ab", NodeKind::File(Vec::new()), 0).unwrap();

        assert_eq!(names(&tree, "/"), vec!["a", "ab"]);
        assert_eq!(names(&tree, "/a"), vec!["b", "z"]);
    }

    #[test]
    fn create_requires_parent_directory() {
        let mut tree = Tree::new(0);
        let err = tree.create("/missing/file", NodeKind::Dir, 0).unwrap_err();
        assert_eq!(err, ResultCode::PATH_NOT_FOUND);

        tree.create("/file", NodeKind::File(Vec::new()), 0).unwrap();
        let err = tree.create("/file/child", NodeKind::Dir, 0).unwrap_err();
        assert_eq!(err, ResultCode::PATH_NOT_FOUND);
        let err = tree.create("/file", NodeKind::Dir, 0).unwrap_err();
        assert_eq!(err, ResultCode::ALREADY_EXISTS);
    }

    #[test]
    fn renaming_a_directory_moves_its_subtree() {
        let mut tree = Tree::new(0);
        tree.create("/old", NodeKind::Dir, 0).unwrap();
        let id = tree.create("/old/f", NodeKind::File(vec![7]), 0).unwrap();
        tree.rename("/old", "/new", true).unwrap();

        assert_eq!(tree.lookup("/new/f"), Some(id));
        assert_eq!(tree.lookup("/old/f"), None);
        assert_eq!(
            tree.rename("/new", "/new/inside", true).unwrap_err(),
            ResultCode::INVALID_ARGUMENT
        );
    }

    #[test]
    fn writes_respect_capacity() {
        let mut tree = Tree::new(0);
        let id = tree.create("/f", NodeKind::File(Vec::new()), 0).unwrap();
        assert_eq!(tree.write(id, 0, &[1; 8], 10, 0).unwrap(), 8);
        assert_eq!(tree.write(id, 6, &[2; 4], 10, 0).unwrap(), 4);
        assert_eq!(tree.write(id, 10, &[3], 10, 0).unwrap_err(), ResultCode::DISK_FULL);
        assert_eq!(tree.used_bytes(), 10);

        tree.remove("/f", false).unwrap();
        assert_eq!(tree.used_bytes(), 0);
    }

    #[test]
    fn canonical_paths() {
        assert_eq!(canonical("/").unwrap(), "/");
        assert_eq!(canonical("/a/b/").unwrap(), "/a/b");
        assert_eq!(canonical("rel").unwrap_err(), ResultCode::INVALID_ARGUMENT);
        assert_eq!(parent_of("/a"), "/");
        assert_eq!(parent_of("/a/b"), "/a");
    }
}
