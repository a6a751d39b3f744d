//! Tree paths: root-relative, `/`-joined node addresses. The document
//! root is the empty path.

/// Joins a tree path and a child name.
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// The tree path of a node's parent directory; the root is its own parent.
pub fn parent(path: &str) -> &str {
    path.rfind('/').map(|at| &path[..at]).unwrap_or("")
}

/// Final path component.
pub fn name(path: &str) -> &str {
    path.rfind('/').map(|at| &path[at + 1..]).unwrap_or(path)
}

/// Removes a leading tree-path prefix, as used when mapping a built
/// subtree onto the output directory. Paths outside the prefix are
/// returned unchanged.
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        path
    } else if path == prefix {
        ""
    } else {
        path.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
    }
}

/// Joins a base tree path with a relative reference, resolving `.` and
/// `..` components. `..` at the root stays at the root.
pub fn join_relative(base: &str, relative: &str) -> String {
    let mut components: Vec<&str> = base.split('/').filter(|c| !c.is_empty()).collect();
    for component in relative.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            name => components.push(name),
        }
    }
    components.join("/")
}
