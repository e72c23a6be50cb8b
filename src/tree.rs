//! ASCII directory tree rendering for diagnostics

use std::fs;
use std::path::Path;

/// Options for [`render_tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    /// Levels below the root to descend
    pub max_depth: usize,
    /// List files as well as directories
    pub include_files: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            include_files: false,
        }
    }
}

/// Render `root` and its descendants as a tree.
///
/// Entries are sorted by name. Directories that cannot be read are shown
/// without children.
pub fn render_tree(root: &Path, options: &TreeOptions) -> String {
    let label = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());

    let mut lines = vec![format!("{}/", label)];
    walk(root, "", 1, options, &mut lines);
    lines.join("\n")
}

fn walk(dir: &Path, prefix: &str, depth: usize, options: &TreeOptions, lines: &mut Vec<String>) {
    if depth > options.max_depth {
        return;
    }

    let Ok(read_dir) = fs::read_dir(dir) else {
        return;
    };

    let mut entries: Vec<(String, bool)> = read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let is_dir = entry.path().is_dir();
            (entry.file_name().to_string_lossy().into_owned(), is_dir)
        })
        .filter(|(_, is_dir)| *is_dir || options.include_files)
        .collect();
    entries.sort();

    let count = entries.len();
    for (index, (name, is_dir)) in entries.into_iter().enumerate() {
        let last = index + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        let suffix = if is_dir { "/" } else { "" };
        lines.push(format!("{}{}{}{}", prefix, connector, name, suffix));

        if is_dir {
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            walk(&dir.join(&name), &child_prefix, depth + 1, options, lines);
        }
    }
}
