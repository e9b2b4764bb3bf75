//! Vault Tree Renderer
//!
//! Renders a vault's directory structure as connected text:
//!
//! ```text
//! notes/
//! ├──daily/
//! │   └──2024/
//! ├──projects/
//! └──readme.md
//! ```
//!
//! Hidden entries (leading `.`) are skipped at every depth. Siblings are
//! ordered directories first, then by name. Symlinked directories are
//! entered unless they lead back into a directory already open on the walk.
//! The walk uses an explicit stack, and each directory listing reports
//! either its entries or a permission denial, so the root-versus-subtree
//! handling is an ordinary branch.

use super::error::ToolError;
use crate::metrics;
use crate::vault::VaultRegistry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const BRANCH: &str = "├──";
const LAST_BRANCH: &str = "└──";
const PIPE_INDENT: &str = "│   ";
const SPACE_INDENT: &str = "    ";

/// Rendered tree or the reason there is none
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeResult {
    /// Rendered lines joined by `\n`; empty on error
    pub tree: String,

    /// Empty on success
    pub error: String,
}

#[derive(Debug)]
struct Entry {
    name: String,
    path: PathBuf,
    /// Follows symlinks; broken links count as files
    is_dir: bool,
}

enum Listing {
    Entries(Vec<Entry>),
    Denied,
}

struct Frame {
    /// Canonical path of the listed directory, for cycle detection
    dir: PathBuf,
    entries: Vec<Entry>,
    next: usize,
    prefix: String,
}

/// Renders vault trees on the blocking thread pool
#[derive(Debug, Clone)]
pub struct TreeRenderer {
    vaults: Arc<VaultRegistry>,
}

impl TreeRenderer {
    pub fn new(vaults: Arc<VaultRegistry>) -> Self {
        Self { vaults }
    }

    /// Render the tree of the named vault
    ///
    /// The header carries the vault directory's name as configured, so a
    /// vault reached through a symlink is headed by the link's name.
    pub async fn render(&self, vault_name: &str, include_files: bool) -> TreeResult {
        let root = match self.vaults.resolve(vault_name) {
            Ok(path) => path.to_path_buf(),
            Err(e) => {
                warn!("{}", e);
                metrics::record_tree(e.kind());
                return TreeResult::from_error(&e);
            }
        };
        let header = self
            .vaults
            .label(vault_name)
            .map(str::to_string)
            .unwrap_or_else(|| dir_label(&root));

        info!(
            "Generating tree for vault '{}' (include_files={})",
            vault_name, include_files
        );

        let rendered = tokio::task::spawn_blocking(move || {
            render_with(&root, &header, include_files, list_children)
        })
        .await
        .unwrap_or_else(|e| Err(ToolError::Traversal(e.to_string())));

        match rendered {
            Ok(tree) => {
                metrics::record_tree("success");
                TreeResult {
                    tree,
                    error: String::new(),
                }
            }
            Err(e) => {
                warn!("Tree render failed for vault '{}': {}", vault_name, e);
                metrics::record_tree(e.kind());
                TreeResult::from_error(&e)
            }
        }
    }
}

impl TreeResult {
    fn from_error(error: &ToolError) -> Self {
        Self {
            tree: String::new(),
            error: error.to_string(),
        }
    }
}

/// Render the tree rooted at `root` synchronously, headed by its directory name
///
/// # Errors
///
/// [`ToolError::PermissionDenied`] if `root` itself cannot be listed, and
/// [`ToolError::Traversal`] for any other I/O failure. Directories below the
/// root that cannot be listed for lack of permission are omitted silently.
pub fn render_path(root: &Path, include_files: bool) -> Result<String, ToolError> {
    render_with(root, &dir_label(root), include_files, list_children)
}

fn dir_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Walk with `list` supplying each directory's children
///
/// Files always take part in choosing the last sibling and the child indent;
/// with `include_files` off only their lines are left out.
fn render_with<F>(
    root: &Path,
    header: &str,
    include_files: bool,
    mut list: F,
) -> Result<String, ToolError>
where
    F: FnMut(&Path) -> io::Result<Listing>,
{
    let root_entries = match list(root) {
        Ok(Listing::Entries(entries)) => entries,
        Ok(Listing::Denied) => return Err(ToolError::PermissionDenied(root.to_path_buf())),
        Err(e) => return Err(ToolError::Traversal(e.to_string())),
    };

    let mut lines = vec![format!("{}/", header)];
    let mut stack = vec![Frame {
        dir: canonical_or_raw(root),
        entries: root_entries,
        next: 0,
        prefix: String::new(),
    }];

    while let Some(frame) = stack.last_mut() {
        if frame.next == frame.entries.len() {
            stack.pop();
            continue;
        }

        let index = frame.next;
        frame.next += 1;
        let is_last = index + 1 == frame.entries.len();
        let entry = &frame.entries[index];
        let connector = if is_last { LAST_BRANCH } else { BRANCH };

        if !entry.is_dir {
            if include_files {
                lines.push(format!("{}{}{}", frame.prefix, connector, entry.name));
            }
            continue;
        }

        lines.push(format!("{}{}{}/", frame.prefix, connector, entry.name));

        let indent = if is_last { SPACE_INDENT } else { PIPE_INDENT };
        let child_prefix = format!("{}{}", frame.prefix, indent);
        let child_path = entry.path.clone();

        let child_dir = canonical_or_raw(&child_path);
        if stack.iter().any(|open| open.dir == child_dir) {
            debug!("Not following {:?} back into {:?}", child_path, child_dir);
            continue;
        }

        match list(&child_path) {
            Ok(Listing::Entries(entries)) => stack.push(Frame {
                dir: child_dir,
                entries,
                next: 0,
                prefix: child_prefix,
            }),
            Ok(Listing::Denied) => debug!("Skipping unreadable directory {:?}", child_path),
            Err(e) => return Err(ToolError::Traversal(e.to_string())),
        }
    }

    Ok(lines.join("\n"))
}

/// List the visible children of `dir`, directories first then by name
fn list_children(dir: &Path) -> io::Result<Listing> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => return Ok(Listing::Denied),
        Err(e) => return Err(e),
    };

    let mut entries = Vec::new();
    for dir_entry in read_dir {
        let dir_entry = match dir_entry {
            Ok(dir_entry) => dir_entry,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => return Ok(Listing::Denied),
            Err(e) => return Err(e),
        };

        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let path = dir_entry.path();
        let is_dir = fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false);
        entries.push(Entry { name, path, is_dir });
    }

    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(Listing::Entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_vault() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("B/inner")).unwrap();
        fs::create_dir_all(root.join("A")).unwrap();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join("readme.md"), "hi").unwrap();
        fs::write(root.join(".hidden.md"), "secret").unwrap();
        fs::write(root.join("A/note.md"), "n").unwrap();
        fs::write(root.join("B/inner/deep.md"), "d").unwrap();
        fs::create_dir_all(root.join("B/inner/.obsidian")).unwrap();
        dir
    }

    fn root_name(dir: &TempDir) -> String {
        dir.path().file_name().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn test_render_with_files() {
        let dir = sample_vault();
        let tree = render_path(dir.path(), true).unwrap();

        let expected = format!(
            "{}/\n├──A/\n│   └──note.md\n├──B/\n│   └──inner/\n│       └──deep.md\n└──readme.md",
            root_name(&dir)
        );
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_render_directories_only() {
        let dir = sample_vault();
        let tree = render_path(dir.path(), false).unwrap();

        let expected = format!("{}/\n├──A/\n├──B/\n│   └──inner/", root_name(&dir));
        assert_eq!(tree, expected);
        assert!(!tree.contains("readme.md"));
    }

    #[test]
    fn test_hidden_files_still_shape_connectors() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("A/sub")).unwrap();
        fs::write(dir.path().join("A/z.md"), "").unwrap();
        fs::create_dir(dir.path().join("B")).unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();

        let tree = render_path(dir.path(), false).unwrap();
        let lines: Vec<&str> = tree.lines().skip(1).collect();
        assert_eq!(lines, vec!["├──A/", "│   ├──sub/", "├──B/"]);
    }

    #[test]
    fn test_hidden_entries_never_shown() {
        let dir = sample_vault();
        for include_files in [true, false] {
            let tree = render_path(dir.path(), include_files).unwrap();
            assert!(!tree.contains(".git"));
            assert!(!tree.contains(".obsidian"));
            assert!(!tree.contains(".hidden"));
        }
    }

    #[test]
    fn test_directories_before_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "").unwrap();
        fs::create_dir(dir.path().join("z")).unwrap();

        let tree = render_path(dir.path(), true).unwrap();
        let lines: Vec<&str> = tree.lines().skip(1).collect();
        assert_eq!(lines, vec!["├──z/", "└──a.md"]);
    }

    #[test]
    fn test_empty_vault() {
        let dir = TempDir::new().unwrap();
        let tree = render_path(dir.path(), true).unwrap();
        assert_eq!(tree, format!("{}/", root_name(&dir)));
    }

    #[test]
    fn test_render_is_deterministic() {
        let dir = sample_vault();
        let first = render_path(dir.path(), true).unwrap();
        let second = render_path(dir.path(), true).unwrap();
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_not_followed() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real/file.md"), "").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("real/loop")).unwrap();

        let tree = render_path(dir.path(), true).unwrap();
        let expected = format!(
            "{}/\n└──real/\n    ├──loop/\n    └──file.md",
            root_name(&dir)
        );
        assert_eq!(tree, expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_contents_listed() {
        let target = TempDir::new().unwrap();
        fs::write(target.path().join("shared.md"), "").unwrap();
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(target.path(), dir.path().join("Linked")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("broken")).unwrap();

        let tree = render_path(dir.path(), true).unwrap();
        let expected = format!(
            "{}/\n├──Linked/\n│   └──shared.md\n└──broken",
            root_name(&dir)
        );
        assert_eq!(tree, expected);
    }

    fn entry(parent: &Path, name: &str, is_dir: bool) -> Entry {
        Entry {
            name: name.to_string(),
            path: parent.join(name),
            is_dir,
        }
    }

    #[test]
    fn test_denied_root_is_an_error() {
        let root = Path::new("/vaultgate-test/vault");
        let result = render_with(root, "vault", true, |_| Ok(Listing::Denied));
        assert_eq!(result.unwrap_err(), ToolError::PermissionDenied(root.to_path_buf()));
    }

    #[test]
    fn test_denied_subtree_pruned() {
        let root = Path::new("/vaultgate-test/vault");
        let locked = root.join("locked");
        let open = root.join("open");

        let tree = render_with(root, "vault", true, |dir| {
            if dir == root {
                Ok(Listing::Entries(vec![
                    entry(root, "locked", true),
                    entry(root, "open", true),
                    entry(root, "a.md", false),
                ]))
            } else if dir == locked {
                Ok(Listing::Denied)
            } else if dir == open {
                Ok(Listing::Entries(vec![entry(&open, "inside.md", false)]))
            } else {
                panic!("unexpected listing of {:?}", dir);
            }
        })
        .unwrap();

        assert_eq!(tree, "vault/\n├──locked/\n├──open/\n│   └──inside.md\n└──a.md");
    }

    #[test]
    fn test_subtree_io_error_aborts() {
        let root = Path::new("/vaultgate-test/vault");
        let result = render_with(root, "vault", true, |dir| {
            if dir == root {
                Ok(Listing::Entries(vec![entry(root, "flaky", true)]))
            } else {
                Err(io::Error::new(io::ErrorKind::Other, "device went away"))
            }
        });

        assert_eq!(
            result.unwrap_err(),
            ToolError::Traversal("device went away".to_string())
        );
    }

    #[tokio::test]
    async fn test_renderer_unknown_vault() {
        let renderer = TreeRenderer::new(Arc::new(VaultRegistry::default()));
        let result = renderer.render("nope", true).await;

        assert_eq!(result.tree, "");
        assert_eq!(result.error, "Unknown vault: nope. Available vaults: ");
    }

    #[tokio::test]
    async fn test_renderer_known_vault() {
        let dir = sample_vault();
        let mut map = BTreeMap::new();
        map.insert("notes".to_string(), dir.path().to_path_buf());
        let renderer = TreeRenderer::new(Arc::new(VaultRegistry::new(map).unwrap()));

        let result = renderer.render("notes", false).await;
        assert_eq!(result.error, "");
        assert!(result.tree.ends_with("├──B/\n│   └──inner/"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_renderer_header_uses_configured_name() {
        let dir = sample_vault();
        let links = TempDir::new().unwrap();
        let link = links.path().join("My Notes");
        std::os::unix::fs::symlink(dir.path(), &link).unwrap();

        let mut map = BTreeMap::new();
        map.insert("notes".to_string(), link);
        let renderer = TreeRenderer::new(Arc::new(VaultRegistry::new(map).unwrap()));

        let result = renderer.render("notes", true).await;
        assert_eq!(result.error, "");
        assert!(result.tree.starts_with("My Notes/\n├──A/"));
    }
}
