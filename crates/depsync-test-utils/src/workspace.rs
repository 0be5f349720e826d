//! [`TestWorkspace`] builder for depsync test scenarios.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Default manifest file name.
pub const MANIFEST: &str = "depsync-manifest.toml";

/// A temporary workspace with helpers for writing inputs and inspecting
/// outputs. All paths are relative to the workspace root and use `/`.
///
/// # Example
///
/// ```rust,no_run
/// use depsync_test_utils::TestWorkspace;
///
/// let ws = TestWorkspace::new();
/// ws.manifest("", "[package]\nname = \"app\"\nversion = \"0.1.0\"\n")
///     .registry_package("log", "1.0.0", "");
/// ws.assert_file_exists("depsync-manifest.toml");
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// Create an empty temporary workspace.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("Could not write {}: {e}", path.display()));
        self
    }

    /// Write a manifest into `dir` ("" for the root).
    pub fn manifest(&self, dir: &str, content: &str) -> &Self {
        self.write(&join(dir, MANIFEST), content)
    }

    /// Write a package manifest with string-form dependencies.
    pub fn package(&self, dir: &str, name: &str, version: &str, deps: &[(&str, &str)]) -> &Self {
        let mut content = format!("[package]\nname = \"{name}\"\nversion = \"{version}\"\n");
        if !deps.is_empty() {
            content.push_str("\n[dependencies]\n");
            for (dep, constraint) in deps {
                content.push_str(&format!("{dep} = \"{constraint}\"\n"));
            }
        }
        self.manifest(dir, &content)
    }

    /// Write a raw registry index entry at `registry/<name>.toml`.
    pub fn registry_entry(&self, name: &str, content: &str) -> &Self {
        self.write(&format!("registry/{name}.toml"), content)
    }

    /// Write a registry entry with a single version. `extra` is appended
    /// inside the version table (for example `[[versions.dependencies]]`
    /// blocks).
    pub fn registry_package(&self, name: &str, version: &str, extra: &str) -> &Self {
        self.registry_versions(name, &[(version, extra)])
    }

    /// Write a registry entry with several versions.
    pub fn registry_versions(&self, name: &str, versions: &[(&str, &str)]) -> &Self {
        let mut content = format!("name = \"{name}\"\n");
        for (version, extra) in versions {
            content.push_str(&format!("\n[[versions]]\nversion = \"{version}\"\n"));
            if !extra.is_empty() {
                content.push_str(extra);
                if !extra.ends_with('\n') {
                    content.push('\n');
                }
            }
        }
        self.registry_entry(name, &content)
    }

    /// Write `depsync.toml`.
    pub fn config(&self, content: &str) -> &Self {
        self.write("depsync.toml", content)
    }

    pub fn remove(&self, relative: &str) -> &Self {
        fs::remove_file(self.path(relative)).unwrap();
        self
    }

    pub fn read(&self, relative: &str) -> String {
        let path = self.path(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", path.display()))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Every file under the root with its content, keyed by relative path.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        collect(self.root(), self.root(), &mut files);
        files
    }

    /// Files under the root whose name is `file_name`.
    pub fn files_named(&self, file_name: &str) -> Vec<String> {
        self.snapshot()
            .into_keys()
            .filter(|p| p.rsplit('/').next() == Some(file_name))
            .collect()
    }

    pub fn assert_file_exists(&self, relative: &str) {
        let path = self.path(relative);
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }

    pub fn assert_file_not_exists(&self, relative: &str) {
        let path = self.path(relative);
        assert!(!path.exists(), "Expected file NOT to exist: {}", path.display());
    }

    pub fn assert_file_contains(&self, relative: &str, expected: &str) {
        let content = self.read(relative);
        assert!(
            content.contains(expected),
            "File {relative} does not contain expected content.\nExpected: {expected}\nActual: {content}"
        );
    }
}

fn join(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{}/{file}", dir.trim_end_matches('/'))
    }
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) {
    let mut entries: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let relative = path
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(relative, fs::read_to_string(&path).unwrap_or_default());
        }
    }
}
