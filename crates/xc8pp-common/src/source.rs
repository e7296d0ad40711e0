use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Role of a source file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Header,
    Implementation,
    /// Plain C sources and anything else the translator only reads.
    Other,
}

impl FileKind {
    pub const HEADER_EXTENSIONS: &'static [&'static str] = &["hpp", "h", "hxx"];
    pub const IMPL_EXTENSIONS: &'static [&'static str] = &["cpp", "cc", "cxx", "c++"];

    pub fn from_extension(ext: &str) -> Self {
        if Self::HEADER_EXTENSIONS.contains(&ext) {
            FileKind::Header
        } else if Self::IMPL_EXTENSIONS.contains(&ext) {
            FileKind::Implementation
        } else {
            FileKind::Other
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(FileKind::Other)
    }
}

/// A source file with its contents.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
    pub kind: FileKind,
}

impl SourceFile {
    pub fn new(path: PathBuf, content: String) -> Self {
        let kind = FileKind::from_path(&path);

        Self {
            path,
            content,
            kind,
        }
    }

    /// File name without directories, e.g. `led.cpp`.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Every source text one run may search for bodies, keyed by path.
///
/// Loaded once at the start of a run and never mutated during generation.
#[derive(Debug, Default, Clone)]
pub struct SourceCorpus {
    files: IndexMap<PathBuf, SourceFile>,
}

impl SourceCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file's text.
    pub fn insert(&mut self, path: impl AsRef<Path>, content: impl Into<String>) -> &SourceFile {
        let path = path.as_ref().to_path_buf();
        let file = SourceFile::new(path.clone(), content.into());
        let index = self.files.insert_full(path, file).0;
        &self.files[index]
    }

    /// Read a file from disk into the corpus.
    pub fn load(&mut self, path: impl AsRef<Path>) -> std::io::Result<&SourceFile> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Ok(self.insert(path, content))
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&SourceFile> {
        self.files.get(path.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(|p| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind() {
        assert_eq!(FileKind::from_path(Path::new("led.hpp")), FileKind::Header);
        assert_eq!(FileKind::from_path(Path::new("led.cpp")), FileKind::Implementation);
        assert_eq!(FileKind::from_path(Path::new("pin_manager.c")), FileKind::Other);
    }

    #[test]
    fn test_corpus_keeps_insertion_order() {
        let mut corpus = SourceCorpus::new();
        corpus.insert("b.cpp", "");
        corpus.insert("a.hpp", "");
        let names: Vec<_> = corpus.iter().map(|f| f.file_name().to_string()).collect();
        assert_eq!(names, vec!["b.cpp", "a.hpp"]);
        assert_eq!(corpus.get("a.hpp").map(|f| f.kind), Some(FileKind::Header));
        assert_eq!(corpus.len(), 2);
    }
}
