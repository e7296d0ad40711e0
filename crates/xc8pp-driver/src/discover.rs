//! Which files one run reads.

use std::path::{Path, PathBuf};

use xc8pp_common::FileKind;

/// Files sharing `path`'s stem with the other role: `led.cpp` finds `led.h`.
pub fn stem_siblings(path: &Path) -> Vec<PathBuf> {
    let extensions = match FileKind::from_path(path) {
        FileKind::Implementation => FileKind::HEADER_EXTENSIONS,
        FileKind::Header => FileKind::IMPL_EXTENSIONS,
        FileKind::Other => return Vec::new(),
    };
    extensions
        .iter()
        .map(|ext| path.with_extension(ext))
        .filter(|p| p.is_file())
        .collect()
}

/// The inputs followed by their stem siblings, without duplicates.
pub fn related_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    for input in inputs {
        for path in std::iter::once(input.clone()).chain(stem_siblings(input)) {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }
    files
}

/// Existing files named by `#include "..."` in `content`, resolved next to `from`.
pub fn quoted_includes(from: &Path, content: &str) -> Vec<PathBuf> {
    let dir = from.parent().unwrap_or(Path::new(""));
    content
        .lines()
        .filter_map(|line| {
            let rest = line.trim_start().strip_prefix('#')?;
            let rest = rest.trim_start().strip_prefix("include")?;
            let rest = rest.trim_start().strip_prefix('"')?;
            rest.split('"').next()
        })
        .map(|name| dir.join(name))
        .filter(|p| p.is_file())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_related_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["led.cpp", "led.h", "main.cpp", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let led = dir.path().join("led.cpp");
        let main = dir.path().join("main.cpp");
        let header = dir.path().join("led.h");

        assert_eq!(stem_siblings(&led), vec![header.clone()]);
        assert_eq!(stem_siblings(&header), vec![led.clone()]);
        assert!(stem_siblings(&dir.path().join("notes.txt")).is_empty());

        let files = related_files(&[main.clone(), led.clone(), header.clone()]);
        assert_eq!(files, vec![main, led, header]);
    }

    #[test]
    fn test_quoted_includes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("led.h"), "").unwrap();
        let main = dir.path().join("main.cpp");
        let content = "#include <xc.h>\n#include \"led.h\"\n  #  include \"missing.h\"\n// #include \"led.h\"\n";
        assert_eq!(quoted_includes(&main, content), vec![dir.path().join("led.h")]);
    }
}
