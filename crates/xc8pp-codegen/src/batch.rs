//! Batch output: a shared header plus one translation unit per input stem.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;
use xc8pp_model::{ClassModel, FunctionModel, ProgramModel};

use crate::emit::{guard_name, CWriter, Emitter};
use crate::{GenerateOptions, GeneratedFile};

fn stem_of(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// Which unit each class and function lands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLayout {
    stems: Vec<String>,
    class_stems: IndexMap<SmolStr, String>,
    main_stem: String,
}

impl BatchLayout {
    /// A class maps to the stem spelled like its name, else to the stem of
    /// the file declaring it. Each stem takes at most one class.
    pub fn new(model: &ProgramModel, inputs: &[PathBuf]) -> Self {
        let mut stems: Vec<String> = Vec::new();
        for stem in inputs.iter().filter_map(|p| stem_of(p)) {
            if !stems.contains(&stem) {
                stems.push(stem);
            }
        }

        let mut class_stems: IndexMap<SmolStr, String> = IndexMap::new();
        for class in model.classes.values() {
            let by_name = stems.iter().find(|s| s.eq_ignore_ascii_case(&class.name)).cloned();
            let by_origin = class
                .origin
                .as_deref()
                .and_then(stem_of)
                .filter(|s| stems.contains(s));
            let Some(stem) = by_name.or(by_origin) else {
                continue;
            };
            if class_stems.values().any(|taken| *taken == stem) {
                debug!(class = %class.name, stem, "stem already holds a class");
                continue;
            }
            class_stems.insert(class.name.clone(), stem);
        }

        let main_stem = model
            .main
            .as_ref()
            .and_then(|m| m.definition_file())
            .and_then(stem_of)
            .filter(|s| stems.contains(s))
            .or_else(|| {
                stems
                    .iter()
                    .find(|s| !class_stems.values().any(|taken| taken == *s))
                    .cloned()
            })
            .unwrap_or_else(|| "main".to_string());

        Self {
            stems,
            class_stems,
            main_stem,
        }
    }

    pub fn stems(&self) -> &[String] {
        &self.stems
    }

    pub fn main_stem(&self) -> &str {
        &self.main_stem
    }

    pub fn class_stem(&self, class: &str) -> Option<&str> {
        self.class_stems.get(class).map(String::as_str)
    }

    /// Class held by `stem`, if any.
    pub fn stem_class(&self, stem: &str) -> Option<&SmolStr> {
        self.class_stems
            .iter()
            .find(|(_, s)| s.as_str() == stem)
            .map(|(class, _)| class)
    }

    /// Unit of the file holding the definition, else the main unit.
    pub fn function_stem(&self, function: &FunctionModel) -> &str {
        function
            .definition_file()
            .and_then(stem_of)
            .and_then(|stem| self.stems.iter().find(|s| **s == stem))
            .map_or(self.main_stem.as_str(), String::as_str)
    }

    /// Every unit to write: the input stems, plus the main unit when no input owns it.
    fn units(&self) -> Vec<&str> {
        let mut units: Vec<&str> = self.stems.iter().map(String::as_str).collect();
        if !units.contains(&self.main_stem.as_str()) {
            units.push(&self.main_stem);
        }
        units
    }
}

/// Generate the shared header, the per-class headers and every unit.
pub fn generate_batch(
    model: &ProgramModel,
    inputs: &[PathBuf],
    options: &GenerateOptions,
) -> Vec<GeneratedFile> {
    let layout = BatchLayout::new(model, inputs);
    let emitter = Emitter::new(model, options);
    let classes = emitter.ordered_classes();
    let sources = inputs
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(", ");
    let mut files = Vec::new();

    let shared_stem = Path::new(&options.shared_header)
        .file_stem()
        .map_or_else(|| "shared_definitions".to_string(), |s| s.to_string_lossy().into_owned());
    let guard = guard_name(&shared_stem);
    let mut shared = CWriter::new();
    emitter.banner(&mut shared, &sources);
    shared.writeln(&format!("#ifndef {guard}"));
    shared.writeln(&format!("#define {guard}"));
    shared.blank();
    emitter.std_includes(&mut shared);
    shared.blank();
    emitter.xtal_default(&mut shared);
    shared.blank();
    emitter.enums(&mut shared);
    emitter.structs(&mut shared);
    for &class in &classes {
        emitter.class_prototypes(&mut shared, class);
        shared.blank();
    }
    emitter.free_prototypes(&mut shared);
    shared.blank();
    emitter.extern_globals(&mut shared);
    shared.blank();
    shared.writeln(&format!("#endif /* {guard} */"));
    files.push(GeneratedFile {
        name: options.shared_header.clone(),
        contents: shared.finish(),
    });

    for &class in &classes {
        let Some(stem) = layout.class_stem(&class.name) else {
            continue;
        };
        let guard = guard_name(stem);
        let mut h = CWriter::new();
        emitter.banner(&mut h, &sources);
        h.writeln(&format!("#ifndef {guard}"));
        h.writeln(&format!("#define {guard}"));
        h.blank();
        h.writeln(&format!("#include \"{}\"", options.shared_header));
        h.blank();
        emitter.class_prototypes(&mut h, class);
        h.blank();
        h.writeln(&format!("#endif /* {guard} */"));
        files.push(GeneratedFile {
            name: format!("{stem}.h"),
            contents: h.finish(),
        });
    }

    for stem in layout.units() {
        let is_main = stem == layout.main_stem();
        let unit_classes: Vec<&ClassModel> = classes
            .iter()
            .copied()
            .filter(|c| match layout.class_stem(&c.name) {
                Some(owner) => owner == stem,
                None => is_main,
            })
            .collect();
        let functions: Vec<&FunctionModel> = model
            .functions
            .values()
            .flat_map(|s| s.signatures.iter())
            .filter(|f| layout.function_stem(f) == stem)
            .collect();
        let main = model.main.as_ref().filter(|_| is_main);
        let owns_input = layout.stems().iter().any(|s| s == stem);
        let empty = unit_classes.is_empty() && functions.is_empty() && main.is_none();
        if !owns_input && empty && model.globals.is_empty() {
            continue;
        }

        let mut c = CWriter::new();
        emitter.banner(&mut c, &sources);
        emitter.device_include(&mut c);
        c.writeln(&format!("#include \"{}\"", options.shared_header));
        if layout.stem_class(stem).is_some() {
            c.writeln(&format!("#include \"{stem}.h\""));
        }
        c.blank();
        if is_main {
            emitter.global_definitions(&mut c);
            c.blank();
        }
        for class in unit_classes {
            emitter.class_functions(&mut c, class);
        }
        for function in functions {
            emitter.free_function(&mut c, function);
        }
        if let Some(main) = main {
            emitter.main(&mut c, main);
        }
        debug!(stem, is_main, "generated batch unit");
        files.push(GeneratedFile {
            name: format!("{stem}.c"),
            contents: c.finish(),
        });
    }
    files
}
