//! Single-file output: `<stem>.h` and `<stem>.c`.

use tracing::debug;
use xc8pp_model::ProgramModel;

use crate::emit::{guard_name, CWriter, Emitter};
use crate::{GenerateOptions, GeneratedFile};

/// Generate the header and source for `model`. `source` names the input in the banner.
pub fn generate_unit(
    model: &ProgramModel,
    stem: &str,
    source: &str,
    options: &GenerateOptions,
) -> Vec<GeneratedFile> {
    let emitter = Emitter::new(model, options);
    let header_name = format!("{stem}.h");
    let guard = guard_name(stem);

    let mut h = CWriter::new();
    emitter.banner(&mut h, source);
    h.writeln(&format!("#ifndef {guard}"));
    h.writeln(&format!("#define {guard}"));
    h.blank();
    emitter.std_includes(&mut h);
    h.blank();
    emitter.xtal_default(&mut h);
    h.blank();
    emitter.enums(&mut h);
    emitter.structs(&mut h);
    for class in emitter.ordered_classes() {
        emitter.class_prototypes(&mut h, class);
        h.blank();
    }
    emitter.free_prototypes(&mut h);
    h.blank();
    emitter.extern_globals(&mut h);
    h.blank();
    h.writeln(&format!("#endif /* {guard} */"));

    let mut c = CWriter::new();
    emitter.banner(&mut c, source);
    emitter.device_include(&mut c);
    c.writeln(&format!("#include \"{header_name}\""));
    c.blank();
    emitter.global_definitions(&mut c);
    c.blank();
    for class in emitter.ordered_classes() {
        emitter.class_functions(&mut c, class);
    }
    for function in model.functions.values().flat_map(|s| s.signatures.iter()) {
        emitter.free_function(&mut c, function);
    }
    if let Some(main) = &model.main {
        emitter.main(&mut c, main);
    }

    debug!(stem, classes = model.classes.len(), "generated unit");
    vec![
        GeneratedFile {
            name: header_name,
            contents: h.finish(),
        },
        GeneratedFile {
            name: format!("{stem}.c"),
            contents: c.finish(),
        },
    ]
}
