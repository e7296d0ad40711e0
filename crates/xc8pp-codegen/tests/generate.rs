//! Generating a whole program from declaration events and its source.

use std::path::PathBuf;

use xc8pp_codegen::{generate_unit, GenerateOptions, GeneratedFile};
use xc8pp_common::SourceCorpus;
use xc8pp_frontend::{CallableDecl, DeclEvent, ParamDecl, RecordKeyword};
use xc8pp_lower::Locator;
use xc8pp_model::{ModelBuilder, ProgramModel};

const APP_CPP: &str = r#"enum class Mode { IDLE, RUN = 4 };

class Led {
    bool state;
    Mode mode;
public:
    Led() : state(false) {}
    Led(bool initial) { state = initial; }
    void on() { state=true; }
    bool isOn() const { return state; }
    uint8_t level();
};

class Panel {
    Led power;
    Led *spare;
public:
    void start() {
        if (!power.isOn()) {
            power.on();
        }
    }
};

Led status(true);
int counter = 5;

void log(int x) { counter = x; }
void log(int x, int y) { counter = x + y; }

int main() {
    Panel panel;
    panel.start();
    log(1);
    log(1, 2);
    return 0;
}
"#;

fn decl(name: &str, raw_type: &str, params: &[(&str, &str)], is_definition: bool) -> CallableDecl {
    CallableDecl {
        name: name.into(),
        raw_type: raw_type.into(),
        params: params
            .iter()
            .map(|(n, t)| ParamDecl {
                name: Some((*n).into()),
                ty: (*t).to_string(),
            })
            .collect(),
        is_definition,
        origin: Some(PathBuf::from("/src/app.cpp")),
        ..Default::default()
    }
}

fn class_open(name: &str) -> DeclEvent {
    DeclEvent::ClassOpen {
        name: name.into(),
        keyword: RecordKeyword::Class,
        origin: Some(PathBuf::from("/src/app.cpp")),
    }
}

fn field(class: &str, name: &str, ty: &str) -> DeclEvent {
    DeclEvent::Field {
        class: class.into(),
        name: name.into(),
        raw_type: ty.into(),
    }
}

fn method(class: &str, decl: CallableDecl) -> DeclEvent {
    DeclEvent::Method {
        class: class.into(),
        decl,
    }
}

fn program() -> ProgramModel {
    let events = vec![
        DeclEvent::EnumOpen {
            name: "Mode".into(),
            scoped: true,
        },
        DeclEvent::EnumConstant {
            enum_name: "Mode".into(),
            name: "IDLE".into(),
            value: None,
        },
        DeclEvent::EnumConstant {
            enum_name: "Mode".into(),
            name: "RUN".into(),
            value: Some(4),
        },
        class_open("Led"),
        field("Led", "state", "bool"),
        field("Led", "mode", "Mode"),
        DeclEvent::Constructor {
            class: "Led".into(),
            decl: decl("Led", "void ()", &[], true),
        },
        DeclEvent::Constructor {
            class: "Led".into(),
            decl: decl("Led", "void (bool)", &[("initial", "bool")], true),
        },
        method("Led", decl("on", "void ()", &[], true)),
        method("Led", decl("isOn", "bool () const", &[], true)),
        method("Led", decl("level", "uint8_t ()", &[], false)),
        class_open("Panel"),
        field("Panel", "power", "Led"),
        field("Panel", "spare", "Led *"),
        method("Panel", decl("start", "void ()", &[], true)),
        DeclEvent::GlobalVar {
            name: "status".into(),
            raw_type: "Led".into(),
            has_init: true,
        },
        DeclEvent::GlobalVar {
            name: "counter".into(),
            raw_type: "int".into(),
            has_init: true,
        },
        DeclEvent::Function(decl("log", "void (int)", &[("x", "int")], true)),
        DeclEvent::Function(decl("log", "void (int, int)", &[("x", "int"), ("y", "int")], true)),
        DeclEvent::Function(decl("main", "int ()", &[], true)),
    ];
    let mut model = ModelBuilder::new().absorb(events).finish().unwrap();
    let mut corpus = SourceCorpus::new();
    corpus.insert("/src/app.cpp", APP_CPP);
    let missing = Locator::new(&corpus).fill(&mut model);
    assert_eq!(missing, vec!["Led_level".to_string()]);
    model
}

fn generate() -> (GeneratedFile, GeneratedFile) {
    let mut files = generate_unit(&program(), "app", "app.cpp", &GenerateOptions::default());
    assert_eq!(files.len(), 2);
    let source = files.remove(1);
    let header = files.remove(0);
    (header, source)
}

#[test]
fn test_header() {
    let (header, _) = generate();
    assert_eq!(header.name, "app.h");
    assert!(header.is_header());
    let h = &header.contents;

    assert!(h.contains("#ifndef APP_H\n#define APP_H"));
    assert!(h.contains("#include <stdint.h>\n#include <stdbool.h>"));
    assert!(h.contains("typedef enum {\n    IDLE,\n    RUN = 4\n} Mode;"));
    assert!(h.contains("typedef struct Led {\n    bool state;\n    Mode mode;\n} Led;"));
    assert!(h.contains("typedef struct Panel {\n    Led power;\n    Led* spare;\n} Panel;"));
    assert!(h.find("typedef struct Led").unwrap() < h.find("typedef struct Panel").unwrap());

    for prototype in [
        "void Led_init(Led* self);",
        "void Led_init_b(Led* self, bool initial);",
        "void Led_on(Led* self);",
        "bool Led_isOn(Led* self);",
        "uint8_t Led_level(Led* self);",
        "void Led_cleanup(Led* self);",
        "void Panel_start(Panel* self);",
        "void log_i(int x);",
        "void log_i_i(int x, int y);",
        "extern Led status;",
        "extern int counter;",
    ] {
        assert!(h.contains(prototype), "missing `{prototype}` in\n{h}");
    }
    assert!(!h.contains("main"));
    assert!(h.trim_end().ends_with("#endif /* APP_H */"));
}

#[test]
fn test_class_functions() {
    let (_, source) = generate();
    let c = &source.contents;

    assert!(c.contains("#include <xc.h>\n#include \"app.h\""));
    assert!(c.contains(
        "void Led_init(Led* self) {\n    self->state = false;\n    self->mode = (Mode)0;\n    self->state = 0;\n}"
    ));
    assert!(c.contains(
        "void Led_init_b(Led* self, bool initial) {\n    Led_init(self);\n    self->state = initial;\n}"
    ));
    assert!(c.contains("void Led_on(Led* self) {\n    self->state = 1;\n}"));
    assert!(c.contains("bool Led_isOn(Led* self) {\n    return self->state;\n}"));
    assert!(c.contains("uint8_t Led_level(Led* self) {\n    return 0;\n}"));
    assert!(c.contains("void Led_cleanup(Led* self) {\n    (void)self;\n}"));

    assert!(c.contains("void Panel_init(Panel* self) {\n    Led_init(&self->power);\n    self->spare = 0;\n}"));
    assert!(c.contains(
        "void Panel_start(Panel* self) {\n    if (!Led_isOn(&self->power)) {\n        Led_on(&self->power);\n    }\n}"
    ));
}

#[test]
fn test_globals_overloads_and_main() {
    let (_, source) = generate();
    let c = &source.contents;

    assert!(c.contains("Led status;\nint counter = 5;"));
    assert!(c.contains("void log_i(int x) {\n    counter = x;\n}"));
    assert!(c.contains("void log_i_i(int x, int y) {\n    counter = x + y;\n}"));

    let main = &c[c.find("int main(void) {").unwrap()..];
    let expected = "int main(void) {\n    Led_init_b(&status, 1);\n    Panel panel;\n    Panel_init(&panel);\n    Panel_start(&panel);\n    log_i(1);\n    log_i_i(1, 2);\n    return 0;\n}";
    assert!(main.starts_with(expected), "{main}");
}

#[test]
fn test_without_device_header() {
    let options = GenerateOptions {
        device_header: false,
        ..Default::default()
    };
    let files = generate_unit(&ProgramModel::default(), "empty", "empty.cpp", &options);
    assert!(!files[1].contents.contains("<xc.h>"));
    assert!(files[0].contents.contains("#define _XTAL_FREQ 4000000"));
}
