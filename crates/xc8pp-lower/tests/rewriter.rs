//! Locating and rewriting the bodies of a small sketch end to end.

use xc8pp_common::SourceCorpus;
use xc8pp_frontend::{parse_dump, DeclEvent};
use xc8pp_lower::{Locator, Rewriter, Scope};
use xc8pp_model::{ModelBuilder, ProgramModel};

const LED_CPP: &str = r#"class Led {
    bool state;
public:
    Led() : state(false) {}
    void on() { state=true; }
    bool isOn() const { return state; }
    void set(bool newState);
};

void Led::set(bool newState) {
    state = newState; // "{" stays balanced
}

int main() {
    Led led;
    led.on();
    puts("true");
}
"#;

const LED_DUMP: &str = "\
TranslationUnitDecl 0x1 <<invalid sloc>> <invalid sloc>
|-CXXRecordDecl 0x10 </src/led.cpp:1:1, line:8:1> line:1:7 referenced class Led definition
| |-CXXRecordDecl 0x11 <col:1, col:7> col:7 implicit referenced class Led
| |-FieldDecl 0x12 <line:2:5, col:10> col:10 referenced state 'bool'
| |-AccessSpecDecl 0x13 <line:3:1, col:7> col:1 public
| |-CXXConstructorDecl 0x14 <line:4:5, col:27> col:5 used Led 'void ()' implicit-inline
| | |-CXXCtorInitializer Field 0x12 'state' 'bool'
| | `-CompoundStmt 0x16 <col:26, col:27>
| |-CXXMethodDecl 0x17 <line:5:5, col:33> col:10 used on 'void ()' implicit-inline
| | `-CompoundStmt 0x18 <col:15, col:33>
| |-CXXMethodDecl 0x19 <line:6:5, col:40> col:10 isOn 'bool () const' implicit-inline
| | `-CompoundStmt 0x20 <col:23, col:40>
| `-CXXMethodDecl 0x21 <line:7:5, col:30> col:10 set 'void (bool)'
|   `-ParmVarDecl 0x22 <col:14, col:19> col:19 newState 'bool'
|-CXXMethodDecl 0x23 parent 0x10 prev 0x21 <line:10:1, line:12:1> line:10:11 set 'void (bool)'
| |-ParmVarDecl 0x24 <col:15, col:20> col:20 used newState 'bool'
| `-CompoundStmt 0x25 <col:30, line:12:1>
`-FunctionDecl 0x30 <line:14:1, line:18:1> line:14:5 main 'int ()'
  `-CompoundStmt 0x31 <col:12, line:18:1>
    `-DeclStmt 0x32 <line:15:5, col:12>
      `-VarDecl 0x33 <col:5, col:9> col:9 used led 'Led' callinit
";

fn led_program() -> ProgramModel {
    let mut model = ModelBuilder::new()
        .absorb(parse_dump(LED_DUMP))
        .finish()
        .unwrap();
    let mut corpus = SourceCorpus::new();
    corpus.insert("/src/led.cpp", LED_CPP);
    let missing = Locator::new(&corpus).fill(&mut model);
    assert!(missing.is_empty(), "missing bodies: {missing:?}");
    model
}

fn rewritten_method(model: &ProgramModel, name: &str) -> String {
    let class = model.class("Led").unwrap();
    let method = class.method(name).unwrap();
    let body = method.body.as_ref().unwrap();
    Rewriter::for_callable(model, Some(class), method).rewrite(&body.text)
}

#[test]
fn test_led_method_bodies() {
    let model = led_program();
    assert_eq!(rewritten_method(&model, "on").trim(), "self->state = 1;");
    assert_eq!(rewritten_method(&model, "isOn").trim(), "return self->state;");

    let set = rewritten_method(&model, "set");
    assert!(set.contains("self->state = newState;"), "{set}");
    assert!(set.contains("// \"{\" stays balanced"));
}

#[test]
fn test_constructor_initializers() {
    let model = led_program();
    let class = model.class("Led").unwrap();
    let ctor = class.default_constructor().unwrap();
    let init_list = ctor.body.as_ref().and_then(|b| b.init_list.as_deref());
    assert_eq!(init_list, Some("state(false)"));

    let rewriter = Rewriter::for_callable(&model, Some(class), ctor);
    assert_eq!(
        rewriter.member_initializers(class, "state(false)"),
        vec!["self->state = 0;"]
    );
}

#[test]
fn test_main_instantiates_and_calls() {
    let model = led_program();
    let main = model.main.as_ref().unwrap();
    let body = &main.body.as_ref().unwrap().text;
    let out = Rewriter::for_callable(&model, None, main).rewrite(body);

    let init = out.find("Led led;\n    Led_init(&led);").unwrap();
    let call = out.find("Led_on(&led);").unwrap();
    assert!(init < call, "{out}");
    assert!(out.contains("puts(\"true\");"));
}

#[test]
fn test_boolean_literals_are_total() {
    let model = ProgramModel::default();
    let rewriter = Rewriter::new(&model, None, Scope::new());
    assert_eq!(
        rewriter.rewrite("ok = true && !false || istrue(true_value, falsey);"),
        "ok = 1 && !0 || istrue(true_value, falsey);"
    );
    assert_eq!(
        rewriter.rewrite("if (x == true) { y = false; } /* true */"),
        "if (x == 1) { y = 0; } /* true */"
    );
}

#[test]
fn test_enum_scope_stripping() {
    let mut builder = ModelBuilder::new();
    builder.apply(DeclEvent::EnumOpen {
        name: "Color".into(),
        scoped: true,
    });
    builder.apply(DeclEvent::EnumConstant {
        enum_name: "Color".into(),
        name: "RED".into(),
        value: Some(0),
    });
    let model = builder.finish().unwrap();
    let rewriter = Rewriter::new(&model, None, Scope::new());

    assert_eq!(rewriter.rewrite("c = Color::RED;"), "c = RED;");
    assert_eq!(rewriter.rewrite("c = RED;"), "c = RED;");
    assert_eq!(
        rewriter.rewrite("if (c != ::Color::RED) paint(REDUCED);"),
        "if (c != RED) paint(REDUCED);"
    );
}
