//! C text emission for single model items.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use xc8pp_lower::{infer_missing_params, split_args, BindingKind, Rewriter, Scope};
use xc8pp_model::{
    CType, ClassModel, EnumModel, FunctionModel, GlobalVariable, ProgramModel, TypeCategory,
};

use crate::GenerateOptions;

/// Line-oriented writer with four-space indentation.
#[derive(Debug, Default)]
pub struct CWriter {
    output: String,
    indent: usize,
}

impl CWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writeln(&mut self, s: &str) {
        if !s.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str("    ");
            }
        }
        self.output.push_str(s);
        self.output.push('\n');
    }

    /// One empty line, never two in a row.
    pub fn blank(&mut self) {
        if !self.output.is_empty() && !self.output.ends_with("\n\n") {
            self.output.push('\n');
        }
    }

    pub fn finish(mut self) -> String {
        while self.output.ends_with("\n\n") {
            self.output.pop();
        }
        self.output
    }

    fn block(&mut self, open: &str, lines: &[String], close: &str) {
        self.writeln(open);
        self.indent += 1;
        for line in lines {
            self.writeln(line);
        }
        self.indent -= 1;
        self.writeln(close);
    }
}

fn columns(prefix: &str) -> usize {
    prefix.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

/// Re-base a body's lines: relative indentation kept, outermost level at zero.
/// Text sharing a line with the opening brace starts at zero as well.
pub fn reindent(body: &str) -> Vec<String> {
    let mut lines = body.lines();
    let first = lines.next().map(str::trim).filter(|l| !l.is_empty());
    let rest: Vec<&str> = lines.map(str::trim_end).collect();

    let margin = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| columns(&l[..l.len() - l.trim_start().len()]))
        .min()
        .unwrap_or(0);

    let mut out: Vec<String> = first.map(str::to_string).into_iter().collect();
    for line in rest {
        let content = line.trim_start();
        if content.is_empty() {
            out.push(String::new());
            continue;
        }
        let depth = columns(&line[..line.len() - content.len()]).saturating_sub(margin);
        out.push(format!("{}{content}", " ".repeat(depth)));
    }
    while out.last().is_some_and(String::is_empty) {
        out.pop();
    }
    while out.first().is_some_and(String::is_empty) {
        out.remove(0);
    }
    out
}

/// Upper-case guard macro for a file stem: `led` becomes `LED_H`.
pub fn guard_name(stem: &str) -> String {
    let mut guard: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    if guard.starts_with(|c: char| c.is_ascii_digit()) {
        guard.insert(0, '_');
    }
    guard.push_str("_H");
    guard
}

/// A callable ready for emission: C signature plus a rewriter for its body.
struct Lowered<'m> {
    ret: CType,
    c_name: String,
    params: Vec<String>,
    rewriter: Rewriter<'m>,
}

impl Lowered<'_> {
    fn signature(&self) -> String {
        let params = if self.params.is_empty() {
            "void".to_string()
        } else {
            self.params.join(", ")
        };
        format!("{} {}({params})", self.ret, self.c_name)
    }
}

/// Emits model items into a [`CWriter`].
pub struct Emitter<'m> {
    model: &'m ProgramModel,
    options: &'m GenerateOptions,
}

impl<'m> Emitter<'m> {
    pub fn new(model: &'m ProgramModel, options: &'m GenerateOptions) -> Self {
        Self { model, options }
    }

    pub fn banner(&self, w: &mut CWriter, source: &str) {
        w.writeln(&format!("/* Generated by xc8pp from {source}. Do not edit. */"));
    }

    pub fn std_includes(&self, w: &mut CWriter) {
        w.writeln("#include <stdint.h>");
        w.writeln("#include <stdbool.h>");
        w.writeln("#include <stddef.h>");
    }

    pub fn device_include(&self, w: &mut CWriter) {
        if self.options.device_header {
            w.writeln("#include <xc.h>");
        }
    }

    pub fn xtal_default(&self, w: &mut CWriter) {
        w.writeln("#ifndef _XTAL_FREQ");
        w.writeln(&format!("#define _XTAL_FREQ {}", self.options.xtal_freq));
        w.writeln("#endif");
    }

    pub fn enum_typedef(&self, w: &mut CWriter, model: &EnumModel) {
        let last = model.constants.len().saturating_sub(1);
        let lines: Vec<String> = model
            .constants
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let sep = if i == last { "" } else { "," };
                match c.value {
                    Some(value) => format!("{} = {value}{sep}", c.name),
                    None => format!("{}{sep}", c.name),
                }
            })
            .collect();
        w.block("typedef enum {", &lines, &format!("}} {};", model.name));
    }

    pub fn enums(&self, w: &mut CWriter) {
        for model in self.model.enums.values() {
            self.enum_typedef(w, model);
            w.blank();
        }
    }

    pub fn struct_typedef(&self, w: &mut CWriter, class: &ClassModel) {
        let mut lines: Vec<String> = class
            .fields
            .iter()
            .map(|f| format!("{};", CType::from_spelling(&f.ty, self.model).declare(&f.name)))
            .collect();
        if lines.is_empty() {
            lines.push("uint8_t _unused;".to_string());
        }
        w.block(
            &format!("typedef struct {} {{", class.name),
            &lines,
            &format!("}} {};", class.name),
        );
    }

    /// Classes with by-value class fields come after the classes they embed.
    pub fn ordered_classes(&self) -> Vec<&'m ClassModel> {
        fn visit<'m>(
            model: &'m ProgramModel,
            class: &'m ClassModel,
            seen: &mut FxHashSet<SmolStr>,
            out: &mut Vec<&'m ClassModel>,
        ) {
            if !seen.insert(class.name.clone()) {
                return;
            }
            for field in &class.fields {
                let ty = CType::from_spelling(&field.ty, model);
                if ty.is_pointer() {
                    continue;
                }
                if let Some(dep) = ty.class_name().and_then(|n| model.class(n)) {
                    visit(model, dep, seen, out);
                }
            }
            out.push(class);
        }

        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for class in self.model.classes.values() {
            visit(self.model, class, &mut seen, &mut out);
        }
        out
    }

    pub fn structs(&self, w: &mut CWriter) {
        for class in self.ordered_classes() {
            self.struct_typedef(w, class);
            w.blank();
        }
    }

    fn lower(&self, class: Option<&'m ClassModel>, function: &'m FunctionModel, receiver: bool) -> Lowered<'m> {
        let mut rewriter = Rewriter::for_callable(self.model, class, function);
        let mut params: Vec<String> = Vec::new();
        if let (Some(class), true) = (class, receiver) {
            params.push(format!("{}* self", class.name));
        }
        for (i, param) in function.params.iter().enumerate() {
            let ty = CType::from_spelling(&param.ty, self.model);
            params.push(ty.declare(&function.param_name(i)));
        }
        if let Some(body) = &function.body {
            for inferred in infer_missing_params(&body.text, rewriter.scope(), self.model) {
                let name = inferred.name.unwrap_or_default();
                let ty = CType::from_spelling(&inferred.ty, self.model);
                params.push(ty.declare(&name));
                rewriter.scope_mut().bind(name, BindingKind::Param, inferred.ty);
            }
        }
        Lowered {
            ret: function.return_type(self.model),
            c_name: function.c_name.to_string(),
            params,
            rewriter,
        }
    }

    fn lower_constructor(&self, class: &'m ClassModel, ctor: &'m FunctionModel) -> Lowered<'m> {
        let mut lowered = self.lower(Some(class), ctor, true);
        lowered.ret = CType::from_spelling("void", self.model);
        lowered
    }

    /// Rewritten body lines, or the default return when no body was found.
    fn body_lines(&self, lowered: &Lowered<'_>, function: &FunctionModel) -> Vec<String> {
        match &function.body {
            Some(body) => reindent(&lowered.rewriter.rewrite(&body.text)),
            None => lowered
                .ret
                .default_value()
                .map(|v| format!("return {v};"))
                .into_iter()
                .collect(),
        }
    }

    fn init_signature(&self, class: &ClassModel) -> String {
        format!("void {}({}* self)", class.init_name(), class.name)
    }

    fn cleanup_signature(&self, class: &ClassModel) -> String {
        format!("void {}({}* self)", class.cleanup_name(), class.name)
    }

    /// Prototypes for `_init`, constructors, methods and `_cleanup`.
    pub fn class_prototypes(&self, w: &mut CWriter, class: &'m ClassModel) {
        w.writeln(&format!("{};", self.init_signature(class)));
        for ctor in class.parameterized_constructors() {
            w.writeln(&format!("{};", self.lower_constructor(class, ctor).signature()));
        }
        for method in class.methods.values() {
            w.writeln(&format!("{};", self.lower(Some(class), method, !method.is_static).signature()));
        }
        w.writeln(&format!("{};", self.cleanup_signature(class)));
    }

    pub fn function_prototype(&self, w: &mut CWriter, function: &'m FunctionModel) {
        w.writeln(&format!("{};", self.lower(None, function, false).signature()));
    }

    pub fn free_prototypes(&self, w: &mut CWriter) {
        for function in self.model.functions.values().flat_map(|s| s.signatures.iter()) {
            self.function_prototype(w, function);
        }
    }

    /// Field zeroing, then the default constructor's initializers and body.
    fn init_lines(&self, class: &'m ClassModel) -> Vec<String> {
        let mut lines = Vec::new();
        for field in &class.fields {
            let ty = CType::from_spelling(&field.ty, self.model);
            let embedded = ty
                .class_name()
                .filter(|_| !ty.is_pointer() && ty.array.is_none())
                .and_then(|n| self.model.class(n));
            match (embedded, ty.zero_value()) {
                (Some(member), _) => {
                    lines.push(format!("{}(&self->{});", member.init_name(), field.name));
                }
                (None, Some(zero)) => lines.push(format!("self->{} = {zero};", field.name)),
                (None, None) => {}
            }
        }
        if let Some(ctor) = class.default_constructor() {
            lines.extend(self.constructor_lines(class, ctor));
        }
        lines
    }

    fn constructor_lines(&self, class: &'m ClassModel, ctor: &'m FunctionModel) -> Vec<String> {
        let lowered = self.lower_constructor(class, ctor);
        let mut lines = Vec::new();
        if let Some(body) = &ctor.body {
            if let Some(init_list) = &body.init_list {
                lines.extend(lowered.rewriter.member_initializers(class, init_list));
            }
            lines.extend(reindent(&lowered.rewriter.rewrite(&body.text)));
        }
        lines
    }

    /// `_init`, parameterized constructors, methods and `_cleanup` of one class.
    pub fn class_functions(&self, w: &mut CWriter, class: &'m ClassModel) {
        w.block(
            &format!("{} {{", self.init_signature(class)),
            &self.init_lines(class),
            "}",
        );
        w.blank();

        for ctor in class.parameterized_constructors() {
            let lowered = self.lower_constructor(class, ctor);
            let mut lines = vec![format!("{}(self);", class.init_name())];
            lines.extend(self.constructor_lines(class, ctor));
            w.block(&format!("{} {{", lowered.signature()), &lines, "}");
            w.blank();
        }

        for method in class.methods.values() {
            let lowered = self.lower(Some(class), method, !method.is_static);
            let lines = self.body_lines(&lowered, method);
            w.block(&format!("{} {{", lowered.signature()), &lines, "}");
            w.blank();
        }

        w.block(
            &format!("{} {{", self.cleanup_signature(class)),
            &["(void)self;".to_string()],
            "}",
        );
        w.blank();
    }

    pub fn free_function(&self, w: &mut CWriter, function: &'m FunctionModel) {
        let lowered = self.lower(None, function, false);
        let lines = self.body_lines(&lowered, function);
        w.block(&format!("{} {{", lowered.signature()), &lines, "}");
        w.blank();
    }

    /// `main`, preceded by constructor calls for class-typed globals.
    pub fn main(&self, w: &mut CWriter, main: &'m FunctionModel) {
        let lowered = self.lower(None, main, false);
        let mut lines = self.global_constructors();
        lines.extend(self.body_lines(&lowered, main));
        w.block(&format!("{} {{", lowered.signature()), &lines, "}");
        w.blank();
    }

    fn global_class(&self, global: &GlobalVariable) -> Option<&'m ClassModel> {
        let ty = CType::from_spelling(&global.ty, self.model);
        match (&ty.category, ty.pointer, &ty.array) {
            (TypeCategory::Class(name), 0, None) => self.model.class(name),
            _ => None,
        }
    }

    fn global_constructors(&self) -> Vec<String> {
        let rewriter = Rewriter::new(self.model, None, Scope::new());
        self.model
            .globals
            .iter()
            .filter_map(|g| {
                let class = self.global_class(g)?;
                let args = g.init_args.as_deref().unwrap_or_default();
                Some(format!(
                    "{};",
                    rewriter.constructor_call(class, &format!("&{}", g.name), args)
                ))
            })
            .collect()
    }

    pub fn extern_globals(&self, w: &mut CWriter) {
        for global in &self.model.globals {
            let ty = CType::from_spelling(&global.ty, self.model);
            w.writeln(&format!("extern {};", ty.declare(&global.name)));
        }
    }

    pub fn global_definitions(&self, w: &mut CWriter) {
        let rewriter = Rewriter::new(self.model, None, Scope::new());
        for global in &self.model.globals {
            let ty = CType::from_spelling(&global.ty, self.model);
            let declaration = ty.declare(&global.name);
            let init = global
                .init_args
                .as_deref()
                .filter(|_| self.global_class(global).is_none())
                .map(|args| {
                    let value = rewriter.rewrite(args);
                    // Arrays keep their braces even with one element; string literals don't need them.
                    let array_list = ty.array.is_some() && !args.trim_start().starts_with('"');
                    if array_list || split_args(args).len() > 1 {
                        format!(" = {{{value}}}")
                    } else {
                        format!(" = {value}")
                    }
                })
                .unwrap_or_default();
            w.writeln(&format!("{declaration}{init};"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindent() {
        let body = "\n        if (x) {\n            y();\n        }\n\n        z();\n    ";
        assert_eq!(reindent(body), vec!["if (x) {", "    y();", "}", "", "z();"]);
        assert_eq!(reindent(" a = 1; "), vec!["a = 1;"]);
        assert_eq!(reindent(" a();\n\tb();\n"), vec!["a();", "b();"]);
    }

    #[test]
    fn test_guard_name() {
        assert_eq!(guard_name("led"), "LED_H");
        assert_eq!(guard_name("shared_definitions"), "SHARED_DEFINITIONS_H");
        assert_eq!(guard_name("7seg-display"), "_7SEG_DISPLAY_H");
    }

    #[test]
    fn test_writer_blank_lines() {
        let mut w = CWriter::new();
        w.blank();
        w.writeln("a");
        w.blank();
        w.blank();
        w.writeln("b");
        w.blank();
        assert_eq!(w.finish(), "a\n\nb\n");
    }
}
