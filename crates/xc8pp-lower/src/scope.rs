//! Per-callable symbol table.
//!
//! Names visible inside a body are resolved once, before rewriting:
//! receiver fields, then parameters and locals, which shadow fields.
//! A local declared in the body under a field's name is left out of the
//! table; the rewriter shadows it only inside its own block.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use xc8pp_model::types::mangle_tag;
use xc8pp_model::{ClassModel, FunctionModel, ParamModel, ProgramModel, TypeEnv};

use crate::lexer::{join_tokens, significant, tokenize, Token};

/// Parameter names bodies use without the declaration reporting them.
const INFERRED_PARAMS: &[(&str, &str)] = &[
    ("milliseconds", "unsigned int"),
    ("newState", "bool"),
    ("count", "unsigned int"),
    ("delayMs", "unsigned int"),
    ("rawPressed", "bool"),
    ("rawState", "bool"),
];

/// Words that start a statement but never a declaration.
const STATEMENT_KEYWORDS: &[&str] = &[
    "return", "delete", "goto", "case", "else", "do", "sizeof", "new", "throw",
];

const DECL_QUALIFIERS: &[&str] = &["static", "const", "volatile", "register", "constexpr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Field,
    Param,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
    /// Type spelling, as reported or as written.
    pub ty: String,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: FxHashMap<SmolStr, Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything visible in `function`'s body.
    pub fn for_callable(
        model: &ProgramModel,
        class: Option<&ClassModel>,
        function: &FunctionModel,
    ) -> Self {
        let mut scope = Self::new();
        for field in class.into_iter().flat_map(|c| c.fields.iter()) {
            scope.bind(field.name.clone(), BindingKind::Field, field.ty.clone());
        }
        for (i, param) in function.params.iter().enumerate() {
            scope.bind(function.param_name(i), BindingKind::Param, param.ty.clone());
        }
        let scanned = function
            .body
            .as_ref()
            .map(|body| scan_locals(&body.text, model))
            .unwrap_or_default();
        for local in &function.locals {
            let positioned = scanned.iter().any(|(name, _)| *name == local.name);
            if !(positioned && scope.is_field(&local.name)) {
                scope.bind(local.name.clone(), BindingKind::Local, local.ty.clone());
            }
        }
        for (name, ty) in scanned {
            if !scope.is_field(&name) {
                scope.bind(name, BindingKind::Local, ty);
            }
        }
        scope
    }

    /// Parameters and locals shadow fields; otherwise the first binding stays.
    pub fn bind(&mut self, name: impl Into<SmolStr>, kind: BindingKind, ty: impl Into<String>) {
        let name = name.into();
        let replace = match self.bindings.get(&name) {
            None => true,
            Some(existing) => existing.kind == BindingKind::Field && kind != BindingKind::Field,
        };
        if replace {
            self.bindings.insert(
                name,
                Binding {
                    kind,
                    ty: ty.into(),
                },
            );
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// A receiver field not shadowed by a parameter or local.
    pub fn is_field(&self, name: &str) -> bool {
        self.lookup(name)
            .is_some_and(|b| b.kind == BindingKind::Field)
    }

    /// Bound as a parameter or local.
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.lookup(name)
            .is_some_and(|b| b.kind != BindingKind::Field)
    }

    pub fn variable_type(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|b| b.ty.as_str())
    }
}

/// Bare type name of a spelling: `const hw::Led &` is `Led`.
fn base_name(ty: &str) -> &str {
    ty.split(|c: char| c.is_whitespace() || c == '*' || c == '&')
        .filter(|w| !w.is_empty() && !DECL_QUALIFIERS.contains(w))
        .last()
        .map(|w| w.rsplit("::").next().unwrap_or(w))
        .unwrap_or_default()
}

fn is_known_type(ty: &str, env: &dyn TypeEnv) -> bool {
    let base = base_name(ty);
    base != "void" && (mangle_tag(ty) != 'x' || env.is_class(base) || env.is_enum(base))
}

/// Local declarations at statement starts: `Led led;`, `unsigned int i = 0`,
/// `Led *p = &led;`. Only spellings with a known type count.
pub fn scan_locals(body: &str, env: &dyn TypeEnv) -> Vec<(SmolStr, String)> {
    let tokens = tokenize(body);
    let sig: Vec<&Token<'_>> = significant(&tokens).into_iter().map(|i| &tokens[i]).collect();
    let mut found = Vec::new();
    let mut at_start = true;

    let mut k = 0;
    while k < sig.len() {
        if at_start {
            if let Some((name, ty, next)) = declaration_at(&sig, k, env) {
                found.push((name, ty));
                k = next;
                at_start = false;
                continue;
            }
        }
        let t = sig[k];
        at_start = [";", "{", "}", "(", ":"].iter().any(|p| t.is_punct(p));
        k += 1;
    }
    found
}

/// A declaration starting at `k`: its name, type and the index after the name.
pub(crate) fn declaration_at(
    sig: &[&Token<'_>],
    k: usize,
    env: &dyn TypeEnv,
) -> Option<(SmolStr, String, usize)> {
    let mut j = k;
    while sig.get(j).is_some_and(|t| DECL_QUALIFIERS.iter().any(|q| t.is_keyword(q))) {
        j += 1;
    }
    let start = j;
    while sig
        .get(j)
        .is_some_and(|t| t.is_ident() || t.is_punct("::") || t.is_punct("*") || t.is_punct("&"))
    {
        j += 1;
    }
    let run = &sig[start..j];
    let (name, ty) = run.split_last()?;
    let terminator = sig.get(j)?;
    let declares = [";", "=", "(", "{", "[", ","]
        .iter()
        .any(|p| terminator.is_punct(p));
    if !declares || !name.is_ident() || ty.is_empty() {
        return None;
    }
    let first = ty[0];
    if STATEMENT_KEYWORDS.iter().any(|kw| first.is_keyword(kw)) {
        return None;
    }
    let ty = join_tokens(ty);
    if mangle_tag(name.text) != 'x' || !is_known_type(&ty, env) {
        return None;
    }
    Some((SmolStr::new(name.text), ty, j))
}

/// Parameters a body references by a well-known name that nothing binds.
pub fn infer_missing_params(body: &str, scope: &Scope, model: &ProgramModel) -> Vec<ParamModel> {
    let tokens = tokenize(body);
    let sig = significant(&tokens);
    let used: FxHashSet<&str> = sig
        .iter()
        .enumerate()
        .filter(|&(k, &i)| {
            let member = k > 0 && {
                let prev = &tokens[sig[k - 1]];
                prev.is_punct(".") || prev.is_punct("->") || prev.is_punct("::")
            };
            tokens[i].is_ident() && !member
        })
        .map(|(_, &i)| tokens[i].text)
        .collect();

    INFERRED_PARAMS
        .iter()
        .filter(|(name, _)| {
            used.contains(name) && scope.lookup(name).is_none() && model.global(name).is_none()
        })
        .map(|&(name, ty)| ParamModel {
            name: Some(SmolStr::new(name)),
            ty: ty.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use xc8pp_model::{Body, ClassKind, FieldModel};

    fn model_with_led() -> ProgramModel {
        let mut model = ProgramModel::default();
        let mut led = ClassModel::new("Led", ClassKind::Class);
        led.fields.push(FieldModel {
            name: "state".into(),
            ty: "bool".into(),
        });
        led.fields.push(FieldModel {
            name: "pin".into(),
            ty: "uint8_t".into(),
        });
        model.classes.insert("Led".into(), led);
        model
    }

    #[test]
    fn test_params_shadow_fields() {
        let model = model_with_led();
        let class = model.class("Led");
        let function = FunctionModel {
            name: "setPin".into(),
            params: vec![ParamModel {
                name: Some("pin".into()),
                ty: "uint8_t".into(),
            }],
            ..Default::default()
        };
        let scope = Scope::for_callable(&model, class, &function);
        assert!(scope.is_field("state"));
        assert!(!scope.is_field("pin"));
        assert!(scope.is_bound_locally("pin"));
    }

    #[test]
    fn test_block_local_keeps_field_binding() {
        let model = model_with_led();
        let class = model.class("Led");
        let function = FunctionModel {
            name: "reset".into(),
            body: Some(Body {
                text: "{ bool state = false; } state = true; uint8_t n = 0;".into(),
                file: PathBuf::from("led.cpp"),
                param_names: Vec::new(),
                init_list: None,
            }),
            ..Default::default()
        };
        let scope = Scope::for_callable(&model, class, &function);
        assert!(scope.is_field("state"));
        assert!(scope.is_bound_locally("n"));
    }

    #[test]
    fn test_scan_locals() {
        let model = model_with_led();
        let locals = scan_locals(
            "Led led;\n  unsigned int i = 0;\n  for (uint8_t k = 0; k < 3; k++) {}\n  Led *p = &led;\n  x = y;\n  return state;\n  Widget w;\n",
            &model,
        );
        let names: Vec<_> = locals.iter().map(|(n, t)| (n.as_str(), t.as_str())).collect();
        assert_eq!(
            names,
            vec![
                ("led", "Led"),
                ("i", "unsigned int"),
                ("k", "uint8_t"),
                ("p", "Led *"),
            ]
        );
    }

    #[test]
    fn test_casts_are_not_declarations() {
        let locals = scan_locals("x = (unsigned int) y;\n", &xc8pp_model::types::NoUserTypes);
        assert!(locals.is_empty());
    }

    #[test]
    fn test_infer_missing_params() {
        let model = model_with_led();
        let mut scope = Scope::new();
        scope.bind("count", BindingKind::Param, "int");
        let inferred = infer_missing_params(
            "for (i = 0; i < count; i++) { __delay_ms(delayMs); }\nstate = newState;\nthis->milliseconds = 0;",
            &scope,
            &model,
        );
        let names: Vec<_> = inferred
            .iter()
            .map(|p| (p.name.as_deref().unwrap_or_default(), p.ty.as_str()))
            .collect();
        assert_eq!(names, vec![("newState", "bool"), ("delayMs", "unsigned int")]);
    }
}
