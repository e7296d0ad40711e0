//! The symbol model built from declaration events.

use indexmap::IndexMap;
use smol_str::SmolStr;
use std::path::{Path, PathBuf};

use crate::types::{CType, Signature, TypeEnv};

/// A parameter of a callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamModel {
    pub name: Option<SmolStr>,
    pub ty: String,
}

/// A local variable seen inside a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModel {
    pub name: SmolStr,
    pub ty: String,
}

/// Source text recovered for a callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    /// Text between the braces, exclusive.
    pub text: String,
    /// File the text was found in.
    pub file: PathBuf,
    /// Parameter names as written in the definition.
    pub param_names: Vec<Option<SmolStr>>,
    /// Constructor member-initializer list without the leading `:`.
    pub init_list: Option<String>,
}

/// A method, constructor or free function.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionModel {
    pub name: SmolStr,
    /// Signature spelling as reported, e.g. `bool (int) const`.
    pub raw_type: String,
    pub params: Vec<ParamModel>,
    pub locals: Vec<LocalModel>,
    pub body: Option<Body>,
    pub is_static: bool,
    /// Where the declaration was first reported.
    pub origin: Option<PathBuf>,
    /// Where a definition was reported, if any dump had one.
    pub defined_in: Option<PathBuf>,
    /// Emitted C identifier, assigned when the model is finished.
    pub c_name: SmolStr,
}

impl FunctionModel {
    pub fn signature(&self) -> Signature {
        Signature::parse(&self.raw_type)
    }

    pub fn return_type(&self, env: &dyn TypeEnv) -> CType {
        CType::from_spelling(&self.signature().ret, env)
    }

    /// Parameter type spellings, whitespace-normalized.
    pub fn param_types(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|p| p.ty.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect()
    }

    /// Parameter name at `index`, preferring the definition's spelling.
    pub fn param_name(&self, index: usize) -> SmolStr {
        let from_body = self
            .body
            .as_ref()
            .and_then(|b| b.param_names.get(index).cloned().flatten());
        from_body
            .or_else(|| self.params.get(index).and_then(|p| p.name.clone()))
            .unwrap_or_else(|| SmolStr::new(format!("p{index}")))
    }

    /// File that most likely holds the definition.
    pub fn definition_file(&self) -> Option<&Path> {
        self.body
            .as_ref()
            .map(|b| b.file.as_path())
            .or(self.defined_in.as_deref())
            .or(self.origin.as_deref())
    }

    /// Fold a later report of the same callable into this one.
    /// Existing information is kept; only gaps are filled.
    pub fn merge(&mut self, other: FunctionModel) {
        for (mine, theirs) in self.params.iter_mut().zip(other.params) {
            if mine.name.is_none() {
                mine.name = theirs.name;
            }
        }
        for local in other.locals {
            if !self.locals.iter().any(|l| l.name == local.name) {
                self.locals.push(local);
            }
        }
        if self.defined_in.is_none() {
            self.defined_in = other.defined_in;
        }
        if self.origin.is_none() {
            self.origin = other.origin;
        }
        if self.body.is_none() {
            self.body = other.body;
        }
        self.is_static |= other.is_static;
    }
}

/// A class field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModel {
    pub name: SmolStr,
    pub ty: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Struct,
}

/// A class: fields, methods, constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassModel {
    pub name: SmolStr,
    pub kind: ClassKind,
    pub fields: Vec<FieldModel>,
    /// Keyed by name; a name is recorded once per class.
    pub methods: IndexMap<SmolStr, FunctionModel>,
    pub constructors: Vec<FunctionModel>,
    pub has_destructor: bool,
    pub origin: Option<PathBuf>,
}

impl ClassModel {
    pub fn new(name: impl Into<SmolStr>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
            methods: IndexMap::new(),
            constructors: Vec::new(),
            has_destructor: false,
            origin: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&FunctionModel> {
        self.methods.get(name)
    }

    /// The zero-argument constructor, if one was declared.
    pub fn default_constructor(&self) -> Option<&FunctionModel> {
        self.constructors.iter().find(|c| c.params.is_empty())
    }

    /// Constructors taking arguments, in declaration order.
    pub fn parameterized_constructors(&self) -> impl Iterator<Item = &FunctionModel> {
        self.constructors.iter().filter(|c| !c.params.is_empty())
    }

    pub fn init_name(&self) -> String {
        format!("{}_init", self.name)
    }

    pub fn cleanup_name(&self) -> String {
        format!("{}_cleanup", self.name)
    }
}

/// One enum constant; `None` when the value was implicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
    pub name: SmolStr,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumModel {
    pub name: SmolStr,
    pub scoped: bool,
    pub constants: Vec<EnumConstant>,
}

/// All signatures recorded for one free-function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadSet {
    pub name: SmolStr,
    pub signatures: Vec<FunctionModel>,
}

impl OverloadSet {
    pub fn is_overloaded(&self) -> bool {
        self.signatures.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVariable {
    pub name: SmolStr,
    pub ty: String,
    pub has_init: bool,
    /// Constructor or brace arguments recovered from the source.
    pub init_args: Option<String>,
}

/// Everything one run knows about the program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramModel {
    pub classes: IndexMap<SmolStr, ClassModel>,
    pub enums: IndexMap<SmolStr, EnumModel>,
    pub functions: IndexMap<SmolStr, OverloadSet>,
    pub globals: Vec<GlobalVariable>,
    pub main: Option<FunctionModel>,
}

impl ProgramModel {
    pub fn class(&self, name: &str) -> Option<&ClassModel> {
        self.classes.get(name)
    }

    /// First class declaring a method with this name.
    pub fn class_declaring(&self, method: &str) -> Option<&ClassModel> {
        self.classes.values().find(|c| c.methods.contains_key(method))
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Enum that declares this constant.
    pub fn enum_of_constant(&self, constant: &str) -> Option<&EnumModel> {
        self.enums
            .values()
            .find(|e| e.constants.iter().any(|c| c.name == constant))
    }
}

impl TypeEnv for ProgramModel {
    fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    fn is_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }
}
