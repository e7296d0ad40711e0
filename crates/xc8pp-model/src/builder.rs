//! Folding declaration events into a [`ProgramModel`].

use smol_str::SmolStr;
use tracing::debug;
use xc8pp_frontend::{CallableDecl, DeclEvent, RecordKeyword};

use crate::mangle;
use crate::model::{
    ClassKind, ClassModel, EnumConstant, EnumModel, FieldModel, FunctionModel, GlobalVariable,
    LocalModel, OverloadSet, ParamModel, ProgramModel,
};
use crate::types::Signature;
use crate::ModelError;

/// Accumulates events from any number of dumps.
///
/// Merging is additive: a name already present is never replaced, later
/// reports only fill what is missing (parameter names, locals, the file a
/// definition lives in).
#[derive(Debug, Default, Clone)]
pub struct ModelBuilder {
    model: ProgramModel,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one dump's events; returns the accumulator for chaining.
    pub fn absorb(mut self, events: impl IntoIterator<Item = DeclEvent>) -> Self {
        for event in events {
            self.apply(event);
        }
        self
    }

    pub fn apply(&mut self, event: DeclEvent) {
        match event {
            DeclEvent::ClassOpen {
                name,
                keyword,
                origin,
            } => {
                let kind = match keyword {
                    RecordKeyword::Class => ClassKind::Class,
                    RecordKeyword::Struct => ClassKind::Struct,
                };
                let class = self.class_entry(&name, kind);
                if kind == ClassKind::Class {
                    class.kind = ClassKind::Class;
                }
                if class.origin.is_none() {
                    class.origin = origin;
                }
            }
            DeclEvent::Field {
                class,
                name,
                raw_type,
            } => {
                let class = self.class_entry(&class, ClassKind::Class);
                if class.field(&name).is_none() {
                    class.fields.push(FieldModel { name, ty: raw_type });
                } else {
                    debug!(class = %class.name, field = %name, "duplicate field ignored");
                }
            }
            DeclEvent::Method { class, decl } => {
                let function = callable(decl);
                let class = self.class_entry(&class, ClassKind::Class);
                match class.methods.get_mut(&function.name) {
                    Some(existing) => existing.merge(function),
                    None => {
                        class.methods.insert(function.name.clone(), function);
                    }
                }
            }
            DeclEvent::Constructor { class, decl } => {
                let function = callable(decl);
                let class = self.class_entry(&class, ClassKind::Class);
                let types = function.param_types();
                match class
                    .constructors
                    .iter_mut()
                    .find(|c| c.param_types() == types)
                {
                    Some(existing) => existing.merge(function),
                    None => class.constructors.push(function),
                }
            }
            DeclEvent::Destructor { class } => {
                self.class_entry(&class, ClassKind::Class).has_destructor = true;
            }
            DeclEvent::EnumOpen { name, scoped } => {
                self.model
                    .enums
                    .entry(name.clone())
                    .or_insert_with(|| EnumModel {
                        name,
                        scoped,
                        constants: Vec::new(),
                    });
            }
            DeclEvent::EnumConstant {
                enum_name,
                name,
                value,
            } => {
                let Some(model) = self.model.enums.get_mut(&enum_name) else {
                    debug!(%enum_name, %name, "constant without enum");
                    return;
                };
                if !model.constants.iter().any(|c| c.name == name) {
                    model.constants.push(EnumConstant { name, value });
                }
            }
            DeclEvent::Function(decl) => {
                let function = callable(decl);
                if function.name == "main" {
                    match &mut self.model.main {
                        Some(main) => main.merge(function),
                        None => self.model.main = Some(function),
                    }
                    return;
                }
                let set = self
                    .model
                    .functions
                    .entry(function.name.clone())
                    .or_insert_with(|| OverloadSet {
                        name: function.name.clone(),
                        signatures: Vec::new(),
                    });
                let types = function.param_types();
                match set
                    .signatures
                    .iter_mut()
                    .find(|f| f.param_types() == types)
                {
                    Some(existing) => existing.merge(function),
                    None => set.signatures.push(function),
                }
            }
            DeclEvent::GlobalVar {
                name,
                raw_type,
                has_init,
            } => match self.model.globals.iter_mut().find(|g| g.name == name) {
                Some(existing) => existing.has_init |= has_init,
                None => self.model.globals.push(GlobalVariable {
                    name,
                    ty: raw_type,
                    has_init,
                    init_args: None,
                }),
            },
        }
    }

    fn class_entry(&mut self, name: &SmolStr, kind: ClassKind) -> &mut ClassModel {
        self.model
            .classes
            .entry(name.clone())
            .or_insert_with(|| ClassModel::new(name.clone(), kind))
    }

    /// Drop plain data records and assign every callable its C name.
    pub fn finish(self) -> Result<ProgramModel, ModelError> {
        let mut model = self.model;
        model.classes.retain(|name, class| {
            let plain = class.kind == ClassKind::Struct
                && class.methods.is_empty()
                && class.constructors.is_empty();
            if plain {
                debug!(record = %name, "plain struct is not a class");
            }
            !plain
        });
        mangle::assign_names(&mut model)?;
        Ok(model)
    }
}

/// Convert a dump callable, falling back to the signature for missing parameters.
fn callable(decl: CallableDecl) -> FunctionModel {
    let mut params: Vec<ParamModel> = decl
        .params
        .into_iter()
        .map(|p| ParamModel {
            name: p.name,
            ty: p.ty,
        })
        .collect();
    if params.is_empty() {
        params = Signature::parse(&decl.raw_type)
            .params
            .into_iter()
            .filter(|ty| ty != "...")
            .map(|ty| ParamModel { name: None, ty })
            .collect();
    }
    let defined_in = if decl.is_definition {
        decl.origin.clone()
    } else {
        None
    };
    FunctionModel {
        name: decl.name,
        raw_type: decl.raw_type,
        params,
        locals: decl
            .locals
            .into_iter()
            .map(|l| LocalModel {
                name: l.name,
                ty: l.ty,
            })
            .collect(),
        body: None,
        is_static: decl.is_static,
        origin: decl.origin,
        defined_in,
        c_name: SmolStr::default(),
    }
}
