//! Program model for xc8pp.
//!
//! [`ModelBuilder`] folds declaration events from any number of dumps into
//! a [`ProgramModel`]; finishing the model assigns every callable its C
//! identifier and rejects identifiers that would collide.

mod builder;
pub mod mangle;
mod model;
pub mod types;

pub use builder::ModelBuilder;
pub use model::{
    Body, ClassKind, ClassModel, EnumConstant, EnumModel, FieldModel, FunctionModel,
    GlobalVariable, LocalModel, OverloadSet, ParamModel, ProgramModel,
};
pub use types::{CType, Signature, TypeCategory, TypeEnv};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("overloads of `{name}` collide on C name `{c_name}`: {first} and {second}")]
    #[diagnostic(
        code(xc8pp::model::name_collision),
        help("both parameter lists reduce to the same type tags; rename one of the overloads")
    )]
    NameCollision {
        name: String,
        c_name: String,
        first: String,
        second: String,
    },
}
