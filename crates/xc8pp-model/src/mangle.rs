//! C names for methods, constructors and overloaded free functions.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::model::{FunctionModel, ProgramModel};
use crate::types::mangle_tag;
use crate::ModelError;

/// Suffix of tags for a parameter list: `_i_b`, or `_void` for none.
pub fn mangle_suffix<S: AsRef<str>>(param_types: &[S]) -> String {
    if param_types.is_empty() {
        return "_void".to_string();
    }
    param_types
        .iter()
        .map(|ty| format!("_{}", mangle_tag(ty.as_ref())))
        .collect()
}

pub fn mangled_name<S: AsRef<str>>(base: &str, param_types: &[S]) -> String {
    format!("{base}{}", mangle_suffix(param_types))
}

/// Assign `c_name` to every callable, then reject duplicates.
pub fn assign_names(model: &mut ProgramModel) -> Result<(), ModelError> {
    for class in model.classes.values_mut() {
        let init = class.init_name();
        for ctor in &mut class.constructors {
            ctor.c_name = if ctor.params.is_empty() {
                SmolStr::new(&init)
            } else {
                SmolStr::new(mangled_name(&init, &ctor.param_types()))
            };
        }
        check_unique(&class.name, &class.constructors)?;

        for method in class.methods.values_mut() {
            method.c_name = SmolStr::new(format!("{}_{}", class.name, method.name));
        }
    }

    for set in model.functions.values_mut() {
        let overloaded = set.is_overloaded();
        for function in &mut set.signatures {
            function.c_name = if overloaded {
                SmolStr::new(mangled_name(&function.name, &function.param_types()))
            } else {
                function.name.clone()
            };
        }
        if overloaded {
            debug!(
                name = %set.name,
                names = ?set.signatures.iter().map(|f| f.c_name.as_str()).collect::<Vec<_>>(),
                "mangled overloads"
            );
        }
        check_unique(&set.name, &set.signatures)?;
    }

    if let Some(main) = &mut model.main {
        main.c_name = SmolStr::new_static("main");
    }

    // Across sets: `log(int)` mangled to `log_i` must not shadow a real `log_i`.
    let mut seen: FxHashMap<SmolStr, &FunctionModel> = FxHashMap::default();
    for function in model.functions.values().flat_map(|s| s.signatures.iter()) {
        if let Some(previous) = seen.insert(function.c_name.clone(), function) {
            return Err(collision(&function.name, &function.c_name, previous, function));
        }
    }
    Ok(())
}

fn check_unique(owner: &str, functions: &[FunctionModel]) -> Result<(), ModelError> {
    for (i, a) in functions.iter().enumerate() {
        if let Some(b) = functions[i + 1..].iter().find(|b| b.c_name == a.c_name) {
            return Err(collision(owner, &a.c_name, a, b));
        }
    }
    Ok(())
}

fn collision(name: &str, c_name: &str, a: &FunctionModel, b: &FunctionModel) -> ModelError {
    ModelError::NameCollision {
        name: name.to_string(),
        c_name: c_name.to_string(),
        first: format!("({})", a.param_types().join(", ")),
        second: format!("({})", b.param_types().join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassKind, ClassModel, OverloadSet, ParamModel};

    fn signature(name: &str, types: &[&str]) -> FunctionModel {
        FunctionModel {
            name: name.into(),
            raw_type: format!("void ({})", types.join(", ")),
            params: types
                .iter()
                .map(|ty| ParamModel {
                    name: None,
                    ty: ty.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn with_set(name: &str, sigs: Vec<FunctionModel>) -> ProgramModel {
        let mut model = ProgramModel::default();
        model.functions.insert(
            name.into(),
            OverloadSet {
                name: name.into(),
                signatures: sigs,
            },
        );
        model
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(mangle_suffix::<&str>(&[]), "_void");
        assert_eq!(mangled_name("log", &["int", "int"]), "log_i_i");
        assert_eq!(mangled_name("set", &["float", "bool", "char"]), "set_f_b_c");
    }

    #[test]
    fn test_overloads_get_distinct_names() {
        let mut model = with_set(
            "delay",
            vec![signature("delay", &[]), signature("delay", &["unsigned int"])],
        );
        assign_names(&mut model).unwrap();
        let names: Vec<_> = model.functions["delay"]
            .signatures
            .iter()
            .map(|f| f.c_name.to_string())
            .collect();
        assert_eq!(names, vec!["delay_void", "delay_i"]);
    }

    #[test]
    fn test_same_tags_collide() {
        let mut model = with_set(
            "scale",
            vec![signature("scale", &["int"]), signature("scale", &["long"])],
        );
        let err = assign_names(&mut model).unwrap_err();
        let ModelError::NameCollision { c_name, first, second, .. } = err;
        assert_eq!(c_name, "scale_i");
        assert_eq!(first, "(int)");
        assert_eq!(second, "(long)");
    }

    #[test]
    fn test_mangled_name_shadowing_plain_function() {
        let mut model = with_set(
            "log",
            vec![signature("log", &["int"]), signature("log", &["int", "int"])],
        );
        model.functions.insert(
            "log_i".into(),
            OverloadSet {
                name: "log_i".into(),
                signatures: vec![signature("log_i", &[])],
            },
        );
        assert!(assign_names(&mut model).is_err());
    }

    #[test]
    fn test_constructor_names() {
        let mut model = ProgramModel::default();
        let mut led = ClassModel::new("Led", ClassKind::Class);
        led.constructors.push(signature("Led", &[]));
        led.constructors.push(signature("Led", &["LedId"]));
        led.methods.insert("on".into(), signature("on", &[]));
        model.classes.insert("Led".into(), led);

        assign_names(&mut model).unwrap();
        let led = model.class("Led").unwrap();
        assert_eq!(led.constructors[0].c_name, "Led_init");
        assert_eq!(led.constructors[1].c_name, "Led_init_x");
        assert_eq!(led.methods["on"].c_name, "Led_on");
    }
}
