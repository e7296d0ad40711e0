//! Type spellings: signature splitting, C type mapping and default values.

use smol_str::SmolStr;
use std::fmt;
use tracing::debug;

/// Integer spellings that are valid C once `<stdint.h>`/`<stddef.h>` are included.
const INTEGER_TYPES: &[&str] = &[
    "int8_t",
    "int16_t",
    "int32_t",
    "int64_t",
    "uint8_t",
    "uint16_t",
    "uint32_t",
    "uint64_t",
    "size_t",
    "ptrdiff_t",
    "intptr_t",
    "uintptr_t",
];

/// Words that make up builtin integer spellings such as `unsigned long int`.
const INTEGER_WORDS: &[&str] = &["int", "short", "long", "unsigned", "signed"];

/// Qualifiers and elaborations that C either does not need or spells differently.
const DROPPED_WORDS: &[&str] = &["const", "volatile", "struct", "class", "enum", "typename"];

/// Names of user types the mapping may keep verbatim.
pub trait TypeEnv {
    fn is_class(&self, name: &str) -> bool;
    fn is_enum(&self, name: &str) -> bool;
}

/// Coarse classification of a type spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCategory {
    Void,
    Bool,
    Char,
    Integer,
    Float,
    Double,
    Enum(SmolStr),
    Class(SmolStr),
    /// A spelling nothing knows about.
    Unknown,
}

/// A type spelling mapped to C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CType {
    pub base: String,
    pub category: TypeCategory,
    /// Pointer depth; C++ references count as one level.
    pub pointer: usize,
    /// Array dimensions, e.g. `[8]`.
    pub array: Option<String>,
}

impl CType {
    /// Map a front-end spelling such as `const Led &` or `uint8_t [8]`.
    pub fn from_spelling(spelling: &str, env: &dyn TypeEnv) -> Self {
        let (scalar, array) = match spelling.find('[') {
            Some(i) => (&spelling[..i], Some(spelling[i..].replace(' ', ""))),
            None => (spelling, None),
        };
        let pointer = scalar.chars().filter(|c| matches!(c, '*' | '&')).count();
        let base = base_spelling(scalar);

        let category = categorize(&base, env);
        let base = match category {
            TypeCategory::Unknown => {
                debug!(spelling, "unknown type mapped to int");
                "int".to_string()
            }
            _ => base,
        };
        Self {
            base,
            category,
            pointer,
            array,
        }
    }

    pub fn is_void(&self) -> bool {
        self.category == TypeCategory::Void && self.pointer == 0 && self.array.is_none()
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer > 0
    }

    /// Class name when this is a class value or pointer to one.
    pub fn class_name(&self) -> Option<&str> {
        match &self.category {
            TypeCategory::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Declaration of `name` with this type, e.g. `uint8_t buf[8]`.
    pub fn declare(&self, name: &str) -> String {
        match &self.array {
            Some(dims) => format!("{self} {name}{dims}"),
            None => format!("{self} {name}"),
        }
    }

    /// Value returned when a callable has no recovered body.
    /// `None` for `void`.
    pub fn default_value(&self) -> Option<String> {
        if self.is_void() {
            return None;
        }
        if self.pointer > 0 {
            return Some(format!("({self})0"));
        }
        let value = match &self.category {
            TypeCategory::Bool => "false".to_string(),
            TypeCategory::Float | TypeCategory::Double => "0.0".to_string(),
            TypeCategory::Enum(name) => format!("({name})0"),
            TypeCategory::Class(name) => format!("({name}){{0}}"),
            _ => "0".to_string(),
        };
        Some(value)
    }

    /// Field zero value used by `_init`; class fields are initialized by call instead.
    pub fn zero_value(&self) -> Option<String> {
        if self.array.is_some() {
            return None;
        }
        if self.pointer > 0 {
            return Some("0".to_string());
        }
        match &self.category {
            TypeCategory::Class(_) | TypeCategory::Void => None,
            _ => self.default_value(),
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for _ in 0..self.pointer {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// Strip qualifiers, pointer markers and namespace qualification.
fn base_spelling(scalar: &str) -> String {
    let cleaned: String = scalar
        .chars()
        .map(|c| if matches!(c, '*' | '&') { ' ' } else { c })
        .collect();
    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| !DROPPED_WORDS.contains(w))
        .map(|w| w.rsplit("::").next().unwrap_or(w))
        .collect();
    words.join(" ")
}

fn is_integer(base: &str) -> bool {
    INTEGER_TYPES.contains(&base)
        || (!base.is_empty() && base.split(' ').all(|w| INTEGER_WORDS.contains(&w)))
}

fn categorize(base: &str, env: &dyn TypeEnv) -> TypeCategory {
    match base {
        "void" => TypeCategory::Void,
        "bool" | "_Bool" => TypeCategory::Bool,
        "char" | "signed char" | "unsigned char" => TypeCategory::Char,
        "float" => TypeCategory::Float,
        "double" | "long double" => TypeCategory::Double,
        _ if is_integer(base) => TypeCategory::Integer,
        _ if env.is_enum(base) => TypeCategory::Enum(SmolStr::new(base)),
        _ if env.is_class(base) => TypeCategory::Class(SmolStr::new(base)),
        _ => TypeCategory::Unknown,
    }
}

/// A signature spelling split into return type, parameters and trailing qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub ret: String,
    pub params: Vec<String>,
    pub qualifiers: String,
}

impl Signature {
    /// Split `bool (int, char *) const`. A lone `void` means no parameters.
    pub fn parse(raw: &str) -> Self {
        let Some(open) = raw.find('(') else {
            return Self {
                ret: raw.trim().to_string(),
                ..Default::default()
            };
        };
        let ret = raw[..open].trim().to_string();

        let mut depth = 0usize;
        let mut close = raw.len();
        let mut params = Vec::new();
        let mut start = open + 1;
        for (i, c) in raw.char_indices().skip_while(|(i, _)| *i < open) {
            match c {
                '(' | '<' | '[' => depth += 1,
                ')' | '>' | ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        params.push(raw[start..i].trim().to_string());
                        close = i;
                        break;
                    }
                }
                ',' if depth == 1 => {
                    params.push(raw[start..i].trim().to_string());
                    start = i + 1;
                }
                _ => {}
            }
        }
        params.retain(|p| !p.is_empty());
        if params.len() == 1 && params[0] == "void" {
            params.clear();
        }
        let qualifiers = raw.get(close + 1..).unwrap_or_default().trim().to_string();
        Self {
            ret,
            params,
            qualifiers,
        }
    }
}

/// Single-letter category used in overload names.
pub fn mangle_tag(spelling: &str) -> char {
    let scalar = spelling.split('[').next().unwrap_or(spelling);
    match base_spelling(scalar).as_str() {
        "bool" | "_Bool" => 'b',
        "float" => 'f',
        "double" | "long double" => 'd',
        "char" | "signed char" | "unsigned char" => 'c',
        base if is_integer(base) => 'i',
        _ => 'x',
    }
}

/// Names known to nobody; every user type maps to `int`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUserTypes;

impl TypeEnv for NoUserTypes {
    fn is_class(&self, _: &str) -> bool {
        false
    }

    fn is_enum(&self, _: &str) -> bool {
        false
    }
}
