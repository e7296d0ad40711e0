//! Name filters that keep toolchain and device declarations out of the model.

/// Library records that are never user classes.
const IGNORED_CLASSES: &[&str] = &[
    "type_info",
    "exception",
    "bad_alloc",
    "bad_cast",
    "bad_typeid",
    "logic_error",
    "runtime_error",
    "string",
    "vector",
    "list",
    "map",
    "set",
    "iostream",
    "ostream",
    "istream",
    "basic_string",
    "allocator",
];

/// Bit-field names of the PIC special function registers.
const REGISTER_BITS: &[&str] = &[
    "RBIF", "INTF", "T0IF", "RBIE", "INTE", "T0IE", "PEIE", "GIE", "PS0", "PS1", "PS2", "PSA",
    "T0SE", "T0CS", "INTEDG", "RBPU", "RD", "WR", "WREN", "WRERR", "CARRY", "DC", "ZERO", "PD",
    "TO", "RP0", "RP1", "IRP",
];

/// Dump noise that can land in the field position.
const FIELD_NOISE: &[&str] = &["val", "referenced", "implicit"];

const SYSTEM_VAR_PREFIXES: &[&str] = &[
    "PORTA",
    "PORTB",
    "PORTC",
    "TMR",
    "INTCON",
    "OPTION_REG",
    "EE",
    "STATUS",
];

pub fn is_ignored_class(name: &str) -> bool {
    name.starts_with('_') || name.contains('<') || IGNORED_CLASSES.contains(&name)
}

/// `RA0`..`RC7` plus the named control bits.
pub fn is_register_field(name: &str) -> bool {
    if FIELD_NOISE.contains(&name) || REGISTER_BITS.contains(&name) {
        return true;
    }
    let bytes = name.as_bytes();
    bytes.len() == 3
        && bytes[0] == b'R'
        && matches!(bytes[1], b'A' | b'B' | b'C')
        && (b'0'..=b'7').contains(&bytes[2])
}

/// Register variables and anonymous register structs from device headers.
pub fn is_system_variable(name: &str, ty: &str) -> bool {
    if SYSTEM_VAR_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return true;
    }
    if name.ends_with("bits") || name.ends_with("BITS") {
        return true;
    }
    matches!(ty, "unsigned char" | "struct" | "const")
        || ty.contains("unnamed")
        || ty.contains("const")
        || ty.contains('&')
}

/// Namespaces whose contents are skipped entirely.
pub fn is_system_namespace(name: &str) -> bool {
    name == "std" || name.starts_with("__")
}

/// Compiler builtins and reserved free functions.
pub fn is_reserved_function(name: &str) -> bool {
    name.starts_with("__") || name.starts_with("operator")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_fields() {
        assert!(is_register_field("RA0"));
        assert!(is_register_field("RC7"));
        assert!(is_register_field("GIE"));
        assert!(!is_register_field("RA8"));
        assert!(!is_register_field("state"));
        assert!(!is_register_field("RD0"));
    }

    #[test]
    fn test_system_variables() {
        assert!(is_system_variable("PORTAbits", "struct (unnamed struct at xc.h:47:1)"));
        assert!(is_system_variable("TMR0", "unsigned char"));
        assert!(is_system_variable("lookup", "const int[4]"));
        assert!(!is_system_variable("timer", "Timer0"));
        assert!(!is_system_variable("counter", "int"));
    }

    #[test]
    fn test_ignored_classes() {
        assert!(is_ignored_class("basic_string"));
        assert!(is_ignored_class("__va_list_tag"));
        assert!(is_ignored_class("vector<int>"));
        assert!(!is_ignored_class("Led"));
    }
}
