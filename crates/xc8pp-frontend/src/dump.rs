//! Declaration dump parsing.
//!
//! The front end prints one declaration per line, indented with a tree
//! prefix (`|-`, `` `- ``, `| `). The parser keeps a stack of open nodes
//! keyed by that depth, so every declaration is attributed to its real
//! enclosing record or callable rather than to whichever record was seen
//! last.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::filter;

/// One parameter as reported by a `ParmVarDecl` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    /// `None` for unnamed parameters.
    pub name: Option<SmolStr>,
    pub ty: String,
}

/// A local variable declared inside a callable body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub name: SmolStr,
    pub ty: String,
}

/// Shared shape of methods, constructors and free functions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallableDecl {
    pub name: SmolStr,
    /// Signature spelling, e.g. `bool (int) const`.
    pub raw_type: String,
    pub params: Vec<ParamDecl>,
    pub locals: Vec<LocalDecl>,
    /// A body (`CompoundStmt`) was attached in this dump.
    pub is_definition: bool,
    pub is_static: bool,
    /// File the declaration was reported in, when the dump said.
    pub origin: Option<PathBuf>,
}

/// Whether a record was introduced with `class` or `struct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKeyword {
    Class,
    Struct,
}

/// Typed declaration events, in dump order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclEvent {
    ClassOpen {
        name: SmolStr,
        keyword: RecordKeyword,
        origin: Option<PathBuf>,
    },
    Field {
        class: SmolStr,
        name: SmolStr,
        raw_type: String,
    },
    Method {
        class: SmolStr,
        decl: CallableDecl,
    },
    Constructor {
        class: SmolStr,
        decl: CallableDecl,
    },
    Destructor {
        class: SmolStr,
    },
    EnumOpen {
        name: SmolStr,
        scoped: bool,
    },
    EnumConstant {
        enum_name: SmolStr,
        name: SmolStr,
        value: Option<i64>,
    },
    Function(CallableDecl),
    GlobalVar {
        name: SmolStr,
        raw_type: String,
        has_init: bool,
    },
}

impl DeclEvent {
    fn callable_mut(&mut self) -> Option<&mut CallableDecl> {
        match self {
            DeclEvent::Method { decl, .. }
            | DeclEvent::Constructor { decl, .. }
            | DeclEvent::Function(decl) => Some(decl),
            _ => None,
        }
    }
}

/// Flags that can precede a declaration's name.
const PREFIX_FLAGS: &[&str] = &[
    "used",
    "referenced",
    "implicit",
    "invalid",
    "hidden",
    "imported",
    "constexpr",
    "inline",
    "mutable",
];

/// Trailing flags that mean the variable was written with an initializer.
const INIT_FLAGS: &[&str] = &["cinit", "callinit", "listinit", "parenlistinit"];

/// Declaration kinds whose whole subtree is skipped.
const TEMPLATE_KINDS: &[&str] = &[
    "ClassTemplateDecl",
    "FunctionTemplateDecl",
    "ClassTemplateSpecializationDecl",
    "ClassTemplatePartialSpecializationDecl",
    "TypeAliasTemplateDecl",
    "VarTemplateDecl",
];

/// One dump line split into its parts.
#[derive(Debug, Default)]
struct DumpLine<'a> {
    depth: usize,
    kind: &'a str,
    address: Option<&'a str>,
    parent: Option<&'a str>,
    files: Vec<&'a str>,
    head: Vec<&'a str>,
    ty: Option<&'a str>,
    trailing: Vec<&'a str>,
}

impl<'a> DumpLine<'a> {
    fn has_flag(&self, flag: &str) -> bool {
        self.head.contains(&flag) || self.trailing.contains(&flag)
    }

    /// Name in the usual `flags name 'type'` position.
    fn name(&self) -> Option<&'a str> {
        self.head
            .last()
            .copied()
            .filter(|t| !PREFIX_FLAGS.contains(t))
    }

    /// Record name following the `class`/`struct`/`union` keyword.
    fn record(&self) -> Option<(&'a str, Option<&'a str>)> {
        let pos = self
            .head
            .iter()
            .position(|t| matches!(*t, "class" | "struct" | "union"))?;
        let name = self
            .head
            .get(pos + 1)
            .copied()
            .filter(|t| *t != "definition");
        Some((self.head[pos], name))
    }
}

/// Split off the first whitespace-delimited token.
fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

/// Consume a balanced `<...>` group. Returns the inner text and the rest.
fn split_angle(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some((&s[1..i], &s[i + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

/// File path of a `path:line:col` location, if it names one.
fn file_of(loc: &str) -> Option<&str> {
    let mut parts = loc.trim().rsplitn(3, ':');
    let col = parts.next()?;
    let line = parts.next()?;
    let path = parts.next()?;
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if numeric(col) && numeric(line) && !path.is_empty() && path != "line" && path != "col" {
        Some(path)
    } else {
        None
    }
}

fn is_location_token(tok: &str) -> bool {
    tok.starts_with("line:") || tok.starts_with("col:") || file_of(tok).is_some()
}

fn parse_line(line: &str) -> Option<DumpLine<'_>> {
    let start = line.find(|c: char| !matches!(c, ' ' | '|' | '-' | '`'))?;
    let mut parsed = DumpLine {
        depth: start / 2,
        ..Default::default()
    };

    let (kind, mut rest) = split_token(&line[start..]);
    parsed.kind = kind;

    loop {
        let trimmed = rest.trim_start();
        if trimmed.starts_with("0x") {
            let (addr, r) = split_token(trimmed);
            parsed.address.get_or_insert(addr);
            rest = r;
        } else if let Some(r) = trimmed.strip_prefix("parent ") {
            let (addr, r) = split_token(r);
            parsed.parent = Some(addr);
            rest = r;
        } else if let Some(r) = trimmed.strip_prefix("prev ") {
            rest = split_token(r).1;
        } else {
            rest = trimmed;
            break;
        }
    }

    // Source range, then the declaration's own location.
    if rest.starts_with('<') {
        if let Some((range, r)) = split_angle(rest) {
            parsed.files.extend(range.split(", ").filter_map(file_of));
            rest = r.trim_start();
            if rest.starts_with('<') {
                if let Some((_, r)) = split_angle(rest) {
                    rest = r;
                }
            } else {
                let (tok, r) = split_token(rest);
                if is_location_token(tok) {
                    parsed.files.extend(file_of(tok));
                    rest = r;
                }
            }
        }
    }

    let tail = rest.trim();
    let (head, tail_after) = match tail.find('\'') {
        Some(q) => {
            let after = &tail[q + 1..];
            match after.find('\'') {
                Some(close) => {
                    parsed.ty = Some(&after[..close]);
                    let mut r = &after[close + 1..];
                    if let Some(sugar) = r.strip_prefix(":'") {
                        if let Some(c) = sugar.find('\'') {
                            r = &sugar[c + 1..];
                        }
                    }
                    (&tail[..q], r)
                }
                None => (tail, ""),
            }
        }
        None => (tail, ""),
    };
    parsed.head = head.split_whitespace().collect();
    parsed.trailing = tail_after.split_whitespace().collect();
    Some(parsed)
}

/// Remove ANSI color sequences in case the front end ignored `-fno-color-diagnostics`.
fn strip_ansi(line: &str) -> std::borrow::Cow<'_, str> {
    if !line.contains('\u{1b}') {
        return std::borrow::Cow::Borrowed(line);
    }
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    std::borrow::Cow::Owned(out)
}

#[derive(Debug, Clone)]
enum FrameKind {
    /// Namespaces and linkage specs: children are still top level.
    Transparent,
    /// Subtree is skipped.
    Ignored,
    Class(SmolStr),
    Enum(SmolStr),
    EnumConstant(usize),
    Callable(usize),
    Other,
}

#[derive(Debug)]
struct Frame {
    depth: usize,
    kind: FrameKind,
}

/// Parser state for one dump.
#[derive(Debug, Default)]
pub struct DumpParser {
    origins: Option<FxHashSet<String>>,
    events: Vec<DeclEvent>,
    stack: Vec<Frame>,
    records: FxHashMap<String, SmolStr>,
    current_file: Option<String>,
}

impl DumpParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only keep top-level declarations located in one of these files
    /// (compared by file name).
    pub fn with_origins<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let names = files
            .into_iter()
            .filter_map(|p| {
                p.as_ref()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .collect();
        self.origins = Some(names);
        self
    }

    /// Parse a complete dump into declaration events.
    pub fn parse(mut self, dump: &str) -> Vec<DeclEvent> {
        for raw in dump.lines() {
            let line = strip_ansi(raw);
            if let Some(parsed) = parse_line(&line) {
                self.visit(&parsed);
            }
        }
        debug!(events = self.events.len(), "parsed declaration dump");
        self.events
    }

    fn visit(&mut self, line: &DumpLine<'_>) {
        if let Some(file) = line.files.last() {
            self.current_file = Some((*file).to_string());
        }

        while self.stack.last().is_some_and(|f| f.depth >= line.depth) {
            self.stack.pop();
        }

        let parent = match self.stack.last() {
            Some(frame) if frame.depth + 1 == line.depth => frame.kind.clone(),
            Some(_) => FrameKind::Other,
            None if line.depth == 0 => FrameKind::Other,
            // Root-level children of the translation unit.
            None => FrameKind::Transparent,
        };

        let kind = if self.inside_ignored() {
            FrameKind::Ignored
        } else {
            match parent {
                FrameKind::Transparent => self.visit_top_level(line),
                FrameKind::Class(class) => self.visit_member(&class, line),
                FrameKind::Enum(name) => self.visit_enumerator(&name, line),
                FrameKind::Callable(idx) => self.visit_callable_child(idx, line),
                FrameKind::EnumConstant(idx) => {
                    self.visit_enum_value(idx, line, true);
                    FrameKind::Other
                }
                FrameKind::Ignored => FrameKind::Ignored,
                FrameKind::Other => {
                    self.visit_nested(line);
                    FrameKind::Other
                }
            }
        };

        // The translation unit itself stays at the bottom of the stack.
        if line.depth == 0 {
            self.stack.clear();
            return;
        }
        self.stack.push(Frame {
            depth: line.depth,
            kind,
        });
    }

    fn inside_ignored(&self) -> bool {
        self.stack
            .iter()
            .any(|f| matches!(f.kind, FrameKind::Ignored))
    }

    fn origin_allowed(&self) -> bool {
        let Some(origins) = &self.origins else {
            return true;
        };
        self.current_file
            .as_deref()
            .and_then(|f| Path::new(f).file_name())
            .and_then(|n| n.to_str())
            .is_some_and(|n| origins.contains(n))
    }

    fn origin(&self) -> Option<PathBuf> {
        self.current_file.as_ref().map(PathBuf::from)
    }

    fn visit_top_level(&mut self, line: &DumpLine<'_>) -> FrameKind {
        if TEMPLATE_KINDS.contains(&line.kind) {
            return FrameKind::Ignored;
        }
        match line.kind {
            "LinkageSpecDecl" => FrameKind::Transparent,
            "NamespaceDecl" => match line.head.last() {
                Some(name) if filter::is_system_namespace(name) => FrameKind::Ignored,
                _ => FrameKind::Transparent,
            },
            // Parent-attributed members are accepted wherever they were written.
            "CXXMethodDecl" | "CXXConstructorDecl" | "CXXDestructorDecl" => {
                let class = line.parent.and_then(|addr| self.records.get(addr)).cloned();
                match class {
                    Some(class) => self.visit_member(&class, line),
                    None => FrameKind::Other,
                }
            }
            _ if line.has_flag("implicit") => FrameKind::Other,
            _ if !self.origin_allowed() => FrameKind::Ignored,
            "CXXRecordDecl" | "RecordDecl" => self.visit_record(line),
            "FunctionDecl" => self.visit_function(line),
            "VarDecl" => {
                self.visit_global(line);
                FrameKind::Other
            }
            "EnumDecl" => self.visit_enum(line),
            _ => FrameKind::Other,
        }
    }

    fn visit_record(&mut self, line: &DumpLine<'_>) -> FrameKind {
        let Some((keyword, name)) = line.record() else {
            return FrameKind::Other;
        };
        let Some(name) = name else {
            // Anonymous records only wrap register bit-fields.
            return FrameKind::Ignored;
        };
        if keyword == "union" || filter::is_ignored_class(name) {
            debug!(record = name, "skipping library record");
            return FrameKind::Ignored;
        }
        let name = SmolStr::new(name);
        if let Some(addr) = line.address {
            self.records.insert(addr.to_string(), name.clone());
        }
        if !line.has_flag("definition") {
            return FrameKind::Other;
        }
        let keyword = if keyword == "struct" {
            RecordKeyword::Struct
        } else {
            RecordKeyword::Class
        };
        self.events.push(DeclEvent::ClassOpen {
            name: name.clone(),
            keyword,
            origin: self.origin(),
        });
        FrameKind::Class(name)
    }

    fn callable(&self, line: &DumpLine<'_>, name: &str) -> CallableDecl {
        CallableDecl {
            name: SmolStr::new(name),
            raw_type: line.ty.unwrap_or_default().to_string(),
            is_static: line.trailing.contains(&"static") || line.head.contains(&"static"),
            origin: self.origin(),
            ..Default::default()
        }
    }

    fn push_callable(&mut self, event: DeclEvent) -> FrameKind {
        self.events.push(event);
        FrameKind::Callable(self.events.len() - 1)
    }

    fn visit_member(&mut self, class: &SmolStr, line: &DumpLine<'_>) -> FrameKind {
        if line.has_flag("implicit") {
            return FrameKind::Other;
        }
        match line.kind {
            "FieldDecl" => {
                if let (Some(name), Some(ty)) = (line.name(), line.ty) {
                    if filter::is_register_field(name) {
                        debug!(class = %class, field = name, "skipping register field");
                    } else {
                        self.events.push(DeclEvent::Field {
                            class: class.clone(),
                            name: SmolStr::new(name),
                            raw_type: ty.to_string(),
                        });
                    }
                }
                FrameKind::Other
            }
            "CXXMethodDecl" => match line.name() {
                Some(name) if !name.starts_with("operator") => {
                    let decl = self.callable(line, name);
                    self.push_callable(DeclEvent::Method {
                        class: class.clone(),
                        decl,
                    })
                }
                _ => FrameKind::Ignored,
            },
            "CXXConstructorDecl" => {
                let decl = self.callable(line, class);
                self.push_callable(DeclEvent::Constructor {
                    class: class.clone(),
                    decl,
                })
            }
            "CXXDestructorDecl" => {
                self.events.push(DeclEvent::Destructor {
                    class: class.clone(),
                });
                FrameKind::Ignored
            }
            "CXXRecordDecl" => {
                debug!(class = %class, "skipping nested record");
                FrameKind::Ignored
            }
            _ if TEMPLATE_KINDS.contains(&line.kind) => FrameKind::Ignored,
            _ => FrameKind::Other,
        }
    }

    fn visit_function(&mut self, line: &DumpLine<'_>) -> FrameKind {
        match line.name() {
            Some(name) if !filter::is_reserved_function(name) => {
                let decl = self.callable(line, name);
                self.push_callable(DeclEvent::Function(decl))
            }
            _ => FrameKind::Ignored,
        }
    }

    fn visit_global(&mut self, line: &DumpLine<'_>) {
        let (Some(name), Some(ty)) = (line.name(), line.ty) else {
            return;
        };
        if filter::is_system_variable(name, ty) || line.has_flag("extern") {
            debug!(variable = name, ty, "skipping system variable");
            return;
        }
        self.events.push(DeclEvent::GlobalVar {
            name: SmolStr::new(name),
            raw_type: ty.to_string(),
            has_init: INIT_FLAGS.iter().any(|f| line.trailing.contains(f)),
        });
    }

    fn visit_enum(&mut self, line: &DumpLine<'_>) -> FrameKind {
        let scoped = line.head.contains(&"class") || line.head.contains(&"struct");
        let name = line
            .head
            .iter()
            .copied()
            .rev()
            .find(|t| !PREFIX_FLAGS.contains(t) && !matches!(*t, "class" | "struct"));
        match name {
            Some(name) => {
                let name = SmolStr::new(name);
                self.events.push(DeclEvent::EnumOpen {
                    name: name.clone(),
                    scoped,
                });
                FrameKind::Enum(name)
            }
            None => FrameKind::Ignored,
        }
    }

    fn visit_enumerator(&mut self, enum_name: &SmolStr, line: &DumpLine<'_>) -> FrameKind {
        if line.kind != "EnumConstantDecl" {
            return FrameKind::Other;
        }
        let Some(name) = line.name() else {
            return FrameKind::Other;
        };
        self.events.push(DeclEvent::EnumConstant {
            enum_name: enum_name.clone(),
            name: SmolStr::new(name),
            value: None,
        });
        FrameKind::EnumConstant(self.events.len() - 1)
    }

    /// `value: Int N` under a constant, or a bare literal child.
    fn visit_enum_value(&mut self, idx: usize, line: &DumpLine<'_>, direct: bool) {
        let value = if line.kind == "value:" && line.head.first() == Some(&"Int") {
            line.head.get(1).and_then(|v| v.parse::<i64>().ok())
        } else if direct && line.kind == "IntegerLiteral" {
            line.trailing.first().and_then(|v| v.parse::<i64>().ok())
        } else {
            None
        };
        if let Some(DeclEvent::EnumConstant { value: slot, .. }) = self.events.get_mut(idx) {
            if slot.is_none() {
                *slot = value;
            }
        }
    }

    fn visit_callable_child(&mut self, idx: usize, line: &DumpLine<'_>) -> FrameKind {
        let Some(decl) = self.events.get_mut(idx).and_then(DeclEvent::callable_mut) else {
            return FrameKind::Other;
        };
        match line.kind {
            "ParmVarDecl" => {
                decl.params.push(ParamDecl {
                    name: line.name().map(SmolStr::new),
                    ty: line.ty.unwrap_or_default().to_string(),
                });
            }
            "CompoundStmt" => decl.is_definition = true,
            _ => {}
        }
        FrameKind::Other
    }

    /// Deeper lines: locals inside bodies and constant values.
    fn visit_nested(&mut self, line: &DumpLine<'_>) {
        let nearest = self.stack.iter().rev().find_map(|f| match f.kind {
            FrameKind::Callable(idx) => Some(FrameKind::Callable(idx)),
            FrameKind::EnumConstant(idx) => Some(FrameKind::EnumConstant(idx)),
            _ => None,
        });
        match nearest {
            Some(FrameKind::Callable(idx)) if line.kind == "VarDecl" => {
                let (Some(name), Some(ty)) = (line.name(), line.ty) else {
                    return;
                };
                if let Some(decl) = self.events.get_mut(idx).and_then(DeclEvent::callable_mut) {
                    if !decl.locals.iter().any(|l| l.name == name) {
                        decl.locals.push(LocalDecl {
                            name: SmolStr::new(name),
                            ty: ty.to_string(),
                        });
                    }
                }
            }
            Some(FrameKind::EnumConstant(idx)) => self.visit_enum_value(idx, line, false),
            _ => {}
        }
    }
}

/// Parse a dump with no origin filtering.
pub fn parse_dump(dump: &str) -> Vec<DeclEvent> {
    DumpParser::new().parse(dump)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LED_DUMP: &str = "\
TranslationUnitDecl 0x1 <<invalid sloc>> <invalid sloc>
|-TypedefDecl 0x2 <<invalid sloc>> <invalid sloc> implicit __int128_t '__int128'
| `-BuiltinType 0x3 '__int128'
|-CXXRecordDecl 0x10 </tmp/led.cpp:1:1, line:6:1> line:1:7 referenced class Led definition
| |-DefinitionData pass_in_registers empty standard_layout
| | `-DefaultConstructor exists non_trivial user_provided
| |-CXXRecordDecl 0x11 <col:1, col:7> col:7 implicit referenced class Led
| |-FieldDecl 0x12 <line:2:5, col:10> col:10 referenced state 'bool'
| |-AccessSpecDecl 0x13 <line:3:1, col:7> col:1 public
| |-CXXConstructorDecl 0x14 <line:4:5, col:27> col:5 used Led 'void ()' implicit-inline
| | |-CXXCtorInitializer Field 0x12 'state' 'bool'
| | | `-CXXBoolLiteralExpr 0x15 <col:17> 'bool' false
| | `-CompoundStmt 0x16 <col:26, col:27>
| |-CXXMethodDecl 0x17 <line:5:5, col:33> col:10 used on 'void ()' implicit-inline
| | `-CompoundStmt 0x18 <col:15, col:33>
| |-CXXMethodDecl 0x19 <line:6:5, col:40> col:10 isOn 'bool () const' implicit-inline
| | `-CompoundStmt 0x20 <col:23, col:40>
| `-CXXMethodDecl 0x21 <line:7:5, col:30> col:10 set 'void (bool)'
|   `-ParmVarDecl 0x22 <col:14, col:19> col:19 newState 'bool'
|-CXXMethodDecl 0x23 parent 0x10 prev 0x21 <line:9:1, line:11:1> line:9:11 set 'void (bool)'
| |-ParmVarDecl 0x24 <col:15, col:20> col:20 used newState 'bool'
| `-CompoundStmt 0x25 <col:30, line:11:1>
`-FunctionDecl 0x30 <line:13:1, line:16:1> line:13:5 main 'int ()'
  `-CompoundStmt 0x31 <col:12, line:16:1>
    |-DeclStmt 0x32 <line:14:5, col:12>
    | `-VarDecl 0x33 <col:5, col:9> col:9 used led 'Led' callinit
    |   `-CXXConstructExpr 0x34 <col:9> 'Led' 'void ()'
    `-CXXMemberCallExpr 0x35 <line:15:5, col:12> 'void'
";

    #[test]
    fn test_class_members() {
        let events = parse_dump(LED_DUMP);
        assert_eq!(
            events[0],
            DeclEvent::ClassOpen {
                name: "Led".into(),
                keyword: RecordKeyword::Class,
                origin: Some(PathBuf::from("/tmp/led.cpp")),
            }
        );
        assert_eq!(
            events[1],
            DeclEvent::Field {
                class: "Led".into(),
                name: "state".into(),
                raw_type: "bool".into(),
            }
        );
        let DeclEvent::Constructor { class, decl } = &events[2] else {
            panic!("expected constructor, got {:?}", events[2]);
        };
        assert_eq!(class, "Led");
        assert!(decl.is_definition);

        let methods: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                DeclEvent::Method { decl, .. } => Some((decl.name.as_str(), decl.is_definition)),
                _ => None,
            })
            .collect();
        assert_eq!(
            methods,
            vec![("on", true), ("isOn", true), ("set", false), ("set", true)]
        );
    }

    #[test]
    fn test_out_of_line_member_params() {
        let events = parse_dump(LED_DUMP);
        let DeclEvent::Method { class, decl } = &events[6] else {
            panic!("expected out-of-line method, got {:?}", events[6]);
        };
        assert_eq!(class, "Led");
        assert_eq!(decl.raw_type, "void (bool)");
        assert_eq!(decl.params[0].name.as_deref(), Some("newState"));
        assert_eq!(decl.params[0].ty, "bool");
    }

    #[test]
    fn test_function_locals() {
        let events = parse_dump(LED_DUMP);
        let Some(DeclEvent::Function(main)) = events.last() else {
            panic!("expected main last");
        };
        assert_eq!(main.name, "main");
        assert!(main.is_definition);
        assert_eq!(
            main.locals,
            vec![LocalDecl {
                name: "led".into(),
                ty: "Led".into()
            }]
        );
    }

    #[test]
    fn test_enums() {
        let dump = "\
TranslationUnitDecl 0x1 <<invalid sloc>> <invalid sloc>
|-EnumDecl 0x2 </tmp/a.cpp:1:1, line:1:40> line:1:12 referenced class LedId 'int'
| |-EnumConstantDecl 0x3 <col:20> col:20 referenced LED_0 'LedId'
| `-EnumConstantDecl 0x4 <col:27, col:35> col:27 LED_1 'LedId'
|   `-ConstantExpr 0x5 <col:35> 'int'
|     |-value: Int 5
|     `-IntegerLiteral 0x6 <col:35> 'int' 5
|-EnumDecl 0x7 <line:2:1, col:30> col:6 Color
| `-EnumConstantDecl 0x8 <col:14, col:20> col:14 RED 'Color'
|   `-IntegerLiteral 0x9 <col:20> 'int' 3
`-EnumDecl 0xa <line:3:1, col:12> col:1
  `-EnumConstantDecl 0xb <col:8> col:8 HIDDEN '(unnamed enum at /tmp/a.cpp:3:1)'
";
        let events = parse_dump(dump);
        assert_eq!(
            events,
            vec![
                DeclEvent::EnumOpen {
                    name: "LedId".into(),
                    scoped: true
                },
                DeclEvent::EnumConstant {
                    enum_name: "LedId".into(),
                    name: "LED_0".into(),
                    value: None
                },
                DeclEvent::EnumConstant {
                    enum_name: "LedId".into(),
                    name: "LED_1".into(),
                    value: Some(5)
                },
                DeclEvent::EnumOpen {
                    name: "Color".into(),
                    scoped: false
                },
                DeclEvent::EnumConstant {
                    enum_name: "Color".into(),
                    name: "RED".into(),
                    value: Some(3)
                },
            ]
        );
    }

    #[test]
    fn test_later_struct_does_not_capture_fields() {
        let dump = "\
TranslationUnitDecl 0x1 <<invalid sloc>> <invalid sloc>
|-CXXRecordDecl 0x2 </tmp/a.cpp:1:1, line:3:1> line:1:7 class Led definition
| `-FieldDecl 0x3 <line:2:5, col:10> col:10 state 'bool'
|-VarDecl 0x4 </tmp/xc.h:5:1, line:8:3> line:8:3 PORTAbits 'struct (unnamed struct at /tmp/xc.h:5:1)':'struct (unnamed struct at /tmp/xc.h:5:1)'
|-CXXRecordDecl 0x5 </tmp/xc.h:5:1, line:8:1> line:5:1 struct definition
| `-FieldDecl 0x6 <line:6:5, col:18> col:14 RA0 'unsigned int'
`-FieldDecl 0x7 <line:9:5, col:10> col:10 stray 'int'
";
        let events = parse_dump(dump);
        let fields: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                DeclEvent::Field { class, name, .. } => Some((class.as_str(), name.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(fields, vec![("Led", "state")]);
        assert!(!events
            .iter()
            .any(|e| matches!(e, DeclEvent::GlobalVar { .. })));
    }

    #[test]
    fn test_origin_filter_and_globals() {
        let dump = "\
TranslationUnitDecl 0x1 <<invalid sloc>> <invalid sloc>
|-FunctionDecl 0x2 </usr/include/stdlib.h:10:1, col:20> col:12 abs 'int (int)'
| `-ParmVarDecl 0x3 <col:16> col:19 'int'
|-VarDecl 0x4 </src/main.cpp:3:1, col:20> col:8 timer 'Timer0' callinit
|-VarDecl 0x5 <line:4:1, col:15> col:5 counter 'int' cinit
| `-IntegerLiteral 0x6 <col:15> 'int' 0
`-FunctionDecl 0x7 <line:6:1, col:30> col:6 log 'void (int, int)'
  |-ParmVarDecl 0x8 <col:10, col:14> col:14 x 'int'
  `-ParmVarDecl 0x9 <col:17> col:20 'int'
";
        let events = DumpParser::new().with_origins(["main.cpp"]).parse(dump);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            DeclEvent::GlobalVar {
                name: "timer".into(),
                raw_type: "Timer0".into(),
                has_init: true
            }
        );
        let DeclEvent::Function(log) = &events[2] else {
            panic!("expected log, got {:?}", events[2]);
        };
        assert!(!log.is_definition);
        assert_eq!(log.params[1].name, None);
        assert_eq!(log.params[1].ty, "int");
    }

    #[test]
    fn test_line_splitting() {
        let line = parse_line(
            "| |-VarDecl 0x4 <line:2:1, col:20> col:9 used count 'uint8_t':'unsigned char' static cinit",
        )
        .unwrap();
        assert_eq!(line.depth, 2);
        assert_eq!(line.kind, "VarDecl");
        assert_eq!(line.name(), Some("count"));
        assert_eq!(line.ty, Some("uint8_t"));
        assert_eq!(line.trailing, vec!["static", "cinit"]);
        assert!(line.files.is_empty());
    }

    #[test]
    fn test_templates_and_ansi_are_skipped() {
        let dump = "TranslationUnitDecl 0x1 <<invalid sloc>> <invalid sloc>\n\
|-ClassTemplateDecl 0x2 </tmp/t.cpp:1:1, line:3:1> line:2:7 Box\n\
| `-CXXRecordDecl 0x3 <line:2:1, line:3:1> line:2:7 class Box definition\n\
`-\u{1b}[0;1;32mFunctionDecl\u{1b}[0m 0x4 <line:5:1, col:12> col:6 tick 'void ()'\n";
        let events = parse_dump(dump);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DeclEvent::Function(f) if f.name == "tick"));
    }
}
