//! Finding callable bodies in the raw source text.
//!
//! Each corpus file is tokenized once and indexed into the definitions it
//! contains: inline members inside `class { ... }` blocks, out-of-line
//! `Class::name(...) { ... }` members, free functions, and global object
//! initializers. Lookups then pick among the indexed candidates.

use smol_str::SmolStr;
use std::path::PathBuf;
use tracing::debug;
use xc8pp_common::{SourceCorpus, SourceFile, Span};
use xc8pp_model::{Body, ClassModel, FunctionModel, GlobalVariable, ProgramModel};

use crate::lexer::{join_tokens, matching_close, significant, tokenize, Token, TokenKind};

/// Builtin words that can end a parameter's type, so they are never its name.
const TYPE_WORDS: &[&str] = &[
    "int", "char", "short", "long", "unsigned", "signed", "float", "double", "bool", "void",
    "const", "volatile",
];

/// Words that can follow a parameter list before the body.
const FUNCTION_QUALIFIERS: &[&str] = &["const", "volatile", "noexcept", "override", "final"];

/// Names followed by `(` at file scope that are never definitions.
const NOT_CALLABLE: &[&str] = &[
    "static_assert",
    "decltype",
    "alignas",
    "sizeof",
    "__attribute__",
    "__declspec",
];

/// A parameter as written in a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamText {
    pub ty: String,
    pub name: Option<SmolStr>,
}

/// One brace-delimited definition.
#[derive(Debug, Clone)]
pub struct Definition {
    /// Enclosing class for inline members, qualifier for out-of-line ones.
    pub owner: Option<SmolStr>,
    pub name: SmolStr,
    /// Written inside the class body.
    pub inline: bool,
    pub params: Vec<ParamText>,
    pub init_list: Option<String>,
    pub body: String,
    pub body_span: Span,
}

/// `Type name(args);`, `Type name{args};` or `Type name = Type(args);` at file scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalInit {
    pub ty: SmolStr,
    pub name: SmolStr,
    pub args: String,
}

/// Everything found in one file.
#[derive(Debug, Clone)]
pub struct FileIndex {
    pub path: PathBuf,
    pub definitions: Vec<Definition>,
    /// Class name and the span of its `class ... { ... }` text.
    pub classes: Vec<(SmolStr, Span)>,
    pub globals: Vec<GlobalInit>,
}

#[derive(Debug)]
enum Scope {
    /// File scope, namespaces, `extern "C"` blocks.
    Transparent,
    Class { name: SmolStr, start: u32 },
    Skip,
}

/// `const uint8_t[4]` -> `uint8_t`, `hw::Led *` -> `Led`.
fn base_type_word(ty: &str) -> &str {
    let ty = ty.split('[').next().unwrap_or(ty);
    let ty = ty.trim_end_matches(|c: char| c == '*' || c == '&' || c.is_whitespace());
    let ty = ty.split_whitespace().last().unwrap_or_default();
    ty.rsplit("::").next().unwrap_or(ty)
}

fn normalize_type(ty: &str) -> String {
    ty.chars().filter(|c| !c.is_whitespace()).collect()
}

struct Indexer<'s, 't> {
    src: &'s str,
    tokens: &'t [Token<'s>],
    sig: Vec<usize>,
}

impl<'s, 't> Indexer<'s, 't> {
    fn tok(&self, k: usize) -> Option<&'t Token<'s>> {
        self.sig.get(k).map(|&i| &self.tokens[i])
    }

    fn is_punct(&self, k: usize, p: &str) -> bool {
        self.tok(k).is_some_and(|t| t.is_punct(p))
    }

    fn close(&self, k: usize) -> Option<usize> {
        matching_close(self.tokens, &self.sig, k)
    }

    /// Source text strictly between two significant tokens.
    fn text_between(&self, open: usize, close: usize) -> &'s str {
        match (self.tok(open), self.tok(close)) {
            (Some(a), Some(b)) => &self.src[a.span.end as usize..b.span.start as usize],
            _ => "",
        }
    }

    /// First of `stops` at or after `k`.
    fn find_forward(&self, k: usize, stops: &[&str]) -> Option<(usize, &'s str)> {
        (k..self.sig.len()).find_map(|j| {
            let t = self.tok(j)?;
            stops
                .iter()
                .find(|s| t.is_punct(s))
                .map(|_| (j, t.text))
        })
    }

    /// Skip a `<...>` group starting at `k`; returns the index after it.
    fn skip_angles(&self, k: usize) -> usize {
        let mut depth = 0usize;
        let mut j = k;
        while let Some(t) = self.tok(j) {
            if t.is_punct("<") {
                depth += 1;
            } else if t.is_punct(">") {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return j + 1;
                }
            } else if t.is_punct(";") || t.is_punct("{") {
                return j;
            }
            j += 1;
        }
        j
    }

    /// `a :: b :: ~c` starting at `k`. Returns the segments and the index after the chain.
    fn chain(&self, k: usize) -> (Vec<SmolStr>, usize) {
        let mut segments = Vec::new();
        let mut j = k;
        loop {
            let tilde = self.is_punct(j, "~");
            let at = if tilde { j + 1 } else { j };
            match self.tok(at) {
                Some(t) if t.is_ident() => {
                    let name = if tilde {
                        SmolStr::new(format!("~{}", t.text))
                    } else {
                        SmolStr::new(t.text)
                    };
                    segments.push(name);
                    j = at + 1;
                }
                _ => break,
            }
            if self.is_punct(j, "::") {
                j += 1;
            } else {
                break;
            }
        }
        (segments, j)
    }

    /// Skip qualifiers after a parameter list. Returns the next index.
    fn skip_qualifiers(&self, mut k: usize) -> usize {
        while let Some(t) = self.tok(k) {
            if FUNCTION_QUALIFIERS.iter().any(|q| t.is_keyword(q))
                || t.is_punct("&")
                || t.is_keyword("throw")
            {
                k += 1;
                if self.is_punct(k, "(") {
                    k = self.close(k).map_or(k + 1, |c| c + 1);
                }
            } else if t.is_punct("->") {
                // Trailing return type.
                while let Some(t) = self.tok(k) {
                    if t.is_punct("{") || t.is_punct(";") || t.is_punct(":") {
                        break;
                    }
                    k += 1;
                }
            } else {
                break;
            }
        }
        k
    }

    /// Member initializer list after `:`. Returns the index of the body `{`.
    fn skip_init_list(&self, mut k: usize) -> Option<usize> {
        loop {
            let (segments, after) = self.chain(k);
            if segments.is_empty() {
                return None;
            }
            k = after;
            if self.is_punct(k, "<") {
                k = self.skip_angles(k);
            }
            if !(self.is_punct(k, "(") || self.is_punct(k, "{")) {
                return None;
            }
            k = self.close(k)? + 1;
            if self.is_punct(k, ",") {
                k += 1;
                continue;
            }
            return self.is_punct(k, "{").then_some(k);
        }
    }

    /// Skip `[...]` groups ending at `k`, walking backwards. Returns the
    /// index of the token before the first `[`.
    fn skip_dims_back(&self, mut k: usize) -> Option<usize> {
        while self.is_punct(k, "]") {
            let mut depth = 0usize;
            loop {
                let t = self.tok(k)?;
                if t.is_punct("]") {
                    depth += 1;
                } else if t.is_punct("[") {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                k = k.checked_sub(1)?;
            }
            k = k.checked_sub(1)?;
        }
        Some(k)
    }

    /// Skip `[...]` groups starting at `k`. Returns the index after them.
    fn skip_dims(&self, mut k: usize) -> usize {
        while self.is_punct(k, "[") {
            match self.close(k) {
                Some(close) => k = close + 1,
                None => return k,
            }
        }
        k
    }

    /// First token of the declaration containing `k`.
    fn statement_start(&self, k: usize) -> usize {
        let mut depth = 0usize;
        let mut j = k;
        while j > 0 {
            let Some(t) = self.tok(j - 1) else { break };
            if t.kind == TokenKind::Punct {
                match t.text {
                    ")" | "]" => depth += 1,
                    "(" | "[" => depth = depth.saturating_sub(1),
                    // `= {1, 2}, next`
                    "}" if self.is_punct(j, ",") || depth > 0 => depth += 1,
                    "{" if depth > 0 => depth -= 1,
                    ";" | "{" | "}" if depth == 0 => break,
                    _ => {}
                }
            }
            j -= 1;
        }
        j
    }

    /// Type written before the first declarator of the declaration containing `k`.
    fn declared_type(&self, k: usize) -> Option<&'s str> {
        let start = self.statement_start(k);
        let first = (start + 1..=k).find(|&j| {
            self.tok(j).is_some_and(|t| t.is_ident())
                && self
                    .tok(j + 1)
                    .is_some_and(|t| ["(", "{", "=", ",", ";", "["].iter().any(|p| t.is_punct(p)))
        })?;
        let mut j = first.checked_sub(1)?;
        while self.is_punct(j, "*") || self.is_punct(j, "&") {
            j = j.checked_sub(1)?;
        }
        self.tok(j).filter(|t| t.is_ident()).map(|t| t.text)
    }

    /// End of the initializer expression starting at `k`: the next `;` or
    /// `,` outside any bracket.
    fn expr_end(&self, k: usize) -> Option<usize> {
        let mut depth = 0usize;
        for j in k..self.sig.len() {
            let t = self.tok(j)?;
            if t.kind != TokenKind::Punct {
                continue;
            }
            match t.text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth = depth.saturating_sub(1),
                ";" | "," if depth == 0 => return Some(j),
                _ => {}
            }
        }
        None
    }

    fn params(&self, open: usize, close: usize) -> Vec<ParamText> {
        let mut groups: Vec<Vec<&Token<'s>>> = vec![Vec::new()];
        let mut depth = 0usize;
        for k in open + 1..close {
            let Some(t) = self.tok(k) else { break };
            match t.text {
                "(" | "[" | "{" | "<" if t.kind == TokenKind::Punct => depth += 1,
                ")" | "]" | "}" | ">" if t.kind == TokenKind::Punct => depth = depth.saturating_sub(1),
                "," if depth == 0 && t.kind == TokenKind::Punct => {
                    groups.push(Vec::new());
                    continue;
                }
                _ => {}
            }
            if let Some(group) = groups.last_mut() {
                group.push(t);
            }
        }

        groups
            .into_iter()
            .filter_map(|mut group| {
                if let Some(eq) = group.iter().position(|t| t.is_punct("=")) {
                    group.truncate(eq);
                }
                if group.is_empty() || (group.len() == 1 && group[0].is_keyword("void")) {
                    return None;
                }
                Some(param_text(&group))
            })
            .collect()
    }
}

fn param_text(group: &[&Token<'_>]) -> ParamText {
    // `int a[4]`: the name sits before the first `[`.
    let end = group
        .iter()
        .position(|t| t.is_punct("["))
        .unwrap_or(group.len());
    let named = end >= 2
        && group[end - 1].is_ident()
        && !TYPE_WORDS.contains(&group[end - 1].text)
        && !group[end - 2].is_punct("::");
    if named {
        let mut ty: Vec<&Token<'_>> = group[..end - 1].to_vec();
        ty.extend_from_slice(&group[end..]);
        ParamText {
            ty: join_tokens(&ty),
            name: Some(SmolStr::new(group[end - 1].text)),
        }
    } else {
        ParamText {
            ty: join_tokens(group),
            name: None,
        }
    }
}

/// Index one source file.
pub fn index_file(file: &SourceFile) -> FileIndex {
    let tokens = tokenize(&file.content);
    let ix = Indexer {
        src: &file.content,
        tokens: &tokens,
        sig: significant(&tokens),
    };
    let mut out = FileIndex {
        path: file.path.clone(),
        definitions: Vec::new(),
        classes: Vec::new(),
        globals: Vec::new(),
    };
    let mut scopes: Vec<Scope> = Vec::new();

    let mut k = 0;
    while let Some(tok) = ix.tok(k) {
        if tok.is_punct("}") {
            if let Some(Scope::Class { name, start }) = scopes.pop() {
                out.classes.push((name, Span::new(start, tok.span.end)));
            }
            k += 1;
            continue;
        }

        let class = match scopes.last() {
            Some(Scope::Skip) => {
                if tok.is_punct("{") {
                    scopes.push(Scope::Skip);
                }
                k += 1;
                continue;
            }
            Some(Scope::Class { name, .. }) => Some(name.clone()),
            _ => None,
        };

        if tok.is_keyword("namespace") {
            match ix.find_forward(k, &["{", ";"]) {
                Some((open, "{")) => {
                    scopes.push(Scope::Transparent);
                    k = open + 1;
                }
                Some((end, _)) => k = end + 1,
                None => break,
            }
            continue;
        }

        if tok.is_keyword("extern")
            && ix.tok(k + 1).is_some_and(|t| t.kind == TokenKind::Str)
            && ix.is_punct(k + 2, "{")
        {
            scopes.push(Scope::Transparent);
            k += 3;
            continue;
        }

        if tok.is_keyword("template") && ix.is_punct(k + 1, "<") {
            k = ix.skip_angles(k + 1);
            continue;
        }

        if tok.is_keyword("enum") {
            match ix.find_forward(k, &["{", ";"]) {
                Some((open, "{")) => k = ix.close(open).map_or(open + 1, |c| c + 1),
                Some((end, _)) => k = end + 1,
                None => break,
            }
            continue;
        }

        if tok.is_keyword("class") || tok.is_keyword("struct") || tok.is_keyword("union") {
            let name = ix
                .tok(k + 1)
                .filter(|t| t.is_ident())
                .map(|t| SmolStr::new(t.text));
            if let Some((open, "{")) = ix.find_forward(k + 1, &["{", ";", "=", "(", ")"]) {
                match name {
                    Some(name) if !tok.is_keyword("union") => scopes.push(Scope::Class {
                        name,
                        start: tok.span.start,
                    }),
                    _ => scopes.push(Scope::Skip),
                }
                k = open + 1;
            } else {
                k += 1;
            }
            continue;
        }

        if tok.is_punct("{") {
            // Brace initializer or some other block at file or class scope.
            let close = ix.close(k);
            if class.is_none() {
                if let Some(init) = brace_init(&ix, k, close) {
                    out.globals.push(init);
                }
            }
            k = close.map_or(k + 1, |c| c + 1);
            continue;
        }

        if tok.is_ident() || tok.is_punct("~") {
            let (segments, after) = ix.chain(k);
            if segments.is_empty() {
                k += 1;
                continue;
            }
            let Some(name) = segments.last().cloned() else {
                k += 1;
                continue;
            };
            let declarator_end = ix.skip_dims(after);
            if class.is_none() && segments.len() == 1 && ix.is_punct(declarator_end, "=") {
                if let Some((end, init)) = assigned_init(&ix, k, &name, declarator_end) {
                    out.globals.push(init);
                    k = end + 1;
                    continue;
                }
            }
            if !ix.is_punct(after, "(") || NOT_CALLABLE.contains(&name.as_str()) || name == "operator" {
                k = after.max(k + 1);
                continue;
            }
            let Some(params_close) = ix.close(after) else {
                break;
            };

            let mut next = ix.skip_qualifiers(params_close + 1);
            let mut init_list = None;
            if ix.is_punct(next, ":") {
                if let Some(open) = ix.skip_init_list(next + 1) {
                    init_list = Some(ix.text_between(next, open).trim().to_string());
                    next = open;
                }
            }

            if ix.is_punct(next, "{") {
                let Some(body_close) = ix.close(next) else {
                    break;
                };
                let (owner, inline) = match (&class, segments.len()) {
                    (Some(class), 1) => (Some(class.clone()), true),
                    (_, n) if n >= 2 => (Some(segments[n - 2].clone()), false),
                    _ => (None, false),
                };
                let body_span = match (ix.tok(next), ix.tok(body_close)) {
                    (Some(a), Some(b)) => Span::new(a.span.end, b.span.start),
                    _ => Span::default(),
                };
                out.definitions.push(Definition {
                    owner,
                    name,
                    inline,
                    params: ix.params(after, params_close),
                    init_list,
                    body: ix.text_between(next, body_close).to_string(),
                    body_span,
                });
                k = body_close + 1;
                continue;
            }

            let ends_declarator =
                ix.is_punct(params_close + 1, ";") || ix.is_punct(params_close + 1, ",");
            if class.is_none() && segments.len() == 1 && ends_declarator {
                if let Some(init) = paren_init(&ix, k, &name, after, params_close) {
                    out.globals.push(init);
                }
            }
            k = params_close + 1;
            continue;
        }

        k += 1;
    }
    out
}

/// `Type name(args)` or `Type name = Type(args)` whose name token is at `k`,
/// ended by `;` or by `,` before another declarator.
fn paren_init(ix: &Indexer<'_, '_>, k: usize, name: &SmolStr, open: usize, close: usize) -> Option<GlobalInit> {
    let args = ix.text_between(open, close).trim();
    if args.is_empty() || k == 0 {
        return None;
    }
    // `Led led = Led(args);`
    if ix.is_punct(k - 1, "=") {
        let var = ix.tok(ix.skip_dims_back(k.checked_sub(2)?)?).filter(|t| t.is_ident())?;
        return (ix.declared_type(k)? == name.as_str()).then(|| GlobalInit {
            ty: name.clone(),
            name: SmolStr::new(var.text),
            args: args.to_string(),
        });
    }
    let ty = ix.declared_type(k)?;
    if TYPE_WORDS.contains(&ty) || ty == name.as_str() {
        return None;
    }
    Some(GlobalInit {
        ty: SmolStr::new(ty),
        name: name.clone(),
        args: args.to_string(),
    })
}

/// `Type name = expr` or `Type name[N] = "text"`, leaving braced and
/// `Type(args)` forms to the other scanners. Returns the index of the `;`
/// or `,` ending the initializer.
fn assigned_init(ix: &Indexer<'_, '_>, k: usize, name: &SmolStr, eq: usize) -> Option<(usize, GlobalInit)> {
    let ty = ix.declared_type(k)?;
    let value = ix.tok(eq + 1)?;
    if value.is_punct("{") {
        return None;
    }
    if value.text == ty && ix.is_punct(eq + 2, "(") {
        return None;
    }
    let end = ix.expr_end(eq + 1)?;
    let args = ix.text_between(eq, end).trim();
    (!args.is_empty()).then(|| {
        (
            end,
            GlobalInit {
                ty: SmolStr::new(ty),
                name: name.clone(),
                args: args.to_string(),
            },
        )
    })
}

/// `Type name{args}`, `Type name = {args}` or `Type name[N] = {args}` with
/// the `{` at `open`.
fn brace_init(ix: &Indexer<'_, '_>, open: usize, close: Option<usize>) -> Option<GlobalInit> {
    let close = close?;
    if !(ix.is_punct(close + 1, ";") || ix.is_punct(close + 1, ",")) {
        return None;
    }
    let mut before = open.checked_sub(1)?;
    if ix.is_punct(before, "=") {
        before = before.checked_sub(1)?;
    }
    let var_at = ix.skip_dims_back(before)?;
    let var = ix.tok(var_at).filter(|t| t.is_ident())?;
    let ty = ix.declared_type(var_at)?;
    let args = ix.text_between(open, close).trim();
    (ty != var.text && !args.is_empty()).then(|| GlobalInit {
        ty: SmolStr::new(ty),
        name: SmolStr::new(var.text),
        args: args.to_string(),
    })
}

/// Body lookups over a whole corpus.
#[derive(Debug, Clone, Default)]
pub struct Locator {
    files: Vec<FileIndex>,
}

type Candidate<'a> = (&'a FileIndex, &'a Definition);

impl Locator {
    pub fn new(corpus: &SourceCorpus) -> Self {
        Self {
            files: corpus.iter().map(index_file).collect(),
        }
    }

    pub fn files(&self) -> &[FileIndex] {
        &self.files
    }

    /// Inline candidates first, then out-of-line ones.
    fn member_candidates(&self, class: &str, name: &str) -> Vec<Candidate<'_>> {
        let all = self.files.iter().flat_map(|f| {
            f.definitions
                .iter()
                .filter(move |d| d.owner.as_deref() == Some(class) && d.name == name)
                .map(move |d| (f, d))
        });
        let (mut inline, out_of_line): (Vec<_>, Vec<_>) = all.partition(|(_, d)| d.inline);
        inline.extend(out_of_line);
        inline
    }

    fn free_candidates(&self, name: &str) -> Vec<Candidate<'_>> {
        self.files
            .iter()
            .flat_map(|f| {
                f.definitions
                    .iter()
                    .filter(move |d| d.owner.is_none() && d.name == name)
                    .map(move |d| (f, d))
            })
            .collect()
    }

    /// Pick the candidate for `function` among all definitions of its name.
    /// `siblings` are every signature sharing the name, `function` included.
    fn select<'a>(
        &self,
        candidates: Vec<Candidate<'a>>,
        function: &FunctionModel,
        siblings: &[FunctionModel],
    ) -> Option<Candidate<'a>> {
        let wanted: Vec<String> = function.param_types().iter().map(|t| normalize_type(t)).collect();
        let exact = candidates.iter().find(|(_, d)| {
            d.params.len() == wanted.len()
                && d.params.iter().zip(&wanted).all(|(p, w)| normalize_type(&p.ty) == *w)
        });
        if let Some(found) = exact {
            return Some(*found);
        }

        let arity = function.params.len();
        let same_arity: Vec<Candidate<'a>> = candidates
            .iter()
            .copied()
            .filter(|(_, d)| d.params.len() == arity)
            .collect();
        match same_arity.len() {
            0 => {}
            1 => return Some(same_arity[0]),
            n => {
                let ordinal = siblings
                    .iter()
                    .filter(|s| s.params.len() == arity)
                    .position(|s| s == function)
                    .unwrap_or(0);
                debug!(
                    name = %function.name,
                    candidates = n,
                    ordinal,
                    "ambiguous overload match, picking by position"
                );
                return same_arity.get(ordinal).or(same_arity.first()).copied();
            }
        }

        // The dump can under-report parameters; a lone definition still matches.
        if candidates.len() == 1 && siblings.len() <= 1 {
            return candidates.first().copied();
        }
        None
    }

    fn body((file, def): Candidate<'_>) -> Body {
        Body {
            text: def.body.clone(),
            file: file.path.clone(),
            param_names: def.params.iter().map(|p| p.name.clone()).collect(),
            init_list: def.init_list.clone(),
        }
    }

    pub fn method_body(&self, class: &ClassModel, method: &FunctionModel) -> Option<Body> {
        let candidates = self.member_candidates(&class.name, &method.name);
        self.select(candidates, method, std::slice::from_ref(method))
            .map(Self::body)
    }

    pub fn constructor_body(&self, class: &ClassModel, ctor: &FunctionModel) -> Option<Body> {
        let candidates = self.member_candidates(&class.name, &class.name);
        self.select(candidates, ctor, &class.constructors)
            .map(Self::body)
    }

    pub fn function_body(&self, function: &FunctionModel, siblings: &[FunctionModel]) -> Option<Body> {
        let candidates = self.free_candidates(&function.name);
        self.select(candidates, function, siblings).map(Self::body)
    }

    /// Constructor arguments written at the global's declaration.
    pub fn global_init_args(&self, global: &GlobalVariable) -> Option<String> {
        let ty = base_type_word(&global.ty);
        self.files
            .iter()
            .flat_map(|f| f.globals.iter())
            .find(|g| g.name == global.name && (g.ty == ty || ty.is_empty()))
            .map(|g| g.args.clone())
    }

    /// Fill every missing body and global initializer in `model`.
    /// Returns the names of callables whose body was not found.
    pub fn fill(&self, model: &mut ProgramModel) -> Vec<String> {
        let mut missing = Vec::new();

        for class in model.classes.values_mut() {
            let snapshot = class.clone();
            for ctor in class.constructors.iter_mut().filter(|c| c.body.is_none()) {
                ctor.body = self.constructor_body(&snapshot, ctor);
                if ctor.body.is_none() {
                    missing.push(ctor.c_name.to_string());
                }
            }
            for method in class.methods.values_mut().filter(|m| m.body.is_none()) {
                method.body = self.method_body(&snapshot, method);
                if method.body.is_none() {
                    missing.push(method.c_name.to_string());
                }
            }
        }

        for set in model.functions.values_mut() {
            let siblings = set.signatures.clone();
            for function in set.signatures.iter_mut().filter(|f| f.body.is_none()) {
                function.body = self.function_body(function, &siblings);
                if function.body.is_none() {
                    missing.push(function.c_name.to_string());
                }
            }
        }

        if let Some(main) = model.main.as_mut().filter(|m| m.body.is_none()) {
            main.body = self.function_body(main, &[]);
            if main.body.is_none() {
                missing.push("main".to_string());
            }
        }

        for global in &mut model.globals {
            if global.init_args.is_none() {
                global.init_args = self.global_init_args(global);
            }
        }

        for name in &missing {
            debug!(name = %name, "no body found, a default stub will be emitted");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(src: &str) -> FileIndex {
        index_file(&SourceFile::new(PathBuf::from("t.cpp"), src.to_string()))
    }

    #[test]
    fn test_inline_and_out_of_line_members() {
        let idx = index(
            "class Led {\n  bool state;\npublic:\n  Led() : state(false) {}\n  void on() { state = true; }\n  bool isOn() const { return state; }\n  void set(bool v);\n};\nvoid Led::set(bool newState) {\n  state = newState;\n}\n",
        );
        let names: Vec<_> = idx
            .definitions
            .iter()
            .map(|d| (d.owner.as_deref(), d.name.as_str(), d.inline))
            .collect();
        assert_eq!(
            names,
            vec![
                (Some("Led"), "Led", true),
                (Some("Led"), "on", true),
                (Some("Led"), "isOn", true),
                (Some("Led"), "set", false),
            ]
        );
        assert_eq!(idx.definitions[0].init_list.as_deref(), Some("state(false)"));
        assert_eq!(idx.definitions[1].body.trim(), "state = true;");
        assert_eq!(idx.definitions[3].params[0].name.as_deref(), Some("newState"));
        assert_eq!(idx.classes[0].0, "Led");
    }

    #[test]
    fn test_braces_in_literals_and_comments() {
        let idx = index("void show() {\n  puts(\"}\"); // }\n  char c = '{';\n}\nint after() { return 1; }\n");
        assert_eq!(idx.definitions.len(), 2);
        assert!(idx.definitions[0].body.contains("char c = '{';"));
        assert_eq!(idx.definitions[1].name, "after");
    }

    #[test]
    fn test_params_and_qualifiers() {
        let idx = index(
            "void log(int x, const char* tag = \"\") {}\nvoid blink(unsigned int, bool) {}\nvoid fill(uint8_t buf[8]) {}\n",
        );
        let log = &idx.definitions[0].params;
        assert_eq!(log[0], ParamText { ty: "int".into(), name: Some("x".into()) });
        assert_eq!(log[1].ty, "const char *");
        let blink = &idx.definitions[1].params;
        assert_eq!(blink[0], ParamText { ty: "unsigned int".into(), name: None });
        let fill = &idx.definitions[2].params;
        assert_eq!(fill[0], ParamText { ty: "uint8_t [ 8 ]".into(), name: Some("buf".into()) });
    }

    #[test]
    fn test_global_initializers() {
        let idx = index(
            "Led status(LedId::LED_0);\nPin pins{1, 2};\nTimer t = Timer(5);\nint plain = 3;\n__CONFIG(0x3F39);\nLed idle;\n",
        );
        assert_eq!(
            idx.globals,
            vec![
                GlobalInit { ty: "Led".into(), name: "status".into(), args: "LedId::LED_0".into() },
                GlobalInit { ty: "Pin".into(), name: "pins".into(), args: "1, 2".into() },
                GlobalInit { ty: "Timer".into(), name: "t".into(), args: "5".into() },
                GlobalInit { ty: "int".into(), name: "plain".into(), args: "3".into() },
            ]
        );
    }

    #[test]
    fn test_array_and_multi_declarator_globals() {
        let idx = index(
            "uint8_t pattern[4] = {1, 2, 4, 8};\nint grid[2][2] = {{1, 2}, {3, 4}};\nconst char msg[] = \"hi\";\nLed a(1), b(2);\nint lo = f(1, 2), hi = 9;\nPin *p = 0, q{3};\nvoid g(int);\n",
        );
        let found: Vec<_> = idx
            .globals
            .iter()
            .map(|g| (g.ty.as_str(), g.name.as_str(), g.args.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("uint8_t", "pattern", "1, 2, 4, 8"),
                ("int", "grid", "{1, 2}, {3, 4}"),
                ("char", "msg", "\"hi\""),
                ("Led", "a", "1"),
                ("Led", "b", "2"),
                ("int", "lo", "f(1, 2)"),
                ("int", "hi", "9"),
                ("Pin", "p", "0"),
                ("Pin", "q", "3"),
            ]
        );
    }

    #[test]
    fn test_array_global_lookup() {
        let mut corpus = SourceCorpus::new();
        corpus.insert("/src/table.cpp", "const uint8_t pattern[4] = {1, 2, 4, 8};\n");
        let locator = Locator::new(&corpus);
        let global = GlobalVariable {
            name: "pattern".into(),
            ty: "const uint8_t[4]".into(),
            has_init: true,
            init_args: None,
        };
        assert_eq!(locator.global_init_args(&global).as_deref(), Some("1, 2, 4, 8"));
    }

    #[test]
    fn test_isr_and_namespaces() {
        let idx = index(
            "namespace hw {\nvoid __interrupt() isr(void) { tick(); }\n}\nextern \"C\" {\nint helper() { return 0; }\n}\n",
        );
        let names: Vec<_> = idx.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["isr", "helper"]);
        assert!(idx.definitions[0].params.is_empty());
    }
}
