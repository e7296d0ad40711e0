//! Token-level rewriting of C++ body text into C.
//!
//! The rewriter walks the lossless token stream of a body and replaces
//! tokens or short token runs in place; everything else, including
//! comments and layout, is copied through unchanged.

use smol_str::SmolStr;
use tracing::debug;
use xc8pp_model::types::mangle_tag;
use xc8pp_model::{CType, ClassModel, FunctionModel, ProgramModel, TypeEnv};

use crate::lexer::{matching_close, significant, tokenize, Token, TokenKind};
use crate::scope::{declaration_at, BindingKind, Scope};

/// Punctuation that forms a compound operator with a following `=`.
const COMPOUND_PREFIX: &[char] = &['=', '<', '>', '!', '+', '-', '*', '/', '%', '&', '|', '^'];

/// Name and type of a local visible to a fragment.
type Visible = Vec<(SmolStr, String)>;

/// A local declared in the fragment, visible to significant tokens `from..to`.
#[derive(Debug)]
struct BlockLocal {
    name: SmolStr,
    ty: String,
    from: usize,
    to: usize,
}

/// A tokenized fragment with lookup helpers over its significant tokens.
struct Cursor<'s> {
    src: &'s str,
    tokens: Vec<Token<'s>>,
    sig: Vec<usize>,
    locals: Vec<BlockLocal>,
    /// Locals of the enclosing text when the fragment is an argument list.
    outer: Visible,
}

impl<'s> Cursor<'s> {
    fn new(src: &'s str) -> Self {
        let tokens = tokenize(src);
        let sig = significant(&tokens);
        Self {
            src,
            tokens,
            sig,
            locals: Vec::new(),
            outer: Vec::new(),
        }
    }

    /// Record the locals declared in the fragment and the block each one lives in.
    fn with_locals(mut self, env: &dyn TypeEnv, outer: Visible) -> Self {
        let sig: Vec<&Token<'s>> = self.sig.iter().map(|&i| &self.tokens[i]).collect();
        let mut block_ends: Vec<usize> = Vec::new();
        let mut locals = Vec::new();
        let mut at_start = true;
        let mut k = 0;
        while k < sig.len() {
            if at_start {
                if let Some((name, ty, next)) = declaration_at(&sig, k, env) {
                    let block_end = block_ends.last().copied().unwrap_or(sig.len());
                    // `for (int i = 0; ...)` ends with the loop statement.
                    let to = match k.checked_sub(1) {
                        Some(paren) if sig[paren].is_punct("(") => {
                            self.statement_end(paren).unwrap_or(block_end)
                        }
                        _ => block_end,
                    };
                    locals.push(BlockLocal {
                        name,
                        ty,
                        from: next - 1,
                        to,
                    });
                    k = next;
                    at_start = false;
                    continue;
                }
            }
            let t = sig[k];
            if t.is_punct("{") {
                block_ends.push(self.close(k).unwrap_or(sig.len()));
            } else if t.is_punct("}") {
                block_ends.pop();
            }
            at_start = [";", "{", "}", "(", ":"].iter().any(|p| t.is_punct(p));
            k += 1;
        }
        self.locals = locals;
        self.outer = outer;
        self
    }

    /// End of the statement controlled by the parenthesized head at `paren`.
    fn statement_end(&self, paren: usize) -> Option<usize> {
        let body = self.close(paren)? + 1;
        if self.is_punct(body, "{") {
            return self.close(body).map(|c| c + 1);
        }
        (body..self.sig.len())
            .find(|&j| self.is_punct(j, ";"))
            .map(|j| j + 1)
    }

    /// Type of a local named `name` in scope at token `k`.
    fn local_at(&self, name: &str, k: usize) -> Option<&str> {
        self.locals
            .iter()
            .rev()
            .find(|l| l.name == name && l.from <= k && k < l.to)
            .map(|l| l.ty.as_str())
            .or_else(|| {
                self.outer
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, ty)| ty.as_str())
            })
    }

    /// Every local in scope at token `k`.
    fn locals_at(&self, k: usize) -> Visible {
        let mut visible = self.outer.clone();
        visible.extend(
            self.locals
                .iter()
                .filter(|l| l.from <= k && k < l.to)
                .map(|l| (l.name.clone(), l.ty.clone())),
        );
        visible
    }

    fn tok(&self, k: usize) -> Option<&Token<'s>> {
        self.sig.get(k).map(|&i| &self.tokens[i])
    }

    fn is_punct(&self, k: usize, p: &str) -> bool {
        self.tok(k).is_some_and(|t| t.is_punct(p))
    }

    fn prev(&self, k: usize) -> Option<&Token<'s>> {
        k.checked_sub(1).and_then(|j| self.tok(j))
    }

    fn close(&self, k: usize) -> Option<usize> {
        matching_close(&self.tokens, &self.sig, k)
    }

    /// Source text strictly between two significant tokens.
    fn between(&self, open: usize, close: usize) -> &'s str {
        match (self.tok(open), self.tok(close)) {
            (Some(a), Some(b)) => &self.src[a.span.end as usize..b.span.start as usize],
            _ => "",
        }
    }

    fn after_member_access(&self, k: usize) -> bool {
        self.prev(k)
            .is_some_and(|t| t.is_punct(".") || t.is_punct("->") || t.is_punct("::"))
    }

    fn at_statement_start(&self, k: usize) -> bool {
        match self.prev(k) {
            None => true,
            Some(t) => [";", "{", "}", ":"].iter().any(|p| t.is_punct(p)),
        }
    }

    /// Leading whitespace of the line holding token `k`, if the token starts it.
    fn indent(&self, k: usize) -> &'s str {
        let Some(tok) = self.tok(k) else { return "" };
        let start = tok.span.start as usize;
        let line_start = self.src[..start].rfind('\n').map_or(0, |i| i + 1);
        let prefix = &self.src[line_start..start];
        if prefix.chars().all(char::is_whitespace) {
            prefix
        } else {
            ""
        }
    }

    /// A lone `=`, not part of `==`, `<=`, `+=` and friends.
    fn is_assignment(&self, k: usize) -> bool {
        let Some(tok) = self.tok(k) else { return false };
        if !tok.is_punct("=") {
            return false;
        }
        let glued_before = self.prev(k).is_some_and(|p| {
            p.kind == TokenKind::Punct
                && p.span.end == tok.span.start
                && p.text.chars().all(|c| COMPOUND_PREFIX.contains(&c))
        });
        let glued_after = self
            .tok(k + 1)
            .is_some_and(|n| n.is_punct("=") && n.span.start == tok.span.end);
        !glued_before && !glued_after
    }
}

/// Split an argument list on top-level commas.
pub fn split_args(text: &str) -> Vec<&str> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let tokens = tokenize(text);
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Punct) {
        match token.text {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            "," if depth == 0 => {
                args.push(text[start..token.span.start as usize].trim());
                start = token.span.end as usize;
            }
            _ => {}
        }
    }
    args.push(text[start..].trim());
    args
}

/// Integer-like and floating tags are interchangeable within their family.
fn same_family(a: char, b: char) -> bool {
    let family = |c| match c {
        'i' | 'c' | 'b' => 0,
        'f' | 'd' => 1,
        _ => 2,
    };
    family(a) == family(b)
}

/// Rewrites bodies of one callable.
#[derive(Debug, Clone)]
pub struct Rewriter<'m> {
    model: &'m ProgramModel,
    class: Option<&'m ClassModel>,
    scope: Scope,
}

impl<'m> Rewriter<'m> {
    pub fn new(model: &'m ProgramModel, class: Option<&'m ClassModel>, scope: Scope) -> Self {
        Self {
            model,
            class,
            scope,
        }
    }

    /// Rewriter with the scope of `function`.
    pub fn for_callable(
        model: &'m ProgramModel,
        class: Option<&'m ClassModel>,
        function: &FunctionModel,
    ) -> Self {
        Self::new(model, class, Scope::for_callable(model, class, function))
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    /// Rewrite a body, a statement, or an expression.
    pub fn rewrite(&self, text: &str) -> String {
        self.rewrite_with(text, Vec::new())
    }

    /// Rewrite the text strictly between `open` and `close`, keeping the
    /// locals in scope at `open`.
    fn rewrite_between(&self, cx: &Cursor<'_>, open: usize, close: usize) -> String {
        self.rewrite_with(cx.between(open, close), cx.locals_at(open))
    }

    fn rewrite_with(&self, text: &str, outer: Visible) -> String {
        let cx = Cursor::new(text).with_locals(self.model, outer);
        let mut out = String::with_capacity(text.len() + text.len() / 4);
        let mut cursor = 0;
        let mut k = 0;
        while let Some(tok) = cx.tok(k) {
            out.push_str(&text[cursor..tok.span.start as usize]);

            if cx.is_assignment(k) {
                out.truncate(out.trim_end_matches(is_blank).len());
                out.push_str(" = ");
                cursor = tok.span.end as usize;
                let rest = &text[cursor..];
                cursor += rest.len() - rest.trim_start_matches(is_blank).len();
                k += 1;
                continue;
            }

            let (replacement, next) = self.rewrite_at(&cx, k);
            out.push_str(&replacement);
            cursor = cx
                .tok(next - 1)
                .map_or(text.len(), |t| t.span.end as usize);
            k = next;
        }
        out.push_str(&text[cursor..]);
        out
    }

    /// Replacement for the token run starting at `k`, and the position after it.
    fn rewrite_at(&self, cx: &Cursor<'_>, k: usize) -> (String, usize) {
        let Some(tok) = cx.tok(k) else {
            return (String::new(), k + 1);
        };
        let keep = || (tok.text.to_string(), k + 1);

        // Leading `::` of a global qualification.
        if tok.is_punct("::") {
            let qualifies = cx.tok(k + 1).is_some_and(|t| t.is_ident());
            let after_name = cx.prev(k).is_some_and(|t| t.is_ident() || t.is_punct(">"));
            if qualifies && !after_name {
                return self.qualified(cx, k + 1);
            }
            return keep();
        }
        if !tok.is_ident() {
            return keep();
        }

        match tok.text {
            "true" => return ("1".to_string(), k + 1),
            "false" => return ("0".to_string(), k + 1),
            "nullptr" => return ("NULL".to_string(), k + 1),
            _ => {}
        }

        if cx.at_statement_start(k) {
            if let Some(found) = self.instantiation(cx, k) {
                return found;
            }
        }
        if cx.after_member_access(k) {
            return keep();
        }
        if cx.is_punct(k + 1, "::") {
            return self.qualified(cx, k);
        }
        if cx.is_punct(k + 1, ".") || cx.is_punct(k + 1, "->") {
            if let Some(found) = self.object_call(cx, k) {
                return found;
            }
        }
        if tok.text == "this" {
            return ("self".to_string(), k + 1);
        }
        if cx.is_punct(k + 1, "(") {
            return self.call(cx, k).unwrap_or_else(keep);
        }
        if self.scope.is_field(tok.text) && cx.local_at(tok.text, k).is_none() {
            return (format!("self->{}", tok.text), k + 1);
        }
        keep()
    }

    /// `A::B::name`: qualifiers are dropped; `Class::method(args)` becomes a C call.
    fn qualified(&self, cx: &Cursor<'_>, first: usize) -> (String, usize) {
        let mut last = first;
        while cx.is_punct(last + 1, "::") && cx.tok(last + 2).is_some_and(|t| t.is_ident()) {
            last += 2;
        }
        let Some(name) = cx.tok(last).map(|t| t.text) else {
            return (String::new(), last + 1);
        };
        let owner = (last > first)
            .then(|| cx.tok(last - 2))
            .flatten()
            .map(|t| t.text);

        let method = owner
            .and_then(|o| self.model.class(o))
            .and_then(|class| class.method(name));
        if let (Some(method), true) = (method, cx.is_punct(last + 1, "(")) {
            if let Some(close) = cx.close(last + 1) {
                let receiver = (!method.is_static).then(|| "self".to_string());
                let args = self.rewrite_between(cx, last + 1, close);
                return (call_text(&method.c_name, receiver, &args), close + 1);
            }
        }

        // `::name(args)` or `ns::name(args)` only names free functions.
        let namespace = owner.map_or(true, |o| self.model.class(o).is_none());
        if namespace && cx.is_punct(last + 1, "(") {
            let found = cx
                .close(last + 1)
                .and_then(|close| self.free_call(cx, last, close));
            if let Some(found) = found {
                return found;
            }
        }
        (name.to_string(), last + 1)
    }

    /// `Led led;` or `Led led(args);` at the start of a statement.
    fn instantiation(&self, cx: &Cursor<'_>, k: usize) -> Option<(String, usize)> {
        let class = self.model.class(cx.tok(k)?.text)?;
        let var = cx.tok(k + 1).filter(|t| t.is_ident())?.text;
        let indent = cx.indent(k);
        let target = format!("&{var}");

        let (args, next) = match cx.tok(k + 2)?.text {
            ";" => ("", k + 3),
            "(" | "{" => {
                let close = cx.close(k + 2)?;
                if !cx.is_punct(close + 1, ";") {
                    return None;
                }
                (cx.between(k + 2, close), close + 2)
            }
            _ => return None,
        };
        let init = self.construct(class, &target, args, &cx.locals_at(k));
        Some((
            format!("{} {var};\n{indent}{init};", class.name),
            next,
        ))
    }

    /// `var.method(args)`, `ptr->method(args)`, `this->method(args)`.
    fn object_call(&self, cx: &Cursor<'_>, k: usize) -> Option<(String, usize)> {
        let var = cx.tok(k)?.text;
        let op = cx.tok(k + 1)?.text;
        let method = cx.tok(k + 2).filter(|t| t.is_ident())?.text;
        if !cx.is_punct(k + 3, "(") {
            return None;
        }
        let close = cx.close(k + 3)?;

        let (class, receiver) = self.receiver(var, op, method, cx.local_at(var, k))?;
        let target = class.method(method)?;
        let args = self.rewrite_between(cx, k + 3, close);
        let receiver = (!target.is_static).then_some(receiver);
        Some((call_text(&target.c_name, receiver, &args), close + 1))
    }

    /// Class and receiver expression for a call through `var`. `local` is the
    /// type of a block local of that name in scope at the call.
    fn receiver(
        &self,
        var: &str,
        op: &str,
        method: &str,
        local: Option<&str>,
    ) -> Option<(&'m ClassModel, String)> {
        if var == "this" {
            return self.class.map(|c| (c, "self".to_string()));
        }

        let (ty, expr) = match (local, self.scope.lookup(var)) {
            (Some(ty), _) => (Some(ty), var.to_string()),
            (None, Some(binding)) if binding.kind == BindingKind::Field => {
                (Some(binding.ty.as_str()), format!("self->{var}"))
            }
            (None, Some(binding)) => (Some(binding.ty.as_str()), var.to_string()),
            (None, None) => (
                self.model.global(var).map(|g| g.ty.as_str()),
                var.to_string(),
            ),
        };
        let ctype = ty.map(|t| CType::from_spelling(t, self.model));
        let pointer = op == "->" || ctype.as_ref().is_some_and(CType::is_pointer);

        let declared = ctype
            .as_ref()
            .and_then(|t| t.class_name())
            .and_then(|name| self.model.class(name))
            .filter(|c| c.method(method).is_some());
        let class = match declared {
            Some(class) => class,
            None => {
                let fallback = self.model.class_declaring(method)?;
                debug!(
                    variable = var,
                    method,
                    class = %fallback.name,
                    "receiver type unresolved, using first class declaring the method"
                );
                fallback
            }
        };
        let receiver = if pointer { expr } else { format!("&{expr}") };
        Some((class, receiver))
    }

    /// Bare `name(args)`: a method of the current class or a renamed free function.
    fn call(&self, cx: &Cursor<'_>, k: usize) -> Option<(String, usize)> {
        let name = cx.tok(k)?.text;
        if self.scope.is_bound_locally(name) || cx.local_at(name, k).is_some() {
            return None;
        }
        let close = cx.close(k + 1)?;

        if let Some(method) = self.class.and_then(|c| c.method(name)) {
            let receiver = (!method.is_static).then(|| "self".to_string());
            let args = self.rewrite_between(cx, k + 1, close);
            return Some((call_text(&method.c_name, receiver, &args), close + 1));
        }
        self.free_call(cx, k, close)
    }

    /// `name(args)` naming a free function that was renamed or overloaded.
    fn free_call(&self, cx: &Cursor<'_>, k: usize, close: usize) -> Option<(String, usize)> {
        let name = cx.tok(k)?.text;
        let args_raw = cx.between(k + 1, close);
        let set = self.model.functions.get(name)?;
        let renamed = set.is_overloaded() || set.signatures.iter().any(|f| f.c_name != name);
        if !renamed {
            return None;
        }
        let args = split_args(args_raw);
        let visible = cx.locals_at(k);
        let c_name: SmolStr = self
            .choose(&set.signatures, &args, &visible)
            .map_or_else(|| SmolStr::new(name), |f| f.c_name.clone());
        Some((
            format!("{c_name}({})", self.rewrite_with(args_raw, visible)),
            close + 1,
        ))
    }

    /// `Class_init(target)` or the parameterized constructor matching `args`.
    pub fn constructor_call(&self, class: &ClassModel, target: &str, args: &str) -> String {
        self.construct(class, target, args, &[])
    }

    fn construct(&self, class: &ClassModel, target: &str, args: &str, visible: &[(SmolStr, String)]) -> String {
        let args = args.trim();
        if args.is_empty() {
            return format!("{}({target})", class.init_name());
        }
        let split = split_args(args);
        let name = self
            .choose(&class.constructors, &split, visible)
            .map_or_else(|| class.init_name(), |c| c.c_name.to_string());
        format!("{name}({target}, {})", self.rewrite_with(args, visible.to_vec()))
    }

    /// Statements for a member initializer list such as `state(false), led(LED_0)`.
    pub fn member_initializers(&self, class: &ClassModel, init_list: &str) -> Vec<String> {
        let cx = Cursor::new(init_list);
        let mut statements = Vec::new();
        let mut k = 0;
        while let Some(tok) = cx.tok(k) {
            if !tok.is_ident() || !(cx.is_punct(k + 1, "(") || cx.is_punct(k + 1, "{")) {
                k += 1;
                continue;
            }
            let Some(close) = cx.close(k + 1) else { break };
            let args = cx.between(k + 1, close).trim();
            let name = tok.text;
            match class.field(name) {
                Some(field) => {
                    let ctype = CType::from_spelling(&field.ty, self.model);
                    let object = ctype
                        .class_name()
                        .filter(|_| !ctype.is_pointer())
                        .and_then(|n| self.model.class(n));
                    match object {
                        Some(member) => statements.push(format!(
                            "{};",
                            self.constructor_call(member, &format!("&self->{name}"), args)
                        )),
                        None if args.is_empty() => {}
                        None => statements.push(format!("self->{name} = {};", self.rewrite(args))),
                    }
                }
                None => debug!(class = %class.name, initializer = name, "initializer is not a field"),
            }
            k = close + 1;
        }
        statements
    }

    /// Tag of a single-token argument: literal kind or a known variable's type.
    fn arg_tag(&self, arg: &str, visible: &[(SmolStr, String)]) -> Option<char> {
        let tokens = tokenize(arg);
        let sig: Vec<&Token<'_>> = significant(&tokens)
            .into_iter()
            .map(|i| &tokens[i])
            .skip_while(|t| t.is_punct("-") || t.is_punct("+"))
            .collect();
        let [tok] = sig.as_slice() else {
            return None;
        };
        match tok.kind {
            TokenKind::Number => {
                let text = tok.text.to_ascii_lowercase();
                let hex = text.starts_with("0x");
                let floating = !hex && (text.contains('.') || text.contains('e'));
                Some(match (floating, text.ends_with('f')) {
                    (true, true) => 'f',
                    (true, false) => 'd',
                    _ => 'i',
                })
            }
            TokenKind::Char | TokenKind::Str => Some('c'),
            TokenKind::Ident => match tok.text {
                "true" | "false" => Some('b'),
                name => visible
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .map(|(_, ty)| ty.as_str())
                    .or_else(|| self.scope.variable_type(name))
                    .or_else(|| self.model.global(name).map(|g| g.ty.as_str()))
                    .map(mangle_tag)
                    .or_else(|| self.model.enum_of_constant(name).map(|_| 'x')),
            },
            _ => None,
        }
    }

    /// Pick the signature for a call with `args`: same arity, then matching
    /// argument tags, then family-compatible tags, then the first of that arity.
    fn choose<'f>(
        &self,
        signatures: &'f [FunctionModel],
        args: &[&str],
        visible: &[(SmolStr, String)],
    ) -> Option<&'f FunctionModel> {
        let same_arity: Vec<&FunctionModel> = signatures
            .iter()
            .filter(|f| f.params.len() == args.len())
            .collect();
        let tags: Vec<Option<char>> = args.iter().map(|a| self.arg_tag(a, visible)).collect();
        let fits = |f: &FunctionModel, cmp: fn(char, char) -> bool| {
            f.params
                .iter()
                .zip(&tags)
                .all(|(p, tag)| tag.map_or(true, |t| cmp(mangle_tag(&p.ty), t)))
        };

        same_arity
            .iter()
            .copied()
            .find(|f| fits(f, |a, b| a == b))
            .or_else(|| same_arity.iter().copied().find(|f| fits(f, same_family)))
            .or_else(|| same_arity.first().copied())
            // Trailing default arguments.
            .or_else(|| signatures.iter().find(|f| f.params.len() > args.len()))
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn call_text(c_name: &str, receiver: Option<String>, args: &str) -> String {
    let args = args.trim();
    match (receiver, args.is_empty()) {
        (Some(receiver), true) => format!("{c_name}({receiver})"),
        (Some(receiver), false) => format!("{c_name}({receiver}, {args})"),
        (None, _) => format!("{c_name}({args})"),
    }
}
