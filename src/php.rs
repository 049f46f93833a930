//! Lightweight static parsing of PHP source files.
//!
//! relscope never loads or executes the audited code. Everything the
//! analyzer knows about a model class comes from this module: one pass per
//! file extracts the namespace, import aliases, class declaration, the
//! `$table` property, class constants, and every method with its body and
//! line number. The resulting [`PhpClass`] records are cached for the whole
//! run in the scanner's class registry, since many accessors share one file.
//!
//! Parsing is tokenizer-level, not a full grammar: comments are blanked out
//! up front (preserving line structure), and all delimiter matching is
//! string-aware so quotes, nested parentheses, and escaped characters inside
//! literals never confuse it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;

/// One method declared directly on a class.
#[derive(Debug, Clone)]
pub struct PhpMethod {
    pub name: String,
    pub is_public: bool,
    pub is_static: bool,
    /// Whether the parameter list contains at least one parameter without a
    /// default value.
    pub has_required_params: bool,
    /// Declared return type, verbatim (`?HasMany`, `\Illuminate\...\BelongsTo`).
    pub return_type: Option<String>,
    /// Method body with the outer braces stripped.
    pub body: String,
    /// 1-based line of the `function` keyword.
    pub line: usize,
}

/// Everything relscope knows about one PHP class, from one file read.
#[derive(Debug, Clone)]
pub struct PhpClass {
    pub file: PathBuf,
    pub namespace: String,
    pub name: String,
    pub fqcn: String,
    pub is_abstract: bool,
    /// Parent class token as written; resolve through [`PhpClass::resolve`].
    pub extends: Option<String>,
    /// Import aliases: short name → fully-qualified name.
    pub uses: HashMap<String, String>,
    /// Explicit `protected $table = '...'` declaration, if any.
    pub table: Option<String>,
    /// Class constants with their raw value tokens (`'users'`, `Post::class`).
    pub constants: HashMap<String, String>,
    pub methods: Vec<PhpMethod>,
}

impl PhpClass {
    /// Resolve a class name token through this file's import aliases and
    /// namespace, per PHP name-resolution rules.
    ///
    /// `\App\Models\Post` is already fully qualified; `Post` goes through the
    /// `use` map or falls back to the current namespace; `Models\Post`
    /// resolves its first segment through the `use` map.
    pub fn resolve(&self, token: &str) -> String {
        let token = token.trim();

        if let Some(qualified) = token.strip_prefix('\\') {
            return qualified.to_string();
        }

        let (head, rest) = match token.split_once('\\') {
            Some((head, rest)) => (head, Some(rest)),
            None => (token, None),
        };

        if let Some(imported) = self.uses.get(head) {
            return match rest {
                Some(rest) => format!("{imported}\\{rest}"),
                None => imported.clone(),
            };
        }

        if self.namespace.is_empty() {
            token.to_string()
        } else {
            format!("{}\\{}", self.namespace, token)
        }
    }
}

/// Blank out `//`, `#` and `/* */` comments, preserving newlines so that
/// line numbers computed on the result match the original source. String
/// literals are left untouched.
pub fn strip_comments(src: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Single,
        Double,
    }

    let mut out = String::with_capacity(src.len());
    let mut state = State::Code;
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '\'' => {
                    state = State::Single;
                    out.push(c);
                }
                '"' => {
                    state = State::Double;
                    out.push(c);
                }
                '#' => {
                    state = State::LineComment;
                    out.push(' ');
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::Single | State::Double => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if (c == '\'' && state == State::Single)
                    || (c == '"' && state == State::Double)
                {
                    state = State::Code;
                }
            }
        }
    }

    out
}

/// Extract the balanced span between `open` and `close` starting at the
/// byte offset of an `open` delimiter, including both delimiters.
/// Delimiters inside string literals are ignored; escaped quotes inside
/// strings are handled. Returns `None` when the span never closes.
pub fn extract_balanced(src: &str, start: usize, open: char, close: char) -> Option<&str> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut in_string: Option<u8> = None;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];

        if let Some(quote) = in_string {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == quote {
                in_string = None;
            }
        } else if b == b'\'' || b == b'"' {
            in_string = Some(b);
        } else if b == open as u8 {
            depth += 1;
        } else if b == close as u8 {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(&src[start..=i]);
            }
        }

        i += 1;
    }

    None
}

/// Split an argument list on top-level commas, ignoring commas nested in
/// parentheses, brackets, braces, or string literals.
pub fn split_args(args: &str) -> Vec<&str> {
    split_top_level(args, b',')
}

/// Split on a separator byte occurring at nesting depth zero and outside
/// string literals. Also used to take apart `.` concatenation expressions.
pub fn split_top_level(src: &str, sep: u8) -> Vec<&str> {
    let bytes = src.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string: Option<u8> = None;
    let mut segment_start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];

        if let Some(quote) = in_string {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == quote {
                in_string = None;
            }
        } else {
            match b {
                b'\'' | b'"' => in_string = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                _ if b == sep && depth == 0 => {
                    parts.push(src[segment_start..i].trim());
                    segment_start = i + 1;
                }
                _ => {}
            }
        }

        i += 1;
    }

    let tail = src[segment_start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }

    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// If the token is a single- or double-quoted literal, return its content
/// with simple escapes collapsed.
pub fn string_literal(token: &str) -> Option<String> {
    let token = token.trim();
    let quote = token.chars().next()?;
    if (quote != '\'' && quote != '"') || token.len() < 2 || !token.ends_with(quote) {
        return None;
    }

    let inner = &token[1..token.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            // Only quote and backslash escapes collapse; `\M` in a
            // single-quoted class name stays as-is.
            match chars.next() {
                Some(next @ ('\\' | '\'' | '"')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// First quoted string anywhere in an argument list, the way the migration
/// fold picks out table and column names.
pub fn first_string_arg(args: &str) -> Option<String> {
    split_args(args).iter().find_map(|a| string_literal(a))
}

struct Patterns {
    namespace: Regex,
    use_import: Regex,
    class_decl: Regex,
    method: Regex,
    table_prop: Regex,
    constant: Regex,
    return_type: Regex,
}

impl Patterns {
    fn get() -> &'static Patterns {
        use std::sync::OnceLock;
        static PATTERNS: OnceLock<Patterns> = OnceLock::new();
        PATTERNS.get_or_init(|| Patterns {
            namespace: Regex::new(r"(?m)^\s*namespace\s+([\w\\]+)\s*;").unwrap(),
            use_import: Regex::new(r"(?m)^\s*use\s+([\w\\]+)(?:\s+as\s+(\w+))?\s*;").unwrap(),
            class_decl: Regex::new(
                r"(?m)^\s*((?:(?:final|abstract|readonly)\s+)*)class\s+(\w+)(?:\s+extends\s+([\\\w]+))?",
            )
            .unwrap(),
            method: Regex::new(
                r"(?m)^[ \t]*((?:(?:public|protected|private|static|final|abstract)\s+)*)function\s+(\w+)\s*\(",
            )
            .unwrap(),
            table_prop: Regex::new(r#"(?:public|protected|private)\s+\$table\s*=\s*['"]([^'"]+)['"]"#)
                .unwrap(),
            constant: Regex::new(r"(?m)(?:(?:public|protected|private|final)\s+)*const\s+(\w+)\s*=\s*([^;]+);")
                .unwrap(),
            return_type: Regex::new(r"^\s*:\s*(\??[\w\\|]+)").unwrap(),
        })
    }
}

/// Parse one PHP source file into a [`PhpClass`]. Files that do not declare
/// a class yield `None`; they are simply not candidates.
pub fn parse_class(path: &Path, src: &str) -> Option<PhpClass> {
    let patterns = Patterns::get();
    let stripped = strip_comments(src);

    let class_match = patterns.class_decl.captures(&stripped)?;
    let class_start = class_match.get(0)?.start();
    let modifiers = class_match.get(1).map(|m| m.as_str()).unwrap_or("");
    let name = class_match.get(2)?.as_str().to_string();
    let extends_token = class_match.get(3).map(|m| m.as_str().to_string());

    // Namespace and imports live in the file header, before the class
    // declaration; trait `use` statements inside the body must not leak
    // into the alias map.
    let header = &stripped[..class_start];
    let namespace = patterns
        .namespace
        .captures(header)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let mut uses = HashMap::new();
    for cap in patterns.use_import.captures_iter(header) {
        let target = cap[1].to_string();
        let alias = cap
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| {
                target.rsplit('\\').next().unwrap_or(&target).to_string()
            });
        uses.insert(alias, target);
    }

    let fqcn = if namespace.is_empty() {
        name.clone()
    } else {
        format!("{namespace}\\{name}")
    };

    // Body of the class: balanced braces starting at the first `{` after
    // the declaration.
    let brace = stripped[class_start..].find('{')? + class_start;
    let body_span = extract_balanced(&stripped, brace, '{', '}')?;
    let body = &body_span[1..body_span.len() - 1];
    let body_offset = brace + 1;

    let table = patterns.table_prop.captures(body).map(|c| c[1].to_string());

    let mut constants = HashMap::new();
    for cap in patterns.constant.captures_iter(body) {
        constants.insert(cap[1].to_string(), cap[2].trim().to_string());
    }

    let mut methods = Vec::new();
    for cap in patterns.method.captures_iter(body) {
        let whole = cap.get(0).unwrap();
        let modifiers = cap.get(1).map(|m| m.as_str()).unwrap_or("");
        let method_name = cap[2].to_string();

        let paren = body_offset + whole.end() - 1;
        let Some(params_span) = extract_balanced(&stripped, paren, '(', ')') else {
            continue;
        };
        let params = &params_span[1..params_span.len() - 1];

        let after_params = paren + params_span.len();
        let rest = &stripped[after_params..];
        let return_type = patterns
            .return_type
            .captures(rest)
            .map(|c| c[1].to_string());

        // Abstract or interface methods end in `;` — no body, nothing to
        // analyze.
        let Some(open_brace_rel) = rest.find(|c| c == '{' || c == ';') else {
            continue;
        };
        if rest.as_bytes()[open_brace_rel] == b';' {
            continue;
        }
        let Some(method_body) =
            extract_balanced(&stripped, after_params + open_brace_rel, '{', '}')
        else {
            continue;
        };

        let line = stripped[..body_offset + whole.start()]
            .matches('\n')
            .count()
            + 1;

        methods.push(PhpMethod {
            name: method_name,
            is_public: !modifiers.contains("private") && !modifiers.contains("protected"),
            is_static: modifiers.contains("static"),
            has_required_params: has_required_params(params),
            return_type,
            body: method_body[1..method_body.len() - 1].to_string(),
            line,
        });
    }

    Some(PhpClass {
        file: path.to_path_buf(),
        namespace,
        name,
        fqcn,
        is_abstract: modifiers.contains("abstract"),
        extends: extends_token,
        uses,
        table,
        constants,
        methods,
    })
}

/// A parameter without a default value (and not variadic) is required.
fn has_required_params(params: &str) -> bool {
    split_args(params)
        .iter()
        .any(|p| p.contains('$') && !p.contains('=') && !p.contains("..."))
}
