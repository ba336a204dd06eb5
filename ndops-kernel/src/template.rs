//! Parsed operator templates.

use crate::ast::Stmt;
use crate::parse::{parse_section, KEYWORDS};
use crate::{KernelError, LOOP_INDEX_NAMES};

/// Canonical spelling of the line that separates template sections.
///
/// Any line consisting only of three or more dashes, optionally behind `//`,
/// is accepted.
pub const SECTION_MARKER: &str = "---";

/// An operator template: parameter names plus prep, body and post blocks.
///
/// The body runs once per element of the iteration shape; prep runs before
/// the loops, post after them. A template without a post section returns
/// its first parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    params: Vec<String>,
    prep: Vec<Stmt>,
    body: Vec<Stmt>,
    post: Option<Vec<Stmt>>,
}

fn is_marker(line: &str) -> bool {
    let t = line.trim();
    let t = t.strip_prefix("//").unwrap_or(t).trim();
    t.len() >= 3 && t.bytes().all(|b| b == b'-')
}

impl Template {
    /// Parse template text.
    ///
    /// One section is the body; two are prep and body; three are prep, body
    /// and post. More than three sections is an error.
    pub fn parse(name: &str, params: &[&str], source: &str) -> crate::Result<Self> {
        // (first line, text) per section
        let mut sections: Vec<(usize, String)> = vec![(1, String::new())];
        for (i, line) in source.lines().enumerate() {
            if is_marker(line) {
                sections.push((i + 2, String::new()));
            } else if let Some((_, text)) = sections.last_mut() {
                text.push_str(line);
                text.push('\n');
            }
        }
        if sections.len() > 3 {
            return Err(KernelError::Parse {
                section: "template",
                line: sections[3].0 - 1,
                message: format!("{} sections, at most 3 allowed", sections.len()),
            });
        }

        let mut parsed = Vec::with_capacity(sections.len());
        let names: &[&'static str] = match sections.len() {
            1 => &["body"],
            2 => &["prep", "body"],
            _ => &["prep", "body", "post"],
        };
        for ((line, text), section) in sections.iter().zip(names) {
            parsed.push(parse_section(text, *section, *line)?);
        }
        let mut parsed = parsed.into_iter();
        let (prep, body, post) = match names.len() {
            1 => (Vec::new(), parsed.next().unwrap_or_default(), None),
            2 => (
                parsed.next().unwrap_or_default(),
                parsed.next().unwrap_or_default(),
                None,
            ),
            _ => (
                parsed.next().unwrap_or_default(),
                parsed.next().unwrap_or_default(),
                parsed.next(),
            ),
        };

        let params = params.iter().map(|p| p.to_string()).collect();
        Self::from_parts(name, params, prep, body, post)
    }

    /// Assemble a template from already-built statement blocks.
    pub fn from_parts(
        name: &str,
        params: Vec<String>,
        prep: Vec<Stmt>,
        body: Vec<Stmt>,
        post: Option<Vec<Stmt>>,
    ) -> crate::Result<Self> {
        for (i, p) in params.iter().enumerate() {
            if params[..i].contains(p) {
                return Err(KernelError::Redeclared(p.clone()));
            }
            if is_reserved(p) {
                return Err(KernelError::NotAssignable(p.clone()));
            }
        }
        let template = Template {
            name: name.to_string(),
            params,
            prep,
            body,
            post,
        };
        for local in template.locals() {
            if is_reserved(&local) {
                return Err(KernelError::NotAssignable(local));
            }
            if template.params.contains(&local) {
                return Err(KernelError::Redeclared(local));
            }
        }
        Ok(template)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn prep(&self) -> &[Stmt] {
        &self.prep
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    /// `None` when the template returns its first parameter.
    pub fn post(&self) -> Option<&[Stmt]> {
        self.post.as_deref()
    }

    /// Names declared with `var` anywhere in the template, in first-seen
    /// order, without duplicates.
    pub fn locals(&self) -> Vec<String> {
        let mut out = Vec::new();
        let post = self.post.as_deref().unwrap_or(&[]);
        for block in [&self.prep[..], &self.body[..], post] {
            collect_locals(block, &mut out);
        }
        out
    }
}

fn is_reserved(name: &str) -> bool {
    KEYWORDS.contains(&name) || LOOP_INDEX_NAMES.contains(&name)
}

fn collect_locals(block: &[Stmt], out: &mut Vec<String>) {
    for stmt in block {
        match stmt {
            Stmt::Var(decls) => {
                for (name, _) in decls {
                    if !out.contains(name) {
                        out.push(name.clone());
                    }
                }
            }
            Stmt::If(_, then, otherwise) => {
                collect_locals(then, out);
                collect_locals(otherwise, out);
            }
            Stmt::Block(inner) => collect_locals(inner, out),
            Stmt::Assign(..) | Stmt::Return(_) | Stmt::Expr(_) => {}
        }
    }
}
