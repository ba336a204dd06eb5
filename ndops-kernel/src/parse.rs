//! Lexer and Pratt parser for template section text.

use crate::ast::{AssignOp, BinOp, Expr, Func, Place, Stmt, Subscript, UnOp};
use crate::KernelError;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

/// Longest spellings first so prefix matching picks the right token.
const PUNCTS: &[&str] = &[
    "===", "!==", ">>>", "...", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=",
    "/=", "%=", "++", "--", "+", "-", "*", "/", "%", "&", "|", "^", "!", "~", "<", ">", "=", "?",
    ":", "(", ")", "[", "]", "{", "}", ",", ";", ".",
];

/// Names a template may not use for parameters or locals.
pub(crate) const KEYWORDS: &[&str] = &[
    "var", "let", "const", "if", "else", "return", "true", "false", "Infinity", "NaN", "Math",
];

/// Parse one section of template text into statements.
///
/// `first_line` is the 1-based line of the section within the whole
/// template, so error messages point at the right place.
pub fn parse_section(
    src: &str,
    section: &'static str,
    first_line: usize,
) -> crate::Result<Vec<Stmt>> {
    let toks = lex(src, section, first_line)?;
    let mut p = Parser {
        toks,
        pos: 0,
        section,
    };
    let mut stmts = Vec::new();
    while p.peek() != &Tok::Eof {
        if let Some(s) = p.statement()? {
            stmts.push(s);
        }
    }
    Ok(stmts)
}

fn lex(src: &str, section: &'static str, first_line: usize) -> crate::Result<Vec<Token>> {
    let err = |line: usize, message: String| KernelError::Parse {
        section,
        line,
        message,
    };
    let mut toks = Vec::new();
    let mut line = first_line;
    let mut pos = 0;
    while pos < src.len() {
        let rest = &src[pos..];
        let Some(c) = rest.chars().next() else { break };
        if c == '\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        if rest.starts_with("//") {
            pos += rest.find('\n').unwrap_or(rest.len());
            continue;
        }
        if let Some(body) = rest.strip_prefix("/*") {
            let end = body
                .find("*/")
                .ok_or_else(|| err(line, "unterminated block comment".into()))?;
            line += body[..end].matches('\n').count();
            pos += 2 + end + 2;
            continue;
        }
        let next_is_digit = rest[c.len_utf8()..]
            .chars()
            .next()
            .map_or(false, |n| n.is_ascii_digit());
        if c.is_ascii_digit() || (c == '.' && next_is_digit) {
            let len = number_len(rest);
            let text = &rest[..len];
            let v: f64 = text
                .parse()
                .map_err(|_| err(line, format!("malformed number '{}'", text)))?;
            toks.push(Token {
                tok: Tok::Num(v),
                line,
            });
            pos += len;
            continue;
        }
        if c.is_alphabetic() || c == '_' || c == '$' {
            let len = rest
                .char_indices()
                .find(|&(_, ch)| !(ch.is_alphanumeric() || ch == '_' || ch == '$'))
                .map_or(rest.len(), |(i, _)| i);
            toks.push(Token {
                tok: Tok::Ident(rest[..len].to_string()),
                line,
            });
            pos += len;
            continue;
        }
        match PUNCTS.iter().find(|p| rest.starts_with(**p)) {
            Some(&p) => {
                toks.push(Token {
                    tok: Tok::Punct(p),
                    line,
                });
                pos += p.len();
            }
            None => return Err(err(line, format!("unexpected character '{}'", c))),
        }
    }
    toks.push(Token {
        tok: Tok::Eof,
        line,
    });
    Ok(toks)
}

/// Length of the decimal literal at the start of `s`.
fn number_len(s: &str) -> usize {
    let b = s.as_bytes();
    let digits = |mut i: usize| {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut i = digits(0);
    if i < b.len() && b[i] == b'.' {
        i = digits(i + 1);
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            i = digits(j);
        }
    }
    i
}

enum Infix {
    Bin(BinOp),
    Cond,
}

/// Binding powers `(left, right)`; higher binds tighter.
fn infix_bp(p: &str) -> Option<(u8, u8, Infix)> {
    let (l, r, op) = match p {
        "?" => return Some((2, 1, Infix::Cond)),
        "||" => (3, 4, BinOp::Or),
        "&&" => (5, 6, BinOp::And),
        "|" => (7, 8, BinOp::BitOr),
        "^" => (9, 10, BinOp::BitXor),
        "&" => (11, 12, BinOp::BitAnd),
        "==" | "===" => (13, 14, BinOp::Eq),
        "!=" | "!==" => (13, 14, BinOp::Ne),
        "<" => (15, 16, BinOp::Lt),
        ">" => (15, 16, BinOp::Gt),
        "<=" => (15, 16, BinOp::Le),
        ">=" => (15, 16, BinOp::Ge),
        "<<" => (17, 18, BinOp::Shl),
        ">>" => (17, 18, BinOp::Shr),
        ">>>" => (17, 18, BinOp::ShrUnsigned),
        "+" => (19, 20, BinOp::Add),
        "-" => (19, 20, BinOp::Sub),
        "*" => (21, 22, BinOp::Mul),
        "/" => (21, 22, BinOp::Div),
        "%" => (21, 22, BinOp::Rem),
        _ => return None,
    };
    Some((l, r, Infix::Bin(op)))
}

const PREFIX_BP: u8 = 23;

fn assign_op(p: &str) -> Option<AssignOp> {
    Some(match p {
        "=" => AssignOp::Set,
        "+=" => AssignOp::Add,
        "-=" => AssignOp::Sub,
        "*=" => AssignOp::Mul,
        "/=" => AssignOp::Div,
        "%=" => AssignOp::Rem,
        _ => return None,
    })
}

struct Parser {
    toks: Vec<Token>,
    pos: usize,
    section: &'static str,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos].tok
    }

    fn peek_at(&self, ahead: usize) -> &Tok {
        let i = (self.pos + ahead).min(self.toks.len() - 1);
        &self.toks[i].tok
    }

    fn bump(&mut self) -> Tok {
        let tok = self.toks[self.pos].tok.clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Tok::Punct(q) if *q == p)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s == kw)
    }

    fn eat(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> KernelError {
        KernelError::Parse {
            section: self.section,
            line: self.toks[self.pos].line,
            message: message.into(),
        }
    }

    fn expect(&mut self, p: &str) -> crate::Result<()> {
        if self.eat(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", p, describe(self.peek()))))
        }
    }

    fn ident(&mut self) -> crate::Result<String> {
        match self.bump() {
            Tok::Ident(name) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {}", describe(&other)))),
        }
    }

    /// One statement; `None` for an empty `;`.
    fn statement(&mut self) -> crate::Result<Option<Stmt>> {
        if self.eat(";") {
            return Ok(None);
        }
        if self.eat("{") {
            let mut body = Vec::new();
            while !self.eat("}") {
                if self.peek() == &Tok::Eof {
                    return Err(self.error("unterminated block"));
                }
                if let Some(s) = self.statement()? {
                    body.push(s);
                }
            }
            return Ok(Some(Stmt::Block(body)));
        }
        if self.is_keyword("var") || self.is_keyword("let") || self.is_keyword("const") {
            self.bump();
            return self.declaration().map(Some);
        }
        if self.is_keyword("if") {
            self.bump();
            self.expect("(")?;
            let cond = self.expr()?;
            self.expect(")")?;
            let then = self.branch()?;
            let otherwise = if self.is_keyword("else") {
                self.bump();
                self.branch()?
            } else {
                Vec::new()
            };
            return Ok(Some(Stmt::If(cond, then, otherwise)));
        }
        if self.is_keyword("return") {
            self.bump();
            let value = if self.is_punct(";") || self.is_punct("}") || self.peek() == &Tok::Eof
            {
                None
            } else {
                Some(self.expr()?)
            };
            self.eat(";");
            return Ok(Some(Stmt::Return(value)));
        }

        let lhs = self.expr()?;
        let stmt = if let Tok::Punct(p) = *self.peek() {
            if let Some(op) = assign_op(p) {
                self.bump();
                let place = self.place(lhs)?;
                Stmt::Assign(place, op, self.expr()?)
            } else if p == "++" || p == "--" {
                self.bump();
                let op = if p == "++" {
                    AssignOp::Add
                } else {
                    AssignOp::Sub
                };
                Stmt::Assign(self.place(lhs)?, op, Expr::Num(1.0))
            } else {
                Stmt::Expr(lhs)
            }
        } else {
            Stmt::Expr(lhs)
        };
        self.eat(";");
        Ok(Some(stmt))
    }

    fn branch(&mut self) -> crate::Result<Vec<Stmt>> {
        Ok(match self.statement()? {
            Some(Stmt::Block(body)) => body,
            Some(s) => vec![s],
            None => Vec::new(),
        })
    }

    fn declaration(&mut self) -> crate::Result<Stmt> {
        let mut decls = Vec::new();
        loop {
            let name = self.ident()?;
            let init = if self.eat("=") {
                Some(self.expr()?)
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat(",") {
                break;
            }
        }
        self.eat(";");
        Ok(Stmt::Var(decls))
    }

    fn place(&self, target: Expr) -> crate::Result<Place> {
        match target {
            Expr::Ident(name) => Ok(Place::Name(name)),
            Expr::Element(name, sub) => Ok(Place::Element(name, sub)),
            _ => Err(self.error("invalid assignment target")),
        }
    }

    fn expr(&mut self) -> crate::Result<Expr> {
        self.expr_bp(0)
    }

    fn expr_bp(&mut self, min_bp: u8) -> crate::Result<Expr> {
        let mut lhs = self.prefix()?;
        loop {
            let Tok::Punct(p) = *self.peek() else { break };
            let Some((l_bp, r_bp, infix)) = infix_bp(p) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.bump();
            lhs = match infix {
                Infix::Cond => {
                    let then = self.expr_bp(0)?;
                    self.expect(":")?;
                    let otherwise = self.expr_bp(r_bp)?;
                    Expr::Cond(Box::new(lhs), Box::new(then), Box::new(otherwise))
                }
                Infix::Bin(op) => Expr::binary(op, lhs, self.expr_bp(r_bp)?),
            };
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> crate::Result<Expr> {
        match self.bump() {
            Tok::Num(v) => Ok(Expr::Num(v)),
            Tok::Ident(name) => self.primary(name),
            Tok::Punct("(") => {
                let e = self.expr()?;
                self.expect(")")?;
                Ok(e)
            }
            Tok::Punct("-") => Ok(Expr::unary(UnOp::Neg, self.expr_bp(PREFIX_BP)?)),
            Tok::Punct("+") => Ok(Expr::unary(UnOp::Plus, self.expr_bp(PREFIX_BP)?)),
            Tok::Punct("!") => Ok(Expr::unary(UnOp::Not, self.expr_bp(PREFIX_BP)?)),
            Tok::Punct("~") => Ok(Expr::unary(UnOp::BitNot, self.expr_bp(PREFIX_BP)?)),
            other => Err(self.error(format!("unexpected {}", describe(&other)))),
        }
    }

    /// Identifier-led expression: literal keyword, call, element or member.
    fn primary(&mut self, name: String) -> crate::Result<Expr> {
        match name.as_str() {
            "true" => return Ok(Expr::Num(1.0)),
            "false" => return Ok(Expr::Num(0.0)),
            "Infinity" => return Ok(Expr::Num(f64::INFINITY)),
            "NaN" => return Ok(Expr::Num(f64::NAN)),
            "Math" => {
                self.expect(".")?;
                let member = self.ident()?;
                if self.is_punct("(") {
                    return self.call(member);
                }
                return match member.as_str() {
                    "PI" => Ok(Expr::Num(std::f64::consts::PI)),
                    "E" => Ok(Expr::Num(std::f64::consts::E)),
                    _ => Err(self.error(format!("unknown constant Math.{}", member))),
                };
            }
            _ => {}
        }
        if self.is_punct("(") {
            return self.call(name);
        }
        if self.is_punct("[") {
            return self.subscript(name);
        }
        if self.is_punct(".") && matches!(self.peek_at(1), Tok::Ident(_)) {
            self.bump();
            let member = self.ident()?;
            return match member.as_str() {
                "length" => Ok(Expr::Length(name)),
                "ndim" => Ok(Expr::Ndim(name)),
                "shape" => {
                    self.expect("[")?;
                    let k = self.expr()?;
                    self.expect("]")?;
                    Ok(Expr::Extent(name, Box::new(k)))
                }
                _ => Err(self.error(format!("unknown member '{}.{}'", name, member))),
            };
        }
        Ok(Expr::Ident(name))
    }

    fn call(&mut self, name: String) -> crate::Result<Expr> {
        let func =
            Func::from_name(&name).ok_or_else(|| self.error(format!("unknown function '{}'", name)))?;
        self.expect("(")?;
        let mut args = Vec::new();
        if !self.eat(")") {
            loop {
                args.push(self.expr()?);
                if self.eat(")") {
                    break;
                }
                self.expect(",")?;
            }
        }
        let (lo, hi) = func.arity();
        if args.len() < lo || args.len() > hi {
            return Err(self.error(format!(
                "'{}' called with {} arguments",
                name,
                args.len()
            )));
        }
        Ok(Expr::Call(func, args))
    }

    /// `a[...]`, `a[i, j]` or `a[i][j]`; the opening `[` is next.
    fn subscript(&mut self, name: String) -> crate::Result<Expr> {
        self.expect("[")?;
        if self.eat("...") {
            self.expect("]")?;
            return Ok(Expr::Element(name, Subscript::All));
        }
        let mut indices = Vec::new();
        loop {
            indices.push(self.expr()?);
            if self.eat(",") {
                continue;
            }
            self.expect("]")?;
            if !self.eat("[") {
                break;
            }
        }
        Ok(Expr::Element(name, Subscript::At(indices)))
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Num(v) => format!("number {}", v),
        Tok::Ident(s) => format!("'{}'", s),
        Tok::Punct(p) => format!("'{}'", p),
        Tok::Eof => "end of section".to_string(),
    }
}
