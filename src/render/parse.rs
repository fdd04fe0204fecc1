//! Template parser.
//!
//! # Responsibilities
//! - Split source into text and `{{ ... }}` actions, honoring `{{-`/`-}}` trims
//! - Tokenize actions (fields, variables, literals, pipes, parentheses)
//! - Build the node tree: output, `if`/`else if`/`else`, `with`, `range`,
//!   `template`, variable declaration and assignment
//!
//! # Design Decisions
//! - Function names resolve against the static table while parsing, so an
//!   unknown function fails when the template is added, not when rendered
//! - `define`/`block` are not supported; templates are named by the store

use serde_json::Number;

use crate::render::funcs::{self, Builtin};
use crate::render::value::Value;
use crate::render::RenderError;

/// A parsed template.
#[derive(Debug)]
pub struct Template {
    name: String,
    root: Vec<Node>,
}

impl Template {
    pub fn parse(name: &str, source: &str) -> Result<Self, RenderError> {
        let items = split_actions(name, source)?;
        let mut parser = Parser {
            name,
            items: items.into_iter(),
        };
        let (root, end) = parser.list()?;
        match end {
            End::Eof => Ok(Self {
                name: name.to_string(),
                root,
            }),
            End::End => Err(RenderError::parse(name, "unexpected {{end}}")),
            End::Else(_) => Err(RenderError::parse(name, "unexpected {{else}}")),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn root(&self) -> &[Node] {
        &self.root
    }
}

#[derive(Debug)]
pub enum Node {
    Text(String),
    /// Prints the pipeline value unless the pipeline declares variables.
    Output(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    With {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Include {
        name: String,
        pipeline: Option<Pipeline>,
    },
}

#[derive(Debug)]
pub struct Pipeline {
    /// Variables declared (`:=`) or assigned (`=`) by this pipeline.
    pub decl: Vec<String>,
    pub assign: bool,
    pub commands: Vec<Command>,
}

#[derive(Debug)]
pub struct Command {
    pub func: Option<&'static Builtin>,
    pub args: Vec<Operand>,
}

#[derive(Debug)]
pub enum Operand {
    Literal(Value),
    /// `.a.b`; an empty path is dot itself.
    Field(Vec<String>),
    /// `$name.a.b`; `$` alone has an empty name.
    Variable(String, Vec<String>),
    Pipeline(Box<Pipeline>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Field(Vec<String>),
    Variable(String, Vec<String>),
    Str(String),
    Number(Number),
    Pipe,
    LParen,
    RParen,
    Comma,
    Declare,
    Assign,
}

enum Item {
    Text(String),
    Action(Vec<Token>),
}

/// How a node list was terminated.
enum End {
    Eof,
    End,
    Else(Vec<Token>),
}

fn split_actions(name: &str, source: &str) -> Result<Vec<Item>, RenderError> {
    let mut items = Vec::new();
    let mut rest = source;
    let mut trim_next = false;

    while !rest.is_empty() {
        let Some(open) = rest.find("{{") else {
            push_text(&mut items, rest, trim_next, false);
            break;
        };

        let mut body = &rest[open + 2..];
        let trim_left = body.starts_with('-') && body[1..].starts_with(char::is_whitespace);
        if trim_left {
            body = &body[1..];
        }
        push_text(&mut items, &rest[..open], trim_next, trim_left);

        let close = find_close(body).ok_or_else(|| RenderError::parse(name, "unclosed action"))?;
        let mut inner = &body[..close];
        trim_next = inner.ends_with('-') && inner[..inner.len() - 1].ends_with(char::is_whitespace);
        if trim_next {
            inner = &inner[..inner.len() - 1];
        }
        rest = &body[close + 2..];

        let inner = inner.trim();
        if inner.starts_with("/*") {
            if !inner.ends_with("*/") {
                return Err(RenderError::parse(name, "unclosed comment"));
            }
            continue;
        }
        items.push(Item::Action(tokenize(name, inner)?));
    }

    Ok(items)
}

fn push_text(items: &mut Vec<Item>, text: &str, trim_start: bool, trim_end: bool) {
    let text = if trim_start { text.trim_start() } else { text };
    let text = if trim_end { text.trim_end() } else { text };
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}

/// Byte offset of the `}}` closing an action, skipping quoted strings.
fn find_close(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'`' => quote = Some(b),
            None if b == b'}' && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(name: &str, src: &str) -> Result<Vec<Token>, RenderError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let read_while = |i: &mut usize, pred: &dyn Fn(char) -> bool| -> String {
        let start = *i;
        while *i < chars.len() && pred(chars[*i]) {
            *i += 1;
        }
        chars[start..*i].iter().collect()
    };

    let read_path = |i: &mut usize| -> Vec<String> {
        let mut path = Vec::new();
        while *i < chars.len() && chars[*i] == '.' {
            *i += 1;
            let start = *i;
            while *i < chars.len() && is_ident_char(chars[*i]) {
                *i += 1;
            }
            path.push(chars[start..*i].iter().collect::<String>());
        }
        path
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Assign);
                i += 1;
            }
            ':' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Declare);
                i += 2;
            }
            '.' => {
                let path = read_path(&mut i);
                if path.len() == 1 && path[0].is_empty() {
                    tokens.push(Token::Field(Vec::new()));
                } else if path.iter().any(String::is_empty) {
                    return Err(RenderError::parse(name, format!("bad field in '{}'", src)));
                } else {
                    tokens.push(Token::Field(path));
                }
            }
            '$' => {
                i += 1;
                let var = read_while(&mut i, &is_ident_char);
                let path = read_path(&mut i);
                if path.iter().any(String::is_empty) {
                    return Err(RenderError::parse(name, format!("bad variable field in '{}'", src)));
                }
                tokens.push(Token::Variable(var, path));
            }
            '"' => {
                i += 1;
                let mut s = String::new();
                loop {
                    let Some(&c) = chars.get(i) else {
                        return Err(RenderError::parse(name, "unterminated string"));
                    };
                    i += 1;
                    match c {
                        '"' => break,
                        '\\' => {
                            let escaped = chars
                                .get(i)
                                .copied()
                                .ok_or_else(|| RenderError::parse(name, "unterminated string"))?;
                            i += 1;
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => other,
                            });
                        }
                        other => s.push(other),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '`' => {
                i += 1;
                let s = read_while(&mut i, &|c: char| c != '`');
                if i >= chars.len() {
                    return Err(RenderError::parse(name, "unterminated raw string"));
                }
                i += 1;
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '+') && chars.get(i + 1).is_some_and(char::is_ascii_digit)) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let d = chars[i];
                    let exponent_sign = (d == '-' || d == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(parse_number(name, &text)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let ident = read_while(&mut i, &is_ident_char);
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(RenderError::parse(
                    name,
                    format!("unexpected '{}' in action '{}'", other, src),
                ))
            }
        }
    }

    Ok(tokens)
}

fn parse_number(name: &str, text: &str) -> Result<Number, RenderError> {
    let text = text.strip_prefix('+').unwrap_or(text);
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Number::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| RenderError::parse(name, format!("bad number '{}'", text)))
}

struct Parser<'a> {
    name: &'a str,
    items: std::vec::IntoIter<Item>,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> RenderError {
        RenderError::parse(self.name, message)
    }

    fn list(&mut self) -> Result<(Vec<Node>, End), RenderError> {
        let mut nodes = Vec::new();

        while let Some(item) = self.items.next() {
            let tokens = match item {
                Item::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action(tokens) => tokens,
            };

            let keyword = match tokens.first() {
                Some(Token::Ident(word)) => word.as_str(),
                _ => "",
            };
            match keyword {
                "end" => {
                    if tokens.len() != 1 {
                        return Err(self.error("unexpected tokens after end"));
                    }
                    return Ok((nodes, End::End));
                }
                "else" => return Ok((nodes, End::Else(tokens[1..].to_vec()))),
                "if" => nodes.push(self.if_node(&tokens[1..])?),
                "with" => nodes.push(self.with_node(&tokens[1..])?),
                "range" => nodes.push(self.range_node(&tokens[1..])?),
                "template" => nodes.push(self.include_node(&tokens[1..])?),
                "define" | "block" => {
                    return Err(self.error(format!("{{{{{}}}}} is not supported", keyword)))
                }
                _ => nodes.push(Node::Output(self.pipeline(&tokens)?)),
            }
        }

        Ok((nodes, End::Eof))
    }

    /// Body of an `else` branch, which must be closed by `end`.
    fn tail(&mut self, context: &str) -> Result<Vec<Node>, RenderError> {
        match self.list()? {
            (nodes, End::End) => Ok(nodes),
            (_, End::Else(_)) => Err(self.error(format!("multiple else in {}", context))),
            (_, End::Eof) => Err(self.error(format!("unexpected EOF in {}", context))),
        }
    }

    fn if_node(&mut self, tokens: &[Token]) -> Result<Node, RenderError> {
        let mut branches = Vec::new();
        let mut condition = self.pipeline(tokens)?;

        loop {
            let (body, end) = self.list()?;
            branches.push((condition, body));
            match end {
                End::End => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    })
                }
                End::Eof => return Err(self.error("unexpected EOF in if")),
                End::Else(rest) if rest.is_empty() => {
                    let otherwise = self.tail("if")?;
                    return Ok(Node::If { branches, otherwise });
                }
                End::Else(rest) => match rest.first() {
                    Some(Token::Ident(word)) if word == "if" => {
                        condition = self.pipeline(&rest[1..])?;
                    }
                    _ => return Err(self.error("expected 'if' after else")),
                },
            }
        }
    }

    fn with_node(&mut self, tokens: &[Token]) -> Result<Node, RenderError> {
        let pipeline = self.pipeline(tokens)?;
        let (body, otherwise) = self.block("with")?;
        Ok(Node::With {
            pipeline,
            body,
            otherwise,
        })
    }

    fn range_node(&mut self, tokens: &[Token]) -> Result<Node, RenderError> {
        let pipeline = self.pipeline(tokens)?;
        if pipeline.assign {
            return Err(self.error("range can only declare variables"));
        }
        let (body, otherwise) = self.block("range")?;
        Ok(Node::Range {
            pipeline,
            body,
            otherwise,
        })
    }

    fn block(&mut self, context: &str) -> Result<(Vec<Node>, Vec<Node>), RenderError> {
        match self.list()? {
            (body, End::End) => Ok((body, Vec::new())),
            (body, End::Else(rest)) if rest.is_empty() => Ok((body, self.tail(context)?)),
            (_, End::Else(_)) => Err(self.error(format!("unexpected tokens after else in {}", context))),
            (_, End::Eof) => Err(self.error(format!("unexpected EOF in {}", context))),
        }
    }

    fn include_node(&mut self, tokens: &[Token]) -> Result<Node, RenderError> {
        let Some(Token::Str(name)) = tokens.first() else {
            return Err(self.error("template name must be a string"));
        };
        let pipeline = if tokens.len() > 1 {
            Some(self.pipeline(&tokens[1..])?)
        } else {
            None
        };
        Ok(Node::Include {
            name: name.clone(),
            pipeline,
        })
    }

    fn pipeline(&self, tokens: &[Token]) -> Result<Pipeline, RenderError> {
        let (decl, assign, rest) = match tokens {
            [Token::Variable(a, pa), Token::Comma, Token::Variable(b, pb), Token::Declare, rest @ ..]
                if pa.is_empty() && pb.is_empty() =>
            {
                (vec![a.clone(), b.clone()], false, rest)
            }
            [Token::Variable(a, pa), Token::Declare, rest @ ..] if pa.is_empty() => {
                (vec![a.clone()], false, rest)
            }
            [Token::Variable(a, pa), Token::Assign, rest @ ..] if pa.is_empty() => {
                (vec![a.clone()], true, rest)
            }
            _ => (Vec::new(), false, tokens),
        };

        if rest.is_empty() {
            return Err(self.error("missing value for command"));
        }

        let mut commands = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, token) in rest.iter().enumerate() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| self.error("unexpected right paren"))?;
                }
                Token::Pipe if depth == 0 => {
                    commands.push(self.command(&rest[start..i], !commands.is_empty())?);
                    start = i + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(self.error("unclosed left paren"));
        }
        commands.push(self.command(&rest[start..], !commands.is_empty())?);

        Ok(Pipeline {
            decl,
            assign,
            commands,
        })
    }

    fn command(&self, tokens: &[Token], piped: bool) -> Result<Command, RenderError> {
        if tokens.is_empty() {
            return Err(self.error("missing command in pipeline"));
        }

        let func = match &tokens[0] {
            Token::Ident(word) if !matches!(word.as_str(), "true" | "false" | "nil") => Some(
                funcs::lookup(word)
                    .ok_or_else(|| self.error(format!("function \"{}\" not defined", word)))?,
            ),
            _ => None,
        };

        let mut args = Vec::new();
        let mut i = if func.is_some() { 1 } else { 0 };
        while i < tokens.len() {
            args.push(self.operand(tokens, &mut i)?);
        }

        if func.is_none() {
            if piped {
                return Err(self.error("non-function command in pipeline"));
            }
            if args.len() != 1 {
                return Err(self.error("can't give argument to non-function"));
            }
        }

        Ok(Command { func, args })
    }

    fn operand(&self, tokens: &[Token], i: &mut usize) -> Result<Operand, RenderError> {
        let token = &tokens[*i];
        *i += 1;
        Ok(match token {
            Token::Ident(word) => match word.as_str() {
                "true" => Operand::Literal(Value::Bool(true)),
                "false" => Operand::Literal(Value::Bool(false)),
                "nil" => Operand::Literal(Value::Null),
                name => {
                    let func = funcs::lookup(name)
                        .ok_or_else(|| self.error(format!("function \"{}\" not defined", name)))?;
                    Operand::Pipeline(Box::new(Pipeline {
                        decl: Vec::new(),
                        assign: false,
                        commands: vec![Command {
                            func: Some(func),
                            args: Vec::new(),
                        }],
                    }))
                }
            },
            Token::Field(path) => Operand::Field(path.clone()),
            Token::Variable(name, path) => Operand::Variable(name.clone(), path.clone()),
            Token::Str(s) => Operand::Literal(Value::String(s.clone())),
            Token::Number(n) => Operand::Literal(Value::Number(n.clone())),
            Token::LParen => {
                let start = *i;
                let mut depth = 1usize;
                while *i < tokens.len() {
                    match tokens[*i] {
                        Token::LParen => depth += 1,
                        Token::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    *i += 1;
                }
                if depth != 0 {
                    return Err(self.error("unclosed left paren"));
                }
                let inner = self.pipeline(&tokens[start..*i])?;
                *i += 1;
                Operand::Pipeline(Box::new(inner))
            }
            other => return Err(self.error(format!("unexpected {:?} in operand", other))),
        })
    }
}
