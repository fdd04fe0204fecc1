//! Template interpreter.
//!
//! # Responsibilities
//! - Walk a parsed template against a data value, writing text
//! - Evaluate pipelines, fields, variables and function calls
//! - Scope variables to their enclosing block
//! - Resolve `{{template}}` includes through the template set
//!
//! # Design Decisions
//! - One `Scratch` per top-level render; includes share it
//! - Missing map keys evaluate to null rather than failing
//! - Include depth is bounded to stop runaway recursion

use std::collections::HashMap;

use crate::render::parse::{Command, Node, Operand, Pipeline, Template};
use crate::render::value::{Scratch, Value};
use crate::render::RenderError;

const MAX_INCLUDE_DEPTH: usize = 32;

/// Render the template `name` from `templates` with `data` as dot.
pub fn render(
    templates: &HashMap<String, Template>,
    name: &str,
    data: Value,
) -> Result<String, RenderError> {
    let template = templates
        .get(name)
        .ok_or_else(|| RenderError::TemplateNotFound(name.to_string()))?;

    let mut exec = Exec {
        templates,
        scratch: Scratch::new(),
        vars: Vec::new(),
        depth: 0,
    };
    let mut out = String::new();
    exec.run(template, data, &mut out)?;
    Ok(out)
}

struct Exec<'a> {
    templates: &'a HashMap<String, Template>,
    scratch: Scratch,
    vars: Vec<(String, Value)>,
    depth: usize,
}

impl<'a> Exec<'a> {
    fn run(&mut self, template: &'a Template, dot: Value, out: &mut String) -> Result<(), RenderError> {
        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(RenderError::DepthExceeded);
        }
        self.depth += 1;

        // Each template sees only its own variables, with `$` bound to dot.
        let outer = std::mem::replace(&mut self.vars, vec![(String::new(), dot.clone())]);
        let result = self.walk(template.root(), &dot, out);
        self.vars = outer;
        self.depth -= 1;
        result
    }

    fn walk(&mut self, nodes: &'a [Node], dot: &Value, out: &mut String) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output(pipeline) => {
                    let value = self.pipeline(pipeline, dot)?;
                    if pipeline.decl.is_empty() {
                        out.push_str(&value.display(&self.scratch)?);
                    }
                }
                Node::If { branches, otherwise } => {
                    let mark = self.vars.len();
                    let mut taken = false;
                    for (condition, body) in branches {
                        if self.pipeline(condition, dot)?.truthy(&self.scratch) {
                            self.walk(body, dot, out)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.walk(otherwise, dot, out)?;
                    }
                    self.vars.truncate(mark);
                }
                Node::With {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let mark = self.vars.len();
                    let value = self.pipeline(pipeline, dot)?;
                    if value.truthy(&self.scratch) {
                        self.walk(body, &value, out)?;
                    } else {
                        self.walk(otherwise, dot, out)?;
                    }
                    self.vars.truncate(mark);
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                } => self.range(pipeline, body, otherwise, dot, out)?,
                Node::Include { name, pipeline } => {
                    let templates = self.templates;
                    let template = templates
                        .get(name)
                        .ok_or_else(|| RenderError::TemplateNotFound(name.clone()))?;
                    let data = match pipeline {
                        Some(pipeline) => self.pipeline(pipeline, dot)?,
                        None => Value::Null,
                    };
                    self.run(template, data, out)?;
                }
            }
        }
        Ok(())
    }

    fn range(
        &mut self,
        pipeline: &'a Pipeline,
        body: &'a [Node],
        otherwise: &'a [Node],
        dot: &Value,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let entries: Vec<(Value, Value)> = match self.commands(pipeline, dot)? {
            Value::Null => Vec::new(),
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::int(i as i64), v))
                .collect(),
            Value::Map(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
            Value::Dict(id) => self
                .scratch
                .dict(id)
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            Value::Number(n) => {
                let count = Value::Number(n).as_int("range")?;
                (0..count.max(0)).map(|i| (Value::int(i), Value::int(i))).collect()
            }
            other => {
                return Err(RenderError::TypeMismatch {
                    func: "range".to_string(),
                    expected: "list or map",
                    found: other.type_name(),
                })
            }
        };

        if entries.is_empty() {
            return self.walk(otherwise, dot, out);
        }

        for (key, value) in entries {
            let mark = self.vars.len();
            match pipeline.decl.as_slice() {
                [v] => self.vars.push((v.clone(), value.clone())),
                [k, v] => {
                    self.vars.push((k.clone(), key));
                    self.vars.push((v.clone(), value.clone()));
                }
                _ => {}
            }
            self.walk(body, &value, out)?;
            self.vars.truncate(mark);
        }
        Ok(())
    }

    /// Evaluate a pipeline and apply its declaration or assignment.
    fn pipeline(&mut self, pipeline: &Pipeline, dot: &Value) -> Result<Value, RenderError> {
        let value = self.commands(pipeline, dot)?;

        if let Some(name) = pipeline.decl.first() {
            if pipeline.assign {
                let slot = self
                    .vars
                    .iter_mut()
                    .rev()
                    .find(|(n, _)| n == name)
                    .ok_or_else(|| RenderError::UndefinedVariable(name.clone()))?;
                slot.1 = value.clone();
            } else {
                self.vars.push((name.clone(), value.clone()));
            }
        }

        Ok(value)
    }

    fn commands(&mut self, pipeline: &Pipeline, dot: &Value) -> Result<Value, RenderError> {
        let mut piped = None;
        for command in &pipeline.commands {
            piped = Some(self.command(command, dot, piped.take())?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn command(&mut self, command: &Command, dot: &Value, piped: Option<Value>) -> Result<Value, RenderError> {
        match command.func {
            Some(builtin) => {
                let mut args = Vec::with_capacity(command.args.len() + 1);
                for operand in &command.args {
                    args.push(self.operand(operand, dot)?);
                }
                args.extend(piped);
                (builtin.call)(&mut self.scratch, args)
            }
            None => match command.args.first() {
                Some(operand) if piped.is_none() => self.operand(operand, dot),
                _ => Err(RenderError::Function {
                    func: "pipeline",
                    message: "can't give argument to non-function".to_string(),
                }),
            },
        }
    }

    fn operand(&mut self, operand: &Operand, dot: &Value) -> Result<Value, RenderError> {
        match operand {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Field(path) => self.lookup(dot, path),
            Operand::Variable(name, path) => {
                let base = self
                    .vars
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v)
                    .ok_or_else(|| RenderError::UndefinedVariable(name.clone()))?;
                self.lookup(base, path)
            }
            Operand::Pipeline(pipeline) => self.pipeline(pipeline, dot),
        }
    }

    fn lookup(&self, base: &Value, path: &[String]) -> Result<Value, RenderError> {
        let mut current = base;
        for key in path {
            current = match current {
                Value::Map(map) => match map.get(key) {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                },
                Value::Dict(id) => match self.scratch.dict(*id).get(key) {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                },
                Value::Null => return Ok(Value::Null),
                other => {
                    return Err(RenderError::TypeMismatch {
                        func: format!("field .{}", key),
                        expected: "map",
                        found: other.type_name(),
                    })
                }
            };
        }
        Ok(current.clone())
    }
}
