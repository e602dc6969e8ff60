use crate::eval::error::{EvalError, SyntaxError};
use crate::eval::lexer::{tokenize, Op, Token, TokenKind};
use crate::eval::resolve::{EvalContext, Resolver};
use crate::eval::value::Value;
use chrono::FixedOffset;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq)]
enum Instruction {
    Push(Value),
    Load(String),
    Apply(Op),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(value) => write!(f, "{}", value),
            Instruction::Load(name) => f.write_str(name),
            Instruction::Apply(Op::Negate) => f.write_str("neg"),
            Instruction::Apply(op) => f.write_str(op.symbol()),
        }
    }
}

enum Pending {
    Operator(Op, usize),
    Paren(usize),
}

pub struct Compiler {
    sources: Vec<Arc<dyn Resolver>>,
    offset: FixedOffset,
    regex: bool,
    debug: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            offset: FixedOffset::east_opt(0).expect("zero offset is valid"),
            regex: true,
            debug: false,
        }
    }

    /// Resolvers are consulted in the order they were added.
    pub fn add_source<R: Resolver + 'static>(&mut self, source: R) -> &mut Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn with_source<R: Resolver + 'static>(mut self, source: R) -> Self {
        self.add_source(source);
        self
    }

    pub fn offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn regex(mut self, enabled: bool) -> Self {
        self.regex = enabled;
        self
    }

    pub fn debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    pub fn compile(&self, text: &str) -> Result<CompiledExpr, SyntaxError> {
        let tokens = tokenize(text, self.offset)?;
        if self.debug {
            debug!(expression = text, tokens = tokens.len(), "compiling filter");
        }
        if tokens.is_empty() {
            return Err(SyntaxError::new("empty expression", 0));
        }

        let (program, patterns) = self.to_postfix(&tokens, text.len())?;
        check_depth(&program)?;

        if self.debug {
            let rendered: Vec<String> = program.iter().map(ToString::to_string).collect();
            debug!(postfix = %rendered.join(" "), "compiled filter");
        }

        Ok(CompiledExpr {
            text: text.to_string(),
            program,
            sources: self.sources.clone(),
            patterns,
            offset: self.offset,
            regex: self.regex,
            trace: false,
        })
    }

    fn to_postfix(
        &self,
        tokens: &[Token],
        end: usize,
    ) -> Result<(Vec<Instruction>, HashMap<String, Regex>), SyntaxError> {
        let mut output: Vec<Instruction> = Vec::with_capacity(tokens.len());
        let mut patterns = HashMap::new();
        let mut stack: Vec<Pending> = Vec::new();
        let mut expect_operand = true;

        for token in tokens {
            match &token.kind {
                TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Date(_)
                | TokenKind::Identifier(_) => {
                    if !expect_operand {
                        return Err(SyntaxError::new("missing operator", token.offset));
                    }
                    output.push(operand(&token.kind));
                    expect_operand = false;
                }
                TokenKind::LeftParen => {
                    if !expect_operand {
                        return Err(SyntaxError::new("missing operator before '('", token.offset));
                    }
                    stack.push(Pending::Paren(token.offset));
                }
                TokenKind::RightParen => {
                    if expect_operand {
                        return Err(SyntaxError::new("missing operand before ')'", token.offset));
                    }
                    loop {
                        match stack.pop() {
                            Some(Pending::Paren(_)) => break,
                            Some(Pending::Operator(op, at)) => {
                                self.emit(&mut output, &mut patterns, op, at)?
                            }
                            None => {
                                return Err(SyntaxError::new("unbalanced ')'", token.offset))
                            }
                        }
                    }
                }
                TokenKind::Operator(op) => {
                    let op = if expect_operand {
                        match op {
                            Op::Subtract => Op::Negate,
                            Op::Not => Op::Not,
                            other => {
                                return Err(SyntaxError::new(
                                    format!("missing left operand for '{}'", other.symbol()),
                                    token.offset,
                                ))
                            }
                        }
                    } else if *op == Op::Not {
                        return Err(SyntaxError::new("misplaced 'not'", token.offset));
                    } else {
                        *op
                    };

                    if !op.is_unary() {
                        while let Some(Pending::Operator(top, at)) = stack.last() {
                            let (top, at) = (*top, *at);
                            let pops = top.precedence() > op.precedence()
                                || (top.precedence() == op.precedence()
                                    && !op.is_right_associative());
                            if !pops {
                                break;
                            }
                            stack.pop();
                            self.emit(&mut output, &mut patterns, top, at)?;
                        }
                    }
                    stack.push(Pending::Operator(op, token.offset));
                    expect_operand = true;
                }
            }
        }

        if expect_operand {
            return Err(SyntaxError::new("expression ends with an operator", end));
        }

        while let Some(pending) = stack.pop() {
            match pending {
                Pending::Operator(op, at) => self.emit(&mut output, &mut patterns, op, at)?,
                Pending::Paren(at) => return Err(SyntaxError::new("unbalanced '('", at)),
            }
        }

        Ok((output, patterns))
    }

    fn emit(
        &self,
        output: &mut Vec<Instruction>,
        patterns: &mut HashMap<String, Regex>,
        op: Op,
        at: usize,
    ) -> Result<(), SyntaxError> {
        if self.regex && matches!(op, Op::Match | Op::NoMatch) {
            if let Some(Instruction::Push(Value::String(pattern))) = output.last() {
                if !patterns.contains_key(pattern) {
                    let compiled = Regex::new(pattern).map_err(|err| {
                        SyntaxError::new(format!("invalid pattern '{pattern}': {err}"), at)
                    })?;
                    patterns.insert(pattern.clone(), compiled);
                }
            }
        }
        output.push(Instruction::Apply(op));
        Ok(())
    }
}

fn operand(kind: &TokenKind) -> Instruction {
    match kind {
        TokenKind::Number(n) => Instruction::Push(Value::Number(*n)),
        TokenKind::String(s) => Instruction::Push(Value::String(s.clone())),
        TokenKind::Date(d) => Instruction::Push(Value::Date(*d)),
        TokenKind::Identifier(name) => Instruction::Load(name.clone()),
        TokenKind::Operator(_) | TokenKind::LeftParen | TokenKind::RightParen => {
            unreachable!("operand() is only called for operand tokens")
        }
    }
}

fn check_depth(program: &[Instruction]) -> Result<(), SyntaxError> {
    let mut depth: usize = 0;
    for instruction in program {
        depth = match instruction {
            Instruction::Push(_) | Instruction::Load(_) => depth + 1,
            Instruction::Apply(op) if op.is_unary() => {
                if depth < 1 {
                    return Err(SyntaxError::new("missing operand", 0));
                }
                depth
            }
            Instruction::Apply(_) => {
                if depth < 2 {
                    return Err(SyntaxError::new("missing operand", 0));
                }
                depth - 1
            }
        };
    }
    if depth != 1 {
        return Err(SyntaxError::new("expression does not reduce to one value", 0));
    }
    Ok(())
}

/// A compiled filter: a postfix program bound to an ordered resolver chain.
/// Holds no per-task state; evaluate it against as many contexts as needed.
pub struct CompiledExpr {
    text: String,
    program: Vec<Instruction>,
    sources: Vec<Arc<dyn Resolver>>,
    patterns: HashMap<String, Regex>,
    offset: FixedOffset,
    regex: bool,
    trace: bool,
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.sources.iter().map(|source| source.name()).collect();
        f.debug_struct("CompiledExpr")
            .field("text", &self.text)
            .field("program", &self.program)
            .field("sources", &sources)
            .finish()
    }
}

impl CompiledExpr {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        let mut stack: Vec<Value> = Vec::with_capacity(self.program.len());
        for instruction in &self.program {
            let value = match instruction {
                Instruction::Push(value) => value.clone(),
                Instruction::Load(name) => self.resolve(name, ctx)?,
                Instruction::Apply(op) => {
                    let right = stack.pop().ok_or(EvalError::Malformed("stack underflow"))?;
                    if op.is_unary() {
                        self.unary(*op, &right)?
                    } else {
                        let left = stack.pop().ok_or(EvalError::Malformed("stack underflow"))?;
                        let result = self.binary(*op, &left, &right)?;
                        if self.trace {
                            trace!(op = op.symbol(), %left, %right, %result, "apply");
                        }
                        result
                    }
                }
            };
            stack.push(value);
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(value), true) => Ok(value),
            _ => Err(EvalError::Malformed("unbalanced stack")),
        }
    }

    fn resolve(&self, name: &str, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        for source in &self.sources {
            if let Some(value) = source.resolve(name, ctx) {
                if self.trace {
                    trace!(source = source.name(), identifier = name, %value, "resolved");
                }
                return Ok(value);
            }
        }
        Err(EvalError::UnresolvedIdentifier(name.to_string()))
    }

    fn unary(&self, op: Op, operand: &Value) -> Result<Value, EvalError> {
        match op {
            Op::Not => Ok(Value::Bool(!operand.to_bool())),
            Op::Negate => operand.neg(),
            _ => Err(EvalError::Malformed("binary operator applied as unary")),
        }
    }

    fn binary(&self, op: Op, left: &Value, right: &Value) -> Result<Value, EvalError> {
        let ordering = || left.compare(right);
        let value = match op {
            Op::And => Value::Bool(left.to_bool() && right.to_bool()),
            Op::Or => Value::Bool(left.to_bool() || right.to_bool()),
            Op::Xor => Value::Bool(left.to_bool() != right.to_bool()),
            Op::Equal => Value::Bool(left.equals(right)),
            Op::NotEqual => Value::Bool(!left.equals(right)),
            Op::Partial => Value::Bool(left.partial_equals(right, self.offset)),
            Op::Less => Value::Bool(ordering() == Some(Ordering::Less)),
            Op::LessEqual => Value::Bool(matches!(
                ordering(),
                Some(Ordering::Less | Ordering::Equal)
            )),
            Op::Greater => Value::Bool(ordering() == Some(Ordering::Greater)),
            Op::GreaterEqual => Value::Bool(matches!(
                ordering(),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            Op::Match => Value::Bool(self.matches(left, right)?),
            Op::NoMatch => Value::Bool(!self.matches(left, right)?),
            Op::HasTag => Value::Bool(left.has_tag(right)),
            Op::NoTag => Value::Bool(!left.has_tag(right)),
            Op::Add => left.add(right)?,
            Op::Subtract => left.sub(right)?,
            Op::Multiply => left.mul(right)?,
            Op::Divide => left.div(right)?,
            Op::Modulo => left.rem(right)?,
            Op::Not | Op::Negate => {
                return Err(EvalError::Malformed("unary operator applied as binary"))
            }
        };
        Ok(value)
    }

    fn matches(&self, subject: &Value, pattern: &Value) -> Result<bool, EvalError> {
        if !self.regex {
            return Ok(subject.contains(pattern));
        }
        let pattern = pattern.as_text();
        let subject = subject.as_text();
        if let Some(compiled) = self.patterns.get(pattern.as_ref()) {
            return Ok(compiled.is_match(&subject));
        }
        let compiled =
            Regex::new(&pattern).map_err(|err| EvalError::InvalidPattern(err.to_string()))?;
        Ok(compiled.is_match(&subject))
    }
}
