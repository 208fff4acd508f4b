//! Parser for the textual rule grammar the engine consumes.
//!
//! The dialect is the subset the compiler emits and the templates file
//! declares: `deftemplate` with plain slots, `defrule` with an optional
//! doc string, a salience declaration, positive and `not` patterns whose
//! slot constraints are literals, variables, or numeric guards of the form
//! `?v&:(> ?v 50)`, and a right-hand side asserting template facts.
//! `;` starts a comment running to end of line.

use super::fact::{Fact, SlotValue};
use super::EngineError;

#[derive(Debug, Clone, PartialEq)]
enum Sexp {
    Sym(String, usize),
    Str(String, usize),
    Int(i64, usize),
    List(Vec<Sexp>, usize),
}

impl Sexp {
    fn line(&self) -> usize {
        match self {
            Sexp::Sym(_, l) | Sexp::Str(_, l) | Sexp::Int(_, l) | Sexp::List(_, l) => *l,
        }
    }
}

fn parse_err(line: usize, message: impl Into<String>) -> EngineError {
    EngineError::Parse {
        line,
        message: message.into(),
    }
}

struct Reader<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Reader {
            chars: src.chars().peekable(),
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_blank(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == ';' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn read_all(&mut self) -> Result<Vec<Sexp>, EngineError> {
        let mut out = Vec::new();
        loop {
            self.skip_blank();
            if self.chars.peek().is_none() {
                return Ok(out);
            }
            out.push(self.read_sexp()?);
        }
    }

    fn read_sexp(&mut self) -> Result<Sexp, EngineError> {
        self.skip_blank();
        let line = self.line;
        match self.chars.peek() {
            None => Err(parse_err(line, "unexpected end of input")),
            Some('(') => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_blank();
                    match self.chars.peek() {
                        None => return Err(parse_err(line, "unclosed parenthesis")),
                        Some(')') => {
                            self.bump();
                            return Ok(Sexp::List(items, line));
                        }
                        Some(_) => items.push(self.read_sexp()?),
                    }
                }
            }
            Some(')') => Err(parse_err(line, "unexpected `)`")),
            Some('"') => {
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        None => return Err(parse_err(line, "unterminated string")),
                        Some('"') => return Ok(Sexp::Str(s, line)),
                        Some('\\') => match self.bump() {
                            Some('"') => s.push('"'),
                            Some('\\') => s.push('\\'),
                            Some(other) => {
                                s.push('\\');
                                s.push(other);
                            }
                            None => return Err(parse_err(line, "unterminated string")),
                        },
                        Some(c) => s.push(c),
                    }
                }
            }
            Some(_) => {
                let mut token = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';') {
                        break;
                    }
                    token.push(c);
                    self.bump();
                }
                if let Ok(n) = token.parse::<i64>() {
                    Ok(Sexp::Int(n, line))
                } else {
                    Ok(Sexp::Sym(token, line))
                }
            }
        }
    }
}

/// Comparison operator in a numeric slot guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            ">" => Some(CmpOp::Gt),
            "<" => Some(CmpOp::Lt),
            ">=" => Some(CmpOp::Ge),
            "<=" => Some(CmpOp::Le),
            "=" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
        }
    }

    pub fn eval(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Gt => lhs > rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

/// Constraint on one slot of a pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotConstraint {
    /// Bare variable: matches any present value
    Bind,
    Symbol(String),
    Str(String),
    Int(i64),
    /// `?v&:(op ?v operand)` numeric guard
    Guard { op: CmpOp, operand: i64 },
}

/// One left-hand-side pattern of a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternDef {
    pub negated: bool,
    pub template: String,
    pub constraints: Vec<(String, SlotConstraint)>,
}

/// One fact asserted by a rule's right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertDef {
    pub template: String,
    pub slots: Vec<(String, SlotValue)>,
}

/// A parsed rule declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDef {
    pub name: String,
    pub doc: Option<String>,
    pub salience: i64,
    pub patterns: Vec<PatternDef>,
    pub asserts: Vec<AssertDef>,
}

/// A parsed template declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDef {
    pub name: String,
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Construct {
    Template(TemplateDef),
    Rule(RuleDef),
}

/// Parse a complete source text into constructs.
pub fn parse_source(src: &str) -> Result<Vec<Construct>, EngineError> {
    let sexps = Reader::new(src).read_all()?;
    let mut constructs = Vec::new();

    for sexp in sexps {
        let line = sexp.line();
        let Sexp::List(items, _) = sexp else {
            return Err(parse_err(line, "expected a top-level construct"));
        };
        match items.first() {
            Some(Sexp::Sym(head, _)) if head == "deftemplate" => {
                constructs.push(Construct::Template(parse_template(&items, line)?));
            }
            Some(Sexp::Sym(head, _)) if head == "defrule" => {
                constructs.push(Construct::Rule(parse_rule(&items, line)?));
            }
            _ => {
                return Err(parse_err(line, "expected `deftemplate` or `defrule`"));
            }
        }
    }

    Ok(constructs)
}

fn sym(sexp: &Sexp, what: &str) -> Result<String, EngineError> {
    match sexp {
        Sexp::Sym(s, _) => Ok(s.clone()),
        other => Err(parse_err(other.line(), format!("expected {what}"))),
    }
}

fn parse_template(items: &[Sexp], line: usize) -> Result<TemplateDef, EngineError> {
    let name = sym(
        items
            .get(1)
            .ok_or_else(|| parse_err(line, "deftemplate missing name"))?,
        "template name",
    )?;

    let mut slots = Vec::new();
    for item in &items[2..] {
        let Sexp::List(slot_items, slot_line) = item else {
            return Err(parse_err(item.line(), "expected `(slot <name>)`"));
        };
        match (slot_items.first(), slot_items.get(1)) {
            (Some(Sexp::Sym(kind, _)), Some(Sexp::Sym(slot_name, _))) if kind == "slot" => {
                slots.push(slot_name.clone());
            }
            _ => return Err(parse_err(*slot_line, "expected `(slot <name>)`")),
        }
    }

    Ok(TemplateDef { name, slots })
}

fn parse_rule(items: &[Sexp], line: usize) -> Result<RuleDef, EngineError> {
    let name = sym(
        items
            .get(1)
            .ok_or_else(|| parse_err(line, "defrule missing name"))?,
        "rule name",
    )?;

    let mut idx = 2;
    let doc = match items.get(idx) {
        Some(Sexp::Str(s, _)) => {
            idx += 1;
            Some(s.clone())
        }
        _ => None,
    };

    let mut salience = 0i64;
    if let Some(Sexp::List(decl, decl_line)) = items.get(idx) {
        if matches!(decl.first(), Some(Sexp::Sym(head, _)) if head == "declare") {
            salience = parse_salience(decl, *decl_line)?;
            idx += 1;
        }
    }

    let mut patterns = Vec::new();
    loop {
        match items.get(idx) {
            None => return Err(parse_err(line, format!("rule `{name}` has no `=>`"))),
            Some(Sexp::Sym(arrow, _)) if arrow == "=>" => {
                idx += 1;
                break;
            }
            Some(item) => {
                patterns.push(parse_pattern(item)?);
                idx += 1;
            }
        }
    }

    let mut asserts = Vec::new();
    for item in &items[idx..] {
        let Sexp::List(action, action_line) = item else {
            return Err(parse_err(item.line(), "expected an action list"));
        };
        match action.first() {
            Some(Sexp::Sym(head, _)) if head == "assert" => {
                for fact_spec in &action[1..] {
                    asserts.push(parse_assert(fact_spec)?);
                }
            }
            _ => {
                return Err(parse_err(
                    *action_line,
                    format!("rule `{name}`: only `assert` actions are supported"),
                ))
            }
        }
    }

    Ok(RuleDef {
        name,
        doc,
        salience,
        patterns,
        asserts,
    })
}

fn parse_salience(decl: &[Sexp], line: usize) -> Result<i64, EngineError> {
    let Some(Sexp::List(inner, inner_line)) = decl.get(1) else {
        return Err(parse_err(line, "expected `(declare (salience <n>))`"));
    };
    match (inner.first(), inner.get(1)) {
        (Some(Sexp::Sym(head, _)), Some(Sexp::Int(n, _))) if head == "salience" => Ok(*n),
        _ => Err(parse_err(*inner_line, "expected `(salience <n>)`")),
    }
}

fn parse_pattern(sexp: &Sexp) -> Result<PatternDef, EngineError> {
    let Sexp::List(items, line) = sexp else {
        return Err(parse_err(sexp.line(), "expected a pattern list"));
    };

    match items.first() {
        Some(Sexp::Sym(head, _)) if head == "not" => {
            let inner = items
                .get(1)
                .ok_or_else(|| parse_err(*line, "`not` needs an inner pattern"))?;
            if items.len() > 2 {
                return Err(parse_err(*line, "`not` takes exactly one pattern"));
            }
            let mut pattern = parse_pattern(inner)?;
            if pattern.negated {
                return Err(parse_err(*line, "nested `not` is not supported"));
            }
            pattern.negated = true;
            Ok(pattern)
        }
        Some(Sexp::Sym(template, _)) => {
            let mut constraints = Vec::new();
            for item in &items[1..] {
                constraints.push(parse_constraint(item)?);
            }
            Ok(PatternDef {
                negated: false,
                template: template.clone(),
                constraints,
            })
        }
        _ => Err(parse_err(*line, "pattern must start with a template name")),
    }
}

fn parse_constraint(sexp: &Sexp) -> Result<(String, SlotConstraint), EngineError> {
    let Sexp::List(items, line) = sexp else {
        return Err(parse_err(sexp.line(), "expected `(slot constraint)`"));
    };
    let slot = sym(
        items
            .first()
            .ok_or_else(|| parse_err(*line, "empty slot constraint"))?,
        "slot name",
    )?;

    let constraint = match (items.get(1), items.get(2)) {
        (Some(Sexp::Sym(token, _)), None) if token.starts_with('?') => SlotConstraint::Bind,
        (Some(Sexp::Sym(token, _)), None) => SlotConstraint::Symbol(token.clone()),
        (Some(Sexp::Str(s, _)), None) => SlotConstraint::Str(s.clone()),
        (Some(Sexp::Int(n, _)), None) => SlotConstraint::Int(*n),
        (Some(Sexp::Sym(var, _)), Some(Sexp::List(pred, pred_line)))
            if var.starts_with('?') && var.ends_with("&:") =>
        {
            parse_guard(pred, *pred_line)?
        }
        _ => {
            return Err(parse_err(
                *line,
                format!("unsupported constraint on slot `{slot}`"),
            ))
        }
    };

    Ok((slot, constraint))
}

fn parse_guard(pred: &[Sexp], line: usize) -> Result<SlotConstraint, EngineError> {
    match (pred.first(), pred.get(1), pred.get(2)) {
        (Some(Sexp::Sym(op, _)), Some(Sexp::Sym(var, _)), Some(Sexp::Int(operand, _)))
            if var.starts_with('?') =>
        {
            let op = CmpOp::parse(op)
                .ok_or_else(|| parse_err(line, format!("unknown comparator `{op}`")))?;
            Ok(SlotConstraint::Guard {
                op,
                operand: *operand,
            })
        }
        _ => Err(parse_err(line, "expected `(op ?var <int>)` guard")),
    }
}

fn parse_assert(sexp: &Sexp) -> Result<AssertDef, EngineError> {
    let Sexp::List(items, line) = sexp else {
        return Err(parse_err(sexp.line(), "expected an asserted fact"));
    };
    let template = sym(
        items
            .first()
            .ok_or_else(|| parse_err(*line, "empty asserted fact"))?,
        "template name",
    )?;

    let mut slots = Vec::new();
    for item in &items[1..] {
        let Sexp::List(slot_items, slot_line) = item else {
            return Err(parse_err(item.line(), "expected `(slot value)`"));
        };
        let slot = sym(
            slot_items
                .first()
                .ok_or_else(|| parse_err(*slot_line, "empty slot"))?,
            "slot name",
        )?;
        let value = match slot_items.get(1) {
            Some(Sexp::Sym(s, _)) if !s.starts_with('?') => SlotValue::Symbol(s.clone()),
            Some(Sexp::Str(s, _)) => SlotValue::Str(s.clone()),
            Some(Sexp::Int(n, _)) => SlotValue::Int(*n),
            _ => {
                return Err(parse_err(
                    *slot_line,
                    format!("slot `{slot}` needs a literal value"),
                ))
            }
        };
        slots.push((slot, value));
    }

    Ok(AssertDef { template, slots })
}

/// Parse one fact string, e.g. `(patient-symptom (name chest-pain))`.
pub fn parse_fact(text: &str) -> Result<Fact, EngineError> {
    let sexps = Reader::new(text).read_all()?;
    if sexps.len() != 1 {
        return Err(EngineError::MalformedFact(text.to_string()));
    }
    let assert = parse_assert(&sexps[0]).map_err(|_| EngineError::MalformedFact(text.to_string()))?;
    Ok(Fact::new(assert.template, assert.slots))
}
