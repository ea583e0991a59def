use crate::error::{RuleError, RuleResult};
use crate::parser::{self, Node};
use acctsync_model::{AccountRecord, Schema};
use acctsync_types::FieldValue;
use std::fmt;
use tracing::debug;

/// A compiled predicate over account records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// `(true)` / `(false)`
    Constant(bool),
    /// `(eq attr value)` / `(ne attr value)`. Only text values ever match,
    /// for either form.
    Equals {
        attribute: String,
        value: String,
        negate: bool,
    },
    /// `(empty attr)`: absent, empty text or empty collection.
    Empty { attribute: String },
    /// `(contains attr value)`: membership for collections, equality for text.
    Contains { attribute: String, value: String },
    Not(Box<Rule>),
    And(Vec<Rule>),
    Or(Vec<Rule>),
    /// True when exactly one operand is true.
    Xor(Vec<Rule>),
}

/// Operand kinds in a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Word,
    Rule,
}

/// Operand signature of an operator: fixed operands, the last of which may
/// repeat.
struct Signature {
    operands: &'static [Operand],
    repeat_last: bool,
}

impl Signature {
    const fn new(operands: &'static [Operand], repeat_last: bool) -> Self {
        Self {
            operands,
            repeat_last,
        }
    }

    fn describe(&self) -> String {
        let n = self.operands.len();
        if self.repeat_last {
            format!("at least {n}")
        } else {
            n.to_string()
        }
    }

    fn accepts(&self, count: usize) -> bool {
        let n = self.operands.len();
        count == n || (self.repeat_last && count > n)
    }

    fn kind_at(&self, index: usize) -> Operand {
        let last = self.operands.len().saturating_sub(1);
        self.operands[index.min(last)]
    }
}

const NONE: &[Operand] = &[];
const W: &[Operand] = &[Operand::Word];
const WW: &[Operand] = &[Operand::Word, Operand::Word];
const R: &[Operand] = &[Operand::Rule];
const RR: &[Operand] = &[Operand::Rule, Operand::Rule];

fn signature(operator: &str) -> Option<Signature> {
    let sig = match operator {
        "true" | "false" => Signature::new(NONE, false),
        "eq" | "ne" | "contains" => Signature::new(WW, false),
        "empty" => Signature::new(W, false),
        "not" => Signature::new(R, false),
        "and" | "or" | "xor" => Signature::new(RR, true),
        _ => return None,
    };
    Some(sig)
}

/// Compiles nested lists into rules, checking operators against the
/// signature table and attributes against the schema.
struct Builder<'a> {
    name: &'a str,
    schema: &'a Schema,
}

impl Builder<'_> {
    fn build(&self, items: &[Node]) -> RuleResult<Rule> {
        let (head, operands) = items.split_first().ok_or_else(|| RuleError::Empty {
            rule: self.name.to_string(),
        })?;
        let Node::Word(operator) = head else {
            return Err(RuleError::OperandKind {
                rule: self.name.to_string(),
                operator: String::new(),
                index: 0,
                expected: "operator name",
            });
        };
        let sig = signature(operator).ok_or_else(|| RuleError::UnknownOperator {
            rule: self.name.to_string(),
            operator: operator.clone(),
        })?;
        if !sig.accepts(operands.len()) {
            return Err(RuleError::Arity {
                rule: self.name.to_string(),
                operator: operator.clone(),
                expected: sig.describe(),
                found: operands.len(),
            });
        }

        let mut words = Vec::new();
        let mut rules = Vec::new();
        for (i, operand) in operands.iter().enumerate() {
            match (sig.kind_at(i), operand) {
                (Operand::Word, Node::Word(w)) => words.push(w.clone()),
                (Operand::Rule, Node::List(sub)) => rules.push(self.build(sub)?),
                (kind, _) => {
                    return Err(RuleError::OperandKind {
                        rule: self.name.to_string(),
                        operator: operator.clone(),
                        index: i + 1,
                        expected: match kind {
                            Operand::Word => "word",
                            Operand::Rule => "list",
                        },
                    });
                }
            }
        }

        if let Some(attribute) = words.first() {
            if !self.schema.contains(attribute) {
                return Err(RuleError::UnknownAttribute {
                    rule: self.name.to_string(),
                    attribute: attribute.clone(),
                });
            }
        }

        let mut words = words.into_iter();
        let mut word = || words.next().unwrap_or_default();
        let rule = match operator.as_str() {
            "true" => Rule::Constant(true),
            "false" => Rule::Constant(false),
            "eq" | "ne" => Rule::Equals {
                attribute: word(),
                value: word(),
                negate: operator == "ne",
            },
            "empty" => Rule::Empty { attribute: word() },
            "contains" => Rule::Contains {
                attribute: word(),
                value: word(),
            },
            "not" => Rule::Not(Box::new(rules.remove(0))),
            "and" => Rule::And(rules),
            "or" => Rule::Or(rules),
            _ => Rule::Xor(rules),
        };
        Ok(rule)
    }
}

impl Rule {
    /// Compiles rule text. `name` identifies the rule in error messages.
    pub fn compile(name: &str, text: &str, schema: &Schema) -> RuleResult<Self> {
        let items = parser::parse(name, text)?;
        let rule = Builder { name, schema }.build(&items)?;
        debug!(rule = name, compiled = %rule, "rule compiled");
        Ok(rule)
    }

    /// Evaluates the rule against a record.
    #[must_use]
    pub fn check(&self, record: &AccountRecord) -> bool {
        match self {
            Self::Constant(value) => *value,
            Self::Equals {
                attribute,
                value,
                negate,
            } => match record.get(attribute) {
                Some(FieldValue::Text(actual)) => (actual == value) != *negate,
                _ => false,
            },
            Self::Empty { attribute } => match record.get(attribute) {
                None => true,
                Some(FieldValue::Text(t)) => t.is_empty(),
                Some(FieldValue::Bytes(b)) => b.is_empty(),
                Some(FieldValue::Set(s)) => s.is_empty(),
                Some(FieldValue::Integer(_)) => false,
            },
            Self::Contains { attribute, value } => match record.get(attribute) {
                Some(FieldValue::Text(actual)) => actual == value,
                Some(FieldValue::Set(set)) => set.contains(value),
                _ => false,
            },
            Self::Not(rule) => !rule.check(record),
            Self::And(rules) => rules.iter().all(|r| r.check(record)),
            Self::Or(rules) => rules.iter().any(|r| r.check(record)),
            Self::Xor(rules) => rules.iter().filter(|r| r.check(record)).count() == 1,
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"{}\"", s.replace('"', "\"\""))
}

fn write_list(f: &mut fmt::Formatter<'_>, op: &str, rules: &[Rule]) -> fmt::Result {
    write!(f, "({op}")?;
    for r in rules {
        write!(f, " {r}")?;
    }
    f.write_str(")")
}

/// Canonical rule text; compiling it yields an identical rule.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(true) => f.write_str("(true)"),
            Self::Constant(false) => f.write_str("(false)"),
            Self::Equals {
                attribute,
                value,
                negate,
            } => {
                write!(f, "({} {attribute} ", if *negate { "ne" } else { "eq" })?;
                write_quoted(f, value)?;
                f.write_str(")")
            }
            Self::Empty { attribute } => write!(f, "(empty {attribute})"),
            Self::Contains { attribute, value } => {
                write!(f, "(contains {attribute} ")?;
                write_quoted(f, value)?;
                f.write_str(")")
            }
            Self::Not(rule) => write!(f, "(not {rule})"),
            Self::And(rules) => write_list(f, "and", rules),
            Self::Or(rules) => write_list(f, "or", rules),
            Self::Xor(rules) => write_list(f, "xor", rules),
        }
    }
}
