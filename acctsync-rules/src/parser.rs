//! Structural parser: rule text to a nested-list syntax tree.
//!
//! Grammar:
//!
//! ```text
//! rule  := list
//! list  := '(' name item* ')'
//! item  := name | string | list
//! name  := alpha (alnum | '_' | '-')*
//! string := '"' ( any char except '"' | '""' )* '"'
//! ```
//!
//! Whitespace separates items and may surround the outer list. Nothing but
//! whitespace may follow it.

use crate::error::{RuleError, RuleResult};

/// A syntax tree node. Quoted strings and bare names are both words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Word(String),
    List(Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the opening parenthesis.
    Start,
    /// After an opening parenthesis: a name must follow.
    Name,
    /// Inside a bare word.
    Word,
    /// Between items.
    Between,
    /// Inside a quoted string.
    Quoted,
    /// Just read a quote inside a string: either an escaped quote or the end.
    QuoteEnd,
    /// The outer list is closed.
    Done,
}

/// Parses rule text into the items of its outer list.
pub fn parse(rule: &str, text: &str) -> RuleResult<Vec<Node>> {
    let chars: Vec<char> = text.chars().collect();
    let mut state = State::Start;
    let mut stack: Vec<Vec<Node>> = Vec::new();
    let mut root: Option<Vec<Node>> = None;
    let mut accum = String::new();
    let mut pos = 0;

    let error = |pos: usize, message: &str| RuleError::Syntax {
        rule: rule.to_string(),
        position: pos,
        message: message.to_string(),
    };

    while pos < chars.len() {
        let c = chars[pos];
        pos += 1;

        match state {
            State::Done => {
                if !c.is_whitespace() {
                    return Err(error(pos, "text after end of rule"));
                }
            }
            State::Start => {
                if c == '(' {
                    stack.push(Vec::new());
                    state = State::Name;
                } else if !c.is_whitespace() {
                    return Err(error(pos, "opening parenthesis expected"));
                }
            }
            State::Name => {
                if c.is_alphabetic() {
                    accum.push(c);
                    state = State::Word;
                } else if !c.is_whitespace() {
                    return Err(error(pos, "name expected"));
                }
            }
            State::Word => {
                if c.is_alphanumeric() || c == '_' || c == '-' {
                    accum.push(c);
                    continue;
                }
                push_word(&mut stack, &mut accum);
                state = match c {
                    ')' => close_list(&mut stack, &mut root),
                    '(' => {
                        stack.push(Vec::new());
                        State::Name
                    }
                    c if c.is_whitespace() => State::Between,
                    _ => return Err(error(pos, "invalid character")),
                };
            }
            State::Between => {
                state = match c {
                    c if c.is_whitespace() => State::Between,
                    c if c.is_alphabetic() => {
                        accum.push(c);
                        State::Word
                    }
                    '"' => State::Quoted,
                    ')' => close_list(&mut stack, &mut root),
                    '(' => {
                        stack.push(Vec::new());
                        State::Name
                    }
                    _ => return Err(error(pos, "letter, '\"' or parenthesis expected")),
                };
            }
            State::Quoted => {
                if c == '"' {
                    state = State::QuoteEnd;
                } else {
                    accum.push(c);
                }
            }
            State::QuoteEnd => {
                if c == '"' {
                    accum.push('"');
                    state = State::Quoted;
                } else {
                    push_word(&mut stack, &mut accum);
                    // Re-read this character as a separator.
                    pos -= 1;
                    state = State::Between;
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(error(pos, "closing parenthesis expected"));
    }
    Ok(root.unwrap_or_default())
}

fn push_word(stack: &mut [Vec<Node>], accum: &mut String) {
    if let Some(top) = stack.last_mut() {
        top.push(Node::Word(std::mem::take(accum)));
    }
}

fn close_list(stack: &mut Vec<Vec<Node>>, root: &mut Option<Vec<Node>>) -> State {
    let Some(list) = stack.pop() else {
        return State::Done;
    };
    match stack.last_mut() {
        Some(parent) => {
            parent.push(Node::List(list));
            State::Between
        }
        None => {
            *root = Some(list);
            State::Done
        }
    }
}
