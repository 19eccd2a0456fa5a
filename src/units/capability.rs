// src/units/capability.rs

//! Capabilities and dependency expressions
//!
//! A capability is a name with an optional version comparison, e.g.
//! `libfoo.so.2` or `zoo-lib >= 2.0-1`. Requires may also be boolean rich
//! dependencies such as `(zoo-lib >= 2.0 or zoo-lib-compat)`.

use crate::error::{Error, Result};
use crate::version::Evr;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Version comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Less,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    Greater,
}

impl Operator {
    /// Parse either the symbolic form (`>=`) or the repodata flag form (`GE`)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "<" | "LT" => Some(Operator::Less),
            "<=" | "=<" | "LE" => Some(Operator::LessOrEqual),
            "=" | "==" | "EQ" => Some(Operator::Equal),
            ">=" | "=>" | "GE" => Some(Operator::GreaterOrEqual),
            ">" | "GT" => Some(Operator::Greater),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Equal => "=",
            Operator::GreaterOrEqual => ">=",
            Operator::Greater => ">",
        }
    }

    fn includes_less(&self) -> bool {
        matches!(self, Operator::Less | Operator::LessOrEqual)
    }

    fn includes_equal(&self) -> bool {
        matches!(
            self,
            Operator::LessOrEqual | Operator::Equal | Operator::GreaterOrEqual
        )
    }

    fn includes_greater(&self) -> bool {
        matches!(self, Operator::Greater | Operator::GreaterOrEqual)
    }
}

/// A named, optionally versioned token a unit provides or requires
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub constraint: Option<(Operator, Evr)>,
}

impl Capability {
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    pub fn versioned(name: impl Into<String>, op: Operator, evr: Evr) -> Self {
        Self {
            name: name.into(),
            constraint: Some((op, evr)),
        }
    }

    /// Parse a capability string: `name` or `name OP version`
    pub fn parse(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();

        match tokens.as_slice() {
            [] => Err(Error::malformed(s, "empty capability")),
            [name] => {
                // Tolerate the compact `name>=1.0` spelling, but leave
                // operators inside parentheses alone: `font(:lang=en)`
                if let Some(pos) = name
                    .find(['<', '>', '='])
                    .filter(|&pos| balanced_parens(&name[..pos]))
                {
                    let (n, rest) = name.split_at(pos);
                    let op_len = rest
                        .find(|c: char| !matches!(c, '<' | '>' | '='))
                        .ok_or_else(|| Error::malformed(s, "operator without version"))?;
                    let (op, ver) = rest.split_at(op_len);
                    return Self::from_parts(s, n, Some(op), Some(ver));
                }
                Self::from_parts(s, name, None, None)
            }
            [name, op, ver] => Self::from_parts(s, name, Some(op), Some(ver)),
            [_, _] => Err(Error::malformed(s, "operator without version")),
            _ => Err(Error::malformed(s, "unexpected trailing tokens")),
        }
    }

    /// Build a capability from separate name, operator and EVR fields, as
    /// found in repodata `<rpm:entry>` elements
    pub fn from_parts(
        input: &str,
        name: &str,
        op: Option<&str>,
        evr: Option<&str>,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::malformed(input, "empty name"));
        }
        if name.starts_with(['<', '>', '=', '(', ')']) {
            return Err(Error::malformed(input, "name starts with an operator"));
        }

        match (op, evr) {
            (None, None) => Ok(Self::unversioned(name)),
            (Some(op), Some(evr)) => {
                let op = Operator::parse(op)
                    .ok_or_else(|| Error::malformed(input, format!("unknown operator '{}'", op)))?;
                let evr = Evr::parse(evr)?;
                Ok(Self::versioned(name, op, evr))
            }
            (Some(_), None) => Err(Error::malformed(input, "operator without version")),
            (None, Some(_)) => Err(Error::malformed(input, "version without operator")),
        }
    }

    /// Check whether this capability, used as a provide, satisfies `required`
    ///
    /// Names must be equal. An unversioned side always matches; otherwise the
    /// two version ranges must overlap.
    pub fn satisfies(&self, required: &Capability) -> bool {
        if self.name != required.name {
            return false;
        }

        let (Some((p_op, p_evr)), Some((r_op, r_evr))) = (&self.constraint, &required.constraint)
        else {
            return true;
        };

        match p_evr.compare_against(r_evr) {
            Ordering::Less => p_op.includes_greater() || r_op.includes_less(),
            Ordering::Greater => p_op.includes_less() || r_op.includes_greater(),
            Ordering::Equal => {
                (p_op.includes_equal() && r_op.includes_equal())
                    || (p_op.includes_less() && r_op.includes_less())
                    || (p_op.includes_greater() && r_op.includes_greater())
            }
        }
    }
}

fn balanced_parens(s: &str) -> bool {
    s.matches('(').count() == s.matches(')').count()
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some((op, evr)) => write!(f, "{} {} {}", self.name, op.as_str(), evr),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A requirement: a plain capability or a rich (boolean) dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dependency {
    Capability(Capability),
    /// `(A and B)`: every operand must be satisfied
    All(Vec<Dependency>),
    /// `(A or B)`: at least one operand must be satisfied
    Any(Vec<Dependency>),
    /// `(A with B)`: every operand, meant to come from one unit
    With(Vec<Dependency>),
    /// `(A without B)`: `A`, meant to come from a unit not matching `B`
    Without {
        dependency: Box<Dependency>,
        excluded: Box<Dependency>,
    },
    /// `(A if B [else C])`, or `(A unless B [else C])` when `negated`
    Conditional {
        dependency: Box<Dependency>,
        condition: Box<Dependency>,
        otherwise: Option<Box<Dependency>>,
        negated: bool,
    },
}

impl Dependency {
    /// Parse a requirement string, including rich dependencies such as
    /// `(a and b)`, `(a or b)` and `(a if b else c)`
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if !trimmed.starts_with('(') {
            return Capability::parse(trimmed).map(Dependency::Capability);
        }

        let mut parser = RichParser {
            input: s,
            rest: trimmed,
        };
        let dep = parser.parse_group()?;
        if !parser.rest.trim().is_empty() {
            return Err(Error::malformed(s, "trailing input after rich dependency"));
        }
        Ok(dep)
    }

    /// All plain capabilities referenced by this dependency
    pub fn capabilities(&self) -> Vec<&Capability> {
        match self {
            Dependency::Capability(cap) => vec![cap],
            Dependency::All(deps) | Dependency::Any(deps) | Dependency::With(deps) => {
                deps.iter().flat_map(|d| d.capabilities()).collect()
            }
            Dependency::Without {
                dependency,
                excluded,
            } => {
                let mut caps = dependency.capabilities();
                caps.extend(excluded.capabilities());
                caps
            }
            Dependency::Conditional {
                dependency,
                condition,
                otherwise,
                ..
            } => {
                let mut caps = dependency.capabilities();
                caps.extend(condition.capabilities());
                if let Some(otherwise) = otherwise {
                    caps.extend(otherwise.capabilities());
                }
                caps
            }
        }
    }
}

impl From<Capability> for Dependency {
    fn from(cap: Capability) -> Self {
        Dependency::Capability(cap)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (deps, keyword) = match self {
            Dependency::Capability(cap) => return write!(f, "{}", cap),
            Dependency::All(deps) => (deps, " and "),
            Dependency::Any(deps) => (deps, " or "),
            Dependency::With(deps) => (deps, " with "),
            Dependency::Without {
                dependency,
                excluded,
            } => return write!(f, "({} without {})", dependency, excluded),
            Dependency::Conditional {
                dependency,
                condition,
                otherwise,
                negated,
            } => {
                let keyword = if *negated { "unless" } else { "if" };
                write!(f, "({} {} {}", dependency, keyword, condition)?;
                if let Some(otherwise) = otherwise {
                    write!(f, " else {}", otherwise)?;
                }
                return write!(f, ")");
            }
        };
        write!(f, "(")?;
        for (i, dep) in deps.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", keyword)?;
            }
            write!(f, "{}", dep)?;
        }
        write!(f, ")")
    }
}

/// Recursive-descent parser for rich dependencies
struct RichParser<'a> {
    input: &'a str,
    rest: &'a str,
}

impl<'a> RichParser<'a> {
    fn parse_group(&mut self) -> Result<Dependency> {
        let rest: &'a str = self.rest;
        self.rest = rest
            .trim_start()
            .strip_prefix('(')
            .ok_or_else(|| Error::malformed(self.input, "expected '('"))?;

        let mut operands = vec![self.parse_operand()?];
        let mut keyword: Option<&'a str> = None;

        loop {
            if self.close() {
                break;
            }

            let word = self.take_word();
            match word {
                "and" | "or" | "with" => {
                    if keyword.is_some_and(|k| k != word) {
                        return Err(self.mixed());
                    }
                    keyword = Some(word);
                    operands.push(self.parse_operand()?);
                }
                // Binary operators: exactly one operand on each side
                "if" | "unless" | "without" if keyword.is_none() => {
                    let dependency = Box::new(operands.remove(0));
                    let condition = Box::new(self.parse_operand()?);

                    let dep = if word == "without" {
                        Dependency::Without {
                            dependency,
                            excluded: condition,
                        }
                    } else {
                        let otherwise = if self.peek_word() == "else" {
                            self.take_word();
                            Some(Box::new(self.parse_operand()?))
                        } else {
                            None
                        };
                        Dependency::Conditional {
                            dependency,
                            condition,
                            otherwise,
                            negated: word == "unless",
                        }
                    };

                    if !self.close() {
                        return Err(Error::malformed(self.input, "expected ')'"));
                    }
                    return Ok(dep);
                }
                "if" | "unless" | "without" => return Err(self.mixed()),
                "else" => {
                    return Err(Error::malformed(
                        self.input,
                        "'else' without 'if' or 'unless'",
                    ))
                }
                "" => return Err(Error::malformed(self.input, "unbalanced parentheses")),
                other => {
                    return Err(Error::malformed(
                        self.input,
                        format!("unsupported rich dependency operator '{}'", other),
                    ))
                }
            }
        }

        Ok(match keyword {
            Some("or") => Dependency::Any(operands),
            Some("with") => Dependency::With(operands),
            Some(_) => Dependency::All(operands),
            None => operands.remove(0),
        })
    }

    fn parse_operand(&mut self) -> Result<Dependency> {
        let rest: &'a str = self.rest.trim_start();
        self.rest = rest;
        if rest.starts_with('(') {
            return self.parse_group();
        }

        // A plain capability runs until a keyword or a closing parenthesis
        let mut end = 0;
        let mut tokens = Vec::new();
        let mut cursor = rest;
        loop {
            let trimmed = cursor.trim_start();
            end += cursor.len() - trimmed.len();
            cursor = trimmed;
            let token_end = word_end(cursor);
            let token = &cursor[..token_end];
            if token.is_empty() || (!tokens.is_empty() && is_rich_keyword(token)) {
                break;
            }
            tokens.push(token);
            end += token_end;
            cursor = &cursor[token_end..];
        }

        let text = &rest[..end];
        self.rest = &rest[end..];
        if text.trim().is_empty() {
            return Err(Error::malformed(self.input, "empty operand"));
        }
        if is_rich_keyword(text.trim()) {
            return Err(Error::malformed(self.input, "operator without operand"));
        }
        Capability::parse(text).map(Dependency::Capability)
    }

    /// Consume a closing parenthesis if it is next
    fn close(&mut self) -> bool {
        let rest: &'a str = self.rest.trim_start();
        match rest.strip_prefix(')') {
            Some(after) => {
                self.rest = after;
                true
            }
            None => {
                self.rest = rest;
                false
            }
        }
    }

    fn peek_word(&self) -> &'a str {
        let rest: &'a str = self.rest.trim_start();
        &rest[..word_end(rest)]
    }

    fn take_word(&mut self) -> &'a str {
        let rest: &'a str = self.rest.trim_start();
        let end = word_end(rest);
        self.rest = &rest[end..];
        &rest[..end]
    }

    fn mixed(&self) -> Error {
        Error::malformed(self.input, "mixed rich operators without parentheses")
    }
}

/// End of the token at the start of `s`
///
/// A token stops at whitespace or at a `)` it did not open, so names such
/// as `pkgconfig(zoo)` stay whole.
fn word_end(s: &str) -> usize {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return i,
            ')' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => return i,
            _ => {}
        }
    }
    s.len()
}

fn is_rich_keyword(token: &str) -> bool {
    matches!(
        token,
        "and" | "or" | "if" | "else" | "with" | "without" | "unless"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(s: &str) -> Capability {
        Capability::parse(s).unwrap()
    }

    #[test]
    fn test_parse_unversioned() {
        let c = cap("libfoo.so.2");
        assert_eq!(c.name, "libfoo.so.2");
        assert!(c.constraint.is_none());
    }

    #[test]
    fn test_parse_versioned() {
        let c = cap("pkgname >= 1.2-3");
        assert_eq!(c.name, "pkgname");
        let (op, evr) = c.constraint.unwrap();
        assert_eq!(op, Operator::GreaterOrEqual);
        assert_eq!(evr.version, "1.2");
        assert_eq!(evr.release.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_compact() {
        let c = cap("zoo-lib>=2.0");
        assert_eq!(c.name, "zoo-lib");
        assert_eq!(c.constraint.unwrap().0, Operator::GreaterOrEqual);
    }

    #[test]
    fn test_parse_parenthesized_name_with_operator_chars() {
        let c = cap("font(:lang=en)");
        assert_eq!(c.name, "font(:lang=en)");
        assert!(c.constraint.is_none());

        let c = cap("pkgconfig(zoo)>=2.0");
        assert_eq!(c.name, "pkgconfig(zoo)");
        assert_eq!(c.constraint.unwrap().0, Operator::GreaterOrEqual);

        let c = cap("font(:lang=en) >= 1.0");
        assert_eq!(c.name, "font(:lang=en)");
        assert!(c.constraint.is_some());
    }

    #[test]
    fn test_parse_malformed() {
        for bad in ["", "   ", "foo >=", "foo 1.0", "foo ~> 1.0", "foo >= 1.0 bar", ">= 1.0", "foo>="] {
            let err = Capability::parse(bad).unwrap_err();
            assert!(
                matches!(err, Error::MalformedCapability { .. }),
                "expected MalformedCapability for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_from_parts_flags() {
        let c = Capability::from_parts("zoo-lib", "zoo-lib", Some("EQ"), Some("0:2.1-1")).unwrap();
        assert_eq!(c.to_string(), "zoo-lib = 2.1-1");
    }

    #[test]
    fn test_satisfies_unversioned() {
        assert!(cap("foo").satisfies(&cap("foo >= 3")));
        assert!(cap("foo = 1.0").satisfies(&cap("foo")));
        assert!(!cap("foo").satisfies(&cap("bar")));
    }

    #[test]
    fn test_satisfies_ranges() {
        assert!(cap("zoo-lib = 2.1").satisfies(&cap("zoo-lib >= 2.0")));
        assert!(!cap("zoo-lib = 1.9").satisfies(&cap("zoo-lib >= 2.0")));
        assert!(cap("zoo-lib = 2.0").satisfies(&cap("zoo-lib >= 2.0")));
        assert!(!cap("zoo-lib = 2.0").satisfies(&cap("zoo-lib > 2.0")));
        assert!(cap("zoo-lib = 1.0").satisfies(&cap("zoo-lib < 2.0")));
        assert!(cap("zoo-lib >= 3.0").satisfies(&cap("zoo-lib > 2.0")));
        assert!(!cap("zoo-lib < 2.0").satisfies(&cap("zoo-lib >= 2.0")));
    }

    #[test]
    fn test_satisfies_release_ignored_when_unspecified() {
        assert!(cap("foo = 2.0-5").satisfies(&cap("foo = 2.0")));
        assert!(!cap("foo = 2.0-5").satisfies(&cap("foo = 2.0-4")));
    }

    #[test]
    fn test_parse_rich_or() {
        let dep = Dependency::parse("(zoo-lib >= 2.0 or zoo-compat)").unwrap();
        match &dep {
            Dependency::Any(ops) => {
                assert_eq!(ops.len(), 2);
                assert_eq!(ops[0], Dependency::Capability(cap("zoo-lib >= 2.0")));
                assert_eq!(ops[1], Dependency::Capability(cap("zoo-compat")));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(dep.to_string(), "(zoo-lib >= 2.0 or zoo-compat)");
    }

    #[test]
    fn test_parse_rich_nested() {
        let dep = Dependency::parse("(a and (b or c >= 1))").unwrap();
        assert_eq!(dep.capabilities().len(), 3);
        assert!(matches!(dep, Dependency::All(_)));
    }

    #[test]
    fn test_parse_rich_parenthesized_names() {
        let dep = Dependency::parse("(zoo-lib and font(:lang=en))").unwrap();
        assert_eq!(
            dep,
            Dependency::All(vec![
                Dependency::Capability(cap("zoo-lib")),
                Dependency::Capability(cap("font(:lang=en)")),
            ])
        );

        let dep = Dependency::parse("(pkgconfig(zoo) >= 2.0 if (walrus or seal))").unwrap();
        assert_eq!(dep.capabilities()[0], &cap("pkgconfig(zoo) >= 2.0"));
        assert_eq!(dep.capabilities().len(), 3);
    }

    #[test]
    fn test_parse_rich_conditional() {
        let dep = Dependency::parse("(zoo-lib if walrus >= 2)").unwrap();
        match &dep {
            Dependency::Conditional {
                dependency,
                condition,
                otherwise,
                negated,
            } => {
                assert_eq!(**dependency, Dependency::Capability(cap("zoo-lib")));
                assert_eq!(**condition, Dependency::Capability(cap("walrus >= 2")));
                assert!(otherwise.is_none());
                assert!(!negated);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(dep.to_string(), "(zoo-lib if walrus >= 2)");

        let dep = Dependency::parse("(a unless b else (c or d))").unwrap();
        assert!(matches!(
            &dep,
            Dependency::Conditional { negated: true, otherwise: Some(_), .. }
        ));
        assert_eq!(dep.to_string(), "(a unless b else (c or d))");
        assert_eq!(dep.capabilities().len(), 4);
    }

    #[test]
    fn test_parse_rich_with_and_without() {
        let dep = Dependency::parse("(a with b with c)").unwrap();
        assert!(matches!(&dep, Dependency::With(ops) if ops.len() == 3));
        assert_eq!(dep.to_string(), "(a with b with c)");

        let dep = Dependency::parse("(a >= 1 without a-devel)").unwrap();
        match &dep {
            Dependency::Without { dependency, excluded } => {
                assert_eq!(**dependency, Dependency::Capability(cap("a >= 1")));
                assert_eq!(**excluded, Dependency::Capability(cap("a-devel")));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(dep.to_string(), "(a >= 1 without a-devel)");
    }

    #[test]
    fn test_parse_rich_rejected() {
        for bad in [
            "(a and b or c)",
            "(a and b if c)",
            "(a if b and c)",
            "(a if b without c)",
            "(a else b)",
            "(a if)",
            "(a if b else)",
            "(a and b",
            "(a and)",
            "(a) trailing",
            "(a xor b)",
        ] {
            assert!(Dependency::parse(bad).is_err(), "expected error for {:?}", bad);
        }
    }
}
