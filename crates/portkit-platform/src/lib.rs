//! Boolean platform-expression grammar.
//!
//! A platform expression is the small boolean language that gates
//! dependencies, features, and top-level requirements on the variables of a
//! triplet (`windows`, `linux`, `x64`, `static`, ...). It is deliberately
//! smaller than `cfg()` syntax: there is no `key = "value"` form, only bare
//! identifiers, `!`, `&`, `|`, and parentheses. Mixing `&` and `|` at the same
//! nesting level without parentheses is rejected rather than guessed at.

use std::collections::HashMap;
use std::fmt;

mod lexer;
mod parser;

pub use parser::ParseError;

/// A parsed platform expression, ready to be evaluated against a variable map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PlatformExpr {
    Ident(String),
    Not(Box<PlatformExpr>),
    All(Vec<PlatformExpr>),
    Any(Vec<PlatformExpr>),
}

impl PlatformExpr {
    /// Parses a platform expression from its textual form.
    pub fn parse(input: &str) -> Result<PlatformExpr, ParseError> {
        parser::parse(input)
    }

    /// Evaluates the expression against a variable map.
    ///
    /// A variable not present in `vars` is an error: the caller is expected to
    /// have populated `vars` with every builtin triplet variable plus any
    /// custom variable the triplet file defines before evaluating.
    pub fn eval(&self, vars: &PlatformVars) -> Result<bool, EvalError> {
        match self {
            PlatformExpr::Ident(name) => vars
                .get(name)
                .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            PlatformExpr::Not(inner) => inner.eval(vars).map(|b| !b),
            PlatformExpr::All(parts) => {
                for part in parts {
                    if !part.eval(vars)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            PlatformExpr::Any(parts) => {
                for part in parts {
                    if part.eval(vars)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

impl fmt::Display for PlatformExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformExpr::Ident(name) => write!(f, "{name}"),
            PlatformExpr::Not(inner) => write!(f, "!{inner}"),
            PlatformExpr::All(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
            PlatformExpr::Any(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A name -> boolean map of triplet variables used to evaluate expressions.
#[derive(Clone, Debug, Default)]
pub struct PlatformVars(HashMap<String, bool>);

impl PlatformVars {
    pub fn new() -> Self {
        PlatformVars(HashMap::new())
    }

    pub fn set(&mut self, name: impl Into<String>, value: bool) -> &mut Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }

    /// Convenience constructor mirroring a common vcpkg triplet: an OS
    /// identifier, an architecture identifier, and `static`/`dynamic` linkage,
    /// all set true, with everything else in `extra` set as given.
    pub fn from_triplet(os: &str, arch: &str, static_linkage: bool) -> Self {
        let mut vars = PlatformVars::new();
        vars.set(os, true).set(arch, true);
        vars.set("static", static_linkage);
        vars.set("dynamic", !static_linkage);
        vars
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("unknown platform variable `{0}`; define it in the triplet file or pass allow-unknown")]
    UnknownVariable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, bool)]) -> PlatformVars {
        let mut v = PlatformVars::new();
        for (k, val) in pairs {
            v.set(*k, *val);
        }
        v
    }

    #[test]
    fn parses_bare_ident() {
        assert_eq!(
            PlatformExpr::parse("windows").unwrap(),
            PlatformExpr::Ident("windows".into())
        );
    }

    #[test]
    fn parses_negation() {
        assert_eq!(
            PlatformExpr::parse("!windows").unwrap(),
            PlatformExpr::Not(Box::new(PlatformExpr::Ident("windows".into())))
        );
    }

    #[test]
    fn parses_and_chain() {
        assert_eq!(
            PlatformExpr::parse("windows & x64").unwrap(),
            PlatformExpr::All(vec![
                PlatformExpr::Ident("windows".into()),
                PlatformExpr::Ident("x64".into()),
            ])
        );
    }

    #[test]
    fn parses_or_chain() {
        assert_eq!(
            PlatformExpr::parse("windows | linux").unwrap(),
            PlatformExpr::Any(vec![
                PlatformExpr::Ident("windows".into()),
                PlatformExpr::Ident("linux".into()),
            ])
        );
    }

    #[test]
    fn parses_parenthesized_mix() {
        let e = PlatformExpr::parse("windows & (x64 | arm64)").unwrap();
        assert_eq!(
            e,
            PlatformExpr::All(vec![
                PlatformExpr::Ident("windows".into()),
                PlatformExpr::Any(vec![
                    PlatformExpr::Ident("x64".into()),
                    PlatformExpr::Ident("arm64".into()),
                ]),
            ])
        );
    }

    #[test]
    fn rejects_mixed_and_or_without_parens() {
        let err = PlatformExpr::parse("windows & x64 | linux").unwrap_err();
        assert!(err.to_string().contains("mix"));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(PlatformExpr::parse("windows )").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(PlatformExpr::parse("").is_err());
        assert!(PlatformExpr::parse("   ").is_err());
    }

    #[test]
    fn eval_and_or_not() {
        let v = vars(&[("windows", true), ("x64", false), ("linux", false)]);
        assert_eq!(PlatformExpr::parse("windows").unwrap().eval(&v).unwrap(), true);
        assert_eq!(
            PlatformExpr::parse("windows & x64").unwrap().eval(&v).unwrap(),
            false
        );
        assert_eq!(
            PlatformExpr::parse("windows | x64").unwrap().eval(&v).unwrap(),
            true
        );
        assert_eq!(PlatformExpr::parse("!x64").unwrap().eval(&v).unwrap(), true);
    }

    #[test]
    fn eval_unknown_variable_errors() {
        let v = vars(&[("windows", true)]);
        let err = PlatformExpr::parse("arm64").unwrap().eval(&v).unwrap_err();
        assert!(matches!(err, EvalError::UnknownVariable(name) if name == "arm64"));
    }
}
