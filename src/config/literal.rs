//! Configuration literals.
//!
//! A literal is a number, a single character (stored as its code point), or
//! a reference `@name` to the address bound to a symbol.

use std::fmt;
use std::str::FromStr;

use super::ConfigError;
use crate::machine::{Memory, Word};

/// A value in a configuration entry, before symbol resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Number(Word),
    Char(char),
    SymbolRef(String),
}

impl Literal {
    /// Parse the string form of a literal.
    ///
    /// Tried in order: a decimal integer (optionally signed), a single
    /// character, then `@name`. Anything else is invalid.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let digits = text.strip_prefix('-').unwrap_or(text);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return text
                .parse::<Word>()
                .map(Literal::Number)
                .map_err(|_| ConfigError::InvalidLiteral(text.to_string()));
        }

        let mut chars = text.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(Literal::Char(c));
        }

        match text.strip_prefix('@') {
            Some(name) if !name.is_empty() => Ok(Literal::SymbolRef(name.to_string())),
            _ => Err(ConfigError::InvalidLiteral(text.to_string())),
        }
    }

    /// Resolve to the word stored in memory.
    ///
    /// Symbol references resolve against the symbols already bound in
    /// `memory`; an unbound name is an invalid literal.
    pub fn resolve(&self, memory: &Memory) -> Result<Word, ConfigError> {
        match self {
            Literal::Number(n) => Ok(*n),
            Literal::Char(c) => Ok(Word::from(u32::from(*c))),
            Literal::SymbolRef(name) => memory
                .symbols()
                .resolve(name)
                .and_then(|addr| Word::try_from(addr).ok())
                .ok_or_else(|| ConfigError::InvalidLiteral(format!("@{}", name))),
        }
    }
}

impl FromStr for Literal {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Literal::parse(s)
    }
}

impl From<Word> for Literal {
    fn from(n: Word) -> Self {
        Literal::Number(n)
    }
}

impl From<char> for Literal {
    fn from(c: char) -> Self {
        Literal::Char(c)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Char(c) => write!(f, "{:?}", c),
            Literal::SymbolRef(name) => write!(f, "@{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers() {
        assert_eq!(Literal::parse("42").unwrap(), Literal::Number(42));
        assert_eq!(Literal::parse("-1").unwrap(), Literal::Number(-1));
        assert_eq!(Literal::parse("7").unwrap(), Literal::Number(7));
    }

    #[test]
    fn test_parse_char() {
        assert_eq!(Literal::parse("H").unwrap(), Literal::Char('H'));
        assert_eq!(Literal::parse("@").unwrap(), Literal::Char('@'));
        assert_eq!(Literal::parse("-").unwrap(), Literal::Char('-'));
        assert_eq!(Literal::parse("é").unwrap(), Literal::Char('é'));
    }

    #[test]
    fn test_parse_symbol_ref() {
        assert_eq!(Literal::parse("@add").unwrap(), Literal::SymbolRef("add".into()));
        assert_eq!(Literal::parse("@^1").unwrap(), Literal::SymbolRef("^1".into()));
    }

    #[test]
    fn test_parse_invalid() {
        for text in ["", "hello", "12x", "--3", "99999999999999999999"] {
            assert_eq!(
                Literal::parse(text),
                Err(ConfigError::InvalidLiteral(text.to_string())),
                "{:?}",
                text
            );
        }
    }

    #[test]
    fn test_resolve() {
        let mut mem = Memory::new();
        mem.register_symbol("out", 12);

        assert_eq!(Literal::Number(-5).resolve(&mem).unwrap(), -5);
        assert_eq!(Literal::Char('A').resolve(&mem).unwrap(), 65);
        assert_eq!(Literal::SymbolRef("out".into()).resolve(&mem).unwrap(), 12);
        assert_eq!(
            Literal::SymbolRef("missing".into()).resolve(&mem),
            Err(ConfigError::InvalidLiteral("@missing".into()))
        );
    }
}
