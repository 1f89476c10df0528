//! Grammar text format parser.
//!
//! Grammars can be written one rule per clause instead of being built with
//! [`Grammar::add_rule`] calls:
//!
//! ```rust
//! use lot_pcfg::parser::parse_grammar;
//!
//! let grammar = parse_grammar(r#"
//!     % start symbol
//!     START -> (EXPR).
//!     EXPR -> plus_(EXPR, EXPR) 4.0 resample=10.0.
//!     EXPR -> x 25.0.
//!     EXPR -> "1.0" 2.0.
//!     FUNCTION -> lambda(EXPR) bind=[EXPR].
//! "#).unwrap();
//!
//! assert_eq!(grammar.rules("EXPR").len(), 3);
//! ```
//!
//! A clause is `NT -> name(items) weight resample=w bind=[NT, ...].` where
//! everything after the name is optional and the weight defaults to 1. A
//! clause with no name, like `(EXPR)`, gives an anonymous rule. Items are
//! symbols or `[...]` sequences; symbols that are not identifiers are quoted.

use crate::error::GrammarError;
use crate::grammar::{Grammar, GrammarConfig};
use crate::rule::RuleSpec;
use crate::symbol::{Item, Symbol};
use std::iter::Peekable;
use std::str::{Chars, FromStr};
use thiserror::Error;

/// Parser error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character: {0}")]
    UnexpectedChar(char),
    #[error("expected {expected}, found {found}")]
    Expected { expected: String, found: String },
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("unknown rule option: {0}")]
    UnknownOption(String),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    Number(f64),

    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Dot,      // .
    Arrow,    // ->
    Eq,       // =

    Eof,
}

struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    /// Token already read past, returned before lexing further
    pending: Option<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
            pending: None,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        self.input.next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '%' {
                // Skip comment to end of line
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> String {
        let mut result = String::new();
        while let Some(c) = self.peek() {
            if predicate(c) {
                result.push(c);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self) -> ParseResult<String> {
        // Consume opening quote
        self.advance();
        let mut result = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(result),
                Some('\\') => match self.advance() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some(c) => result.push(c),
                    None => return Err(ParseError::UnterminatedString),
                },
                Some(c) => result.push(c),
                None => return Err(ParseError::UnterminatedString),
            }
        }
    }

    fn read_number(&mut self, first: char) -> ParseResult<Token> {
        let mut s = String::new();
        s.push(first);
        s.push_str(&self.read_while(|c| c.is_ascii_digit()));

        if self.peek() == Some('.') {
            self.advance();
            if self.peek().map_or(false, |c| c.is_ascii_digit()) {
                s.push('.');
                s.push_str(&self.read_while(|c| c.is_ascii_digit()));
            } else {
                // The dot ends the clause; hand it back on the next call.
                self.pending = Some(Token::Dot);
            }
        }

        if self.pending.is_none() {
            if let Some(c @ ('e' | 'E')) = self.peek() {
                s.push(c);
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    s.push(sign);
                    self.advance();
                }
                s.push_str(&self.read_while(|c| c.is_ascii_digit()));
            }
        }

        s.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ParseError::InvalidNumber(s))
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        if let Some(token) = self.pending.take() {
            return Ok(token);
        }

        self.skip_whitespace();

        let c = match self.peek() {
            None => return Ok(Token::Eof),
            Some(c) => c,
        };
        match c {
            '(' => { self.advance(); Ok(Token::LParen) }
            ')' => { self.advance(); Ok(Token::RParen) }
            '[' => { self.advance(); Ok(Token::LBracket) }
            ']' => { self.advance(); Ok(Token::RBracket) }
            ',' => { self.advance(); Ok(Token::Comma) }
            '.' => { self.advance(); Ok(Token::Dot) }
            '=' => { self.advance(); Ok(Token::Eq) }
            '-' => {
                self.advance();
                match self.peek() {
                    Some('>') => {
                        self.advance();
                        Ok(Token::Arrow)
                    }
                    Some(d) if d.is_ascii_digit() => self.read_number('-'),
                    _ => Err(ParseError::UnexpectedChar('-')),
                }
            }
            '"' => self.read_string().map(Token::Quoted),
            c if c.is_ascii_digit() => {
                self.advance();
                self.read_number(c)
            }
            c if c.is_alphabetic() || c == '_' => {
                let name = self.read_while(|c| c.is_alphanumeric() || c == '_' || c == '\'');
                Ok(Token::Ident(name))
            }
            c => Err(ParseError::UnexpectedChar(c)),
        }
    }
}

/// Parser for the grammar text format.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input.
    pub fn new(input: &'a str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    fn advance(&mut self) -> ParseResult<Token> {
        let prev = std::mem::replace(&mut self.current, self.lexer.next_token()?);
        Ok(prev)
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current == expected {
            self.advance()?;
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::Expected {
            expected: expected.to_string(),
            found: format!("{:?}", self.current),
        }
    }

    fn parse_symbol(&mut self) -> ParseResult<Symbol> {
        match &self.current {
            Token::Ident(s) | Token::Quoted(s) => {
                let s: Symbol = s.as_str().into();
                self.advance()?;
                Ok(s)
            }
            _ => Err(self.unexpected("symbol")),
        }
    }

    /// Parse one right-hand-side item.
    fn parse_item(&mut self) -> ParseResult<Item> {
        if self.current == Token::LBracket {
            self.advance()?;
            let items = self.parse_items(Token::RBracket)?;
            return Ok(Item::Seq(items));
        }
        self.parse_symbol().map(Item::Symbol)
    }

    /// Parse a comma-separated item list up to and including `close`.
    fn parse_items(&mut self, close: Token) -> ParseResult<Vec<Item>> {
        let mut items = Vec::new();
        if self.current != close {
            items.push(self.parse_item()?);
            while self.current == Token::Comma {
                self.advance()?;
                items.push(self.parse_item()?);
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_number(&mut self) -> ParseResult<f64> {
        match self.current {
            Token::Number(n) => {
                self.advance()?;
                Ok(n)
            }
            _ => Err(self.unexpected("number")),
        }
    }

    /// Parse a single clause.
    pub fn parse_rule(&mut self) -> ParseResult<RuleSpec> {
        let nonterminal = self.parse_symbol()?;
        self.expect(Token::Arrow)?;

        let name: Symbol = match self.current {
            Token::LParen => "".into(),
            _ => self.parse_symbol()?,
        };
        let children = if self.current == Token::LParen {
            self.advance()?;
            self.parse_items(Token::RParen)?
        } else {
            Vec::new()
        };
        let weight = match self.current {
            Token::Number(_) => self.parse_number()?,
            _ => 1.0,
        };
        let mut spec = RuleSpec::new(nonterminal, name, children, weight);

        while let Token::Ident(option) = &self.current {
            let option = option.clone();
            self.advance()?;
            self.expect(Token::Eq)?;
            match option.as_str() {
                "resample" => {
                    spec = spec.resample_weight(self.parse_number()?);
                }
                "bind" => {
                    self.expect(Token::LBracket)?;
                    if self.current != Token::RBracket {
                        spec = spec.bind(self.parse_symbol()?);
                        while self.current == Token::Comma {
                            self.advance()?;
                            spec = spec.bind(self.parse_symbol()?);
                        }
                    }
                    self.expect(Token::RBracket)?;
                }
                _ => return Err(ParseError::UnknownOption(option)),
            }
        }

        self.expect(Token::Dot)?;
        Ok(spec)
    }

    /// Parse every clause into `grammar`.
    pub fn parse_into(&mut self, grammar: &mut Grammar) -> ParseResult<()> {
        while self.current != Token::Eof {
            let spec = self.parse_rule()?;
            grammar.add_rule_with(spec)?;
        }
        Ok(())
    }
}

/// Parse a grammar with the default configuration.
pub fn parse_grammar(input: &str) -> ParseResult<Grammar> {
    parse_grammar_with(input, GrammarConfig::default())
}

/// Parse a grammar with a custom configuration.
pub fn parse_grammar_with(input: &str, config: GrammarConfig) -> ParseResult<Grammar> {
    let mut grammar = Grammar::with_config(config);
    Parser::new(input)?.parse_into(&mut grammar)?;
    Ok(grammar)
}

impl FromStr for Grammar {
    type Err = ParseError;

    fn from_str(s: &str) -> ParseResult<Grammar> {
        parse_grammar(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleId;

    fn parse_one(input: &str) -> RuleSpec {
        Parser::new(input).unwrap().parse_rule().unwrap()
    }

    #[test]
    fn test_parse_terminal_rule() {
        let r = parse_one("EXPR -> x 25.");
        assert_eq!(&*r.nonterminal, "EXPR");
        assert_eq!(&*r.name, "x");
        assert!(r.children.is_empty());
        assert_eq!(r.weight, 25.0);
    }

    #[test]
    fn test_parse_default_weight() {
        let r = parse_one("EXPR -> plus_(EXPR, EXPR).");
        assert_eq!(r.weight, 1.0);
        assert_eq!(r.children, vec![Item::from("EXPR"), Item::from("EXPR")]);
    }

    #[test]
    fn test_parse_options() {
        let r = parse_one("FUNCTION -> lambda(EXPR) 2.5 resample=0.5 bind=[EXPR, BOOL].");
        assert_eq!(r.weight, 2.5);
        assert_eq!(r.resample_weight, 0.5);
        assert_eq!(r.bound_vars, vec![Symbol::from("EXPR"), Symbol::from("BOOL")]);
    }

    #[test]
    fn test_parse_anonymous_and_sequences() {
        let r = parse_one("START -> ([A, \"b c\"], C) 1e-2.");
        assert_eq!(&*r.name, "");
        assert_eq!(
            r.children,
            vec![
                Item::seq(vec![Item::from("A"), Item::from("b c")]),
                Item::from("C"),
            ]
        );
        assert!((r.weight - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_parse_grammar_with_comments() {
        let g = parse_grammar(
            r#"
            % arithmetic
            START -> (EXPR).
            EXPR -> plus_(EXPR, EXPR) 4.0.  % inline comment
            EXPR -> x 25.
            EXPR -> "1.0" 2.0.
        "#,
        )
        .unwrap();
        assert_eq!(g.rule_count(), 4);
        assert_eq!(g.rules("EXPR")[2].id, RuleId(3));
        assert!(g.is_terminal(&Item::from("1.0")));
    }

    #[test]
    fn test_display_round_trip() {
        let text = "EXPR -> plus_(EXPR, EXPR) 4.\n\
                    EXPR -> \"1.0\" 2.\n\
                    FUNCTION -> lambda(EXPR) 1 resample=3 bind=[EXPR].\n\
                    PAIR -> pair([A, \"b\\\"q\"]) 0.5.\n\
                    START -> () 1.\n";
        let g: Grammar = text.parse().unwrap();
        assert_eq!(g.to_string(), text);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_grammar("EXPR x."),
            Err(ParseError::Expected { .. })
        ));
        assert_eq!(
            parse_grammar("EXPR -> x depth=3.").err(),
            Some(ParseError::UnknownOption("depth".to_string()))
        );
        assert_eq!(
            parse_grammar("EXPR -> \"x").err(),
            Some(ParseError::UnterminatedString)
        );
        assert_eq!(
            parse_grammar("EXPR -> x; ").err(),
            Some(ParseError::UnexpectedChar(';'))
        );
        assert!(matches!(
            parse_grammar("F -> lambda(A, B) bind=[A]."),
            Err(ParseError::Grammar(GrammarError::MalformedLambda { found: 2, .. }))
        ));
        assert!(matches!(
            parse_grammar("EXPR -> x -1."),
            Err(ParseError::Grammar(GrammarError::InvalidWeight { .. }))
        ));
    }

    #[test]
    fn test_custom_config() {
        let config = GrammarConfig {
            bound_var_prefix: "v".to_string(),
            ..GrammarConfig::default()
        };
        let g = parse_grammar_with("F -> lambda(E) bind=[E].\nE -> e.", config).unwrap();
        let mut scope = crate::grammar::Scope::new();
        assert_eq!(&*g.add_bound_variable_rule(&mut scope, "E", 3).name, "v3");
    }
}
