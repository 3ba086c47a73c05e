use crate::error::{LineIndex, ParseError, Position};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    DirectiveStart { trim: bool }, // [% or [%-
    DirectiveEnd { trim: bool },   // %] or -%]

    // Keywords
    If,
    End,
    And,
    Or,
    Not,
    True,
    False,

    // Symbols
    EqEq,     // ==
    NotEq,    // !=
    Bang,     // !
    AndAnd,   // &&
    OrOr,     // ||
    Question, // ?
    Colon,    // :
    Dot,      // .
    Comma,    // ,
    LParen,   // (
    RParen,   // )

    // Data
    Ident(String),
    StringLit(String),
    Integer(i64),
    Float(f64),
}

/// A token together with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

const OPEN: &str = "[%";
const CLOSE: &str = "%]";

pub struct Tokenizer<'a> {
    input: &'a str,
    lines: LineIndex<'a>,
    cursor: usize,
    in_tag: bool,
    tag_start: usize,
    // First token of the current directive was IF or END.
    block_tag: bool,
    first_in_tag: bool,
    trim_blocks: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str, trim_blocks: bool) -> Self {
        Self {
            input,
            lines: LineIndex::new(input),
            cursor: 0,
            in_tag: false,
            tag_start: 0,
            block_tag: false,
            first_in_tag: false,
            trim_blocks,
        }
    }

    pub fn position(&self, offset: usize) -> Position {
        self.lines.locate(offset)
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }

    fn spanned(&self, token: Token, offset: usize) -> Option<Spanned> {
        Some(Spanned { token, offset })
    }

    fn invalid(&self, found: &str, message: &str, offset: usize) -> ParseError {
        ParseError::InvalidExpression {
            found: found.to_string(),
            message: message.to_string(),
            position: self.position(offset),
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Spanned>, ParseError> {
        if self.in_tag {
            self.next_in_tag()
        } else {
            Ok(self.next_outside_tag())
        }
    }

    fn next_outside_tag(&mut self) -> Option<Spanned> {
        let rest = self.remaining();
        if rest.is_empty() {
            return None;
        }
        let start = self.cursor;

        match rest.find(OPEN) {
            Some(0) => {
                let trim = rest[OPEN.len()..].starts_with('-');
                self.advance(OPEN.len() + usize::from(trim));
                self.in_tag = true;
                self.tag_start = start;
                self.block_tag = false;
                self.first_in_tag = true;
                self.spanned(Token::DirectiveStart { trim }, start)
            }
            Some(idx) => {
                let text = rest[..idx].to_string();
                self.advance(idx);
                self.spanned(Token::Text(text), start)
            }
            None => {
                let text = rest.to_string();
                self.advance(rest.len());
                self.spanned(Token::Text(text), start)
            }
        }
    }

    fn next_in_tag(&mut self) -> Result<Option<Spanned>, ParseError> {
        // In tag: skip whitespace
        let rest = self.remaining();
        let skipped = rest.len() - rest.trim_start().len();
        self.advance(skipped);

        let rest = self.remaining();
        let start = self.cursor;
        if rest.is_empty() {
            return Err(ParseError::UnterminatedDirective {
                position: self.position(self.tag_start),
            });
        }

        let first_in_tag = std::mem::replace(&mut self.first_in_tag, false);

        // Check tag ends
        let trim_end = rest.starts_with("-%]");
        if trim_end || rest.starts_with(CLOSE) {
            self.advance(CLOSE.len() + usize::from(trim_end));
            self.in_tag = false;

            if self.trim_blocks && self.block_tag && !trim_end {
                let after = self.remaining();
                if after.starts_with('\n') {
                    self.advance(1);
                } else if after.starts_with("\r\n") {
                    self.advance(2);
                }
            }

            return Ok(self.spanned(Token::DirectiveEnd { trim: trim_end }, start));
        }

        // Symbols
        if let Some((len, token)) = symbol(rest) {
            self.advance(len);
            return Ok(self.spanned(token, start));
        }

        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        // Strings
        if first == '\'' || first == '"' {
            return self.lex_string(first, start).map(Some);
        }

        if first.is_ascii_digit() {
            return self.lex_number(start).map(Some);
        }

        // Identifiers / Keywords
        if first.is_alphabetic() || first == '_' {
            let len: usize = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .map(char::len_utf8)
                .sum();
            let ident = &rest[..len];
            self.advance(len);

            let token = match ident {
                "IF" => Token::If,
                "END" => Token::End,
                "AND" => Token::And,
                "OR" => Token::Or,
                "NOT" => Token::Not,
                "true" => Token::True,
                "false" => Token::False,
                _ => Token::Ident(ident.to_string()),
            };
            if first_in_tag && matches!(token, Token::If | Token::End) {
                self.block_tag = true;
            }
            return Ok(self.spanned(token, start));
        }

        let found: String = rest.chars().take(1).collect();
        Err(self.invalid(&found, "unexpected character", start))
    }

    fn lex_string(&mut self, quote: char, start: usize) -> Result<Spanned, ParseError> {
        let rest = self.remaining();
        let mut value = String::new();
        let mut chars = rest.char_indices().skip(1);
        while let Some((idx, c)) = chars.next() {
            if c == quote {
                self.advance(idx + c.len_utf8());
                return Ok(Spanned {
                    token: Token::StringLit(value),
                    offset: start,
                });
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, esc @ ('\\' | '\'' | '"'))) => value.push(esc),
                    Some((_, other)) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => break,
                }
            } else {
                value.push(c);
            }
        }
        Err(ParseError::UnterminatedString {
            position: self.position(start),
        })
    }

    fn lex_number(&mut self, start: usize) -> Result<Spanned, ParseError> {
        let rest = self.remaining();
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let after = &rest[int_len..];
        let frac_len = if after.starts_with('.')
            && after[1..].bytes().next().is_some_and(|b| b.is_ascii_digit())
        {
            1 + after[1..].bytes().take_while(u8::is_ascii_digit).count()
        } else {
            0
        };
        let text = &rest[..int_len + frac_len];

        let token = if frac_len > 0 {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.invalid(text, "malformed number", start))?
        } else {
            text.parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| self.invalid(text, "integer out of range", start))?
        };
        self.advance(text.len());
        Ok(Spanned {
            token,
            offset: start,
        })
    }
}

fn symbol(rest: &str) -> Option<(usize, Token)> {
    let two = match rest.get(..2) {
        Some("==") => Some(Token::EqEq),
        Some("!=") => Some(Token::NotEq),
        Some("&&") => Some(Token::AndAnd),
        Some("||") => Some(Token::OrOr),
        _ => None,
    };
    if let Some(token) = two {
        return Some((2, token));
    }
    let one = match rest.as_bytes().first()? {
        b'!' => Token::Bang,
        b'?' => Token::Question,
        b':' => Token::Colon,
        b'.' => Token::Dot,
        b',' => Token::Comma,
        b'(' => Token::LParen,
        b')' => Token::RParen,
        _ => return None,
    };
    Some((1, one))
}
