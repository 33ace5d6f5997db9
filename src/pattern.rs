//! Lexer for `date-fns` style format patterns such as `yyyy-MM-dd hh:mm a`.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum PatternToken {
    /// A run of one repeated field letter, e.g. `yyyy` or `MMM`.
    Field {
        letter: char,
        width: usize,
        ordinal: bool,
    },
    Literal(String),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PatternError {
    #[error("Format string contains an unescaped latin alphabet character `{0}`")]
    UnescapedLetter(char),
    #[error("Use `yyyy` instead of `{0}` for formatting years")]
    WeekYear(String),
    #[error("Use `d` instead of `{0}` for formatting days of the month")]
    DayOfYear(String),
}

const FIELD_LETTERS: &str = "GyYuRQqMLwIdDEeciabBhHKkmsStTXxOzPp";
const ORDINAL_LETTERS: &str = "yYQqMLwIdDeciHhKkms";

pub struct PatternLexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> PatternLexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    /// Quoted literal; `''` inside or outside quotes is one apostrophe. An
    /// unterminated quote runs to the end of the pattern.
    fn read_quoted(&mut self) -> String {
        let mut s = String::new();
        if self.chars.peek() == Some(&'\'') {
            self.chars.next();
            s.push('\'');
            return s;
        }
        while let Some(c) = self.chars.next() {
            if c == '\'' {
                if self.chars.peek() == Some(&'\'') {
                    self.chars.next();
                    s.push('\'');
                } else {
                    break;
                }
            } else {
                s.push(c);
            }
        }
        s
    }

    fn read_field(&mut self, letter: char) -> PatternToken {
        let mut width = 1;
        while self.chars.peek() == Some(&letter) {
            self.chars.next();
            width += 1;
        }
        let ordinal = width == 1
            && ORDINAL_LETTERS.contains(letter)
            && self.chars.peek() == Some(&'o');
        if ordinal {
            self.chars.next();
        }
        PatternToken::Field {
            letter,
            width,
            ordinal,
        }
    }

    fn read_literal(&mut self, first: char) -> String {
        let mut s = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c == '\'' || c.is_ascii_alphabetic() {
                break;
            }
            s.push(c);
            self.chars.next();
        }
        s
    }

    pub fn next_token(&mut self) -> Result<Option<PatternToken>, PatternError> {
        let c = match self.chars.next() {
            Some(c) => c,
            None => return Ok(None),
        };

        let tok = match c {
            '\'' => PatternToken::Literal(self.read_quoted()),
            c if c.is_ascii_alphabetic() => {
                if !FIELD_LETTERS.contains(c) {
                    return Err(PatternError::UnescapedLetter(c));
                }
                let tok = self.read_field(c);
                if let PatternToken::Field { width, .. } = &tok {
                    let run: String = std::iter::repeat_n(c, *width).collect();
                    match (c, *width) {
                        ('Y', 2) | ('Y', 4) => return Err(PatternError::WeekYear(run)),
                        ('D', 1) | ('D', 2) => return Err(PatternError::DayOfYear(run)),
                        _ => {}
                    }
                }
                tok
            }
            c => PatternToken::Literal(self.read_literal(c)),
        };

        Ok(Some(tok))
    }

    pub fn tokenize(mut self) -> Result<Vec<PatternToken>, PatternError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            if let (Some(PatternToken::Literal(prev)), PatternToken::Literal(next)) =
                (tokens.last_mut(), &tok)
            {
                prev.push_str(next);
                continue;
            }
            tokens.push(tok);
        }
        Ok(tokens)
    }
}
