use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    Cmp(CmpOp),
    Minus,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }
}

/// A token and the byte offset it starts at.
pub(crate) type Spanned = (Token, usize);

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, QueryError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'(' => {
                tokens.push((Token::LParen, start));
                i += 1;
            }
            b')' => {
                tokens.push((Token::RParen, start));
                i += 1;
            }
            b'-' => {
                tokens.push((Token::Minus, start));
                i += 1;
            }
            b'~' => {
                tokens.push((Token::Not, start));
                i += 1;
            }
            b'&' => {
                i += if bytes.get(i + 1) == Some(&b'&') { 2 } else { 1 };
                tokens.push((Token::And, start));
            }
            b'|' => {
                i += if bytes.get(i + 1) == Some(&b'|') { 2 } else { 1 };
                tokens.push((Token::Or, start));
            }
            b'<' | b'>' | b'=' | b'!' => {
                let followed_by_eq = bytes.get(i + 1) == Some(&b'=');
                let op = match (c, followed_by_eq) {
                    (b'<', false) => CmpOp::Lt,
                    (b'<', true) => CmpOp::Le,
                    (b'>', false) => CmpOp::Gt,
                    (b'>', true) => CmpOp::Ge,
                    (b'=', true) => CmpOp::Eq,
                    (b'!', true) => CmpOp::Ne,
                    _ => {
                        return Err(QueryError::UnexpectedChar {
                            ch: c as char,
                            offset: start,
                        });
                    }
                };
                i += if followed_by_eq { 2 } else { 1 };
                tokens.push((Token::Cmp(op), start));
            }
            b'\'' | b'"' => {
                let quote = c;
                let body_start = i + 1;
                let Some(len) = bytes[body_start..].iter().position(|&b| b == quote) else {
                    return Err(QueryError::UnterminatedString(start));
                };
                let text = &src[body_start..body_start + len];
                tokens.push((Token::Text(text.to_string()), start));
                i = body_start + len + 1;
            }
            b'0'..=b'9' | b'.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                // exponent: 1e-5, 2.5E3
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &src[start..i];
                let value: f64 = text.parse().map_err(|_| QueryError::InvalidNumber {
                    text: text.to_string(),
                    offset: start,
                })?;
                tokens.push((Token::Number(value), start));
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = src[start..i].to_ascii_lowercase();
                let token = match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                };
                tokens.push((token, start));
            }
            _ => {
                let ch = src[start..].chars().next().unwrap_or('?');
                return Err(QueryError::UnexpectedChar { ch, offset: start });
            }
        }
    }

    Ok(tokens)
}
