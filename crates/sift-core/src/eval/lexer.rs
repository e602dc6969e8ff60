use crate::eval::error::SyntaxError;
use crate::time::local_to_utc;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Not,
    Negate,
    HasTag,
    NoTag,
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Partial,
    Match,
    NoMatch,
    And,
    Xor,
    Or,
}

impl Op {
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Not => "not",
            Op::Negate => "-",
            Op::HasTag => "_hastag_",
            Op::NoTag => "_notag_",
            Op::Multiply => "*",
            Op::Divide => "/",
            Op::Modulo => "%",
            Op::Add => "+",
            Op::Subtract => "-",
            Op::Less => "<",
            Op::LessEqual => "<=",
            Op::Greater => ">",
            Op::GreaterEqual => ">=",
            Op::Equal => "==",
            Op::NotEqual => "!=",
            Op::Partial => "=",
            Op::Match => "~",
            Op::NoMatch => "!~",
            Op::And => "and",
            Op::Xor => "xor",
            Op::Or => "or",
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            Op::Not | Op::Negate => 15,
            Op::HasTag | Op::NoTag => 14,
            Op::Multiply | Op::Divide | Op::Modulo => 13,
            Op::Add | Op::Subtract => 12,
            Op::Less | Op::LessEqual | Op::Greater | Op::GreaterEqual => 10,
            Op::Equal | Op::NotEqual | Op::Partial => 9,
            Op::Match | Op::NoMatch => 8,
            Op::And => 5,
            Op::Xor => 4,
            Op::Or => 3,
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Op::Not | Op::Negate)
    }

    pub fn is_right_associative(&self) -> bool {
        self.is_unary()
    }

    /// Looks up the operator spelled by `text`, as it would appear in an
    /// expression. Unary minus is decided by the parser, not here.
    pub fn from_symbol(text: &str) -> Option<Op> {
        let op = match text {
            "not" | "!" => Op::Not,
            "_hastag_" => Op::HasTag,
            "_notag_" => Op::NoTag,
            "*" => Op::Multiply,
            "/" => Op::Divide,
            "%" => Op::Modulo,
            "+" => Op::Add,
            "-" => Op::Subtract,
            "<" => Op::Less,
            "<=" => Op::LessEqual,
            ">" => Op::Greater,
            ">=" => Op::GreaterEqual,
            "==" => Op::Equal,
            "!=" => Op::NotEqual,
            "=" => Op::Partial,
            "~" => Op::Match,
            "!~" => Op::NoMatch,
            "and" => Op::And,
            "xor" => Op::Xor,
            "or" => Op::Or,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Identifier(String),
    Operator(Op),
    LeftParen,
    RightParen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

const SYMBOLS: [&str; 15] = [
    "<=", ">=", "==", "!=", "!~", "<", ">", "=", "~", "!", "+", "-", "*", "/", "%",
];

pub fn tokenize(input: &str, offset: FixedOffset) -> Result<Vec<Token>, SyntaxError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos];
        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let kind = match ch {
            b'(' => {
                pos += 1;
                TokenKind::LeftParen
            }
            b')' => {
                pos += 1;
                TokenKind::RightParen
            }
            b'"' | b'\'' => {
                let (text, end) = lex_string(input, pos)?;
                pos = end;
                TokenKind::String(text)
            }
            b'0'..=b'9' => {
                if let Some((date, end)) = lex_date(input, pos, offset) {
                    pos = end;
                    TokenKind::Date(date)
                } else {
                    let (number, end) = lex_number(input, pos)?;
                    pos = end;
                    TokenKind::Number(number)
                }
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let end = scan_while(bytes, pos, |b| {
                    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
                });
                let word = &input[pos..end];
                pos = end;
                if word.ends_with('.') {
                    return Err(SyntaxError::new(
                        format!("identifier cannot end with '.': {word}"),
                        start,
                    ));
                }
                match Op::from_symbol(word) {
                    Some(op) => TokenKind::Operator(op),
                    None => TokenKind::Identifier(word.to_string()),
                }
            }
            _ => {
                let rest = &input[pos..];
                let symbol = SYMBOLS
                    .iter()
                    .find(|symbol| rest.starts_with(**symbol))
                    .and_then(|symbol| Op::from_symbol(symbol).map(|op| (*symbol, op)));
                match symbol {
                    Some((text, op)) => {
                        pos += text.len();
                        TokenKind::Operator(op)
                    }
                    None => {
                        let found = rest.chars().next().unwrap_or('?');
                        return Err(SyntaxError::new(
                            format!("unexpected character '{found}'"),
                            start,
                        ));
                    }
                }
            }
        };
        tokens.push(Token {
            kind,
            offset: start,
        });
    }

    Ok(tokens)
}

fn scan_while(bytes: &[u8], mut pos: usize, pred: impl Fn(u8) -> bool) -> usize {
    while pos < bytes.len() && pred(bytes[pos]) {
        pos += 1;
    }
    pos
}

fn lex_string(input: &str, start: usize) -> Result<(String, usize), SyntaxError> {
    let mut chars = input[start..].char_indices();
    let (_, quote) = chars
        .next()
        .ok_or_else(|| SyntaxError::new("expected string", start))?;
    let mut out = String::new();
    let mut escaped = false;
    for (index, ch) in chars {
        if escaped {
            out.push(match ch {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Ok((out, start + index + ch.len_utf8()));
        } else {
            out.push(ch);
        }
    }
    Err(SyntaxError::new("unterminated string", start))
}

fn lex_number(input: &str, start: usize) -> Result<(f64, usize), SyntaxError> {
    let bytes = input.as_bytes();
    let mut end = scan_while(bytes, start, |b| b.is_ascii_digit());
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end = scan_while(bytes, end + 1, |b| b.is_ascii_digit());
    }
    if end < bytes.len() && (bytes[end].is_ascii_alphabetic() || bytes[end] == b'_') {
        return Err(SyntaxError::new(
            format!("malformed number near '{}'", &input[start..=end]),
            start,
        ));
    }
    let number = input[start..end]
        .parse::<f64>()
        .map_err(|_| SyntaxError::new("malformed number", start))?;
    Ok((number, end))
}

fn lex_date(input: &str, start: usize, offset: FixedOffset) -> Option<(DateTime<Utc>, usize)> {
    let rest = &input[start..];
    let date_len = 10;
    let date_text = rest.get(..date_len)?;
    let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d").ok()?;

    for (fmt, len) in [("%Y-%m-%dT%H:%M:%S", 19), ("%Y-%m-%dT%H:%M", 16)] {
        if let Some(text) = rest.get(..len) {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                if boundary(rest, len) {
                    let utc = local_to_utc(naive, offset).ok()?;
                    return Some((utc, start + len));
                }
            }
        }
    }

    if !boundary(rest, date_len) {
        return None;
    }
    let naive = date.and_hms_opt(0, 0, 0)?;
    let utc = local_to_utc(naive, offset).ok()?;
    Some((utc, start + date_len))
}

fn boundary(rest: &str, len: usize) -> bool {
    rest.as_bytes()
        .get(len)
        .map_or(true, |b| !(b.is_ascii_alphanumeric() || *b == b':' || *b == b'_'))
}

#[cfg(test)]
mod tests {
    use super::{tokenize, Op, TokenKind};
    use chrono::{FixedOffset, TimeZone, Utc};

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input, FixedOffset::east_opt(0).unwrap())
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_comparison() {
        assert_eq!(
            kinds("project == 'Home'"),
            vec![
                TokenKind::Identifier("project".to_string()),
                TokenKind::Operator(Op::Equal),
                TokenKind::String("Home".to_string()),
            ]
        );
    }

    #[test]
    fn lexes_dotted_identifier_and_words() {
        assert_eq!(
            kinds("due.year >= 2024 and not +"),
            vec![
                TokenKind::Identifier("due.year".to_string()),
                TokenKind::Operator(Op::GreaterEqual),
                TokenKind::Number(2024.0),
                TokenKind::Operator(Op::And),
                TokenKind::Operator(Op::Not),
                TokenKind::Operator(Op::Add),
            ]
        );
    }

    #[test]
    fn lexes_iso_dates() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(
            kinds("due < 2024-01-10"),
            vec![
                TokenKind::Identifier("due".to_string()),
                TokenKind::Operator(Op::Less),
                TokenKind::Date(expected),
            ]
        );
        let with_time = Utc.with_ymd_and_hms(2024, 1, 10, 9, 30, 0).unwrap();
        assert_eq!(kinds("2024-01-10T09:30"), vec![TokenKind::Date(with_time)]);
    }

    #[test]
    fn arithmetic_on_numbers_is_not_a_date() {
        assert_eq!(
            kinds("2024-01"),
            vec![
                TokenKind::Number(2024.0),
                TokenKind::Operator(Op::Subtract),
                TokenKind::Number(1.0),
            ]
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = tokenize("description ~ 'oops", FixedOffset::east_opt(0).unwrap())
            .unwrap_err();
        assert_eq!(err.offset, 14);
    }

    #[test]
    fn rejects_unknown_character() {
        let err = tokenize("project @ x", FixedOffset::east_opt(0).unwrap()).unwrap_err();
        assert!(err.message.contains('@'));
    }
}
