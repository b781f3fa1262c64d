//! Expression Tokenizer

use crate::EvaluationError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    Amp,
    Pipe,
    Tilde,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset in the source
    pub position: usize,
}

fn error(position: usize, message: impl Into<String>) -> EvaluationError {
    EvaluationError::Parse {
        position,
        message: message.into(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, EvaluationError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let kind = if c.is_ascii_digit() || (c == '.' && next_is_digit(bytes, pos + 1)) {
            pos = scan_number(bytes, pos);
            let text = &source[start..pos];
            let value = text
                .parse::<f64>()
                .map_err(|_| error(start, format!("invalid number '{text}'")))?;
            TokenKind::Number(value)
        } else if is_ident_start(c) {
            pos = scan_ident(bytes, pos);
            // dotted names such as `np.abs`
            while pos + 1 < bytes.len()
                && bytes[pos] == b'.'
                && is_ident_start(bytes[pos + 1] as char)
            {
                pos = scan_ident(bytes, pos + 1);
            }
            TokenKind::Ident(source[start..pos].to_string())
        } else {
            let two = bytes.get(pos + 1).map(|&b| b as char);
            let (kind, width) = match (c, two) {
                ('<', Some('=')) => (TokenKind::Le, 2),
                ('>', Some('=')) => (TokenKind::Ge, 2),
                ('=', Some('=')) => (TokenKind::EqEq, 2),
                ('!', Some('=')) => (TokenKind::Ne, 2),
                ('<', _) => (TokenKind::Lt, 1),
                ('>', _) => (TokenKind::Gt, 1),
                ('(', _) => (TokenKind::LParen, 1),
                (')', _) => (TokenKind::RParen, 1),
                (',', _) => (TokenKind::Comma, 1),
                ('+', _) => (TokenKind::Plus, 1),
                ('-', _) => (TokenKind::Minus, 1),
                ('*', _) => (TokenKind::Star, 1),
                ('/', _) => (TokenKind::Slash, 1),
                ('&', _) => (TokenKind::Amp, 1),
                ('|', _) => (TokenKind::Pipe, 1),
                ('~', _) => (TokenKind::Tilde, 1),
                _ => {
                    let ch = source[start..].chars().next().unwrap_or(c);
                    return Err(error(start, format!("unexpected character '{ch}'")));
                }
            };
            pos += width;
            kind
        };

        tokens.push(Token {
            kind,
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::End,
        position: source.len(),
    });
    Ok(tokens)
}

fn next_is_digit(bytes: &[u8], pos: usize) -> bool {
    bytes.get(pos).is_some_and(u8::is_ascii_digit)
}

fn scan_ident(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && is_ident_char(bytes[pos] as char) {
        pos += 1;
    }
    pos
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
        pos += 1;
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if next_is_digit(bytes, exp) {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            kinds("(sat >= 1e-3) & ~flag"),
            vec![
                TokenKind::LParen,
                TokenKind::Ident("sat".into()),
                TokenKind::Ge,
                TokenKind::Number(1e-3),
                TokenKind::RParen,
                TokenKind::Amp,
                TokenKind::Tilde,
                TokenKind::Ident("flag".into()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_dotted_ident() {
        assert_eq!(
            kinds("np.abs(x)")[0],
            TokenKind::Ident("np.abs".into())
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds(".5 2.5E+2 7")[..3], [
            TokenKind::Number(0.5),
            TokenKind::Number(250.0),
            TokenKind::Number(7.0),
        ]);
    }

    #[test]
    fn test_rejects_unknown_character() {
        assert!(matches!(
            tokenize("a = b"),
            Err(EvaluationError::Parse { position: 2, .. })
        ));
        assert!(tokenize("a ** b").is_ok());
        assert!(tokenize("__import__('os')").is_err());
    }
}
