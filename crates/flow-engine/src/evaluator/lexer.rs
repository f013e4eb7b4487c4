//! Tokenizer for condition expressions

use std::fmt;

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Question,
    Colon,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    /// `==`
    LooseEq,
    /// `!=`
    LooseNe,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
    And,
    Or,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Ident(s) => write!(f, "{}", s),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Dot => f.write_str("."),
            Token::Comma => f.write_str(","),
            Token::Question => f.write_str("?"),
            Token::Colon => f.write_str(":"),
            Token::Not => f.write_str("!"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::Lt => f.write_str("<"),
            Token::Le => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Ge => f.write_str(">="),
            Token::LooseEq => f.write_str("=="),
            Token::LooseNe => f.write_str("!="),
            Token::StrictEq => f.write_str("==="),
            Token::StrictNe => f.write_str("!=="),
            Token::And => f.write_str("&&"),
            Token::Or => f.write_str("||"),
        }
    }
}

/// Split an expression into tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| format!("invalid number '{}'", text))?;
            tokens.push(Token::Number(value));
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err("unterminated string literal".to_string()),
                    Some(&ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        let escaped = chars
                            .get(i + 1)
                            .ok_or_else(|| "unterminated string literal".to_string())?;
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => *other,
                        });
                        i += 2;
                    }
                    Some(&ch) => {
                        value.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(value));
            continue;
        }

        let next = chars.get(i + 1).copied();
        let next2 = chars.get(i + 2).copied();
        let (token, width) = match (c, next, next2) {
            ('=', Some('='), Some('=')) => (Token::StrictEq, 3),
            ('!', Some('='), Some('=')) => (Token::StrictNe, 3),
            ('=', Some('='), _) => (Token::LooseEq, 2),
            ('!', Some('='), _) => (Token::LooseNe, 2),
            ('<', Some('='), _) => (Token::Le, 2),
            ('>', Some('='), _) => (Token::Ge, 2),
            ('&', Some('&'), _) => (Token::And, 2),
            ('|', Some('|'), _) => (Token::Or, 2),
            ('<', _, _) => (Token::Lt, 1),
            ('>', _, _) => (Token::Gt, 1),
            ('!', _, _) => (Token::Not, 1),
            ('+', _, _) => (Token::Plus, 1),
            ('-', _, _) => (Token::Minus, 1),
            ('*', _, _) => (Token::Star, 1),
            ('/', _, _) => (Token::Slash, 1),
            ('%', _, _) => (Token::Percent, 1),
            ('(', _, _) => (Token::LParen, 1),
            (')', _, _) => (Token::RParen, 1),
            ('[', _, _) => (Token::LBracket, 1),
            (']', _, _) => (Token::RBracket, 1),
            ('.', _, _) => (Token::Dot, 1),
            (',', _, _) => (Token::Comma, 1),
            ('?', _, _) => (Token::Question, 1),
            (':', _, _) => (Token::Colon, 1),
            ('=', _, _) => return Err("assignment is not allowed".to_string()),
            _ => return Err(format!("unexpected character '{}'", c)),
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        let tokens = tokenize("a === 'ok' && b !== 2 || !c").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::StrictEq,
                Token::Str("ok".into()),
                Token::And,
                Token::Ident("b".into()),
                Token::StrictNe,
                Token::Number(2.0),
                Token::Or,
                Token::Not,
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn test_member_access_and_numbers() {
        let tokens = tokenize("result.items[0] >= 1.5").unwrap();
        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens[7], Token::Number(1.5));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""say \"hi\"""#).unwrap();
        assert_eq!(tokens, vec![Token::Str("say \"hi\"".into())]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a = 1").is_err());
        assert!(tokenize("a # b").is_err());
    }
}
