use super::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// 換行或分號
    Separator,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    // 括號內的換行不算語句結尾
    let mut depth: usize = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let single = |token| Spanned { token, line };

        match c {
            '\n' => {
                if depth == 0 {
                    tokens.push(single(Token::Separator));
                }
                line += 1;
                i += 1;
            }
            ';' => {
                tokens.push(single(Token::Separator));
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = c;
                let start_line = line;
                let mut text = String::new();
                i += 1;
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(ScriptError::new(start_line, "unterminated string"));
                    };
                    i += 1;
                    match ch {
                        ch if ch == quote => break,
                        '\n' => return Err(ScriptError::new(start_line, "unterminated string")),
                        '\\' => {
                            let escaped = chars.get(i).copied().unwrap_or('\\');
                            i += 1;
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                        ch => text.push(ch),
                    }
                }
                tokens.push(Spanned {
                    token: Token::Str(text),
                    line: start_line,
                });
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                // 科學記號
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ScriptError::new(line, format!("invalid number '{}'", text)))?;
                tokens.push(single(Token::Number(value)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(single(Token::Ident(chars[start..i].iter().collect())));
            }
            _ => {
                let next = chars.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    ('=', Some('=')) => (Token::Eq, 2),
                    ('!', Some('=')) => (Token::NotEq, 2),
                    ('<', Some('=')) => (Token::LtEq, 2),
                    ('>', Some('=')) => (Token::GtEq, 2),
                    ('=', _) => (Token::Assign, 1),
                    ('<', _) => (Token::Lt, 1),
                    ('>', _) => (Token::Gt, 1),
                    ('+', _) => (Token::Plus, 1),
                    ('-', _) => (Token::Minus, 1),
                    ('*', _) => (Token::Star, 1),
                    ('/', _) => (Token::Slash, 1),
                    ('%', _) => (Token::Percent, 1),
                    (',', _) => (Token::Comma, 1),
                    ('.', _) => (Token::Dot, 1),
                    ('(', _) => {
                        depth += 1;
                        (Token::LParen, 1)
                    }
                    ('[', _) => {
                        depth += 1;
                        (Token::LBracket, 1)
                    }
                    (')', _) => {
                        depth = depth.saturating_sub(1);
                        (Token::RParen, 1)
                    }
                    (']', _) => {
                        depth = depth.saturating_sub(1);
                        (Token::RBracket, 1)
                    }
                    _ => {
                        return Err(ScriptError::new(
                            line,
                            format!("unexpected character '{}'", c),
                        ))
                    }
                };
                tokens.push(single(token));
                i += width;
            }
        }
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_tokenize_assignment() {
        assert_eq!(
            kinds("total = sum(df.amountUSD) # usd"),
            vec![
                Token::Ident("total".into()),
                Token::Assign,
                Token::Ident("sum".into()),
                Token::LParen,
                Token::Ident("df".into()),
                Token::Dot,
                Token::Ident("amountUSD".into()),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_inside_call_is_not_separator() {
        let tokens = tokenize("print(1,\n 2)\nx = 'a\\'b'").unwrap();
        let separators = tokens
            .iter()
            .filter(|t| t.token == Token::Separator)
            .count();
        assert_eq!(separators, 1);
        assert_eq!(tokens.last().unwrap().line, 3);
        assert!(tokens.iter().any(|t| t.token == Token::Str("a'b".into())));
    }

    #[test]
    fn test_numbers_and_errors() {
        assert_eq!(kinds("1e3")[0], Token::Number(1000.0));
        assert_eq!(kinds("1_000.5")[0], Token::Number(1000.5));
        let err = tokenize("x = 1\ny = $").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(tokenize("\"open").is_err());
    }
}
