// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Line-level tokenizer for the IL text format.

use alloc::string::String;
use alloc::vec::Vec;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Tok {
    /// Bare word: mnemonics, labels, type names, keywords, `.loc`, `.L3`.
    Ident(String),
    /// `%name`.
    Temp(String),
    /// `@name`.
    Global(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    Comma,
    Colon,
    Eq,
    Arrow,
    LBrace,
    RBrace,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$')
}

/// Strips a trailing `//` or `;` comment that is not inside a string literal.
pub(crate) fn strip_comment(line: &str) -> &str {
    let mut in_str = false;
    let mut escaped = false;
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if in_str {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_str = false;
            }
            continue;
        }
        match b {
            b'"' => in_str = true,
            b';' => return &line[..i],
            b'/' if bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_int_literal(text: &str) -> Option<i64> {
    let (neg, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude: u64 = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()?
    } else {
        body.parse::<u64>().ok()?
    };
    if neg {
        if magnitude == 1 << 63 {
            Some(i64::MIN)
        } else {
            i64::try_from(magnitude).ok().map(|m| -m)
        }
    } else {
        // Hex literals may spell any 64-bit pattern.
        Some(magnitude as i64)
    }
}

fn lex_number(word: &str) -> Option<Tok> {
    if let Some(i) = parse_int_literal(word) {
        return Some(Tok::Int(i));
    }
    let is_hex = word.contains("0x") || word.contains("0X");
    if !is_hex {
        if let Ok(f) = word.parse::<f64>() {
            return Some(Tok::Float(f));
        }
    }
    None
}

/// Tokenizes one line (comments already stripped).
pub(crate) fn tokenize(line: &str) -> Result<Vec<Tok>, String> {
    let mut out = Vec::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' => i += 1,
            '(' => {
                out.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                out.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                out.push(Tok::Comma);
                i += 1;
            }
            ':' => {
                out.push(Tok::Colon);
                i += 1;
            }
            '=' => {
                out.push(Tok::Eq);
                i += 1;
            }
            '{' => {
                out.push(Tok::LBrace);
                i += 1;
            }
            '}' => {
                out.push(Tok::RBrace);
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'>') => {
                out.push(Tok::Arrow);
                i += 2;
            }
            '"' => {
                let (s, next) = lex_string(&chars, i + 1)?;
                out.push(Tok::Str(s));
                i = next;
            }
            '%' | '@' | '^' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && is_word_char(chars[j]) {
                    j += 1;
                }
                if j == start {
                    return Err(alloc::format!("expected a name after '{c}'"));
                }
                let name: String = chars[start..j].iter().collect();
                out.push(match c {
                    '%' => Tok::Temp(name),
                    '@' => Tok::Global(name),
                    _ => Tok::Ident(name),
                });
                i = j;
            }
            _ if c == '-' || c == '+' || is_word_char(c) => {
                let start = i;
                let mut j = i + 1;
                while j < chars.len() {
                    let d = chars[j];
                    // Exponent signs stay inside numeric words (`1e-5`).
                    let exp_sign = (d == '-' || d == '+')
                        && matches!(chars[j - 1], 'e' | 'E')
                        && chars[start].is_ascii_digit()
                        && !chars[start..j].iter().any(|&x| x == 'x' || x == 'X');
                    if is_word_char(d) || exp_sign {
                        j += 1;
                    } else {
                        break;
                    }
                }
                let word: String = chars[start..j].iter().collect();
                let first_numeric = word
                    .trim_start_matches(['-', '+'])
                    .starts_with(|ch: char| ch.is_ascii_digit());
                if first_numeric {
                    match lex_number(&word) {
                        Some(tok) => out.push(tok),
                        None => return Err(alloc::format!("malformed number '{word}'")),
                    }
                } else {
                    match word.as_str() {
                        "inf" | "+inf" => out.push(Tok::Float(f64::INFINITY)),
                        "-inf" => out.push(Tok::Float(f64::NEG_INFINITY)),
                        "nan" => out.push(Tok::Float(f64::NAN)),
                        w if w.starts_with(['-', '+']) => {
                            return Err(alloc::format!("unexpected '{w}'"));
                        }
                        _ => out.push(Tok::Ident(word)),
                    }
                }
                i = j;
            }
            other => return Err(alloc::format!("unexpected character '{other}'")),
        }
    }
    Ok(out)
}

fn lex_string(chars: &[char], mut i: usize) -> Result<(String, usize), String> {
    let mut s = String::new();
    while i < chars.len() {
        match chars[i] {
            '"' => return Ok((s, i + 1)),
            '\\' => {
                let esc = chars.get(i + 1).copied().ok_or("unterminated escape")?;
                i += 2;
                match esc {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    'r' => s.push('\r'),
                    '0' => s.push('\0'),
                    '\\' => s.push('\\'),
                    '"' => s.push('"'),
                    'x' => {
                        let hex: String =
                            chars.get(i..i + 2).ok_or("short \\x escape")?.iter().collect();
                        let b = u8::from_str_radix(&hex, 16)
                            .map_err(|_| alloc::format!("bad \\x escape '{hex}'"))?;
                        s.push(char::from(b));
                        i += 2;
                    }
                    other => return Err(alloc::format!("unknown escape '\\{other}'")),
                }
            }
            c => {
                s.push(c);
                i += 1;
            }
        }
    }
    Err("unterminated string literal".into())
}

/// Escapes `s` for the text format.
pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if (c as u32) < 0x20 => {
                out.push_str(&alloc::format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_an_instruction() {
        let toks = tokenize("%c = and.i64 %a, 0xFF00FF00").unwrap();
        assert_eq!(
            toks,
            alloc::vec![
                Tok::Temp("c".into()),
                Tok::Eq,
                Tok::Ident("and.i64".into()),
                Tok::Temp("a".into()),
                Tok::Comma,
                Tok::Int(0xFF00_FF00),
            ]
        );
    }

    #[test]
    fn numbers_and_arrows() {
        let toks = tokenize("-1 -> 2.5 1e-3 -inf 0xFFFFFFFFFFFFFFFF").unwrap();
        assert_eq!(toks[0], Tok::Int(-1));
        assert_eq!(toks[1], Tok::Arrow);
        assert_eq!(toks[2], Tok::Float(2.5));
        assert_eq!(toks[3], Tok::Float(1e-3));
        assert_eq!(toks[4], Tok::Float(f64::NEG_INFINITY));
        assert_eq!(toks[5], Tok::Int(-1));
        assert_eq!(
            tokenize("-9223372036854775808").unwrap(),
            alloc::vec![Tok::Int(i64::MIN)]
        );
    }

    #[test]
    fn strings_and_comments() {
        let line = strip_comment("const_str \"a;b\\n\" // trailing");
        let toks = tokenize(line).unwrap();
        assert_eq!(toks[1], Tok::Str("a;b\n".into()));
        assert_eq!(escape("a\"b\n"), "a\\\"b\\n");
    }
}
