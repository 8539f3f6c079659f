//! Splitting a command line into tokens.
//!
//! Tokens are separated by whitespace. Double quotes group text containing
//! whitespace or `#`; inside quotes a backslash escapes the next character.
//! An unquoted `#` starts a comment that runs to the end of the line.

use crate::error::CommandError;

pub fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // a quoted "" is still a token
    let mut in_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => current.push(escaped),
                            None => return Err(CommandError::parse("unterminated escape in quoted name")),
                        },
                        Some(other) => current.push(other),
                        None => return Err(CommandError::parse("unterminated quoted name")),
                    }
                }
            }
            '#' => break,
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldgraph_engine::quote;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(
            tokenize("add  field s\tfields a b").unwrap(),
            vec!["add", "field", "s", "fields", "a", "b"]
        );
    }

    #[test]
    fn comments_and_blank_lines() {
        assert!(tokenize("   ").unwrap().is_empty());
        assert!(tokenize("# whole line").unwrap().is_empty());
        assert_eq!(tokenize("xi field x # trailing").unwrap(), vec!["xi", "field", "x"]);
    }

    #[test]
    fn quoted_names_survive() {
        for name in ["two words", "", "say \"hi\"", "a#b", "back\\slash"] {
            let tokens = tokenize(&format!("not field {} field a", quote(name))).unwrap();
            assert_eq!(tokens[2], name);
            assert_eq!(tokens.len(), 5);
        }
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = tokenize("xi field \"open").unwrap_err();
        assert!(matches!(err, CommandError::Parse { .. }));
    }
}
