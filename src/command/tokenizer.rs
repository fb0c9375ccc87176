/// A lexical unit of a command's parameter section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A whitespace-delimited run with no `key:` head. Ignored by the parser.
    Word(&'a str),
    Pair {
        key: &'a str,
        value: &'a str,
        quoted: bool,
    },
}

/// Split `input` into words and `key:value` pairs, left to right.
///
/// Keys are one or more characters that are neither `:` nor whitespace.
/// `key:"..."` takes everything up to the next `"`; without a closing quote
/// the value is read unquoted, up to the next whitespace. Unquoted values
/// keep embedded colons.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        let trimmed = rest.trim_start();
        pos += rest.len() - trimmed.len();
        if trimmed.is_empty() {
            break;
        }

        let key_end = trimmed
            .find(|c: char| c == ':' || c.is_whitespace())
            .unwrap_or(trimmed.len());

        if key_end > 0 && trimmed[key_end..].starts_with(':') {
            let key = &trimmed[..key_end];
            let after = &trimmed[key_end + 1..];
            pos += key_end + 1;

            if let Some(open) = after.strip_prefix('"') {
                if let Some(close) = open.find('"') {
                    tokens.push(Token::Pair { key, value: &open[..close], quoted: true });
                    pos += close + 2;
                    continue;
                }
            }

            let value_end = after.find(char::is_whitespace).unwrap_or(after.len());
            tokens.push(Token::Pair { key, value: &after[..value_end], quoted: false });
            pos += value_end;
            continue;
        }

        let word_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        tokens.push(Token::Word(&trimmed[..word_end]));
        pos += word_end;
    }

    tokens
}
