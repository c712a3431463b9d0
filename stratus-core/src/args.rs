/// Splits an argument string into argv-style tokens.
///
/// Unquoted spaces separate tokens, double quotes group spaces into one token and a backslash
/// escapes a following `"` or `\`. A backslash in front of any other character is kept as is.
/// Empty tokens are never produced and no input is rejected: an unterminated quote simply runs
/// to the end of the string and a trailing backslash is dropped.
pub fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut quoted = false;

    for c in raw.chars() {
        if escaped {
            escaped = false;
            if c == '"' || c == '\\' {
                current.push(c);
                continue;
            }
            current.push('\\');
        }
        match c {
            '\\' => escaped = true,
            '"' => {
                if quoted {
                    flush(&mut current, &mut tokens);
                }
                quoted = !quoted;
            }
            ' ' if !quoted => flush(&mut current, &mut tokens),
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}
