//! `${ENV_VAR}` substitution in raw config text.

/// Replace `${ENV_VAR}` placeholders in config string values.
///
/// Unresolvable variables are left as-is so a missing secret shows up
/// verbatim in the parsed config instead of silently becoming empty.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            out.push(ch);
            continue;
        }
        chars.next(); // consume '{'

        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            name.push(c);
        }

        match lookup(&name) {
            Some(val) if closed && !name.is_empty() => out.push_str(&val),
            _ => {
                // Unresolved or malformed — emit the literal placeholder.
                out.push_str("${");
                out.push_str(&name);
                if closed {
                    out.push('}');
                }
            },
        }
    }

    out
}
