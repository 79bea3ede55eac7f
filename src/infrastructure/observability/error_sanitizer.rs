const MAX_VISIBLE_LENGTH: usize = 200;

const SENSITIVE_PREFIXES: [&str; 7] = [
    "Bearer ",
    "Token ",
    "api_key=",
    "apikey=",
    "password=",
    "secret=",
    "token=",
];

/// Makes an error message safe to show to end users: first line only,
/// credentials redacted, bounded length.
pub fn sanitize_error_message(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default().trim();

    if first_line.is_empty() {
        return String::from("Unknown error");
    }

    let redacted = redact_sensitive_patterns(first_line);

    if redacted.chars().count() > MAX_VISIBLE_LENGTH {
        let truncated: String = redacted.chars().take(MAX_VISIBLE_LENGTH).collect();
        format!("{}...", truncated)
    } else {
        redacted
    }
}

fn redact_sensitive_patterns(text: &str) -> String {
    let mut result = text.to_string();
    for pattern in SENSITIVE_PREFIXES {
        let mut search_from = 0;
        while let Some(offset) = result[search_from..].find(pattern) {
            let value_start = search_from + offset + pattern.len();
            let value_end = result[value_start..]
                .find(|c: char| c.is_whitespace() || c == '&' || c == '"' || c == '\'' || c == ',')
                .map(|i| value_start + i)
                .unwrap_or(result.len());
            result.replace_range(value_start..value_end, "[REDACTED]");
            search_from = value_start + "[REDACTED]".len();
        }
    }
    result
}
