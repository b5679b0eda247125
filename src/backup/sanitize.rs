// Title sanitization and remote name helpers

const ALLOWED_PUNCTUATION: &[char] = &[' ', '.', '-', '_', '(', ')'];

/// Replace every character that is not alphanumeric or one of ` .-_()` with `_`.
///
/// Idempotent: the output only contains characters the filter keeps.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || ALLOWED_PUNCTUATION.contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Drop the last extension of a remote object name.
///
/// Leading dots do not start an extension, so ".profile" is returned as is.
pub fn strip_extension(name: &str) -> &str {
    let body_start = name.len() - name.trim_start_matches('.').len();

    match name[body_start..].rfind('.') {
        Some(dot) => &name[..body_start + dot],
        None => name,
    }
}
