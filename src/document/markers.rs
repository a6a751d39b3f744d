//! Filename marker conventions.
//!
//! A `.sylva` token (optionally followed by a decimal priority numeral)
//! marks a file as a template to be expanded; a `.in` token marks a file
//! whose expansion or copy must never reach the output tree. A token only
//! counts when it is followed by the end of the name or by `.` plus a
//! non-dot character, so `notes.sylvan.txt` is not a template.

pub const TEMPLATE_TOKEN: &str = ".sylva";
pub const NO_COPY_TOKEN: &str = ".in";

/// A parsed template marker: presence plus the priority-bucket numeral
/// (0 when the token carries no digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateMarker {
    pub bucket: u32,
}

/// Byte range and numeral of the first valid occurrence of `token`.
fn find_token(name: &str, token: &str, with_digits: bool) -> Option<(usize, usize, u32)> {
    let bytes = name.as_bytes();
    let mut from = 0;
    while let Some(found) = name[from..].find(token) {
        let start = from + found;
        let mut end = start + token.len();
        let digits_start = end;
        if with_digits {
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
        let bucket = if end > digits_start {
            match name[digits_start..end].parse::<u32>() {
                Ok(n) => n,
                Err(_) => {
                    // Numeral too large to be a real bucket; not a marker.
                    from = start + 1;
                    continue;
                }
            }
        } else {
            0
        };
        let at_boundary = end == bytes.len()
            || (bytes[end] == b'.' && bytes.get(end + 1).is_some_and(|b| *b != b'.'));
        if at_boundary {
            return Some((start, end, bucket));
        }
        from = start + 1;
    }
    None
}

pub fn template_marker(name: &str) -> Option<TemplateMarker> {
    find_token(name, TEMPLATE_TOKEN, true).map(|(_, _, bucket)| TemplateMarker { bucket })
}

pub fn has_no_copy_marker(name: &str) -> bool {
    find_token(name, NO_COPY_TOKEN, false).is_some()
}

/// Removes the template token and its numeral from a filename, yielding
/// the name the expanded output is written under.
pub fn strip_template_marker(name: &str) -> String {
    match find_token(name, TEMPLATE_TOKEN, true) {
        Some((start, end, _)) => format!("{}{}", &name[..start], &name[end..]),
        None => name.to_string(),
    }
}

/// The callable name an executable file registers under: the leading
/// dot-free segment of its filename, no-copy token stripped first.
pub fn callable_name(name: &str) -> String {
    let stripped = match find_token(name, NO_COPY_TOKEN, false) {
        Some((start, end, _)) => format!("{}{}", &name[..start], &name[end..]),
        None => name.to_string(),
    };
    stripped
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}
