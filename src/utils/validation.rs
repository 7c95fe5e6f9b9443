//! Centralized validation and helper functions.

/// Security-related constants for output naming
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Escaped form of a list holding a single empty string
const EMPTY_ELEMENT: &str = "\\e";

/// Placeholder that replaces per-read identifiers inside HDF5 paths
pub const READ_ID_PLACEHOLDER: &str = "XXX";

/// Escape a string for the mapping-table grammar and aux string payloads.
///
/// Backslash, line feed, carriage return, tab and NUL are escaped; every other
/// character in `extra` is prefixed with a backslash.
///
/// # Examples
///
/// ```
/// use fast5cram::utils::validation::{escape, unescape};
///
/// let escaped = escape("two\nlines", &[]);
/// assert_eq!(escaped, "two\\nlines");
/// assert_eq!(unescape(&escaped).unwrap(), "two\nlines");
/// ```
#[must_use]
pub fn escape(s: &str, extra: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if extra.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`]. Returns `None` on a dangling backslash.
#[must_use]
pub fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            // empty-element marker, see join_escaped
            'e' => {}
            other => out.push(other),
        }
    }
    Some(out)
}

/// Join string elements with `,`, escaping each element.
///
/// A list holding one empty string is written as the marker `\e`, so that
/// it does not collapse into the empty list.
#[must_use]
pub fn join_escaped(items: &[String]) -> String {
    if let [only] = items {
        if only.is_empty() {
            return EMPTY_ELEMENT.to_string();
        }
    }
    items
        .iter()
        .map(|s| escape(s, &[',']))
        .collect::<Vec<_>>()
        .join(",")
}

/// Split a string produced by [`join_escaped`]. An empty input is an empty
/// list.
#[must_use]
pub fn split_escaped(s: &str) -> Option<Vec<String>> {
    if s.is_empty() {
        return Some(Vec::new());
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push('\\');
                current.push(chars.next()?);
            }
            ',' => items.push(unescape(&std::mem::take(&mut current))?),
            c => current.push(c),
        }
    }
    items.push(unescape(&current)?);
    Some(items)
}

/// Check whether `id` looks like a read identifier: decimal digits, or a
/// UUID (32 word characters, optionally dashed and braced).
fn is_read_id(id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    if id.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    let inner = id
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(id);
    let groups: Vec<&str> = inner.split('-').collect();
    let word = |g: &&str| g.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    match groups.len() {
        1 => inner.len() == 32 && groups.iter().all(word),
        5 => {
            groups.iter().map(|g| g.len()).eq([8, 4, 4, 4, 12]) && groups.iter().all(word)
        }
        _ => false,
    }
}

/// Split a `read_<rest>` path segment into its prefix and the rest.
fn split_read_segment(segment: &str) -> Option<(&str, &str)> {
    let prefix = segment.get(..5)?;
    if prefix.eq_ignore_ascii_case("read_") {
        Some((prefix, &segment[5..]))
    } else {
        None
    }
}

/// Replace per-read identifiers in an HDF5 path with [`READ_ID_PLACEHOLDER`].
///
/// Every segment of the form `read_<id>` (prefix matched case-insensitively)
/// is rewritten. Returns the normalized path and the first identifier found.
///
/// # Examples
///
/// ```
/// use fast5cram::utils::validation::normalize_read_path;
///
/// let (path, id) = normalize_read_path("/Raw/Reads/Read_1234/Signal");
/// assert_eq!(path, "/Raw/Reads/Read_XXX/Signal");
/// assert_eq!(id.as_deref(), Some("1234"));
/// ```
#[must_use]
pub fn normalize_read_path(path: &str) -> (String, Option<String>) {
    let mut read_id = None;
    let segments: Vec<String> = path
        .split('/')
        .map(|segment| {
            if let Some((prefix, id)) = split_read_segment(segment) {
                if is_read_id(id) {
                    if read_id.is_none() {
                        read_id = Some(id.to_string());
                    }
                    return format!("{prefix}{READ_ID_PLACEHOLDER}");
                }
            }
            segment.to_string()
        })
        .collect();
    (segments.join("/"), read_id)
}

/// Substitute a read identifier back into a normalized path.
#[must_use]
pub fn restore_read_path(path: &str, read_id: Option<&str>) -> String {
    let Some(id) = read_id else {
        return path.to_string();
    };
    path.split('/')
        .map(|segment| {
            match split_read_segment(segment) {
                Some((prefix, READ_ID_PLACEHOLDER)) => format!("{prefix}{id}"),
                _ => segment.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute a checksum over mapping-table lines.
///
/// The lines are joined with `\n` and hashed with MD5, giving a deterministic
/// identifier for the whole table.
#[must_use]
pub fn compute_signature<S: AsRef<str>>(lines: &[S]) -> String {
    let joined = lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n");
    let digest = md5::compute(joined.as_bytes());
    format!("{digest:x}")
}

/// Validation error types
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Filename too long: exceeds {MAX_FILENAME_LENGTH} characters")]
    FilenameTooLong,
    #[error("Invalid filename: contains path traversal or invalid characters")]
    InvalidFilename,
    #[error("Empty filename provided")]
    EmptyFilename,
}

/// Filename validation for files named by archive content
///
/// Reconstructed files are named after a tag stored in the archive, so the
/// name is checked before it is joined onto the output directory:
/// - Checking length limits
/// - Preventing directory traversal (../, ..\\)
/// - Removing potentially dangerous characters
/// - Ensuring filename is not empty after sanitization
///
/// # Errors
///
/// Returns `ValidationError::EmptyFilename` if the filename is empty,
/// `ValidationError::FilenameTooLong` if it exceeds the limit, or
/// `ValidationError::InvalidFilename` if it contains invalid characters.
pub fn validate_filename(filename: &str) -> Result<String, ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::EmptyFilename);
    }

    if filename.len() > MAX_FILENAME_LENGTH {
        return Err(ValidationError::FilenameTooLong);
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(ValidationError::InvalidFilename);
    }

    if filename.contains('\0') || filename.chars().any(|c| ('\x01'..='\x1F').contains(&c)) {
        return Err(ValidationError::InvalidFilename);
    }

    let sanitized = filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-' || *c == '_' || *c == ' ')
        .collect::<String>();

    if sanitized.trim().is_empty() || sanitized.starts_with('.') {
        return Err(ValidationError::InvalidFilename);
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_line_breaks() {
        let s = "a\\b\nc\rd\te\0f";
        let escaped = escape(s, &[]);
        assert!(!escaped.contains('\n'));
        assert!(!escaped.contains('\t'));
        assert_eq!(unescape(&escaped).unwrap(), s);
    }

    #[test]
    fn test_escape_extra_chars() {
        assert_eq!(escape("it's", &['\'']), "it\\'s");
        assert_eq!(unescape("it\\'s").unwrap(), "it's");
    }

    #[test]
    fn test_unescape_dangling_backslash() {
        assert!(unescape("abc\\").is_none());
    }

    #[test]
    fn test_join_split_with_commas() {
        let items = vec!["a,b".to_string(), String::new(), "c\\".to_string()];
        let joined = join_escaped(&items);
        assert_eq!(split_escaped(&joined).unwrap(), items);
        assert_eq!(split_escaped("").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_single_empty_element_survives() {
        let items = vec![String::new()];
        let joined = join_escaped(&items);
        assert_eq!(joined, "\\e");
        assert_eq!(split_escaped(&joined).unwrap(), items);

        let two = vec![String::new(), String::new()];
        assert_eq!(split_escaped(&join_escaped(&two)).unwrap(), two);
    }

    #[test]
    fn test_normalize_read_path_digits() {
        let (path, id) = normalize_read_path("/Raw/Reads/Read_42");
        assert_eq!(path, "/Raw/Reads/Read_XXX");
        assert_eq!(id.as_deref(), Some("42"));
        assert_eq!(restore_read_path(&path, id.as_deref()), "/Raw/Reads/Read_42");
    }

    #[test]
    fn test_normalize_read_path_uuid() {
        let uuid = "0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d";
        let (path, id) = normalize_read_path(&format!("/read_{uuid}/Raw"));
        assert_eq!(path, "/read_XXX/Raw");
        assert_eq!(id.as_deref(), Some(uuid));
    }

    #[test]
    fn test_normalize_read_path_untouched() {
        let (path, id) = normalize_read_path("/UniqueGlobalKey/tracking_id");
        assert_eq!(path, "/UniqueGlobalKey/tracking_id");
        assert!(id.is_none());

        let (path, id) = normalize_read_path("/Analyses/read_number");
        assert_eq!(path, "/Analyses/read_number");
        assert!(id.is_none());
    }

    #[test]
    fn test_compute_signature_deterministic() {
        let lines = ["ATR:'/a':i4 TG:a0", "COL:'/b/noname':f4 TG:a1"];
        let sig = compute_signature(&lines);
        assert_eq!(sig.len(), 32);
        assert_eq!(sig, compute_signature(&lines));
        assert_ne!(sig, compute_signature(&lines[..1]));
    }

    #[test]
    fn test_validate_filename_safe() {
        assert!(validate_filename("read_1.fast5").is_ok());
        assert!(validate_filename("my-file.fast5").is_ok());
    }

    #[test]
    fn test_validate_filename_dangerous() {
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("..\\windows\\system32").is_err());
        assert!(validate_filename("test\0.fast5").is_err());
        assert!(validate_filename(&"a".repeat(300)).is_err());
        assert!(validate_filename("   ").is_err());
        assert!(validate_filename(".hidden").is_err());
    }

    #[test]
    fn test_validate_filename_sanitization() {
        assert_eq!(validate_filename("read@#1.fast5").unwrap(), "read1.fast5");
    }
}
