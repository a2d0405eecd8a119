//! Process name matching

/// Executable suffix stripped from configured names before the
/// case-insensitive comparison. Budgets are commonly written against
/// Windows game binaries, which also show up under Wine/Proton.
pub const EXECUTABLE_SUFFIX: &str = ".exe";

/// Remove a trailing [`EXECUTABLE_SUFFIX`], ignoring ASCII case
pub fn strip_executable_suffix(name: &str) -> &str {
    let suffix_len = EXECUTABLE_SUFFIX.len();
    if name.len() > suffix_len
        && name.is_char_boundary(name.len() - suffix_len)
        && name[name.len() - suffix_len..].eq_ignore_ascii_case(EXECUTABLE_SUFFIX)
    {
        &name[..name.len() - suffix_len]
    } else {
        name
    }
}

/// Decide whether a configured tracked name refers to an observed process.
///
/// Matches when the names are identical, or when the configured name with
/// its executable suffix removed equals the observed name ignoring case.
pub fn process_name_matches(configured: &str, observed: &str) -> bool {
    if configured == observed {
        return true;
    }

    let bare = strip_executable_suffix(configured);
    !bare.is_empty() && bare.to_lowercase() == observed.to_lowercase()
}
