/// Normalize line endings and drop blank lines.
///
/// Paragraph breaks made of blank lines are not preserved.
pub fn normalize_rules_text(text: Option<&str>) -> String {
    let text = match text {
        Some(t) if !t.is_empty() => t,
        _ => return String::new(),
    };

    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
