/// Truncates `text` to `limit` characters, appending `"..."` when it had to
/// cut (spec.md §4.D `sendMessage`, reused verbatim by the Renderer per
/// §4.G: "truncation rules identical to `D.sendMessage`").
pub fn truncate_for_chat(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    const SUFFIX: &str = "...";
    let keep = limit.saturating_sub(SUFFIX.len());
    let truncated: String = text.chars().take(keep).collect();
    format!("{truncated}{SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_for_chat("hi", 256), "hi");
    }

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let text = "a".repeat(300);
        let result = truncate_for_chat(&text, 256);
        assert_eq!(result.chars().count(), 256);
        assert!(result.ends_with("..."));
    }
}
