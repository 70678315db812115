// src/utils/html.rs

/// Sanitizes admin-authored question text and explanations.
///
/// Whitelist-based: safe inline tags (<b>, <code>, <p>) survive, while
/// <script>, <iframe> and event-handler attributes are stripped together
/// with their content. Option texts are not passed through here because
/// scoring compares them verbatim.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
