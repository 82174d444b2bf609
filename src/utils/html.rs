// src/utils/html.rs

/// Sanitizes administrator-entered text with ammonia's whitelist.
///
/// Safe inline tags survive; scripts, iframes and event attributes are
/// stripped along with their content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_keeps_text() {
        assert_eq!(clean_html("Đợt 1<script>alert(1)</script>"), "Đợt 1");
        assert_eq!(clean_html("<b>Phòng A2</b>"), "<b>Phòng A2</b>");
    }
}
