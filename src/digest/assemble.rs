use std::collections::HashMap;

/// Joins the sections for `user_symbols` (in watchlist order) with newlines.
/// A user with no matching section gets `fallback` unchanged.
pub fn assemble_news_content(
    user_symbols: &[String],
    section_map: &HashMap<String, String>,
    fallback: &str,
) -> String {
    let sections: Vec<&str> = user_symbols
        .iter()
        .filter_map(|s| section_map.get(s).map(String::as_str))
        .collect();
    if sections.is_empty() {
        fallback.to_string()
    } else {
        sections.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keeps_watchlist_order() {
        let sections = map(&[("AAPL", "<a/>"), ("MSFT", "<m/>"), ("TSLA", "<t/>")]);
        let out = assemble_news_content(&symbols(&["TSLA", "AAPL"]), &sections, "<g/>");
        assert_eq!(out, "<t/>\n<a/>");
    }

    #[test]
    fn skips_symbols_without_a_section() {
        let sections = map(&[("AAPL", "<a/>")]);
        let out = assemble_news_content(&symbols(&["ZZZZ", "AAPL"]), &sections, "<g/>");
        assert_eq!(out, "<a/>");
    }

    #[test]
    fn no_match_is_exactly_the_general_section() {
        let sections = map(&[("AAPL", "<a/>")]);
        assert_eq!(assemble_news_content(&symbols(&["GME"]), &sections, "<g/>"), "<g/>");
        assert_eq!(assemble_news_content(&[], &sections, "<g/>"), "<g/>");
    }
}
