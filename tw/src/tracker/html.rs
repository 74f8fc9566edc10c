//! Small scraping helpers over `scraper`

use scraper::{ElementRef, Html, Selector};

/// Whitespace-collapsed text of the first element matching `selector`
pub fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|element| element_text(&element))
        .find(|text| !text.is_empty())
}

/// Text of every element matching `selector`, one string per element
pub fn all_texts(document: &Html, selector: &str) -> Vec<String> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).map(|element| element_text(&element)).collect(),
        Err(_) => Vec::new(),
    }
}

/// Contents of `<title>`
pub fn page_title(document: &Html) -> Option<String> {
    first_text(document, "title")
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_text_collapses_whitespace() {
        let doc = Html::parse_document("<div class=\"b\">\n  Some   <i>Show</i>\n</div>");
        assert_eq!(first_text(&doc, "div.b").as_deref(), Some("Some Show"));
    }

    #[test]
    fn test_first_text_skips_empty_matches() {
        let doc = Html::parse_document("<p class=\"x\"> </p><p class=\"x\">second</p>");
        assert_eq!(first_text(&doc, "p.x").as_deref(), Some("second"));
    }

    #[test]
    fn test_invalid_selector_yields_nothing() {
        let doc = Html::parse_document("<p>x</p>");
        assert!(first_text(&doc, "p[").is_none());
        assert!(all_texts(&doc, "p[").is_empty());
    }

    #[test]
    fn test_page_title() {
        let doc = Html::parse_document("<html><head><title> A / B </title></head></html>");
        assert_eq!(page_title(&doc).as_deref(), Some("A / B"));
    }
}
