//! Title extraction from achievement pages

use std::sync::LazyLock;

use scraper::{Html, Selector};

static H1: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("static selector is valid"));

/// Trimmed text of the first `<h1>` in `body`, or `None` if the page has none.
pub fn extract_title(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    doc.select(&H1)
        .next()
        .map(|h1| h1.text().collect::<String>().trim().to_string())
}
