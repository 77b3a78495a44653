//! Static HTML rendering of the text report.

/// Text made HTML-safe with layout kept: newlines become `<br>`, spaces `&nbsp;`.
pub fn preformatted_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("<br>"),
            ' ' => out.push_str("&nbsp;"),
            other => out.push(other),
        }
    }
    out
}

/// Full document with one monospace paragraph per section.
pub fn html_document(title: &str, sections: &[String]) -> String {
    let mut doc = String::new();
    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    doc.push_str(&format!("<title>{}</title>\n", preformatted_to_html(title)));
    doc.push_str("</head>\n<body style=\"font-family: monospace\">\n");
    for section in sections {
        doc.push_str("<p>");
        doc.push_str(&preformatted_to_html(section));
        doc.push_str("</p>\n");
    }
    doc.push_str("</body>\n</html>\n");
    doc
}
