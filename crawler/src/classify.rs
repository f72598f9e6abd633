use crate::fetch::FetchedPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    PlainText,
    Unsupported,
}

/// Decides whether a fetched response is indexable and how to parse it.
pub trait ContentClassifier {
    fn classify(&self, page: &FetchedPage) -> ContentKind;
}

/// Classifies on the `Content-Type` essence. A response without one is
/// treated as HTML.
#[derive(Debug, Clone)]
pub struct MimeClassifier {
    pub html: Vec<String>,
    pub text: Vec<String>,
}

impl Default for MimeClassifier {
    fn default() -> Self {
        Self {
            html: vec!["text/html".into(), "application/xhtml+xml".into()],
            text: vec!["text/plain".into()],
        }
    }
}

pub fn mime_essence(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

impl ContentClassifier for MimeClassifier {
    fn classify(&self, page: &FetchedPage) -> ContentKind {
        let essence = page.content_type.as_deref().map(mime_essence).unwrap_or_default();
        if essence.is_empty() || self.html.iter().any(|m| *m == essence) {
            ContentKind::Html
        } else if self.text.iter().any(|m| *m == essence) {
            ContentKind::PlainText
        } else {
            ContentKind::Unsupported
        }
    }
}
