use scraper::{Html, Selector};

/// Exact markup the portal serves when a case has nothing to download.
pub const PLACEHOLDER_PAGE: &str =
    "<html><head></head><body>No Accessible Documents Found</body></html>";

/// The placeholder's only content, however the page happens to be wrapped.
pub const PLACEHOLDER_TEXT: &str = "No Accessible Documents Found";

/// Script entry point present only on listings that use the combined-download form.
pub const MULTI_STEP_MARKER: &str = "OpenPDFCombinedDownloadForm";

pub const DOWNLOAD_ANCHOR_SELECTOR: &str = "#download";

/// What a listing page looks like, independent of what we do about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    Placeholder,
    MultiStepMarker,
    AnchorLink(String),
    Unknown,
}

/// The download path a listing page calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStrategy {
    /// Nothing accessible; leave the case untouched.
    Skip,
    /// Drive the docket-details page and its combined-download form.
    MultiStep,
    /// Navigate straight to the document link (relative or absolute).
    SingleStep(String),
    /// No mechanism found; the case is marked rejected.
    Reject,
}

/// Classify a listing page. Checks run in priority order: placeholder,
/// multi-step marker, download anchor.
pub fn classify(html: &str) -> PageKind {
    if is_placeholder(html) {
        return PageKind::Placeholder;
    }
    if html.contains(MULTI_STEP_MARKER) {
        return PageKind::MultiStepMarker;
    }
    match download_href(html) {
        Some(href) => PageKind::AnchorLink(href),
        None => PageKind::Unknown,
    }
}

pub fn resolve(html: &str) -> DownloadStrategy {
    match classify(html) {
        PageKind::Placeholder => DownloadStrategy::Skip,
        PageKind::MultiStepMarker => DownloadStrategy::MultiStep,
        PageKind::AnchorLink(href) => DownloadStrategy::SingleStep(href),
        PageKind::Unknown => DownloadStrategy::Reject,
    }
}

/// The canonical page, or any document whose body is the bare placeholder text
/// with no elements around it.
fn is_placeholder(html: &str) -> bool {
    let html = html.trim();
    if html == PLACEHOLDER_PAGE {
        return true;
    }
    if !html.contains(PLACEHOLDER_TEXT) {
        return false;
    }
    let doc = Html::parse_document(html);
    let Ok(body_selector) = Selector::parse("body") else {
        return false;
    };
    let Some(body) = doc.select(&body_selector).next() else {
        return false;
    };
    let text_only = body.children().all(|child| !child.value().is_element());
    text_only && body.text().collect::<String>().trim() == PLACEHOLDER_TEXT
}

fn download_href(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(DOWNLOAD_ANCHOR_SELECTOR).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|node| node.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(ToOwned::to_owned)
}
