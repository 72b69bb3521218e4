use url::Url;

use crate::Case;

const COMBINED_DOWNLOAD_SELECTOR: &str = "div.item[onclick^=\"OpenPDFCombinedDownloadForm\"]";

/// Builds the portal URLs a run touches, all relative to one origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRoutes {
    base: Url,
}

impl PortalRoutes {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn parse(base: &str) -> Result<Self, url::ParseError> {
        Url::parse(base).map(Self::new)
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn login(&self) -> Url {
        let mut url = self.join_path("/user-portal");
        url.set_query(Some("destination=filings"));
        url
    }

    /// Per-case listing of available documents.
    pub fn listing(&self, case: &Case) -> Url {
        self.join_path(&format!("/ir-documentselect/{}/1.00000", case.docket_key()))
    }

    /// Per-case filings page that hosts the docket-details control.
    pub fn filings(&self, case: &Case) -> Url {
        self.join_path(&format!("/filings/{}", case.docket_key()))
    }

    /// Resolve a link found on a listing page against the portal origin.
    pub fn resolve(&self, href: &str) -> Result<Url, url::ParseError> {
        self.base.join(href.trim())
    }

    /// Selector for the docket-details link tied to one case.
    pub fn docket_details_selector(&self, case: &Case) -> String {
        format!(
            "a[onclick=\"return view_docket_details(this, '{}', '1.00000', 2);\"]",
            case.docket_key()
        )
    }

    /// Trigger for the server-side combined PDF download.
    pub fn combined_download_selector(&self) -> &'static str {
        COMBINED_DOWNLOAD_SELECTOR
    }

    fn join_path(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}
