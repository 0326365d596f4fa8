use super::{flag_style, Evidence, EvidenceKind, PageAnalyzer, ScanContext};
use crate::domain_utils::DomainUtils;
use crate::markers::MarkerKind;
use url::Url;

const MISMATCH_STYLE: &str = "border-bottom: 2px dashed red;";
const BAD_TLD_STYLE: &str = "color: red; font-weight: bold;";

/// Outcome of comparing a link's visible label with where it really goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelCheck {
    /// Label is ordinary text, not an address.
    NotAnAddress,
    /// Label reads like an address but does not parse. Treated as benign.
    ParseSkip,
    /// Target has no hostname to compare against (mailto:, data:, ...).
    NoTargetHost,
    Aligned,
    Mismatch {
        label_host: String,
        target_host: String,
    },
}

impl LabelCheck {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, LabelCheck::Mismatch { .. })
    }
}

/// Inspects each anchor once: label/target domain mismatch and blocklisted
/// TLDs in the target.
pub struct LinkAnalyzer;

impl Default for LinkAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn check_label(label: &str, target: &Url) -> LabelCheck {
        if !DomainUtils::looks_like_address(label) {
            return LabelCheck::NotAnAddress;
        }
        let label_host = match DomainUtils::label_host(label) {
            Ok(host) => host,
            Err(e) => {
                log::debug!("Link label '{}' is not a URL ({}), skipping", label, e);
                return LabelCheck::ParseSkip;
            }
        };
        let Some(target_host) = DomainUtils::url_host(target) else {
            return LabelCheck::NoTargetHost;
        };
        if label_host == target_host {
            LabelCheck::Aligned
        } else {
            LabelCheck::Mismatch {
                label_host,
                target_host,
            }
        }
    }
}

impl PageAnalyzer for LinkAnalyzer {
    fn scan(&self, ctx: &mut ScanContext<'_>) -> Vec<Evidence> {
        let mut evidence = Vec::new();

        for anchor in ctx.document.elements_by_tag(ctx.root, "a") {
            if ctx.markers.is_marked(MarkerKind::Link, anchor) {
                continue;
            }
            if ctx.exclusion.in_ui_surface(ctx.document, anchor) {
                continue;
            }
            let Some(href) = ctx.document.attribute(anchor, "href") else {
                continue;
            };
            let Some(target) = DomainUtils::resolve_href(href, ctx.page.base()) else {
                continue;
            };
            ctx.markers.mark(MarkerKind::Link, anchor);

            let label = ctx.document.rendered_text(anchor);
            let check = Self::check_label(&label, &target);
            if let LabelCheck::Mismatch {
                label_host,
                target_host,
            } = &check
            {
                log::debug!(
                    "Link label {} points at {} ({})",
                    label_host,
                    target_host,
                    target
                );
                flag_style(ctx.document, anchor, MISMATCH_STYLE);
                evidence.push(Evidence::new(EvidenceKind::LinkMismatch, target.as_str()));
            }

            if let Some(tld) = ctx.rules.matching_tld(target.as_str()) {
                log::debug!("Link target {} contains blocklisted TLD {}", target, tld);
                flag_style(ctx.document, anchor, BAD_TLD_STYLE);
                evidence.push(Evidence::new(EvidenceKind::BadTld, target.as_str()));
            }
        }

        evidence
    }

    fn name(&self) -> &str {
        "link_analyzer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::features::{Exclusion, PageContext};
    use crate::html::parse_document;
    use crate::markers::ScanMarkers;
    use crate::rules::RuleSet;

    fn rules() -> RuleSet {
        RuleSet::from_json(
            r#"{"keywords": [], "suspiciousTLDs": [".xyz", ".top"], "sensitiveData": []}"#,
        )
        .unwrap()
    }

    fn scan_with_page(
        doc: &mut Document,
        markers: &mut ScanMarkers,
        page: &PageContext,
    ) -> Vec<Evidence> {
        let rules = rules();
        let exclusion = Exclusion::new("vigilant-sidebar-root");
        let root = doc.body();
        let mut ctx = ScanContext {
            document: doc,
            rules: &rules,
            markers,
            page,
            exclusion: &exclusion,
            root,
        };
        LinkAnalyzer::new().scan(&mut ctx)
    }

    fn scan(doc: &mut Document, markers: &mut ScanMarkers) -> Vec<Evidence> {
        scan_with_page(doc, markers, &PageContext::default())
    }

    fn kinds(evidence: &[Evidence]) -> Vec<EvidenceKind> {
        evidence.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_label_mismatch_detected() {
        let mut doc = parse_document("<body><a href=\"https://evil-bank.net/login\">bank.com</a></body>");
        let mut markers = ScanMarkers::new();
        let found = scan(&mut doc, &mut markers);
        assert_eq!(kinds(&found), vec![EvidenceKind::LinkMismatch]);
        assert_eq!(found[0].payload, "https://evil-bank.net/login");

        let anchor = doc.elements_by_tag(doc.root(), "a")[0];
        assert!(doc.attribute(anchor, "style").unwrap().contains("dashed red"));
    }

    #[test]
    fn test_www_is_stripped_before_comparing() {
        let mut doc = parse_document("<body><a href=\"https://www.bank.com/login\">bank.com</a></body>");
        let mut markers = ScanMarkers::new();
        assert!(scan(&mut doc, &mut markers).is_empty());
    }

    #[test]
    fn test_bad_tld_independent_of_mismatch() {
        let mut doc = parse_document(
            "<body><a href=\"http://secure-login.xyz/\">paypal.com</a>\
             <a href=\"http://secure-login.top/\">Sign in</a></body>",
        );
        let mut markers = ScanMarkers::new();
        let found = scan(&mut doc, &mut markers);
        assert_eq!(
            kinds(&found),
            vec![
                EvidenceKind::LinkMismatch,
                EvidenceKind::BadTld,
                EvidenceKind::BadTld
            ]
        );
    }

    #[test]
    fn test_anchor_analyzed_at_most_once() {
        let mut doc = parse_document("<body><a href=\"http://a.xyz/\">a.xyz</a><a>no href</a></body>");
        let mut markers = ScanMarkers::new();
        assert_eq!(scan(&mut doc, &mut markers).len(), 1);
        assert!(scan(&mut doc, &mut markers).is_empty());
        assert_eq!(markers.count(MarkerKind::Link), 1);
    }

    #[test]
    fn test_relative_href_needs_page_url() {
        let mut doc = parse_document("<body><a href=\"/promo.top/deal\">Deal</a></body>");
        let mut markers = ScanMarkers::new();
        assert!(scan(&mut doc, &mut markers).is_empty());
        assert_eq!(markers.count(MarkerKind::Link), 0);

        let page = PageContext::from_str_lossy(Some("https://shop.example.com/"));
        let found = scan_with_page(&mut doc, &mut markers, &page);
        assert_eq!(kinds(&found), vec![EvidenceKind::BadTld]);
        assert_eq!(found[0].payload, "https://shop.example.com/promo.top/deal");
    }

    #[test]
    fn test_check_label_outcomes() {
        let target = Url::parse("https://bank.com/").unwrap();
        assert_eq!(LinkAnalyzer::check_label("Click here", &target), LabelCheck::NotAnAddress);
        assert_eq!(LinkAnalyzer::check_label("www.bank.com", &target), LabelCheck::Aligned);
        assert_eq!(LinkAnalyzer::check_label("pay now. today", &target), LabelCheck::ParseSkip);

        let mailto = Url::parse("mailto:help@bank.com").unwrap();
        assert_eq!(LinkAnalyzer::check_label("help@bank.com", &mailto), LabelCheck::NoTargetHost);

        assert!(LinkAnalyzer::check_label("bank.com", &Url::parse("https://evil-bank.net").unwrap())
            .is_mismatch());
    }
}
