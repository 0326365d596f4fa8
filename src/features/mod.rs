pub mod form_analyzer;
pub mod link_analyzer;
pub mod text_scanner;

use crate::document::{Document, NodeId};
use crate::markers::ScanMarkers;
use crate::rules::RuleSet;
use serde::{Deserialize, Serialize};
use url::Url;

/// Tags whose text is never prose a visitor reads.
pub const NON_PROSE_TAGS: &[&str] = &["script", "style", "noscript", "textarea"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvidenceKind {
    Keyword,
    LinkMismatch,
    #[serde(rename = "BadTLD")]
    BadTld,
    InsecureForm,
    SensitiveForm,
}

/// One discrete finding. `payload` is the matched keyword, the link target
/// or the field name, depending on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: EvidenceKind,
    pub payload: String,
}

impl Evidence {
    pub fn new(kind: EvidenceKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

/// Per-analyzer evidence of one scan cycle, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceSets {
    pub keyword: Vec<Evidence>,
    pub link: Vec<Evidence>,
    pub form: Vec<Evidence>,
}

impl EvidenceSets {
    pub fn push(&mut self, evidence: Evidence) {
        match evidence.kind {
            EvidenceKind::Keyword => self.keyword.push(evidence),
            EvidenceKind::LinkMismatch | EvidenceKind::BadTld => self.link.push(evidence),
            EvidenceKind::InsecureForm | EvidenceKind::SensitiveForm => self.form.push(evidence),
        }
    }

    pub fn len(&self) -> usize {
        self.keyword.len() + self.link.len() + self.form.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the engine knows about the page it runs in.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    url: Option<Url>,
}

impl PageContext {
    pub fn new(url: Option<Url>) -> Self {
        Self { url }
    }

    pub fn from_str_lossy(url: Option<&str>) -> Self {
        let url = url.and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Ignoring unparsable page URL {raw}: {e}");
                None
            }
        });
        Self { url }
    }

    pub fn base(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn scheme(&self) -> Option<&str> {
        self.url.as_ref().map(|u| u.scheme())
    }

    /// Only a known plain-`http` page counts as unencrypted.
    pub fn is_unencrypted(&self) -> bool {
        self.scheme() == Some("http")
    }
}

/// Decides which element subtrees the text scan must not enter.
#[derive(Debug, Clone)]
pub struct Exclusion {
    ui_root_id: String,
}

impl Exclusion {
    pub fn new(ui_root_id: impl Into<String>) -> Self {
        Self {
            ui_root_id: ui_root_id.into(),
        }
    }

    pub fn ui_root_id(&self) -> &str {
        &self.ui_root_id
    }

    pub fn excludes(&self, doc: &Document, id: NodeId) -> bool {
        match doc.tag(id) {
            Some(tag) => {
                NON_PROSE_TAGS.contains(&tag)
                    || doc.attribute(id, "id") == Some(self.ui_root_id.as_str())
            }
            None => false,
        }
    }

    /// True when the node sits inside the engine's own UI surface.
    pub fn in_ui_surface(&self, doc: &Document, id: NodeId) -> bool {
        doc.closest(id, |d, n| d.attribute(n, "id") == Some(self.ui_root_id.as_str()))
            .is_some()
    }

    pub fn excludes_any_ancestor(&self, doc: &Document, id: NodeId) -> bool {
        doc.closest(id, |d, n| self.excludes(d, n)).is_some()
    }
}

/// Everything an analyzer may read or write during one pass.
pub struct ScanContext<'a> {
    pub document: &'a mut Document,
    pub rules: &'a RuleSet,
    pub markers: &'a mut ScanMarkers,
    pub page: &'a PageContext,
    pub exclusion: &'a Exclusion,
    pub root: NodeId,
}

pub trait PageAnalyzer: Send + Sync {
    fn scan(&self, ctx: &mut ScanContext<'_>) -> Vec<Evidence>;
    fn name(&self) -> &str;
}

/// Add a CSS declaration to an element's inline style once.
pub(crate) fn flag_style(doc: &mut Document, id: NodeId, declaration: &str) {
    let current = doc.attribute(id, "style").unwrap_or("").trim().to_string();
    if current.contains(declaration) {
        return;
    }
    let updated = if current.is_empty() {
        declaration.to_string()
    } else if current.ends_with(';') {
        format!("{current} {declaration}")
    } else {
        format!("{current}; {declaration}")
    };
    doc.set_attribute(id, "style", &updated);
}

/// Runs the analyzers in order over one document.
pub struct AnalyzerPipeline {
    analyzers: Vec<Box<dyn PageAnalyzer>>,
}

impl Default for AnalyzerPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerPipeline {
    pub fn new() -> Self {
        Self {
            analyzers: vec![
                Box::new(text_scanner::TextScanner::new()),
                Box::new(link_analyzer::LinkAnalyzer::new()),
                Box::new(form_analyzer::FormAnalyzer::new()),
            ],
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    pub fn run(&self, ctx: &mut ScanContext<'_>) -> EvidenceSets {
        let mut sets = EvidenceSets::default();
        for analyzer in &self.analyzers {
            let found = analyzer.scan(ctx);
            log::debug!("{} produced {} evidence entries", analyzer.name(), found.len());
            for evidence in found {
                sets.push(evidence);
            }
        }
        sets
    }
}
