use super::{flag_style, Evidence, EvidenceKind, PageAnalyzer, ScanContext};

const INSECURE_FIELD_STYLE: &str = "border: 2px solid red;";

/// Input types whose value is a secret.
const SECRET_INPUT_TYPES: &[&str] = &["password"];

/// Flags inputs that collect secrets or sensitive data. Fields are cheap to
/// inspect, so every input is re-evaluated each cycle (no markers).
pub struct FormAnalyzer;

impl Default for FormAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FormAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl PageAnalyzer for FormAnalyzer {
    fn scan(&self, ctx: &mut ScanContext<'_>) -> Vec<Evidence> {
        let mut evidence = Vec::new();
        let unencrypted = ctx.page.is_unencrypted();

        for input in ctx.document.elements_by_tag(ctx.root, "input") {
            if ctx.exclusion.in_ui_surface(ctx.document, input) {
                continue;
            }
            let name = ctx
                .document
                .attribute(input, "name")
                .unwrap_or_default()
                .to_lowercase();
            let input_type = ctx
                .document
                .attribute(input, "type")
                .unwrap_or("text")
                .to_ascii_lowercase();

            let secret = SECRET_INPUT_TYPES.contains(&input_type.as_str());
            let sensitive = if name.is_empty() {
                None
            } else {
                ctx.rules.matching_sensitive_name(&name)
            };
            if !secret && sensitive.is_none() {
                continue;
            }

            let label = if name.is_empty() {
                format!("type={input_type}")
            } else {
                name.clone()
            };

            if unencrypted {
                log::debug!("Field {} collects sensitive data over http", label);
                flag_style(ctx.document, input, INSECURE_FIELD_STYLE);
                evidence.push(Evidence::new(EvidenceKind::InsecureForm, label.clone()));
            }
            if let Some(matched) = sensitive {
                log::debug!("Field {} requests sensitive data ({})", label, matched);
                evidence.push(Evidence::new(EvidenceKind::SensitiveForm, label));
            }
        }

        evidence
    }

    fn name(&self) -> &str {
        "form_analyzer"
    }
}
