use vigilant_eye::html::{parse_document, to_html};
use vigilant_eye::publisher::{LogSink, OutboundMessage};
use vigilant_eye::{EngineConfig, EngineSession, EvidenceKind, RuleSet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Scanning a fake parcel-redelivery phishing page...");

    let page = r#"<html><body>
  <h2>Delivery attempt failed</h2>
  <p>Your parcel is on hold. Act now to update your payment details.</p>
  <a href="http://redeliver-parcel.top/pay">www.royalmail.com</a>
  <form>
    <input name="card">
    <input name="cvv">
    <input type="password">
  </form>
</body></html>"#;

    let config = EngineConfig {
        page_url: Some("http://redeliver-parcel.top/".to_string()),
        ..Default::default()
    };
    let rules = RuleSet::from_source(RuleSet::default_source());
    let mut session = EngineSession::new(rules, &config);
    session.add_sink(Box::new(LogSink));

    let mut doc = parse_document(page);
    let Some(assessment) = session.start(&mut doc) else {
        println!("Initial cycle did not run");
        return Ok(());
    };

    println!("Score: {} ({:?})", assessment.score, assessment.risk_level());
    println!("Findings: {}", assessment.detected_count);
    for kind in [
        EvidenceKind::Keyword,
        EvidenceKind::LinkMismatch,
        EvidenceKind::BadTld,
        EvidenceKind::InsecureForm,
        EvidenceKind::SensitiveForm,
    ] {
        for evidence in assessment.evidence(kind) {
            println!("  {:?}: {}", kind, evidence.payload);
        }
    }

    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&OutboundMessage::status(&assessment))?
    );
    println!();
    println!("{}", to_html(&doc));
    Ok(())
}
