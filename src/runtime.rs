use crate::document::Document;
use crate::session::EngineSession;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

pub type DocumentEdit = Box<dyn FnOnce(&mut Document) + Send>;

/// Something the host page or the background coordinator did.
pub enum HostEvent {
    /// Page script changed the document.
    Edit(DocumentEdit),
    /// The background coordinator filed a report.
    ReportConfirmed(String),
    /// The page is going away.
    TearDown,
}

/// Cloneable handle for feeding events into a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<HostEvent>,
}

impl EngineHandle {
    /// Returns false once the engine has stopped.
    pub fn edit<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut Document) + Send + 'static,
    {
        self.sender.send(HostEvent::Edit(Box::new(edit))).is_ok()
    }

    pub fn confirm_report(&self, report_id: impl Into<String>) -> bool {
        self.sender
            .send(HostEvent::ReportConfirmed(report_id.into()))
            .is_ok()
    }

    pub fn tear_down(&self) -> bool {
        self.sender.send(HostEvent::TearDown).is_ok()
    }
}

/// Owns the document and the session on a single task. Host edits, the
/// debounce timer and scan cycles are all serialized through [`run`].
///
/// [`run`]: EngineRuntime::run
pub struct EngineRuntime {
    session: EngineSession,
    document: Document,
    events: mpsc::UnboundedReceiver<HostEvent>,
}

impl EngineRuntime {
    pub fn new(session: EngineSession, document: Document) -> (Self, EngineHandle) {
        let (sender, events) = mpsc::unbounded_channel();
        let runtime = Self {
            session,
            document,
            events,
        };
        (runtime, EngineHandle { sender })
    }

    /// Run the startup cycle, then serve events until teardown or until every
    /// handle is dropped. Hands the session and document back afterwards.
    pub async fn run(mut self) -> (EngineSession, Document) {
        self.session.start(&mut self.document);

        loop {
            let deadline = self.session.scheduler().deadline();
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(HostEvent::Edit(edit)) => {
                        edit(&mut self.document);
                        let records = self.document.take_mutations();
                        self.session.observe(&self.document, &records, Instant::now());
                    }
                    Some(HostEvent::ReportConfirmed(report_id)) => {
                        self.session.confirm_report(report_id);
                    }
                    Some(HostEvent::TearDown) => {
                        log::info!("Page teardown, stopping engine");
                        break;
                    }
                    None => {
                        log::debug!("All engine handles dropped");
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.session.poll(&mut self.document, Instant::now());
                }
            }
        }

        self.session.detach();
        (self.session, self.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::html::{parse_document, parse_fragment};
    use crate::publisher::{ChannelSink, OutboundMessage};
    use crate::rules::RuleSet;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::sleep;

    const RULES: &str = r#"{
        "keywords": ["urgent", "gift card"],
        "suspiciousTLDs": [".xyz"],
        "sensitiveData": []
    }"#;

    fn engine(html: &str) -> (
        EngineRuntime,
        EngineHandle,
        mpsc::UnboundedReceiver<OutboundMessage>,
    ) {
        let config = EngineConfig {
            page_url: Some("https://news.example.com/".to_string()),
            ..Default::default()
        };
        let mut session = EngineSession::new(RuleSet::from_json(RULES).unwrap(), &config);
        let (sink, outbound) = ChannelSink::channel();
        session.add_sink(Box::new(sink));
        let (runtime, handle) = EngineRuntime::new(session, parse_document(html));
        (runtime, handle, outbound)
    }

    fn append_html(handle: &EngineHandle, html: &'static str) {
        handle.edit(move |doc| {
            let body = doc.body();
            for node in parse_fragment(doc, html) {
                doc.append_child(body, node);
            }
        });
    }

    fn score(message: OutboundMessage) -> u8 {
        let OutboundMessage::UpdateStatus(update) = message;
        update.score
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_cycle_runs_without_changes() {
        let (runtime, handle, mut outbound) = engine("<body><p>urgent notice</p></body>");
        let task = tokio::spawn(runtime.run());

        sleep(Duration::from_millis(10)).await;
        assert_eq!(score(outbound.try_recv().unwrap()), 90);

        handle.tear_down();
        let (session, _doc) = task.await.unwrap();
        assert_eq!(session.cycles(), 1);
        assert!(session.scheduler().is_detached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_yields_one_cycle_after_quiet_period() {
        let (runtime, handle, mut outbound) = engine("<body><p>hello</p></body>");
        let task = tokio::spawn(runtime.run());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(score(outbound.try_recv().unwrap()), 100);

        append_html(&handle, "<p>urgent</p>");
        sleep(Duration::from_millis(500)).await;
        append_html(&handle, "<p>Redeem your gift card</p>");
        sleep(Duration::from_millis(500)).await;
        // 1000ms since the first change, 500ms since the last
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));

        sleep(Duration::from_millis(300)).await;
        assert_eq!(score(outbound.try_recv().unwrap()), 80);
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));

        handle.tear_down();
        let (session, _doc) = task.await.unwrap();
        assert_eq!(session.cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_edit_rescans_after_quiet_period() {
        let (runtime, handle, mut outbound) = engine("<body><p id=\"p\">Your order shipped</p></body>");
        let task = tokio::spawn(runtime.run());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(score(outbound.try_recv().unwrap()), 100);

        handle.edit(|doc| {
            if let Some(p) = doc.element_by_id("p") {
                let text = doc.children(p)[0];
                doc.set_text(text, "urgent: your order is on hold");
            }
        });
        sleep(Duration::from_millis(700)).await;
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));

        sleep(Duration::from_millis(100)).await;
        assert_eq!(score(outbound.try_recv().unwrap()), 90);
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));

        handle.tear_down();
        let (session, _doc) = task.await.unwrap();
        assert_eq!(session.cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attribute_and_sidebar_edits_are_ignored() {
        let (runtime, handle, mut outbound) = engine(
            "<body><div id=\"vigilant-sidebar-root\"></div><p id=\"p\">hello</p></body>",
        );
        let task = tokio::spawn(runtime.run());
        sleep(Duration::from_millis(10)).await;
        outbound.try_recv().unwrap();

        handle.edit(|doc| {
            if let Some(p) = doc.element_by_id("p") {
                doc.set_attribute(p, "class", "read");
            }
        });
        handle.edit(|doc| {
            if let Some(root) = doc.element_by_id("vigilant-sidebar-root") {
                let text = doc.create_text("urgent: score 90");
                doc.append_child(root, text);
            }
        });
        sleep(Duration::from_secs(5)).await;
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));

        handle.tear_down();
        let (session, _doc) = task.await.unwrap();
        assert_eq!(session.cycles(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_confirmation_and_handle_drop() {
        let (runtime, handle, _outbound) = engine("<body></body>");
        let task = tokio::spawn(runtime.run());

        assert!(handle.confirm_report("INC-100200"));
        drop(handle);
        let (session, _doc) = task.await.unwrap();
        assert_eq!(session.report_id(), Some("INC-100200"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_pending_cycle() {
        let (runtime, handle, mut outbound) = engine("<body></body>");
        let task = tokio::spawn(runtime.run());
        sleep(Duration::from_millis(10)).await;
        outbound.try_recv().unwrap();

        append_html(&handle, "<a href=\"http://prize.xyz/\">Claim</a>");
        handle.tear_down();
        let (session, doc) = task.await.unwrap();

        assert_eq!(session.cycles(), 1);
        assert_eq!(doc.elements_by_tag(doc.root(), "a").len(), 1);
        assert!(!handle.edit(|_| {}));
    }
}
