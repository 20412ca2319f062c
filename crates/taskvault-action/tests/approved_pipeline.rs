//! End-to-end passes over a real vault: file in `Approved` to `Done` plus an
//! audit entry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use taskvault_action::{
    ActionRegistry, ApprovedRunner, ArgumentMap, AuditLog, Channel, Executor, FallbackTransport,
    MessageHandler, RecordHandler, ToolHandler, ToolRegistry, TransportError,
};
use taskvault_core::config::AuditConfig;
use taskvault_core::{FsStageStore, Stage, StageStore, VaultLayout};
use taskvault_watch::planner::render_reply_draft;
use tempfile::TempDir;

#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<(String, ArgumentMap)>>,
}

impl Recording {
    fn calls(&self) -> Vec<(String, ArgumentMap)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    async fn call(&self, operation: &str, arguments: &ArgumentMap) -> Result<Value, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), arguments.clone()));
        Ok(json!({ "success": true }))
    }
}

struct Down;

#[async_trait]
impl Channel for Down {
    fn name(&self) -> &str {
        "rpc"
    }

    async fn call(&self, _operation: &str, _arguments: &ArgumentMap) -> Result<Value, TransportError> {
        Err(TransportError::Unavailable {
            channel: "rpc".into(),
            reason: "connection refused".into(),
        })
    }
}

struct Vault {
    _dir: TempDir,
    store: Arc<FsStageStore>,
    audit: Arc<AuditLog>,
    runner: ApprovedRunner,
    mail: Arc<Recording>,
    records: Arc<Recording>,
}

fn vault() -> Vault {
    let dir = TempDir::new().unwrap();
    let layout = VaultLayout::new(dir.path());
    layout.ensure().unwrap();
    let store = Arc::new(FsStageStore::new(layout.clone()));

    let mail = Arc::new(Recording::default());
    let records = Arc::new(Recording::default());
    let records_transport = Arc::new(FallbackTransport::new(
        "records",
        Arc::new(Down),
        records.clone(),
        Duration::from_millis(100),
    ));

    let mut tools = ToolRegistry::new();
    tools.register("records", records_transport);

    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(MessageHandler::new(mail.clone())));
    registry.register(Arc::new(RecordHandler::new(tools.clone(), "records")));
    registry.register(Arc::new(ToolHandler::new(tools)));

    let audit = Arc::new(
        AuditLog::new(&AuditConfig::default()).with_jsonl(layout.dir(Stage::Logs).join("audit.jsonl")),
    );
    let executor = Arc::new(Executor::new(registry, audit.clone()));
    let runner = ApprovedRunner::new(store.clone(), executor, Duration::from_millis(50));

    Vault {
        _dir: dir,
        store,
        audit,
        runner,
        mail,
        records,
    }
}

#[tokio::test]
async fn message_send_ends_in_done_with_successful_audit() {
    let v = vault();
    v.store
        .write_new(
            Stage::Approved,
            "reply.md",
            "type: message_send\nto: a@example.com\nsubject: Hi\nbody: Hello\n",
        )
        .unwrap();

    let report = v.runner.run_once().await;
    assert_eq!(report.succeeded, 1);

    assert!(v.store.list(Stage::Approved).unwrap().is_empty());
    assert_eq!(v.store.list(Stage::Done).unwrap(), vec!["reply.md"]);

    let calls = v.mail.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1["to"], json!("a@example.com"));
    assert_eq!(calls[0].1["subject"], json!("Hi"));
    assert_eq!(calls[0].1["body"], json!("Hello"));

    let entries = v.audit.recent(10);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action_type, "message_send");
    assert!(entries[0].success);
}

#[tokio::test]
async fn bogus_type_is_rejected_but_archived() {
    let v = vault();
    v.store
        .write_new(Stage::Approved, "weird.md", "type: bogus_type\nto: someone\n")
        .unwrap();

    let report = v.runner.run_once().await;
    assert_eq!(report.failed, 1);
    assert_eq!(v.store.list(Stage::Done).unwrap(), vec!["weird.md"]);

    let entries = v.audit.recent(10);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action_type, "bogus_type");
    assert!(!entries[0].success);
    assert!(entries[0].summary.contains("Unknown action type"));
    assert!(v.mail.calls().is_empty());
}

#[tokio::test]
async fn planner_reply_draft_is_sent_to_bare_address() {
    let v = vault();
    let draft = render_reply_draft("Ali Khan <ali@example.com>", "Quarterly report");
    v.store
        .write_new(Stage::Approved, "APPROVAL_20240501_101500_report.txt", &draft)
        .unwrap();

    v.runner.run_once().await;

    let calls = v.mail.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1["to"], json!("ali@example.com"));
    assert!(calls[0].1["body"]
        .as_str()
        .unwrap()
        .starts_with("Dear Ali Khan,\n\nThank you for reaching out"));
    assert_eq!(calls[0].1["subject"], json!("Re: Quarterly report"));
}

#[tokio::test]
async fn tool_call_falls_back_and_normalizes_arguments() {
    let v = vault();
    let first = "type: approval_request\ntool: records\naction: create_invoice\n\nTool Arguments:\n{'customer': 'Acme', 'price': 1500, 'memo': 'May retainer'}\n---\n";
    let second = "type: invoice_create\n\nTool Arguments:\n{'client_name': 'Globex', 'amount': 20}\n";
    v.store.write_new(Stage::Approved, "a_invoice.md", first).unwrap();
    v.store.write_new(Stage::Approved, "b_invoice.md", second).unwrap();

    let report = v.runner.run_once().await;
    assert_eq!(report.succeeded, 2);

    let calls = v.records.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "create_invoice");
    assert_eq!(calls[0].1["client_name"], json!("Acme"));
    assert_eq!(calls[0].1["amount"], json!(1500));
    assert_eq!(calls[0].1["description"], json!("May retainer"));
    assert_eq!(calls[1].1["client_name"], json!("Globex"));
}

#[tokio::test]
async fn audit_is_persisted_as_json_lines() {
    let v = vault();
    v.store
        .write_new(Stage::Approved, "one.md", "type: bogus_type\n")
        .unwrap();
    v.runner.run_once().await;

    let path = v.store.layout().dir(Stage::Logs).join("audit.jsonl");
    let text = std::fs::read_to_string(path).unwrap();
    let line: Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(line["action_type"], json!("bogus_type"));
    assert_eq!(line["success"], json!(false));
    assert!(line["timestamp"].is_string());
}

#[tokio::test]
async fn second_pass_does_not_re_execute() {
    let v = vault();
    v.store
        .write_new(
            Stage::Approved,
            "once.md",
            "type: message_send\nto: a@example.com\nsubject: Hi\nbody: Hello\n",
        )
        .unwrap();

    v.runner.run_once().await;
    v.runner.run_once().await;
    assert_eq!(v.mail.calls().len(), 1);
    assert_eq!(v.audit.len(), 1);
}
