// File: emberbot-core/tests/services_tests.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use emberbot_common::models::message::{ActionCallback, MessageRef, OutgoingMessage};
use emberbot_common::models::{CallbackToken, Trigger, SECRET_MASK};
use emberbot_common::traits::{ByteStore, ChatGateway};
use emberbot_core::cache::SessionTable;
use emberbot_core::http::HttpClient;
use emberbot_core::repositories::{PersistentTriggerRepository, TriggerRepository};
use emberbot_core::services::{AdminService, DispatchService, FlowService, MessageService};
use emberbot_core::Error;

// ---- mocks -------------------------------------------------------------

#[derive(Default)]
struct MemoryByteStore {
    blob: Mutex<Option<Vec<u8>>>,
}

#[async_trait]
impl ByteStore for MemoryByteStore {
    async fn read(&self) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.blob.lock().unwrap().clone())
    }
    async fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        *self.blob.lock().unwrap() = Some(bytes.to_vec());
        Ok(())
    }
}

/// Captures outbound webhook calls; the configured status is returned for
/// every request.
struct MockHttpClient {
    requests: Mutex<Vec<(String, String)>>,
    status: AtomicU16,
}

impl MockHttpClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            status: AtomicU16::new(200),
        })
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post_json(
        &self,
        url: &Url,
        body: String,
        _timeout: Option<Duration>,
    ) -> Result<u16, Error> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), body));
        Ok(self.status.load(Ordering::SeqCst))
    }
}

/// Records posted and updated messages.
#[derive(Default)]
struct MockGateway {
    posted: Mutex<Vec<(String, OutgoingMessage)>>,
    updated: Mutex<Vec<(MessageRef, OutgoingMessage)>>,
}

impl MockGateway {
    fn posted(&self) -> Vec<(String, OutgoingMessage)> {
        self.posted.lock().unwrap().clone()
    }
    fn updated(&self) -> Vec<(MessageRef, OutgoingMessage)> {
        self.updated.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for MockGateway {
    async fn post_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> Result<MessageRef, Error> {
        self.posted
            .lock()
            .unwrap()
            .push((channel_id.to_string(), message));
        Ok(MessageRef {
            channel_id: channel_id.to_string(),
            message_id: format!("msg-{}", self.posted.lock().unwrap().len()),
        })
    }

    async fn update_message(
        &self,
        target: &MessageRef,
        message: OutgoingMessage,
    ) -> Result<(), Error> {
        self.updated.lock().unwrap().push((target.clone(), message));
        Ok(())
    }

    async fn channel_name(&self, channel_id: &str) -> Result<String, Error> {
        Ok(channel_id.to_string())
    }

    async fn list_channels(&self) -> Result<Vec<String>, Error> {
        Ok(vec!["ops".to_string(), "general".to_string()])
    }
}

// ---- harness -----------------------------------------------------------

struct Harness {
    triggers: Arc<dyn TriggerRepository>,
    sessions: Arc<SessionTable>,
    http: Arc<MockHttpClient>,
    gateway: Arc<MockGateway>,
    messages: MessageService,
    flow: FlowService,
    admin: AdminService,
}

fn build_harness() -> Harness {
    let triggers: Arc<dyn TriggerRepository> = Arc::new(PersistentTriggerRepository::new(
        Arc::new(MemoryByteStore::default()),
    ));
    let sessions = Arc::new(SessionTable::default());
    let http = MockHttpClient::new();
    let gateway = Arc::new(MockGateway::default());
    let dispatcher = Arc::new(DispatchService::new(http.clone()));

    let messages = MessageService::new(
        triggers.clone(),
        sessions.clone(),
        dispatcher.clone(),
        gateway.clone(),
    );
    let flow = FlowService::new(
        triggers.clone(),
        sessions.clone(),
        dispatcher,
        gateway.clone(),
    );
    let admin = AdminService::new(triggers.clone(), gateway.clone());

    Harness {
        triggers,
        sessions,
        http,
        gateway,
        messages,
        flow,
        admin,
    }
}

fn deploy_trigger() -> Trigger {
    Trigger {
        trigger_id: String::new(),
        title: String::new(),
        channels: vec!["ops".into()],
        pattern: r"^deploy (\w+)$".into(),
        text_template: String::new(),
        url_template: "http://x/{{ matched[1] }}".into(),
        body_template: String::new(),
        actions: vec![],
        confirm: false,
        secrets: HashMap::new(),
        trigger_type: String::new(),
    }
}

fn interactive_trigger(confirm: bool) -> Trigger {
    let mut t = deploy_trigger();
    t.pattern = "^release$".into();
    t.url_template = "http://x/release/{{ value }}".into();
    t.actions = vec!["prod".into(), "stage".into()];
    t.confirm = confirm;
    t
}

fn callback(token: &CallbackToken, action: &str, value: Option<&str>) -> ActionCallback {
    ActionCallback {
        token: token.clone(),
        action: action.to_string(),
        value: value.map(str::to_string),
        message_ref: MessageRef {
            channel_id: "ops".to_string(),
            message_id: "msg-1".to_string(),
        },
        user_name: "casey".to_string(),
    }
}

/// Opens a dialog the way the router would: a session over the trigger's
/// captures plus the composite token addressing it.
async fn open_dialog(h: &Harness, trigger: Trigger) -> (CallbackToken, String) {
    let stored = h.triggers.set(trigger).await.unwrap();
    let session = h.sessions.create(vec!["release".to_string()]);
    let token = CallbackToken::new(stored.trigger_id.clone(), session.session_id.clone()).unwrap();
    (token, stored.trigger_id)
}

// ---- router ------------------------------------------------------------

#[tokio::test]
async fn end_to_end_non_interactive_dispatch() -> Result<(), Error> {
    let h = build_harness();
    h.triggers.set(deploy_trigger()).await?;

    h.messages.process_incoming_message("ops", "deploy prod").await?;

    let sent = h.http.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "http://x/prod");
    // Outcome is announced in the channel.
    assert_eq!(h.gateway.posted().len(), 1);
    Ok(())
}

#[tokio::test]
async fn message_in_other_channel_never_matches() -> Result<(), Error> {
    let h = build_harness();
    h.triggers.set(deploy_trigger()).await?;

    h.messages
        .process_incoming_message("general", "deploy prod")
        .await?;

    assert!(h.http.sent().is_empty());
    assert!(h.gateway.posted().is_empty());
    Ok(())
}

#[tokio::test]
async fn anchored_pattern_requires_exact_text() -> Result<(), Error> {
    let h = build_harness();
    let mut t = deploy_trigger();
    t.pattern = "^deploy$".into();
    t.url_template = "http://x/deploy".into();
    h.triggers.set(t).await?;

    h.messages
        .process_incoming_message("ops", "please deploy now")
        .await?;
    assert!(h.http.sent().is_empty());

    h.messages.process_incoming_message("ops", "deploy").await?;
    assert_eq!(h.http.sent().len(), 1);
    Ok(())
}

#[tokio::test]
async fn first_trigger_by_id_wins_on_multi_match() -> Result<(), Error> {
    let h = build_harness();
    let mut a = deploy_trigger();
    a.trigger_id = "aaa".into();
    a.url_template = "http://x/a".into();
    a.pattern = "deploy".into();
    let mut b = deploy_trigger();
    b.trigger_id = "bbb".into();
    b.url_template = "http://x/b".into();
    b.pattern = "deploy".into();
    // Insert in reverse order; id order must still decide.
    h.triggers.set(b).await?;
    h.triggers.set(a).await?;

    h.messages.process_incoming_message("ops", "deploy it").await?;

    let sent = h.http.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "http://x/a");
    Ok(())
}

#[tokio::test]
async fn interactive_trigger_posts_prompt_instead_of_dispatching() -> Result<(), Error> {
    let h = build_harness();
    h.triggers.set(interactive_trigger(false)).await?;

    h.messages.process_incoming_message("ops", "release").await?;

    assert!(h.http.sent().is_empty());
    let posted = h.gateway.posted();
    assert_eq!(posted.len(), 1);
    let attachment = posted[0].1.attachment.as_ref().unwrap();
    assert!(attachment.callback_token.is_some());
    assert_eq!(attachment.actions.len(), 2);
    // One live session backs the posted token.
    let token = attachment.callback_token.clone().unwrap();
    assert!(h.sessions.get(&token).is_some());
    Ok(())
}

#[tokio::test]
async fn rejected_webhook_is_reported_to_chat() -> Result<(), Error> {
    let h = build_harness();
    h.http.status.store(500, Ordering::SeqCst);
    h.triggers.set(deploy_trigger()).await?;

    h.messages.process_incoming_message("ops", "deploy prod").await?;

    let posted = h.gateway.posted();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].1.text.starts_with(":x:"));
    assert!(posted[0].1.text.contains("500"));
    Ok(())
}

#[tokio::test]
async fn dispatch_error_text_is_scrubbed_of_secrets() -> Result<(), Error> {
    let h = build_harness();
    let mut t = deploy_trigger();
    // Renders to an unparseable URL containing the secret.
    t.url_template = "not a url {{ secrets.token }}".into();
    t.secrets.insert("token".into(), "hunter2".into());
    h.triggers.set(t).await?;

    h.messages.process_incoming_message("ops", "deploy prod").await?;

    let posted = h.gateway.posted();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].1.text.starts_with(":x:"));
    assert!(!posted[0].1.text.contains("hunter2"));
    assert!(posted[0].1.text.contains(SECRET_MASK));
    Ok(())
}

// ---- flow controller ---------------------------------------------------

#[tokio::test]
async fn cancel_from_awaiting_selection_skips_dispatch() -> Result<(), Error> {
    let h = build_harness();
    let (token, _) = open_dialog(&h, interactive_trigger(false)).await;

    h.flow.handle_action(callback(&token, "cancel", None)).await?;

    assert!(h.http.sent().is_empty());
    let updated = h.gateway.updated();
    assert_eq!(updated.len(), 1);
    assert!(updated[0].1.text.contains("canceled the request"));
    Ok(())
}

#[tokio::test]
async fn select_without_confirm_dispatches_immediately() -> Result<(), Error> {
    let h = build_harness();
    let (token, _) = open_dialog(&h, interactive_trigger(false)).await;

    h.flow
        .handle_action(callback(&token, "select", Some("prod")))
        .await?;

    let sent = h.http.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "http://x/release/prod");
    let updated = h.gateway.updated();
    assert!(updated[0].1.text.starts_with(":ok:"));
    Ok(())
}

#[tokio::test]
async fn select_with_confirm_waits_for_start() -> Result<(), Error> {
    let h = build_harness();
    let (token, _) = open_dialog(&h, interactive_trigger(true)).await;

    h.flow
        .handle_action(callback(&token, "select", Some("prod")))
        .await?;

    // No dispatch yet; the message became a yes/no prompt.
    assert!(h.http.sent().is_empty());
    let updated = h.gateway.updated();
    assert_eq!(updated.len(), 1);
    let attachment = updated[0].1.attachment.as_ref().unwrap();
    assert!(attachment.text.contains("prod"));
    assert_eq!(attachment.actions.len(), 2);

    h.flow.handle_action(callback(&token, "start", None)).await?;

    let sent = h.http.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "http://x/release/prod");
    assert!(h.gateway.updated()[1].1.text.contains("confirmed"));
    Ok(())
}

#[tokio::test]
async fn cancel_from_awaiting_confirmation_skips_dispatch() -> Result<(), Error> {
    let h = build_harness();
    let (token, _) = open_dialog(&h, interactive_trigger(true)).await;

    h.flow
        .handle_action(callback(&token, "select", Some("stage")))
        .await?;
    h.flow.handle_action(callback(&token, "cancel", None)).await?;

    assert!(h.http.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn start_before_selection_is_invalid() -> Result<(), Error> {
    let h = build_harness();
    let (token, _) = open_dialog(&h, interactive_trigger(true)).await;

    let err = h
        .flow
        .handle_action(callback(&token, "start", None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAction(_)));
    assert!(h.http.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_session_is_reported_as_expired() -> Result<(), Error> {
    let h = build_harness();
    let stored = h.triggers.set(interactive_trigger(false)).await?;
    let token = CallbackToken::new(stored.trigger_id, "gone".to_string()).unwrap();

    let err = h
        .flow
        .handle_action(callback(&token, "select", Some("prod")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionExpired(_)));

    let updated = h.gateway.updated();
    assert_eq!(updated.len(), 1);
    assert!(updated[0].1.text.contains("Session is expired"));
    assert!(h.http.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_action_name_is_invalid() -> Result<(), Error> {
    let h = build_harness();
    let (token, _) = open_dialog(&h, interactive_trigger(false)).await;

    let err = h
        .flow
        .handle_action(callback(&token, "launch", None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAction(_)));
    Ok(())
}

#[tokio::test]
async fn select_value_outside_configured_actions_is_rejected() -> Result<(), Error> {
    let h = build_harness();
    let (token, _) = open_dialog(&h, interactive_trigger(false)).await;

    let err = h
        .flow
        .handle_action(callback(&token, "select", Some("rogue")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedRequest(_)));
    assert!(h.http.sent().is_empty());
    Ok(())
}

// ---- admin -------------------------------------------------------------

#[tokio::test]
async fn admin_projections_are_always_masked() -> Result<(), Error> {
    let h = build_harness();
    let mut t = deploy_trigger();
    t.secrets.insert("token".into(), "hunter2".into());
    let stored = h.admin.set_trigger(t).await?;
    assert_eq!(stored.secrets["token"], SECRET_MASK);

    let fetched = h.admin.get_trigger(&stored.trigger_id).await?;
    assert_eq!(fetched.secrets["token"], SECRET_MASK);

    let listed = h.admin.list_triggers().await?;
    assert!(listed
        .iter()
        .flat_map(|t| t.secrets.values())
        .all(|v| v == SECRET_MASK));
    Ok(())
}

#[tokio::test]
async fn admin_list_is_sorted_by_id() -> Result<(), Error> {
    let h = build_harness();
    let mut a = deploy_trigger();
    a.trigger_id = "bbb".into();
    let mut b = deploy_trigger();
    b.trigger_id = "aaa".into();
    h.triggers.set(a).await?;
    h.triggers.set(b).await?;

    let ids: Vec<String> = h
        .admin
        .list_triggers()
        .await?
        .into_iter()
        .map(|t| t.trigger_id)
        .collect();
    assert_eq!(ids, vec!["aaa", "bbb"]);
    Ok(())
}

#[tokio::test]
async fn admin_set_with_unknown_id_is_malformed() {
    let h = build_harness();
    let mut t = deploy_trigger();
    t.trigger_id = "never-created".into();

    let err = h.admin.set_trigger(t).await.unwrap_err();
    assert!(matches!(err, Error::MalformedRequest(_)));
}

#[tokio::test]
async fn admin_set_rejects_invalid_fields_with_a_report() {
    let h = build_harness();
    let mut t = deploy_trigger();
    t.channels.clear();
    t.pattern = "(broken".into();

    let err = h.admin.set_trigger(t).await.unwrap_err();
    match err {
        Error::Validation(report) => {
            assert!(report.has_field("channels"));
            assert!(report.has_field("pattern"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn admin_get_unknown_id_is_not_found() {
    let h = build_harness();
    let err = h.admin.get_trigger("ghost").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn admin_channels_come_from_the_gateway() -> Result<(), Error> {
    let h = build_harness();
    let channels = h.admin.list_channels().await?;
    assert_eq!(channels, vec!["ops", "general"]);
    Ok(())
}

#[tokio::test]
async fn secret_edit_round_trip_keeps_the_real_value() -> Result<(), Error> {
    let h = build_harness();
    let mut t = deploy_trigger();
    t.secrets.insert("token".into(), "hunter2".into());
    let stored = h.admin.set_trigger(t).await?;

    // Send back exactly what the admin surface returned.
    let resent = h.admin.set_trigger(stored.clone()).await?;
    assert_eq!(resent.secrets["token"], SECRET_MASK);

    // The real value survived underneath.
    let raw = h.triggers.get(&stored.trigger_id).await?.unwrap();
    assert_eq!(raw.trigger.secrets["token"], "hunter2");
    Ok(())
}
