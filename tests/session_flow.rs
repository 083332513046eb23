use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mct_chat::llm::{BoxError, ChatProvider, TokenStream};
use mct_chat::media::DataUri;
use mct_chat::models::chat::{Message, Role};
use mct_chat::server::api::{AppState, router};
use mct_chat::session::notify::{Notification, Notifier, Severity};
use mct_chat::session::{ChatSession, SubmitOutcome};

struct StubProvider {
    chunks: Vec<String>,
    fail_establish: bool,
    last_turn: Mutex<Option<Message>>,
}

impl StubProvider {
    fn streaming(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail_establish: false,
            last_turn: Mutex::new(None),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            chunks: Vec::new(),
            fail_establish: true,
            last_turn: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ChatProvider for StubProvider {
    async fn stream_reply(
        &self,
        _history: &[Message],
        turn: &Message,
    ) -> Result<TokenStream, BoxError> {
        *self.last_turn.lock().unwrap() = Some(turn.clone());
        if self.fail_establish {
            return Err("provider exploded".into());
        }
        let items: Vec<Result<String, BoxError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notes: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn count(&self, severity: Severity) -> usize {
        self.notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.severity == severity)
            .count()
    }

    fn last_description(&self) -> Option<String> {
        self.notes.lock().unwrap().last().map(|n| n.description.clone())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notes.lock().unwrap().push(notification);
    }
}

async fn spawn_relay(provider: Arc<StubProvider>, access_password: Option<&str>) -> SocketAddr {
    let state = AppState {
        provider,
        access_password: access_password.map(str::to_string),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state).into_make_service())
            .await
            .unwrap();
    });
    addr
}

fn session_against(addr: SocketAddr, notifier: Arc<RecordingNotifier>) -> ChatSession {
    ChatSession::new(format!("http://{}/api/chat", addr), None, notifier)
}

#[tokio::test]
async fn blank_submission_is_a_no_op() {
    let notifier = Arc::new(RecordingNotifier::default());
    // Deliberately unreachable relay: a no-op must never touch the network.
    let mut session = ChatSession::new(
        "http://127.0.0.1:1/api/chat".to_string(),
        None,
        notifier.clone(),
    );

    let outcome = session.submit("   ", None, |_| {}).await;

    assert_eq!(outcome, SubmitOutcome::Ignored);
    assert!(session.messages().is_empty());
    assert_eq!(notifier.count(Severity::Error), 0);
}

#[tokio::test]
async fn successful_submission_appends_user_and_model_messages() {
    let provider = StubProvider::streaming(&["4"]);
    let addr = spawn_relay(provider, None).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = session_against(addr, notifier.clone());

    let mut seen = String::new();
    let outcome = session.submit("2+2?", None, |delta| seen.push_str(delta)).await;

    assert_eq!(outcome, SubmitOutcome::Completed);
    assert_eq!(seen, "4");

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "2+2?");
    assert_eq!(messages[1].role, Role::Model);
    assert_eq!(messages[1].content, "4");
    assert_eq!(notifier.count(Severity::Error), 0);
}

#[tokio::test]
async fn model_message_is_the_concatenation_of_all_chunks() {
    let provider = StubProvider::streaming(&["Hel", "lo ", "world"]);
    let addr = spawn_relay(provider, None).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = session_against(addr, notifier);

    let outcome = session.submit("greet me", None, |_| {}).await;

    assert_eq!(outcome, SubmitOutcome::Completed);
    assert_eq!(session.messages()[1].content, "Hello world");
}

#[tokio::test]
async fn sequential_turns_accumulate() {
    let provider = StubProvider::streaming(&["answer"]);
    let addr = spawn_relay(provider, None).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = session_against(addr, notifier);

    assert_eq!(session.submit("one", None, |_| {}).await, SubmitOutcome::Completed);
    assert_eq!(session.submit("two", None, |_| {}).await, SubmitOutcome::Completed);

    assert_eq!(session.messages().len(), 4);
}

#[tokio::test]
async fn network_failure_rolls_back_the_placeholder() {
    let notifier = Arc::new(RecordingNotifier::default());
    // Nothing listens here; the connect fails after the messages are staged.
    let mut session = ChatSession::new(
        "http://127.0.0.1:1/api/chat".to_string(),
        None,
        notifier.clone(),
    );

    let outcome = session.submit("hello?", None, |_| {}).await;

    assert_eq!(outcome, SubmitOutcome::Failed);
    let messages = session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(notifier.count(Severity::Error), 1);
}

#[tokio::test]
async fn upstream_failure_rolls_back_and_notifies_once() {
    let provider = StubProvider::failing();
    let addr = spawn_relay(provider, None).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = session_against(addr, notifier.clone());

    let outcome = session.submit("boom", None, |_| {}).await;

    assert_eq!(outcome, SubmitOutcome::Failed);
    assert_eq!(session.messages().len(), 1);
    assert_eq!(notifier.count(Severity::Error), 1);
    assert!(notifier.last_description().unwrap().contains("500"));
}

#[tokio::test]
async fn rejected_password_reverts_to_unauthenticated() {
    let provider = StubProvider::streaming(&["welcome"]);
    let addr = spawn_relay(provider, Some("sesame")).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = session_against(addr, notifier.clone());
    session.set_password(Some("wrong".to_string()));

    let outcome = session.submit("let me in", None, |_| {}).await;

    assert_eq!(outcome, SubmitOutcome::Failed);
    assert_eq!(session.messages().len(), 1);
    assert!(session.needs_password());
    assert!(notifier.last_description().unwrap().contains("401"));

    // Re-authenticate and try again: the unanswered turn stays as history.
    session.set_password(Some("sesame".to_string()));
    let outcome = session.submit("let me in again", None, |_| {}).await;

    assert_eq!(outcome, SubmitOutcome::Completed);
    assert_eq!(session.messages().len(), 3);
    assert_eq!(session.messages()[2].content, "welcome");
}

#[tokio::test]
async fn staged_image_rides_on_the_user_message() {
    let provider = StubProvider::streaming(&["a cat"]);
    let addr = spawn_relay(provider.clone(), None).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = session_against(addr, notifier);

    let image = DataUri::new("image/png", vec![9, 8, 7]);
    let outcome = session.submit("what is this?", Some(image.clone()), |_| {}).await;

    assert_eq!(outcome, SubmitOutcome::Completed);
    assert_eq!(session.messages()[0].image.as_deref(), Some(image.to_string().as_str()));

    // The relay forwarded the image intact inside the current turn.
    let turn = provider.last_turn.lock().unwrap().clone().unwrap();
    let forwarded = DataUri::parse(turn.image.as_deref().unwrap()).unwrap();
    assert_eq!(forwarded, image);
}

#[tokio::test]
async fn image_only_submission_is_accepted() {
    let provider = StubProvider::streaming(&["nice photo"]);
    let addr = spawn_relay(provider, None).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = session_against(addr, notifier);

    let image = DataUri::new("image/jpeg", vec![1]);
    let outcome = session.submit("", Some(image), |_| {}).await;

    assert_eq!(outcome, SubmitOutcome::Completed);
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn clear_empties_the_conversation_and_notifies() {
    let provider = StubProvider::streaming(&["hi"]);
    let addr = spawn_relay(provider, None).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut session = session_against(addr, notifier.clone());

    session.submit("hello", None, |_| {}).await;
    assert_eq!(session.messages().len(), 2);

    session.clear();

    assert!(session.messages().is_empty());
    assert_eq!(notifier.count(Severity::Info), 1);
}
