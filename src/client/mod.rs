use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::ChatArgs;
use crate::llm::BoxError;
use crate::media::{self, DataUri};
use crate::session::notify::{Notification, Notifier, Severity};
use crate::session::{ChatSession, SubmitOutcome};

/// Renders notifications on stderr so they never interleave with streamed
/// answer text on stdout.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: Notification) {
        let marker = match notification.severity {
            Severity::Info => "*",
            Severity::Error => "!",
        };
        eprintln!("{} {}: {}", marker, notification.title, notification.description);
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Line-based chat REPL. This is a rendering shell around [`ChatSession`];
/// all conversation state lives in the session.
pub async fn run(args: ChatArgs) -> Result<(), BoxError> {
    let notifier: Arc<dyn Notifier> = Arc::new(TerminalNotifier);
    let mut session = ChatSession::new(args.relay_url.clone(), args.password.clone(), notifier.clone());
    let mut staged_image: Option<DataUri> = None;

    println!("MCT Chat — /image <path> to attach, /clear to reset, /quit to exit");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if line == "/quit" {
            break;
        }
        if line == "/clear" {
            staged_image = None;
            session.clear();
            continue;
        }
        if let Some(path) = line.strip_prefix("/image") {
            match media::read_image_as_data_uri(Path::new(path.trim())) {
                Ok(image) => {
                    println!("attached {} ({} bytes)", image.mime_type, image.data.len());
                    staged_image = Some(image);
                }
                Err(e) => {
                    notifier.notify(Notification::error("Could not attach image", e.to_string()));
                }
            }
            continue;
        }
        if line.is_empty() && staged_image.is_none() {
            continue;
        }

        if session.needs_password() {
            let password = rpassword::prompt_password("Relay password: ")?;
            session.set_password(Some(password));
        }

        // The staged image is consumed on send whether or not the turn
        // succeeds; re-attach to retry.
        let image = staged_image.take();
        let outcome = session
            .submit(line, image, |delta| {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            })
            .await;

        if outcome == SubmitOutcome::Completed {
            println!();
        }
    }

    Ok(())
}
