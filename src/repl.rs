//! Line-oriented chat loop.

use std::io::{self, Write};

use crossterm::style::Stylize;
use tally_chat::{ChatBackend, ChatError};
use tracing::debug;

use crate::command::Command;
use crate::input::LineReceiver;
use crate::render;

/// Whether the loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Reads commands, drives the backend and prints results to `out`.
pub struct Repl<W: Write> {
    backend: ChatBackend,
    out: W,
    /// Prompt whose last send failed in a way worth repeating.
    pending_retry: Option<String>,
}

impl<W: Write> Repl<W> {
    pub fn new(backend: ChatBackend, out: W) -> Self {
        Self {
            backend,
            out,
            pending_retry: None,
        }
    }

    pub fn backend(&self) -> &ChatBackend {
        &self.backend
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Run until `/quit`, end of input, or Ctrl-C at the prompt.
    pub async fn run(&mut self, mut lines: LineReceiver) -> io::Result<()> {
        writeln!(
            self.out,
            "tally: chatting with {} via {}. Type /help for commands.",
            self.backend.model().bold(),
            self.backend.provider_name()
        )?;

        loop {
            write!(self.out, "{} ", ">".bold())?;
            self.out.flush()?;

            let line = tokio::select! {
                line = lines.recv() => line.transpose()?,
                _ = tokio::signal::ctrl_c() => {
                    writeln!(self.out)?;
                    break;
                }
            };
            let Some(line) = line else {
                writeln!(self.out)?;
                break;
            };

            let flow = match Command::parse(&line) {
                Ok(command) => self.execute(command).await?,
                Err(e) => {
                    writeln!(self.out, "{}", e.to_string().red())?;
                    Flow::Continue
                }
            };
            if flow == Flow::Quit {
                break;
            }
        }

        debug!(
            turns = self.backend.session().len(),
            spent_usd = self.backend.session().spent_usd(),
            "repl finished"
        );
        Ok(())
    }

    /// Execute one parsed command.
    pub async fn execute(&mut self, command: Command) -> io::Result<Flow> {
        match command {
            Command::Empty => {}
            Command::Submit(prompt) => self.submit(prompt).await?,
            Command::Retry => match self.pending_retry.take() {
                Some(prompt) => self.submit(prompt).await?,
                None => writeln!(self.out, "Nothing to retry.")?,
            },
            Command::Edit { id, text } => {
                match self.backend.session_mut().edit_turn_by_id(id, text) {
                    Ok(_) => {
                        writeln!(self.out, "Message {} updated.", id)?;
                        write!(self.out, "{}", render::history(self.backend.session()))?;
                    }
                    Err(e) => self.report(&e.into())?,
                }
            }
            Command::Delete(id) => match self.backend.session_mut().delete_turn_by_id(id) {
                Ok(_) => {
                    writeln!(self.out, "Message {} deleted.", id)?;
                    write!(self.out, "{}", render::history(self.backend.session()))?;
                }
                Err(e) => self.report(&e.into())?,
            },
            Command::Model(None) => {
                let profile = self.backend.session().profile();
                writeln!(
                    self.out,
                    "Active model: {} (context window {} tokens)",
                    profile.name.as_str().bold(),
                    profile.context_window_limit
                )?;
            }
            Command::Model(Some(name)) => match self.backend.switch_model(&name) {
                Ok(_) => {
                    writeln!(self.out, "Switched to {}.", name.as_str().bold())?;
                    write!(self.out, "{}", render::history(self.backend.session()))?;
                }
                Err(e) => self.report(&e)?,
            },
            Command::Models => {
                let table = render::models(self.backend.table(), self.backend.model());
                write!(self.out, "{}", table)?;
            }
            Command::Usage => {
                write!(self.out, "{}", render::token_breakdown(self.backend.session()))?;
            }
            Command::History => {
                write!(self.out, "{}", render::history(self.backend.session()))?;
            }
            Command::Clear => {
                self.backend.session_mut().clear();
                writeln!(self.out, "Conversation cleared.")?;
            }
            Command::Help => write!(self.out, "{}", render::HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn submit(&mut self, prompt: String) -> io::Result<()> {
        self.pending_retry = None;
        writeln!(
            self.out,
            "{}",
            format!("Waiting for {}... (Ctrl-C to cancel)", self.backend.model()).dark_grey()
        )?;
        self.out.flush()?;

        let result = tokio::select! {
            result = self.backend.submit(&prompt) => result,
            _ = tokio::signal::ctrl_c() => Err(ChatError::Cancelled),
        };

        match result {
            Ok(report) => {
                let text = render::exchange(&report, self.backend.session());
                write!(self.out, "{}", text)?;
            }
            Err(e) => {
                self.report(&e)?;
                if e.is_retryable() {
                    writeln!(self.out, "  {}", "Type /retry to send it again.".dark_grey())?;
                    self.pending_retry = Some(prompt);
                }
            }
        }
        Ok(())
    }

    fn report(&mut self, err: &ChatError) -> io::Result<()> {
        debug!(error = %err, "command failed");
        writeln!(self.out, "{}", err.friendly_message().red())?;
        if !matches!(err, ChatError::Cancelled) {
            writeln!(self.out, "  {}", err.suggested_action().dark_grey())?;
        }
        if err.is_fatal_for_session() {
            let table = render::models(self.backend.table(), self.backend.model());
            write!(self.out, "{}", table)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tally_chat::{
        ChatConfig, ChatProvider, CompletionRequest, MockProvider, ProviderResponse,
    };
    use tally_cost::{ModelProfile, TurnId, WordTokenizer};

    use crate::input::spawn_line_reader;

    fn repl(provider: MockProvider) -> Repl<Vec<u8>> {
        let backend = ChatBackend::with_provider(
            ChatConfig::default(),
            Arc::new(WordTokenizer::new()),
            Box::new(provider),
        )
        .unwrap();
        Repl::new(backend, Vec::new())
    }

    /// Fails the first request with a server error, then answers.
    struct FlakyProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatProvider for FlakyProvider {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> tally_chat::Result<ProviderResponse> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ChatError::ApiTransientError("Server error (503)".into()));
            }
            Ok(ProviderResponse::new("back online"))
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn output(repl: Repl<Vec<u8>>) -> String {
        String::from_utf8(repl.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_submit_prints_costs() {
        let mut repl = repl(MockProvider::new().with_response("three word reply"));
        repl.execute(Command::Submit("hi there".into())).await.unwrap();

        assert_eq!(repl.backend().session().len(), 2);
        let out = output(repl);
        assert!(out.contains("three word reply"));
        assert!(out.contains("Tokens used by User Input: 2"));
        assert!(out.contains("Tokens used by Assistant Response: 3"));
        assert!(out.contains("Cost of this interaction: $0.0000"));
        assert!(out.contains("Total Tokens Used: 5/4096 tokens"));
    }

    #[tokio::test]
    async fn test_failed_submit_reports_and_keeps_session() {
        let mut repl = repl(MockProvider::new().with_failure("model overloaded"));
        let flow = repl.execute(Command::Submit("hi".into())).await.unwrap();

        assert_eq!(flow, Flow::Continue);
        assert!(repl.backend().session().is_empty());
        assert!(output(repl).contains("model overloaded"));
    }

    #[tokio::test]
    async fn test_edit_and_delete_by_id() {
        let mut repl = repl(MockProvider::new().with_response("ok"));
        repl.execute(Command::Submit("one".into())).await.unwrap();

        repl.execute(Command::Edit {
            id: TurnId(1),
            text: "one two three".into(),
        })
        .await
        .unwrap();
        assert_eq!(repl.backend().session().snapshot().total_tokens, 4);

        repl.execute(Command::Delete(TurnId(2))).await.unwrap();
        assert_eq!(repl.backend().session().len(), 1);

        repl.execute(Command::Delete(TurnId(2))).await.unwrap();
        let out = output(repl);
        assert!(out.contains("Message #1 updated."));
        assert!(out.contains("Tokens used by Message #1: 3"));
        assert!(out.contains("Message #2 deleted."));
        assert!(out.contains("Message #2 no longer exists"));
    }

    #[tokio::test]
    async fn test_unknown_model_is_reported() {
        let mut repl = repl(MockProvider::new());
        repl.execute(Command::Model(Some("gpt-99".into()))).await.unwrap();
        assert_eq!(repl.backend().model(), "gpt-3.5-turbo");
        assert!(output(repl).contains("gpt-99"));
    }

    #[tokio::test]
    async fn test_retry_resends_failed_prompt() {
        let provider = FlakyProvider {
            calls: AtomicUsize::new(0),
        };
        let backend = ChatBackend::with_provider(
            ChatConfig::default(),
            Arc::new(WordTokenizer::new()),
            Box::new(provider),
        )
        .unwrap();
        let mut repl = Repl::new(backend, Vec::new());

        repl.execute(Command::Submit("are you there".into())).await.unwrap();
        assert!(repl.backend().session().is_empty());

        repl.execute(Command::Retry).await.unwrap();
        let turns = repl.backend().session().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "are you there");
        assert_eq!(turns[1].text, "back online");

        repl.execute(Command::Retry).await.unwrap();
        let out = output(repl);
        assert!(out.contains("Type /retry to send it again."));
        assert!(out.contains("Nothing to retry."));
    }

    #[tokio::test]
    async fn test_permanent_failure_offers_no_retry() {
        let mut repl = repl(MockProvider::new().with_failure("bad request"));
        repl.execute(Command::Submit("hi".into())).await.unwrap();
        repl.execute(Command::Retry).await.unwrap();

        let out = output(repl);
        assert!(!out.contains("/retry"));
        assert!(out.contains("Nothing to retry."));
    }

    #[tokio::test]
    async fn test_unusable_model_lists_alternatives() {
        let mut config = ChatConfig::default();
        config.models.push(ModelProfile::new("local", 0.0, 0.0, 2048));
        let backend = ChatBackend::with_provider(
            config,
            Arc::new(WordTokenizer::new().with_unavailable("local")),
            Box::new(MockProvider::new()),
        )
        .unwrap();
        let mut repl = Repl::new(backend, Vec::new());

        repl.execute(Command::Submit("hi".into())).await.unwrap();
        repl.execute(Command::Model(Some("local".into()))).await.unwrap();

        assert_eq!(repl.backend().model(), "gpt-3.5-turbo");
        let out = output(repl);
        assert!(out.contains("Switch to another model with /model."));
        assert!(out.lines().any(|l| l.starts_with('*') && l.contains("gpt-3.5-turbo")));
    }

    #[tokio::test]
    async fn test_run_reads_until_quit() {
        let mut repl = repl(MockProvider::new().with_response("pong"));
        let input = spawn_line_reader(&b"ping\n/bogus\n/usage\n/quit\nnever sent\n"[..]).unwrap();
        repl.run(input).await.unwrap();

        assert_eq!(repl.backend().session().len(), 2);
        let out = output(repl);
        assert!(out.contains("pong"));
        assert!(out.contains("unknown command '/bogus'"));
        assert!(out.contains("Token Breakdown for each message:"));
    }

    #[tokio::test]
    async fn test_run_stops_at_end_of_input() {
        let mut repl = repl(MockProvider::new());
        let input = spawn_line_reader(&b"/clear\n"[..]).unwrap();
        repl.run(input).await.unwrap();
        assert!(output(repl).contains("Conversation cleared."));
    }
}
