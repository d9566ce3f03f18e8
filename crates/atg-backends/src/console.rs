//! Line-oriented terminal prompts
//!
//! Generic over the reader and writer so prompts can be driven from byte
//! slices in tests; [`ConsolePrompter::stdio`] wires the real terminal.

use async_trait::async_trait;
use atg_core::{Confirmer, PromptError};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

struct Terminal<R, W> {
    reader: R,
    writer: W,
}

/// Asks questions and reads one line per answer
pub struct ConsolePrompter<R, W> {
    terminal: Mutex<Terminal<R, W>>,
    assume_yes: bool,
}

impl<R, W> std::fmt::Debug for ConsolePrompter<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolePrompter")
            .field("assume_yes", &self.assume_yes)
            .finish_non_exhaustive()
    }
}

/// Prompter bound to stdin/stdout
pub type StdioPrompter = ConsolePrompter<BufReader<Stdin>, Stdout>;

impl StdioPrompter {
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsolePrompter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            terminal: Mutex::new(Terminal { reader, writer }),
            assume_yes: false,
        }
    }

    /// Answer every yes/no question with yes, without reading input
    #[inline]
    #[must_use]
    pub fn with_assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    /// Print a line
    ///
    /// # Errors
    /// `PromptError::Io` if the writer fails.
    pub async fn say(&self, line: &str) -> Result<(), PromptError> {
        let mut terminal = self.terminal.lock().await;
        terminal.writer.write_all(line.as_bytes()).await?;
        terminal.writer.write_all(b"\n").await?;
        terminal.writer.flush().await?;
        Ok(())
    }

    /// One trimmed line of input
    ///
    /// # Errors
    /// `PromptError::InputClosed` at end of input.
    pub async fn ask(&self, prompt: &str) -> Result<String, PromptError> {
        let mut terminal = self.terminal.lock().await;
        terminal.writer.write_all(prompt.as_bytes()).await?;
        terminal.writer.flush().await?;

        let mut line = String::new();
        if terminal.reader.read_line(&mut line).await? == 0 {
            return Err(PromptError::InputClosed(prompt.trim().to_string()));
        }
        Ok(line.trim().to_string())
    }

    /// Non-empty answer, asking again on blank input
    ///
    /// # Errors
    /// `PromptError::InputClosed` at end of input.
    pub async fn ask_string(&self, prompt: &str) -> Result<String, PromptError> {
        loop {
            let answer = self.ask(prompt).await?;
            if !answer.is_empty() {
                return Ok(answer);
            }
        }
    }

    /// Non-negative integer, asking again until one parses
    ///
    /// # Errors
    /// `PromptError::InputClosed` at end of input.
    pub async fn ask_number(&self, prompt: &str) -> Result<u32, PromptError> {
        loop {
            let answer = self.ask(prompt).await?;
            match answer.parse::<u32>() {
                Ok(n) => return Ok(n),
                Err(_) => self.say("Please enter a whole number.").await?,
            }
        }
    }

    /// Directory relative to the project root; absolute paths are refused
    ///
    /// A blank answer selects `default`.
    ///
    /// # Errors
    /// `PromptError::InputClosed` at end of input.
    pub async fn ask_relative_dir(&self, prompt: &str, default: &str) -> Result<String, PromptError> {
        loop {
            let answer = self.ask(&format!("{prompt} ({default}): ")).await?;
            let dir = if answer.is_empty() { default.to_string() } else { answer };
            if is_absolute_dir(&dir) {
                self.say("Absolute paths are not allowed. Please enter a path relative to the project root.")
                    .await?;
                continue;
            }
            return Ok(dir);
        }
    }
}

#[async_trait]
impl<R, W> Confirmer for ConsolePrompter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        if self.assume_yes {
            return Ok(true);
        }
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        loop {
            let answer = self.ask(&format!("{prompt} {hint} ")).await?;
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n.").await?,
            }
        }
    }
}

/// Absolute on this platform, or rooted in the POSIX sense
fn is_absolute_dir(dir: &str) -> bool {
    Path::new(dir).is_absolute() || dir.starts_with('/') || dir.starts_with('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompter(input: &'static str) -> ConsolePrompter<&'static [u8], Vec<u8>> {
        ConsolePrompter::new(input.as_bytes(), Vec::new())
    }

    async fn transcript(p: ConsolePrompter<&'static [u8], Vec<u8>>) -> String {
        let terminal = p.terminal.into_inner();
        String::from_utf8(terminal.writer).unwrap()
    }

    #[tokio::test]
    async fn confirm_uses_default_on_blank() {
        let p = prompter("\n\n");
        assert!(p.confirm("Continue?", true).await.unwrap());
        assert!(!p.confirm("Continue?", false).await.unwrap());
    }

    #[tokio::test]
    async fn confirm_reprompts_on_garbage() {
        let p = prompter("maybe\nN\n");
        assert!(!p.confirm("Regenerate?", true).await.unwrap());
        assert!(transcript(p).await.contains("Please answer y or n."));
    }

    #[tokio::test]
    async fn assume_yes_reads_nothing() {
        let p = prompter("").with_assume_yes(true);
        assert!(p.confirm("Regenerate?", false).await.unwrap());
    }

    #[tokio::test]
    async fn closed_input_is_an_error() {
        let p = prompter("");
        let err = p.confirm("Continue?", true).await.unwrap_err();
        assert!(matches!(err, PromptError::InputClosed(_)));
    }

    #[tokio::test]
    async fn relative_dir_rejects_absolute_paths() {
        let p = prompter("/abs/src\nlib\n");
        assert_eq!(p.ask_relative_dir("Source directory", "src").await.unwrap(), "lib");
        assert!(transcript(p).await.contains("Absolute paths are not allowed"));
    }

    #[tokio::test]
    async fn relative_dir_blank_takes_default() {
        let p = prompter("\n");
        assert_eq!(
            p.ask_relative_dir("Test directory", "__tests__").await.unwrap(),
            "__tests__"
        );
    }

    #[tokio::test]
    async fn number_reprompts_until_valid() {
        let p = prompter("three\n-1\n3\n");
        assert_eq!(p.ask_number("Max retries: ").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn string_skips_blank_lines() {
        let p = prompter("\n  \ngpt-4o\n");
        assert_eq!(p.ask_string("Model: ").await.unwrap(), "gpt-4o");
    }
}
