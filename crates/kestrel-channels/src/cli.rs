use std::io::{BufRead, Write};

use kestrel_core::channel::{Channel, ChannelError, ChannelMessage};

/// Lines that end the session.
fn is_exit_command(line: &str) -> bool {
    matches!(line, "exit" | "quit")
}

fn read_line(prompt: &str) -> std::io::Result<Option<String>> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// CLI channel that reads from stdin and writes to stdout.
#[derive(Debug, Default)]
pub struct CliChannel {
    streamed: usize,
}

impl CliChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Channel for CliChannel {
    async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
        loop {
            let line = tokio::task::spawn_blocking(|| read_line("You: "))
                .await
                .map_err(|e| ChannelError::Other(e.to_string()))??;

            let Some(line) = line else {
                return Ok(None);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if is_exit_command(trimmed) {
                return Ok(None);
            }

            return Ok(Some(ChannelMessage {
                text: trimmed.to_owned(),
            }));
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        println!("Kestrel: {text}");
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: &str) -> Result<(), ChannelError> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{chunk}")?;
        stdout.flush()?;
        self.streamed += chunk.len();
        Ok(())
    }

    async fn flush_chunks(&mut self) -> Result<(), ChannelError> {
        if self.streamed > 0 {
            println!();
        }
        self.streamed = 0;
        Ok(())
    }

    async fn confirm(&mut self, prompt: &str) -> Result<bool, ChannelError> {
        let prompt = prompt.to_owned();
        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact_opt()
        })
        .await
        .map_err(|e| ChannelError::Other(e.to_string()))?
        .map_err(|e| {
            tracing::warn!("confirmation prompt failed: {e}");
            ChannelError::Confirm(e.to_string())
        })?;

        // Esc/q leaves no answer
        let approved = answer.unwrap_or(false);
        if !approved {
            tracing::debug!("confirmation declined");
        }
        Ok(approved)
    }
}
