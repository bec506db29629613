//! Console output service.
//!
//! While the candidate is typing, messages from other tasks are held back
//! and flushed once the input completes, so they never interleave with the
//! prompt line.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use interview_types::{InterviewError, Result};

enum Sink {
    Stdout,
    Captured(Mutex<Vec<String>>),
}

#[derive(Default)]
struct State {
    input_active: bool,
    pending: Vec<String>,
}

struct Inner {
    sink: Sink,
    state: Mutex<State>,
}

#[derive(Clone)]
pub struct Console {
    inner: Arc<Inner>,
}

impl Console {
    pub fn stdout() -> Self {
        Self::with_sink(Sink::Stdout)
    }

    /// A console that records lines instead of printing them.
    pub fn captured() -> Self {
        Self::with_sink(Sink::Captured(Mutex::new(Vec::new())))
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                state: Mutex::new(State::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self, message: impl Into<String>) {
        let message = message.into();
        let mut state = self.state();
        if state.input_active {
            state.pending.push(message);
        } else {
            drop(state);
            self.emit(&message);
        }
    }

    fn emit(&self, message: &str) {
        match &self.inner.sink {
            Sink::Stdout => println!("{message}"),
            Sink::Captured(lines) => lines
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(message.to_string()),
        }
    }

    /// Mark input as active until the returned guard is dropped.
    pub fn input_scope(&self) -> InputScope {
        self.state().input_active = true;
        InputScope {
            console: self.clone(),
        }
    }

    /// Show `prompt` and read one line from stdin on a blocking worker.
    /// End of input is reported as an `UnexpectedEof` IO error.
    pub async fn read_line(&self, prompt: &str) -> Result<String> {
        let _scope = self.input_scope();
        match &self.inner.sink {
            Sink::Stdout => {
                let mut out = std::io::stdout();
                write!(out, "{prompt}")?;
                out.flush()?;
            }
            Sink::Captured(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "captured console has no input",
                )
                .into())
            }
        }

        let line = tokio::task::spawn_blocking(|| -> std::io::Result<String> {
            let mut line = String::new();
            let read = std::io::stdin().read_line(&mut line)?;
            if read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stdin closed",
                ));
            }
            Ok(line)
        })
        .await
        .map_err(|e| InterviewError::Other(format!("input task failed: {e}")))??;

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Lines recorded by a captured console; empty for stdout.
    pub fn captured_lines(&self) -> Vec<String> {
        match &self.inner.sink {
            Sink::Stdout => Vec::new(),
            Sink::Captured(lines) => lines.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}

/// Guard returned by [`Console::input_scope`]. Dropping it flushes the
/// messages held back during input.
pub struct InputScope {
    console: Console,
}

impl Drop for InputScope {
    fn drop(&mut self) {
        let pending = {
            let mut state = self.console.state();
            state.input_active = false;
            std::mem::take(&mut state.pending)
        };
        for message in pending {
            self.console.emit(&message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_recorded() {
        let console = Console::captured();
        console.write("hello");
        console.write(String::from("world"));
        assert_eq!(console.captured_lines(), vec!["hello", "world"]);
    }

    #[test]
    fn writes_during_input_are_buffered_until_scope_ends() {
        let console = Console::captured();
        let scope = console.input_scope();
        console.clone().write("background: docs loaded");
        assert!(console.captured_lines().is_empty());
        drop(scope);
        assert_eq!(console.captured_lines(), vec!["background: docs loaded"]);
    }

    #[tokio::test]
    async fn captured_console_has_no_input() {
        let console = Console::captured();
        let err = console.read_line("> ").await.unwrap_err();
        assert!(matches!(err, InterviewError::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
        console.write("after");
        assert_eq!(console.captured_lines(), vec!["after"]);
    }
}
