//! A cosmetic progress indicator shown while waiting for the first delta.
//!
//! The animation runs on its own task.  Stopping it cancels the task through a
//! [`CancellationToken`] and erases the indicator under the same lock the task draws
//! with, so no frame can appear after [`Spinner::stop`] returns.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];
const FRAME_INTERVAL: Duration = Duration::from_millis(80);

struct Canvas {
    writer: Box<dyn Write + Send>,
    active: bool,
    drawn: bool,
}

/// A running progress indicator.
pub struct Spinner {
    cancel: CancellationToken,
    canvas: Arc<Mutex<Canvas>>,
    label: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Starts a spinner on stdout.
    pub fn start(label: &'static str) -> Self {
        Self::start_with(io::stdout(), label)
    }

    /// Starts a spinner drawing to `writer`.
    ///
    /// Outside a tokio runtime the spinner is inert.
    pub fn start_with<W: Write + Send + 'static>(writer: W, label: &'static str) -> Self {
        let cancel = CancellationToken::new();
        let canvas = Arc::new(Mutex::new(Canvas {
            writer: Box::new(writer),
            active: true,
            drawn: false,
        }));
        let handle = tokio::runtime::Handle::try_current()
            .ok()
            .map(|runtime| runtime.spawn(animate(canvas.clone(), cancel.clone(), label)));
        Self {
            cancel,
            canvas,
            label,
            handle,
        }
    }

    /// Stops the animation and erases the indicator.  Idempotent.
    pub fn stop(&mut self) {
        {
            let mut canvas = self.canvas.lock().unwrap_or_else(|e| e.into_inner());
            if canvas.active {
                canvas.active = false;
                if canvas.drawn {
                    let blank = " ".repeat(self.label.chars().count() + 3);
                    let _ = write!(canvas.writer, "\r{blank}\r");
                    let _ = canvas.writer.flush();
                }
            }
        }
        self.cancel.cancel();
        self.handle.take();
    }

    /// Returns true until [`Spinner::stop`] is called.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn animate(canvas: Arc<Mutex<Canvas>>, cancel: CancellationToken, label: &'static str) {
    for frame in FRAMES.iter().cycle() {
        {
            let mut canvas = canvas.lock().unwrap_or_else(|e| e.into_inner());
            if !canvas.active {
                return;
            }
            let _ = write!(canvas.writer, "\r{frame} {label}");
            let _ = canvas.writer.flush();
            canvas.drawn = true;
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(FRAME_INTERVAL) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn draws_until_stopped_then_erases() {
        let buffer = SharedBuffer::default();
        let mut spinner = Spinner::start_with(buffer.clone(), "Loading");
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(spinner.is_running());
        spinner.stop();
        assert!(!spinner.is_running());

        let drawn = buffer.contents();
        assert!(drawn.starts_with("\r⣾ Loading"));
        assert!(drawn.contains("⣽ Loading"));
        assert!(drawn.ends_with("\r          \r"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(buffer.contents(), drawn);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let buffer = SharedBuffer::default();
        let mut spinner = Spinner::start_with(buffer.clone(), "Loading");
        tokio::time::sleep(Duration::from_millis(10)).await;
        spinner.stop();
        let after_first = buffer.contents();
        spinner.stop();
        drop(spinner);
        assert_eq!(buffer.contents(), after_first);
    }

    #[test]
    fn inert_without_runtime() {
        let buffer = SharedBuffer::default();
        let mut spinner = Spinner::start_with(buffer.clone(), "Loading");
        spinner.stop();
        assert!(buffer.contents().is_empty());
    }
}
