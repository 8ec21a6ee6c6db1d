//! Panic reporting through `tracing`.
//!
//! The hook runs on the panicking thread before unwinding, so the backtrace
//! it records points at the fault. The dispatch boundary only turns the
//! caught payload into an error result.

use std::any::Any;
use std::backtrace::Backtrace;

/// Replace the default panic hook with one that logs the panic message,
/// location, and backtrace as a single `error` event.
pub fn install_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "<unknown>".to_string());
        tracing::error!(
            panic = %message(info.payload()),
            location = %location,
            backtrace = %Backtrace::force_capture(),
            "Panic"
        );
    }));
}

/// Best-effort text of a panic payload.
pub fn message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut b) = self.0.lock() {
                b.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn payload_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(message(boxed.as_ref()), "unknown panic");
    }

    /// The hook logs where the panic was raised, not where it was caught.
    #[test]
    fn hook_logs_panic_site_and_backtrace() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();

        install_hook();
        let raised_on = line!() + 2;
        let caught = tracing::subscriber::with_default(subscriber, || {
            std::panic::catch_unwind(|| panic!("checkpoint missing"))
        });
        drop(std::panic::take_hook());

        assert!(caught.is_err());
        let out = captured.text();
        assert!(out.contains("checkpoint missing"), "{out}");
        assert!(out.contains(&format!("panic.rs:{raised_on}:")), "{out}");
        assert!(out.contains("backtrace="), "{out}");
    }
}
