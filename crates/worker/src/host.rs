//! Line-oriented job host: one JSON job per input line, one JSON result per
//! output line.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use sdrelay_core::job::DispatchResult;

use crate::dispatcher::Dispatcher;

/// Dispatch every job read from `reader` sequentially and write each result
/// to `writer`. Blank lines are skipped. Returns the number of results
/// written once the reader reaches EOF.
pub async fn serve<R, W>(dispatcher: &Dispatcher, reader: R, mut writer: W) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<Value>(line) {
            Ok(document) => dispatcher.dispatch(&document).await,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed job document");
                DispatchResult::error(format!("Malformed job document: {e}"))
            }
        };

        let mut encoded = result.to_json().to_string();
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
        writer.flush().await?;
        handled += 1;
    }

    Ok(handled)
}
