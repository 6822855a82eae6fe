//! Per-connection session loop.

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use super::parser::{self, Request};
use crate::solver;

const MAX_LINE_LENGTH: usize = 1024;

/// Serve one client session until EOF, `exit`, or an I/O error.
///
/// Every request line is answered with exactly one response line, flushed
/// immediately. Parse failures and negative queries are answered in-line
/// and keep the session open; only I/O faults end the session early. The
/// stream is dropped, closing the socket, on every exit path.
pub async fn handle_connection<S>(
    stream: S,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = String::with_capacity(MAX_LINE_LENGTH);

    loop {
        line.clear();

        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            // EOF: the peer left without `exit`, no farewell is owed.
            break;
        }

        let trimmed = line.trim_end();
        trace!(request = trimmed, "Processing request");

        let response: BytesMut = match parser::parse(trimmed) {
            Request::Exit => {
                writer.write_all(&parser::render_goodbye()).await?;
                writer.flush().await?;
                break;
            }
            Request::Query(n) => parser::render_solution(&solver::solve(n)),
            Request::Invalid => parser::render_invalid(),
        };

        writer.write_all(&response).await?;
        writer.flush().await?;
    }

    Ok(())
}
