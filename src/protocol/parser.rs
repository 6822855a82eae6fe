//! Request parsing and response rendering.

use bytes::BytesMut;

use crate::solver::Solution;

/// Parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// A digit-product query.
    Query(i64),
    /// End-of-session token.
    Exit,
    /// Anything that is neither an integer literal nor `exit`.
    Invalid,
}

/// Farewell line sent in response to `exit`.
pub const GOODBYE: &str = "Goodbye!";

const NO_SOLUTION: &str = "NO_SOLUTION";
const ERR_NOT_POSITIVE: &str = "ERROR: Number must be positive";
const ERR_INVALID: &str = "ERROR: Please enter a valid positive integer";

/// Parse one request line (case-insensitive `exit`, or a signed decimal
/// integer). `line` must already have its terminator stripped.
pub fn parse(line: &str) -> Request {
    if line.eq_ignore_ascii_case("exit") {
        return Request::Exit;
    }
    match line.parse::<i64>() {
        Ok(n) => Request::Query(n),
        Err(_) => Request::Invalid,
    }
}

/// Render the response line for a solver outcome.
pub fn render_solution(solution: &Solution) -> BytesMut {
    match solution {
        Solution::Digits(digits) => render_line(digits),
        Solution::NoSolution => render_line(NO_SOLUTION),
        Solution::InvalidInput(_) => render_line(ERR_NOT_POSITIVE),
    }
}

/// Render the response line for an unparseable request.
pub fn render_invalid() -> BytesMut {
    render_line(ERR_INVALID)
}

/// Render the farewell line.
pub fn render_goodbye() -> BytesMut {
    render_line(GOODBYE)
}

fn render_line(text: &str) -> BytesMut {
    let mut out = BytesMut::with_capacity(text.len() + 1);
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(b"\n");
    out
}
