//! Wire framing, reply parsing, and command formatting.
//!
//! Incoming bytes pass through two layers: [`LineFramer`] reassembles
//! CRLF-terminated lines from arbitrarily split chunks, and [`ReplyParser`]
//! folds those lines into complete [`ControlReply`] values, honoring the
//! protocol's three continuation markers (`' '` end, `'-'` more lines,
//! `'+'` data block terminated by a lone dot).

use crate::error::{is_async_code, is_success_code, ControlError, Result, StatusCode};
use std::collections::HashMap;

/// Default cap on a single protocol line, guarding against unbounded
/// buffering from a misbehaving peer.
pub const DEFAULT_MAX_LINE_LEN: usize = 16 * 1024;

/// Reassembles protocol lines from a byte stream.
///
/// `push` may be called with chunks split at any byte boundary; a trailing
/// partial line is buffered until the next call. Lines longer than the
/// configured maximum are a [`ControlError::Framing`] error.
#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    max_line_len: usize,
}

impl LineFramer {
    /// Create a framer with the given maximum line length.
    pub fn new(max_line_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line_len,
        }
    }

    /// Feed a chunk of bytes, returning every line completed by it.
    ///
    /// Line terminators (`\r\n`, tolerating bare `\n`) are stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let mut line = &self.buf[start..end];
            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }
            if line.len() > self.max_line_len {
                return Err(ControlError::Framing(format!(
                    "line of {} bytes exceeds maximum of {}",
                    line.len(),
                    self.max_line_len
                )));
            }
            let text = std::str::from_utf8(line)
                .map_err(|_| ControlError::Framing("line is not valid UTF-8".to_string()))?;
            lines.push(text.to_string());
            start = end + 1;
        }
        self.buf.drain(..start);

        if self.buf.len() > self.max_line_len {
            return Err(ControlError::Framing(format!(
                "unterminated line of {} bytes exceeds maximum of {}",
                self.buf.len(),
                self.max_line_len
            )));
        }

        Ok(lines)
    }

    /// Whether a partial line is buffered.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LEN)
    }
}

/// One line of a reply: its status code, text, and any attached data block.
#[derive(Debug, Clone)]
pub struct ReplyLine {
    /// The 3-digit status code carried by this line.
    pub code: u16,
    /// The text content after the separator.
    pub text: String,
    /// The raw data block that followed this line, if it was a `'+'` line.
    /// Dot-escapes are already undone; lines are joined with `\n`.
    pub data: Option<String>,
}

/// A complete reply, potentially spanning multiple lines.
#[derive(Debug, Clone)]
pub struct ControlReply {
    /// The status code of the reply (taken from its first line).
    pub code: u16,
    /// All lines of the reply, in arrival order.
    pub lines: Vec<ReplyLine>,
}

impl ControlReply {
    /// The status code looked up in the protocol's code table.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code)
    }

    /// Whether the reply indicates success (2xx).
    pub fn is_success(&self) -> bool {
        is_success_code(self.code)
    }

    /// Whether the reply is an asynchronous event notification (6xx).
    ///
    /// Event replies are routed to the event dispatcher and never resolve a
    /// pending command.
    pub fn is_async_event(&self) -> bool {
        is_async_code(self.code)
    }

    /// The first line's text, or `""` for a (never produced) empty reply.
    pub fn first_line(&self) -> &str {
        self.lines.first().map(|l| l.text.as_str()).unwrap_or("")
    }

    /// All line texts joined with `\n`.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The first data block in the reply, if any line carried one.
    pub fn data(&self) -> Option<&str> {
        self.lines.iter().find_map(|l| l.data.as_deref())
    }

    /// Convert into a `Result`, mapping non-2xx codes to
    /// [`ControlError::CommandRejected`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ControlError::CommandRejected {
                code: self.code,
                message: self.text(),
            })
        }
    }
}

/// Parser states: between replies, inside a multi-line reply, or inside a
/// raw data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Idle,
    InReply,
    InData,
}

/// State machine assembling framed lines into [`ControlReply`] values.
///
/// Any input the machine cannot interpret is a [`ControlError::Protocol`]
/// error; the connection must then be torn down, there is no partial
/// recovery.
#[derive(Debug)]
pub struct ReplyParser {
    state: ParserState,
    code: u16,
    lines: Vec<ReplyLine>,
    data: Vec<String>,
}

impl ReplyParser {
    /// Create a parser in the idle state.
    pub fn new() -> Self {
        Self {
            state: ParserState::Idle,
            code: 0,
            lines: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Whether the parser is between replies (no partial reply buffered).
    pub fn is_idle(&self) -> bool {
        self.state == ParserState::Idle
    }

    /// Feed one framed line; returns a reply when this line completes one.
    pub fn feed(&mut self, line: &str) -> Result<Option<ControlReply>> {
        if self.state == ParserState::InData {
            if line == "." {
                let block = self.data.join("\n");
                self.data.clear();
                // Attach to the '+' line that opened the block.
                if let Some(last) = self.lines.last_mut() {
                    last.data = Some(block);
                }
                self.state = ParserState::InReply;
            } else {
                // Undo the leading-dot escape, keep everything else verbatim.
                let line = if line.starts_with("..") { &line[1..] } else { line };
                self.data.push(line.to_string());
            }
            return Ok(None);
        }

        let (code, separator, text) = split_reply_line(line)?;

        if self.state == ParserState::InReply && code != self.code {
            return Err(ControlError::Protocol(format!(
                "status code changed mid-reply: expected {}, got {} in '{}'",
                self.code, code, line
            )));
        }
        self.code = code;
        self.lines.push(ReplyLine {
            code,
            text: text.to_string(),
            data: None,
        });

        match separator {
            ' ' => {
                let reply = ControlReply {
                    code: self.code,
                    lines: std::mem::take(&mut self.lines),
                };
                self.state = ParserState::Idle;
                Ok(Some(reply))
            }
            '-' => {
                self.state = ParserState::InReply;
                Ok(None)
            }
            '+' => {
                self.state = ParserState::InData;
                Ok(None)
            }
            _ => unreachable!("split_reply_line admits only ' ', '-', '+'"),
        }
    }
}

impl Default for ReplyParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a raw line into `(code, separator, text)`.
fn split_reply_line(line: &str) -> Result<(u16, char, &str)> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 {
        return Err(ControlError::Protocol(format!(
            "reply line too short: '{}'",
            line
        )));
    }

    if !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(ControlError::Protocol(format!(
            "invalid status code in: '{}'",
            line
        )));
    }
    let code: u16 = line[..3]
        .parse()
        .map_err(|_| ControlError::Protocol(format!("invalid status code in: '{}'", line)))?;

    let separator = bytes[3] as char;
    if !matches!(separator, ' ' | '-' | '+') {
        return Err(ControlError::Protocol(format!(
            "invalid separator '{}' in: '{}'",
            separator, line
        )));
    }

    // The first four bytes are ASCII, so index 4 is a char boundary.
    Ok((code, separator, &line[4..]))
}

/// Quote a string for use as a command argument if it needs quoting.
pub fn quote_string(s: &str) -> String {
    if s.is_empty() {
        return "\"\"".to_string();
    }

    let needs_quoting = s
        .chars()
        .any(|c| c.is_whitespace() || c == '"' || c == '\\' || !(' '..='~').contains(&c));
    if !needs_quoting {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Format a single-line command with space-separated arguments and the
/// protocol line terminator.
pub fn format_command(keyword: &str, args: &[&str]) -> String {
    let mut cmd = keyword.to_string();
    for arg in args {
        cmd.push(' ');
        cmd.push_str(arg);
    }
    cmd.push_str("\r\n");
    cmd
}

/// Format a multi-line command carrying a data body, symmetric to reply
/// data blocks: `+KEYWORD`, dot-escaped body lines, terminating `.` line.
pub fn format_command_with_data(keyword: &str, args: &[&str], data: &str) -> String {
    let mut cmd = String::from("+");
    cmd.push_str(keyword);
    for arg in args {
        cmd.push(' ');
        cmd.push_str(arg);
    }
    cmd.push_str("\r\n");

    for line in data.lines() {
        if line.starts_with('.') {
            cmd.push('.');
        }
        cmd.push_str(line);
        cmd.push_str("\r\n");
    }

    cmd.push_str(".\r\n");
    cmd
}

/// Parse `KEY=value` pairs from reply or event text. Values may be quoted
/// with backslash escapes.
pub fn parse_key_value_pairs(text: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].to_string();
        rest = &rest[eq + 1..];

        let value;
        if rest.starts_with('"') {
            let (v, r) = take_quoted_string(rest);
            value = v;
            rest = r;
        } else {
            let end = rest.find(' ').unwrap_or(rest.len());
            value = rest[..end].to_string();
            rest = &rest[end..];
        }

        pairs.insert(key, value);
        rest = rest.trim_start();
    }

    pairs
}

/// Consume a leading quoted string, undoing backslash escapes; returns the
/// decoded value and the remainder of the input.
fn take_quoted_string(s: &str) -> (String, &str) {
    debug_assert!(s.starts_with('"'));

    let mut value = String::new();
    let mut chars = s[1..].chars();
    let mut consumed = 1;

    while let Some(c) = chars.next() {
        consumed += c.len_utf8();
        match c {
            '"' => break,
            '\\' => {
                if let Some(next) = chars.next() {
                    consumed += next.len_utf8();
                    value.push(match next {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    });
                }
            }
            _ => value.push(c),
        }
    }

    (value, &s[consumed..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(parser: &mut ReplyParser, lines: &[&str]) -> Vec<ControlReply> {
        lines
            .iter()
            .filter_map(|l| parser.feed(l).unwrap())
            .collect()
    }

    #[test]
    fn framer_whole_lines() {
        let mut framer = LineFramer::default();
        let lines = framer.push(b"250 OK\r\n650 BW 1 2\r\n").unwrap();
        assert_eq!(lines, vec!["250 OK", "650 BW 1 2"]);
        assert!(!framer.has_partial());
    }

    #[test]
    fn framer_reassembles_across_any_split() {
        let stream = b"250-version=0.4.8\r\n250 OK\r\n";
        for split in 0..stream.len() {
            let mut framer = LineFramer::default();
            let mut lines = framer.push(&stream[..split]).unwrap();
            lines.extend(framer.push(&stream[split..]).unwrap());
            assert_eq!(lines, vec!["250-version=0.4.8", "250 OK"], "split at {}", split);
        }
    }

    #[test]
    fn framer_byte_at_a_time() {
        let mut framer = LineFramer::default();
        let mut lines = Vec::new();
        for b in b"250 OK\r\n" {
            lines.extend(framer.push(&[*b]).unwrap());
        }
        assert_eq!(lines, vec!["250 OK"]);
    }

    #[test]
    fn framer_buffers_partial() {
        let mut framer = LineFramer::default();
        assert!(framer.push(b"250 O").unwrap().is_empty());
        assert!(framer.has_partial());
        assert_eq!(framer.push(b"K\r\n").unwrap(), vec!["250 OK"]);
    }

    #[test]
    fn framer_rejects_oversized_line() {
        let mut framer = LineFramer::new(8);
        let err = framer.push(b"0123456789ABCDEF").unwrap_err();
        assert!(matches!(err, ControlError::Framing(_)));
    }

    #[test]
    fn single_line_reply() {
        let mut parser = ReplyParser::new();
        let replies = parse_all(&mut parser, &["250 OK"]);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code, 250);
        assert_eq!(replies[0].status(), StatusCode::Ok);
        assert_eq!(replies[0].first_line(), "OK");
        assert!(replies[0].is_success());
        assert!(parser.is_idle());
    }

    #[test]
    fn multi_line_reply() {
        let mut parser = ReplyParser::new();
        let replies = parse_all(
            &mut parser,
            &["250-version=0.4.8.12", "250-config-file=/etc/tor/torrc", "250 OK"],
        );
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].lines.len(), 3);
        assert_eq!(replies[0].lines[0].text, "version=0.4.8.12");
    }

    #[test]
    fn data_block_reply() {
        let mut parser = ReplyParser::new();
        let replies = parse_all(
            &mut parser,
            &["250+circuit-status=", "1 BUILT", "..dotted", "2 LAUNCHED", ".", "250 OK"],
        );
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0].data(),
            Some("1 BUILT\n.dotted\n2 LAUNCHED")
        );
        // The terminal line follows the data block under the same code.
        assert_eq!(replies[0].lines.last().unwrap().text, "OK");
    }

    #[test]
    fn data_block_then_more_lines() {
        let mut parser = ReplyParser::new();
        let replies = parse_all(
            &mut parser,
            &["250+a=", "body", ".", "250-b=2", "250 OK"],
        );
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].lines.len(), 3);
        assert_eq!(replies[0].lines[0].data.as_deref(), Some("body"));
    }

    #[test]
    fn async_event_reply_is_tagged() {
        let mut parser = ReplyParser::new();
        let replies = parse_all(&mut parser, &["650 CIRC 1 LAUNCHED"]);
        assert!(replies[0].is_async_event());
        assert!(!replies[0].is_success());
    }

    #[test]
    fn code_change_mid_reply_is_protocol_violation() {
        let mut parser = ReplyParser::new();
        parser.feed("250-a").unwrap();
        let err = parser.feed("251 OK").unwrap_err();
        assert!(matches!(err, ControlError::Protocol(_)));
    }

    #[test]
    fn malformed_lines_rejected() {
        let mut parser = ReplyParser::new();
        assert!(parser.feed("25").is_err());
        assert!(ReplyParser::new().feed("ABC OK").is_err());
        assert!(ReplyParser::new().feed("250/OK").is_err());
    }

    #[test]
    fn bare_status_line_with_empty_text() {
        let mut parser = ReplyParser::new();
        let replies = parse_all(&mut parser, &["250 "]);
        assert_eq!(replies[0].first_line(), "");
    }

    #[test]
    fn into_result_maps_error_codes() {
        let mut parser = ReplyParser::new();
        let reply = parse_all(&mut parser, &["552 Unrecognized option"]).remove(0);
        match reply.into_result() {
            Err(ControlError::CommandRejected { code, message }) => {
                assert_eq!(code, 552);
                assert_eq!(message, "Unrecognized option");
            }
            other => panic!("expected CommandRejected, got {:?}", other),
        }
    }

    #[test]
    fn identical_reply_regardless_of_chunking() {
        let stream = b"250+config-text=\r\nSocksPort 9050\r\n..literal\r\n.\r\n250 OK\r\n";
        let mut expected = None;
        for chunk_size in [1, 2, 3, 7, stream.len()] {
            let mut framer = LineFramer::default();
            let mut parser = ReplyParser::new();
            let mut replies = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                for line in framer.push(chunk).unwrap() {
                    if let Some(r) = parser.feed(&line).unwrap() {
                        replies.push(r);
                    }
                }
            }
            assert_eq!(replies.len(), 1);
            let got = (replies[0].code, replies[0].text(), replies[0].data().map(String::from));
            match &expected {
                None => expected = Some(got),
                Some(e) => assert_eq!(*e, got, "chunk size {}", chunk_size),
            }
        }
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_string("simple"), "simple");
        assert_eq!(quote_string(""), "\"\"");
        assert_eq!(quote_string("with space"), "\"with space\"");
        assert_eq!(quote_string("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote_string("tab\there"), "\"tab\\there\"");
    }

    #[test]
    fn command_formatting() {
        assert_eq!(format_command("SIGNAL", &["NEWNYM"]), "SIGNAL NEWNYM\r\n");
        assert_eq!(format_command("QUIT", &[]), "QUIT\r\n");
    }

    #[test]
    fn data_command_formatting() {
        let cmd = format_command_with_data("LOADCONF", &[], "SocksPort 9050\n.hidden");
        assert!(cmd.starts_with("+LOADCONF\r\n"));
        assert!(cmd.contains("SocksPort 9050\r\n"));
        assert!(cmd.contains("..hidden\r\n"));
        assert!(cmd.ends_with(".\r\n"));
    }

    #[test]
    fn key_value_pairs() {
        let kv = parse_key_value_pairs("PURPOSE=GENERAL REASON=\"timed out\" N=3");
        assert_eq!(kv.get("PURPOSE").unwrap(), "GENERAL");
        assert_eq!(kv.get("REASON").unwrap(), "timed out");
        assert_eq!(kv.get("N").unwrap(), "3");
        assert!(parse_key_value_pairs("").is_empty());
    }

    #[test]
    fn key_value_escapes() {
        let kv = parse_key_value_pairs(r#"MSG="line1\nline2" PATH="C:\\tmp""#);
        assert_eq!(kv.get("MSG").unwrap(), "line1\nline2");
        assert_eq!(kv.get("PATH").unwrap(), "C:\\tmp");
    }
}
