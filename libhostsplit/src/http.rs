//! Incremental-free HTTP/1.x request head parser.
//!
//! One buffer in, one verdict out: the parser walks the bytes of a
//! request head with an explicit state machine and records where the
//! interesting pieces live instead of copying them. A buffer that ends
//! mid-head is `Incomplete`, a protocol violation is `Malformed`, and
//! both are treated as "not an HTTP request" by callers.

/// Byte range inside the parsed buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    pub fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start..self.start + self.len]
    }
}

/// Parsed request head, all fields as spans over the input buffer
#[derive(Debug, Clone, Default)]
pub struct HttpRequestInfo {
    pub method: Span,
    pub uri: Span,
    pub version_major: u32,
    pub version_minor: u32,
    /// Header (name, value) spans in order of appearance
    pub headers: Vec<(Span, Span)>,
}

impl HttpRequestInfo {
    /// Resolve a header by name.
    ///
    /// The comparison is byte-exact and case-sensitive: `Host` and `host`
    /// are different names here. Lookups follow the literal spelling a
    /// well-behaved client sends.
    pub fn header<'a>(&self, buf: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
        self.headers
            .iter()
            .find(|(n, _)| n.slice(buf) == name)
            .map(|(_, v)| v.slice(buf))
    }
}

/// Outcome of parsing one buffer
#[derive(Debug)]
pub enum ParseResult {
    Complete(HttpRequestInfo),
    Incomplete,
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    MethodStart,
    Method,
    Uri,
    VersionH,
    VersionT1,
    VersionT2,
    VersionP,
    VersionSlash,
    VersionMajorStart,
    VersionMajor,
    VersionMinorStart,
    VersionMinor,
    NewLine1,
    HeaderLineStart,
    HeaderLws,
    HeaderName,
    SpaceBeforeHeaderValue,
    HeaderValue,
    NewLine2,
    NewLine3,
}

fn is_char(b: u8) -> bool {
    b <= 127
}

fn is_ctl(b: u8) -> bool {
    b <= 31 || b == 127
}

fn is_tspecial(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')'
            | b'<'
            | b'>'
            | b'@'
            | b','
            | b';'
            | b':'
            | b'\\'
            | b'"'
            | b'/'
            | b'['
            | b']'
            | b'?'
            | b'='
            | b'{'
            | b'}'
            | b' '
            | b'\t'
    )
}

fn is_token_char(b: u8) -> bool {
    is_char(b) && !is_ctl(b) && !is_tspecial(b)
}

/// Parse one request head from the start of `buf`.
///
/// Trailing bytes after the head (the body) are ignored. A folded header
/// continuation extends the previous value span across the line break,
/// so the resulting value contains the raw fold bytes; folding before
/// the first header is malformed.
pub fn parse_request(buf: &[u8]) -> ParseResult {
    let mut state = State::MethodStart;
    let mut info = HttpRequestInfo::default();
    let mut mark = 0usize; // start of the span under construction

    for (i, &b) in buf.iter().enumerate() {
        match state {
            State::MethodStart => {
                if !is_token_char(b) {
                    return ParseResult::Malformed;
                }
                mark = i;
                state = State::Method;
            }
            State::Method => {
                if b == b' ' {
                    info.method = Span { start: mark, len: i - mark };
                    state = State::Uri;
                    mark = i + 1;
                } else if !is_token_char(b) {
                    return ParseResult::Malformed;
                }
            }
            State::Uri => {
                if b == b' ' {
                    info.uri = Span { start: mark, len: i - mark };
                    state = State::VersionH;
                } else if is_ctl(b) {
                    return ParseResult::Malformed;
                }
            }
            State::VersionH => {
                if b != b'H' {
                    return ParseResult::Malformed;
                }
                state = State::VersionT1;
            }
            State::VersionT1 => {
                if b != b'T' {
                    return ParseResult::Malformed;
                }
                state = State::VersionT2;
            }
            State::VersionT2 => {
                if b != b'T' {
                    return ParseResult::Malformed;
                }
                state = State::VersionP;
            }
            State::VersionP => {
                if b != b'P' {
                    return ParseResult::Malformed;
                }
                state = State::VersionSlash;
            }
            State::VersionSlash => {
                if b != b'/' {
                    return ParseResult::Malformed;
                }
                state = State::VersionMajorStart;
            }
            State::VersionMajorStart => {
                if !b.is_ascii_digit() {
                    return ParseResult::Malformed;
                }
                info.version_major = u32::from(b - b'0');
                state = State::VersionMajor;
            }
            State::VersionMajor => {
                if b == b'.' {
                    state = State::VersionMinorStart;
                } else if b.is_ascii_digit() {
                    info.version_major =
                        info.version_major.wrapping_mul(10).wrapping_add(u32::from(b - b'0'));
                } else {
                    return ParseResult::Malformed;
                }
            }
            State::VersionMinorStart => {
                if !b.is_ascii_digit() {
                    return ParseResult::Malformed;
                }
                info.version_minor = u32::from(b - b'0');
                state = State::VersionMinor;
            }
            State::VersionMinor => {
                if b == b'\r' {
                    state = State::NewLine1;
                } else if b.is_ascii_digit() {
                    info.version_minor =
                        info.version_minor.wrapping_mul(10).wrapping_add(u32::from(b - b'0'));
                } else {
                    return ParseResult::Malformed;
                }
            }
            State::NewLine1 => {
                if b != b'\n' {
                    return ParseResult::Malformed;
                }
                state = State::HeaderLineStart;
            }
            State::HeaderLineStart => {
                if b == b'\r' {
                    state = State::NewLine3;
                } else if (b == b' ' || b == b'\t') && !info.headers.is_empty() {
                    state = State::HeaderLws;
                } else if is_token_char(b) {
                    mark = i;
                    state = State::HeaderName;
                } else {
                    return ParseResult::Malformed;
                }
            }
            State::HeaderLws => {
                if b == b'\r' {
                    state = State::NewLine2;
                } else if b == b' ' || b == b'\t' {
                    // keep eating leading whitespace
                } else if is_ctl(b) {
                    return ParseResult::Malformed;
                } else {
                    // the continuation extends the previous value span
                    // across the break; consumers see the raw fold bytes
                    if let Some((_, value)) = info.headers.last_mut() {
                        value.len = i + 1 - value.start;
                    }
                    state = State::HeaderValue;
                }
            }
            State::HeaderName => {
                if b == b':' {
                    info.headers.push((Span { start: mark, len: i - mark }, Span::default()));
                    state = State::SpaceBeforeHeaderValue;
                } else if !is_token_char(b) {
                    return ParseResult::Malformed;
                }
            }
            State::SpaceBeforeHeaderValue => {
                if b != b' ' {
                    return ParseResult::Malformed;
                }
                mark = i + 1;
                state = State::HeaderValue;
            }
            State::HeaderValue => {
                if b == b'\r' {
                    if let Some((_, value)) = info.headers.last_mut() {
                        // an untouched span means this is the first line of
                        // the value; a folded value is already anchored
                        if *value == Span::default() {
                            *value = Span { start: mark, len: i - mark };
                        } else {
                            value.len = i - value.start;
                        }
                    }
                    state = State::NewLine2;
                } else if is_ctl(b) {
                    return ParseResult::Malformed;
                }
            }
            State::NewLine2 => {
                if b != b'\n' {
                    return ParseResult::Malformed;
                }
                state = State::HeaderLineStart;
            }
            State::NewLine3 => {
                if b != b'\n' {
                    return ParseResult::Malformed;
                }
                return ParseResult::Complete(info);
            }
        }
    }
    ParseResult::Incomplete
}
