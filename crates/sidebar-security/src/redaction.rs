use std::sync::LazyLock;
use tracing_subscriber::fmt::MakeWriter;

const REDACTED: &str = "[REDACTED]";

/// A writer that redacts provider credentials from log output.
pub struct RedactingWriter<W> {
    inner: W,
}

impl<W> RedactingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl RedactingWriter<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: std::io::Write> std::io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let original = String::from_utf8_lossy(buf);
        let redacted = redact_secrets(&original);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<'a> MakeWriter<'a> for RedactingWriter<std::io::Stderr> {
    type Writer = RedactingWriter<std::io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::stderr()
    }
}

/// Replace Gemini, Anthropic and OpenAI keys, bearer tokens and `key=` query
/// parameters with `[REDACTED]`.
pub fn redact_secrets(input: &str) -> String {
    static PATTERNS: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(
            r"(?x)
              AIza[0-9A-Za-z_\-]{20,}                  # Google API keys
            | sk-ant-[0-9A-Za-z_\-]{10,}               # Anthropic API keys
            | sk-[0-9A-Za-z_\-]{20,}                   # OpenAI-style keys
            | (?P<bearer>Bearer\s+)[A-Za-z0-9._~+/\-]{16,}=*
            | (?P<query>[?&]key=)[^&\s\x22]{8,}
            ",
        )
        .expect("redaction regex should compile")
    });

    PATTERNS
        .replace_all(input, format!("${{bearer}}${{query}}{REDACTED}").as_str())
        .into_owned()
}

/// Short, non-reversible rendering of a credential for display.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.trim().chars().collect();
    if chars.len() < 12 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
