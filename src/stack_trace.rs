//! Best-effort reconstruction of server-side exception chains.
//!
//! Servers running in debug mode attach a JVM-style stack trace to error
//! responses. [`parse_remote_exception`] turns that text back into a chain of
//! [`RemoteException`]s. The parser never fails loudly: anything it does not
//! understand yields `None`, and the caller carries on without a cause.

use std::fmt;

/// One `at ...` line of a remote stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Fully qualified declaring class
    pub class_name: String,
    /// Method name
    pub method: String,
    /// Source file, when the frame carried one
    pub file: Option<String>,
    /// Line number, when the frame carried one
    pub line: Option<u32>,
}

/// An exception reconstructed from a remote stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteException {
    /// Fully qualified exception class, e.g. `java.lang.IllegalStateException`
    pub class_name: String,
    /// Exception message
    pub message: Option<String>,
    /// Frames, innermost first
    pub frames: Vec<StackFrame>,
    /// The exception this one was caused by
    pub cause: Option<Box<RemoteException>>,
}

impl fmt::Display for RemoteException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => write!(f, "{}", self.class_name),
        }
    }
}

impl std::error::Error for RemoteException {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

const CAUSED_BY: &str = "Caused by:";
const SUPPRESSED: &str = "Suppressed:";

/// Parses a JVM-style stack trace into an exception chain.
///
/// ```
/// use mqm_rest::stack_trace::parse_remote_exception;
///
/// let trace = "java.lang.RuntimeException: outer\n\
///              \tat com.example.A.run(A.java:10)\n\
///              Caused by: java.io.IOException: inner\n\
///              \tat com.example.B.read(B.java:20)\n\
///              \t... 1 more";
/// let parsed = parse_remote_exception(trace).unwrap();
/// assert_eq!(parsed.class_name, "java.lang.RuntimeException");
/// assert_eq!(parsed.cause.unwrap().message.as_deref(), Some("inner"));
/// ```
pub fn parse_remote_exception(trace: &str) -> Option<RemoteException> {
    let mut chain: Vec<RemoteException> = Vec::new();
    // indentation of the `Suppressed:` line whose block is being skipped
    let mut suppressed_at: Option<usize> = None;

    for raw in trace.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        // a suppressed block, including its own causes, is indented at least
        // as deep as its header
        let indent = raw.len() - raw.trim_start().len();
        if let Some(depth) = suppressed_at {
            if indent >= depth {
                continue;
            }
            suppressed_at = None;
        }

        if let Some(rest) = line.strip_prefix(CAUSED_BY) {
            chain.push(parse_header(rest.trim())?);
        } else if line.starts_with(SUPPRESSED) {
            suppressed_at = Some(indent);
        } else if let Some(frame) = line.strip_prefix("at ") {
            chain.last_mut()?.frames.push(parse_frame(frame)?);
        } else if line.starts_with("...") {
            continue;
        } else if let Some(current) = chain.last_mut() {
            // multi-line message, only valid before the first frame
            if !current.frames.is_empty() {
                return None;
            }
            let message = current.message.get_or_insert_with(String::new);
            message.push('\n');
            message.push_str(line);
        } else {
            chain.push(parse_header(line)?);
        }
    }

    let mut cause: Option<Box<RemoteException>> = None;
    while let Some(mut exception) = chain.pop() {
        exception.cause = cause;
        cause = Some(Box::new(exception));
    }
    cause.map(|e| *e)
}

fn parse_header(line: &str) -> Option<RemoteException> {
    let (class_name, message) = match line.split_once(':') {
        Some((class_name, message)) => (class_name.trim(), Some(message.trim())),
        None => (line, None),
    };
    if !is_qualified_name(class_name) {
        return None;
    }
    Some(RemoteException {
        class_name: class_name.to_string(),
        message: message.filter(|m| !m.is_empty()).map(str::to_string),
        frames: Vec::new(),
        cause: None,
    })
}

/// Parses `com.example.Type.method(Type.java:42)`.
fn parse_frame(frame: &str) -> Option<StackFrame> {
    let (qualified, location) = frame.split_once('(')?;
    let location = location.strip_suffix(')')?;
    let (class_name, method) = qualified.rsplit_once('.')?;
    if class_name.is_empty() || method.is_empty() {
        return None;
    }

    let (file, line) = match location.rsplit_once(':') {
        Some((file, line)) => (Some(file.to_string()), line.parse().ok()),
        // "Native Method", "Unknown Source"
        None => (None, None),
    };

    Some(StackFrame {
        class_name: class_name.to_string(),
        method: method.to_string(),
        file,
        line,
    })
}

fn is_qualified_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        })
}
