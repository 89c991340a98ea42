//! On-disk encodings of a session.
//!
//! - **Document**: pretty-printed JSON. Complete and human-readable; used for
//!   real saves.
//! - **Snapshot**: magic-prefixed bincode. Compact and fast; used for the
//!   background temp-file autosave.
//!
//! Readers try the document first and fall back to the snapshot.

use std::fmt;
use std::fs;
use std::path::Path;

use bincode::Options;

use crate::error::SessionError;
use crate::state::SessionState;

/// Prefix of every binary snapshot.
pub const SNAPSHOT_MAGIC: &[u8; 8] = b"TNDMSNAP";

/// Snapshot layout version following the magic.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Upper bound on a decoded snapshot, guards against corrupt length fields.
const SNAPSHOT_LIMIT: u64 = 256 * 1024 * 1024;

/// Encoding of a session file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionFormat {
    /// Pretty JSON document.
    Document,
    /// Compact binary snapshot.
    Snapshot,
}

impl fmt::Display for SessionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "JSON document"),
            Self::Snapshot => write!(f, "binary snapshot"),
        }
    }
}

fn snapshot_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(SNAPSHOT_LIMIT)
}

/// Serializes `state` in the given format.
pub fn encode(state: &SessionState, format: SessionFormat) -> Result<Vec<u8>, SessionError> {
    match format {
        SessionFormat::Document => {
            let mut bytes =
                serde_json::to_vec_pretty(state).map_err(|e| SessionError::encode(format, e))?;
            bytes.push(b'\n');
            Ok(bytes)
        }
        SessionFormat::Snapshot => {
            let body = snapshot_options()
                .serialize(state)
                .map_err(|e| SessionError::encode(format, e))?;
            let mut bytes = Vec::with_capacity(SNAPSHOT_MAGIC.len() + 1 + body.len());
            bytes.extend_from_slice(SNAPSHOT_MAGIC);
            bytes.push(SNAPSHOT_VERSION);
            bytes.extend_from_slice(&body);
            Ok(bytes)
        }
    }
}

/// Parses a JSON document.
pub fn decode_document(bytes: &[u8]) -> Result<SessionState, String> {
    serde_json::from_slice(bytes).map_err(|e| e.to_string())
}

/// Parses a binary snapshot. The root must be a session.
pub fn decode_snapshot(bytes: &[u8]) -> Result<SessionState, String> {
    let body = bytes
        .strip_prefix(SNAPSHOT_MAGIC.as_slice())
        .ok_or_else(|| "missing snapshot header".to_string())?;
    let (&version, body) = body
        .split_first()
        .ok_or_else(|| "truncated snapshot header".to_string())?;
    if version != SNAPSHOT_VERSION {
        return Err(format!("unsupported snapshot version {version}"));
    }
    let state: SessionState = snapshot_options()
        .deserialize(body)
        .map_err(|e| e.to_string())?;
    if !state.is_session() {
        return Err(format!("snapshot root is '{}', not a session", state.kind));
    }
    Ok(state)
}

/// Parses either format, document first. Returns the state and the format it
/// was stored in.
pub fn decode(bytes: &[u8]) -> Result<(SessionState, SessionFormat), String> {
    match decode_document(bytes) {
        Ok(state) => Ok((state, SessionFormat::Document)),
        Err(doc_err) => match decode_snapshot(bytes) {
            Ok(state) => Ok((state, SessionFormat::Snapshot)),
            Err(snap_err) => Err(format!("not a document ({doc_err}); not a snapshot ({snap_err})")),
        },
    }
}

/// Reads and parses a session file in either format.
pub fn read_file(path: &Path) -> Result<(SessionState, SessionFormat), SessionError> {
    let bytes = fs::read(path).map_err(|e| SessionError::read_file(path, e))?;
    decode(&bytes).map_err(|reason| SessionError::Decode {
        path: path.to_path_buf(),
        reason,
    })
}

/// Encodes `state` and writes it to `path`, replacing any existing file.
pub fn write_file(
    state: &SessionState,
    path: &Path,
    format: SessionFormat,
) -> Result<(), SessionError> {
    let bytes = encode(state, format)?;
    fs::write(path, bytes).map_err(|e| SessionError::write_file(path, e))
}
