//! Loading a session from disk.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::SessionError;
use crate::format;
use crate::state::{SESSION_ID_PROPERTY, SessionState};

/// Loads the session stored at `path` and stamps it with `session_id`.
///
/// The file may hold either format; the JSON document is tried first. A file
/// that is missing or empty yields a fresh session. A non-empty file that
/// parses as neither format, or whose root is not a session, is an
/// [`SessionError::Unreadable`] error: the caller must not go on to save
/// over it.
pub fn load_session(path: &Path, session_id: &str) -> Result<SessionState, SessionError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(SessionError::read_file(path, e)),
    };

    let mut state = if bytes.is_empty() {
        tracing::info!(path = %path.display(), "no session on disk, starting a new one");
        SessionState::new_session()
    } else {
        match format::decode(&bytes) {
            Ok((state, stored_as)) if state.is_session() => {
                tracing::info!(
                    path = %path.display(),
                    format = %stored_as,
                    nodes = state.node_count(),
                    "session loaded"
                );
                state
            }
            Ok((state, _)) => {
                tracing::error!(path = %path.display(), kind = %state.kind, "file root is not a session");
                return Err(SessionError::Unreadable(path.to_path_buf()));
            }
            Err(reason) => {
                tracing::error!(path = %path.display(), "session file is unreadable: {reason}");
                return Err(SessionError::Unreadable(path.to_path_buf()));
            }
        }
    };

    state.set_property(SESSION_ID_PROPERTY, session_id);
    Ok(state)
}
