//! Session: an authenticated connection scope to an engine
//!
//! A `Session` owns its connection handle. Tables borrow the session, so
//! the borrow checker keeps every table inside the session's lifetime.
//! Dropping the session logs out, which releases the connection's locks
//! and table handles on the engine side.

use crate::config::{SessionConfig, SessionMode};
use crate::engine::{ConnectionHandle, Credentials, Engine, LockMode, TableLocation};
use crate::error::{CtdbError, Result};
use crate::types::DateFormat;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Default)]
struct SessionState {
    connection: Option<ConnectionHandle>,
    endpoint: Option<String>,
    username: Option<String>,
    password: Option<String>,
    path_prefix: Option<String>,
    lock_mode: Option<LockMode>,
}

pub struct Session {
    engine: Arc<dyn Engine>,
    config: SessionConfig,
    date_format: RwLock<DateFormat>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Session over `engine` with default settings for `mode`
    pub fn new(engine: Arc<dyn Engine>, mode: SessionMode) -> Self {
        Self::with_config(engine, SessionConfig::new(mode))
    }

    pub fn with_config(engine: Arc<dyn Engine>, config: SessionConfig) -> Self {
        Self {
            engine,
            date_format: RwLock::new(config.default_date_format),
            config,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Connect to the engine endpoint named `engine`
    ///
    /// Fails with `InvalidArgument` for an empty engine name (before any
    /// connection attempt) and when the session is already logged on;
    /// log out first to switch endpoints or users. Engine refusals surface
    /// as `Connection` errors and leave the session inactive.
    pub fn logon(&self, engine: &str, user: &str, password: &str) -> Result<()> {
        if engine.is_empty() {
            return Err(CtdbError::InvalidArgument(
                "engine name is required".to_string(),
            ));
        }

        let mut state = self.state.write();
        if state.connection.is_some() {
            return Err(CtdbError::InvalidArgument(format!(
                "session is already logged on to '{}'",
                state.endpoint.as_deref().unwrap_or_default()
            )));
        }

        let conn = self
            .engine
            .connect(engine, &Credentials::new(user, password))?;

        state.connection = Some(conn);
        state.endpoint = Some(engine.to_string());
        state.username = Some(user.to_string());
        state.password = Some(password.to_string());
        state.lock_mode = None;

        info!(engine, user, mode = ?self.config.mode, "session logged on");
        Ok(())
    }

    /// Disconnect; a no-op when already inactive
    pub fn logout(&self) -> Result<()> {
        let conn = {
            let mut state = self.state.write();
            state.lock_mode = None;
            state.connection.take()
        };

        if let Some(conn) = conn {
            self.engine.disconnect(conn)?;
            info!(conn = conn.0, "session logged out");
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state.read().connection.is_some()
    }

    /// Acquire a session lock; `false` when the engine refuses it
    pub fn lock(&self, mode: LockMode) -> bool {
        match self.lock_or_err(mode) {
            Ok(()) => true,
            Err(err) => {
                debug!(mode = mode.name(), %err, "session lock failed");
                false
            }
        }
    }

    /// Acquire a session lock, failing with `LockConflict` naming the holder
    ///
    /// `LockMode::Free` releases instead.
    pub fn lock_or_err(&self, mode: LockMode) -> Result<()> {
        let conn = self.connection()?;
        self.engine.lock(conn, mode, self.lock_timeout())?;

        self.state.write().lock_mode = match mode {
            LockMode::Free => None,
            held => Some(held),
        };
        Ok(())
    }

    /// Release every lock this session holds; `false` on engine failure
    pub fn unlock(&self) -> bool {
        match self.unlock_or_err() {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "session unlock failed");
                false
            }
        }
    }

    /// Release every lock this session holds; succeeds when nothing is held
    pub fn unlock_or_err(&self) -> Result<()> {
        let Some(conn) = self.state.read().connection else {
            return Ok(());
        };
        self.engine.unlock(conn)?;
        self.state.write().lock_mode = None;
        Ok(())
    }

    /// Whether this session currently owns a session lock
    pub fn is_locked(&self) -> bool {
        match self.state.read().connection {
            Some(conn) => self.engine.is_locked(conn),
            None => false,
        }
    }

    /// Mode of the lock last acquired by this session
    pub fn lock_mode(&self) -> Option<LockMode> {
        self.state.read().lock_mode
    }

    pub fn path_prefix(&self) -> Option<String> {
        self.state.read().path_prefix.clone()
    }

    /// Set the directory prefix for table paths; an empty string unsets it
    pub fn set_path_prefix(&self, prefix: &str) {
        self.state.write().path_prefix = if prefix.is_empty() {
            None
        } else {
            Some(prefix.to_string())
        };
    }

    pub fn clear_path_prefix(&self) {
        self.state.write().path_prefix = None;
    }

    /// User name of the current logon
    pub fn username(&self) -> Option<String> {
        self.state.read().username.clone()
    }

    pub fn password(&self) -> Option<String> {
        self.state.read().password.clone()
    }

    /// Endpoint name of the current logon
    pub fn endpoint(&self) -> Option<String> {
        self.state.read().endpoint.clone()
    }

    pub fn mode(&self) -> SessionMode {
        self.config.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Layout used when DATE fields are read or written as strings
    pub fn default_date_format(&self) -> DateFormat {
        *self.date_format.read()
    }

    pub fn set_default_date_format(&self, format: DateFormat) {
        *self.date_format.write() = format;
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub(crate) fn connection(&self) -> Result<ConnectionHandle> {
        self.state
            .read()
            .connection
            .ok_or_else(|| CtdbError::NotOpen("session is not active".to_string()))
    }

    pub(crate) fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.config.lock_timeout_ms)
    }

    /// Directory for a table: prefix joined with the table path
    ///
    /// An absolute table path replaces the prefix. With neither set the
    /// directory is empty and the engine applies its own default.
    pub(crate) fn resolve_location(&self, table_path: Option<&str>, name: &str) -> TableLocation {
        let prefix = self.state.read().path_prefix.clone();
        let dir = match (prefix, table_path) {
            (Some(prefix), Some(path)) => PathBuf::from(prefix).join(path),
            (Some(prefix), None) => PathBuf::from(prefix),
            (None, Some(path)) => PathBuf::from(path),
            (None, None) => PathBuf::new(),
        };
        TableLocation::new(dir, name)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.logout() {
            warn!(%err, "logout on drop failed");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("engine", &self.engine.name())
            .field("mode", &self.config.mode)
            .field("connection", &state.connection)
            .field("username", &state.username)
            .field("path_prefix", &state.path_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::LocalEngine;
    use std::path::Path;

    fn engine() -> (tempfile::TempDir, Arc<LocalEngine>) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(LocalEngine::new(EngineConfig::for_testing(dir.path())));
        (dir, engine)
    }

    #[test]
    fn test_active_follows_logon_and_logout() {
        let (_dir, engine) = engine();
        let session = Session::new(engine.clone(), SessionMode::Ctree);

        assert!(!session.is_active());
        session.logon("FAIRCOMS", "", "").unwrap();
        assert!(session.is_active());
        assert_eq!(session.username().as_deref(), Some(""));
        assert_eq!(session.endpoint().as_deref(), Some("FAIRCOMS"));

        session.logout().unwrap();
        assert!(!session.is_active());
        session.logout().unwrap();
        assert!(!session.is_active());
        assert_eq!(engine.connection_count(), 0);
    }

    #[test]
    fn test_empty_engine_name_fails_before_connecting() {
        let (_dir, engine) = engine();
        let session = Session::new(engine.clone(), SessionMode::Ctdb);

        assert!(matches!(
            session.logon("", "admin", "pw"),
            Err(CtdbError::InvalidArgument(_))
        ));
        assert!(!session.is_active());
        assert_eq!(engine.connection_count(), 0);
    }

    #[test]
    fn test_connection_failure_leaves_session_inactive() {
        let (_dir, engine) = engine();
        let session = Session::new(engine, SessionMode::Ctree);

        assert!(matches!(
            session.logon("NOWHERE", "", ""),
            Err(CtdbError::Connection(_))
        ));
        assert!(!session.is_active());
        assert!(session.username().is_none());
    }

    #[test]
    fn test_logon_while_active_is_rejected() {
        let (_dir, engine) = engine();
        let session = Session::new(engine.clone(), SessionMode::Ctree);
        session.logon("FAIRCOMS", "a", "b").unwrap();

        assert!(matches!(
            session.logon("FAIRCOMS", "c", "d"),
            Err(CtdbError::InvalidArgument(_))
        ));
        assert_eq!(session.username().as_deref(), Some("a"));
        assert_eq!(session.password().as_deref(), Some("b"));
        assert_eq!(engine.connection_count(), 1);
    }

    #[test]
    fn test_lock_round_trip() {
        let (_dir, engine) = engine();
        let session = Session::new(engine, SessionMode::Ctree);
        session.logon("FAIRCOMS", "", "").unwrap();

        assert!(!session.is_locked());
        assert!(session.lock(LockMode::Write));
        assert!(session.is_locked());
        assert_eq!(session.lock_mode(), Some(LockMode::Write));

        assert!(session.unlock());
        assert!(!session.is_locked());
        assert_eq!(session.lock_mode(), None);
        session.unlock_or_err().unwrap();
    }

    #[test]
    fn test_write_lock_excludes_second_session() {
        let (_dir, engine) = engine();
        let first = Session::new(engine.clone(), SessionMode::Ctree);
        let second = Session::new(engine, SessionMode::Ctree);
        first.logon("FAIRCOMS", "", "").unwrap();
        second.logon("FAIRCOMS", "", "").unwrap();

        first.lock_or_err(LockMode::Write).unwrap();

        let err = second.lock_or_err(LockMode::Write).unwrap_err();
        assert!(matches!(err, CtdbError::LockConflict(_)));
        assert!(err.to_string().contains("Exclusive"));
        assert!(!second.lock(LockMode::Read));
        assert!(!second.is_locked());

        first.unlock_or_err().unwrap();
        assert!(second.lock(LockMode::Write));
    }

    #[test]
    fn test_blocking_lock_times_out() {
        let (_dir, engine) = engine();
        let config = SessionConfig {
            lock_timeout_ms: 30,
            ..SessionConfig::default()
        };
        let first = Session::new(engine.clone(), SessionMode::Ctree);
        let second = Session::with_config(engine, config);
        first.logon("FAIRCOMS", "", "").unwrap();
        second.logon("FAIRCOMS", "", "").unwrap();

        assert!(first.lock(LockMode::Read));
        assert!(second.lock(LockMode::ReadBlock));
        assert!(matches!(
            second.lock_or_err(LockMode::WriteBlock),
            Err(CtdbError::LockConflict(_))
        ));
    }

    #[test]
    fn test_lock_requires_active_session() {
        let (_dir, engine) = engine();
        let session = Session::new(engine, SessionMode::Ctree);

        assert!(!session.lock(LockMode::Write));
        assert!(matches!(
            session.lock_or_err(LockMode::Write),
            Err(CtdbError::NotOpen(_))
        ));
        assert!(session.unlock());
        assert!(!session.is_locked());
    }

    #[test]
    fn test_empty_path_prefix_reads_back_unset() {
        let (_dir, engine) = engine();
        let session = Session::new(engine, SessionMode::Ctree);

        assert_eq!(session.path_prefix(), None);
        session.set_path_prefix("/data/tables");
        assert_eq!(session.path_prefix().as_deref(), Some("/data/tables"));
        session.set_path_prefix("");
        assert_eq!(session.path_prefix(), None);

        session.set_path_prefix("x");
        session.clear_path_prefix();
        assert_eq!(session.path_prefix(), None);
    }

    #[test]
    fn test_resolve_location() {
        let (_dir, engine) = engine();
        let session = Session::new(engine, SessionMode::Ctree);

        assert_eq!(session.resolve_location(None, "t").dir, PathBuf::new());
        assert_eq!(session.resolve_location(Some("rel"), "t").dir, Path::new("rel"));

        session.set_path_prefix("/prefix");
        assert_eq!(session.resolve_location(None, "t").dir, Path::new("/prefix"));
        assert_eq!(session.resolve_location(Some("sub"), "t").dir, Path::new("/prefix/sub"));
        assert_eq!(session.resolve_location(Some("/abs"), "t").dir, Path::new("/abs"));
        assert_eq!(session.resolve_location(Some("sub"), "t").name, "t");
    }

    #[test]
    fn test_date_format_setting() {
        let (_dir, engine) = engine();
        let config = SessionConfig::from_json_str(r#"{ "default_date_format": "Ymd" }"#).unwrap();
        let session = Session::with_config(engine, config);

        assert_eq!(session.default_date_format(), DateFormat::Ymd);
        session.set_default_date_format(DateFormat::Dmcy);
        assert_eq!(session.default_date_format(), DateFormat::Dmcy);
    }

    #[test]
    fn test_drop_logs_out() {
        let (_dir, engine) = engine();
        {
            let session = Session::new(engine.clone(), SessionMode::Ctree);
            session.logon("FAIRCOMS", "", "").unwrap();
            assert!(session.lock(LockMode::Write));
            assert_eq!(engine.connection_count(), 1);
        }
        assert_eq!(engine.connection_count(), 0);
        assert_eq!(engine.lock_manager().stats().active_owners, 0);
    }
}
