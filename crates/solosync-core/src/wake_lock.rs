//! Keeps the display awake while a session is playing.
//!
//! The manager holds at most one lock. `acquire()` and `release()` are both
//! idempotent, and a lock the platform revoked on its own counts as not
//! held, so the next `acquire()` requests a fresh one.

use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::ResourceError;
use crate::storage::WakeLockConfig;

/// Requests wake locks from the platform.
pub trait WakeLockBackend: Send {
    fn request(&mut self) -> Result<Box<dyn WakeLockHandle>, ResourceError>;
}

/// A granted wake lock.
pub trait WakeLockHandle: Send {
    /// False once the platform has revoked the lock.
    fn is_active(&mut self) -> bool;

    fn release(self: Box<Self>) -> Result<(), ResourceError>;
}

pub struct WakeLockManager {
    backend: Box<dyn WakeLockBackend>,
    held: Option<Box<dyn WakeLockHandle>>,
}

impl WakeLockManager {
    pub fn new(backend: Box<dyn WakeLockBackend>) -> Self {
        Self {
            backend,
            held: None,
        }
    }

    /// Manager for this platform, honoring `[wake_lock]` in the config.
    pub fn from_config(config: &WakeLockConfig) -> Self {
        if !config.enabled {
            return Self::new(Box::new(Unsupported));
        }
        match InhibitorCommand::from_config(config) {
            Some(backend) => Self::new(Box::new(backend)),
            None => Self::new(Box::new(Unsupported)),
        }
    }

    /// Whether a live lock is held. Drops a lock the platform revoked.
    pub fn is_held(&mut self) -> bool {
        match self.held.as_mut().map(|handle| handle.is_active()) {
            Some(true) => true,
            Some(false) => {
                debug!("wake lock was revoked by the platform");
                self.held = None;
                false
            }
            None => false,
        }
    }

    /// Request a lock unless one is already held. Failure is logged and
    /// the session carries on without it.
    pub fn acquire(&mut self) {
        if self.is_held() {
            return;
        }
        match self.backend.request() {
            Ok(handle) => {
                info!("wake lock acquired");
                self.held = Some(handle);
            }
            Err(e) => warn!("wake lock unavailable: {e}"),
        }
    }

    /// Release the held lock, if any.
    pub fn release(&mut self) {
        if let Some(handle) = self.held.take() {
            match handle.release() {
                Ok(()) => info!("wake lock released"),
                Err(e) => warn!("wake lock release failed: {e}"),
            }
        }
    }
}

impl Drop for WakeLockManager {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for WakeLockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeLockManager")
            .field("held", &self.held.is_some())
            .finish()
    }
}

/// Backend for platforms (or configs) without wake lock support.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl WakeLockBackend for Unsupported {
    fn request(&mut self) -> Result<Box<dyn WakeLockHandle>, ResourceError> {
        Err(ResourceError::WakeLockUnsupported)
    }
}

/// Holds the lock by keeping an inhibitor process alive
/// (`systemd-inhibit … sleep infinity` on Linux, `caffeinate -d` on macOS).
#[derive(Debug, Clone)]
pub struct InhibitorCommand {
    program: String,
    args: Vec<String>,
}

impl InhibitorCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &WakeLockConfig) -> Option<Self> {
        match &config.command {
            Some(program) => Some(Self::new(program.clone(), config.args.clone())),
            None => Self::platform_default(),
        }
    }

    fn platform_default() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::new(
                "systemd-inhibit",
                [
                    "--what=idle:sleep",
                    "--who=solosync",
                    "--why=Practice session in progress",
                    "--mode=block",
                    "sleep",
                    "infinity",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ))
        } else if cfg!(target_os = "macos") {
            Some(Self::new("caffeinate", vec!["-d".to_string()]))
        } else {
            None
        }
    }
}

impl WakeLockBackend for InhibitorCommand {
    fn request(&mut self) -> Result<Box<dyn WakeLockHandle>, ResourceError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ResourceError::WakeLock(format!("{}: {e}", self.program)))?;
        Ok(Box::new(InhibitorLock { child }))
    }
}

struct InhibitorLock {
    child: Child,
}

impl WakeLockHandle for InhibitorLock {
    fn is_active(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn release(mut self: Box<Self>) -> Result<(), ResourceError> {
        if let Ok(None) = self.child.try_wait() {
            self.child
                .kill()
                .map_err(|e| ResourceError::WakeLock(e.to_string()))?;
        }
        let _ = self.child.wait();
        Ok(())
    }
}
