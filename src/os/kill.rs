//! Forced termination backends.
//!
//! A timed-out child may have forked helpers of its own. With [`GroupKill`]
//! the child leads a fresh process group at spawn time and the kill signal is
//! sent to the whole group. [`DirectKill`] signals only the child, for
//! platforms or deployments where process groups are unavailable.

use tokio::process::Command;

/// Spawn-time setup and forced termination of a child process.
pub trait Terminator: Send + Sync + std::fmt::Debug {
    /// Adjust the command before it is spawned
    fn prepare(&self, command: &mut Command);

    /// Forcefully terminate the process (and whatever it owns)
    fn terminate(&self, pid: u32) -> std::io::Result<()>;

    /// Whether `terminate` still reaches live descendants after the child
    /// itself has been reaped. A reaped pid may be reused, so backends that
    /// return false are not invoked once the child is gone.
    fn signals_group(&self) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GroupKill;

impl Terminator for GroupKill {
    fn prepare(&self, command: &mut Command) {
        // pgid == pid of the child
        command.process_group(0);
    }

    fn terminate(&self, pid: u32) -> std::io::Result<()> {
        signal(-(pid as libc::pid_t))
    }

    fn signals_group(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DirectKill;

impl Terminator for DirectKill {
    fn prepare(&self, _command: &mut Command) {}

    fn terminate(&self, pid: u32) -> std::io::Result<()> {
        signal(pid as libc::pid_t)
    }
}

/// Send SIGKILL; a negative target addresses a process group.
fn signal(target: libc::pid_t) -> std::io::Result<()> {
    let rc = unsafe { libc::kill(target, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    // Already gone
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

/// Which backend to use, as selected in configuration
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KillMode {
    /// Kill the child's whole process group
    #[default]
    Group,
    /// Kill only the direct child
    Direct,
}

impl KillMode {
    pub fn terminator(self) -> Box<dyn Terminator> {
        match self {
            KillMode::Group => Box::new(GroupKill),
            KillMode::Direct => Box::new(DirectKill),
        }
    }
}
