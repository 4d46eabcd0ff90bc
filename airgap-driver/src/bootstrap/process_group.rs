//! Process group ownership for the install script.

use tokio::process::Child;

/// The script's process group, killed as a whole on drop unless released.
///
/// The shell is spawned as a group leader, so its pid doubles as the group id
/// and anything it forks without `setsid` stays inside the group.
pub(crate) struct ProcessGroup {
    pgid: Option<libc::pid_t>,
}

impl ProcessGroup {
    /// Track the group led by `child`.
    ///
    /// A child that has already been reaped has no pid; the guard is then inert.
    pub(crate) fn led_by(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()),
        }
    }

    /// Send SIGKILL to every member of the group.
    ///
    /// # Returns
    /// * `true` - Signal delivered, or the group is already gone
    /// * `false` - Delivery failed (permission denied)
    pub(crate) fn kill(&mut self) -> bool {
        let Some(pgid) = self.pgid.take() else {
            return true;
        };

        if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
            return true;
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return true;
        }
        tracing::warn!(pgid, error = %err, "Failed to kill install script process group");
        false
    }

    /// Leave the group running when the guard drops.
    pub(crate) fn release(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
