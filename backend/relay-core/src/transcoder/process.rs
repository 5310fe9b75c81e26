//! Signal delivery to transcoder processes by PID.

use log::{debug, trace};
use sysinfo::{Pid, Process, ProcessesToUpdate, Signal, System};

pub(crate) fn with_process<F, R>(pid: u32, f: F) -> Option<R>
where
    F: FnOnce(&Process) -> R,
{
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    sys.process(pid).map(f)
}

fn send_signal(pid: u32, signal: Signal) -> bool {
    with_process(pid, |p| match p.kill_with(signal) {
        Some(sent) => {
            debug!("Sent {signal:?} to PID {pid}: success={sent}");
            sent
        }
        None => {
            debug!("{signal:?} is not supported on this platform, PID {pid} not signalled");
            false
        }
    })
    .unwrap_or_else(|| {
        trace!("Process {pid} not found, no {signal:?} sent");
        false
    })
}

/// Ask a transcoder to finish: SIGINT lets ffmpeg flush the container trailer.
///
/// # Returns
///
/// * `true` - The signal was delivered
/// * `false` - The process doesn't exist or the signal could not be sent
pub fn send_interrupt(pid: u32) -> bool {
    send_signal(pid, Signal::Interrupt)
}

/// Force-kill a transcoder that ignored its interrupt.
pub fn send_kill(pid: u32) -> bool {
    send_signal(pid, Signal::Kill)
}

/// Whether a process with this PID currently exists.
pub(crate) fn is_running(pid: u32) -> bool {
    with_process(pid, |_| true).unwrap_or(false)
}
