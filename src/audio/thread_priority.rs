// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Priority for the mixing thread when TANPURA_THREAD_PRIORITY is unset.
const DEFAULT_AUDIO_THREAD_PRIORITY: u8 = 70;

/// Reads TANPURA_THREAD_PRIORITY (0-99). Out of range or unparsable values fall back to the default.
pub fn audio_thread_priority() -> ThreadPriorityValue {
    parse_priority(std::env::var("TANPURA_THREAD_PRIORITY").ok().as_deref())
}

fn parse_priority(value: Option<&str>) -> ThreadPriorityValue {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .and_then(|n| ThreadPriorityValue::try_from(n).ok())
        .unwrap_or_else(|| ThreadPriorityValue::try_from(DEFAULT_AUDIO_THREAD_PRIORITY).unwrap())
}

fn flag_enabled(value: Option<&str>) -> bool {
    value
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether to attempt RT (SCHED_FIFO) scheduling for the mixing thread.
/// Enabled unless TANPURA_DISABLE_RT_AUDIO is set.
pub fn rt_audio_enabled() -> bool {
    !flag_enabled(std::env::var("TANPURA_DISABLE_RT_AUDIO").ok().as_deref())
}

/// Raises the priority of the current thread. Failures are logged and otherwise ignored,
/// the drone still plays at normal priority.
pub fn boost_current_thread(priority: ThreadPriorityValue, rt_audio: bool) {
    let tp = ThreadPriority::Crossplatform(priority);
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(error = ?e, "Failed to raise audio thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for audio thread"),
            Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for audio thread"),
        }
    }

    #[cfg(not(unix))]
    let _ = rt_audio;
}
