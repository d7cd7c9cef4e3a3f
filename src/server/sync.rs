//! Mirror registry changes onto the connected client
//!
//! An edit is sent as a clear of the old record followed by a set of the new
//! one. Nothing is sent unless a program is being debugged; the registries
//! are replayed in full when debugging starts.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::registry::{Breakpoint, Change, ObserverId, Registry, Watchpoint};
use crate::wire::Request;

use super::session::SessionCore;

/// Requests that install a breakpoint on the client
pub fn set_breakpoint(bp: &Breakpoint) -> Vec<Request> {
    let mut requests = vec![Request::Break {
        file: bp.file.clone(),
        line: bp.line,
        set: true,
        condition: bp.condition.clone(),
        temporary: bp.temporary,
    }];
    if !bp.enabled {
        requests.push(Request::EnableBreak {
            file: bp.file.clone(),
            line: bp.line,
            enable: false,
        });
    }
    if bp.ignore_count > 0 {
        requests.push(Request::IgnoreBreak {
            file: bp.file.clone(),
            line: bp.line,
            count: bp.ignore_count,
        });
    }
    requests
}

pub fn clear_breakpoint(bp: &Breakpoint) -> Request {
    Request::Break {
        file: bp.file.clone(),
        line: bp.line,
        set: false,
        condition: None,
        temporary: false,
    }
}

/// Requests that install a watch expression on the client
pub fn set_watchpoint(wp: &Watchpoint) -> Vec<Request> {
    let condition = wp.wire_condition();
    let mut requests = vec![Request::Watch {
        condition: condition.clone(),
        set: true,
        temporary: wp.temporary,
    }];
    if !wp.enabled {
        requests.push(Request::EnableWatch {
            condition: condition.clone(),
            enable: false,
        });
    }
    if wp.ignore_count > 0 {
        requests.push(Request::IgnoreWatch {
            condition,
            count: wp.ignore_count,
        });
    }
    requests
}

pub fn clear_watchpoint(wp: &Watchpoint) -> Request {
    Request::Watch {
        condition: wp.wire_condition(),
        set: false,
        temporary: false,
    }
}

fn change_requests<R>(
    change: &Change<'_, R>,
    set: fn(&R) -> Vec<Request>,
    clear: fn(&R) -> Request,
) -> Vec<Request> {
    match change {
        Change::Added(record) | Change::Updated { new: record } => set(record),
        Change::AboutToUpdate { old } => vec![clear(old)],
        Change::AboutToRemove(records) => records.iter().map(clear).collect(),
        Change::AboutToAdd(_) | Change::Removed(_) => Vec::new(),
    }
}

pub fn observe_breakpoints(
    registry: &mut Registry<Breakpoint>,
    core: Arc<Mutex<SessionCore>>,
) -> ObserverId {
    registry.subscribe(move |change| {
        let requests = change_requests(change, set_breakpoint, clear_breakpoint);
        if !requests.is_empty() {
            core.lock().send_if_debugging(&requests);
        }
    })
}

pub fn observe_watchpoints(
    registry: &mut Registry<Watchpoint>,
    core: Arc<Mutex<SessionCore>>,
) -> ObserverId {
    registry.subscribe(move |change| {
        let requests = change_requests(change, set_watchpoint, clear_watchpoint);
        if !requests.is_empty() {
            core.lock().send_if_debugging(&requests);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WatchSpecial;

    #[test]
    fn test_disabled_breakpoint_with_ignore_count() {
        let mut bp = Breakpoint::new("/src/a.py", 10).with_condition("x > 1");
        bp.enabled = false;
        bp.ignore_count = 3;
        let wire: Vec<_> = set_breakpoint(&bp).iter().map(Request::to_wire).collect();
        assert_eq!(
            wire,
            vec![
                ">Break</src/a.py@@10@@0@@1@@x > 1\n",
                ">EnableBreak</src/a.py,10,0\n",
                ">IgnoreBreak</src/a.py,10,3\n",
            ]
        );
    }

    #[test]
    fn test_plain_breakpoint_is_one_request() {
        assert_eq!(set_breakpoint(&Breakpoint::new("/src/a.py", 1)).len(), 1);
    }

    #[test]
    fn test_watch_uses_qualified_condition() {
        let wp = Watchpoint::new("count", WatchSpecial::Changed);
        assert_eq!(
            clear_watchpoint(&wp),
            Request::Watch {
                condition: "count ??changed??".into(),
                set: false,
                temporary: false,
            }
        );
    }
}
