use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::dispatch::worker::LaneWorker;
use crate::models::lane::Lane;
use crate::traits::connectivity::ConnectivityProbe;

#[derive(Default)]
struct Slot {
    running: bool,
    /// The coalesced queued-not-started job: any number of requests
    /// arriving while the slot runs collapse into one rerun.
    rerun: bool,
}

/// Append-or-replace job scheduling for lane workers.
///
/// Each (user, lane) maps to one slot with state {idle, running,
/// running+rerun}, guarded by a single mutex. A request on an idle slot
/// spawns a named worker thread; a request on a running slot sets the
/// rerun flag, so the runner loops once more after the current pass
/// (append), and further requests are absorbed by the already-set flag
/// (replace). At most one running job and one queued rerun exist per
/// (user, lane), so two same-lane workers never race on one user's rows.
pub struct LaneDispatcher {
    worker: Arc<LaneWorker>,
    connectivity: Arc<dyn ConnectivityProbe>,
    slots: Arc<Mutex<HashMap<(String, Lane), Slot>>>,
}

impl LaneDispatcher {
    pub fn new(worker: Arc<LaneWorker>, connectivity: Arc<dyn ConnectivityProbe>) -> Self {
        Self {
            worker,
            connectivity,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Request a drain of one lane for one user.
    pub fn request(&self, user_id: &str, lane: Lane) {
        {
            let mut slots = self.slots.lock();
            let slot = slots.entry((user_id.to_string(), lane)).or_default();
            if slot.running {
                slot.rerun = true;
                return;
            }
            slot.running = true;
        }

        let worker = Arc::clone(&self.worker);
        let connectivity = Arc::clone(&self.connectivity);
        let slots = Arc::clone(&self.slots);
        let user = user_id.to_string();

        thread::Builder::new()
            .name(format!("lane-{}-{}", lane.as_str(), user))
            .spawn(move || loop {
                if lane.admits(connectivity.current()) {
                    if let Err(err) = worker.run(&user, lane) {
                        log::error!("{} lane worker for {} failed: {}", lane.as_str(), user, err);
                    }
                } else {
                    log::debug!(
                        "{} lane for {} skipped: network precondition unmet",
                        lane.as_str(),
                        user
                    );
                }

                let mut slots_guard = slots.lock();
                let slot = slots_guard
                    .entry((user.clone(), lane))
                    .or_default();
                if slot.rerun {
                    slot.rerun = false;
                    continue;
                }
                slot.running = false;
                break;
            })
            .expect("failed to spawn lane worker thread");
    }

    /// Request both lanes for a user (the normal post-seal path).
    pub fn request_all(&self, user_id: &str) {
        for lane in Lane::ALL {
            self.request(user_id, lane);
        }
    }

    /// Whether no job is running or queued for (user, lane). Intended for
    /// shutdown sequencing and tests.
    pub fn is_idle(&self, user_id: &str, lane: Lane) -> bool {
        let slots = self.slots.lock();
        match slots.get(&(user_id.to_string(), lane)) {
            Some(slot) => !slot.running && !slot.rerun,
            None => true,
        }
    }
}
