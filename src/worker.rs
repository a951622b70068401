//! A small pool of background threads running deferred suggestion
//! computations.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{self, Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

const NUM_THREADS: usize = 4;

/// A handle to a submitted job.
#[derive(Debug, Clone)]
pub struct Work {
    done: Arc<(Mutex<bool>, Condvar)>,
}

impl Work {
    fn new() -> Work {
        Work {
            done: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    fn finish(&self) {
        let (lock, cvar) = &*self.done;
        if let Ok(mut done) = lock.lock() {
            *done = true;
            cvar.notify_all();
        }
    }

    pub fn is_done(&self) -> bool {
        let (lock, _) = &*self.done;
        lock.lock().map(|done| *done).unwrap_or(true)
    }

    /// Blocks until the job has run (or panicked).
    pub fn wait(&self) {
        let (lock, cvar) = &*self.done;
        let mut done = match lock.lock() {
            Ok(done) => done,
            Err(_) => return,
        };
        while !*done {
            done = match cvar.wait(done) {
                Ok(done) => done,
                Err(_) => return,
            };
        }
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`. Returns
    /// whether the job has finished. A timeout too large to represent waits
    /// without a deadline.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => {
                self.wait();
                return self.is_done();
            }
        };

        let (lock, cvar) = &*self.done;
        let mut done = match lock.lock() {
            Ok(done) => done,
            Err(_) => return true,
        };
        while !*done {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            done = match cvar.wait_timeout(done, deadline - now) {
                Ok((done, _)) => done,
                Err(_) => return true,
            };
        }
        true
    }
}

lazy_static! {
    static ref WORKER_CH: (Sender<(Job, Work)>, Receiver<(Job, Work)>) =
        crossbeam_channel::unbounded();
}

static START_WORKERS: Once = Once::new();

fn worker_thread() {
    let rx = &WORKER_CH.1;
    while let Ok((job, work)) = rx.recv() {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("worker: a job panicked");
        }

        // Notify that we have finished the work.
        work.finish();
    }
}

fn start_worker_threads() {
    START_WORKERS.call_once(|| {
        for i in 0..NUM_THREADS {
            let spawned = thread::Builder::new()
                .name(format!("cmdtree-worker-{}", i))
                .spawn(worker_thread);
            if let Err(err) = spawned {
                error!("worker: failed to spawn a thread: {}", err);
            }
        }
    });
}

/// Runs `job` on the pool. The pool starts on the first call.
pub fn spawn<F>(job: F) -> Work
where
    F: FnOnce() + Send + 'static,
{
    start_worker_threads();

    let work = Work::new();
    if WORKER_CH.0.send((Box::new(job), work.clone())).is_err() {
        // The receiver lives in a static and is never dropped.
        error!("worker: the job queue is closed");
        work.finish();
    }
    work
}
