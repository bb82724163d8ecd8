//! Watch mode: build once, then rebuild whenever the posts, templates or
//! styles change.
//!
//! Filesystem events are debounced. Every relevant event pushes the rebuild
//! deadline back by [`DEBOUNCE`], so a burst of events (an editor saving
//! several files, a `git checkout`) yields a single rebuild once things go
//! quiet.
//!
//! Builds run on the watch loop's own thread. Events that arrive during a
//! build wait in the channel and arm the debouncer again afterwards, so a
//! change made mid-build is never lost. If a build started elsewhere is
//! still running when the deadline passes, the deadline is re-armed rather
//! than the trigger being dropped.

use crate::build::{BuildOutcome, Site};
use crate::util::is_ignored;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// How long the filesystem must stay quiet before a rebuild fires.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// A single pending rebuild, or none. Each [`Debouncer::notify`] restarts
/// the delay.
#[derive(Clone, Copy, Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Debouncer {
        Debouncer {
            delay,
            deadline: None,
        }
    }

    /// Records an event at `now`, cancelling any earlier deadline.
    pub fn notify(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// How long to wait for the next event before the pending rebuild is
    /// due, or `None` when nothing is pending.
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Clears and returns the pending rebuild if it is due at `now`.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Feeds events from `rx` through a [`Debouncer`] and calls `fire` once per
/// quiet period. `relevant` filters events; irrelevant ones neither arm nor
/// delay the debouncer. `fire` returns false when it could not build because
/// another build was running, which re-arms the deadline.
///
/// Returns when `rx` disconnects, after firing any rebuild still pending.
pub fn run_debounced<E>(
    rx: &Receiver<E>,
    delay: Duration,
    mut relevant: impl FnMut(&E) -> bool,
    mut fire: impl FnMut() -> bool,
) {
    let mut debouncer = Debouncer::new(delay);
    loop {
        let event = match debouncer.timeout(Instant::now()) {
            None => match rx.recv() {
                Ok(event) => Some(event),
                Err(_) => return,
            },
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    fire();
                    return;
                }
            },
        };

        match event {
            Some(event) => {
                if relevant(&event) {
                    debouncer.notify(Instant::now());
                }
            }
            None => {
                if debouncer.fire(Instant::now()) && !fire() {
                    debouncer.notify(Instant::now());
                }
            }
        }
    }
}

/// Reports whether a filesystem event should trigger a rebuild: a create,
/// modify or remove of at least one path that isn't a dotfile or editor
/// artefact.
fn is_relevant(event: &notify::Result<Event>) -> bool {
    match event {
        Ok(event) => {
            matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) && event.paths.iter().any(|path| !is_ignored(path))
        }
        Err(e) => {
            warn!("watch error: {}", e);
            false
        }
    }
}

/// Runs one build and logs the result. Returns false only when the build was
/// skipped because another was in flight.
fn rebuild(site: &Site) -> bool {
    match site.build() {
        Ok(BuildOutcome::Completed(_)) => true,
        Ok(BuildOutcome::Skipped) => false,
        Err(e) => {
            error!("build failed: {}", e);
            true
        }
    }
}

/// Builds `site` and then rebuilds it on every change to its sources. Runs
/// until the process is terminated. A failed build is logged and the loop
/// keeps waiting for the next change.
pub fn watch(site: &Site) -> Result<()> {
    rebuild(site);

    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(tx)?;

    let config = site.config();
    for dir in [
        &config.posts_directory,
        &config.templates_directory,
        &config.styles_directory,
    ] {
        if dir.is_dir() {
            watcher.watch(dir, RecursiveMode::Recursive)?;
            info!("watching `{}`", dir.display());
        } else {
            warn!("not watching missing directory `{}`", dir.display());
        }
    }

    run_debounced(&rx, DEBOUNCE, is_relevant, || {
        info!("change detected; rebuilding");
        rebuild(site)
    });
    Ok(())
}

/// The result of a fallible watch operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem setting up the filesystem watcher.
#[derive(Debug, Error)]
pub enum Error {
    #[error("watching for changes: {0}")]
    Notify(#[from] notify::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;
    use std::thread;

    const DELAY: Duration = Duration::from_millis(50);

    #[test]
    fn test_debouncer() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        assert!(!debouncer.is_pending());
        assert_eq!(None, debouncer.timeout(start));

        debouncer.notify(start);
        debouncer.notify(start + Duration::from_millis(30));
        assert!(!debouncer.fire(start + Duration::from_millis(60)));
        assert_eq!(
            Some(Duration::from_millis(20)),
            debouncer.timeout(start + Duration::from_millis(60))
        );
        assert!(debouncer.fire(start + Duration::from_millis(80)));
        assert!(!debouncer.is_pending());
        assert!(!debouncer.fire(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_burst_fires_once() {
        let (tx, rx) = channel();
        for i in 0..20 {
            tx.send(i).unwrap();
        }
        drop(tx);

        let mut fired = 0;
        run_debounced(&rx, DELAY, |_| true, || {
            fired += 1;
            true
        });
        assert_eq!(1, fired);
    }

    #[test]
    fn test_separate_bursts_fire_separately() {
        let (tx, rx) = channel();
        let sender = thread::spawn(move || {
            for i in 0..5 {
                tx.send(i).unwrap();
            }
            thread::sleep(DELAY * 6);
            for i in 0..5 {
                tx.send(i).unwrap();
            }
        });

        let mut fired = 0;
        run_debounced(&rx, DELAY, |_| true, || {
            fired += 1;
            true
        });
        sender.join().unwrap();
        assert_eq!(2, fired);
    }

    #[test]
    fn test_irrelevant_events_do_not_fire() {
        let (tx, rx) = channel();
        for i in 0..5 {
            tx.send(i).unwrap();
        }
        drop(tx);

        let mut fired = 0;
        run_debounced(&rx, DELAY, |i| *i > 10, || {
            fired += 1;
            true
        });
        assert_eq!(0, fired);
    }

    #[test]
    fn test_busy_rearms() {
        let (tx, rx) = channel();
        let sender = thread::spawn(move || {
            tx.send(()).unwrap();
            // Stay connected long enough for the re-armed deadline to pass.
            thread::sleep(DELAY * 8);
        });

        let mut attempts = 0;
        run_debounced(&rx, DELAY, |_| true, || {
            attempts += 1;
            attempts > 1
        });
        sender.join().unwrap();
        assert_eq!(2, attempts);
    }

    #[test]
    fn test_is_relevant() {
        use notify::event::{AccessKind, CreateKind};
        use std::path::PathBuf;

        let event = |kind, path: &str| -> notify::Result<Event> {
            Ok(Event::new(kind).add_path(PathBuf::from(path)))
        };
        assert!(is_relevant(&event(
            EventKind::Create(CreateKind::File),
            "posts/hello.md"
        )));
        assert!(!is_relevant(&event(
            EventKind::Create(CreateKind::File),
            "posts/.hello.md.swp"
        )));
        assert!(!is_relevant(&event(
            EventKind::Access(AccessKind::Any),
            "posts/hello.md"
        )));
    }
}
