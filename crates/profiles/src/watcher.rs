//! Hot reload of the profile repository
//!
//! Watches the discovered profile directories and refreshes the repository
//! when files are created, modified or removed.

use std::{
    path::PathBuf,
    sync::{Arc, mpsc},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::{error::Result, repository::ProfileRepository};

const DEBOUNCE: Duration = Duration::from_millis(500);
const POLL: Duration = Duration::from_millis(100);

/// Running watcher. Dropping it stops the background thread.
pub struct ProfileWatcher {
    roots: Vec<PathBuf>,
    // Taken before joining so the event channel disconnects.
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl ProfileWatcher {
    /// Start watching the repository's current discovery roots.
    ///
    /// Directories that do not exist yet are not watched; call `spawn` again
    /// after reconfiguring discovery to pick up new roots.
    pub fn spawn(repository: Arc<ProfileRepository>) -> Result<Self> {
        let roots = repository.discovery().watch_roots();
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            Config::default(),
        )?;

        for root in &roots {
            match watcher.watch(root, RecursiveMode::NonRecursive) {
                Ok(()) => tracing::info!("Watching profile directory {:?}", root),
                Err(e) => tracing::warn!("Cannot watch profile directory {:?}: {}", root, e),
            }
        }

        let thread = std::thread::Builder::new()
            .name("profile-watcher".to_string())
            .spawn(move || watch_loop(&repository, &rx))
            .map_err(notify::Error::io)?;

        Ok(Self {
            roots,
            watcher: Some(watcher),
            thread: Some(thread),
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl Drop for ProfileWatcher {
    fn drop(&mut self) {
        self.watcher.take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("Profile watcher thread panicked");
        }
    }
}

fn watch_loop(repository: &ProfileRepository, rx: &mpsc::Receiver<Event>) {
    let mut debounce = Debounce::new(DEBOUNCE);

    loop {
        match rx.recv_timeout(POLL) {
            Ok(event) => {
                if is_relevant_event(&event) {
                    debounce.record(Instant::now());
                    tracing::debug!(
                        "Detected profile change: {:?}",
                        event.paths.first().map(|p| p.file_name())
                    );
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if debounce.take_ready(Instant::now()) {
                    tracing::info!("Profile files changed, refreshing");
                    repository.refresh();
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::debug!("Profile watcher stopped");
                break;
            }
        }
    }
}

/// Fires once the event stream has been quiet for `window`.
struct Debounce {
    window: Duration,
    last_event: Option<Instant>,
}

impl Debounce {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_event: None,
        }
    }

    fn record(&mut self, at: Instant) {
        self.last_event = Some(at);
    }

    fn take_ready(&mut self, now: Instant) -> bool {
        match self.last_event {
            Some(last) if now.duration_since(last) > self.window => {
                self.last_event = None;
                true
            }
            _ => false,
        }
    }
}

fn is_relevant_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use std::{fs, thread};

    use tempfile::TempDir;

    use super::*;
    use crate::{
        discovery::{FsDiscovery, SearchPaths},
        profile::MltProfileParser,
    };

    const PAL: &str = "description=PAL\nwidth=720\nheight=576\nframe_rate_num=25\nframe_rate_den=1\n";

    #[test]
    fn test_relevant_event_kinds() {
        let create = Event::new(EventKind::Create(notify::event::CreateKind::File));
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any));

        assert!(is_relevant_event(&create));
        assert!(!is_relevant_event(&access));
    }

    #[test]
    fn test_debounce_waits_for_quiet_after_last_event() {
        let start = Instant::now();
        let mut debounce = Debounce::new(DEBOUNCE);
        assert!(!debounce.take_ready(start + Duration::from_secs(5)));

        // A burst after a long quiet period must not fire on its first gap.
        debounce.record(start);
        assert!(!debounce.take_ready(start + POLL));
        debounce.record(start + Duration::from_millis(400));
        assert!(!debounce.take_ready(start + Duration::from_millis(800)));

        assert!(debounce.take_ready(start + Duration::from_millis(1000)));
        // Fires once per burst.
        assert!(!debounce.take_ready(start + Duration::from_millis(2000)));
    }

    #[test]
    fn test_new_file_triggers_refresh() {
        let dir = TempDir::new().unwrap();
        let discovery = FsDiscovery::new(SearchPaths::new(Some(dir.path().to_path_buf()), vec![]));
        let repository = Arc::new(ProfileRepository::new(
            Arc::new(discovery),
            Arc::new(MltProfileParser),
        ));
        assert!(repository.is_empty());

        let watcher = ProfileWatcher::spawn(repository.clone()).unwrap();
        assert_eq!(watcher.roots(), &[dir.path().to_path_buf()]);

        fs::write(dir.path().join("pal"), PAL).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !repository.profile_exists("pal") && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(repository.profile_exists("pal"));

        drop(watcher);
    }
}
