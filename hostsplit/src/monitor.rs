//! Configuration reloading.
//!
//! A background thread polls the configuration file's modification time
//! and swaps the installed rule set when the file changes. A broken
//! edit leaves the previous rules in place.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use libhostsplit::{AppConfig, RuleHandle};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

pub struct ConfigMonitor {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl ConfigMonitor {
    /// Spawn the watcher thread. `rules` is swapped whenever `path` gets
    /// a new modification time and still parses.
    pub fn spawn(path: PathBuf, rules: RuleHandle, poll_interval: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded(1);
        let handle = thread::spawn(move || {
            let mut last_seen = modification_time(&path);
            loop {
                match stop_rx.recv_timeout(poll_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => (),
                }
                let current = modification_time(&path);
                if current == last_seen {
                    continue;
                }
                last_seen = current;
                reload(&path, &rules);
            }
        });
        ConfigMonitor {
            stop: stop_tx,
            handle,
        }
    }

    /// Stop the watcher and wait for the thread to end.
    pub fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.join();
    }
}

fn modification_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn reload(path: &Path, rules: &RuleHandle) {
    debug!("configuration {} changed, reloading", path.display());
    match AppConfig::load(path) {
        Ok(config) => {
            let set = config.rule_set();
            info!("installed {} rules from {}", set.len(), path.display());
            rules.install(set);
        }
        Err(e) => warn!(
            "keeping previous rules, reload of {} failed: {}",
            path.display(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_for(cond: impl Fn() -> bool) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("condition not reached");
    }

    #[test]
    fn edits_swap_rules_and_broken_edits_keep_previous() {
        let path = std::env::temp_dir().join(format!(
            "hostsplit-monitor-{}.toml",
            std::process::id()
        ));
        fs::write(&path, "[[domains]]\nname = \"example.com\"\n").unwrap();

        let rules = RuleHandle::default();
        rules.install(AppConfig::load(&path).unwrap().rule_set());
        assert_eq!(rules.current().len(), 1);

        let monitor =
            ConfigMonitor::spawn(path.clone(), rules.clone(), Duration::from_millis(20));
        thread::sleep(Duration::from_millis(50));

        fs::write(
            &path,
            "[[domains]]\nname = \"a.net\"\n\n[[domains]]\nname = \"b.net\"\n",
        )
        .unwrap();
        wait_for(|| rules.current().len() == 2);

        thread::sleep(Duration::from_millis(50));
        fs::write(&path, "not valid toml [").unwrap();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(rules.current().len(), 2);

        monitor.stop();
        let _ = fs::remove_file(&path);
    }
}
