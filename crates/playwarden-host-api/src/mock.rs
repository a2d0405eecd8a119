//! Mock process registry for testing

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{ProcessRegistry, process_name_matches};

/// Mock process registry for unit/integration testing.
///
/// Holds a scripted list of "live" process names. Successful kills remove the
/// matching names; failed kills leave them running.
#[derive(Default)]
pub struct MockRegistry {
    running: Arc<Mutex<Vec<String>>>,
    kill_calls: Arc<Mutex<Vec<String>>>,
    lookup_calls: Arc<AtomicUsize>,

    /// Names whose kill attempts fail (e.g. owned by another user)
    pub unkillable: Arc<Mutex<HashSet<String>>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a process with the given observed name
    pub fn launch(&self, name: &str) {
        self.running.lock().unwrap().push(name.to_string());
    }

    /// Simulate every process with this observed name exiting on its own
    pub fn exit(&self, name: &str) {
        self.running.lock().unwrap().retain(|p| p != name);
    }

    /// Simulate all processes exiting
    pub fn exit_all(&self) {
        self.running.lock().unwrap().clear();
    }

    /// Make kill attempts against this observed name fail
    pub fn make_unkillable(&self, name: &str) {
        self.unkillable.lock().unwrap().insert(name.to_string());
    }

    /// Observed names of processes currently "running"
    pub fn running(&self) -> Vec<String> {
        self.running.lock().unwrap().clone()
    }

    /// Tracked names passed to `kill`, in call order
    pub fn kill_calls(&self) -> Vec<String> {
        self.kill_calls.lock().unwrap().clone()
    }

    /// Number of `is_running` queries made so far
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRegistry for MockRegistry {
    async fn is_running(&self, name: &str) -> bool {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.running
            .lock()
            .unwrap()
            .iter()
            .any(|p| process_name_matches(name, p))
    }

    async fn kill(&self, name: &str) -> bool {
        self.kill_calls.lock().unwrap().push(name.to_string());

        let unkillable = self.unkillable.lock().unwrap().clone();
        let mut running = self.running.lock().unwrap();

        let matches: Vec<String> = running
            .iter()
            .filter(|p| process_name_matches(name, p))
            .cloned()
            .collect();

        if matches.is_empty() {
            return false;
        }

        if matches.iter().any(|p| unkillable.contains(p)) {
            // Processes killed before the failure stay dead, like a real kill loop
            running.retain(|p| !process_name_matches(name, p) || unkillable.contains(p));
            return false;
        }

        running.retain(|p| !process_name_matches(name, p));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_launch_and_kill() {
        let registry = MockRegistry::new();
        registry.launch("hl2");

        assert!(registry.is_running("hl2.exe").await);
        assert!(registry.kill("hl2.exe").await);
        assert!(!registry.is_running("hl2.exe").await);
        assert_eq!(registry.kill_calls(), vec!["hl2.exe".to_string()]);
        assert_eq!(registry.lookup_calls(), 2);
    }

    #[tokio::test]
    async fn mock_kill_without_match_is_false() {
        let registry = MockRegistry::new();
        assert!(!registry.kill("dota2.exe").await);
    }

    #[tokio::test]
    async fn mock_kill_failure_keeps_process() {
        let registry = MockRegistry::new();
        registry.launch("valorant");
        registry.make_unkillable("valorant");

        assert!(!registry.kill("valorant.exe").await);
        assert!(registry.is_running("valorant.exe").await);
    }

    #[tokio::test]
    async fn mock_kills_every_instance() {
        let registry = MockRegistry::new();
        registry.launch("smite");
        registry.launch("Smite");
        registry.launch("other");

        assert!(registry.kill("smite.exe").await);
        assert_eq!(registry.running(), vec!["other".to_string()]);
    }
}
