/// Ordered, append-only log of the steps a probe attempted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Trace {
    entries: Vec<String>,
}

pub const ENTRY_PREFIX: &str = "[*] ";

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl AsRef<str>) {
        let entry = format!("{ENTRY_PREFIX}{}", message.as_ref());
        tracing::debug!(target: "launch_probe::trace", "{entry}");
        self.entries.push(entry);
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    #[allow(dead_code)]
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|entry| entry.contains(needle))
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}
