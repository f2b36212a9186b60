/// Capability calls admitted scripts may never contain. Scripts are
/// third-party content, this is a coarse textual firewall in front of the
/// execution sandbox, true isolation stays the executor's job.
const FORBIDDEN_CALLS: &[&str] = &[
    "world.spawn_portal(",
    "world.destroy(",
    "session.disconnect(",
    "os.execute(",
    "io.popen(",
    "loadstring(",
];

/// Script text that passed admission. Execution is the sandbox collaborator's
/// responsibility, the view exposes nothing but the source.
#[derive(Debug)]
pub struct ScriptView {
    source: String,
}

impl ScriptView {
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug)]
pub enum Admission {
    Granted(ScriptView),
    /// Carries the pattern that matched, for the rejection log line.
    Rejected(&'static str),
}

pub struct ScriptGate {}

impl ScriptGate {
    pub fn admit(source: String) -> Admission {
        match FORBIDDEN_CALLS.iter().copied().find(|pattern| source.contains(pattern)) {
            Some(pattern) => Admission::Rejected(pattern),
            None => Admission::Granted(ScriptView { source }),
        }
    }
}
