use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use procwarden::credentials::{IdentityLookup, IdentityRecord};
use procwarden::errors::{ProcwardenError, Result};

/// A fake identity lookup that:
/// - answers from a fixed table of users
/// - records every user name it was asked about
/// - can be told to fail like a broken lookup command
/// - can be held inside `lookup` until released, like a slow name service.
#[derive(Debug, Clone, Default)]
pub struct FakeIdentityLookup {
    users: HashMap<String, IdentityRecord>,
    broken: bool,
    queried: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<GateInner>>,
}

#[derive(Debug, Default)]
struct GateInner {
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    entered: bool,
    open: bool,
}

/// Controls a held [`FakeIdentityLookup`].
#[derive(Debug, Clone)]
pub struct LookupGate {
    inner: Arc<GateInner>,
}

impl LookupGate {
    /// True once some `lookup` call is blocked on this gate.
    pub fn entered(&self) -> bool {
        self.inner.state.lock().unwrap().entered
    }

    /// Let held and future lookups through.
    pub fn release(&self) {
        self.inner.state.lock().unwrap().open = true;
        self.inner.changed.notify_all();
    }
}

impl GateInner {
    fn pass(&self) {
        let mut state = self.state.lock().unwrap();
        state.entered = true;
        while !state.open {
            state = self.changed.wait(state).unwrap();
        }
    }
}

impl FakeIdentityLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with a well-formed `id`-style report.
    pub fn with_user(self, name: &str, uid: u32, gid: u32, groups: &[(u32, &str)]) -> Self {
        let entries = groups
            .iter()
            .map(|(id, group)| format!("{id}({group})"))
            .collect::<Vec<_>>()
            .join(",");
        let report = format!("uid={uid}({name}) gid={gid}({name}) groups={entries}");
        self.with_report(name, uid, gid, &report)
    }

    /// Add a user with an arbitrary report text.
    pub fn with_report(mut self, name: &str, uid: u32, gid: u32, report: &str) -> Self {
        self.users.insert(
            name.to_string(),
            IdentityRecord {
                uid,
                gid,
                report: report.to_string(),
            },
        );
        self
    }

    /// Make every lookup fail.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    /// Block every lookup until the returned gate is released.
    pub fn held(mut self) -> (Self, LookupGate) {
        let inner = Arc::new(GateInner::default());
        self.gate = Some(Arc::clone(&inner));
        (self, LookupGate { inner })
    }

    /// Shared log of queried user names.
    pub fn queried(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.queried)
    }
}

impl IdentityLookup for FakeIdentityLookup {
    fn lookup(&self, user: &str) -> Result<Option<IdentityRecord>> {
        self.queried.lock().unwrap().push(user.to_string());

        if let Some(gate) = &self.gate {
            gate.pass();
        }

        if self.broken {
            return Err(ProcwardenError::IdentityLookup {
                user: user.to_string(),
                reason: "lookup command failed to execute".to_string(),
            });
        }

        Ok(self.users.get(user).cloned())
    }
}
