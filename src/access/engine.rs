//! Rule engine
//!
//! Per check: allow-all short-circuits, then a stored allowance for the key
//! is consumed if still valid, otherwise the responder is prompted until it
//! gives a recognisable answer.

use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};

use crate::access::clock::{Clock, SystemClock};
use crate::access::prompt::{ConsoleResponder, Responder, Response, USAGE, question};
use crate::access::rules::{Rule, RuleKey, RuleLookup, RuleScope, RuleTable};
use crate::error::{FsError, FsResult};
use crate::ops::Op;

/// Timed allowances longer than this are shortened to it.
pub const LONGEST_ALLOWANCE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Outcome of one authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Interactive mode is off; every call passes.
    Unguarded,
    AllowAll,
    /// A stored allowance approved the call.
    Allowance,
    /// The user approved this call only.
    Once,
    /// The user approved this call and stored a new allowance.
    Granted(Rule),
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied)
    }

    /// Convert a denial into [`FsError::PermissionDenied`] for `path`.
    pub fn into_result(self, path: &str) -> FsResult<()> {
        match self {
            Decision::Denied => Err(FsError::permission_denied(path)),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Unguarded => f.write_str("allowed (prompts disabled)"),
            Decision::AllowAll => f.write_str("allowed (allow-all)"),
            Decision::Allowance => f.write_str("allowed (stored allowance)"),
            Decision::Once => f.write_str("allowed once"),
            Decision::Granted(Rule::Until(_)) => f.write_str("allowed (new timed allowance)"),
            Decision::Granted(Rule::Remaining(n)) => {
                write!(f, "allowed (new allowance for {n} more calls)")
            }
            Decision::Denied => f.write_str("denied"),
        }
    }
}

pub struct RuleEngine {
    interactive: bool,
    scope: RuleScope,
    allow_all: bool,
    rules: RuleTable,
    responder: Box<dyn Responder>,
    clock: Box<dyn Clock>,
}

impl RuleEngine {
    /// Engine prompting on the console.
    pub fn new(interactive: bool, scope: RuleScope) -> Self {
        Self::with_responder(interactive, scope, ConsoleResponder)
    }

    pub fn with_responder(
        interactive: bool,
        scope: RuleScope,
        responder: impl Responder + 'static,
    ) -> Self {
        Self {
            interactive,
            scope,
            allow_all: false,
            rules: RuleTable::new(),
            responder: Box::new(responder),
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the time source used for allowance expiry.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn scope(&self) -> RuleScope {
        self.scope
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// True once a prompt was answered with `a`. Never resets.
    pub fn allow_all(&self) -> bool {
        self.allow_all
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn authorize(&mut self, op: Op, path: &str) -> Decision {
        if !self.interactive {
            return Decision::Unguarded;
        }
        if self.allow_all {
            return Decision::AllowAll;
        }

        let key = RuleKey::new(self.scope, op, path);
        match self.rules.consume(&key, self.clock.now()) {
            RuleLookup::Granted => return Decision::Allowance,
            RuleLookup::Expired => debug!("allowance for {key} expired"),
            RuleLookup::Missing => {}
        }
        self.prompt(op, path, key)
    }

    fn prompt(&mut self, op: Op, path: &str, key: RuleKey) -> Decision {
        let question = question(op, path);
        loop {
            let answer = match self.responder.ask(&question) {
                Ok(Some(answer)) => answer,
                Ok(None) => {
                    debug!("no more prompt input, denying {op} {path}");
                    return Decision::Denied;
                }
                Err(e) => {
                    warn!("failed to read prompt answer: {e}");
                    return Decision::Denied;
                }
            };

            match Response::parse(&answer) {
                Some(Response::AllowOnce) => return Decision::Once,
                Some(Response::Deny) => return Decision::Denied,
                Some(Response::AllowAll) => {
                    info!("allow-all enabled for the rest of the session");
                    self.allow_all = true;
                    return Decision::AllowAll;
                }
                Some(Response::AllowFor(duration)) => {
                    let duration = duration.min(LONGEST_ALLOWANCE);
                    if let Some(expires_at) = self.clock.now().checked_add(duration) {
                        return self.grant(key, Rule::Until(expires_at));
                    }
                }
                Some(Response::AllowTimes(uses)) => {
                    return self.grant(key, Rule::Remaining(uses));
                }
                None => {}
            }
            self.responder.remind(USAGE);
        }
    }

    fn grant(&mut self, key: RuleKey, rule: Rule) -> Decision {
        debug!("storing allowance {rule:?} for {key}");
        self.rules.grant(key, rule);
        Decision::Granted(rule)
    }
}
