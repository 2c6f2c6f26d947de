//! Access gate
//!
//! Decides, per operation and path, whether a request may proceed. Decisions
//! come from temporary allowances granted at earlier prompts, a session-wide
//! allow-all flag, or a fresh interactive prompt.

pub mod clock;
pub mod engine;
pub mod prompt;
pub mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Decision, RuleEngine};
pub use prompt::{ConsoleResponder, Responder, Response, ScriptedResponder};
pub use rules::{Rule, RuleKey, RuleLookup, RuleScope, RuleTable};
