//! # NFA: Occurrence-Counting Sequence Matcher
//!
//! Each intermediate state wraps a matcher and an occurrence range
//! `[min, max]`. A run keeps a frontier of `(state, visits)` pairs. On each
//! event a state may re-enter itself (if `visits + 1 <= max` and the matcher
//! accepts the event) or move to another state (if `visits >= min` and the
//! target accepts the event). After the last event one extra step is taken
//! with the end marker, which only the final state accepts. The sequence
//! matches iff the final state is in the resulting frontier.
//!
//! Matcher results are computed at most once per (state, event position),
//! and the frontier is a set, so a run costs `O(events × states × max)`
//! regardless of how ambiguous the automaton is.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use thiserror::Error;

/// Identifies a state within one automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StateId {
    Initial,
    Intermediate(usize),
    Final,
}

/// A matcher with an occurrence range.
#[derive(Debug, Clone)]
pub struct State<M> {
    pub matcher: M,
    pub min: usize,
    /// `None` is unbounded.
    pub max: Option<usize>,
}

impl<M> State<M> {
    pub fn new(matcher: M, min: usize, max: Option<usize>) -> Self {
        Self { matcher, min, max }
    }

    fn can_reenter(&self, visits: usize) -> bool {
        self.max.map_or(true, |max| visits <= max)
    }

    fn can_exit(&self, visits: usize) -> bool {
        self.min <= visits
    }
}

/// Structural problems detected when an automaton is built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NfaError {
    #[error("no transition from the initial state")]
    NoInitialTransition,
    #[error("the final state must not have outgoing transitions")]
    TransitionFromFinal,
    #[error("transition refers to unknown state {0:?}")]
    UnknownState(StateId),
    #[error("the final state is unreachable")]
    FinalUnreachable,
}

/// A validated automaton.
#[derive(Debug, Clone)]
pub struct Nfa<M> {
    states: Vec<State<M>>,
    transitions: BTreeMap<StateId, BTreeSet<StateId>>,
}

impl<M> Nfa<M> {
    /// Validate the transition table against `states` (indexed by
    /// `StateId::Intermediate(i)`).
    pub fn new(
        states: Vec<State<M>>,
        transitions: BTreeMap<StateId, BTreeSet<StateId>>,
    ) -> Result<Self, NfaError> {
        if transitions
            .get(&StateId::Initial)
            .map_or(true, BTreeSet::is_empty)
        {
            return Err(NfaError::NoInitialTransition);
        }
        if transitions
            .get(&StateId::Final)
            .is_some_and(|t| !t.is_empty())
        {
            return Err(NfaError::TransitionFromFinal);
        }
        let known = |id: &StateId| match id {
            StateId::Intermediate(i) => *i < states.len(),
            _ => true,
        };
        let mut reaches_final = false;
        for (from, targets) in &transitions {
            if !known(from) {
                return Err(NfaError::UnknownState(*from));
            }
            for to in targets {
                if !known(to) {
                    return Err(NfaError::UnknownState(*to));
                }
                reaches_final |= *to == StateId::Final;
            }
        }
        if !reaches_final {
            return Err(NfaError::FinalUnreachable);
        }
        Ok(Self {
            states,
            transitions,
        })
    }

    /// The intermediate states in index order.
    pub fn states(&self) -> &[State<M>] {
        &self.states
    }

    /// Run the automaton over `events`; `accepts` decides whether a state's
    /// matcher accepts an event.
    pub fn matches<E>(&self, events: &[E], accepts: impl Fn(&M, &E) -> bool) -> bool {
        let mut frontier = BTreeSet::from([(StateId::Initial, 1usize)]);
        for event in events {
            let mut entry_cache: HashMap<usize, bool> = HashMap::new();
            let mut can_enter = |id: StateId| match id {
                StateId::Initial | StateId::Final => false,
                StateId::Intermediate(i) => *entry_cache
                    .entry(i)
                    .or_insert_with(|| accepts(&self.states[i].matcher, event)),
            };
            frontier = self.step(&frontier, &mut can_enter);
            if frontier.is_empty() {
                return false;
            }
        }
        let mut at_end = |id: StateId| id == StateId::Final;
        self.step(&frontier, &mut at_end)
            .iter()
            .any(|(id, _)| *id == StateId::Final)
    }

    fn step(
        &self,
        frontier: &BTreeSet<(StateId, usize)>,
        can_enter: &mut dyn FnMut(StateId) -> bool,
    ) -> BTreeSet<(StateId, usize)> {
        let mut next = BTreeSet::new();
        for &(from, visits) in frontier {
            let Some(targets) = self.transitions.get(&from) else {
                continue;
            };
            for &to in targets {
                if to == from {
                    if self.can_reenter(from, visits + 1) && can_enter(to) {
                        next.insert((to, visits + 1));
                    }
                } else if self.can_exit(from, visits) && can_enter(to) {
                    next.insert((to, 1));
                }
            }
        }
        next
    }

    fn can_reenter(&self, id: StateId, visits: usize) -> bool {
        match id {
            StateId::Intermediate(i) => self.states[i].can_reenter(visits),
            _ => false,
        }
    }

    fn can_exit(&self, id: StateId, visits: usize) -> bool {
        match id {
            StateId::Initial => true,
            StateId::Intermediate(i) => self.states[i].can_exit(visits),
            StateId::Final => false,
        }
    }
}

// ─── Sequence Builder ───────────────────────────────────────────────────────

/// Builds the automaton for an ordered sequence of occurrence-ranged slots.
///
/// Each slot that can occur more than once loops on itself. Each slot links
/// forward to the following slots up to and including the first one that
/// must occur at least once, and to the final state if every later slot is
/// optional.
pub fn sequence<M>(states: Vec<State<M>>) -> Result<Nfa<M>, NfaError> {
    let ids: Vec<StateId> = std::iter::once(StateId::Initial)
        .chain((0..states.len()).map(StateId::Intermediate))
        .chain(std::iter::once(StateId::Final))
        .collect();

    let mut transitions: BTreeMap<StateId, BTreeSet<StateId>> = BTreeMap::new();
    for (position, &from) in ids.iter().enumerate() {
        let mut targets = BTreeSet::new();
        if let StateId::Intermediate(i) = from {
            if states[i].can_reenter(2) {
                targets.insert(from);
            }
        }
        for &to in &ids[position + 1..] {
            targets.insert(to);
            let skippable = match to {
                StateId::Intermediate(j) => states[j].can_exit(0),
                _ => false,
            };
            if !skippable {
                break;
            }
        }
        if !targets.is_empty() {
            transitions.insert(from, targets);
        }
    }
    Nfa::new(states, transitions)
}
