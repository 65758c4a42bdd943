//! `StateMachineDefinition` — an immutable (after registration) named set of
//! states and transitions.

use std::collections::BTreeMap;

use crate::error::StateMachineError;

#[derive(Debug, Clone, Default)]
pub struct StateDef {
    pub is_final: bool,
    pub is_error: bool,
    pub metadata: BTreeMap<String, String>,
}

impl StateDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn final_ok() -> Self {
        Self {
            is_final: true,
            ..Self::default()
        }
    }

    pub fn final_error() -> Self {
        Self {
            is_final: true,
            is_error: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionDef {
    pub from_state: String,
    pub to_state: String,
    pub auto_transform: bool,
    /// Opaque condition string; the engine itself does not interpret it
    /// (no general expression language), callers may inspect it in a
    /// transition handler.
    pub condition: Option<String>,
}

impl TransitionDef {
    pub fn new(from_state: impl Into<String>, to_state: impl Into<String>) -> Self {
        Self {
            from_state: from_state.into(),
            to_state: to_state.into(),
            auto_transform: false,
            condition: None,
        }
    }

    pub fn auto(mut self) -> Self {
        self.auto_transform = true;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct StateMachineDefinition {
    pub name: String,
    pub initial_state: String,
    pub states: BTreeMap<String, StateDef>,
    /// Insertion order is preserved via `transition_order`, since the
    /// "first discovered" auto-transform tie-break is defined as
    /// definition-file order, not map iteration order.
    pub transitions: BTreeMap<String, TransitionDef>,
    transition_order: Vec<String>,
}

impl StateMachineDefinition {
    pub fn builder(name: impl Into<String>, initial_state: impl Into<String>) -> StateMachineDefinitionBuilder {
        StateMachineDefinitionBuilder {
            name: name.into(),
            initial_state: initial_state.into(),
            states: BTreeMap::new(),
            transitions: BTreeMap::new(),
            transition_order: Vec::new(),
        }
    }

    pub fn transition_by_name(&self, name: &str) -> Option<&TransitionDef> {
        self.transitions.get(name)
    }

    /// Find the auto-transform whose `FromState` matches `state`, preferring
    /// definition-file order when more than one exists — this is an
    /// already-rejected case at registration time, but `find` stays total
    /// for callers that bypass the registry (e.g. ad-hoc definitions built
    /// in tests).
    pub fn auto_transform_from(&self, state: &str) -> Option<&TransitionDef> {
        self.transition_order
            .iter()
            .filter_map(|name| self.transitions.get(name))
            .find(|t| t.auto_transform && t.from_state == state)
    }

    pub fn validate(&self) -> Result<(), StateMachineError> {
        if self.name.is_empty() {
            return Err(StateMachineError::Config("definition name must not be empty".to_string()));
        }
        if self.states.is_empty() {
            return Err(StateMachineError::Config(format!("definition {:?} has no states", self.name)));
        }
        if !self.states.contains_key(&self.initial_state) {
            return Err(StateMachineError::Config(format!(
                "definition {:?} initial state {:?} is not declared in states",
                self.name, self.initial_state
            )));
        }
        for (name, t) in &self.transitions {
            if !self.states.contains_key(&t.from_state) {
                return Err(StateMachineError::Config(format!(
                    "transition {name:?} from_state {:?} is not declared in states",
                    t.from_state
                )));
            }
            if !self.states.contains_key(&t.to_state) {
                return Err(StateMachineError::Config(format!(
                    "transition {name:?} to_state {:?} is not declared in states",
                    t.to_state
                )));
            }
        }

        let mut seen_auto: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for name in &self.transition_order {
            if let Some(t) = self.transitions.get(name) {
                if t.auto_transform {
                    seen_auto.entry(t.from_state.as_str()).or_default().push(name.clone());
                }
            }
        }
        for (state, names) in seen_auto {
            if names.len() > 1 {
                return Err(StateMachineError::AmbiguousAutoTransform {
                    definition: self.name.clone(),
                    state: state.to_string(),
                    transitions: names,
                });
            }
        }
        Ok(())
    }
}

pub struct StateMachineDefinitionBuilder {
    name: String,
    initial_state: String,
    states: BTreeMap<String, StateDef>,
    transitions: BTreeMap<String, TransitionDef>,
    transition_order: Vec<String>,
}

impl StateMachineDefinitionBuilder {
    pub fn state(mut self, name: impl Into<String>, def: StateDef) -> Self {
        self.states.insert(name.into(), def);
        self
    }

    pub fn transition(mut self, name: impl Into<String>, def: TransitionDef) -> Self {
        let name = name.into();
        self.transition_order.push(name.clone());
        self.transitions.insert(name, def);
        self
    }

    pub fn build(self) -> Result<StateMachineDefinition, StateMachineError> {
        let def = StateMachineDefinition {
            name: self.name,
            initial_state: self.initial_state,
            states: self.states,
            transitions: self.transitions,
            transition_order: self.transition_order,
        };
        def.validate()?;
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_initial_state() {
        let err = StateMachineDefinition::builder("d", "missing")
            .state("a", StateDef::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, StateMachineError::Config(_)));
    }

    #[test]
    fn rejects_two_auto_transforms_from_same_state() {
        let err = StateMachineDefinition::builder("d", "a")
            .state("a", StateDef::new())
            .state("b", StateDef::new())
            .state("c", StateDef::new())
            .transition("to_b", TransitionDef::new("a", "b").auto())
            .transition("to_c", TransitionDef::new("a", "c").auto())
            .build()
            .unwrap_err();
        assert!(matches!(err, StateMachineError::AmbiguousAutoTransform { .. }));
    }

    #[test]
    fn auto_transform_from_returns_the_single_match() {
        let def = StateMachineDefinition::builder("d", "a")
            .state("a", StateDef::new())
            .state("b", StateDef::final_ok())
            .transition("to_b", TransitionDef::new("a", "b").auto())
            .build()
            .unwrap();
        assert_eq!(def.auto_transform_from("a").unwrap().to_state, "b");
        assert!(def.auto_transform_from("b").is_none());
    }
}
