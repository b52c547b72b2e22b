pub mod catalog;

use crate::logic::SimulationPlan;
use catalog::CATALOG;

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

pub fn get_scenario(key: &str) -> Option<TestScenario> {
    let key = key.to_lowercase();
    CATALOG
        .iter()
        .find(|entry| entry.key == key || entry.aliases.contains(&key.as_str()))
        .map(|entry| TestScenario::simulation(entry.title, (entry.build)()))
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    CATALOG.iter().map(|entry| (entry.key, entry.title)).collect()
}
