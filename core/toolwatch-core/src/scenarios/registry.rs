use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioDescriptor {
    pub id: String,
    pub display_name: String,
    pub expected_tool_count: u32,
    pub description: String,
}

const ENTRIES: &[(&str, &str, u32, &str)] = &[
    ("github-dev", "GitHub Development", 48, "GitHub plus development tools"),
    ("github-full", "Full GitHub", 65, "The most complete GitHub setup"),
    ("fullstack", "Full-Stack Development", 63, "Full-stack development essentials"),
    ("github-web", "GitHub Web", 59, "GitHub plus web automation"),
    ("testing", "Testing & Monitoring", 53, "Dedicated testing scenario"),
    ("development", "Basic Development", 48, "Everyday development essentials"),
    ("web", "Web Automation", 44, "Web automation and data scraping"),
    ("minimal", "Minimal", 11, "Lightest configuration"),
];

static REGISTRY: Lazy<Vec<ScenarioDescriptor>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|(id, name, tools, description)| ScenarioDescriptor {
            id: id.to_string(),
            display_name: name.to_string(),
            expected_tool_count: *tools,
            description: description.to_string(),
        })
        .collect()
});

/// All registered scenarios, in detection order.
pub fn scenarios() -> &'static [ScenarioDescriptor] {
    &REGISTRY
}

pub fn lookup(scenario_id: &str) -> Option<&'static ScenarioDescriptor> {
    REGISTRY.iter().find(|scenario| scenario.id == scenario_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_order_is_stable() {
        let ids: Vec<&str> = scenarios().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "github-dev",
                "github-full",
                "fullstack",
                "github-web",
                "testing",
                "development",
                "web",
                "minimal"
            ]
        );
    }

    #[test]
    fn lookup_finds_registered_scenarios_only() {
        assert_eq!(lookup("minimal").unwrap().expected_tool_count, 11);
        assert_eq!(lookup("web").unwrap().display_name, "Web Automation");
        assert!(lookup("custom").is_none());
        assert!(lookup("unknown").is_none());
    }
}
