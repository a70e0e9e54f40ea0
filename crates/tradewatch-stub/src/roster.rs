//! Built-in agent population served by the stub.

use tradewatch_core::model::agent::{AgentDetail, AgentSummary, InventoryItem, MemorySnippet, Personality};

pub const DEFAULT_POPULATION: &str = "Synthetic";

/// One simulated trader: profile plus the lines it draws on in conversation.
#[derive(Debug, Clone)]
pub struct Persona {
    pub detail: AgentDetail,
    pub openers: &'static [&'static str],
    pub replies: &'static [&'static str],
    pub musings: &'static [&'static str],
}

impl Persona {
    pub fn id(&self) -> &str {
        &self.detail.id
    }

    pub fn name(&self) -> &str {
        &self.detail.name
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            id: self.detail.id.clone(),
            name: self.detail.name.clone(),
            age: self.detail.age,
            occupation: self.detail.occupation.clone(),
            address: self.detail.address.clone(),
            inventory_count: self.detail.inventory.len(),
            self_description: self.detail.self_description.clone(),
            personality: self.detail.personality,
        }
    }
}

fn item(name: &str, quantity: u32, base_value: f64, description: &str) -> InventoryItem {
    InventoryItem {
        name: name.to_string(),
        quantity,
        base_value,
        cost_value: (base_value * 0.6 * 100.0).round() / 100.0,
        description: description.to_string(),
    }
}

fn memory(text: &str, importance: f64) -> MemorySnippet {
    MemorySnippet {
        text: text.to_string(),
        created: 0.0,
        importance,
    }
}

#[allow(clippy::too_many_arguments)]
fn detail(
    id: &str,
    name: &str,
    age: u32,
    occupation: &str,
    address: &str,
    education: &str,
    personality: [f64; 5],
    self_description: &str,
    inventory: Vec<InventoryItem>,
    recent_memories: Vec<MemorySnippet>,
) -> AgentDetail {
    let [extraversion, agreeableness, conscientiousness, neuroticism, openness] = personality;
    AgentDetail {
        id: id.to_string(),
        name: name.to_string(),
        age,
        occupation: occupation.to_string(),
        address: address.to_string(),
        education: education.to_string(),
        personality: Personality {
            extraversion,
            agreeableness,
            conscientiousness,
            neuroticism,
            openness,
        },
        self_description: self_description.to_string(),
        inventory,
        recent_memories,
    }
}

/// The population named `name`, or `None` if the stub does not know it.
pub fn population(name: &str) -> Option<Vec<Persona>> {
    (name == DEFAULT_POPULATION).then(synthetic)
}

pub fn synthetic() -> Vec<Persona> {
    vec![
        Persona {
            detail: detail(
                "rowan_greenwood",
                "Rowan Greenwood",
                34,
                "Herbalist",
                "Willow Lane cottage",
                "Apprenticeship in botany",
                [0.4, 0.8, 0.6, 0.3, 0.9],
                "A patient herbalist who grows most of what she sells and likes to haggle over tea.",
                vec![
                    item("herbal_tea", 5, 15.0, "Calming herbal tea blend"),
                    item("dried_lavender", 12, 6.0, "Bundles of dried lavender"),
                    item("property_contracts", 3, 200.0, "Real estate contracts ready to sign"),
                ],
                vec![memory("Sold three tins of tea at the spring fair", 6.0)],
            ),
            openers: &[
                "Good morning! Can I interest you in a fresh blend of tea?",
                "I have lavender straight from the garden today.",
            ],
            replies: &[
                "That seems fair, though the harvest was small this year.",
                "I could part with it for a little less if you take two.",
                "Let me think about that offer.",
            ],
            musings: &[
                "People pay more when they can smell the product.",
                "I should keep some stock back for winter.",
            ],
        },
        Persona {
            detail: detail(
                "mei_chen",
                "Mei Chen",
                29,
                "Graduate student",
                "University dormitory B",
                "MSc Applied Mathematics",
                [0.5, 0.6, 0.9, 0.4, 0.7],
                "A methodical maths student selling old course material to fund her research.",
                vec![
                    item("textbooks", 4, 85.0, "Advanced mathematics textbooks"),
                    item("graphing_calculator", 1, 120.0, "TI-84 Plus calculator"),
                    item("tutoring_sessions", 2, 40.0, "One-hour math tutoring sessions"),
                ],
                vec![memory("Finished grading the midterm papers", 4.0)],
            ),
            openers: &[
                "Hi, are you looking for study material by any chance?",
                "I am clearing out my shelves, everything must go.",
            ],
            replies: &[
                "The calculator is barely used, the price reflects that.",
                "I can include a tutoring session with the books.",
                "I need to cover my costs at least.",
            ],
            musings: &[
                "Bundling items made the last sale much easier.",
                "I underpriced the textbooks last time.",
            ],
        },
        Persona {
            detail: detail(
                "carlos_mendez",
                "Carlos Mendez",
                47,
                "Carpenter",
                "Old mill workshop",
                "Trade school",
                [0.7, 0.5, 0.7, 0.2, 0.5],
                "A carpenter with strong opinions about tools and an eye for a bargain.",
                vec![
                    item("axe", 3, 50.0, "Hand-forged felling axe"),
                    item("oak_planks", 20, 12.0, "Seasoned oak planks"),
                    item("chair", 2, 95.0, "Hand-made oak chair"),
                ],
                vec![memory("Repaired the bakery's front door", 5.0)],
            ),
            openers: &[
                "Need anything built or any tools sharpened?",
                "These axes will outlast both of us.",
            ],
            replies: &[
                "Quality costs money, my friend.",
                "Alright, you drive a hard bargain.",
                "I might throw in a plank or two.",
            ],
            musings: &[
                "Tools sell faster than furniture in this market.",
                "I should raise the price of the chairs.",
            ],
        },
        Persona {
            detail: detail(
                "bianca_silva",
                "Bianca Silva",
                38,
                "Baker",
                "Market square bakery",
                "Culinary institute",
                [0.9, 0.7, 0.5, 0.5, 0.6],
                "A cheerful baker who trades bread for just about anything useful.",
                vec![
                    item("sourdough", 10, 8.0, "Fresh sourdough loaf"),
                    item("pastry_box", 6, 18.0, "Box of assorted pastries"),
                    item("flour_sack", 4, 25.0, "Sack of stone-ground flour"),
                ],
                vec![memory("Ran out of sourdough before noon", 3.0)],
            ),
            openers: &[
                "Fresh bread, still warm! Want a taste?",
                "I baked extra pastries this morning.",
            ],
            replies: &[
                "For you, a special price.",
                "Bread does not keep, so let us make a deal today.",
                "I could trade for something from your stall.",
            ],
            musings: &[
                "Morning customers are the most generous.",
                "Trading pastries built more goodwill than cash sales.",
            ],
        },
        Persona {
            detail: detail(
                "pema_sherpa",
                "Pema Sherpa",
                41,
                "Mountain guide",
                "Trailhead lodge",
                "Mountaineering certification",
                [0.3, 0.7, 0.8, 0.2, 0.8],
                "A quiet mountain guide who sells gear between expeditions.",
                vec![
                    item("climbing_rope", 3, 60.0, "Dynamic climbing rope, 60m"),
                    item("lantern", 4, 22.0, "Oil lantern"),
                    item("guided_hike", 2, 75.0, "Half-day guided hike"),
                ],
                vec![memory("Led a group over the north pass", 7.0)],
            ),
            openers: &[
                "Planning any trips? I have gear that has seen the summit.",
                "This lantern got me through a storm last winter.",
            ],
            replies: &[
                "Safety gear is not where you save money.",
                "I can lower the price if you book a hike as well.",
                "That is close to what I paid for it.",
            ],
            musings: &[
                "Stories about the mountains help sell the gear.",
                "I should keep one rope for the next expedition.",
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_population_is_well_formed() {
        let personas = population(DEFAULT_POPULATION).unwrap();
        assert_eq!(personas.len(), 5);
        for persona in &personas {
            assert!(!persona.detail.inventory.is_empty());
            assert!(!persona.openers.is_empty());
            assert!(!persona.replies.is_empty());
            assert!(!persona.musings.is_empty());
            assert_eq!(persona.summary().inventory_count, persona.detail.inventory.len());
        }
        assert!(population("Imaginary").is_none());
    }
}
