//! Voice query responder: keyword dispatch over canned answers
//!
//! The query is lower-cased and split into word tokens. Rules are checked in
//! table order and the first rule with a keyword present in the token set
//! wins; no match yields the fallback answer. The responder holds no state,
//! so the same query always produces the same reply.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Weather,
    Prices,
    Disease,
    Fertilizer,
    Cultivation,
    Pest,
    Soil,
    Season,
    Fallback,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Weather => "weather",
            Intent::Prices => "prices",
            Intent::Disease => "disease",
            Intent::Fertilizer => "fertilizer",
            Intent::Cultivation => "cultivation",
            Intent::Pest => "pest",
            Intent::Soil => "soil",
            Intent::Season => "season",
            Intent::Fallback => "fallback",
        }
    }

    pub fn response(&self) -> &'static str {
        match self {
            Intent::Greeting => "Hello! I'm your GrowWise farming assistant. I can help you with weather information, market prices, plant disease detection, and general farming guidance. What would you like to know?",
            Intent::Weather => "To get current weather information, use the Weather tab. Enter your city name or allow location access to get real-time weather data including temperature, humidity, and wind speed.",
            Intent::Prices => "Check the Market Prices section for current rates of vegetables and fruits. You can filter by category to see specific produce prices in your area.",
            Intent::Disease => "For plant disease detection, use the Disease Detection tab. Take a clear photo of the affected plant leaves and upload it for analysis and treatment recommendations.",
            Intent::Fertilizer => "For fertilizer recommendations: use nitrogen-rich fertilizers for leafy growth, phosphorus for root development, and potassium for flowering. Consider organic compost and get soil testing for specific nutrient needs.",
            Intent::Cultivation => "Cultivation tips: choose seeds based on your local climate and soil type. Ensure proper spacing, watering schedule, and crop rotation. Consult your local agricultural extension office for region-specific advice.",
            Intent::Pest => "For pest management: use integrated pest management (IPM) approaches. Try neem oil, companion planting, and beneficial insects before chemical pesticides. Regular monitoring is key to early detection.",
            Intent::Soil => "Soil health tips: test your soil pH (6.0-7.0 is ideal for most crops). Improve drainage with organic matter. Add compost regularly to maintain soil structure and fertility.",
            Intent::Season => "Seasonal farming: plan crops according to local seasons. Monsoon is ideal for rice and sugarcane. Winter is good for wheat and vegetables. Summer crops include cotton and pulses.",
            Intent::Fallback => "I'm here to help with farming! I can assist with:\n- Weather information\n- Market prices\n- Plant disease detection\n- Soil and fertilizer advice\n- Pest management\n- Cultivation tips\n\nPlease ask me something specific about farming!",
        }
    }
}

struct Rule {
    intent: Intent,
    /// Single words, or space-separated phrases matched as consecutive tokens.
    keywords: &'static [&'static str],
}

/// Precedence order: earlier rules shadow later ones.
const RULES: &[Rule] = &[
    Rule {
        intent: Intent::Greeting,
        keywords: &[
            "hello", "hi", "hey", "good morning", "good afternoon", "good evening", "namaste",
            "greetings", "howdy",
        ],
    },
    Rule {
        intent: Intent::Weather,
        keywords: &[
            "weather", "temperature", "rain", "climate", "forecast", "sunny", "cloudy", "humidity",
        ],
    },
    Rule {
        intent: Intent::Prices,
        keywords: &[
            "price", "cost", "market", "sell", "buy", "rate", "expensive", "cheap", "rupees",
        ],
    },
    Rule {
        intent: Intent::Disease,
        keywords: &[
            "disease", "sick", "problem", "leaf", "leaves", "plant", "crop", "infection", "pest",
            "spots", "yellow",
        ],
    },
    Rule {
        intent: Intent::Fertilizer,
        keywords: &[
            "fertilizer", "nutrient", "soil", "compost", "manure", "nitrogen", "phosphorus",
            "potassium",
        ],
    },
    Rule {
        intent: Intent::Cultivation,
        keywords: &[
            "seed", "planting", "growing", "cultivation", "harvest", "farming", "irrigation",
            "water",
        ],
    },
    Rule {
        intent: Intent::Pest,
        keywords: &["insect", "bug", "caterpillar", "aphid", "mite", "larvae"],
    },
    Rule {
        intent: Intent::Soil,
        keywords: &["ph", "acidity", "alkaline", "drainage", "clay", "sand", "loam"],
    },
    Rule {
        intent: Intent::Season,
        keywords: &["season", "monsoon", "winter", "summer", "sowing", "timing"],
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceReply {
    pub intent: Intent,
    pub response: &'static str,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceResponder;

impl VoiceResponder {
    pub fn new() -> Self {
        Self
    }

    pub fn respond(&self, query: &str) -> VoiceReply {
        let tokens = tokenize(query);
        let intent = RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|kw| keyword_matches(kw, &tokens)))
            .map(|rule| rule.intent)
            .unwrap_or(Intent::Fallback);

        VoiceReply {
            intent,
            response: intent.response(),
        }
    }

    /// Feature list and sample questions for the help endpoint.
    pub fn help(&self) -> serde_json::Value {
        serde_json::json!({
            "features": [
                "Weather Information - Get current weather for any location",
                "Market Prices - Check latest vegetable and fruit prices",
                "Disease Detection - Upload plant photos for disease diagnosis",
                "Voice Assistant - Ask questions about farming",
                "Analytics - View usage statistics and history"
            ],
            "sample_queries": [
                "What is the weather like today?",
                "Show me tomato prices",
                "My plant leaves are turning yellow",
                "What fertilizer should I use for corn?",
                "Which insect is eating my cabbage?",
                "What is the best soil pH for vegetables?"
            ]
        })
    }
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Exact token match, tolerating a plural "s"/"es" suffix on the token.
/// Two-letter keywords ("hi", "ph") must match exactly so "his" stays unmatched.
fn word_matches(keyword: &str, token: &str) -> bool {
    if token == keyword {
        return true;
    }
    keyword.len() > 2
        && (token.strip_suffix("es").is_some_and(|stem| stem == keyword)
            || token.strip_suffix('s').is_some_and(|stem| stem == keyword))
}

fn keyword_matches(keyword: &str, tokens: &[String]) -> bool {
    let words: Vec<&str> = keyword.split(' ').collect();
    if words.len() == 1 {
        return tokens.iter().any(|t| word_matches(keyword, t));
    }
    tokens
        .windows(words.len())
        .any(|window| window.iter().zip(&words).all(|(t, w)| t == w))
}
