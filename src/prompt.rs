use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    #[default]
    Natural,
    Strong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOptions {
    pub add_hats: bool,
    pub enhance_env: bool,
    pub intensity: Intensity,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            add_hats: true,
            enhance_env: true,
            intensity: Intensity::Natural,
        }
    }
}

const PRESERVE_POSE: &str = "Strictly preserve the original pose, gesture, facial expression, and body structure of the subject (person or pet). Do not change the action, angle, or composition.";
const CHRISTMAS_BASE: &str =
    "Convert the input photo into a Christmas atmosphere image, realistic photo style";
const SANTA_HATS: &str = "Place red Santa hats on all visible heads, including both people and pets/animals. Ensure each hat fits the original head pose naturally, do not alter the face or hair structure";
const FESTIVE_BACKGROUND: &str = "Add warm festive elements to the background: string lights, garlands, wreaths, gentle snowfall, red green gold palette";
const STRONG_AMBIANCE: &str =
    "Strong holiday ambiance while strictly maintaining subject identity";
const SUBTLE_AMBIANCE: &str = "Subtle holiday ambiance, keep natural look";

pub fn build_prompt(options: &PromptOptions) -> String {
    let mut parts = vec![PRESERVE_POSE, CHRISTMAS_BASE];
    if options.add_hats {
        parts.push(SANTA_HATS);
    }
    if options.enhance_env {
        parts.push(FESTIVE_BACKGROUND);
    }
    parts.push(match options.intensity {
        Intensity::Strong => STRONG_AMBIANCE,
        Intensity::Natural => SUBTLE_AMBIANCE,
    });
    parts.join(". ")
}
