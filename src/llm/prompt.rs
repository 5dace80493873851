use serde_json::{json, Value};

use crate::profile::UserProfile;

/// Builds the user-turn instruction block for one analysis request. Every
/// profile field is embedded verbatim; empty optional fields render as
/// "None" so the model never sees a dangling label.
pub fn build_analysis_instruction(profile: &UserProfile) -> String {
    let sensitivities = if profile.sensitivities.is_empty() {
        "None".to_string()
    } else {
        profile.sensitivities.join(", ")
    };
    let dislikes = if profile.dislikes.trim().is_empty() {
        "None"
    } else {
        profile.dislikes.as_str()
    };
    let bio = if profile.bio.trim().is_empty() {
        "None"
    } else {
        profile.bio.as_str()
    };

    format!(
        r#"USER SYSTEM SPECS (Profile):
- Hardware Model: {age} years, {gender}
- Optimization Goal: {goal}
- Incompatible Dependencies (Allergies): {sensitivities}
- Known Bugs/Issues: {dislikes}
- User Logs (Bio): {bio}
- Current System Load (Hunger): {hunger}/10

TASK: Perform a Code Review on the uploaded food payload and define an Execution Plan.

DEBUGGING PROCESS:
1. STATIC ANALYSIS (Vision): Identify modules (dishes). Detect technical debt (sugar/cream).
2. RESOURCE ESTIMATION: Analyze 'Capacity Cost' (Heap Allocation).
3. COMPATIBILITY CHECK: Check for breaking changes against 'Incompatible Dependencies'.
4. DEPLOYMENT FORECAST: Determine 'Next Morning Comfort Score'.

OUTPUT REQUIREMENTS:
Return a JSON object.
- "markdownReport": A string containing the "Build Status" and "System Forecast" sections in Markdown. DO NOT include the "Execution Plan" header or content here, as it will be provided in the separate list.
- "executionSteps": An array of strings. Each string is a specific, actionable step for the "Eat Order" (e.g., "1. Initialize with salad to prime the cache.")."#,
        age = profile.age,
        gender = profile.gender.as_str(),
        goal = profile.goal.as_str(),
        sensitivities = sensitivities,
        dislikes = dislikes,
        bio = bio,
        hunger = profile.hunger_level,
    )
}

/// Strict output shape for constrained generation: exactly two fields,
/// both required.
pub fn analysis_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "markdownReport": {
                "type": "STRING",
                "description": "The persona analysis (Build Status, System Forecast) in Markdown format."
            },
            "executionSteps": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "A step-by-step list of actionable eating advice (the Execution Plan / Eat Order)."
            }
        },
        "required": ["markdownReport", "executionSteps"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Gender, Goal};

    fn profile() -> UserProfile {
        UserProfile {
            age: 34,
            gender: Gender::Female,
            goal: Goal::MuscleGain,
            sensitivities: vec!["Lactose".to_string(), "Peanuts".to_string()],
            dislikes: "Greasy takeout".to_string(),
            bio: "Night-shift nurse".to_string(),
            hunger_level: 6,
        }
    }

    fn count_occurrences(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn instruction_embeds_every_profile_field_exactly_once() {
        let instruction = build_analysis_instruction(&profile());

        assert_eq!(count_occurrences(&instruction, "34 years, Female"), 1);
        assert_eq!(count_occurrences(&instruction, "Muscle Gain"), 1);
        assert_eq!(count_occurrences(&instruction, "Lactose, Peanuts"), 1);
        assert_eq!(count_occurrences(&instruction, "Greasy takeout"), 1);
        assert_eq!(count_occurrences(&instruction, "Night-shift nurse"), 1);
        assert_eq!(count_occurrences(&instruction, "6/10"), 1);
    }

    #[test]
    fn empty_optional_fields_render_as_none() {
        let mut profile = profile();
        profile.sensitivities.clear();
        profile.dislikes = String::new();
        profile.bio = "  ".to_string();

        let instruction = build_analysis_instruction(&profile);
        assert!(instruction.contains("Incompatible Dependencies (Allergies): None"));
        assert!(instruction.contains("Known Bugs/Issues: None"));
        assert!(instruction.contains("User Logs (Bio): None"));
    }

    #[test]
    fn instruction_forbids_steps_inside_the_report() {
        let instruction = build_analysis_instruction(&profile());
        assert!(instruction.contains("DO NOT include the \"Execution Plan\""));
    }

    #[test]
    fn response_schema_requires_both_fields() {
        let schema = analysis_response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|value| value.as_str())
            .collect();
        assert_eq!(required, vec!["markdownReport", "executionSteps"]);
        assert_eq!(schema["properties"]["executionSteps"]["items"]["type"], "STRING");
    }
}
