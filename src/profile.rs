use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Goal {
    Maintenance,
    #[serde(rename = "Weight Loss")]
    WeightLoss,
    #[serde(rename = "Muscle Gain")]
    MuscleGain,
}

impl Goal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::Maintenance => "Maintenance",
            Goal::WeightLoss => "Weight Loss",
            Goal::MuscleGain => "Muscle Gain",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileValidationError {
    #[error("age must be a positive integer")]
    AgeOutOfRange,
    #[error("hungerLevel must be between 1 and 10")]
    HungerLevelOutOfRange,
}

/// Profile fields captured by the frontend, read-only to the analysis
/// orchestrator. Lives for one UI session; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub age: u32,
    pub gender: Gender,
    pub goal: Goal,
    #[serde(default)]
    pub sensitivities: Vec<String>,
    #[serde(default)]
    pub dislikes: String,
    #[serde(default)]
    pub bio: String,
    pub hunger_level: u8,
}

impl UserProfile {
    /// Sensitivities are a set: trim entries, drop empties, dedupe
    /// case-insensitively while keeping first-seen order.
    pub fn normalize(&mut self) {
        let mut seen = Vec::new();
        let mut kept = Vec::new();
        for entry in self.sensitivities.drain(..) {
            let trimmed = entry.trim().to_string();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            kept.push(trimmed);
        }
        self.sensitivities = kept;
    }

    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        if self.age == 0 {
            return Err(ProfileValidationError::AgeOutOfRange);
        }
        if !(1..=10).contains(&self.hunger_level) {
            return Err(ProfileValidationError::HungerLevelOutOfRange);
        }
        Ok(())
    }

    /// Hunger as a fraction of capacity, rounded to two decimals for
    /// display (8 -> 0.80).
    pub fn normalized_hunger_load(&self) -> f64 {
        (self.hunger_level as f64 / 10.0 * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> UserProfile {
        UserProfile {
            age: 28,
            gender: Gender::Male,
            goal: Goal::Maintenance,
            sensitivities: vec!["Lactose".to_string()],
            dislikes: "Feeling bloated".to_string(),
            bio: String::new(),
            hunger_level: 8,
        }
    }

    #[test]
    fn hunger_load_is_value_over_ten_with_two_decimals() {
        let profile = sample_profile();
        assert_eq!(profile.normalized_hunger_load(), 0.80);
        // Repeated computation does not drift.
        assert_eq!(profile.normalized_hunger_load(), 0.80);

        let mut profile = profile;
        profile.hunger_level = 3;
        assert_eq!(profile.normalized_hunger_load(), 0.30);
    }

    #[test]
    fn normalize_dedupes_sensitivities_case_insensitively() {
        let mut profile = sample_profile();
        profile.sensitivities = vec![
            " Lactose ".to_string(),
            "gluten".to_string(),
            "LACTOSE".to_string(),
            "".to_string(),
        ];
        profile.normalize();
        assert_eq!(profile.sensitivities, vec!["Lactose", "gluten"]);
    }

    #[test]
    fn validate_rejects_out_of_range_fields() {
        let mut profile = sample_profile();
        profile.age = 0;
        assert!(matches!(
            profile.validate(),
            Err(ProfileValidationError::AgeOutOfRange)
        ));

        let mut profile = sample_profile();
        profile.hunger_level = 11;
        assert!(matches!(
            profile.validate(),
            Err(ProfileValidationError::HungerLevelOutOfRange)
        ));

        assert!(sample_profile().validate().is_ok());
    }

    #[test]
    fn goal_serializes_with_display_spelling() {
        let json = serde_json::to_string(&Goal::WeightLoss).unwrap();
        assert_eq!(json, "\"Weight Loss\"");
        let parsed: Goal = serde_json::from_str("\"Muscle Gain\"").unwrap();
        assert_eq!(parsed, Goal::MuscleGain);
    }

    #[test]
    fn profile_round_trips_as_camel_case_json() {
        let profile = sample_profile();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["hungerLevel"], 8);
        assert_eq!(json["gender"], "Male");

        let parsed: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.hunger_level, profile.hunger_level);
        assert_eq!(parsed.goal, profile.goal);
    }
}
