//! Initial prompt construction.
//!
//! Maps a submitted `Profile` to the first message sent to the model. Pure and
//! deterministic: values are interpolated exactly as submitted, without
//! validation (the HTTP layer owns that).

use serde::Serialize;

use crate::models::profile::Profile;
use crate::planner::prompts::{
    GENERAL_PLAN_TEMPLATE, GENERAL_RULE, PROFILE_BLOCK_TEMPLATE, STYLE_GUIDE,
    VEHICLE_PLAN_TEMPLATE,
};

/// Goal text containing any of these (case-insensitive substring) is a vehicle goal.
pub const VEHICLE_KEYWORDS: &[&str] = &["car", "truck", "vehicle", "automobile", "suv", "pickup"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Vehicle,
    General,
}

pub fn classify_goal(goal: &str) -> GoalKind {
    let goal = goal.to_lowercase();
    if VEHICLE_KEYWORDS.iter().any(|k| goal.contains(k)) {
        GoalKind::Vehicle
    } else {
        GoalKind::General
    }
}

/// Builds the one-shot context prompt for a new plan session.
pub fn build_initial_prompt(profile: &Profile) -> String {
    let fields = profile_fields(profile);

    let plan = match classify_goal(&profile.financial_goal) {
        GoalKind::Vehicle => VEHICLE_PLAN_TEMPLATE,
        GoalKind::General => GENERAL_PLAN_TEMPLATE,
    };

    [
        fill(STYLE_GUIDE, &fields),
        fill(plan, &fields),
        GENERAL_RULE.to_string(),
        fill(PROFILE_BLOCK_TEMPLATE, &fields),
    ]
    .join("\n\n")
}

fn profile_fields(profile: &Profile) -> Vec<(&'static str, String)> {
    vec![
        ("name", profile.name.clone()),
        ("age", profile.age.to_string()),
        ("employment_status", profile.employment_status.clone()),
        ("location", profile.location.clone()),
        ("housing_situation", profile.housing_situation.clone()),
        ("dining_habits", profile.dining_habits.clone()),
        ("monthly_subscriptions", profile.monthly_subscriptions.to_string()),
        ("monthly_income", profile.monthly_income.to_string()),
        ("monthly_expenses", profile.monthly_expenses.to_string()),
        ("total_debt", profile.total_debt.to_string()),
        ("credit_score", profile.credit_score.to_string()),
        ("bank_account_balance", profile.bank_account_balance.to_string()),
        ("financial_goal", profile.financial_goal.clone()),
        (
            "financial_confidence_score",
            profile.financial_confidence_score.to_string(),
        ),
    ]
}

/// Single-pass placeholder substitution. Text inserted for one placeholder is
/// never rescanned, so user input containing `{name}` stays literal.
fn fill(template: &str, fields: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            fields
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (v, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::sample_profile;

    fn ana() -> Profile {
        Profile {
            name: "Ana".to_string(),
            financial_goal: "buy a car".to_string(),
            monthly_income: 3000.0,
            credit_score: 680,
            total_debt: 500.0,
            ..sample_profile()
        }
    }

    fn ben() -> Profile {
        Profile {
            name: "Ben".to_string(),
            financial_goal: "pay off debt".to_string(),
            ..sample_profile()
        }
    }

    #[test]
    fn test_classify_goal_is_case_insensitive() {
        assert_eq!(classify_goal("Buy a new CAR"), GoalKind::Vehicle);
        assert_eq!(classify_goal("upgrade my Truck"), GoalKind::Vehicle);
        assert_eq!(classify_goal("finance an AUTOMOBILE"), GoalKind::Vehicle);
        assert_eq!(classify_goal("replace the family vehicle"), GoalKind::Vehicle);
    }

    #[test]
    fn test_classify_goal_general() {
        assert_eq!(classify_goal("pay off debt"), GoalKind::General);
        assert_eq!(classify_goal("Save for a down payment"), GoalKind::General);
        assert_eq!(classify_goal(""), GoalKind::General);
    }

    #[test]
    fn test_vehicle_prompt_embeds_financial_inputs_literally() {
        let prompt = build_initial_prompt(&ana());
        assert!(prompt.contains("Financing Simulation"));
        assert!(prompt.contains("3000"));
        assert!(prompt.contains("680"));
        assert!(prompt.contains("500"));
        assert!(prompt.contains("Welcome Ana"));
        assert!(prompt.contains("Recommend a Toyota"));
        assert!(prompt.contains("Toyota Financial Services vs Capital One Auto Finance"));
        assert!(!prompt.contains("3000.0"));
    }

    #[test]
    fn test_general_prompt_has_no_vehicle_simulation() {
        let prompt = build_initial_prompt(&ben());
        assert!(prompt.contains("Provide Actionable Steps"));
        assert!(prompt.contains("warm welcome to Ben"));
        assert!(!prompt.contains("Financing Simulation"));
        assert!(!prompt.contains("Recommend a Toyota"));
        assert!(!prompt.contains("Capital One Auto Finance"));
        assert!(prompt.contains("Capital One insights or savings products"));
    }

    #[test]
    fn test_both_branches_embed_full_profile_block() {
        for profile in [ana(), ben()] {
            let prompt = build_initial_prompt(&profile);
            assert!(prompt.contains("User Data for Analysis:"));
            assert!(prompt.contains(&format!("Primary Goal: \"{}\"", profile.financial_goal)));
            assert!(prompt.contains(&format!("Location: {}", profile.location)));
            assert!(prompt.contains(&format!("Bank Balance: ${}", profile.bank_account_balance)));
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_initial_prompt(&ana()), build_initial_prompt(&ana()));
    }

    #[test]
    fn test_invalid_fields_pass_through_unvalidated() {
        let profile = Profile {
            total_debt: -250.0,
            credit_score: 9999,
            ..ana()
        };
        let prompt = build_initial_prompt(&profile);
        assert!(prompt.contains("-250"));
        assert!(prompt.contains("9999"));
    }

    #[test]
    fn test_fill_does_not_rescan_inserted_values() {
        let fields = vec![("name", "{age}".to_string()), ("age", "30".to_string())];
        assert_eq!(fill("Hi {name}, {age}", &fields), "Hi {age}, 30");
    }

    #[test]
    fn test_fill_keeps_unknown_and_unclosed_braces() {
        let fields = vec![("name", "Ana".to_string())];
        assert_eq!(fill("{x} {name} {", &fields), "{x} Ana {");
    }
}
