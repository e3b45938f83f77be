//! Behavioural quiz: fixed 20-question pool, Fisher–Yates
//! selection of 5, and persona scoring.

use crate::error::NovaError;
use rand::seq::SliceRandom;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

const QUIZ_SIZE: usize = 5;
const OPTIONS: [&str; 5] = ["Never", "Rarely", "Sometimes", "Often", "Always"];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuestionDef {
    pub id: u32,
    pub text: &'static str,
    pub category: &'static str,
}

/// Fixed pool of 20 behavioural questions across five spending/savings
/// categories; wording is original to this pool.
const QUESTION_POOL: [QuestionDef; 20] = [
    QuestionDef { id: 1, text: "I pay my credit card bill in full each month.", category: "Credit Discipline" },
    QuestionDef { id: 2, text: "I set aside a fixed amount of income into savings.", category: "Savings Habit" },
    QuestionDef { id: 3, text: "I check my bank balance before making a large purchase.", category: "Spending Awareness" },
    QuestionDef { id: 4, text: "I keep a budget and track my monthly expenses.", category: "Spending Awareness" },
    QuestionDef { id: 5, text: "I pay utility bills before the due date.", category: "Bill Discipline" },
    QuestionDef { id: 6, text: "I take on new loans only after comparing interest rates.", category: "Credit Discipline" },
    QuestionDef { id: 7, text: "I maintain an emergency fund covering at least 3 months of expenses.", category: "Savings Habit" },
    QuestionDef { id: 8, text: "I avoid impulse purchases on items I had not planned to buy.", category: "Spending Awareness" },
    QuestionDef { id: 9, text: "I review my bank and card statements for errors.", category: "Bill Discipline" },
    QuestionDef { id: 10, text: "I repay borrowed money from friends or family promptly.", category: "Credit Discipline" },
    QuestionDef { id: 11, text: "I contribute regularly to a retirement or investment account.", category: "Savings Habit" },
    QuestionDef { id: 12, text: "I compare prices across sellers before a significant purchase.", category: "Spending Awareness" },
    QuestionDef { id: 13, text: "I set reminders for recurring bill payments.", category: "Bill Discipline" },
    QuestionDef { id: 14, text: "I avoid carrying a running balance on my credit card.", category: "Credit Discipline" },
    QuestionDef { id: 15, text: "I increase my savings rate when my income increases.", category: "Savings Habit" },
    QuestionDef { id: 16, text: "I plan major expenses at least a month in advance.", category: "Spending Awareness" },
    QuestionDef { id: 17, text: "I pay rent or EMI obligations on or before the due date.", category: "Bill Discipline" },
    QuestionDef { id: 18, text: "I know my current total outstanding debt at any time.", category: "Credit Discipline" },
    QuestionDef { id: 19, text: "I have a savings goal for the next 12 months.", category: "Savings Habit" },
    QuestionDef { id: 20, text: "I read the terms before taking on a new financial product.", category: "Spending Awareness" },
];

#[derive(Debug, Clone, Serialize)]
pub struct QuizQuestion {
    pub id: u32,
    pub text: &'static str,
    pub options: [&'static str; 5],
}

/// The offered quiz plus the internal id list the submission is checked
/// against (the caller need not echo it back, but our store remembers it).
#[derive(Debug, Clone)]
pub struct IssuedQuiz {
    pub questions: Vec<QuizQuestion>,
    pub ids: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizResponse {
    pub id: u32,
    pub choice: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryScore {
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredQuiz {
    pub total_score: u32,
    pub behaviour_score: f64,
    pub persona: &'static str,
    pub feedback: &'static str,
    pub category_breakdown: BTreeMap<String, CategoryScore>,
}

/// Fisher–Yates shuffle, take the first `QUIZ_SIZE`.
pub fn issue_quiz() -> IssuedQuiz {
    let mut pool: Vec<QuestionDef> = QUESTION_POOL.to_vec();
    pool.shuffle(&mut OsRng);
    let picked: Vec<QuestionDef> = pool.into_iter().take(QUIZ_SIZE).collect();

    let questions = picked
        .iter()
        .map(|q| QuizQuestion { id: q.id, text: q.text, options: OPTIONS })
        .collect();
    let ids = picked.iter().map(|q| q.id).collect();

    IssuedQuiz { questions, ids }
}

fn choice_value(choice: &str) -> Option<u32> {
    OPTIONS.iter().position(|o| *o == choice).map(|pos| pos as u32 + 1)
}

fn category_for(id: u32) -> &'static str {
    QUESTION_POOL.iter().find(|q| q.id == id).map(|q| q.category).unwrap_or("Unknown")
}

fn persona_for(percentage: f64) -> (&'static str, &'static str) {
    if percentage > 80.0 {
        ("Prudent Strategist", "Your habits show strong, consistent financial discipline.")
    } else if percentage > 60.0 {
        ("Reliable Operator", "You manage money responsibly with a few areas to tighten up.")
    } else if percentage > 40.0 {
        ("Emerging Professional", "You are building good habits; consistency will compound quickly.")
    } else {
        ("High-Touch Applicant", "Your responses suggest financial habits need closer attention.")
    }
}

/// Validates and scores a submission against the issued question id list
/// (exactly 5 responses, no duplicate ids, each id in the pool).
pub fn score_quiz(issued_ids: &[u32], responses: &[QuizResponse]) -> Result<ScoredQuiz, NovaError> {
    if responses.len() != QUIZ_SIZE {
        return Err(NovaError::validation(format!(
            "expected exactly {QUIZ_SIZE} responses"
        )));
    }
    let mut seen = HashSet::new();
    for response in responses {
        if !seen.insert(response.id) {
            return Err(NovaError::validation("duplicate question id in responses"));
        }
        if !issued_ids.contains(&response.id) {
            return Err(NovaError::validation("response id was not part of the issued quiz"));
        }
        if !OPTIONS.contains(&response.choice.as_str()) {
            return Err(NovaError::validation("choice is not one of the allowed options"));
        }
    }

    let mut total_score = 0u32;
    let mut by_category: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    for response in responses {
        let value = choice_value(&response.choice).expect("validated above");
        total_score += value;
        let entry = by_category.entry(category_for(response.id).to_string()).or_insert((0, 0));
        entry.0 += value;
        entry.1 += 5;
    }

    let behaviour_score = crate::types::round_n(total_score as f64 / 25.0, 4);
    let overall_percentage = (total_score as f64 / 25.0) * 100.0;
    let (persona, feedback) = persona_for(overall_percentage);

    let category_breakdown = by_category
        .into_iter()
        .map(|(category, (score, max_score))| {
            let percentage = crate::types::round2((score as f64 / max_score as f64) * 100.0);
            (category, CategoryScore { score, max_score, percentage })
        })
        .collect();

    Ok(ScoredQuiz {
        total_score,
        behaviour_score,
        persona,
        feedback,
        category_breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses_all(choice: &str, ids: &[u32]) -> Vec<QuizResponse> {
        ids.iter().map(|&id| QuizResponse { id, choice: choice.to_string() }).collect()
    }

    #[test]
    fn issue_quiz_selects_five_unique_questions_from_the_pool() {
        let issued = issue_quiz();
        assert_eq!(issued.questions.len(), QUIZ_SIZE);
        let unique: HashSet<u32> = issued.ids.iter().copied().collect();
        assert_eq!(unique.len(), QUIZ_SIZE);
        for id in &issued.ids {
            assert!(QUESTION_POOL.iter().any(|q| q.id == *id));
        }
    }

    #[test]
    fn quiz_bounds_hold_for_extremes() {
        let issued = issue_quiz();
        let all_never = score_quiz(&issued.ids, &responses_all("Never", &issued.ids)).unwrap();
        assert_eq!(all_never.total_score, 5);
        assert_eq!(all_never.behaviour_score, 0.2);

        let all_always = score_quiz(&issued.ids, &responses_all("Always", &issued.ids)).unwrap();
        assert_eq!(all_always.total_score, 25);
        assert_eq!(all_always.behaviour_score, 1.0);
    }

    #[test]
    fn rejects_wrong_response_count() {
        let issued = issue_quiz();
        let short = responses_all("Often", &issued.ids[..4]);
        assert!(score_quiz(&issued.ids, &short).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let issued = issue_quiz();
        let mut responses = responses_all("Often", &issued.ids);
        responses[1].id = responses[0].id;
        assert!(score_quiz(&issued.ids, &responses).is_err());
    }

    #[test]
    fn rejects_id_not_in_issued_set() {
        let issued = issue_quiz();
        let mut responses = responses_all("Often", &issued.ids);
        responses[0].id = 9999;
        assert!(score_quiz(&issued.ids, &responses).is_err());
    }

    #[test]
    fn rejects_unknown_choice() {
        let issued = issue_quiz();
        let mut responses = responses_all("Often", &issued.ids);
        responses[0].choice = "Constantly".to_string();
        assert!(score_quiz(&issued.ids, &responses).is_err());
    }

    #[test]
    fn persona_bands_match_percentage_thresholds() {
        assert_eq!(persona_for(81.0).0, "Prudent Strategist");
        assert_eq!(persona_for(61.0).0, "Reliable Operator");
        assert_eq!(persona_for(41.0).0, "Emerging Professional");
        assert_eq!(persona_for(40.0).0, "High-Touch Applicant");
    }
}
