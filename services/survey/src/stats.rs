//! Answer aggregation

use common::proto::survey::{Question, QuestionStats};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// How many times `value` was given as an answer to `question_id`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerCount {
    pub question_id: Uuid,
    pub value: u32,
    pub count: u64,
}

/// One entry per question, in the order given, including questions nobody answered
pub fn aggregate(questions: &[Question], counts: &[AnswerCount]) -> Vec<QuestionStats> {
    let mut distributions: HashMap<Uuid, BTreeMap<u32, u64>> = HashMap::new();
    for c in counts {
        *distributions
            .entry(c.question_id)
            .or_default()
            .entry(c.value)
            .or_default() += c.count;
    }

    questions
        .iter()
        .map(|question| {
            let distribution = distributions.remove(&question.id).unwrap_or_default();
            let answers: u64 = distribution.values().sum();
            let total: u64 = distribution
                .iter()
                .map(|(value, count)| u64::from(*value) * count)
                .sum();
            let average = if answers == 0 {
                0.0
            } else {
                total as f64 / answers as f64
            };

            QuestionStats {
                question_id: question.id,
                page: question.page,
                text: question.text.clone(),
                answers,
                average,
                distribution,
            }
        })
        .collect()
}
