use rand::seq::SliceRandom;
use rand::Rng;

use super::variables::{instantiate, QuestionInstance};
use crate::db::QuestionWithAnswers;

/// Returns the options in a random order. Purely cosmetic: ids travel with
/// the options so grading is unaffected.
pub fn shuffle_answers<T: Clone, R: Rng + ?Sized>(answers: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = answers.to_vec();
    shuffled.shuffle(rng);
    shuffled
}

/// Draws variables for every question and shuffles its options. Question
/// order is kept.
pub fn prepare_attempt<R: Rng + ?Sized>(
    questions: &[QuestionWithAnswers],
    rng: &mut R,
) -> Vec<QuestionInstance> {
    questions
        .iter()
        .map(|q| {
            let mut instance = instantiate(&q.question, &q.answers, rng);
            instance.answers = shuffle_answers(&instance.answers, rng);
            instance
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn keeps_every_option() {
        let mut rng = StdRng::seed_from_u64(7);
        let options = vec![1, 2, 3, 4, 5];

        let mut shuffled = shuffle_answers(&options, &mut rng);
        shuffled.sort_unstable();
        assert_eq!(shuffled, options);
    }

    #[test]
    fn same_seed_same_order() {
        let options: Vec<u32> = (0..20).collect();
        let first = shuffle_answers(&options, &mut StdRng::seed_from_u64(42));
        let second = shuffle_answers(&options, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_is_fine() {
        let mut rng = StdRng::seed_from_u64(1);
        let shuffled: Vec<u8> = shuffle_answers(&[], &mut rng);
        assert!(shuffled.is_empty());
    }

    #[test]
    fn prepared_attempt_keeps_question_order() {
        use crate::db::{Answer, Question, QuestionType};

        let with_answers = |id: i32| QuestionWithAnswers {
            question: Question {
                id,
                quiz_id: 1,
                content: format!("question {id}"),
                question_type: QuestionType::MultipleChoice,
                difficulty: 1,
                points: 5,
                image_url: None,
                hint1: None,
                hint2: None,
                hint3: None,
                explanation: None,
                variables: None,
            },
            answers: (0..4)
                .map(|n| Answer {
                    id: id * 10 + n,
                    question_id: id,
                    content: format!("option {n}"),
                    is_correct: n == 0,
                    explanation: None,
                })
                .collect(),
        };

        let questions = vec![with_answers(1), with_answers(2), with_answers(3)];
        let prepared = prepare_attempt(&questions, &mut StdRng::seed_from_u64(5));

        let ids: Vec<i32> = prepared.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        for question in &prepared {
            let mut option_ids: Vec<i32> = question.answers.iter().map(|a| a.id).collect();
            option_ids.sort_unstable();
            let base = question.id * 10;
            assert_eq!(option_ids, vec![base, base + 1, base + 2, base + 3]);
        }
    }
}
