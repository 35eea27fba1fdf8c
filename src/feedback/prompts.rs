use std::fmt::Write;

use crate::db::QuizResults;
use crate::quiz::prediction::SurveyForm;

pub fn survey_prompt(prediction: f64, form: &SurveyForm) -> String {
    let data = serde_json::to_string_pretty(form).unwrap_or_default();
    format!(
        "Eres un experto en aprendizaje automático. Un modelo de predicción ha estimado el \
         rendimiento académico de un estudiante con {prediction:.1} / 20.\n\n\
         Estos son los datos del estudiante:\n{data}\n\n\
         Por favor, indica:\n\
         1. Qué variables afectaron más negativamente el rendimiento y por qué.\n\
         2. Qué variables pueden mejorar si el estudiante toma acción.\n\
         3. Sugerencias específicas para mejorar el resultado futuro.\n\
         Usa un lenguaje claro y orientado al estudiante."
    )
}

/// Prompt for a reviewer draft: the grade plus every answered question with
/// the student's choice and, when wrong, the correct option.
pub fn quiz_prompt(results: &QuizResults) -> String {
    let grade = results
        .progress
        .score
        .map(|score| format!("{score} / 10"))
        .unwrap_or_else(|| "sin calificar".to_string());

    let mut prompt = format!(
        "Eres un profesor de matemáticas. Un estudiante terminó el cuestionario \"{}\" con una \
         calificación de {grade} en {} minutos.\n\nRespuestas del estudiante:\n",
        results.quiz_title,
        results.progress.time_spent / 60,
    );

    for (number, answer) in results.answers.iter().enumerate() {
        let chosen = answer.answer_content.as_deref().unwrap_or("(sin respuesta)");
        let _ = write!(
            prompt,
            "{}. {}\n   Respuesta: {} ({})\n",
            number + 1,
            answer.question_content,
            chosen,
            if answer.is_correct { "correcta" } else { "incorrecta" },
        );
        if !answer.is_correct {
            if let Some(correct) = &answer.correct_answer_content {
                let _ = writeln!(prompt, "   Respuesta correcta: {correct}");
            }
        }
    }

    prompt.push_str(
        "\nEscribe una retroalimentación breve para el estudiante: reconoce lo que hizo bien, \
         explica los errores más importantes y sugiere qué temas repasar. Usa un tono motivador.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DetailedAnswer, ProgressStatus, StudentProgress};

    fn answer(content: &str, chosen: Option<&str>, correct: bool) -> DetailedAnswer {
        DetailedAnswer {
            question_id: 1,
            question_content: content.to_string(),
            points: 5,
            answer_id: chosen.map(|_| 10),
            answer_content: chosen.map(str::to_string),
            is_correct: correct,
            correct_answer_content: Some("4".to_string()),
            explanation: None,
            variables: None,
            time_spent: 12,
        }
    }

    #[test]
    fn survey_prompt_rounds_prediction_and_embeds_form() {
        let prompt = survey_prompt(13.456, &SurveyForm::default());
        assert!(prompt.contains("13.5 / 20"));
        assert!(prompt.contains("\"Medu\""));
        assert!(prompt.contains("\"famsize\": \"GT3\""));
    }

    #[test]
    fn quiz_prompt_lists_wrong_answers_with_correction() {
        let results = QuizResults {
            progress: StudentProgress {
                id: 1,
                user_id: 2,
                quiz_id: 3,
                status: ProgressStatus::Completed,
                score: Some(5),
                completed_questions: 2,
                time_spent: 300,
                completed_at: None,
            },
            quiz_title: "Sumas".to_string(),
            answers: vec![
                answer("2 + 2", Some("4"), true),
                answer("1 + 3", Some("5"), false),
                answer("3 + 1", None, false),
            ],
            feedback: None,
        };

        let prompt = quiz_prompt(&results);
        assert!(prompt.contains("\"Sumas\""));
        assert!(prompt.contains("5 / 10 en 5 minutos"));
        assert!(prompt.contains("1. 2 + 2\n   Respuesta: 4 (correcta)\n2."));
        assert!(prompt.contains("2. 1 + 3\n   Respuesta: 5 (incorrecta)\n   Respuesta correcta: 4"));
        assert!(prompt.contains("3. 3 + 1\n   Respuesta: (sin respuesta)"));
    }
}
