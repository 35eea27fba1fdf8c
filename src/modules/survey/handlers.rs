use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::app_state::AppState;
use crate::error::AppResult;
use crate::feedback::survey_prompt;
use crate::quiz::prediction::{adjusted_prediction, bounded_adjustment, AgeGroup, SurveyForm};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRequest {
    /// Grade predicted by the external model, on the 0..20 scale.
    #[validate(range(min = 0.0, max = 20.0))]
    pub prediction: f64,
    pub age_group: AgeGroup,
    #[serde(default)]
    pub form: SurveyForm,
    /// Map the form's display values (child ages, 0-based alcohol levels)
    /// onto the dataset's scales before scoring.
    #[serde(default)]
    pub convert_values: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub base_prediction: f64,
    pub adjustment: f64,
    pub prediction: f64,
    /// `None` when feedback generation is disabled or failed.
    pub feedback: Option<String>,
}

pub async fn survey_feedback(
    State(state): State<AppState>,
    Json(payload): Json<SurveyRequest>,
) -> AppResult<Json<SurveyResponse>> {
    payload.validate()?;

    let SurveyRequest {
        prediction: base,
        age_group,
        form,
        convert_values,
    } = payload;
    let form = if convert_values {
        form.converted(age_group)
    } else {
        form
    };

    let adjustment = bounded_adjustment(&form, age_group);
    let prediction = adjusted_prediction(base, &form, age_group);
    info!(base, adjustment, prediction, ?age_group, "Survey scored");

    let feedback = match &state.feedback {
        Some(client) => match client.generate(&survey_prompt(prediction, &form)).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Survey feedback generation failed");
                None
            }
        },
        None => None,
    };

    Ok(Json(SurveyResponse {
        base_prediction: base,
        adjustment,
        prediction,
        feedback,
    }))
}
