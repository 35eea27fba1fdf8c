//! Adjustment applied to the external model's grade prediction from the
//! student survey. Grades are on the 0..20 scale of the survey dataset.

use serde::{Deserialize, Deserializer, Serialize};

const MAX_ADJUSTMENT: f64 = 5.0;
const MAX_GRADE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Child,
    Teen,
}

/// Survey value that may arrive as a JSON number or a numeric string.
/// Strings are read up to the first character that cannot continue a
/// number (`"15abc"` is 15). Anything without a leading number reads as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormNumber(pub f64);

impl FormNumber {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for FormNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
            Other(serde_json::Value),
        }

        let value = match Raw::deserialize(deserializer)? {
            Raw::Number(n) if n.is_finite() => n,
            Raw::Text(text) => leading_number(&text).unwrap_or(0.0),
            Raw::Number(_) | Raw::Other(_) => 0.0,
        };
        Ok(FormNumber(value))
    }
}

/// Longest decimal literal at the start of `text`, after leading whitespace.
fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut mantissa_end = int_end;
    if bytes.get(int_end) == Some(&b'.') {
        mantissa_end = digits_from(int_end + 1);
    }
    // A lone sign or dot is not a number
    if !text[end..mantissa_end].bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    end = mantissa_end;

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_start = end + 1;
        if matches!(bytes.get(exp_start), Some(b'+' | b'-')) {
            exp_start += 1;
        }
        let exp_end = digits_from(exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    text[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

impl From<f64> for FormNumber {
    fn from(value: f64) -> Self {
        FormNumber(value)
    }
}

/// Student survey answers, named after the columns of the prediction model.
/// Missing fields take the form's initial values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyForm {
    pub sex: String,
    pub age: FormNumber,
    pub address: String,
    pub famsize: String,
    #[serde(rename = "Pstatus")]
    pub pstatus: String,
    #[serde(rename = "Medu")]
    pub medu: FormNumber,
    #[serde(rename = "Fedu")]
    pub fedu: FormNumber,
    #[serde(rename = "Mjob")]
    pub mjob: String,
    #[serde(rename = "Fjob")]
    pub fjob: String,
    pub reason: String,
    pub guardian: String,
    pub traveltime: FormNumber,
    pub studytime: FormNumber,
    pub failures: FormNumber,
    pub schoolsup: String,
    pub famsup: String,
    pub paid: String,
    pub activities: String,
    pub nursery: String,
    pub higher: String,
    pub internet: String,
    pub romantic: String,
    pub famrel: FormNumber,
    pub freetime: FormNumber,
    pub goout: FormNumber,
    #[serde(rename = "Dalc")]
    pub dalc: FormNumber,
    #[serde(rename = "Walc")]
    pub walc: FormNumber,
    pub health: FormNumber,
    pub absences: FormNumber,
    #[serde(rename = "G1")]
    pub g1: FormNumber,
    #[serde(rename = "G2")]
    pub g2: FormNumber,
}

impl Default for SurveyForm {
    fn default() -> Self {
        let n = |value: f64| FormNumber(value);
        let s = |value: &str| value.to_string();
        Self {
            sex: s("F"),
            age: n(12.0),
            address: s("U"),
            famsize: s("GT3"),
            pstatus: s("T"),
            medu: n(2.0),
            fedu: n(2.0),
            mjob: s("other"),
            fjob: s("other"),
            reason: s("course"),
            guardian: s("mother"),
            traveltime: n(1.0),
            studytime: n(2.0),
            failures: n(0.0),
            schoolsup: s("no"),
            famsup: s("no"),
            paid: s("no"),
            activities: s("no"),
            nursery: s("yes"),
            higher: s("yes"),
            internet: s("yes"),
            romantic: s("no"),
            famrel: n(4.0),
            freetime: n(3.0),
            goout: n(2.0),
            dalc: n(1.0),
            walc: n(1.0),
            health: n(4.0),
            absences: n(2.0),
            g1: n(0.0),
            g2: n(0.0),
        }
    }
}

impl SurveyForm {
    /// Maps the values shown on the form to the model's scales: child ages
    /// onto the dataset's 15..22 range, and for teens the 0..4 alcohol
    /// answers onto 1..5.
    pub fn converted(mut self, age_group: AgeGroup) -> Self {
        self.age = FormNumber(convert_age(self.age.value()));
        if age_group == AgeGroup::Teen {
            self.dalc = FormNumber(convert_alcohol(self.dalc.value()));
            self.walc = FormNumber(convert_alcohol(self.walc.value()));
        }
        self
    }
}

pub fn convert_age(age: f64) -> f64 {
    match age as i64 {
        _ if age.fract() != 0.0 => age,
        7..=9 => 15.0,
        10 => 16.0,
        11 => 17.0,
        12 => 18.0,
        13 => 19.0,
        14 => 20.0,
        15 => 21.0,
        16 => 22.0,
        _ => age,
    }
}

pub fn convert_alcohol(level: f64) -> f64 {
    match level as i64 {
        _ if level.fract() != 0.0 => level,
        0..=4 => level + 1.0,
        _ => level,
    }
}

fn yes(value: &str) -> bool {
    value == "yes"
}

fn no(value: &str) -> bool {
    value == "no"
}

/// Raw weighted sum of the survey answers before damping.
fn raw_adjustment(form: &SurveyForm, age_group: AgeGroup) -> f64 {
    let mut raw = 0.0;

    if yes(&form.paid) {
        raw += 2.0;
    }
    raw += (form.g1.value() / 20.0) * 6.0 - 3.0;

    if no(&form.higher) {
        raw -= 3.0;
    }
    let studytime = form.studytime.value();
    if studytime >= 3.0 {
        raw += 1.5;
    }
    if studytime <= 1.0 {
        raw -= 1.5;
    }
    let failures = form.failures.value();
    if failures > 0.0 {
        raw -= failures * 1.2;
    }
    let traveltime = form.traveltime.value();
    if traveltime == 3.0 {
        raw -= 1.2;
    }
    if traveltime == 4.0 {
        raw -= 2.0;
    }

    if yes(&form.famsup) {
        raw += 1.5;
    }
    let famrel = form.famrel.value();
    if famrel >= 4.0 {
        raw += 1.2;
    }
    if famrel <= 2.0 {
        raw -= 1.0;
    }
    if form.medu.value() >= 2.0 {
        raw += 0.8;
    }
    if form.fedu.value() >= 2.0 {
        raw += 0.8;
    }

    if age_group == AgeGroup::Teen {
        if form.dalc.value() >= 3.0 {
            raw -= 1.5;
        }
        if form.walc.value() >= 3.0 {
            raw -= 1.0;
        }
    }

    if form.health.value() <= 2.0 {
        raw -= 0.7;
    }
    let absences = form.absences.value();
    if absences > 10.0 {
        raw -= absences * 0.05;
    }

    if no(&form.internet) {
        raw -= 1.2;
    }
    if yes(&form.schoolsup) {
        raw += 1.0;
    }

    raw
}

/// Adjustment in points, bounded to ±5.
///
/// Everything except one point of the paid-classes bonus is damped by a
/// factor that falls from 1 to 0.3 as the current math grade (`G2`) rises.
pub fn bounded_adjustment(form: &SurveyForm, age_group: AgeGroup) -> f64 {
    let damping = 0.3 + 0.7 * (1.0 - form.g2.value() / 20.0);
    let paid = if yes(&form.paid) { 1.0 } else { 0.0 };
    let adjustment = paid + (raw_adjustment(form, age_group) - paid) * damping;
    adjustment.clamp(-MAX_ADJUSTMENT, MAX_ADJUSTMENT)
}

/// Applies the survey adjustment to `base` and clamps the result to 0..20.
pub fn adjusted_prediction(base: f64, form: &SurveyForm, age_group: AgeGroup) -> f64 {
    (base + bounded_adjustment(form, age_group)).clamp(0.0, MAX_GRADE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn form_numbers_read_the_leading_number() {
        let read = |raw: serde_json::Value| serde_json::from_value::<FormNumber>(raw).unwrap().value();

        assert_eq!(read(serde_json::json!("15abc")), 15.0);
        assert_eq!(read(serde_json::json!("  2.5 horas")), 2.5);
        assert_eq!(read(serde_json::json!("-3")), -3.0);
        assert_eq!(read(serde_json::json!(".5")), 0.5);
        assert_eq!(read(serde_json::json!("1e2x")), 100.0);
        assert_eq!(read(serde_json::json!("7e")), 7.0);
        assert_eq!(read(serde_json::json!("abc")), 0.0);
        assert_eq!(read(serde_json::json!("-")), 0.0);
        assert_eq!(read(serde_json::json!(null)), 0.0);
        assert_eq!(read(serde_json::json!(12)), 12.0);
    }

    #[test]
    fn initial_form_adjustment() {
        // G1 = 0 gives -3; famrel 4 +1.2; Medu/Fedu +1.6; damping 1.0
        let form = SurveyForm::default();
        assert!(close(bounded_adjustment(&form, AgeGroup::Child), -0.2));
        assert!(close(adjusted_prediction(10.0, &form, AgeGroup::Child), 9.8));
    }

    #[test]
    fn paid_point_escapes_damping() {
        let form = SurveyForm {
            paid: "yes".into(),
            g1: FormNumber(10.0),
            g2: FormNumber(20.0),
            medu: FormNumber(0.0),
            fedu: FormNumber(0.0),
            famrel: FormNumber(3.0),
            ..SurveyForm::default()
        };
        // raw = 2 + 0 = 2; damping 0.3; 1 + (2 - 1) * 0.3 = 1.3
        assert!(close(bounded_adjustment(&form, AgeGroup::Child), 1.3));
    }

    #[test]
    fn adjustment_is_bounded() {
        let bad = SurveyForm {
            higher: "no".into(),
            failures: FormNumber(3.0),
            traveltime: FormNumber(4.0),
            internet: "no".into(),
            studytime: FormNumber(1.0),
            ..SurveyForm::default()
        };
        assert!(close(bounded_adjustment(&bad, AgeGroup::Teen), -5.0));
        assert!(close(adjusted_prediction(3.0, &bad, AgeGroup::Teen), 0.0));

        let good = SurveyForm {
            paid: "yes".into(),
            g1: FormNumber(20.0),
            studytime: FormNumber(4.0),
            famsup: "yes".into(),
            schoolsup: "yes".into(),
            ..SurveyForm::default()
        };
        assert!(close(bounded_adjustment(&good, AgeGroup::Child), 5.0));
        assert!(close(adjusted_prediction(18.0, &good, AgeGroup::Child), 20.0));
    }

    #[test]
    fn alcohol_only_counts_for_teens() {
        let form = SurveyForm {
            dalc: FormNumber(4.0),
            walc: FormNumber(4.0),
            ..SurveyForm::default()
        };
        let child = bounded_adjustment(&form, AgeGroup::Child);
        let teen = bounded_adjustment(&form, AgeGroup::Teen);
        assert!(close(child - teen, 2.5));
    }

    #[test]
    fn numbers_accept_strings() {
        let form: SurveyForm = serde_json::from_value(json!({
            "G1": "15",
            "G2": 12,
            "absences": "lots",
            "Medu": "3"
        }))
        .unwrap();

        assert_eq!(form.g1, FormNumber(15.0));
        assert_eq!(form.g2, FormNumber(12.0));
        assert_eq!(form.absences, FormNumber(0.0));
        assert_eq!(form.medu, FormNumber(3.0));
        assert_eq!(form.sex, "F");
    }

    #[test]
    fn form_conversions() {
        assert_eq!(convert_age(7.0), 15.0);
        assert_eq!(convert_age(12.0), 18.0);
        assert_eq!(convert_age(16.0), 22.0);
        assert_eq!(convert_age(17.0), 17.0);
        assert_eq!(convert_alcohol(0.0), 1.0);
        assert_eq!(convert_alcohol(4.0), 5.0);
        assert_eq!(convert_alcohol(5.0), 5.0);

        let child = SurveyForm {
            dalc: FormNumber(0.0),
            ..SurveyForm::default()
        }
        .converted(AgeGroup::Child);
        assert_eq!(child.age, FormNumber(18.0));
        assert_eq!(child.dalc, FormNumber(0.0));

        let teen = SurveyForm {
            dalc: FormNumber(0.0),
            ..SurveyForm::default()
        }
        .converted(AgeGroup::Teen);
        assert_eq!(teen.dalc, FormNumber(1.0));
    }
}
