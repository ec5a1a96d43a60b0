// src/client/flow.rs
//
// The wizard is a single linear flow: Home -> Form -> Loading -> Result. Each
// stage owns exactly the data that is valid in it, so "loading with a dangling
// error" or "result without an outcome" cannot be constructed.
use crate::models::{Gender, SkinType};

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPhoto {
    pub data_url: String,
    pub grid_data_url: Option<String>,
    /// width / height of the prepared photo.
    pub ratio: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormData {
    pub photo: Option<PreparedPhoto>,
    pub gender: Option<Gender>,
    pub skin_type: Option<SkinType>,
    pub error: Option<String>,
}

impl FormData {
    // Mirrors the gateway's required-field validation.
    pub fn is_complete(&self) -> bool {
        self.photo.is_some() && self.gender.is_some() && self.skin_type.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisOutcome {
    pub image: Option<String>,
    pub report: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Home,
    Form(FormData),
    Loading(FormData),
    Result {
        form: FormData,
        outcome: AnalysisOutcome,
    },
}

#[derive(Debug, Clone)]
pub enum Event {
    Start,
    PhotoSelected(PreparedPhoto),
    PhotoCleared,
    GenderSelected(Gender),
    SkinTypeSelected(SkinType),
    Submitted,
    Succeeded(AnalysisOutcome),
    Failed(String),
    Reset,
}

impl Stage {
    pub fn can_submit(&self) -> bool {
        matches!(self, Stage::Form(form) if form.is_complete())
    }

    /// Pure transition function. Events that make no sense in the current
    /// stage leave it unchanged, which also guarantees at most one in-flight
    /// request: only `Loading` accepts a completion event, and `Loading`
    /// ignores further submits.
    pub fn advance(self, event: Event) -> Stage {
        match (self, event) {
            (Stage::Home, Event::Start) => Stage::Form(FormData::default()),
            (Stage::Form(mut form), Event::PhotoSelected(photo)) => {
                form.photo = Some(photo);
                Stage::Form(form)
            }
            (Stage::Form(mut form), Event::PhotoCleared) => {
                form.photo = None;
                Stage::Form(form)
            }
            (Stage::Form(mut form), Event::GenderSelected(gender)) => {
                form.gender = Some(gender);
                Stage::Form(form)
            }
            (Stage::Form(mut form), Event::SkinTypeSelected(skin_type)) => {
                form.skin_type = Some(skin_type);
                Stage::Form(form)
            }
            (Stage::Form(mut form), Event::Submitted) if form.is_complete() => {
                form.error = None;
                Stage::Loading(form)
            }
            (Stage::Loading(form), Event::Succeeded(outcome)) => {
                Stage::Result { form, outcome }
            }
            (Stage::Loading(mut form), Event::Failed(message)) => {
                form.error = Some(message);
                Stage::Form(form)
            }
            // Results are discarded for good; the filled-in inputs survive.
            (Stage::Result { mut form, .. }, Event::Reset) => {
                form.error = None;
                Stage::Form(form)
            }
            (stage, _) => stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> PreparedPhoto {
        PreparedPhoto {
            data_url: "data:image/jpeg;base64,AAAA".into(),
            grid_data_url: None,
            ratio: 1.0,
        }
    }

    fn filled_form() -> Stage {
        Stage::Home
            .advance(Event::Start)
            .advance(Event::PhotoSelected(photo()))
            .advance(Event::GenderSelected(Gender::Female))
            .advance(Event::SkinTypeSelected(SkinType::Dry))
    }

    #[test]
    fn walks_home_to_result_on_success() {
        let stage = filled_form();
        assert!(stage.can_submit());

        let stage = stage.advance(Event::Submitted);
        assert!(matches!(stage, Stage::Loading(_)));

        let outcome = AnalysisOutcome {
            image: Some("data:image/png;base64,Z3JpZA==".into()),
            report: Some("{\"products\": []}".into()),
        };
        match stage.advance(Event::Succeeded(outcome.clone())) {
            Stage::Result { outcome: got, .. } => assert_eq!(got, outcome),
            other => panic!("expected result stage, got {other:?}"),
        }
    }

    #[test]
    fn submit_is_gated_on_a_complete_form() {
        let stage = Stage::Home
            .advance(Event::Start)
            .advance(Event::GenderSelected(Gender::Male));
        assert!(!stage.can_submit());
        // An incomplete submit is ignored rather than entering Loading.
        assert!(matches!(stage.advance(Event::Submitted), Stage::Form(_)));
    }

    #[test]
    fn failure_returns_to_the_form_with_inputs_preserved() {
        let stage = filled_form().advance(Event::Submitted);
        match stage.advance(Event::Failed("분석 중 오류가 발생했습니다.".into())) {
            Stage::Form(form) => {
                assert_eq!(form.error.as_deref(), Some("분석 중 오류가 발생했습니다."));
                assert!(form.photo.is_some());
                assert_eq!(form.gender, Some(Gender::Female));
                assert_eq!(form.skin_type, Some(SkinType::Dry));
            }
            other => panic!("expected form stage, got {other:?}"),
        }
    }

    #[test]
    fn submitting_clears_a_previous_error() {
        let stage = filled_form()
            .advance(Event::Submitted)
            .advance(Event::Failed("first try failed".into()))
            .advance(Event::Submitted);
        match stage {
            Stage::Loading(form) => assert!(form.error.is_none()),
            other => panic!("expected loading stage, got {other:?}"),
        }
    }

    #[test]
    fn reset_discards_results_but_keeps_inputs() {
        let stage = filled_form()
            .advance(Event::Submitted)
            .advance(Event::Succeeded(AnalysisOutcome::default()))
            .advance(Event::Reset);
        match stage {
            Stage::Form(form) => {
                assert!(form.photo.is_some());
                assert!(form.error.is_none());
            }
            other => panic!("expected form stage, got {other:?}"),
        }
    }

    #[test]
    fn out_of_place_events_are_ignored() {
        let home = Stage::Home.advance(Event::Reset);
        assert_eq!(home, Stage::Home);

        let form = filled_form();
        let still_form = form.clone().advance(Event::Succeeded(AnalysisOutcome::default()));
        assert_eq!(still_form, form);

        let loading = filled_form().advance(Event::Submitted);
        let still_loading = loading.clone().advance(Event::Submitted);
        assert_eq!(still_loading, loading);
    }
}
