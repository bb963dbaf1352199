//! Fixed yes/no surveys shown inside the chat: the intake questionnaire and
//! the symptom checklist that produces a prediagnosis.

use async_trait::async_trait;
use log::{ info, warn };
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Question {
    pub id: &'static str,
    pub text: &'static str,
    pub required: bool,
}

const INTAKE_QUESTIONS: [Question; 8] = [
    Question { id: "q1", text: "Do you have any allergies to medications?", required: true },
    Question { id: "q2", text: "Are you currently taking any medications?", required: true },
    Question { id: "q3", text: "Do you have a history of heart disease?", required: true },
    Question { id: "q4", text: "Do you have diabetes?", required: true },
    Question { id: "q5", text: "Have you had any surgeries in the past year?", required: false },
    Question { id: "q6", text: "Do you smoke or use tobacco products?", required: true },
    Question { id: "q7", text: "Do you consume alcohol regularly?", required: false },
    Question { id: "q8", text: "Are you experiencing any pain currently?", required: true },
];

const SYMPTOMS: [Question; 10] = [
    Question { id: "s1", text: "Fever", required: false },
    Question { id: "s2", text: "Cough", required: false },
    Question { id: "s3", text: "Headache", required: false },
    Question { id: "s4", text: "Fatigue", required: false },
    Question { id: "s5", text: "Shortness of breath", required: false },
    Question { id: "s6", text: "Sore throat", required: false },
    Question { id: "s7", text: "Nausea", required: false },
    Question { id: "s8", text: "Muscle aches", required: false },
    Question { id: "s9", text: "Chest pain", required: false },
    Question { id: "s10", text: "Dizziness", required: false },
];

/// When a survey may be submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validity {
    AllRequiredAnswered,
    AtLeastOneYes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurveyState {
    Editing,
    Submitting,
    Succeeded,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SurveyAnswer {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub answer: bool,
}

/// What a survey hands to its sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Questionnaire(Vec<SurveyAnswer>),
    Symptoms {
        symptoms: Vec<String>,
        conversation_id: Option<String>,
    },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SurveyError {
    #[error("Please answer all required questions")]
    Incomplete,
    #[error("Please select at least one symptom")]
    NoSymptoms,
    #[error("Survey is not accepting answers")]
    Closed,
    #[error("{0}")]
    Rejected(String),
}

#[async_trait]
pub trait SurveySink: Send + Sync {
    async fn submit_survey(&self, submission: Submission) -> Result<(), SurveyError>;
}

#[derive(Clone, Debug)]
pub struct Survey {
    questions: &'static [Question],
    answers: Vec<Option<bool>>,
    validity: Validity,
    conversation_id: Option<String>,
    state: SurveyState,
}

/// The eight-question intake form; six answers are required.
pub fn intake() -> Survey {
    Survey::new(&INTAKE_QUESTIONS, Validity::AllRequiredAnswered, None)
}

/// The symptom checklist; submittable once any symptom is marked.
pub fn symptom_checklist(conversation_id: Option<String>) -> Survey {
    Survey::new(&SYMPTOMS, Validity::AtLeastOneYes, conversation_id)
}

impl Survey {
    fn new(
        questions: &'static [Question],
        validity: Validity,
        conversation_id: Option<String>
    ) -> Self {
        Self {
            questions,
            answers: vec![None; questions.len()],
            validity,
            conversation_id,
            state: SurveyState::Editing,
        }
    }

    pub fn questions(&self) -> &'static [Question] {
        self.questions
    }

    pub fn state(&self) -> &SurveyState {
        &self.state
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn answer_of(&self, id: &str) -> Option<bool> {
        self.index_of(id).and_then(|i| self.answers[i])
    }

    /// Records an answer. Returns false for unknown ids or once the survey
    /// is no longer editable.
    pub fn answer(&mut self, id: &str, value: bool) -> bool {
        if !self.is_editable() {
            return false;
        }
        match self.index_of(id) {
            Some(i) => {
                self.answers[i] = Some(value);
                true
            }
            None => false,
        }
    }

    /// (answered, total)
    pub fn progress(&self) -> (usize, usize) {
        (self.answers.iter().filter(|a| a.is_some()).count(), self.questions.len())
    }

    pub fn is_valid(&self) -> bool {
        match self.validity {
            Validity::AllRequiredAnswered =>
                self.questions
                    .iter()
                    .zip(&self.answers)
                    .all(|(q, a)| !q.required || a.is_some()),
            Validity::AtLeastOneYes => self.answers.iter().any(|a| *a == Some(true)),
        }
    }

    pub fn can_submit(&self) -> bool {
        self.is_editable() && self.is_valid()
    }

    /// Moves to `Submitting` and returns the payload for the sink.
    pub fn begin_submit(&mut self) -> Result<Submission, SurveyError> {
        if !self.is_editable() {
            return Err(SurveyError::Closed);
        }
        if !self.is_valid() {
            return Err(match self.validity {
                Validity::AllRequiredAnswered => SurveyError::Incomplete,
                Validity::AtLeastOneYes => SurveyError::NoSymptoms,
            });
        }
        self.state = SurveyState::Submitting;
        Ok(self.payload())
    }

    pub fn finish(&mut self, result: Result<(), SurveyError>) {
        if self.state != SurveyState::Submitting {
            return;
        }
        self.state = match result {
            Ok(()) => SurveyState::Succeeded,
            Err(e) => SurveyState::Failed(e.to_string()),
        };
    }

    /// Submits once. A failure leaves the survey editable for another try;
    /// nothing is retried automatically.
    pub async fn submit(&mut self, sink: &dyn SurveySink) -> Result<(), SurveyError> {
        let submission = self.begin_submit()?;
        let result = sink.submit_survey(submission).await;
        match &result {
            Ok(()) => info!("Survey submitted"),
            Err(e) => warn!("Survey submission failed: {}", e),
        }
        self.finish(result.clone());
        result
    }

    fn is_editable(&self) -> bool {
        matches!(self.state, SurveyState::Editing | SurveyState::Failed(_))
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.questions.iter().position(|q| q.id == id)
    }

    fn payload(&self) -> Submission {
        match self.validity {
            Validity::AllRequiredAnswered =>
                Submission::Questionnaire(
                    self.questions
                        .iter()
                        .zip(&self.answers)
                        .filter_map(|(q, a)| {
                            a.map(|answer| SurveyAnswer { question_id: q.id.to_string(), answer })
                        })
                        .collect()
                ),
            Validity::AtLeastOneYes =>
                Submission::Symptoms {
                    symptoms: self.questions
                        .iter()
                        .zip(&self.answers)
                        .filter(|(_, a)| **a == Some(true))
                        .map(|(q, _)| q.text.to_string())
                        .collect(),
                    conversation_id: self.conversation_id.clone(),
                },
        }
    }
}
