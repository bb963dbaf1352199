//! Doctor-facing review of patients. Everything here is sample data held in
//! memory; nothing is persisted.

use chrono::{ DateTime, Duration, Utc };
use log::debug;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatientStatus {
    Active,
    Waiting,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConcernLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ConcernLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ConcernLevel::Low => "low",
            ConcernLevel::Medium => "medium",
            ConcernLevel::High => "high",
            ConcernLevel::Critical => "critical",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub last_active: DateTime<Utc>,
    pub status: PatientStatus,
    pub unread_messages: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisBlock {
    pub id: String,
    pub label: String,
    pub content: String,
    pub concern: ConcernLevel,
    pub conversation_date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FormAnswer {
    YesNo(bool),
    Text(String),
}

impl fmt::Display for FormAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormAnswer::YesNo(true) => f.write_str("Yes"),
            FormAnswer::YesNo(false) => f.write_str("No"),
            FormAnswer::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormEntry {
    pub question: String,
    pub answer: FormAnswer,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormResponse {
    pub id: String,
    pub title: String,
    pub submitted: DateTime<Utc>,
    pub entries: Vec<FormEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    pub patient_id: String,
    pub blocks: Vec<AnalysisBlock>,
    pub medications: Vec<String>,
    pub forms: Vec<FormResponse>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sender {
    Doctor,
    Patient,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThreadMessage {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

pub struct Dashboard {
    patients: Vec<Patient>,
    analyses: HashMap<String, Analysis>,
    threads: HashMap<String, Vec<ThreadMessage>>,
    notes: HashMap<String, String>,
    selected: String,
    note_draft: String,
}

impl Dashboard {
    /// Sample records dated relative to `now`, with the first patient selected.
    pub fn sample(now: DateTime<Utc>) -> Self {
        let ago = |ms: i64| now - Duration::milliseconds(ms);
        let patients = sample_patients(&ago);
        let analyses = sample_analyses(&ago)
            .into_iter()
            .map(|a| (a.patient_id.clone(), a))
            .collect();
        let threads = sample_threads(&ago);
        let notes: HashMap<String, String> = [
            (
                "1",
                "Patient reports increased stress levels. Consider stress management techniques.\n\nFollow-up needed on headache medication effectiveness.",
            ),
            (
                "2",
                "Urgent: Schedule cardiovascular assessment.\n\nFamily history significant for early MI. Patient exercises regularly but experiencing symptoms.",
            ),
            (
                "3",
                "Referred for sleep study. Discuss cognitive behavioral therapy for insomnia.\n\nMonitor anxiety symptoms - new job transition.",
            ),
        ]
            .into_iter()
            .map(|(id, note)| (id.to_string(), note.to_string()))
            .collect();

        let selected = patients.first().map(|p| p.id.clone()).unwrap_or_default();
        let note_draft = notes.get(&selected).cloned().unwrap_or_default();
        Self { patients, analyses, threads, notes, selected, note_draft }
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    /// Switches the displayed records. Unknown ids leave the selection alone.
    /// The notes draft is reloaded from the newly selected patient.
    pub fn select_patient(&mut self, id: &str) -> bool {
        if !self.patients.iter().any(|p| p.id == id) {
            return false;
        }
        debug!("Dashboard selected patient {}", id);
        self.selected = id.to_string();
        self.note_draft = self.notes.get(id).cloned().unwrap_or_default();
        true
    }

    pub fn selected_id(&self) -> &str {
        &self.selected
    }

    pub fn current_patient(&self) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == self.selected)
    }

    /// Patients 4 and 5 have no analysis on record.
    pub fn current_analysis(&self) -> Option<&Analysis> {
        self.analyses.get(&self.selected)
    }

    pub fn current_messages(&self) -> &[ThreadMessage] {
        self.threads
            .get(&self.selected)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Appends a doctor message to the selected patient's thread. Blank input
    /// is ignored.
    pub fn send_message(&mut self, content: &str) -> Option<&ThreadMessage> {
        if content.trim().is_empty() || self.selected.is_empty() {
            return None;
        }
        let thread = self.threads.entry(self.selected.clone()).or_default();
        thread.push(ThreadMessage {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            sender: Sender::Doctor,
            timestamp: Utc::now(),
        });
        thread.last()
    }

    pub fn saved_note(&self) -> &str {
        self.notes
            .get(&self.selected)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn note_draft(&self) -> &str {
        &self.note_draft
    }

    pub fn edit_note(&mut self, text: impl Into<String>) {
        self.note_draft = text.into();
    }

    pub fn save_note(&mut self) {
        if self.selected.is_empty() {
            return;
        }
        self.notes.insert(self.selected.clone(), self.note_draft.clone());
    }

    pub fn patients_with_status(&self, status: PatientStatus) -> Vec<&Patient> {
        self.patients
            .iter()
            .filter(|p| p.status == status)
            .collect()
    }

    /// Blocks of the selected analysis at or above `level`.
    pub fn blocks_at_least(&self, level: ConcernLevel) -> Vec<&AnalysisBlock> {
        self.current_analysis()
            .map(|a| {
                a.blocks
                    .iter()
                    .filter(|b| b.concern >= level)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn sample_patients(ago: &dyn Fn(i64) -> DateTime<Utc>) -> Vec<Patient> {
    let patient = |id: &str, name: &str, age, since, status, unread| Patient {
        id: id.to_string(),
        name: name.to_string(),
        age,
        last_active: ago(since),
        status,
        unread_messages: unread,
    };
    vec![
        patient("1", "Sarah Johnson", 34, 0, PatientStatus::Active, 2),
        patient("2", "Michael Chen", 45, 3_600_000, PatientStatus::Waiting, 0),
        patient("3", "Emily Rodriguez", 28, 7_200_000, PatientStatus::Active, 1),
        patient("4", "David Thompson", 52, 86_400_000, PatientStatus::Completed, 0),
        patient("5", "Jessica Williams", 41, 172_800_000, PatientStatus::Waiting, 3)
    ]
}

fn block(
    ago: &dyn Fn(i64) -> DateTime<Utc>,
    id: &str,
    label: &str,
    content: &str,
    concern: ConcernLevel,
    since: i64
) -> AnalysisBlock {
    AnalysisBlock {
        id: id.to_string(),
        label: label.to_string(),
        content: content.to_string(),
        concern,
        conversation_date: ago(since),
    }
}

fn form(
    ago: &dyn Fn(i64) -> DateTime<Utc>,
    id: &str,
    title: &str,
    since: i64,
    entries: &[(&str, FormAnswer)]
) -> FormResponse {
    FormResponse {
        id: id.to_string(),
        title: title.to_string(),
        submitted: ago(since),
        entries: entries
            .iter()
            .map(|(question, answer)| FormEntry {
                question: question.to_string(),
                answer: answer.clone(),
            })
            .collect(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn sample_analyses(ago: &dyn Fn(i64) -> DateTime<Utc>) -> Vec<Analysis> {
    use ConcernLevel::*;
    use FormAnswer::{ Text, YesNo };
    let text = |s: &str| Text(s.to_string());

    vec![
        Analysis {
            patient_id: "1".into(),
            blocks: vec![
                block(
                    ago,
                    "a1",
                    "Persistent Headaches",
                    "Patient reports daily headaches for the past 2 weeks. Pain level ranges from 6-7/10, primarily located in frontal and temporal regions. No visual disturbances or aura reported. OTC pain medication providing minimal relief.",
                    Medium,
                    3_600_000
                ),
                block(
                    ago,
                    "a2",
                    "Work-Related Stress",
                    "Patient mentioned work stress multiple times throughout conversation. Indicated increased workload and deadline pressure. May be contributing factor to headache frequency and intensity.",
                    Medium,
                    7_200_000
                ),
                block(
                    ago,
                    "a3",
                    "Medication Ineffectiveness",
                    "Over-the-counter pain medication (Ibuprofen 400mg, Acetaminophen 500mg) not providing adequate relief. Patient taking medication multiple times daily. Potential for medication overuse headache.",
                    High,
                    10_800_000
                )
            ],
            medications: strings(
                &[
                    "Ibuprofen 400mg (self-administered, multiple times daily)",
                    "Acetaminophen 500mg (occasional use)",
                ]
            ),
            forms: vec![
                form(
                    ago,
                    "f1",
                    "Health Questionnaire",
                    86_400_000,
                    &[
                        ("Do you have any allergies to medications?", YesNo(false)),
                        ("Are you currently taking any medications?", YesNo(true)),
                        ("Do you have a history of heart disease?", YesNo(false)),
                        ("Do you have diabetes?", YesNo(false)),
                        ("Have you had any surgeries in the past year?", YesNo(false)),
                        ("Do you smoke or use tobacco products?", YesNo(false)),
                        ("Do you consume alcohol regularly?", YesNo(false)),
                        ("Are you experiencing any pain currently?", YesNo(true)),
                    ]
                )
            ],
            last_updated: ago(0),
        },
        Analysis {
            patient_id: "2".into(),
            blocks: vec![
                block(
                    ago,
                    "b1",
                    "Exercise-Induced Chest Discomfort",
                    "Patient experiencing chest tightness during physical activity. Symptoms last 5-10 minutes and resolve with rest. No radiation to arms or jaw. Started approximately 3 weeks ago when beginning new exercise routine.",
                    High,
                    3_600_000
                ),
                block(
                    ago,
                    "b2",
                    "Family History - Cardiovascular Disease",
                    "Significant family history: father had myocardial infarction at age 55. Patient is 45 years old. Combined with current symptoms, warrants cardiovascular assessment.",
                    Critical,
                    7_200_000
                ),
                block(
                    ago,
                    "b3",
                    "Hypertension Management",
                    "Patient currently on Lisinopril 10mg for hypertension. Blood pressure appears controlled per patient report. Regular monitoring ongoing.",
                    Low,
                    86_400_000
                )
            ],
            medications: strings(&["Lisinopril 10mg daily (prescribed for hypertension)"]),
            forms: vec![
                form(
                    ago,
                    "f3",
                    "Cardiovascular Risk Assessment",
                    172_800_000,
                    &[
                        ("Family history of heart disease?", YesNo(true)),
                        ("Do you smoke?", YesNo(false)),
                        ("High blood pressure?", YesNo(true)),
                        ("High cholesterol?", YesNo(true)),
                        ("Exercise regularly?", YesNo(true)),
                        ("Chest pain or discomfort?", YesNo(true)),
                    ]
                )
            ],
            last_updated: ago(3_600_000),
        },
        Analysis {
            patient_id: "3".into(),
            blocks: vec![
                block(
                    ago,
                    "c1",
                    "Sleep Disturbance",
                    "Significant insomnia for past month. Patient wakes 3-4 times per night and takes over 1 hour to fall asleep. Sleep quality poor, leading to daytime fatigue and irritability.",
                    Medium,
                    7_200_000
                ),
                block(
                    ago,
                    "c2",
                    "Anxiety Symptoms",
                    "Patient reports increased anxiety related to recent job change. No previous history of anxiety disorders or mental health treatment. Symptoms affecting daily function and sleep quality.",
                    Medium,
                    10_800_000
                ),
                block(
                    ago,
                    "c3",
                    "No Current Treatment",
                    "Patient not currently on any medications. No previous mental health interventions. May benefit from both pharmacological and non-pharmacological approaches.",
                    Low,
                    14_400_000
                )
            ],
            medications: Vec::new(),
            forms: vec![
                form(
                    ago,
                    "f4",
                    "Mental Health Screening",
                    259_200_000,
                    &[
                        ("Feeling nervous, anxious, or on edge?", text("Often")),
                        ("Not being able to stop or control worrying?", text("Sometimes")),
                        ("Trouble falling or staying asleep?", text("Often")),
                        ("Feeling tired or having little energy?", text("Often")),
                        ("Little interest or pleasure in doing things?", text("Sometimes")),
                        ("Previous mental health treatment?", YesNo(false)),
                    ]
                )
            ],
            last_updated: ago(7_200_000),
        }
    ]
}

fn sample_threads(ago: &dyn Fn(i64) -> DateTime<Utc>) -> HashMap<String, Vec<ThreadMessage>> {
    let message = |id: &str, content: &str, sender, since| ThreadMessage {
        id: id.to_string(),
        content: content.to_string(),
        sender,
        timestamp: ago(since),
    };
    let mut threads = HashMap::new();
    threads.insert(
        "1".to_string(),
        vec![
            message(
                "1",
                "Hello Doctor, my headaches have been getting worse.",
                Sender::Patient,
                7_200_000
            ),
            message(
                "2",
                "I can see from your reports. Can you describe the pain for me?",
                Sender::Doctor,
                7_000_000
            ),
            message(
                "3",
                "It feels like a constant pressure on my forehead and temples. Sometimes it throbs.",
                Sender::Patient,
                6_800_000
            )
        ]
    );
    threads.insert("2".to_string(), Vec::new());
    threads.insert("3".to_string(), Vec::new());
    threads
}
