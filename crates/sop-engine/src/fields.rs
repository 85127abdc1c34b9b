//! SOP form fields
//!
//! The form has a fixed set of seven fields. Each one maps to a `{{KEY}}`
//! placeholder in the template, a snake_case name used on the wire and in
//! validation messages, and a label shown next to the input.

use serde::{Deserialize, Serialize};

use crate::date;

/// One of the seven SOP form fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Title,
    Code,
    ChecklistNo,
    Revision,
    Date,
    Position,
    Actions,
}

impl FieldKey {
    /// All fields in form order
    pub const ALL: [FieldKey; 7] = [
        FieldKey::Title,
        FieldKey::Code,
        FieldKey::ChecklistNo,
        FieldKey::Revision,
        FieldKey::Date,
        FieldKey::Position,
        FieldKey::Actions,
    ];

    /// Fields that must be non-blank before a document is generated
    pub const REQUIRED: [FieldKey; 4] = [
        FieldKey::Title,
        FieldKey::ChecklistNo,
        FieldKey::Date,
        FieldKey::Actions,
    ];

    /// Key used inside `{{...}}` in the template
    pub fn placeholder_key(&self) -> &'static str {
        match self {
            FieldKey::Title => "TITLE",
            FieldKey::Code => "CODE",
            FieldKey::ChecklistNo => "CHECKLIST.NO",
            FieldKey::Revision => "REV",
            FieldKey::Date => "DATE",
            FieldKey::Position => "POSITION",
            FieldKey::Actions => "ACTIONS",
        }
    }

    /// The full `{{KEY}}` token
    pub fn placeholder(&self) -> String {
        format!("{{{{{}}}}}", self.placeholder_key())
    }

    /// Look up a field by its placeholder key (case-sensitive)
    pub fn from_placeholder_key(key: &str) -> Option<FieldKey> {
        FieldKey::ALL
            .into_iter()
            .find(|k| k.placeholder_key() == key)
    }

    /// snake_case field name
    pub fn name(&self) -> &'static str {
        match self {
            FieldKey::Title => "title",
            FieldKey::Code => "code",
            FieldKey::ChecklistNo => "checklist_no",
            FieldKey::Revision => "revision",
            FieldKey::Date => "date",
            FieldKey::Position => "position",
            FieldKey::Actions => "actions",
        }
    }

    /// Label shown next to the form input
    pub fn label(&self) -> &'static str {
        match self {
            FieldKey::Title => "Title",
            FieldKey::Code => "Code",
            FieldKey::ChecklistNo => "Checklist No.",
            FieldKey::Revision => "Revision",
            FieldKey::Date => "Creation Date",
            FieldKey::Position => "Position",
            FieldKey::Actions => "Actions",
        }
    }

    /// Greyed-out example text for the input, where the form shows one
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            FieldKey::Title => Some("Enter a title for this SOP"),
            FieldKey::ChecklistNo => Some("100.001"),
            FieldKey::Date => Some(date::DATE_FORMAT_HINT),
            FieldKey::Actions => Some(
                "Steps needed to complete this SOP. Provide as much detail as possible before asking for AI help.",
            ),
            _ => None,
        }
    }

    pub fn is_required(&self) -> bool {
        FieldKey::REQUIRED.contains(self)
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Current values of every SOP field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    pub title: String,
    pub code: String,
    pub checklist_no: String,
    pub revision: String,
    pub date: String,
    pub position: String,
    pub actions: String,
}

impl Default for FieldSet {
    /// Blank form with the creation date seeded to today
    fn default() -> Self {
        Self::with_date(date::today())
    }
}

impl FieldSet {
    /// Blank form with an explicit creation date
    pub fn with_date(date: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            code: String::new(),
            checklist_no: String::new(),
            revision: String::new(),
            date: date.into(),
            position: String::new(),
            actions: String::new(),
        }
    }

    pub fn get(&self, key: FieldKey) -> &str {
        match key {
            FieldKey::Title => &self.title,
            FieldKey::Code => &self.code,
            FieldKey::ChecklistNo => &self.checklist_no,
            FieldKey::Revision => &self.revision,
            FieldKey::Date => &self.date,
            FieldKey::Position => &self.position,
            FieldKey::Actions => &self.actions,
        }
    }

    pub fn set(&mut self, key: FieldKey, value: impl Into<String>) {
        let slot = match key {
            FieldKey::Title => &mut self.title,
            FieldKey::Code => &mut self.code,
            FieldKey::ChecklistNo => &mut self.checklist_no,
            FieldKey::Revision => &mut self.revision,
            FieldKey::Date => &mut self.date,
            FieldKey::Position => &mut self.position,
            FieldKey::Actions => &mut self.actions,
        };
        *slot = value.into();
    }

    /// Iterate `(key, value)` pairs in form order
    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &str)> + '_ {
        FieldKey::ALL.into_iter().map(move |k| (k, self.get(k)))
    }

    /// Required fields that are blank after trimming, in required order
    pub fn missing_required(&self) -> Vec<FieldKey> {
        FieldKey::REQUIRED
            .into_iter()
            .filter(|k| self.get(*k).trim().is_empty())
            .collect()
    }

    /// Download name: `"{CHECKLIST.NO} - {TITLE}.docx"`
    pub fn output_filename(&self) -> String {
        format!("{} - {}.docx", self.checklist_no, self.title)
    }

    /// Overwrite every field present in `update`
    pub fn apply(&mut self, update: FieldUpdate) {
        for (key, value) in update.into_pairs() {
            self.set(key, value);
        }
    }
}

/// Partial form edit; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldUpdate {
    pub title: Option<String>,
    pub code: Option<String>,
    pub checklist_no: Option<String>,
    pub revision: Option<String>,
    pub date: Option<String>,
    pub position: Option<String>,
    pub actions: Option<String>,
}

impl FieldUpdate {
    /// Update that sets a single field
    pub fn single(key: FieldKey, value: impl Into<String>) -> Self {
        let mut update = Self::default();
        let value = Some(value.into());
        match key {
            FieldKey::Title => update.title = value,
            FieldKey::Code => update.code = value,
            FieldKey::ChecklistNo => update.checklist_no = value,
            FieldKey::Revision => update.revision = value,
            FieldKey::Date => update.date = value,
            FieldKey::Position => update.position = value,
            FieldKey::Actions => update.actions = value,
        }
        update
    }

    pub fn is_empty(&self) -> bool {
        self.clone().into_pairs().is_empty()
    }

    fn into_pairs(self) -> Vec<(FieldKey, String)> {
        [
            (FieldKey::Title, self.title),
            (FieldKey::Code, self.code),
            (FieldKey::ChecklistNo, self.checklist_no),
            (FieldKey::Revision, self.revision),
            (FieldKey::Date, self.date),
            (FieldKey::Position, self.position),
            (FieldKey::Actions, self.actions),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect()
    }
}
