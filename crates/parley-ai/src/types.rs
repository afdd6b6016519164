//! Core types for chat exchanges

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Get the role as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in the conversation history.
///
/// This is exactly the shape sent over the wire; the full list is resent on
/// every turn since the remote side keeps no session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Conversation "type" tag selecting server-side behavior.
///
/// Passed through to the endpoint unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConversationType {
    /// General health assistant
    #[default]
    PatientAssistant,
    /// Pre-appointment history taking
    PatientHistory,
    /// Any other tag understood by the endpoint
    Custom(String),
}

impl ConversationType {
    /// The wire tag
    pub fn as_str(&self) -> &str {
        match self {
            ConversationType::PatientAssistant => "patient-assistant",
            ConversationType::PatientHistory => "patient-history",
            ConversationType::Custom(tag) => tag,
        }
    }
}

impl From<String> for ConversationType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "patient-assistant" => ConversationType::PatientAssistant,
            "patient-history" => ConversationType::PatientHistory,
            _ => ConversationType::Custom(tag),
        }
    }
}

impl From<&str> for ConversationType {
    fn from(tag: &str) -> Self {
        ConversationType::from(tag.to_string())
    }
}

impl From<ConversationType> for String {
    fn from(ty: ConversationType) -> Self {
        ty.as_str().to_string()
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for one chat exchange
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
    #[serde(rename = "type")]
    pub conversation_type: &'a ConversationType,
}

/// Canned prompts offered by the typed assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickAction {
    Report,
    Appointment,
    Medication,
    Symptom,
    Info,
}

impl QuickAction {
    pub const ALL: [QuickAction; 5] = [
        QuickAction::Report,
        QuickAction::Appointment,
        QuickAction::Medication,
        QuickAction::Symptom,
        QuickAction::Info,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            QuickAction::Report => "report",
            QuickAction::Appointment => "appointment",
            QuickAction::Medication => "medication",
            QuickAction::Symptom => "symptom",
            QuickAction::Info => "info",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            QuickAction::Report => "Explain Report",
            QuickAction::Appointment => "Book Appointment",
            QuickAction::Medication => "Medications",
            QuickAction::Symptom => "Check Symptoms",
            QuickAction::Info => "Health Info",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            QuickAction::Report => "Upload and understand your medical reports",
            QuickAction::Appointment => "Schedule a visit with your doctor",
            QuickAction::Medication => "Set reminders and check interactions",
            QuickAction::Symptom => "Understand your symptoms better",
            QuickAction::Info => "Get answers to health questions",
        }
    }

    /// Text submitted as the user's turn
    pub fn prompt(&self) -> String {
        format!("I need help with: {}", self.title())
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }
}
