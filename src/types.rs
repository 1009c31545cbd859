use teloxide::types::ReplyMarkup;

/// The multi-step admin operation a conversation is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    AddChannel,
    RemoveChannel,
    AddLink,
    RemoveLink,
}

/// Where a flow currently is: prompting for typed input, or showing a
/// selection list. A shown removal list accepts both a button tap and typed
/// text, so it moves to `WaitingInput` once rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    WaitingInput,
    WaitingSelection,
}

/// Per-admin conversation state. Absence from the session store means idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationState {
    pub action: AdminAction,
    pub step: FlowStep,
    pub page: usize,
}

impl ConversationState {
    pub fn waiting_input(action: AdminAction) -> Self {
        Self {
            action,
            step: FlowStep::WaitingInput,
            page: 0,
        }
    }

    pub fn waiting_selection(action: AdminAction) -> Self {
        Self {
            action,
            step: FlowStep::WaitingSelection,
            page: 0,
        }
    }
}

/// A rendered outgoing message: text plus an optional keyboard.
/// Engines build these; the transport sends them.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
        }
    }

    pub fn with_markup(text: impl Into<String>, markup: impl Into<ReplyMarkup>) -> Self {
        Self {
            text: text.into(),
            markup: Some(markup.into()),
        }
    }
}

/// Reaction to an inline-button interaction: the callback-query answer
/// (optional notice, optionally shown as an alert) and an optional follow-up
/// message to the chat.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackReply {
    pub notice: Option<String>,
    pub show_alert: bool,
    pub message: Option<Reply>,
}

impl CallbackReply {
    /// Plain acknowledgement, nothing sent to the chat.
    pub fn ack() -> Self {
        Self {
            notice: None,
            show_alert: false,
            message: None,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            notice: Some(text.into()),
            show_alert: true,
            message: None,
        }
    }

    pub fn message(reply: Reply) -> Self {
        Self {
            notice: None,
            show_alert: false,
            message: Some(reply),
        }
    }
}
