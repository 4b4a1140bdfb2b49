//! Notification Dispatcher
//!
//! Turns an inbound push signal into a user-facing notification and
//! routes the user's interaction back into the application. The signal
//! may carry a JSON override object; it is shallow-merged over the
//! default template, and a payload that fails to parse falls back to
//! the template entirely (logged, never fatal).

use alloc::string::String;
use alloc::vec::Vec;
use serde::Deserialize;

use crate::clients::ClientRegistry;

/// One action button on a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    /// Identifier reported back on interaction.
    pub id: String,
    /// Button label.
    pub label: String,
}

impl NotificationAction {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A fully-resolved notification, ready for display. Transient; the
/// dispatcher never persists these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    /// Icon reference (URL or asset key).
    pub icon: Option<String>,
    /// Ordered action buttons.
    pub actions: Vec<NotificationAction>,
    /// Auxiliary data passed through to the interaction handler.
    pub data: Option<String>,
}

impl NotificationRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            actions: Vec::new(),
            data: None,
        }
    }

    /// Set the icon reference.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Append an action button.
    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// Override fields carried by a push payload. Absent fields keep the
/// template's value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationOverride {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub actions: Option<Vec<ActionOverride>>,
    #[serde(default)]
    pub data: Option<String>,
}

/// One action entry in an override payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionOverride {
    pub id: String,
    pub label: String,
}

/// Where an interaction sent the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    /// The dismiss action; nothing else happens.
    Dismissed,
    /// An existing same-origin instance was brought to the foreground.
    Focused(u64),
    /// A new instance was opened at the default entry path.
    Opened(u64),
}

/// Builds notifications from the default template and routes
/// interactions to open clients.
pub struct NotificationDispatcher {
    /// Default template used when the payload is absent or malformed.
    template: NotificationRequest,
    /// Action ID that closes the notification silently.
    dismiss_action: String,
    /// Origin whose instances interactions focus.
    own_origin: String,
    /// Path opened when no instance exists.
    default_entry: String,
}

impl NotificationDispatcher {
    pub fn new(
        template: NotificationRequest,
        dismiss_action: impl Into<String>,
        own_origin: impl Into<String>,
        default_entry: impl Into<String>,
    ) -> Self {
        Self {
            template,
            dismiss_action: dismiss_action.into(),
            own_origin: own_origin.into(),
            default_entry: default_entry.into(),
        }
    }

    /// Resolve the notification for a push signal. `payload`, when
    /// present, is parsed as a JSON override object; parse failures are
    /// logged and the default template is used unchanged.
    pub fn present(&self, payload: Option<&[u8]>) -> NotificationRequest {
        let Some(bytes) = payload else {
            return self.template.clone();
        };
        match serde_json::from_slice::<NotificationOverride>(bytes) {
            Ok(over) => self.merge(over),
            Err(error) => {
                log::warn!("push payload did not parse, using default template: {}", error);
                self.template.clone()
            }
        }
    }

    /// Shallow merge: each override field that is present wins whole.
    fn merge(&self, over: NotificationOverride) -> NotificationRequest {
        let mut resolved = self.template.clone();
        if let Some(title) = over.title {
            resolved.title = title;
        }
        if let Some(body) = over.body {
            resolved.body = body;
        }
        if let Some(icon) = over.icon {
            resolved.icon = Some(icon);
        }
        if let Some(actions) = over.actions {
            resolved.actions = actions
                .into_iter()
                .map(|a| NotificationAction::new(a.id, a.label))
                .collect();
        }
        if let Some(data) = over.data {
            resolved.data = Some(data);
        }
        resolved
    }

    /// Route a notification interaction. The dismiss action closes
    /// silently; any other action focuses an existing same-origin
    /// instance or opens a new one at the default entry path.
    pub fn interact(&self, action_id: &str, clients: &mut ClientRegistry) -> InteractionOutcome {
        if action_id == self.dismiss_action {
            return InteractionOutcome::Dismissed;
        }
        if let Some(id) = clients.find_origin(&self.own_origin).map(|c| c.id) {
            clients.focus(id);
            return InteractionOutcome::Focused(id);
        }
        let id = clients.open_window(self.default_entry.clone(), self.own_origin.clone());
        InteractionOutcome::Opened(id)
    }
}
