use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Click,
    Submit,
    Input,
    Navigation,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Submit => "submit",
            EventKind::Input => "input",
            EventKind::Navigation => "navigation",
        }
    }
}

/// The element an interaction was dispatched on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag: String,
    pub id: Option<String>,
    pub name: Option<String>,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

impl ElementInfo {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Selector-like path: `tag#id.class[name=...]`.
    pub fn path(&self) -> String {
        let mut path = self.tag.clone();
        if let Some(id) = &self.id {
            path.push('#');
            path.push_str(id);
        }
        for class in &self.classes {
            path.push('.');
            path.push_str(class);
        }
        if let Some(name) = &self.name {
            path.push_str(&format!("[name={}]", name));
        }
        path
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomEvent {
    pub kind: EventKind,
    pub target: ElementInfo,
    /// Current value for input events.
    pub value: Option<String>,
    /// Named form fields for submit events.
    pub fields: BTreeMap<String, String>,
    /// Destination for navigation events, current page otherwise.
    pub url: String,
}

impl DomEvent {
    pub fn click(target: ElementInfo, url: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Click,
            target,
            value: None,
            fields: BTreeMap::new(),
            url: url.into(),
        }
    }

    pub fn input(target: ElementInfo, value: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Input,
            target,
            value: Some(value.into()),
            fields: BTreeMap::new(),
            url: url.into(),
        }
    }

    pub fn submit(
        target: ElementInfo,
        fields: impl IntoIterator<Item = (String, String)>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            kind: EventKind::Submit,
            target,
            value: None,
            fields: fields.into_iter().collect(),
            url: url.into(),
        }
    }

    pub fn navigation(to: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Navigation,
            target: ElementInfo::new("document"),
            value: None,
            fields: BTreeMap::new(),
            url: to.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSignal {
    Interaction(DomEvent),
    /// Page teardown; the last chance to deliver buffered telemetry.
    Unload,
}

/// Document-level delegation point. Listeners attach once here instead of to
/// individual elements, so dynamic content needs no re-binding.
pub struct Document {
    sender: broadcast::Sender<DocumentSignal>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn dispatch(&self, event: DomEvent) {
        let _ = self.sender.send(DocumentSignal::Interaction(event));
    }

    pub fn unload(&self) {
        let _ = self.sender.send(DocumentSignal::Unload);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DocumentSignal> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
