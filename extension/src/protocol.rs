// Message protocol between the side panel, the background relay and the content script
// Requests are tagged by "action"; every request gets exactly one Response

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShifterError};

/// Chrome tab identifier.
pub type TabId = i32;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    ChangeBackground {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    RestoreBackground,
    GetBackgroundInfo,
    GenerateImage {
        prompt: String,
    },
    ContentScriptReady,
}

const KNOWN_ACTIONS: [&str; 5] = [
    "changeBackground",
    "restoreBackground",
    "getBackgroundInfo",
    "generateImage",
    "contentScriptReady",
];

impl Request {
    /// Decode a raw message, telling unknown actions apart from malformed ones.
    pub fn from_value(value: Value) -> Result<Self> {
        let action = match value.get("action") {
            Some(Value::String(action)) => action.clone(),
            Some(other) => return Err(ShifterError::UnknownAction(other.to_string())),
            None => {
                return Err(ShifterError::MalformedRequest(
                    "missing \"action\" field".to_string(),
                ))
            }
        };

        if !KNOWN_ACTIONS.contains(&action.as_str()) {
            return Err(ShifterError::UnknownAction(action));
        }

        serde_json::from_value(value).map_err(|e| ShifterError::MalformedRequest(e.to_string()))
    }

    pub fn action(&self) -> &'static str {
        match self {
            Request::ChangeBackground { .. } => "changeBackground",
            Request::RestoreBackground => "restoreBackground",
            Request::GetBackgroundInfo => "getBackgroundInfo",
            Request::GenerateImage { .. } => "generateImage",
            Request::ContentScriptReady => "contentScriptReady",
        }
    }

    /// Actions that are served by the mutation engine in the active tab.
    pub fn targets_page(&self) -> bool {
        matches!(
            self,
            Request::ChangeBackground { .. } | Request::RestoreBackground | Request::GetBackgroundInfo
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundInfo {
    pub has_original: bool,
    pub current_image: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub info: Option<BackgroundInfo>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            error: None,
            image_url: None,
            info: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    pub fn info(info: BackgroundInfo) -> Self {
        Self {
            info: Some(info),
            ..Self::ok()
        }
    }

    pub fn image(image_url: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
            ..Self::ok()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::ok()
        }
    }
}

impl From<ShifterError> for Response {
    fn from(err: ShifterError) -> Self {
        Response::failure(err.to_string())
    }
}

impl From<Result<Response>> for Response {
    fn from(result: Result<Response>) -> Self {
        result.unwrap_or_else(Response::from)
    }
}

/// The `sender` argument of `chrome.runtime.onMessage`, reduced to what the relay reads.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct MessageSender {
    #[serde(default)]
    pub tab: Option<SenderTab>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SenderTab {
    #[serde(default)]
    pub id: Option<TabId>,
}

impl MessageSender {
    pub fn from_tab(id: TabId) -> Self {
        Self {
            tab: Some(SenderTab { id: Some(id) }),
        }
    }

    pub fn tab_id(&self) -> Option<TabId> {
        self.tab.as_ref().and_then(|tab| tab.id)
    }
}

/// One-shot wrapper around a `sendResponse` callback.
///
/// `send` consumes the responder, so a second reply cannot be written. A responder
/// dropped without replying (an early return, a cancelled future) still answers
/// with a failure, so the caller is never left waiting on an open channel.
pub struct Responder {
    callback: Option<Box<dyn FnOnce(Response)>>,
}

impl Responder {
    pub fn new(callback: impl FnOnce(Response) + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub fn send(mut self, response: Response) {
        if let Some(callback) = self.callback.take() {
            callback(response);
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            log::warn!("Responder dropped without a reply; answering with failure");
            callback(Response::failure("Internal error: request finished without a response"));
        }
    }
}
