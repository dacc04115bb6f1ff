use dioxus::prelude::*;

use crate::icons;
use crate::protocol::{BackgroundInfo, Request, Response};
use crate::services::messaging::{open_options_page, send_request};

/// Trimmed prompt, or the message shown when there is nothing to send.
pub fn validate_prompt(raw: &str) -> Result<String, &'static str> {
    let prompt = raw.trim();
    if prompt.is_empty() {
        Err("Please enter a prompt")
    } else {
        Ok(prompt.to_string())
    }
}

/// Successful replies pass through; failures become the inline error text.
fn outcome(reply: Result<Response, String>, fallback: &str) -> Result<Response, String> {
    match reply {
        Ok(response) if response.success => Ok(response),
        Ok(response) => Err(response.error.unwrap_or_else(|| fallback.to_string())),
        Err(e) => Err(format!("{}: {}", fallback, e)),
    }
}

#[component]
pub fn SidePanel() -> Element {
    let mut prompt = use_signal(String::new);
    let mut generated_image = use_signal(|| None::<String>);
    let mut is_generating = use_signal(|| false);
    let mut error = use_signal(|| None::<String>);
    let mut background = use_signal(BackgroundInfo::default);

    // Load the current page's state when the panel opens
    use_effect(move || {
        spawn(async move {
            let reply = send_request(&Request::GetBackgroundInfo).await;
            match outcome(reply, "Failed to load background info") {
                Ok(Response {
                    info: Some(info), ..
                }) => background.set(info),
                Ok(_) => {}
                Err(e) => log::warn!("{}", e),
            }
        });
    });

    let mut generate = move || {
        let text = match validate_prompt(&prompt.read()) {
            Ok(text) => text,
            Err(message) => {
                error.set(Some(message.to_string()));
                return;
            }
        };

        is_generating.set(true);
        error.set(None);
        spawn(async move {
            let reply = send_request(&Request::GenerateImage { prompt: text }).await;
            match outcome(reply, "Failed to generate image") {
                Ok(response) => generated_image.set(response.image_url),
                Err(e) => error.set(Some(e)),
            }
            is_generating.set(false);
        });
    };

    let apply = move |_| {
        let Some(image_url) = generated_image() else {
            return;
        };
        spawn(async move {
            let request = Request::ChangeBackground {
                image_url: image_url.clone(),
            };
            match outcome(send_request(&request).await, "Failed to apply background") {
                Ok(_) => {
                    background.set(BackgroundInfo {
                        has_original: true,
                        current_image: Some(image_url),
                    });
                    generated_image.set(None);
                }
                Err(e) => error.set(Some(e)),
            }
        });
    };

    let restore = move |_| {
        spawn(async move {
            let reply = send_request(&Request::RestoreBackground).await;
            match outcome(reply, "Failed to restore background") {
                Ok(_) => background.set(BackgroundInfo::default()),
                Err(e) => error.set(Some(e)),
            }
        });
    };

    let open_settings = move |_| {
        spawn(async move {
            if let Err(e) = open_options_page().await {
                error.set(Some(format!("Failed to open settings: {}", e)));
            }
        });
    };

    let error_text = error().unwrap_or_default();
    let preview = generated_image().unwrap_or_default();
    let has_background = background.read().current_image.is_some();
    let can_generate = !is_generating() && !prompt.read().trim().is_empty();

    rsx! {
        div { class: "w-80 h-screen bg-white p-4 flex flex-col",
            div { class: "mb-6",
                h1 { class: "text-xl font-bold text-gray-800 mb-2", "AI Background Shifter" }
                p { class: "text-sm text-gray-500", "Generate AI backgrounds for this webpage" }
            }

            div { class: "flex-1 flex flex-col space-y-4",
                div {
                    label { class: "block text-sm font-medium text-gray-800 mb-2",
                        r#for: "prompt",
                        "Describe your background"
                    }
                    textarea {
                        id: "prompt",
                        class: "w-full min-h-[100px] px-3 py-2 border border-gray-300 rounded-md focus:ring-2 focus:ring-blue-500",
                        placeholder: "e.g., A serene mountain landscape at sunset with purple clouds...",
                        value: "{prompt}",
                        oninput: move |e| prompt.set(e.value())
                    }
                }

                button {
                    class: "w-full bg-blue-600 text-white py-2 px-4 rounded-md hover:bg-blue-700 transition disabled:opacity-50 disabled:cursor-not-allowed",
                    disabled: !can_generate,
                    onclick: move |_| generate(),
                    if is_generating() {
                        div { class: "flex items-center justify-center",
                            icons::Loader { class: Some("w-4 h-4 mr-2 animate-spin".to_string()) }
                            span { "Generating..." }
                        }
                    } else {
                        "Generate Background"
                    }
                }

                if !error_text.is_empty() {
                    div { class: "p-3 bg-red-50 border border-red-200 rounded-md flex items-start",
                        icons::AlertCircle { class: Some("w-4 h-4 text-red-600 mr-2 mt-0.5".to_string()) }
                        p { class: "text-sm text-red-600", "{error_text}" }
                    }
                }

                if !preview.is_empty() {
                    div { class: "space-y-3",
                        img {
                            class: "w-full h-32 object-cover rounded-md border border-gray-300",
                            src: "{preview}",
                            alt: "Generated background"
                        }
                        div { class: "flex space-x-2",
                            button {
                                class: "flex-1 flex items-center justify-center bg-blue-600 text-white py-2 rounded-md hover:bg-blue-700 transition",
                                onclick: apply,
                                icons::Check { class: Some("w-4 h-4 mr-2".to_string()) }
                                "Apply"
                            }
                            button {
                                class: "flex-1 flex items-center justify-center border border-gray-300 text-gray-700 py-2 rounded-md hover:bg-gray-50 transition",
                                onclick: move |_| {
                                    generated_image.set(None);
                                    generate();
                                },
                                icons::RefreshCw { class: Some("w-4 h-4 mr-2".to_string()) }
                                "Retry"
                            }
                        }
                    }
                }

                if has_background {
                    div { class: "pt-4 border-t border-gray-200",
                        p { class: "text-sm text-gray-500 mb-2", "Current background applied" }
                        button {
                            class: "w-full flex items-center justify-center border border-gray-300 text-gray-700 py-2 rounded-md hover:bg-gray-50 transition",
                            onclick: restore,
                            icons::X { class: Some("w-4 h-4 mr-2".to_string()) }
                            "Restore Original"
                        }
                    }
                }
            }

            div { class: "pt-4 mt-auto border-t border-gray-200",
                button {
                    class: "w-full text-xs text-gray-500 py-2 rounded-md hover:bg-gray-50 transition",
                    onclick: open_settings,
                    "Settings"
                }
            }
        }
    }
}
