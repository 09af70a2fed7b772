//! Response assembler - merges the agent's final message into one answer string.
//!
//! Text parts are appended verbatim. Image parts become self-contained
//! Markdown images with a base64 `data:` URI, set off by blank lines so they
//! render as their own block.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::platform::{Message, MessageContentPart, MessageRole, RemoteFile};

/// Substituted when the agent produced no usable content.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response received";

/// The most recent assistant message in a newest-first listing.
pub fn answer_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().find(|m| m.role == MessageRole::Assistant)
}

/// File ids of every image the message references, in order.
pub fn referenced_files(message: &Message) -> Vec<&str> {
    message
        .content
        .iter()
        .filter_map(|part| match part {
            MessageContentPart::ImageFile { image_file } => Some(image_file.file_id.as_str()),
            _ => None,
        })
        .collect()
}

/// MIME type for the image encodings the answer can embed.
fn image_mime_type(filename: &str) -> Option<&'static str> {
    let extension = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

fn embed_image(file: &RemoteFile) -> Option<String> {
    let mime = image_mime_type(&file.filename)?;
    Some(format!(
        "\n\n![{}](data:{};base64,{})\n\n",
        file.filename,
        mime,
        STANDARD.encode(&file.bytes)
    ))
}

/// Concatenate a message's parts into the final answer.
///
/// `files` maps file ids to downloaded content. Images whose file is missing
/// or whose type is not PNG/JPEG are dropped without a marker. Never returns
/// an empty string.
pub fn assemble(message: Option<&Message>, files: &HashMap<String, RemoteFile>) -> String {
    let mut answer = String::new();

    for part in message.map(|m| m.content.as_slice()).unwrap_or_default() {
        match part {
            MessageContentPart::Text { text } => answer.push_str(&text.value),
            MessageContentPart::ImageFile { image_file } => {
                let Some(file) = files.get(&image_file.file_id) else {
                    continue;
                };
                match embed_image(file) {
                    Some(block) => answer.push_str(&block),
                    None => tracing::debug!(
                        file_id = %image_file.file_id,
                        filename = %file.filename,
                        "Dropping image with unsupported type"
                    ),
                }
            }
            MessageContentPart::Unsupported => {}
        }
    }

    if answer.is_empty() {
        NO_RESPONSE_PLACEHOLDER.to_string()
    } else {
        answer
    }
}
